//! Status replies sent back over the DDI channel.
//!
//! The controlling application parses these with fixed-format scanners, so
//! the exact marker text and field order are part of the wire contract.

/// Reply to `!getwindowsizepos:`.
pub fn window_info(x: i32, y: i32, w: u32, h: u32) -> String {
    format!("!pdfwininfo={x} {y} {w} {h}")
}

/// Reply to `!getstats:`. Pages are 1-based on the wire.
pub fn page_stats(page: usize) -> String {
    format!("!pdfstats:page={}", page + 1)
}

/// Headless scan result.
pub fn headless_hits(count: usize) -> String {
    format!("!headlessHits:{count}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_formats_are_exact() {
        assert_eq!(window_info(-4, 30, 1280, 720), "!pdfwininfo=-4 30 1280 720");
        assert_eq!(page_stats(0), "!pdfstats:page=1");
        assert_eq!(page_stats(16), "!pdfstats:page=17");
        assert_eq!(headless_hits(0), "!headlessHits:0");
        assert_eq!(headless_hits(12), "!headlessHits:12");
    }
}
