//! Search specification and state.
//!
//! One [`SearchState`] value is shared by the command parser (which loads
//! new specifications into it) and the scan engine (which walks it across
//! the document). A search carries up to three terms: `a` anchors the page
//! location, `b` and `c` are optional refinements merged by spatial
//! proximity (compound search).

use log::debug;

use crate::document::HitBox;

/// Cap on hits requested from the document engine per page and term.
pub const MAX_PAGE_HITS: usize = 500;

/// Default compound-search merge radius (squared-distance threshold).
pub const DEFAULT_CS_RADIUS: f64 = 500.0;
/// Default merged-geometry selection: union of all terms' boxes.
pub const DEFAULT_CS_HIGHLIGHT: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    #[default]
    None,
    Normal,
    InPage,
    Compound,
}

/// Compound-search tunables. Reset to defaults at the start of every
/// incoming payload; out-of-range values keep the current setting.
#[derive(Debug, Clone, Copy)]
pub struct CompoundConfig {
    pub radius: f64,
    pub highlight: u32,
}

impl Default for CompoundConfig {
    fn default() -> Self {
        Self {
            radius: DEFAULT_CS_RADIUS,
            highlight: DEFAULT_CS_HIGHLIGHT,
        }
    }
}

impl CompoundConfig {
    /// Accepts radii in [1, 50000]; anything else keeps the current value.
    pub fn set_radius(&mut self, radius: f64) {
        if (1.0..=50000.0).contains(&radius) {
            self.radius = radius;
        }
    }

    /// Accepts any positive selection mask; zero keeps current.
    pub fn set_highlight(&mut self, highlight: u32) {
        if highlight > 0 {
            self.highlight = highlight;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchState {
    /// Raw command text the search was loaded from; an identical incoming
    /// `!search:` payload means "advance" rather than "restart".
    pub raw: String,
    /// Primary term; authoritative for page location.
    pub a: String,
    /// Optional refinement terms.
    pub b: String,
    pub c: String,
    /// Heuristic alternate spelling of `a`, recomputed per scan.
    pub alt: String,

    pub mode: SearchMode,
    /// +1 forward, -1 backward. 0 is an engine-internal error.
    pub direction: i32,
    /// Current page index. May step one past either end mid-scan; the
    /// engine clamps before every document call.
    pub page: i32,
    /// Index into the current page's hit set; -1 means "not chosen yet".
    pub inpage_index: i32,

    /// Set once the whole document was exhausted without a single hit.
    pub not_found: bool,
    /// Sticky across page transitions: some page in this session had a hit.
    pub has_hits: bool,
    pub active: bool,

    /// Hit set for the current page (post-merge in compound mode).
    pub hits: Vec<HitBox>,
}

impl SearchState {
    /// Reset to the neutral idle state.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Load a normal forward search.
    pub fn begin_normal(&mut self, raw: &str, term: &str) {
        self.clear();
        self.raw = raw.to_string();
        self.a = term.to_string();
        self.mode = SearchMode::Normal;
        self.direction = 1;
        self.active = true;
        self.inpage_index = -1;
    }

    /// Load an in-page search: one attempt on the current page only.
    pub fn begin_inpage(&mut self, raw: &str, term: &str, page: i32) {
        self.clear();
        self.raw = raw.to_string();
        self.a = term.to_string();
        self.mode = SearchMode::InPage;
        self.direction = 1;
        self.page = page;
        self.active = true;
    }

    /// Load a compound search from a colon-delimited `a:b:c` spec; trailing
    /// terms are optional.
    pub fn begin_compound(&mut self, raw: &str, spec: &str) {
        self.clear();
        self.raw = raw.to_string();
        let mut parts = spec.splitn(3, ':');
        let mut take = || {
            parts
                .next()
                .unwrap_or_default()
                .trim_end_matches(['\r', '\n'])
                .to_string()
        };
        self.a = take();
        self.b = take();
        self.c = take();
        self.mode = SearchMode::Compound;
        self.direction = 1;
        self.active = true;
        self.inpage_index = -1;
        debug!("compound terms: '{}' '{}' '{}'", self.a, self.b, self.c);
    }

    /// Recompute the underscore→space alternate of `a`. Schematic PDFs mix
    /// the two spellings for net names, so a miss on the literal term gets
    /// one retry with the alternate. The final character is exempt from
    /// substitution.
    pub fn refresh_alt(&mut self, heuristics: bool) {
        self.alt.clear();
        if !heuristics || !self.a.contains('_') {
            return;
        }
        let last = self.a.chars().count().saturating_sub(1);
        self.alt = self
            .a
            .chars()
            .enumerate()
            .map(|(i, ch)| if ch == '_' && i < last { ' ' } else { ch })
            .collect();
        debug!("alternate search term: '{}'", self.alt);
    }
}

/// Order hits largest-area-first before an index is selected. Stable, so
/// equal areas keep the engine's order.
pub fn sort_hits_by_area(hits: &mut [HitBox]) {
    hits.sort_by(|p, q| {
        q.area()
            .partial_cmp(&p.area())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Index of the hit nearest to `anchor` by squared top-left distance.
/// Strict `<` comparison: the first minimal element encountered wins ties.
fn nearest(anchor: &HitBox, candidates: &[HitBox]) -> (f64, Option<usize>) {
    let mut best = 100_000_000.0_f64;
    let mut best_idx = None;
    for (i, c) in candidates.iter().enumerate() {
        let d = anchor.origin_dist_sq(c);
        if d < best {
            best = d;
            best_idx = Some(i);
        }
    }
    (best, best_idx)
}

/// Merge one page's per-term hit sets into the accepted compound hit set.
///
/// Every `a` hit is paired with its nearest `b` and `c` hits; a pairing is
/// accepted only when all present cross-term distances fall under the
/// radius. `b_required`/`c_required` reflect whether the term was given at
/// all: a required term with zero hits on this page empties the result set.
/// Accepted hits are materialized per the highlight mask: 8 = union of the
/// triple, 4/2/1 = only the a/b/c box; anything else keeps the `a` box.
pub fn merge_compound_hits(
    a_hits: &[HitBox],
    b_hits: &[HitBox],
    c_hits: &[HitBox],
    b_required: bool,
    c_required: bool,
    cfg: &CompoundConfig,
) -> Vec<HitBox> {
    if b_required && b_hits.is_empty() {
        return Vec::new();
    }
    if c_required && c_hits.is_empty() {
        return Vec::new();
    }

    let mut merged = Vec::new();
    for a in a_hits {
        let (dist_b, closest_b) = if b_hits.is_empty() {
            (0.0, None)
        } else {
            nearest(a, b_hits)
        };
        let (dist_c, closest_c) = if c_hits.is_empty() {
            (0.0, None)
        } else {
            nearest(a, c_hits)
        };

        if dist_b < cfg.radius && dist_c < cfg.radius {
            let mut out = *a;
            match cfg.highlight {
                8 => {
                    if let Some(j) = closest_b {
                        out.expand_to(&b_hits[j]);
                    }
                    if let Some(j) = closest_c {
                        out.expand_to(&c_hits[j]);
                    }
                }
                2 => {
                    if let Some(j) = closest_b {
                        out = b_hits[j];
                    }
                }
                1 => {
                    if let Some(j) = closest_c {
                        out = c_hits[j];
                    }
                }
                // 4 and anything unrecognized report the anchor box.
                _ => {}
            }
            merged.push(out);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bx(x0: f32, y0: f32, x1: f32, y1: f32) -> HitBox {
        HitBox::new(x0, y0, x1, y1)
    }

    #[test]
    fn begin_normal_resets_state() {
        let mut s = SearchState::default();
        s.not_found = true;
        s.page = 7;
        s.begin_normal("!search:R100", "R100");
        assert_eq!(s.mode, SearchMode::Normal);
        assert_eq!(s.direction, 1);
        assert_eq!(s.page, 0);
        assert!(s.active);
        assert!(!s.not_found);
        assert_eq!(s.inpage_index, -1);
    }

    #[test]
    fn compound_spec_splits_on_colons() {
        let mut s = SearchState::default();
        s.begin_compound("!compsearch:U1:R2:C3", "U1:R2:C3");
        assert_eq!(
            (s.a.as_str(), s.b.as_str(), s.c.as_str()),
            ("U1", "R2", "C3")
        );

        s.begin_compound("!compsearch:U1", "U1");
        assert_eq!((s.a.as_str(), s.b.as_str(), s.c.as_str()), ("U1", "", ""));

        s.begin_compound("!compsearch:U1:R2", "U1:R2");
        assert_eq!((s.a.as_str(), s.b.as_str(), s.c.as_str()), ("U1", "R2", ""));
    }

    #[test]
    fn alt_substitutes_underscores_except_last_char() {
        let mut s = SearchState::default();
        s.a = "VCC_MAIN_".to_string();
        s.refresh_alt(true);
        assert_eq!(s.alt, "VCC MAIN_");

        s.refresh_alt(false);
        assert!(s.alt.is_empty());

        s.a = "plain".to_string();
        s.refresh_alt(true);
        assert!(s.alt.is_empty());
    }

    #[test]
    fn hits_sort_largest_area_first() {
        let mut hits = vec![bx(0.0, 0.0, 5.0, 10.0), bx(0.0, 0.0, 10.0, 10.0)];
        sort_hits_by_area(&mut hits);
        assert_eq!(hits[0].area(), 100.0);
        assert_eq!(hits[1].area(), 50.0);
    }

    #[test]
    fn sort_keeps_equal_areas_in_input_order() {
        let mut hits = vec![bx(0.0, 0.0, 2.0, 2.0), bx(9.0, 9.0, 11.0, 11.0)];
        sort_hits_by_area(&mut hits);
        assert_eq!(hits[0].x0, 0.0);
        assert_eq!(hits[1].x0, 9.0);
    }

    #[test]
    fn merge_accepts_within_radius_and_unions() {
        let cfg = CompoundConfig {
            radius: 100.0,
            highlight: 8,
        };
        let a = [bx(0.0, 0.0, 10.0, 10.0)];
        let b = [bx(5.0, 5.0, 15.0, 15.0)];
        let merged = merge_compound_hits(&a, &b, &[], true, false, &cfg);
        assert_eq!(merged, vec![bx(0.0, 0.0, 15.0, 15.0)]);
    }

    #[test]
    fn merge_rejects_outside_radius() {
        let cfg = CompoundConfig {
            radius: 1.0,
            highlight: 8,
        };
        let a = [bx(0.0, 0.0, 10.0, 10.0)];
        let b = [bx(5.0, 5.0, 15.0, 15.0)];
        assert!(merge_compound_hits(&a, &b, &[], true, false, &cfg).is_empty());
    }

    #[test]
    fn required_term_with_no_hits_empties_the_set() {
        let cfg = CompoundConfig::default();
        let a = [bx(0.0, 0.0, 10.0, 10.0)];
        assert!(merge_compound_hits(&a, &[], &[], true, false, &cfg).is_empty());
        assert!(merge_compound_hits(&a, &a, &[], true, true, &cfg).is_empty());
    }

    #[test]
    fn nearest_ties_go_to_first_candidate() {
        // Both candidates sit at the same distance from the anchor origin.
        let anchor = bx(0.0, 0.0, 1.0, 1.0);
        let cands = [bx(3.0, 4.0, 4.0, 5.0), bx(4.0, 3.0, 5.0, 4.0)];
        let (d, idx) = nearest(&anchor, &cands);
        assert_eq!(d, 25.0);
        assert_eq!(idx, Some(0));
    }

    #[test]
    fn highlight_mask_selects_reported_geometry() {
        let cfg = CompoundConfig {
            radius: 1000.0,
            highlight: 2,
        };
        let a = [bx(0.0, 0.0, 10.0, 10.0)];
        let b = [bx(5.0, 5.0, 15.0, 15.0)];
        let merged = merge_compound_hits(&a, &b, &[], true, false, &cfg);
        assert_eq!(merged, vec![bx(5.0, 5.0, 15.0, 15.0)]);

        let cfg_a = CompoundConfig {
            radius: 1000.0,
            highlight: 4,
        };
        let merged = merge_compound_hits(&a, &b, &[], true, false, &cfg_a);
        assert_eq!(merged, vec![bx(0.0, 0.0, 10.0, 10.0)]);
    }

    #[test]
    fn config_rejects_out_of_range_values() {
        let mut cfg = CompoundConfig::default();
        cfg.set_radius(0.5);
        assert_eq!(cfg.radius, DEFAULT_CS_RADIUS);
        cfg.set_radius(60000.0);
        assert_eq!(cfg.radius, DEFAULT_CS_RADIUS);
        cfg.set_radius(250.0);
        assert_eq!(cfg.radius, 250.0);

        cfg.set_highlight(0);
        assert_eq!(cfg.highlight, DEFAULT_CS_HIGHLIGHT);
        cfg.set_highlight(4);
        assert_eq!(cfg.highlight, 4);
    }
}
