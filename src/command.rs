//! Wire command parser.
//!
//! Payloads are plain text holding one or more `!marker:value` (or
//! `!marker=value`) substrings. The tokenizer splits on `!`, takes the key
//! up to the first `:` or `=`, and looks it up in a fixed table. Unknown
//! markers are skipped, malformed numeric arguments drop the command so
//! the previous value stays in force, and a payload shorter than two
//! characters is noise.

use std::path::PathBuf;

use log::{debug, warn};

use crate::keymap::{parse_combo, remap_target, KeyCombo, ViewerAction};

/// One decoded wire command. Values carry exactly what the viewer needs,
/// parsing quirks stay here.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `!debug:` raises the log level for the rest of the run.
    Debug,
    /// `!headless:` switches to single-shot oracle mode.
    Headless,
    /// `!csradius:<f>` sets the compound merge radius, range-checked.
    CsRadius(f64),
    /// `!cshighlight:<i>` sets the merged-geometry bitmask.
    CsHighlight(u32),
    SetWindowSize { w: u32, h: u32 },
    SetWindowSizePos { w: u32, h: u32, x: i32, y: i32 },
    GetWindowSizePos,
    SearchNext,
    SearchPrev,
    SearchPageNext,
    SearchPagePrev,
    /// `!gotopg:<n>`, 1-based page number as sent; the viewer rebases
    /// and clamps.
    GotoPage(i32),
    GetStats,
    Quit,
    ColorInvert,
    ScrollSwap,
    Raise(bool),
    Detached,
    Load(PathBuf),
    Remap { action: ViewerAction, combo: KeyCombo },
    Heuristics(bool),
    StrictMatch(bool),
    PageSearch(String),
    Search(String),
    CompSearch(String),
}

/// A value runs to the end of its token; the sender terminates lines with
/// CR/LF which are never part of the value.
fn clean(value: &str) -> &str {
    value.trim_end_matches(['\r', '\n'])
}

fn parse_one(key: &str, value: &str) -> Option<Command> {
    let cmd = match key {
        "debug" => Command::Debug,
        "headless" => Command::Headless,
        "csradius" => match clean(value).parse::<f64>() {
            Ok(r) => Command::CsRadius(r),
            Err(_) => {
                warn!("unparseable csradius value {value:?}, keeping previous");
                return None;
            }
        },
        "cshighlight" => match clean(value).parse::<u32>() {
            Ok(h) => Command::CsHighlight(h),
            Err(_) => {
                warn!("unparseable cshighlight value {value:?}, keeping previous");
                return None;
            }
        },
        "setwindowsize" => {
            let mut it = clean(value).split_whitespace();
            let w = it.next()?.parse().ok()?;
            let h = it.next()?.parse().ok()?;
            Command::SetWindowSize { w, h }
        }
        "setwindowsizepos" => {
            let mut it = clean(value).split_whitespace();
            let w = it.next()?.parse().ok()?;
            let h = it.next()?.parse().ok()?;
            let x = it.next()?.parse().ok()?;
            let y = it.next()?.parse().ok()?;
            Command::SetWindowSizePos { w, h, x, y }
        }
        "getwindowsizepos" => Command::GetWindowSizePos,
        "search_next" => Command::SearchNext,
        "search_prev" => Command::SearchPrev,
        "search_page_next" => Command::SearchPageNext,
        "search_page_prev" => Command::SearchPagePrev,
        "gotopg" => match clean(value).parse::<i32>() {
            Ok(n) => Command::GotoPage(n),
            Err(_) => {
                warn!("unparseable gotopg value {value:?}");
                return None;
            }
        },
        "getstats" => Command::GetStats,
        "quit" => Command::Quit,
        "cinvert" => Command::ColorInvert,
        "ss" => Command::ScrollSwap,
        "raise" => Command::Raise(true),
        "noraise" => Command::Raise(false),
        "detached" => Command::Detached,
        "load" => Command::Load(PathBuf::from(clean(value))),
        "heuristics" => Command::Heuristics(true),
        "noheuristics" => Command::Heuristics(false),
        "strictmatch" => Command::StrictMatch(true),
        "stdmatch" => Command::StrictMatch(false),
        "pagesearch" => Command::PageSearch(clean(value).to_string()),
        "search" => Command::Search(clean(value).to_string()),
        "compsearch" => Command::CompSearch(clean(value).to_string()),
        _ => {
            if let Some(action) = remap_target(key) {
                let combo = parse_combo(clean(value))?;
                Command::Remap { action, combo }
            } else {
                debug!("ignoring unknown marker {key:?}");
                return None;
            }
        }
    };
    Some(cmd)
}

/// Decode every marker in a payload, in payload order.
pub fn parse_payload(payload: &str) -> Vec<Command> {
    if payload.len() < 2 {
        return Vec::new();
    }
    let mut commands = Vec::new();
    for token in payload.split('!').skip(1) {
        if token.is_empty() {
            continue;
        }
        let (key, value) = match token.find([':', '=']) {
            Some(pos) => (&token[..pos], &token[pos + 1..]),
            None => (token, ""),
        };
        if let Some(cmd) = parse_one(key, value) {
            commands.push(cmd);
        }
    }
    commands
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::MOD_CTRL;

    #[test]
    fn single_marker_payloads() {
        assert_eq!(parse_payload("!quit:"), vec![Command::Quit]);
        assert_eq!(parse_payload("!gotopg:17"), vec![Command::GotoPage(17)]);
        assert_eq!(
            parse_payload("!search:U15\r\n"),
            vec![Command::Search("U15".into())]
        );
        assert_eq!(
            parse_payload("!compsearch:R1:C5:Q3"),
            vec![Command::CompSearch("R1:C5:Q3".into())]
        );
        assert_eq!(
            parse_payload("!load:/tmp/board.pdf\r\n"),
            vec![Command::Load(PathBuf::from("/tmp/board.pdf"))]
        );
    }

    #[test]
    fn multiple_markers_keep_payload_order() {
        let cmds = parse_payload("!csradius:900!cshighlight:2!compsearch:R1:C5");
        assert_eq!(
            cmds,
            vec![
                Command::CsRadius(900.0),
                Command::CsHighlight(2),
                Command::CompSearch("R1:C5".into()),
            ]
        );
    }

    #[test]
    fn noise_and_unknown_markers_are_dropped() {
        assert!(parse_payload("").is_empty());
        assert!(parse_payload("!").is_empty());
        assert!(parse_payload("no markers here").is_empty());
        assert!(parse_payload("!fancynewthing:42").is_empty());
    }

    #[test]
    fn malformed_numbers_drop_the_command() {
        assert!(parse_payload("!csradius:abc").is_empty());
        assert!(parse_payload("!gotopg:seven").is_empty());
        assert!(parse_payload("!setwindowsize:800").is_empty());
        // A bad marker never takes its neighbors down.
        assert_eq!(
            parse_payload("!csradius:abc!gotopg:3"),
            vec![Command::GotoPage(3)]
        );
    }

    #[test]
    fn window_geometry_markers() {
        assert_eq!(
            parse_payload("!setwindowsize:1024 768"),
            vec![Command::SetWindowSize { w: 1024, h: 768 }]
        );
        assert_eq!(
            parse_payload("!setwindowsizepos:800 600 40 -20"),
            vec![Command::SetWindowSizePos {
                w: 800,
                h: 600,
                x: 40,
                y: -20
            }]
        );
    }

    #[test]
    fn remap_markers_use_equals_and_wire_combo_format() {
        assert_eq!(
            parse_payload("!keysearch=102 1"),
            vec![Command::Remap {
                action: ViewerAction::Search,
                combo: KeyCombo::new(102, MOD_CTRL),
            }]
        );
        assert!(parse_payload("!keysearch=oops").is_empty());
    }

    #[test]
    fn toggle_markers_map_to_booleans() {
        assert_eq!(parse_payload("!raise:"), vec![Command::Raise(true)]);
        assert_eq!(parse_payload("!noraise:"), vec![Command::Raise(false)]);
        assert_eq!(
            parse_payload("!heuristics:!noheuristics:"),
            vec![Command::Heuristics(true), Command::Heuristics(false)]
        );
        assert_eq!(
            parse_payload("!strictmatch:"),
            vec![Command::StrictMatch(true)]
        );
    }
}
