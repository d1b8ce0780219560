//! Logical viewer actions and their key bindings.
//!
//! The controlling application can rebind most actions over the wire with
//! `!key<name>=<keycode> <hexmods>` markers, so the map is data, not a
//! match statement. Shift-flavored variants (page-stepping search, 10-page
//! jumps) are derived from their base bindings and recomputed after every
//! remap batch.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub const MOD_CTRL: u8 = 1;
pub const MOD_ALT: u8 = 2;
pub const MOD_SHIFT: u8 = 4;
pub const MOD_OS: u8 = 8;

// Special keys above the byte range, ASCII elsewhere.
pub const KEY_ESCAPE: u32 = 27;
pub const KEY_ENTER: u32 = 13;
pub const KEY_INSERT: u32 = 256;
pub const KEY_PAGE_UP: u32 = 257;
pub const KEY_PAGE_DOWN: u32 = 258;
pub const KEY_HOME: u32 = 259;
pub const KEY_END: u32 = 260;
pub const KEY_LEFT: u32 = 261;
pub const KEY_UP: u32 = 262;
pub const KEY_RIGHT: u32 = 263;
pub const KEY_DOWN: u32 = 264;
pub const KEY_F1: u32 = 265;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewerAction {
    Search,
    SearchNext,
    SearchPrev,
    SearchPageNext,
    SearchPagePrev,
    PageUp,
    PageDown,
    PageUp10,
    PageDown10,
    ZoomIn,
    ZoomOut,
    RotateCw,
    RotateCcw,
    PanUp,
    PanDown,
    PanLeft,
    PanRight,
    FitWindow,
    FitWidth,
    FitHeight,
    GoPage,
    GoEndPage,
    Paste,
    Help,
    Back,
    Forward,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyCombo {
    pub key: u32,
    pub mods: u8,
}

impl KeyCombo {
    pub fn new(key: u32, mods: u8) -> Self {
        Self { key, mods }
    }

    pub fn plain(key: u32) -> Self {
        Self { key, mods: 0 }
    }

    pub fn with_shift(self) -> Self {
        Self {
            key: self.key,
            mods: self.mods | MOD_SHIFT,
        }
    }
}

/// Parse the wire remap format: decimal keycode, space, hex modifier mask.
pub fn parse_combo(s: &str) -> Option<KeyCombo> {
    let mut parts = s.split_whitespace();
    let key = parts.next()?.parse::<u32>().ok()?;
    let mods = u8::from_str_radix(parts.next()?, 16).ok()?;
    Some(KeyCombo { key, mods })
}

#[derive(Debug, Clone)]
pub struct Keymap {
    bindings: HashMap<ViewerAction, KeyCombo>,
}

impl Default for Keymap {
    fn default() -> Self {
        let mut bindings = HashMap::new();
        bindings.insert(ViewerAction::Search, KeyCombo::new('f' as u32, MOD_CTRL));
        bindings.insert(ViewerAction::SearchNext, KeyCombo::plain('n' as u32));
        bindings.insert(ViewerAction::SearchPrev, KeyCombo::plain('p' as u32));
        bindings.insert(ViewerAction::PageUp, KeyCombo::plain(KEY_PAGE_UP));
        bindings.insert(ViewerAction::PageDown, KeyCombo::plain(KEY_PAGE_DOWN));
        bindings.insert(ViewerAction::ZoomIn, KeyCombo::plain('=' as u32));
        bindings.insert(ViewerAction::ZoomOut, KeyCombo::plain('-' as u32));
        bindings.insert(ViewerAction::RotateCw, KeyCombo::plain('.' as u32));
        bindings.insert(ViewerAction::RotateCcw, KeyCombo::plain(',' as u32));
        bindings.insert(ViewerAction::PanUp, KeyCombo::plain(KEY_UP));
        bindings.insert(ViewerAction::PanDown, KeyCombo::plain(KEY_DOWN));
        bindings.insert(ViewerAction::PanLeft, KeyCombo::plain(KEY_LEFT));
        bindings.insert(ViewerAction::PanRight, KeyCombo::plain(KEY_RIGHT));
        bindings.insert(ViewerAction::FitWindow, KeyCombo::plain('w' as u32));
        bindings.insert(ViewerAction::FitWidth, KeyCombo::plain('h' as u32));
        bindings.insert(ViewerAction::FitHeight, KeyCombo::plain('v' as u32));
        bindings.insert(ViewerAction::GoPage, KeyCombo::plain('g' as u32));
        bindings.insert(
            ViewerAction::GoEndPage,
            KeyCombo::new('g' as u32, MOD_SHIFT),
        );
        bindings.insert(ViewerAction::Paste, KeyCombo::new('v' as u32, MOD_CTRL));
        bindings.insert(ViewerAction::Help, KeyCombo::plain(KEY_F1));
        bindings.insert(ViewerAction::Back, KeyCombo::plain('t' as u32));
        bindings.insert(ViewerAction::Forward, KeyCombo::new('t' as u32, MOD_SHIFT));
        bindings.insert(ViewerAction::Quit, KeyCombo::new('q' as u32, MOD_CTRL));
        let mut map = Self { bindings };
        map.derive_shifted();
        map
    }
}

impl Keymap {
    pub fn combo(&self, action: ViewerAction) -> Option<KeyCombo> {
        self.bindings.get(&action).copied()
    }

    /// Reverse lookup for the keypress path. The map is a couple dozen
    /// entries, a scan is fine.
    pub fn lookup(&self, combo: KeyCombo) -> Option<ViewerAction> {
        self.bindings
            .iter()
            .find(|(_, bound)| **bound == combo)
            .map(|(action, _)| *action)
    }

    pub fn rebind(&mut self, action: ViewerAction, combo: KeyCombo) {
        self.bindings.insert(action, combo);
    }

    /// Recompute the shift-derived variants from their base bindings.
    /// Must run after a remap batch so a rebound base key carries its
    /// variants along.
    pub fn derive_shifted(&mut self) {
        let pairs = [
            (ViewerAction::SearchNext, ViewerAction::SearchPageNext),
            (ViewerAction::SearchPrev, ViewerAction::SearchPagePrev),
            (ViewerAction::PageUp, ViewerAction::PageUp10),
            (ViewerAction::PageDown, ViewerAction::PageDown10),
        ];
        for (base, derived) in pairs {
            if let Some(combo) = self.combo(base) {
                self.bindings.insert(derived, combo.with_shift());
            }
        }
    }
}

/// Remap marker names to the actions they bind, e.g. `!keysearch=`.
pub fn remap_target(name: &str) -> Option<ViewerAction> {
    Some(match name {
        "keysearch" => ViewerAction::Search,
        "keynext" => ViewerAction::SearchNext,
        "keyprev" => ViewerAction::SearchPrev,
        "keypgup" => ViewerAction::PageUp,
        "keypgdn" => ViewerAction::PageDown,
        "keyzoomin" => ViewerAction::ZoomIn,
        "keyzoomout" => ViewerAction::ZoomOut,
        "keyrotatecw" => ViewerAction::RotateCw,
        "keyrotateccw" => ViewerAction::RotateCcw,
        "keyup" => ViewerAction::PanUp,
        "keydown" => ViewerAction::PanDown,
        "keyleft" => ViewerAction::PanLeft,
        "keyright" => ViewerAction::PanRight,
        "keyfitwindow" => ViewerAction::FitWindow,
        "keyfitwidth" => ViewerAction::FitWidth,
        "keyfitheight" => ViewerAction::FitHeight,
        "keygopage" => ViewerAction::GoPage,
        "keygoendpage" => ViewerAction::GoEndPage,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_map_resolves_core_actions() {
        let map = Keymap::default();
        assert_eq!(
            map.lookup(KeyCombo::new('f' as u32, MOD_CTRL)),
            Some(ViewerAction::Search)
        );
        assert_eq!(
            map.lookup(KeyCombo::plain('n' as u32)),
            Some(ViewerAction::SearchNext)
        );
        assert_eq!(
            map.lookup(KeyCombo::new('q' as u32, MOD_CTRL)),
            Some(ViewerAction::Quit)
        );
        assert_eq!(map.lookup(KeyCombo::plain('q' as u32)), None);
    }

    #[test]
    fn shifted_variants_follow_their_base() {
        let mut map = Keymap::default();
        assert_eq!(
            map.lookup(KeyCombo::new('n' as u32, MOD_SHIFT)),
            Some(ViewerAction::SearchPageNext)
        );

        map.rebind(ViewerAction::SearchNext, KeyCombo::plain('j' as u32));
        map.derive_shifted();
        assert_eq!(
            map.lookup(KeyCombo::new('j' as u32, MOD_SHIFT)),
            Some(ViewerAction::SearchPageNext)
        );
        assert_eq!(map.lookup(KeyCombo::new('n' as u32, MOD_SHIFT)), None);
    }

    #[test]
    fn combo_parses_decimal_key_and_hex_mods() {
        assert_eq!(parse_combo("110 0"), Some(KeyCombo::plain(110)));
        assert_eq!(parse_combo("102 1"), Some(KeyCombo::new(102, MOD_CTRL)));
        assert_eq!(parse_combo("257 c"), Some(KeyCombo::new(257, 0x0c)));
        assert_eq!(parse_combo("102"), None);
        assert_eq!(parse_combo("banana 1"), None);
        assert_eq!(parse_combo(""), None);
    }

    #[test]
    fn remap_names_cover_the_wire_family() {
        assert_eq!(remap_target("keysearch"), Some(ViewerAction::Search));
        assert_eq!(remap_target("keygoendpage"), Some(ViewerAction::GoEndPage));
        assert_eq!(remap_target("keyquit"), None);
    }
}
