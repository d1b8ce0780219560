//! Viewer state management.
//!
//! Wire commands and keypresses both normalize into state mutations that
//! return [`Effect`]s for the shell to execute. The state itself never
//! touches the DDI channel or the document engine, which keeps every
//! transition testable in isolation.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::command::Command;
use crate::engine::CanvasMetrics;
use crate::keymap::{KeyCombo, Keymap, ViewerAction, KEY_ESCAPE};
use crate::report;
use crate::search::{CompoundConfig, SearchState};

const HISTORY_CAP: usize = 256;
const ZOOM_MIN: f32 = 18.0;
const ZOOM_MAX: f32 = 500.0;

/// Remote shutdown is ignored during the first moments of a run so a
/// stale `!quit:` left over from a previous session cannot kill a viewer
/// that just started.
const QUIT_GUARD: Duration = Duration::from_secs(2);

/// A navigation bookmark: page plus scroll position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mark {
    pub page: i32,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    #[default]
    Interactive,
    Headless,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FitMode {
    #[default]
    None,
    Window,
    Width,
    Height,
}

/// Effects produced by state changes. The shell owns the channel, the
/// document and the process, so anything touching those comes out as data.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Send a reply payload over the DDI channel.
    Dispatch(String),
    /// Drive the directional scan for the current search state.
    RunSearch,
    /// Run the single-shot compound scan and report the count.
    RunHeadless,
    /// Swap in a new document.
    LoadDocument(PathBuf),
    /// Window geometry changed; push it to the windowing layer.
    ApplyWindowGeometry,
    /// Forward the match-strictness flag to the document engine.
    SetStrictMatch(bool),
    /// `!debug:` arrived; raise the log level.
    RaiseLogLevel,
    /// Leave the run loop.
    Shutdown,
}

#[derive(Debug)]
pub struct ViewerState {
    started: Instant,
    pub run_mode: RunMode,

    pub win_x: i32,
    pub win_y: i32,
    pub win_w: u32,
    pub win_h: u32,
    pub canvas: CanvasMetrics,
    pub rotation: i32,
    pub fit: FitMode,

    pub invert: bool,
    pub scroll_swap: bool,
    pub raise_on_hit: bool,
    pub detached: bool,
    pub heuristics: bool,
    pub strict_match: bool,

    pub compound: CompoundConfig,
    pub search: SearchState,
    pub prior_search: SearchState,
    pub keymap: Keymap,

    pub current_page: i32,
    pub scroll_x: f32,
    pub scroll_y: f32,
    pub page_count: usize,
    /// A failed runtime `!load:` lands here instead of killing the process.
    pub load_error: Option<String>,

    history: VecDeque<Mark>,
    future: VecDeque<Mark>,
}

impl Default for ViewerState {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewerState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            run_mode: RunMode::default(),
            win_x: 0,
            win_y: 0,
            win_w: 1280,
            win_h: 720,
            canvas: CanvasMetrics::default(),
            rotation: 0,
            fit: FitMode::default(),
            invert: false,
            scroll_swap: false,
            raise_on_hit: true,
            detached: false,
            heuristics: true,
            strict_match: false,
            compound: CompoundConfig::default(),
            search: SearchState::default(),
            prior_search: SearchState::default(),
            keymap: Keymap::default(),
            current_page: 0,
            scroll_x: 0.0,
            scroll_y: 0.0,
            page_count: 0,
            load_error: None,
            history: VecDeque::new(),
            future: VecDeque::new(),
        }
    }

    #[cfg(test)]
    fn with_uptime(uptime: Duration) -> Self {
        let mut state = Self::new();
        if let Some(started) = Instant::now().checked_sub(uptime) {
            state.started = started;
        }
        state
    }

    pub fn set_document(&mut self, page_count: usize) {
        self.page_count = page_count;
        self.current_page = self.clamp_page(self.current_page);
        self.load_error = None;
    }

    fn clamp_page(&self, page: i32) -> i32 {
        page.clamp(0, self.page_count.saturating_sub(1) as i32)
    }

    /// The sender's configuration markers are per-request: radius and
    /// highlight fall back to their defaults before each payload.
    pub fn begin_payload(&mut self) {
        self.compound = CompoundConfig::default();
    }

    fn mark(&self) -> Mark {
        Mark {
            page: self.current_page,
            x: self.scroll_x,
            y: self.scroll_y,
        }
    }

    fn push_history(&mut self) {
        if self.history.len() == HISTORY_CAP {
            self.history.pop_front();
        }
        self.history.push_back(self.mark());
    }

    fn push_future(&mut self) {
        if self.future.len() == HISTORY_CAP {
            self.future.pop_front();
        }
        self.future.push_back(self.mark());
    }

    /// Move to a page and scroll position, bracketing the move with
    /// history pushes. Any redo trail is invalidated.
    pub fn jump_to_page_xy(&mut self, page: i32, x: f32, y: f32) {
        self.future.clear();
        self.push_history();
        self.current_page = self.clamp_page(page);
        self.scroll_x = x;
        self.scroll_y = y;
        self.push_history();
        debug!("jumped to page {} at ({x}, {y})", self.current_page + 1);
    }

    /// Pop marks until one leaves the current page, then go there.
    fn pop_history(&mut self) {
        while let Some(mark) = self.history.pop_back() {
            if mark.page == self.current_page {
                continue;
            }
            self.push_future();
            self.current_page = self.clamp_page(mark.page);
            self.scroll_x = mark.x;
            self.scroll_y = mark.y;
            return;
        }
    }

    fn pop_future(&mut self) {
        while let Some(mark) = self.future.pop_back() {
            if mark.page == self.current_page {
                continue;
            }
            self.push_history();
            self.current_page = self.clamp_page(mark.page);
            self.scroll_x = mark.x;
            self.scroll_y = mark.y;
            return;
        }
    }

    #[must_use]
    pub fn history_depth(&self) -> usize {
        self.history.len()
    }

    /// Apply one decoded wire command and return resulting effects.
    #[must_use]
    pub fn apply_command(&mut self, cmd: Command) -> Vec<Effect> {
        match cmd {
            Command::Debug => vec![Effect::RaiseLogLevel],

            Command::Headless => {
                self.run_mode = RunMode::Headless;
                vec![]
            }

            Command::CsRadius(r) => {
                self.compound.set_radius(r);
                vec![]
            }

            Command::CsHighlight(h) => {
                self.compound.set_highlight(h);
                vec![]
            }

            Command::SetWindowSize { w, h } => {
                self.win_w = w;
                self.win_h = h;
                vec![Effect::ApplyWindowGeometry]
            }

            Command::SetWindowSizePos { w, h, x, y } => {
                self.win_w = w;
                self.win_h = h;
                self.win_x = x;
                self.win_y = y;
                vec![Effect::ApplyWindowGeometry]
            }

            Command::GetWindowSizePos => {
                vec![Effect::Dispatch(report::window_info(
                    self.win_x, self.win_y, self.win_w, self.win_h,
                ))]
            }

            Command::SearchNext => self.apply_action(ViewerAction::SearchNext),
            Command::SearchPrev => self.apply_action(ViewerAction::SearchPrev),
            Command::SearchPageNext => self.apply_action(ViewerAction::SearchPageNext),
            Command::SearchPagePrev => self.apply_action(ViewerAction::SearchPagePrev),

            Command::GotoPage(n) => {
                self.search.clear();
                self.jump_to_page_xy(n - 1, 0.0, 0.0);
                vec![]
            }

            Command::GetStats => {
                self.search.clear();
                vec![Effect::Dispatch(report::page_stats(
                    self.current_page as usize,
                ))]
            }

            Command::Quit => {
                if self.started.elapsed() < QUIT_GUARD {
                    info!("ignoring quit request during startup guard");
                    vec![]
                } else {
                    vec![Effect::Shutdown]
                }
            }

            Command::ColorInvert => {
                self.invert = !self.invert;
                vec![]
            }

            Command::ScrollSwap => {
                self.scroll_swap = !self.scroll_swap;
                vec![]
            }

            Command::Raise(on) => {
                self.raise_on_hit = on;
                vec![]
            }

            Command::Detached => {
                self.detached = true;
                vec![]
            }

            Command::Load(path) => vec![Effect::LoadDocument(path)],

            Command::Remap { action, combo } => {
                self.keymap.rebind(action, combo);
                self.keymap.derive_shifted();
                vec![]
            }

            Command::Heuristics(on) => {
                self.heuristics = on;
                vec![]
            }

            Command::StrictMatch(on) => {
                self.strict_match = on;
                vec![Effect::SetStrictMatch(on)]
            }

            Command::PageSearch(term) => {
                let raw = format!("!pagesearch:{term}");
                self.search.begin_inpage(&raw, &term, self.current_page);
                vec![Effect::RunSearch]
            }

            Command::Search(term) => {
                // A repeated identical request steps through the hits
                // instead of restarting the scan.
                if term == self.search.a && self.search.has_hits && !self.search.not_found {
                    return self.apply_action(ViewerAction::SearchNext);
                }
                let raw = format!("!search:{term}");
                // A fresh wire search always scans from the front of the
                // document, wherever the viewer is parked.
                self.search.begin_normal(&raw, &term);
                vec![Effect::RunSearch]
            }

            Command::CompSearch(spec) => {
                let raw = format!("!compsearch:{spec}");
                self.search.begin_compound(&raw, &spec);
                self.search.page = 0;
                if self.run_mode == RunMode::Headless {
                    vec![Effect::RunHeadless]
                } else {
                    vec![Effect::RunSearch]
                }
            }
        }
    }

    /// Translate a keypress through the keymap. ESC always clears the
    /// search state, bound or not.
    #[must_use]
    pub fn keypress(&mut self, combo: KeyCombo) -> Vec<Effect> {
        if combo.key == KEY_ESCAPE {
            self.search.clear();
            return vec![];
        }
        match self.keymap.lookup(combo) {
            Some(action) => self.apply_action(action),
            None => vec![],
        }
    }

    /// Apply a logical action and return resulting effects.
    #[must_use]
    pub fn apply_action(&mut self, action: ViewerAction) -> Vec<Effect> {
        match action {
            ViewerAction::Search | ViewerAction::GoPage | ViewerAction::Paste => {
                // These open interactive input owned by the rendering
                // layer; nothing to do at the state level.
                debug!("action {action:?} needs interactive input, skipping");
                vec![]
            }

            ViewerAction::Help => vec![],

            ViewerAction::SearchNext => self.step_search(1, false),
            ViewerAction::SearchPrev => self.step_search(-1, false),
            ViewerAction::SearchPageNext => self.step_search(1, true),
            ViewerAction::SearchPagePrev => self.step_search(-1, true),

            ViewerAction::PageUp => {
                self.jump_to_page_xy(self.current_page - 1, 0.0, 0.0);
                vec![]
            }
            ViewerAction::PageDown => {
                self.jump_to_page_xy(self.current_page + 1, 0.0, 0.0);
                vec![]
            }
            ViewerAction::PageUp10 => {
                self.jump_to_page_xy(self.current_page - 10, 0.0, 0.0);
                vec![]
            }
            ViewerAction::PageDown10 => {
                self.jump_to_page_xy(self.current_page + 10, 0.0, 0.0);
                vec![]
            }
            ViewerAction::GoEndPage => {
                self.jump_to_page_xy(self.page_count.saturating_sub(1) as i32, 0.0, 0.0);
                vec![]
            }

            ViewerAction::ZoomIn => {
                self.canvas.zoom = (self.canvas.zoom * 1.25).min(ZOOM_MAX);
                vec![]
            }
            ViewerAction::ZoomOut => {
                self.canvas.zoom = (self.canvas.zoom / 1.25).max(ZOOM_MIN);
                vec![]
            }

            ViewerAction::RotateCw => {
                self.rotation = (self.rotation + 90) % 360;
                vec![]
            }
            ViewerAction::RotateCcw => {
                self.rotation = (self.rotation + 270) % 360;
                vec![]
            }

            ViewerAction::PanUp => {
                self.scroll_y -= self.pan_step();
                vec![]
            }
            ViewerAction::PanDown => {
                self.scroll_y += self.pan_step();
                vec![]
            }
            ViewerAction::PanLeft => {
                self.scroll_x -= self.pan_step();
                vec![]
            }
            ViewerAction::PanRight => {
                self.scroll_x += self.pan_step();
                vec![]
            }

            ViewerAction::FitWindow => {
                self.fit = FitMode::Window;
                vec![]
            }
            ViewerAction::FitWidth => {
                self.fit = FitMode::Width;
                vec![]
            }
            ViewerAction::FitHeight => {
                self.fit = FitMode::Height;
                vec![]
            }

            ViewerAction::Back => {
                self.pop_history();
                vec![]
            }
            ViewerAction::Forward => {
                self.pop_future();
                vec![]
            }

            ViewerAction::Quit => {
                if self.started.elapsed() < QUIT_GUARD {
                    info!("ignoring quit during startup guard");
                    vec![]
                } else {
                    vec![Effect::Shutdown]
                }
            }
        }
    }

    fn pan_step(&self) -> f32 {
        if self.scroll_swap { -24.0 } else { 24.0 }
    }

    /// Shared next/prev machinery. `page_step` skips the rest of the
    /// current page's hits and moves whole pages.
    fn step_search(&mut self, direction: i32, page_step: bool) -> Vec<Effect> {
        if self.search.a.is_empty() {
            debug!("search step with no active term");
            return vec![];
        }
        self.search.direction = direction;
        self.search.not_found = false;

        let within_page = !page_step
            && !self.search.hits.is_empty()
            && if direction == 1 {
                (self.search.inpage_index + 1) < self.search.hits.len() as i32
            } else {
                self.search.inpage_index > 0
            };

        if within_page {
            self.search.inpage_index += direction;
        } else {
            // A whole-page step backward lands on the page's first-ranked
            // hit; everything else leaves the choice to the scan.
            self.search.inpage_index = if page_step && direction == -1 { 0 } else { -1 };
            self.search.page += direction;
            if self.search.page >= self.page_count as i32 {
                self.search.page = 0;
            } else if self.search.page < 0 {
                self.search.page = self.page_count.saturating_sub(1) as i32;
            }
        }
        self.search.mode = match self.search.mode {
            crate::search::SearchMode::None => crate::search::SearchMode::Normal,
            m => m,
        };
        self.search.active = true;
        vec![Effect::RunSearch]
    }

    /// A runtime load failure becomes visible state, never an exit.
    pub fn set_load_error(&mut self, path: &std::path::Path, err: &dyn std::fmt::Display) {
        warn!("failed to load {}: {err}", path.display());
        self.load_error = Some(format!("cannot open {}: {err}", path.display()));
    }
}
