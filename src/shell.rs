//! The cooperative run loop.
//!
//! A single thread owns the viewer state, the document engine and the DDI
//! channel. Key events from the embedding layer come in through
//! [`ViewerShell::key`], remote commands through the throttled channel
//! poll. Everything a state transition wants done comes back as an
//! [`Effect`] and is executed here, in order.

use std::path::Path;
use std::thread;
use std::time::Duration;

use log::{debug, info, warn, LevelFilter};

use crate::command::parse_payload;
use crate::ddi::DdiChannel;
use crate::document::{DocumentEngine, DocumentError};
use crate::engine::{advance_search, headless_scan, SearchOutcome};
use crate::keymap::KeyCombo;
use crate::report;
use crate::viewer::{Effect, ViewerState};

/// The channel is polled once every this many loop cycles.
pub const DEFAULT_POLL_INTERVAL: u32 = 5;
const CYCLE_SLEEP: Duration = Duration::from_millis(20);

/// Produces a fresh engine for a runtime `!load:`.
pub type EngineLoader =
    Box<dyn Fn(&Path) -> Result<Box<dyn DocumentEngine>, DocumentError>>;

pub struct ViewerShell {
    pub viewer: ViewerState,
    doc: Box<dyn DocumentEngine>,
    loader: EngineLoader,
    pub ddi: DdiChannel,
    poll_interval: u32,
    cycle: u32,
    running: bool,
}

impl ViewerShell {
    pub fn new(doc: Box<dyn DocumentEngine>, loader: EngineLoader, ddi: DdiChannel) -> Self {
        let mut viewer = ViewerState::new();
        viewer.set_document(doc.page_count());
        Self {
            viewer,
            doc,
            loader,
            ddi,
            poll_interval: DEFAULT_POLL_INTERVAL,
            cycle: 0,
            running: true,
        }
    }

    pub fn set_poll_interval(&mut self, cycles: u32) {
        self.poll_interval = cycles.max(1);
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// One loop cycle without the sleep; the channel is only consulted on
    /// every `poll_interval`-th call.
    pub fn step(&mut self) {
        self.cycle = self.cycle.wrapping_add(1);
        if self.cycle % self.poll_interval != 0 {
            return;
        }
        match self.ddi.pickup() {
            Ok(Some(payload)) => self.process_payload(&payload),
            Ok(None) => {}
            Err(err) => warn!("channel pickup failed: {err}"),
        }
    }

    /// Block until shutdown. Remote-control only; an embedding layer with
    /// its own event loop calls [`step`](Self::step) and
    /// [`key`](Self::key) instead.
    pub fn run(&mut self) {
        while self.running {
            self.step();
            thread::sleep(CYCLE_SLEEP);
        }
    }

    /// Feed a keypress from the embedding layer.
    pub fn key(&mut self, combo: KeyCombo) {
        for effect in self.viewer.keypress(combo) {
            self.execute(effect);
        }
    }

    /// Decode and apply a whole payload. Marker order is preserved and
    /// per-payload configuration defaults are restored up front.
    pub fn process_payload(&mut self, payload: &str) {
        debug!("processing payload ({} bytes)", payload.len());
        self.viewer.begin_payload();
        for cmd in parse_payload(payload) {
            for effect in self.viewer.apply_command(cmd) {
                self.execute(effect);
            }
        }
    }

    fn dispatch(&mut self, payload: &str) {
        if self.viewer.detached {
            debug!("detached, dropping reply {payload:?}");
            return;
        }
        if let Err(err) = self.ddi.dispatch(payload) {
            warn!("reply dispatch failed: {err}");
        }
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::Dispatch(payload) => self.dispatch(&payload),

            Effect::RunSearch => {
                let outcome = advance_search(
                    &mut self.viewer.search,
                    &mut self.viewer.prior_search,
                    self.doc.as_ref(),
                    &self.viewer.compound,
                    self.viewer.canvas,
                    self.viewer.heuristics,
                );
                match outcome {
                    SearchOutcome::Jump { page, x, y } => {
                        self.viewer.jump_to_page_xy(page as i32, x, y);
                        if self.viewer.raise_on_hit {
                            debug!("raising window on search hit");
                        }
                    }
                    SearchOutcome::NotFound => {
                        info!("no match for '{}'", self.viewer.prior_search.a);
                    }
                    SearchOutcome::WrapStop
                    | SearchOutcome::InPage(_)
                    | SearchOutcome::Inactive => {}
                }
            }

            Effect::RunHeadless => {
                let count = headless_scan(
                    &mut self.viewer.search,
                    self.doc.as_ref(),
                    &self.viewer.compound,
                );
                info!("headless scan found {count} hit(s)");
                self.dispatch(&report::headless_hits(count));
                self.running = false;
            }

            Effect::LoadDocument(path) => match (self.loader)(&path) {
                Ok(doc) => {
                    self.doc = doc;
                    self.viewer.search.clear();
                    self.viewer.set_document(self.doc.page_count());
                    info!(
                        "loaded {} ({} pages)",
                        path.display(),
                        self.viewer.page_count
                    );
                }
                Err(err) => self.viewer.set_load_error(&path, &err),
            },

            Effect::ApplyWindowGeometry => {
                // The windowing layer, when present, picks the new
                // geometry up from the viewer state on its next frame.
                debug!(
                    "window geometry now {}x{} at ({}, {})",
                    self.viewer.win_w, self.viewer.win_h, self.viewer.win_x, self.viewer.win_y
                );
            }

            Effect::SetStrictMatch(strict) => self.doc.set_strict_match(strict),

            Effect::RaiseLogLevel => {
                log::set_max_level(LevelFilter::Debug);
                info!("log level raised to debug");
            }

            Effect::Shutdown => {
                info!("shutting down");
                self.running = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddi::DdiRole;
    use crate::document::TextDocument;

    fn loader() -> EngineLoader {
        Box::new(|path| Ok(Box::new(TextDocument::open(path)?)))
    }

    fn shell_with_text(text: &str) -> ViewerShell {
        let doc = Box::new(TextDocument::from_text(text));
        ViewerShell::new(doc, loader(), DdiChannel::new())
    }

    #[test]
    fn payload_search_jumps_to_hit() {
        let mut shell = shell_with_text("intro\u{c}more\u{c}the U15 part");
        shell.process_payload("!search:U15");
        assert_eq!(shell.viewer.current_page, 2);
        assert!(shell.viewer.search.has_hits);
    }

    #[test]
    fn headless_payload_replies_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("link");

        let mut peer = DdiChannel::new();
        peer.configure(&prefix);
        peer.set_role(DdiRole::Initiator);

        let mut chan = DdiChannel::new();
        chan.configure(&prefix);
        chan.set_role(DdiRole::Responder);

        let doc = Box::new(TextDocument::from_text("x\u{c}U15 and U15"));
        let mut shell = ViewerShell::new(doc, loader(), chan);
        shell.process_payload("!headless:!compsearch:U15");

        assert!(!shell.is_running());
        assert_eq!(peer.pickup().unwrap().as_deref(), Some("!headlessHits:2"));
    }

    #[test]
    fn channel_poll_is_throttled() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("link");

        let mut peer = DdiChannel::new();
        peer.configure(&prefix);
        peer.set_role(DdiRole::Initiator);
        peer.dispatch("!gotopg:3").unwrap();

        let mut chan = DdiChannel::new();
        chan.configure(&prefix);
        chan.set_role(DdiRole::Responder);

        let doc = Box::new(TextDocument::from_text("a\u{c}b\u{c}c\u{c}d"));
        let mut shell = ViewerShell::new(doc, loader(), chan);

        for _ in 0..DEFAULT_POLL_INTERVAL - 1 {
            shell.step();
            assert_eq!(shell.viewer.current_page, 0);
        }
        shell.step();
        assert_eq!(shell.viewer.current_page, 2);
    }

    #[test]
    fn runtime_load_failure_is_visible_not_fatal() {
        let mut shell = shell_with_text("page one");
        shell.process_payload("!load:/no/such/file.pdf");
        assert!(shell.is_running());
        assert!(shell.viewer.load_error.is_some());
        // The old document stays usable.
        assert_eq!(shell.viewer.page_count, 1);
    }

    #[test]
    fn runtime_load_swaps_the_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("next.txt");
        std::fs::write(&path, "one\u{c}two\u{c}three").unwrap();

        let mut shell = shell_with_text("single page");
        shell.process_payload(&format!("!load:{}\r\n", path.display()));
        assert_eq!(shell.viewer.page_count, 3);
        assert!(shell.viewer.load_error.is_none());
    }

    #[test]
    fn detached_shell_swallows_replies() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("link");

        let mut peer = DdiChannel::new();
        peer.configure(&prefix);
        peer.set_role(DdiRole::Initiator);

        let mut chan = DdiChannel::new();
        chan.configure(&prefix);
        chan.set_role(DdiRole::Responder);

        let mut shell = ViewerShell::new(
            Box::new(TextDocument::from_text("x")),
            loader(),
            chan,
        );
        shell.process_payload("!detached:!getstats:");
        assert_eq!(peer.pickup().unwrap(), None);
    }
}
