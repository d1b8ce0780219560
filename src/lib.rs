//! Remote-controllable schematic/PDF viewer core.
//!
//! The interesting parts live behind a plain library API so the whole
//! remote-control surface can be exercised without a window: the DDI
//! file-drop channel ([`ddi`]), the wire command parser ([`command`]), the
//! compound page-search engine ([`search`], [`engine`]) and the viewer
//! state machine ([`viewer`]) driven by the cooperative loop in [`shell`].

pub mod command;
pub mod ddi;
pub mod document;
pub mod engine;
pub mod keymap;
pub mod report;
pub mod search;
pub mod settings;
pub mod shell;
pub mod viewer;
