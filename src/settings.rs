use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use crate::keymap::{KeyCombo, ViewerAction};

const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "fbvpdf";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Default DDI channel prefix; `-D` on the command line wins.
    #[serde(default)]
    pub ddi_prefix: Option<String>,

    /// Poll the channel every this many loop cycles.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u32,

    #[serde(default = "default_true")]
    pub heuristics: bool,

    #[serde(default = "default_true")]
    pub raise_on_hit: bool,

    #[serde(default)]
    pub invert: bool,

    #[serde(default = "default_window_width")]
    pub window_width: u32,

    #[serde(default = "default_window_height")]
    pub window_height: u32,

    /// Per-action key overrides applied on top of the default map;
    /// shift-derived variants follow their rebased base keys.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub keys: HashMap<ViewerAction, KeyCombo>,
}

fn default_true() -> bool {
    true
}

fn default_poll_interval() -> u32 {
    crate::shell::DEFAULT_POLL_INTERVAL
}

fn default_window_width() -> u32 {
    1280
}

fn default_window_height() -> u32 {
    720
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ddi_prefix: None,
            poll_interval: default_poll_interval(),
            heuristics: true,
            raise_on_hit: true,
            invert: false,
            window_width: default_window_width(),
            window_height: default_window_height(),
            keys: HashMap::new(),
        }
    }
}

fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

/// Load settings from the config dir, writing a defaulted file on first
/// run. Any failure falls back to defaults; configuration problems never
/// stop the viewer.
pub fn load_settings() -> Settings {
    let Some(path) = config_path() else {
        warn!("could not determine config directory, using default settings");
        return Settings::default();
    };
    if !path.exists() {
        info!("settings file not found, creating defaults at {path:?}");
        let settings = Settings::default();
        save_settings(&settings);
        return settings;
    }
    match fs::read_to_string(&path) {
        Ok(content) => match serde_yaml::from_str::<Settings>(&content) {
            Ok(settings) => {
                debug!("loaded settings from {path:?}");
                settings
            }
            Err(e) => {
                error!("failed to parse settings file {path:?}: {e}");
                Settings::default()
            }
        },
        Err(e) => {
            error!("failed to read settings file {path:?}: {e}");
            Settings::default()
        }
    }
}

pub fn save_settings(settings: &Settings) {
    let Some(path) = config_path() else {
        warn!("could not determine config directory, cannot save settings");
        return;
    };
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("failed to create config directory {parent:?}: {e}");
                return;
            }
        }
    }
    match serde_yaml::to_string(settings) {
        Ok(content) => match fs::write(&path, content) {
            Ok(()) => debug!("saved settings to {path:?}"),
            Err(e) => error!("failed to save settings to {path:?}: {e}"),
        },
        Err(e) => error!("failed to serialize settings: {e}"),
    }
}
