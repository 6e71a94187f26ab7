//! Process settings read from the `edgepanelrc` file
//!
//! Settings are an explicit value handed to the panel on init and on every
//! reload. Nothing here is global.

use bitflags::bitflags;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::parser::{ConfigSource, ParseError};
use super::tree::{ConfigEntry, ConfigTree};
use crate::constants::{mouse, panel, paths};

bitflags! {
    /// Actions a mouse button triggers on the panel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MouseActions: u32 {
        const USE = 1 << 0;
        const DRAG = 1 << 1;
        const KILL = 1 << 2;
        const SHOW_DESKTOP = 1 << 3;
    }
}

impl MouseActions {
    pub const BUTTON1_DEFAULT: Self = Self::USE.union(Self::DRAG);
    pub const BUTTON2_DEFAULT: Self = Self::KILL;
    pub const BUTTON3_DEFAULT: Self = Self::SHOW_DESKTOP;

    fn from_word(word: &str) -> Self {
        match word {
            "use" => Self::USE,
            "drag" => Self::DRAG,
            "kill" => Self::KILL,
            "show-desktop" => Self::SHOW_DESKTOP,
            other => {
                warn!(action = other, "Unknown mouse button action, ignoring");
                Self::empty()
            }
        }
    }

    /// Parse the `mbuttonN` entry: absent means `default`, present without
    /// value means no actions at all.
    fn parse(entry: Option<&ConfigEntry<'_>>, default: Self) -> Self {
        match entry {
            None => default,
            Some(e) if e.value.is_none() => Self::empty(),
            Some(e) => e.words().map(Self::from_word).fold(Self::empty(), Self::union),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub theme: String,
    pub preferred_alternatives: Vec<String>,
    pub mbutton: [MouseActions; mouse::MAX_ACTION_BUTTON as usize],
    pub drag_threshold: i32,
    pub monitor: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: paths::DEFAULT_THEME.to_string(),
            preferred_alternatives: Vec::new(),
            mbutton: [
                MouseActions::BUTTON1_DEFAULT,
                MouseActions::BUTTON2_DEFAULT,
                MouseActions::BUTTON3_DEFAULT,
            ],
            drag_threshold: panel::DEFAULT_DRAG_THRESHOLD,
            monitor: 0,
        }
    }
}

impl Settings {
    pub fn from_tree(tree: &ConfigTree<'_>) -> Self {
        let root = tree.root();
        let defaults = Self::default();
        Self {
            theme: root
                .find_value("theme")
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .unwrap_or(defaults.theme),
            preferred_alternatives: root
                .find("preferred_alternatives")
                .map(|e| e.words().map(str::to_string).collect())
                .unwrap_or_default(),
            mbutton: [
                MouseActions::parse(root.find("mbutton1"), MouseActions::BUTTON1_DEFAULT),
                MouseActions::parse(root.find("mbutton2"), MouseActions::BUTTON2_DEFAULT),
                MouseActions::parse(root.find("mbutton3"), MouseActions::BUTTON3_DEFAULT),
            ],
            drag_threshold: root.parse_int("drag_threshold", defaults.drag_threshold),
            monitor: root
                .find_value("monitor")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.monitor),
        }
    }

    /// Default location of the settings file.
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(paths::APP_DIR);
        path.push(paths::SETTINGS_FILE);
        path
    }

    /// Load settings from `path`. A missing or empty file yields defaults;
    /// read and syntax errors are returned to the caller.
    pub fn load(path: &Path) -> Result<Self, ParseError> {
        let source = match ConfigSource::load(path) {
            Ok(source) => source,
            Err(ParseError::BadFile { .. }) => {
                info!(path = %path.display(), "No settings file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e),
        };
        match source.parse() {
            Ok(tree) => {
                let settings = Self::from_tree(&tree);
                debug!(settings = ?settings, "Loaded settings");
                Ok(settings)
            }
            Err(ParseError::EmptyFile) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Does `button` (1-based) carry any of the actions in `condition`?
    pub fn check_mbutton_condition(&self, button: u8, condition: MouseActions) -> bool {
        if (1..=mouse::MAX_ACTION_BUTTON).contains(&button) {
            self.mbutton[usize::from(button - 1)].intersects(condition)
        } else {
            false
        }
    }
}

/// Directories searched for a theme called `name`, in priority order.
pub fn theme_search_dirs(name: &str) -> Vec<PathBuf> {
    [dirs::config_dir(), dirs::data_dir()]
        .into_iter()
        .flatten()
        .map(|base| base.join(paths::APP_DIR).join(paths::THEMES_DIR).join(name))
        .collect()
}

/// Locate the theme file, preferring an explicit theme directory.
pub fn find_theme_file(explicit_dir: Option<&Path>, name: &str) -> Option<PathBuf> {
    if let Some(dir) = explicit_dir {
        return Some(dir.join(paths::THEME_FILE));
    }
    theme_search_dirs(name)
        .into_iter()
        .map(|dir| dir.join(paths::THEME_FILE))
        .find(|file| file.is_file())
}

/// Names of all installed themes, sorted and deduplicated.
pub fn list_themes() -> Vec<String> {
    let mut names: Vec<String> = [dirs::config_dir(), dirs::data_dir()]
        .into_iter()
        .flatten()
        .map(|base| base.join(paths::APP_DIR).join(paths::THEMES_DIR))
        .filter_map(|dir| std::fs::read_dir(dir).ok())
        .flat_map(|entries| entries.flatten())
        .filter(|entry| entry.path().join(paths::THEME_FILE).is_file())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names.dedup();
    names
}
