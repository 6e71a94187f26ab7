//! Application-wide constants
//!
//! This module contains the magic numbers and string literals used throughout
//! the panel, providing a single source of truth for constant values.

use std::time::Duration;

/// X11 protocol constants
pub mod x11 {
    /// `_NET_WM_DESKTOP` value meaning "all desktops"
    pub const ALL_DESKTOPS: u32 = 0xFFFF_FFFF;

    /// XDND protocol version advertised on the panel window
    pub const XDND_VERSION: u32 = 5;

    /// `_MOTIF_WM_HINTS` flag: the decorations field is meaningful
    pub const MWM_HINTS_DECORATIONS: u32 = 1 << 1;

    /// Number of fields in `_NET_WM_STRUT_PARTIAL`
    pub const STRUT_PARTIAL_LEN: usize = 12;

    /// Number of fields in the legacy `_NET_WM_STRUT`
    pub const STRUT_LEN: usize = 4;

    /// `WM_CLASS` value (instance + class, NUL separated)
    pub const WM_CLASS: &[u8] = b"panel\0edgepanel\0";
}

/// Mouse button constants
pub mod mouse {
    /// Highest button number that carries a configurable action mask
    pub const MAX_ACTION_BUTTON: u8 = 3;
}

/// Panel and layout limits
pub mod panel {
    /// Space always kept free for the fill widget
    pub const MIN_FILL_SIZE: i32 = 200;

    /// Configuration-time cap on widget instances per panel
    pub const MAX_WIDGETS: usize = 20;

    /// Default pointer travel before a press turns into a drag
    pub const DEFAULT_DRAG_THRESHOLD: i32 = 30;
}

/// Event loop timing
pub mod timing {
    use super::Duration;

    /// Period of the widget clock tick
    pub const TICK_INTERVAL: Duration = Duration::from_secs(1);
}

/// File and directory names
pub mod paths {
    /// Directory under XDG config/data dirs
    pub const APP_DIR: &str = "edgepanel";

    /// Settings file name inside the config directory
    pub const SETTINGS_FILE: &str = "edgepanelrc";

    /// Directory holding themes
    pub const THEMES_DIR: &str = "themes";

    /// Theme description file inside a theme directory
    pub const THEME_FILE: &str = "theme";

    /// Theme used when the settings don't name one
    pub const DEFAULT_THEME: &str = "default";
}
