//! Panel theme: the `panel` section of a theme file

use std::path::PathBuf;
use std::rc::Rc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{ConfigEntry, ConfigTree};
use crate::geometry::{Align, GeometrySpec, PanelPosition, PanelWidth};
use crate::image::{Image, ImageLoader};

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("failed to find 'panel' section in theme file")]
    MissingPanelSection,

    #[error("required image '{key}' is not set")]
    MissingImage { key: &'static str },

    #[error("failed to load image '{key}' from {}: {reason}", path.display())]
    Image {
        key: &'static str,
        path: PathBuf,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct PanelTheme {
    pub position: PanelPosition,
    pub background: Rc<Image>,
    pub separator: Option<Rc<Image>>,
    pub transparent: bool,
    pub align: Align,
    /// `None` means the background image's height
    pub height: Option<i32>,
    /// `None` means the full monitor width
    pub width: Option<PanelWidth>,
}

impl PanelTheme {
    pub fn load(tree: &ConfigTree<'_>, images: &dyn ImageLoader) -> Result<Self, ThemeError> {
        let panel = tree.find("panel").ok_or(ThemeError::MissingPanelSection)?;

        let background = load_image("background", panel, tree, images)?
            .ok_or(ThemeError::MissingImage { key: "background" })?;
        let separator = load_image("separator", panel, tree, images)?;

        let theme = Self {
            position: panel.find_value("position").map_or(PanelPosition::Top, parse_position),
            background,
            separator,
            transparent: panel.parse_bool("transparent"),
            align: panel.find_value("align").map_or(Align::Left, parse_align),
            height: panel.find_value("height").and_then(parse_height),
            width: panel.find_value("width").and_then(parse_width),
        };
        debug!(
            position = ?theme.position,
            align = ?theme.align,
            height = ?theme.height,
            width = ?theme.width,
            transparent = theme.transparent,
            "Loaded panel theme"
        );
        Ok(theme)
    }

    pub fn geometry(&self) -> GeometrySpec {
        GeometrySpec {
            position: self.position,
            align: self.align,
            height: self.height.unwrap_or_else(|| self.background.height()),
            width: self.width,
        }
    }

    pub fn separator_width(&self) -> i32 {
        self.separator.as_ref().map_or(0, |s| s.width())
    }
}

/// Load the image named by `entry.key`, resolved against the theme directory.
pub fn load_image(
    key: &'static str,
    entry: &ConfigEntry<'_>,
    tree: &ConfigTree<'_>,
    images: &dyn ImageLoader,
) -> Result<Option<Rc<Image>>, ThemeError> {
    let Some(value) = entry.find_value(key).map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    let path = tree.resolve_path(value);
    images
        .load(&path)
        .map(Some)
        .map_err(|e| ThemeError::Image {
            key,
            path,
            reason: format!("{e:#}"),
        })
}

pub fn parse_position(value: &str) -> PanelPosition {
    match value.trim() {
        "top" => PanelPosition::Top,
        "bottom" => PanelPosition::Bottom,
        other => {
            warn!(position = other, "Unknown position type, back to default 'top'");
            PanelPosition::Top
        }
    }
}

pub fn parse_align(value: &str) -> Align {
    match value.trim() {
        "left" => Align::Left,
        "center" => Align::Center,
        "right" => Align::Right,
        other => {
            warn!(align = other, "Unknown align type, back to default 'left'");
            Align::Left
        }
    }
}

fn is_auto(value: &str) -> bool {
    value.is_empty() || value.eq_ignore_ascii_case("auto") || value == "-1"
}

pub fn parse_height(value: &str) -> Option<i32> {
    let value = value.trim();
    if is_auto(value) {
        return None;
    }
    match value.parse::<i32>() {
        Ok(h) if h > 0 => Some(h),
        _ => {
            warn!(height = value, "Invalid panel height, using background height");
            None
        }
    }
}

pub fn parse_width(value: &str) -> Option<PanelWidth> {
    let value = value.trim();
    if is_auto(value) {
        return None;
    }
    let parsed = match value.strip_suffix('%') {
        Some(pct) => pct.trim().parse::<i32>().ok().map(PanelWidth::Percent),
        None => value.parse::<i32>().ok().map(PanelWidth::Pixels),
    };
    match parsed {
        Some(PanelWidth::Percent(p) | PanelWidth::Pixels(p)) if p > 0 => parsed,
        _ => {
            warn!(width = value, "Invalid panel width, using monitor width");
            None
        }
    }
}

/// Parse `RRGGBB` or `AARRGGBB` (optional `#`) into premultiplied ARGB.
pub fn parse_color(value: &str) -> Option<u32> {
    let hex = value.trim().trim_start_matches('#');
    let raw = u32::from_str_radix(hex, 16).ok()?;
    let argb = match hex.len() {
        6 => 0xFF00_0000 | raw,
        8 => raw,
        _ => return None,
    };
    let a = argb >> 24;
    let scale = |shift: u32| ((((argb >> shift) & 0xFF) * a + 127) / 255) << shift;
    Some((a << 24) | scale(16) | scale(8) | scale(0))
}
