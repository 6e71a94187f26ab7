//! Panel placement and strut reservation
//!
//! Pure functions: monitor topology + theme geometry in, window rectangle and
//! `_NET_WM_STRUT_PARTIAL` vector out.

use tracing::{debug, warn};

use crate::constants::x11::STRUT_PARTIAL_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Monitor {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Monitor {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// `self` sits above `other` and the two share some horizontal span.
    pub fn is_above(&self, other: &Monitor) -> bool {
        let x = self.x.max(other.x);
        let x2 = self.right().min(other.right());
        x2 > x && self.y < other.y
    }
}

/// The virtual screen and the monitors it's made of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    pub width: i32,
    pub height: i32,
    pub monitors: Vec<Monitor>,
}

impl Screen {
    pub fn new(width: i32, height: i32, monitors: Vec<Monitor>) -> Self {
        Self {
            width,
            height,
            monitors,
        }
    }

    /// Monitors to place panels on; the whole screen when none are known.
    pub fn effective_monitors(&self) -> Vec<Monitor> {
        if self.monitors.is_empty() {
            vec![Monitor::new(0, 0, self.width, self.height)]
        } else {
            self.monitors.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanelPosition {
    #[default]
    Top,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelWidth {
    Pixels(i32),
    Percent(i32),
}

/// Geometry-relevant part of a panel theme, with the height already resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometrySpec {
    pub position: PanelPosition,
    pub align: Align,
    pub height: i32,
    pub width: Option<PanelWidth>,
}

/// `_NET_WM_STRUT_PARTIAL` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Strut(pub [i32; STRUT_PARTIAL_LEN]);

impl Strut {
    pub const LEFT: usize = 0;
    pub const RIGHT: usize = 1;
    pub const TOP: usize = 2;
    pub const BOTTOM: usize = 3;
    pub const TOP_START_X: usize = 8;
    pub const TOP_END_X: usize = 9;
    pub const BOTTOM_START_X: usize = 10;
    pub const BOTTOM_END_X: usize = 11;

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&v| v == 0)
    }

    /// Values as X11 CARDINALs.
    pub fn cardinals(&self) -> [u32; STRUT_PARTIAL_LEN] {
        self.0.map(|v| v.max(0) as u32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Placement {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    /// Index of the monitor actually used (out-of-range requests fall back to 0)
    pub monitor: usize,
    pub strut: Strut,
}

/// Compute the panel rectangle and its strut on monitor `monitor`.
pub fn place_panel(screen: &Screen, monitor: usize, spec: &GeometrySpec) -> Placement {
    let monitors = screen.effective_monitors();
    let monitor = if monitor >= monitors.len() {
        warn!(monitor, available = monitors.len(), "Monitor index out of range, using monitor 0");
        0
    } else {
        monitor
    };
    let mon = monitors[monitor];

    let height = spec.height;
    let mut x = mon.x;
    let mut y = mon.y;
    let mut width = mon.width;
    let mut strut = Strut::default();

    match spec.position {
        PanelPosition::Top => {
            strut.0[Strut::TOP] = y + height;
        }
        PanelPosition::Bottom => {
            y += mon.height - height;
            strut.0[Strut::BOTTOM] = screen.height - (mon.bottom() - height);
        }
    }

    if let Some(requested) = spec.width {
        width = match requested {
            PanelWidth::Percent(pct) => (mon.width as f32 / 100.0 * pct as f32) as i32,
            PanelWidth::Pixels(px) => px,
        }
        .min(mon.width);

        x += match spec.align {
            Align::Left => 0,
            Align::Center => (mon.width - width) / 2,
            Align::Right => mon.width - width,
        };
    }

    let (start, end) = match spec.position {
        PanelPosition::Top => (Strut::TOP_START_X, Strut::TOP_END_X),
        PanelPosition::Bottom => (Strut::BOTTOM_START_X, Strut::BOTTOM_END_X),
    };
    strut.0[start] = x;
    strut.0[end] = x + width - 1;

    if !strut_is_valid(&monitors, monitor, spec.position) {
        debug!(monitor, position = ?spec.position, "Another monitor lies beyond the panel edge, dropping strut");
        strut = Strut::default();
    }

    Placement {
        x,
        y,
        width,
        height,
        monitor,
        strut,
    }
}

/// A strut is only valid when no other monitor is stacked beyond the edge
/// the panel reserves.
///
/// Any pairwise overlap invalidates it, even when the conflicting monitor
/// isn't a direct neighbour.
pub fn strut_is_valid(monitors: &[Monitor], monitor: usize, position: PanelPosition) -> bool {
    let ours = &monitors[monitor];
    monitors
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != monitor)
        .all(|(_, other)| match position {
            PanelPosition::Top => !other.is_above(ours),
            PanelPosition::Bottom => !ours.is_above(other),
        })
}
