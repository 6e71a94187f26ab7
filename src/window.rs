//! The window-system seam
//!
//! The panel core talks to the display only through [`WindowSystem`]; the
//! X11 implementation lives in `x11_utils`, tests use an in-memory fake.

use anyhow::Result;
use std::time::Duration;

use crate::geometry::{Placement, Screen};

pub type WindowId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEvent {
    Press { button: u8, x: i32, y: i32 },
    Release { button: u8, x: i32, y: i32 },
    Motion { x: i32, y: i32 },
    Enter,
    Leave,
}

impl PointerEvent {
    /// Panel-relative x coordinate, when the event carries one.
    pub fn x(&self) -> Option<i32> {
        match *self {
            Self::Press { x, .. } | Self::Release { x, .. } | Self::Motion { x, .. } => Some(x),
            Self::Enter | Self::Leave => None,
        }
    }
}

/// Display events, already sorted into the categories the panel reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelEvent {
    Expose { window: WindowId },
    /// The root window was reconfigured (possibly a resolution change)
    RootConfigured { width: i32, height: i32 },
    /// The desktop background property on the root window changed
    RootBackgroundChanged,
    Pointer { window: WindowId, event: PointerEvent },
    /// Anything the core doesn't handle
    Other,
}

pub trait WindowSystem {
    /// Current screen size and monitor layout.
    fn screen(&self) -> &Screen;

    /// Re-read monitor information after the root window changed size.
    fn refresh_screen(&mut self, width: i32, height: i32) -> Result<()>;

    /// Create the docked panel window with its strut, type, desktop and
    /// size-hint metadata. The window is not mapped yet.
    fn create_panel_window(&mut self, placement: &Placement) -> Result<WindowId>;

    /// Move/resize the panel window and refresh struts and size hints.
    fn update_panel_window(&mut self, window: WindowId, placement: &Placement) -> Result<()>;

    fn map_window(&mut self, window: WindowId) -> Result<()>;

    fn destroy_window(&mut self, window: WindowId) -> Result<()>;

    /// Put premultiplied ARGB pixels at (`x`, `y`) inside `window`.
    fn put_image(
        &mut self,
        window: WindowId,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        pixels: &[u32],
    ) -> Result<()>;

    /// Pixels of the desktop background under a screen rectangle, if the
    /// desktop publishes one.
    fn root_background(&mut self, x: i32, y: i32, width: i32, height: i32) -> Result<Option<Vec<u32>>>;

    /// Broadcast `_NET_SHOWING_DESKTOP`.
    fn set_showing_desktop(&mut self, showing: bool) -> Result<()>;

    /// Next already-received event, without blocking.
    fn poll_event(&mut self) -> Result<Option<PanelEvent>>;

    /// Block until the display has data or `timeout` passes. Returns `true`
    /// when there is something to read. Events already queued client-side
    /// don't wake this up; drain [`WindowSystem::poll_event`] first.
    fn wait_readable(&mut self, timeout: Duration) -> Result<bool>;

    fn flush(&mut self) -> Result<()>;
}
