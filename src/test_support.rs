//! In-memory collaborators for unit tests

use anyhow::{anyhow, Result};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::path::Path;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::canvas::DrawContext;
use crate::config::ConfigEntry;
use crate::geometry::{Monitor, Placement, Screen};
use crate::image::{Image, ImageLoader};
use crate::layout::SizeType;
use crate::theme::parse_color;
use crate::widget::{WidgetContext, WidgetInterface, WidgetPrivate, WidgetRegistry};
use crate::window::{PanelEvent, PointerEvent, WindowId, WindowSystem};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutRecord {
    pub window: WindowId,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub pixels: Vec<u32>,
}

#[derive(Debug)]
pub struct FakeWindowSystem {
    pub screen: Screen,
    /// Screen reported after the next `refresh_screen`
    pub next_screen: Option<Screen>,
    /// Solid desktop background colour, `None` when no pixmap is published
    pub root_pixels: Option<u32>,
    pub events: VecDeque<PanelEvent>,
    pub created: Vec<Placement>,
    pub updated: Vec<Placement>,
    pub mapped: Vec<WindowId>,
    pub destroyed: Vec<WindowId>,
    pub puts: Vec<PutRecord>,
    pub showing_desktop: Vec<bool>,
    pub flushes: usize,
    /// Make `update_panel_window` fail
    pub fail_updates: bool,
    /// Events still queued each time the caller blocked in `wait_readable`
    pub waits: Vec<usize>,
    /// Raised by the first `wait_readable`
    pub quit_on_wait: Option<Arc<AtomicBool>>,
    next_window: WindowId,
}

impl FakeWindowSystem {
    pub fn new(screen: Screen) -> Self {
        Self {
            screen,
            next_screen: None,
            root_pixels: None,
            events: VecDeque::new(),
            created: Vec::new(),
            updated: Vec::new(),
            mapped: Vec::new(),
            destroyed: Vec::new(),
            puts: Vec::new(),
            showing_desktop: Vec::new(),
            flushes: 0,
            fail_updates: false,
            waits: Vec::new(),
            quit_on_wait: None,
            next_window: 1,
        }
    }

    /// One 1000x800 monitor.
    pub fn single() -> Self {
        Self::new(Screen::new(1000, 800, vec![Monitor::new(0, 0, 1000, 800)]))
    }
}

impl WindowSystem for FakeWindowSystem {
    fn screen(&self) -> &Screen {
        &self.screen
    }

    fn refresh_screen(&mut self, width: i32, height: i32) -> Result<()> {
        self.screen = self
            .next_screen
            .take()
            .unwrap_or_else(|| Screen::new(width, height, vec![Monitor::new(0, 0, width, height)]));
        Ok(())
    }

    fn create_panel_window(&mut self, placement: &Placement) -> Result<WindowId> {
        let window = self.next_window;
        self.next_window += 1;
        self.created.push(*placement);
        Ok(window)
    }

    fn update_panel_window(&mut self, window: WindowId, placement: &Placement) -> Result<()> {
        if self.fail_updates {
            return Err(anyhow!("BadWindow for window {window}"));
        }
        self.updated.push(*placement);
        Ok(())
    }

    fn map_window(&mut self, window: WindowId) -> Result<()> {
        self.mapped.push(window);
        Ok(())
    }

    fn destroy_window(&mut self, window: WindowId) -> Result<()> {
        self.destroyed.push(window);
        Ok(())
    }

    fn put_image(
        &mut self,
        window: WindowId,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        pixels: &[u32],
    ) -> Result<()> {
        self.puts.push(PutRecord {
            window,
            x,
            y,
            width,
            height,
            pixels: pixels.to_vec(),
        });
        Ok(())
    }

    fn root_background(&mut self, _x: i32, _y: i32, width: i32, height: i32) -> Result<Option<Vec<u32>>> {
        Ok(self
            .root_pixels
            .map(|argb| vec![argb; (width * height).max(0) as usize]))
    }

    fn set_showing_desktop(&mut self, showing: bool) -> Result<()> {
        self.showing_desktop.push(showing);
        Ok(())
    }

    fn poll_event(&mut self) -> Result<Option<PanelEvent>> {
        Ok(self.events.pop_front())
    }

    fn wait_readable(&mut self, _timeout: Duration) -> Result<bool> {
        self.waits.push(self.events.len());
        if let Some(quit) = &self.quit_on_wait {
            quit.store(true, Ordering::Relaxed);
        }
        Ok(!self.events.is_empty())
    }

    fn flush(&mut self) -> Result<()> {
        self.flushes += 1;
        Ok(())
    }
}

/// Solid images sized by file name: `sep*` files are separators, anything
/// with `missing` in the path fails to load.
#[derive(Debug, Default)]
pub struct FakeImageLoader;

impl FakeImageLoader {
    pub const WIDTH: i32 = 4;
    pub const HEIGHT: i32 = 24;
    pub const SEPARATOR_WIDTH: i32 = 2;
    pub const BACKGROUND: u32 = 0xFF202020;
    pub const SEPARATOR: u32 = 0xFFFFFFFF;
}

impl ImageLoader for FakeImageLoader {
    fn load(&self, path: &Path) -> Result<Rc<Image>> {
        let name = path.to_string_lossy();
        if name.contains("missing") {
            return Err(anyhow!("no such image: {}", name));
        }
        let file = path.file_name().map(|f| f.to_string_lossy().into_owned()).unwrap_or_default();
        let image = if file.starts_with("sep") {
            Image::solid(Self::SEPARATOR_WIDTH, Self::HEIGHT, Self::SEPARATOR)
        } else if file.starts_with("bg") {
            Image::solid(Self::WIDTH, Self::HEIGHT, Self::BACKGROUND)
        } else {
            Image::solid(Self::WIDTH, Self::HEIGHT, 0xFF00FF00)
        };
        Ok(Rc::new(image))
    }
}

/// Lifecycle notes recorded by the instrumented widgets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lifecycle {
    Created(u32),
    Rethemed(u32),
    Reconfigured(u32),
    Ticked(u32),
    Pointer(u32, PointerEvent),
    Destroyed(u32),
}

thread_local! {
    static NEXT_ID: Cell<u32> = const { Cell::new(1) };
    static JOURNAL: RefCell<Vec<Lifecycle>> = const { RefCell::new(Vec::new()) };
}

fn note(event: Lifecycle) {
    JOURNAL.with(|j| j.borrow_mut().push(event));
}

/// Drain everything the instrumented widgets recorded on this thread.
pub fn take_journal() -> Vec<Lifecycle> {
    JOURNAL.with(|j| std::mem::take(&mut *j.borrow_mut()))
}

pub fn count(journal: &[Lifecycle], pred: impl Fn(&Lifecycle) -> bool) -> usize {
    journal.iter().filter(|e| pred(e)).count()
}

/// Instrumented capability.
///
/// Entry keys: `width`, `color`, `fail_create`, `fail_retheme`, `ticks`
/// (dirty on every clock tick), `dirty_on_pointer`.
pub struct TestWidget {
    name: &'static str,
    size_type: SizeType,
    retheme: bool,
}

pub static FILL: TestWidget = TestWidget {
    name: "fill",
    size_type: SizeType::Fill,
    retheme: true,
};

pub static BOX: TestWidget = TestWidget {
    name: "box",
    size_type: SizeType::Constant,
    retheme: true,
};

/// Constant widget without in-place retheme
pub static STATIC_BOX: TestWidget = TestWidget {
    name: "static",
    size_type: SizeType::Constant,
    retheme: false,
};

pub fn test_registry() -> WidgetRegistry {
    let mut registry = WidgetRegistry::new();
    registry.register(&FILL);
    registry.register(&BOX);
    registry.register(&STATIC_BOX);
    registry
}

pub struct TestState {
    pub id: u32,
    width: i32,
    color: Option<u32>,
    ticks: bool,
    dirty_on_pointer: bool,
}

impl TestState {
    fn apply(&mut self, entry: &ConfigEntry<'_>) {
        self.width = entry.parse_int("width", 10);
        self.color = entry.find_value("color").and_then(parse_color);
        self.ticks = entry.parse_bool("ticks");
        self.dirty_on_pointer = entry.parse_bool("dirty_on_pointer");
    }
}

impl WidgetInterface for TestWidget {
    fn theme_name(&self) -> &'static str {
        self.name
    }

    fn size_type(&self) -> SizeType {
        self.size_type
    }

    fn create(&self, entry: &ConfigEntry<'_>, _ctx: &WidgetContext<'_, '_>) -> Result<Box<dyn WidgetPrivate>> {
        if entry.parse_bool("fail_create") {
            return Err(anyhow!("{} refused to be created", self.name));
        }
        let id = NEXT_ID.with(|n| {
            let id = n.get();
            n.set(id + 1);
            id
        });
        let mut state = TestState {
            id,
            width: 0,
            color: None,
            ticks: false,
            dirty_on_pointer: false,
        };
        state.apply(entry);
        note(Lifecycle::Created(id));
        Ok(Box::new(state))
    }

    fn supports_retheme(&self) -> bool {
        self.retheme
    }
}

impl WidgetPrivate for TestState {
    fn width(&self) -> i32 {
        self.width
    }

    fn retheme(&mut self, entry: &ConfigEntry<'_>, _ctx: &WidgetContext<'_, '_>) -> Result<()> {
        if entry.parse_bool("fail_retheme") {
            return Err(anyhow!("widget {} refused the new theme", self.id));
        }
        self.apply(entry);
        note(Lifecycle::Rethemed(self.id));
        Ok(())
    }

    fn reconfigure(&mut self, settings: &crate::config::Settings) {
        self.width = self.width.max(settings.drag_threshold);
        note(Lifecycle::Reconfigured(self.id));
    }

    fn draw(&mut self, dc: &mut DrawContext<'_>) {
        if let Some(color) = self.color {
            let (w, h) = (dc.width(), dc.height());
            dc.fill_rect(0, 0, w, h, color);
        }
    }

    fn clock_tick(&mut self) -> bool {
        note(Lifecycle::Ticked(self.id));
        self.ticks
    }

    fn pointer_event(&mut self, event: &PointerEvent) -> bool {
        note(Lifecycle::Pointer(self.id, *event));
        self.dirty_on_pointer
    }
}

impl Drop for TestState {
    fn drop(&mut self) {
        note(Lifecycle::Destroyed(self.id));
    }
}
