//! Widget capabilities and instances
//!
//! A [`WidgetInterface`] is a process-wide capability (one per widget kind)
//! registered under its theme name. Instantiating it for a theme entry yields
//! a [`Widget`]: layout data owned by the panel plus the capability's private
//! state, which only the capability itself understands.
//!
//! Dropping a `Widget` destroys its private state.

mod clock;
mod empty;
mod spacer;

pub use clock::CLOCK;
pub use empty::EMPTY;
pub use spacer::SPACER;

use anyhow::{anyhow, Result};
use std::fmt;
use tracing::debug;

use crate::canvas::DrawContext;
use crate::config::{ConfigEntry, ConfigTree, Settings};
use crate::image::ImageLoader;
use crate::layout::{LayoutSlot, SizeType};
use crate::window::PointerEvent;

/// Everything a capability may look at while creating or retheming.
pub struct WidgetContext<'c, 'a> {
    pub theme: &'c ConfigTree<'a>,
    pub images: &'c dyn ImageLoader,
    pub settings: &'c Settings,
    pub panel_height: i32,
}

pub trait WidgetInterface: Sync {
    /// Name of the theme entry this capability is instantiated from
    fn theme_name(&self) -> &'static str;

    fn size_type(&self) -> SizeType;

    fn create(
        &self,
        entry: &ConfigEntry<'_>,
        ctx: &WidgetContext<'_, '_>,
    ) -> Result<Box<dyn WidgetPrivate>>;

    /// Can existing instances take a new theme entry in place?
    fn supports_retheme(&self) -> bool {
        false
    }
}

/// Per-instance state of a widget.
pub trait WidgetPrivate {
    /// Width wanted by constant-size widgets.
    fn width(&self) -> i32 {
        0
    }

    fn retheme(&mut self, _entry: &ConfigEntry<'_>, _ctx: &WidgetContext<'_, '_>) -> Result<()> {
        Err(anyhow!("retheme is not supported"))
    }

    fn reconfigure(&mut self, _settings: &Settings) {}

    fn draw(&mut self, dc: &mut DrawContext<'_>);

    /// Called once per tick; return `true` to be repainted.
    fn clock_tick(&mut self) -> bool {
        false
    }

    /// Called after every full-panel repaint.
    fn panel_exposed(&mut self) {}

    /// Pointer input inside the widget (or crossing the panel); return `true`
    /// to be repainted.
    fn pointer_event(&mut self, _event: &PointerEvent) -> bool {
        false
    }
}

pub struct Widget {
    interface: &'static dyn WidgetInterface,
    pub x: i32,
    pub width: i32,
    pub no_separator: bool,
    pub paint_replace: bool,
    pub needs_expose: bool,
    private: Box<dyn WidgetPrivate>,
}

impl fmt::Debug for Widget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Widget")
            .field("name", &self.name())
            .field("x", &self.x)
            .field("width", &self.width)
            .field("no_separator", &self.no_separator)
            .field("paint_replace", &self.paint_replace)
            .field("needs_expose", &self.needs_expose)
            .finish()
    }
}

impl Widget {
    pub fn create(
        interface: &'static dyn WidgetInterface,
        entry: &ConfigEntry<'_>,
        ctx: &WidgetContext<'_, '_>,
    ) -> Result<Self> {
        let private = interface.create(entry, ctx)?;
        let mut widget = Self {
            interface,
            x: 0,
            width: 0,
            no_separator: false,
            paint_replace: false,
            needs_expose: false,
            private,
        };
        widget.apply_entry(entry);
        debug!(widget = widget.name(), width = widget.width, "Created widget");
        Ok(widget)
    }

    /// Hand a new theme entry to the existing private state.
    pub fn retheme(&mut self, entry: &ConfigEntry<'_>, ctx: &WidgetContext<'_, '_>) -> Result<()> {
        self.private.retheme(entry, ctx)?;
        self.needs_expose = false;
        self.apply_entry(entry);
        debug!(widget = self.name(), width = self.width, "Rethemed widget");
        Ok(())
    }

    fn apply_entry(&mut self, entry: &ConfigEntry<'_>) {
        self.no_separator = entry.parse_bool("no_separator");
        self.paint_replace = entry.parse_bool("paint_replace");
        self.refresh_width();
    }

    pub fn name(&self) -> &'static str {
        self.interface.theme_name()
    }

    /// Pull the wanted width from a constant-size widget.
    pub fn refresh_width(&mut self) {
        if self.interface.size_type() == SizeType::Constant {
            self.width = self.private.width();
        }
    }

    pub fn reconfigure(&mut self, settings: &Settings) {
        self.private.reconfigure(settings);
        self.refresh_width();
    }

    pub fn draw(&mut self, dc: &mut DrawContext<'_>) {
        self.private.draw(dc);
    }

    pub fn clock_tick(&mut self) {
        if self.private.clock_tick() {
            self.needs_expose = true;
        }
    }

    pub fn panel_exposed(&mut self) {
        self.private.panel_exposed();
    }

    pub fn pointer_event(&mut self, event: &PointerEvent) {
        if self.private.pointer_event(event) {
            self.needs_expose = true;
        }
    }

    pub fn contains(&self, x: i32) -> bool {
        x >= self.x && x < self.x + self.width
    }

    #[cfg(test)]
    pub(crate) fn private_ptr(&self) -> *const () {
        &*self.private as *const dyn WidgetPrivate as *const ()
    }
}

impl Drop for Widget {
    fn drop(&mut self) {
        debug!(widget = self.name(), "Destroyed widget");
    }
}

impl LayoutSlot for Widget {
    fn size_type(&self) -> SizeType {
        self.interface.size_type()
    }

    fn width(&self) -> i32 {
        self.width
    }

    fn no_separator(&self) -> bool {
        self.no_separator
    }

    fn set_slot(&mut self, x: i32, width: i32) {
        self.x = x;
        self.width = width;
    }
}

/// Named widget capabilities, looked up by theme entry name.
#[derive(Clone, Default)]
pub struct WidgetRegistry {
    interfaces: Vec<&'static dyn WidgetInterface>,
}

impl fmt::Debug for WidgetRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.interfaces.iter().map(|i| i.theme_name()))
            .finish()
    }
}

impl WidgetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in capability.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(&CLOCK);
        registry.register(&EMPTY);
        registry.register(&SPACER);
        registry
    }

    /// Add a capability; a later registration under the same name wins.
    pub fn register(&mut self, interface: &'static dyn WidgetInterface) {
        self.interfaces
            .retain(|i| i.theme_name() != interface.theme_name());
        self.interfaces.push(interface);
    }

    pub fn lookup(&self, name: &str) -> Option<&'static dyn WidgetInterface> {
        self.interfaces
            .iter()
            .copied()
            .find(|i| i.theme_name() == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.interfaces.iter().map(|i| i.theme_name())
    }
}
