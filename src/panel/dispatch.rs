use anyhow::Result;
use tracing::{debug, info, trace};

use super::Panel;
use crate::config::MouseActions;
use crate::window::{PanelEvent, PointerEvent, WindowSystem};

impl<W: WindowSystem> Panel<W> {
    /// Drain every pending event, then repaint once.
    ///
    /// Returns how many events were handled.
    pub fn process_events(&mut self) -> Result<usize> {
        let mut handled = 0;
        while let Some(event) = self.ws.poll_event()? {
            self.handle_event(event)?;
            handled += 1;
        }
        if handled > 0 {
            self.expose_panel()?;
        }
        Ok(handled)
    }

    /// Periodic tick: every widget hears the clock, then the panel repaints.
    pub fn tick(&mut self) -> Result<()> {
        let mut resized = false;
        for widget in &mut self.widgets {
            let width = widget.width;
            widget.clock_tick();
            if widget.needs_expose {
                widget.refresh_width();
                resized |= widget.width != width;
            }
        }
        if resized {
            debug!("Widget width changed on tick, redoing layout");
            self.recalculate_widgets_sizes()?;
            self.needs_expose = true;
        }
        self.expose_panel()
    }

    fn handle_event(&mut self, event: PanelEvent) -> Result<()> {
        match event {
            PanelEvent::Expose { window } if window == self.surface.window => {
                self.render.expose(&mut self.ws, &self.surface)?;
            }
            PanelEvent::RootConfigured { width, height } => {
                let screen = self.ws.screen();
                if (screen.width, screen.height) != (width, height) {
                    info!(width, height, "Screen resolution changed");
                    self.ws.refresh_screen(width, height)?;
                    self.update_geometry()?;
                }
            }
            PanelEvent::RootBackgroundChanged => {
                debug!(strategy = self.render.name(), "Desktop background changed");
                self.render.update_background(&mut self.ws, &self.surface)?;
            }
            PanelEvent::Pointer { window, event } if window == self.surface.window => {
                self.handle_pointer(event)?;
            }
            other => trace!(event = ?other, "Ignoring event"),
        }
        Ok(())
    }

    fn handle_pointer(&mut self, event: PointerEvent) -> Result<()> {
        if let PointerEvent::Release { button, .. } = event {
            if self
                .settings
                .check_mbutton_condition(button, MouseActions::SHOW_DESKTOP)
            {
                self.showing_desktop = !self.showing_desktop;
                debug!(button, showing = self.showing_desktop, "Toggling show desktop");
                self.ws.set_showing_desktop(self.showing_desktop)?;
            }
        }

        match event.x() {
            Some(x) => {
                if let Some(widget) = self.widgets.iter_mut().find(|w| w.contains(x)) {
                    widget.pointer_event(&event);
                }
            }
            None => {
                for widget in &mut self.widgets {
                    widget.pointer_event(&event);
                }
            }
        }
        Ok(())
    }
}
