//! Render strategies: how the painted canvas reaches the panel window
//!
//! `normal` puts the canvas as is. `pseudo` fakes transparency by
//! compositing the canvas over a cached copy of the desktop background.

use anyhow::Result;
use tracing::{debug, warn};

use crate::canvas::{over, Canvas};
use crate::geometry::Placement;
use crate::window::{WindowId, WindowSystem};

/// The panel window together with the canvas painted for it.
#[derive(Debug)]
pub struct Surface {
    pub window: WindowId,
    pub placement: Placement,
    pub canvas: Canvas,
}

impl Surface {
    pub fn new(window: WindowId, placement: Placement) -> Self {
        Self {
            window,
            placement,
            canvas: Canvas::new(placement.width, placement.height),
        }
    }
}

pub trait RenderStrategy {
    fn name(&self) -> &'static str;

    fn create_private(&mut self, _ws: &mut dyn WindowSystem, _surface: &Surface) -> Result<()> {
        Ok(())
    }

    fn free_private(&mut self) {}

    /// (Re)create the canvas to match the panel size.
    fn create_draw_context(&mut self, surface: &mut Surface) {
        surface.canvas = Canvas::new(surface.placement.width, surface.placement.height);
    }

    /// Copy the canvas rectangle onto the window.
    fn blit(
        &mut self,
        ws: &mut dyn WindowSystem,
        surface: &Surface,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> Result<()>;

    fn expose(&mut self, ws: &mut dyn WindowSystem, surface: &Surface) -> Result<()> {
        let (w, h) = (surface.placement.width, surface.placement.height);
        self.blit(ws, surface, 0, 0, w, h)
    }

    fn update_background(&mut self, _ws: &mut dyn WindowSystem, _surface: &Surface) -> Result<()> {
        Ok(())
    }

    fn panel_resize(&mut self, _ws: &mut dyn WindowSystem, _surface: &Surface) -> Result<()> {
        Ok(())
    }
}

/// Pick the strategy for a theme.
pub fn select_render_strategy(transparent: bool) -> Box<dyn RenderStrategy> {
    // TODO: detect a running compositing manager and use real ARGB visuals
    if transparent {
        Box::new(PseudoRender::default())
    } else {
        Box::new(NormalRender)
    }
}

#[derive(Debug, Default)]
pub struct NormalRender;

impl RenderStrategy for NormalRender {
    fn name(&self) -> &'static str {
        "normal"
    }

    fn blit(
        &mut self,
        ws: &mut dyn WindowSystem,
        surface: &Surface,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> Result<()> {
        let pixels = surface.canvas.region(x, y, width, height);
        ws.put_image(surface.window, x, y, width, height, &pixels)
    }
}

/// Pseudo-transparency over the root window's background pixmap.
#[derive(Debug, Default)]
pub struct PseudoRender {
    /// Desktop background under the panel, `width * height` pixels
    background: Option<Vec<u32>>,
}

impl PseudoRender {
    fn fetch_background(&mut self, ws: &mut dyn WindowSystem, surface: &Surface) -> Result<()> {
        let p = &surface.placement;
        self.background = ws.root_background(p.x, p.y, p.width, p.height)?;
        if self.background.is_none() {
            warn!("Desktop doesn't publish a background pixmap, transparency will look opaque black");
        }
        debug!(width = p.width, height = p.height, "Cached desktop background");
        Ok(())
    }

    fn composite(&self, surface: &Surface, x: i32, y: i32, width: i32, height: i32) -> Vec<u32> {
        let canvas = &surface.canvas;
        let x0 = x.clamp(0, canvas.width());
        let y0 = y.clamp(0, canvas.height());
        let x1 = (x + width).clamp(x0, canvas.width());
        let y1 = (y + height).clamp(y0, canvas.height());
        let mut out = Vec::with_capacity(((x1 - x0) * (y1 - y0)) as usize);
        for py in y0..y1 {
            for px in x0..x1 {
                let bg = self
                    .background
                    .as_ref()
                    .and_then(|b| b.get((py * canvas.width() + px) as usize).copied())
                    .unwrap_or(0xFF00_0000);
                out.push(over(canvas.pixel(px, py), bg));
            }
        }
        out
    }
}

impl RenderStrategy for PseudoRender {
    fn name(&self) -> &'static str {
        "pseudo"
    }

    fn create_private(&mut self, ws: &mut dyn WindowSystem, surface: &Surface) -> Result<()> {
        self.fetch_background(ws, surface)
    }

    fn free_private(&mut self) {
        self.background = None;
    }

    fn blit(
        &mut self,
        ws: &mut dyn WindowSystem,
        surface: &Surface,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> Result<()> {
        let pixels = self.composite(surface, x, y, width, height);
        ws.put_image(surface.window, x, y, width, height, &pixels)
    }

    fn update_background(&mut self, ws: &mut dyn WindowSystem, surface: &Surface) -> Result<()> {
        self.fetch_background(ws, surface)?;
        self.expose(ws, surface)
    }

    fn panel_resize(&mut self, ws: &mut dyn WindowSystem, surface: &Surface) -> Result<()> {
        self.fetch_background(ws, surface)
    }
}
