//! Software ARGB canvas the panel paints into before a render strategy puts
//! it on the window.
//!
//! All pixels are premultiplied ARGB.

use crate::image::Image;

/// Porter-Duff OVER for premultiplied ARGB.
pub fn over(src: u32, dst: u32) -> u32 {
    let sa = src >> 24;
    if sa == 0xFF {
        return src;
    }
    if sa == 0 {
        return dst;
    }
    let inv = 255 - sa;
    let channel = |shift: u32| {
        let s = (src >> shift) & 0xFF;
        let d = (dst >> shift) & 0xFF;
        (s + (d * inv + 127) / 255).min(255) << shift
    };
    channel(24) | channel(16) | channel(8) | channel(0)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    width: i32,
    height: i32,
    pixels: Vec<u32>,
}

impl Canvas {
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        Self {
            width,
            height,
            pixels: vec![0; (width * height) as usize],
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn pixel(&self, x: i32, y: i32) -> u32 {
        self.pixels[(y * self.width + x) as usize]
    }

    fn put(&mut self, x: i32, y: i32, argb: u32, replace: bool) {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return;
        }
        let idx = (y * self.width + x) as usize;
        self.pixels[idx] = if replace {
            argb
        } else {
            over(argb, self.pixels[idx])
        };
    }

    /// Tile `image` over the columns `[x, x + width)`, replacing what is there.
    pub fn pattern_image(&mut self, image: &Image, x: i32, width: i32) {
        let x_end = (x + width).min(self.width);
        for py in 0..self.height {
            let sy = py % image.height();
            for px in x.max(0)..x_end {
                let sx = px % image.width();
                let idx = (py * self.width + px) as usize;
                self.pixels[idx] = image.pixel(sx, sy);
            }
        }
    }

    /// Composite `image` with its top-left corner at (`x`, `y`).
    pub fn blit_image(&mut self, image: &Image, x: i32, y: i32) {
        for iy in 0..image.height() {
            for ix in 0..image.width() {
                self.put(x + ix, y + iy, image.pixel(ix, iy), false);
            }
        }
    }

    /// Copy out the rectangle `(x, y, width, height)`, clipped to the canvas.
    pub fn region(&self, x: i32, y: i32, width: i32, height: i32) -> Vec<u32> {
        let x0 = x.clamp(0, self.width);
        let y0 = y.clamp(0, self.height);
        let x1 = (x + width).clamp(x0, self.width);
        let y1 = (y + height).clamp(y0, self.height);
        let mut out = Vec::with_capacity(((x1 - x0) * (y1 - y0)) as usize);
        for py in y0..y1 {
            let row = (py * self.width) as usize;
            out.extend_from_slice(&self.pixels[row + x0 as usize..row + x1 as usize]);
        }
        out
    }

    /// Drawing context restricted to the widget slot `[x, x + width)`.
    pub fn slot(&mut self, x: i32, width: i32, replace: bool) -> DrawContext<'_> {
        let height = self.height;
        DrawContext {
            canvas: self,
            x,
            width,
            height,
            replace,
        }
    }
}

/// What a widget gets to paint with. Coordinates are relative to the slot
/// and everything outside it is clipped.
pub struct DrawContext<'c> {
    canvas: &'c mut Canvas,
    x: i32,
    width: i32,
    height: i32,
    replace: bool,
}

impl DrawContext<'_> {
    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    fn put(&mut self, x: i32, y: i32, argb: u32) {
        if x < 0 || x >= self.width {
            return;
        }
        let replace = self.replace;
        self.canvas.put(self.x + x, y, argb, replace);
    }

    pub fn fill_rect(&mut self, x: i32, y: i32, width: i32, height: i32, argb: u32) {
        for py in y..y + height {
            for px in x..x + width {
                self.put(px, py, argb);
            }
        }
    }

    /// Draw a `width`-wide premultiplied bitmap at (`x`, `y`).
    pub fn draw_bitmap(&mut self, x: i32, y: i32, width: i32, pixels: &[u32]) {
        if width <= 0 {
            return;
        }
        for (i, &argb) in pixels.iter().enumerate() {
            let i = i as i32;
            if argb != 0 || self.replace {
                self.put(x + i % width, y + i / width, argb);
            }
        }
    }

    pub fn blit_image(&mut self, image: &Image, x: i32, y: i32) {
        for iy in 0..image.height() {
            for ix in 0..image.width() {
                self.put(x + ix, y + iy, image.pixel(ix, iy));
            }
        }
    }
}
