//! Text rendering for widgets: fontdue rasterizing, fontconfig lookup

use anyhow::{anyhow, Context, Result};
use fontconfig::{Fontconfig, Pattern};
use fontdue::{Font, FontSettings};
use std::ffi::CString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Rendered text as a premultiplied ARGB bitmap
#[derive(Debug, Default)]
pub struct RenderedText {
    pub width: i32,
    pub height: i32,
    pub data: Vec<u32>,
}

#[derive(Debug)]
pub struct FontRenderer {
    font: Font,
    size: f32,
}

impl FontRenderer {
    pub fn from_path(path: &Path, size: f32) -> Result<Self> {
        let font_data = fs::read(path)
            .with_context(|| format!("Failed to read font file: {}", path.display()))?;
        let font = Font::from_bytes(font_data, FontSettings::default())
            .map_err(|e| anyhow!("Failed to parse font {}: {}", path.display(), e))?;
        debug!(path = %path.display(), size, "Loaded font");
        Ok(Self { font, size })
    }

    /// Resolve a family name through fontconfig and load it.
    pub fn from_font_name(font_name: &str, size: f32) -> Result<Self> {
        let path = find_font_path(font_name)
            .with_context(|| format!("Failed to resolve font '{}'", font_name))?;
        Self::from_path(&path, size)
    }

    /// Generic monospace first, then a few well-known files.
    pub fn from_system_font(size: f32) -> Result<Self> {
        match Self::from_font_name("Monospace", size) {
            Ok(renderer) => return Ok(renderer),
            Err(e) => warn!(error = %e, "Fontconfig has no 'Monospace', trying known paths"),
        }

        const FONT_PATHS: [&str; 4] = [
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/TTF/DejaVuSans.ttf",
            "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
            "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
        ];
        for path in FONT_PATHS {
            if let Ok(renderer) = Self::from_path(Path::new(path), size) {
                info!(path, "Using fallback font");
                return Ok(renderer);
            }
        }
        Err(anyhow!("Could not find any system font, tried fontconfig and {:?}", FONT_PATHS))
    }

    /// Load `name` if given, otherwise any system font.
    pub fn load(name: Option<&str>, size: f32) -> Result<Self> {
        match name {
            Some(name) => Self::from_font_name(name, size),
            None => Self::from_system_font(size),
        }
    }

    /// Advance width of `text` in whole pixels.
    pub fn measure(&self, text: &str) -> i32 {
        let advance: f32 = text
            .chars()
            .map(|ch| self.font.metrics(ch, self.size).advance_width)
            .sum();
        advance.ceil() as i32
    }

    /// Render `text` in `color` (straight ARGB) on a transparent background.
    pub fn render_text(&self, text: &str, color: u32) -> RenderedText {
        let mut glyphs = Vec::new();
        let mut pen = 0.0f32;
        let mut ascent = 0i32;
        let mut descent = 0i32;
        for ch in text.chars() {
            let (metrics, bitmap) = self.font.rasterize(ch, self.size);
            ascent = ascent.max(metrics.height as i32 + metrics.ymin);
            descent = descent.max(-metrics.ymin);
            glyphs.push((pen as i32 + metrics.xmin, metrics, bitmap));
            pen += metrics.advance_width;
        }

        let width = pen.ceil() as i32;
        let height = ascent + descent;
        if width <= 0 || height <= 0 {
            return RenderedText::default();
        }

        let mut data = vec![0u32; (width * height) as usize];
        for (x_offset, metrics, bitmap) in glyphs {
            let top = ascent - (metrics.height as i32 + metrics.ymin);
            for gy in 0..metrics.height {
                for gx in 0..metrics.width {
                    let px = x_offset + gx as i32;
                    let py = top + gy as i32;
                    if px < 0 || py < 0 || px >= width || py >= height {
                        continue;
                    }
                    let coverage = u32::from(bitmap[gy * metrics.width + gx]);
                    if coverage > 0 {
                        data[(py * width + px) as usize] = shade(color, coverage);
                    }
                }
            }
        }
        RenderedText { width, height, data }
    }
}

/// Premultiply straight ARGB `color` by glyph `coverage` (0..=255).
fn shade(color: u32, coverage: u32) -> u32 {
    let alpha = ((color >> 24) * coverage + 127) / 255;
    let channel = |shift: u32| ((((color >> shift) & 0xFF) * alpha + 127) / 255) << shift;
    (alpha << 24) | channel(16) | channel(8) | channel(0)
}

/// Best matching font file for a family name.
pub fn find_font_path(family: &str) -> Result<PathBuf> {
    let fc = Fontconfig::new().context("Failed to initialize fontconfig")?;
    let mut pattern = Pattern::new(&fc);
    let family_cstr =
        CString::new(family).with_context(|| format!("Invalid family name: {}", family))?;
    pattern.add_string(fontconfig::FC_FAMILY, &family_cstr);
    let matched = pattern.font_match();

    if let Some(matched_family) = matched.get_string(fontconfig::FC_FAMILY) {
        if !matched_family.eq_ignore_ascii_case(family) && !is_generic_family(family) {
            return Err(anyhow!(
                "Font '{}' not found, fontconfig returned family '{}' instead",
                family,
                matched_family
            ));
        }
    }

    let path = PathBuf::from(
        matched
            .filename()
            .with_context(|| format!("No font file found for '{}'", family))?,
    );
    if !path.exists() {
        return Err(anyhow!("Font file path '{}' does not exist", path.display()));
    }
    debug!(family, path = %path.display(), "Resolved font path");
    Ok(path)
}

/// Aliases fontconfig always maps onto some concrete family.
fn is_generic_family(family: &str) -> bool {
    ["monospace", "sans-serif", "sans", "serif"]
        .iter()
        .any(|g| family.eq_ignore_ascii_case(g))
}
