//! Theme images
//!
//! Images are decoded once into premultiplied ARGB and shared through `Rc`
//! handles; the last handle dropped releases the pixels.

use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::rc::Rc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    width: i32,
    height: i32,
    pixels: Vec<u32>,
}

impl Image {
    pub fn new(width: i32, height: i32, pixels: Vec<u32>) -> Result<Self> {
        if width <= 0 || height <= 0 {
            return Err(anyhow!("Invalid image dimensions {}x{}", width, height));
        }
        if pixels.len() != (width * height) as usize {
            return Err(anyhow!(
                "Pixel buffer of {} doesn't match {}x{}",
                pixels.len(),
                width,
                height
            ));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn solid(width: i32, height: i32, argb: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            pixels: vec![argb; (width.max(1) * height.max(1)) as usize],
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
}

/// Source of decoded theme images.
pub trait ImageLoader {
    fn load(&self, path: &Path) -> Result<Rc<Image>>;
}

/// Loads PNG files from disk.
#[derive(Debug, Default)]
pub struct PngLoader;

impl ImageLoader for PngLoader {
    fn load(&self, path: &Path) -> Result<Rc<Image>> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open image: {}", path.display()))?;
        let image = decode_png(BufReader::new(file))
            .with_context(|| format!("Failed to decode image: {}", path.display()))?;
        debug!(path = %path.display(), width = image.width, height = image.height, "Loaded theme image");
        Ok(Rc::new(image))
    }
}

fn premultiply(r: u8, g: u8, b: u8, a: u8) -> u32 {
    let scale = |c: u8| (u32::from(c) * u32::from(a) + 127) / 255;
    (u32::from(a) << 24) | (scale(r) << 16) | (scale(g) << 8) | scale(b)
}

pub fn decode_png<R: std::io::Read>(reader: R) -> Result<Image> {
    let mut decoder = png::Decoder::new(reader);
    decoder.set_transformations(png::Transformations::normalize_to_color8());
    let mut reader = decoder.read_info()?;
    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader.next_frame(&mut buf)?;
    let data = &buf[..info.buffer_size()];

    let pixels: Vec<u32> = match info.color_type {
        png::ColorType::Rgba => data
            .chunks_exact(4)
            .map(|p| premultiply(p[0], p[1], p[2], p[3]))
            .collect(),
        png::ColorType::Rgb => data
            .chunks_exact(3)
            .map(|p| premultiply(p[0], p[1], p[2], 0xFF))
            .collect(),
        png::ColorType::GrayscaleAlpha => data
            .chunks_exact(2)
            .map(|p| premultiply(p[0], p[0], p[0], p[1]))
            .collect(),
        png::ColorType::Grayscale => data
            .iter()
            .map(|&v| premultiply(v, v, v, 0xFF))
            .collect(),
        other => return Err(anyhow!("Unsupported PNG color type {:?}", other)),
    };

    Image::new(info.width as i32, info.height as i32, pixels)
}
