//! `empty`: a fixed-width gap, optionally painted with its own image

use anyhow::{anyhow, Result};
use std::rc::Rc;

use super::{WidgetContext, WidgetInterface, WidgetPrivate};
use crate::canvas::DrawContext;
use crate::config::ConfigEntry;
use crate::image::Image;
use crate::layout::SizeType;
use crate::theme::load_image;

pub struct Empty;

pub static EMPTY: Empty = Empty;

#[derive(Debug)]
struct EmptyState {
    width: i32,
    image: Option<Rc<Image>>,
}

impl EmptyState {
    fn from_entry(entry: &ConfigEntry<'_>, ctx: &WidgetContext<'_, '_>) -> Result<Self> {
        let image = load_image("image", entry, ctx.theme, ctx.images)?;
        let default_width = image.as_ref().map_or(-1, |i| i.width());
        let width = entry.parse_int("width", default_width);
        if width < 0 {
            return Err(anyhow!("'empty' widget needs a 'width' or an 'image'"));
        }
        Ok(Self { width, image })
    }
}

impl WidgetInterface for Empty {
    fn theme_name(&self) -> &'static str {
        "empty"
    }

    fn size_type(&self) -> SizeType {
        SizeType::Constant
    }

    fn create(&self, entry: &ConfigEntry<'_>, ctx: &WidgetContext<'_, '_>) -> Result<Box<dyn WidgetPrivate>> {
        Ok(Box::new(EmptyState::from_entry(entry, ctx)?))
    }

    fn supports_retheme(&self) -> bool {
        true
    }
}

impl WidgetPrivate for EmptyState {
    fn width(&self) -> i32 {
        self.width
    }

    fn retheme(&mut self, entry: &ConfigEntry<'_>, ctx: &WidgetContext<'_, '_>) -> Result<()> {
        *self = Self::from_entry(entry, ctx)?;
        Ok(())
    }

    fn draw(&mut self, dc: &mut DrawContext<'_>) {
        if let Some(image) = &self.image {
            let y = (dc.height() - image.height()) / 2;
            dc.blit_image(image, (dc.width() - image.width()) / 2, y);
        }
    }
}
