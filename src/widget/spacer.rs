//! `spacer`: the minimal fill widget, shows nothing but the panel background

use anyhow::Result;

use super::{WidgetContext, WidgetInterface, WidgetPrivate};
use crate::canvas::DrawContext;
use crate::config::ConfigEntry;
use crate::layout::SizeType;

pub struct Spacer;

pub static SPACER: Spacer = Spacer;

struct SpacerState;

impl WidgetInterface for Spacer {
    fn theme_name(&self) -> &'static str {
        "spacer"
    }

    fn size_type(&self) -> SizeType {
        SizeType::Fill
    }

    fn create(&self, _entry: &ConfigEntry<'_>, _ctx: &WidgetContext<'_, '_>) -> Result<Box<dyn WidgetPrivate>> {
        Ok(Box::new(SpacerState))
    }

    fn supports_retheme(&self) -> bool {
        true
    }
}

impl WidgetPrivate for SpacerState {
    fn retheme(&mut self, _entry: &ConfigEntry<'_>, _ctx: &WidgetContext<'_, '_>) -> Result<()> {
        Ok(())
    }

    fn draw(&mut self, _dc: &mut DrawContext<'_>) {}
}
