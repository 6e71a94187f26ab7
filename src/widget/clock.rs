//! `clock`: current time as text

use anyhow::{anyhow, Result};
use chrono::{DateTime, Local, TimeZone};
use std::fmt::{Display, Write};
use tracing::{debug, warn};

use super::{WidgetContext, WidgetInterface, WidgetPrivate};
use crate::canvas::DrawContext;
use crate::config::ConfigEntry;
use crate::font::{FontRenderer, RenderedText};
use crate::layout::SizeType;
use crate::theme::parse_color;

const DEFAULT_FORMAT: &str = "%H:%M";
const DEFAULT_COLOR: u32 = 0xFFFFFFFF;
const DEFAULT_PADDING: i32 = 4;

pub struct Clock;

pub static CLOCK: Clock = Clock;

/// Format `time` with a strftime-like `format`, rejecting bad specifiers.
pub fn format_time<Tz>(format: &str, time: &DateTime<Tz>) -> Result<String>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut text = String::new();
    write!(text, "{}", time.format(format))
        .map_err(|_| anyhow!("invalid clock format '{}'", format))?;
    Ok(text)
}

struct ClockState {
    format: String,
    font: FontRenderer,
    color: u32,
    padding: i32,
    text: String,
    rendered: RenderedText,
}

impl ClockState {
    fn from_entry(entry: &ConfigEntry<'_>, ctx: &WidgetContext<'_, '_>) -> Result<Self> {
        let format = entry.find_value("format").unwrap_or(DEFAULT_FORMAT).to_string();
        let text = format_time(&format, &Local::now())?;

        let default_size = (ctx.panel_height * 2 / 3).max(8);
        let size = entry.parse_int("size", default_size).max(1) as f32;
        let font = FontRenderer::load(entry.find_value("font"), size)?;

        let color = match entry.find_value("color") {
            Some(value) => parse_color(value).unwrap_or_else(|| {
                warn!(color = value, "Invalid clock color, using white");
                DEFAULT_COLOR
            }),
            None => DEFAULT_COLOR,
        };
        let padding = entry.parse_int("padding", DEFAULT_PADDING).max(0);

        let rendered = font.render_text(&text, color);
        Ok(Self {
            format,
            font,
            color,
            padding,
            text,
            rendered,
        })
    }

    fn set_text(&mut self, text: String) -> bool {
        if text == self.text {
            return false;
        }
        self.rendered = self.font.render_text(&text, self.color);
        self.text = text;
        true
    }
}

impl WidgetInterface for Clock {
    fn theme_name(&self) -> &'static str {
        "clock"
    }

    fn size_type(&self) -> SizeType {
        SizeType::Constant
    }

    fn create(&self, entry: &ConfigEntry<'_>, ctx: &WidgetContext<'_, '_>) -> Result<Box<dyn WidgetPrivate>> {
        Ok(Box::new(ClockState::from_entry(entry, ctx)?))
    }

    fn supports_retheme(&self) -> bool {
        true
    }
}

impl WidgetPrivate for ClockState {
    fn width(&self) -> i32 {
        self.font.measure(&self.text).max(self.rendered.width) + 2 * self.padding
    }

    fn retheme(&mut self, entry: &ConfigEntry<'_>, ctx: &WidgetContext<'_, '_>) -> Result<()> {
        *self = Self::from_entry(entry, ctx)?;
        Ok(())
    }

    fn draw(&mut self, dc: &mut DrawContext<'_>) {
        let text = &self.rendered;
        let x = (dc.width() - text.width) / 2;
        let y = (dc.height() - text.height) / 2;
        dc.draw_bitmap(x, y, text.width, &text.data);
    }

    fn clock_tick(&mut self) -> bool {
        match format_time(&self.format, &Local::now()) {
            Ok(text) => {
                let changed = self.set_text(text);
                if changed {
                    debug!(text = %self.text, "Clock text changed");
                }
                changed
            }
            Err(e) => {
                warn!(error = %e, "Clock tick failed to format");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_format_time() {
        let time = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        assert_eq!(format_time(DEFAULT_FORMAT, &time).unwrap(), "07:08");
        assert_eq!(format_time("%a %d %b", &time).unwrap(), "Mon 06 May");
        assert_eq!(format_time("%H:%M:%S", &time).unwrap(), "07:08:09");
    }

    #[test]
    fn test_format_time_rejects_bad_specifier() {
        let time = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        assert!(format_time("%Q", &time).is_err());
    }

    #[test]
    fn test_clock_is_constant_and_rethemable() {
        assert_eq!(CLOCK.size_type(), SizeType::Constant);
        assert!(CLOCK.supports_retheme());
        assert_eq!(CLOCK.theme_name(), "clock");
    }
}
