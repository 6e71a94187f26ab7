//! Widget slot layout
//!
//! Constant-size widgets are packed against the left and right edges in
//! order; the single fill widget takes whatever is left between them.

use thiserror::Error;

use crate::constants::panel::MIN_FILL_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeType {
    /// Fixed width reported by the widget
    Constant,
    /// Absorbs the remaining width; exactly one per panel
    Fill,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("there must be exactly one fill widget (e.g. a taskbar or spacer), found none")]
    NoFillWidget,

    #[error("there must be exactly one fill widget, found {count}")]
    MultipleFillWidgets { count: usize },

    #[error("too many widgets: constant widgets need {required}px but only {available}px are available")]
    Overflow { required: i32, available: i32 },
}

/// Anything the layout engine can position.
pub trait LayoutSlot {
    fn size_type(&self) -> SizeType;
    fn width(&self) -> i32;
    fn no_separator(&self) -> bool;
    fn set_slot(&mut self, x: i32, width: i32);

    /// Does a separator follow this slot?
    fn takes_separator(&self) -> bool {
        self.width() != 0 && !self.no_separator()
    }
}

/// Assign `x` (and the fill widget's width) to every slot.
pub fn layout<S: LayoutSlot>(
    slots: &mut [S],
    panel_width: i32,
    separator_width: i32,
) -> Result<(), LayoutError> {
    let mut fill_index = None;
    let mut fill_count = 0;
    let mut constants_width = 0;
    let mut separators = 0;

    for (i, slot) in slots.iter().enumerate() {
        match slot.size_type() {
            SizeType::Fill => {
                fill_count += 1;
                fill_index.get_or_insert(i);
            }
            SizeType::Constant => {
                constants_width += slot.width();
                if slot.takes_separator() {
                    separators += 1;
                }
            }
        }
    }

    let fill_index = match (fill_count, fill_index) {
        (1, Some(i)) => i,
        (0, _) | (_, None) => return Err(LayoutError::NoFillWidget),
        (count, _) => return Err(LayoutError::MultipleFillWidgets { count }),
    };

    let required = constants_width + separators * separator_width;
    let available = panel_width - MIN_FILL_SIZE;
    if required > available {
        return Err(LayoutError::Overflow {
            required,
            available,
        });
    }

    let mut x = 0;
    for slot in &mut slots[..fill_index] {
        let width = slot.width();
        slot.set_slot(x, width);
        x += width;
        if slot.takes_separator() {
            x += separator_width;
        }
    }

    let mut x2 = panel_width;
    for slot in slots[fill_index + 1..].iter_mut().rev() {
        let width = slot.width();
        x2 -= width;
        slot.set_slot(x2, width);
        if slot.takes_separator() {
            x2 -= separator_width;
        }
    }

    slots[fill_index].set_slot(x, x2 - x);
    Ok(())
}
