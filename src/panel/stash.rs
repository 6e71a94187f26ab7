//! Widgets evicted from the panel while a new theme is applied

use std::collections::{HashMap, VecDeque};
use tracing::debug;

use crate::widget::Widget;

/// Evicted widgets keyed by capability name, oldest first.
///
/// A stash lives for exactly one reconfigure: whatever is still inside when
/// it is dropped gets destroyed.
#[derive(Debug, Default)]
pub struct WidgetStash {
    widgets: HashMap<&'static str, VecDeque<Widget>>,
}

impl WidgetStash {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of every widget, keeping their order per name.
    pub fn evict(widgets: Vec<Widget>) -> Self {
        let mut stash = Self::new();
        for widget in widgets {
            stash
                .widgets
                .entry(widget.name())
                .or_default()
                .push_back(widget);
        }
        debug!(widgets = stash.len(), "Stashed panel widgets");
        stash
    }

    /// Reclaim the oldest stashed widget of capability `name`.
    pub fn take(&mut self, name: &str) -> Option<Widget> {
        let queue = self.widgets.get_mut(name)?;
        let widget = queue.pop_front();
        if queue.is_empty() {
            self.widgets.remove(name);
        }
        widget
    }

    pub fn len(&self) -> usize {
        self.widgets.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }

    /// Destroy every widget nobody reclaimed.
    pub fn destroy_remaining(mut self) -> usize {
        let count = self.len();
        for (name, queue) in self.widgets.drain() {
            debug!(widget = name, count = queue.len(), "Destroying unclaimed widgets");
        }
        count
    }
}
