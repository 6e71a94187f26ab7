//! Alternatives: mutually exclusive widget entries in a theme
//!
//! A top-level entry tagged `alternative = <group>` competes with every other
//! entry of the same group. Exactly one wins per scan: the first entry whose
//! widget name is listed in `preferred_alternatives`, otherwise the first
//! entry of the group. Entries naming no known widget never compete.

use std::collections::HashMap;
use tracing::debug;

use super::tree::{ConfigEntry, ConfigTree};

const ALTERNATIVE_KEY: &str = "alternative";

/// Winner of each group, by index into the tree's top-level entries.
#[derive(Debug, Default)]
pub struct Alternatives {
    winners: HashMap<String, usize>,
}

impl Alternatives {
    pub fn resolve(
        tree: &ConfigTree<'_>,
        preferred: &[String],
        is_known: impl Fn(&str) -> bool,
    ) -> Self {
        let mut winners: HashMap<String, (usize, bool)> = HashMap::new();
        for (index, entry) in tree.entries().iter().enumerate() {
            let Some(group) = group_of(entry) else {
                continue;
            };
            if !is_known(entry.name) {
                continue;
            }
            let is_preferred = preferred.iter().any(|p| p == entry.name);
            match winners.get_mut(group) {
                None => {
                    winners.insert(group.to_string(), (index, is_preferred));
                }
                Some(current) if is_preferred && !current.1 => *current = (index, true),
                Some(_) => {}
            }
        }
        debug!(groups = winners.len(), "Resolved widget alternatives");
        Self {
            winners: winners
                .into_iter()
                .map(|(group, (index, _))| (group, index))
                .collect(),
        }
    }

    /// Should the top-level entry at `index` be instantiated?
    pub fn allows(&self, index: usize, entry: &ConfigEntry<'_>) -> bool {
        match group_of(entry) {
            None => true,
            Some(group) => self.winners.get(group) == Some(&index),
        }
    }
}

fn group_of<'a>(entry: &ConfigEntry<'a>) -> Option<&'a str> {
    entry
        .find_value(ALTERNATIVE_KEY)
        .map(str::trim)
        .filter(|g| !g.is_empty())
}
