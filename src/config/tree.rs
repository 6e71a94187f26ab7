//! Generic configuration tree
//!
//! Entries borrow their names and values from the source text they were
//! parsed from, so a tree can never outlive its buffer.

use std::path::{Path, PathBuf};

/// A named entry with an optional value and ordered children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigEntry<'a> {
    pub name: &'a str,
    pub value: Option<&'a str>,
    pub children: Vec<ConfigEntry<'a>>,
}

impl<'a> ConfigEntry<'a> {
    /// Find the first direct child called `name`.
    ///
    /// This is a linear scan over the children. Callers that look up the
    /// same key repeatedly should keep the result around.
    pub fn find(&self, name: &str) -> Option<&ConfigEntry<'a>> {
        self.children.iter().find(|child| child.name == name)
    }

    /// Value of the first direct child called `name`, if it has one.
    pub fn find_value(&self, name: &str) -> Option<&'a str> {
        self.find(name).and_then(|child| child.value)
    }

    /// Boolean child value; absent or unrecognized values are `false`.
    pub fn parse_bool(&self, name: &str) -> bool {
        self.find_value(name).is_some_and(is_truthy)
    }

    /// Integer child value, `default` when absent or not a number.
    pub fn parse_int(&self, name: &str, default: i32) -> i32 {
        self.find_value(name)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Whitespace separated words of this entry's value.
    pub fn words(&self) -> impl Iterator<Item = &'a str> {
        self.value.unwrap_or("").split_whitespace()
    }
}

pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// A parsed source: the root entry plus the directory the source came from.
///
/// The root's name is empty and it never carries a value; only its children
/// are meaningful.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigTree<'a> {
    dir: Option<&'a Path>,
    root: ConfigEntry<'a>,
}

impl<'a> ConfigTree<'a> {
    pub fn new(dir: Option<&'a Path>, children: Vec<ConfigEntry<'a>>) -> Self {
        Self {
            dir,
            root: ConfigEntry {
                name: "",
                value: None,
                children,
            },
        }
    }

    /// Resolve relative paths against `dir` from now on.
    pub fn with_dir(mut self, dir: &'a Path) -> Self {
        self.dir = Some(dir);
        self
    }

    pub fn root(&self) -> &ConfigEntry<'a> {
        &self.root
    }

    /// Top-level entries in source order.
    pub fn entries(&self) -> &[ConfigEntry<'a>] {
        &self.root.children
    }

    pub fn find(&self, name: &str) -> Option<&ConfigEntry<'a>> {
        self.root.find(name)
    }

    pub fn find_value(&self, name: &str) -> Option<&'a str> {
        self.root.find_value(name)
    }

    pub fn dir(&self) -> Option<&'a Path> {
        self.dir
    }

    /// Resolve a path written inside the source relative to its directory.
    pub fn resolve_path(&self, relative: &str) -> PathBuf {
        let relative = Path::new(relative);
        match self.dir {
            Some(dir) if relative.is_relative() => dir.join(relative),
            _ => relative.to_path_buf(),
        }
    }
}
