//! Configuration management for edgepanel
//!
//! - **tree**: the generic nested entry tree shared by settings and themes
//! - **parser**: the recursive-descent reader producing trees
//! - **settings**: process settings (`edgepanelrc`)
//! - **alternatives**: mutually exclusive widget entries

pub mod alternatives;
pub mod parser;
pub mod settings;
pub mod tree;

// Re-export commonly used types
pub use alternatives::Alternatives;
pub use parser::{parse, ConfigSource};
pub use settings::{MouseActions, Settings};
pub use tree::{ConfigEntry, ConfigTree};
