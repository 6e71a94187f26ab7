//! Recursive-descent reader for the nested config/theme format
//!
//! ```text
//! # comment
//! panel {
//!     position = bottom
//!     background = "images/bg.png"
//! }
//! clock { format = %H:%M:%S }
//! spacer
//! ```
//!
//! A body is a sequence of entries; an entry is `name [= value] [{ body }]`.
//! Names and values are slices of the source text, nothing is copied.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use super::tree::{ConfigEntry, ConfigTree};

/// Deepest `{ }` nesting accepted in a source
const MAX_DEPTH: usize = 64;

#[derive(Debug, Error)]
pub enum ParseError {
    /// The file couldn't be opened (missing, no permission, ...)
    #[error("failed to open {}", path.display())]
    BadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file was opened but its contents couldn't be read completely
    #[error("failed to read {}", path.display())]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The source parsed but contained no entries
    #[error("no entries found")]
    EmptyFile,

    #[error("syntax error at {line}:{column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: &'static str,
    },
}

/// Owned source text plus the directory it was read from.
///
/// The text is the single backing buffer for every tree parsed from it.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    path: PathBuf,
    dir: PathBuf,
    text: String,
}

impl ConfigSource {
    pub fn load(path: &Path) -> Result<Self, ParseError> {
        let mut file = File::open(path).map_err(|source| ParseError::BadFile {
            path: path.to_path_buf(),
            source,
        })?;

        let mut text = String::new();
        file.read_to_string(&mut text)
            .map_err(|source| ParseError::ReadError {
                path: path.to_path_buf(),
                source,
            })?;

        debug!(path = %path.display(), bytes = text.len(), "Read config source");
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(Self {
            path: path.to_path_buf(),
            dir,
            text,
        })
    }

    pub fn from_text(text: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            path: dir.clone(),
            dir,
            text: text.into(),
        }
    }

    pub fn parse(&self) -> Result<ConfigTree<'_>, ParseError> {
        Ok(parse(&self.text)?.with_dir(&self.dir))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Parse source text that has no directory of its own.
pub fn parse(text: &str) -> Result<ConfigTree<'_>, ParseError> {
    let children = Parser::new(text).parse_document()?;
    Ok(ConfigTree::new(None, children))
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

fn is_name_byte(b: u8) -> bool {
    !b.is_ascii_whitespace() && !matches!(b, b'=' | b'{' | b'}' | b'#' | b'"' | b';')
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn error(&self, message: &'static str) -> ParseError {
        let consumed = &self.src[..self.pos];
        let line = consumed.matches('\n').count() + 1;
        let column = consumed.len() - consumed.rfind('\n').map_or(0, |i| i + 1) + 1;
        ParseError::Syntax {
            line,
            column,
            message,
        }
    }

    /// Skip whitespace, `;` separators and `#` comments.
    fn skip_trivia(&mut self) {
        while let Some(b) = self.peek() {
            match b {
                b'#' => {
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                b';' => self.pos += 1,
                b if b.is_ascii_whitespace() => self.pos += 1,
                _ => break,
            }
        }
    }

    fn skip_inline_space(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r')) {
            self.pos += 1;
        }
    }

    fn parse_document(mut self) -> Result<Vec<ConfigEntry<'a>>, ParseError> {
        let entries = self.parse_body(false)?;
        if entries.is_empty() {
            return Err(ParseError::EmptyFile);
        }
        Ok(entries)
    }

    fn parse_body(&mut self, nested: bool) -> Result<Vec<ConfigEntry<'a>>, ParseError> {
        let mut entries = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                None if nested => return Err(self.error("missing closing '}'")),
                None => return Ok(entries),
                Some(b'}') if nested => {
                    self.pos += 1;
                    return Ok(entries);
                }
                Some(b'}') => return Err(self.error("unmatched '}'")),
                Some(b) if !is_name_byte(b) => return Err(self.error("expected entry name")),
                Some(_) => entries.push(self.parse_entry()?),
            }
        }
    }

    fn parse_entry(&mut self) -> Result<ConfigEntry<'a>, ParseError> {
        let start = self.pos;
        while self.peek().is_some_and(is_name_byte) {
            self.pos += 1;
        }
        let name = &self.src[start..self.pos];

        self.skip_inline_space();
        let value = if self.peek() == Some(b'=') {
            self.pos += 1;
            Some(self.parse_value()?)
        } else {
            None
        };

        // An opening brace may follow on the next line.
        let resume = self.pos;
        self.skip_trivia();
        let children = if self.peek() == Some(b'{') {
            if self.depth == MAX_DEPTH {
                return Err(self.error("nesting too deep"));
            }
            self.pos += 1;
            self.depth += 1;
            let children = self.parse_body(true)?;
            self.depth -= 1;
            children
        } else {
            self.pos = resume;
            Vec::new()
        };

        Ok(ConfigEntry {
            name,
            value,
            children,
        })
    }

    fn parse_value(&mut self) -> Result<&'a str, ParseError> {
        self.skip_inline_space();
        if self.peek() == Some(b'"') {
            self.pos += 1;
            let start = self.pos;
            let Some(len) = self.src[start..].find('"') else {
                return Err(self.error("unterminated quoted value"));
            };
            self.pos = start + len + 1;
            return Ok(&self.src[start..start + len]);
        }

        let start = self.pos;
        while let Some(b) = self.peek() {
            if matches!(b, b'\n' | b'{' | b'}' | b'#' | b';') {
                break;
            }
            if b == b'"' {
                return Err(self.error("unexpected quote inside value"));
            }
            self.pos += 1;
        }
        Ok(self.src[start..self.pos].trim_end())
    }
}
