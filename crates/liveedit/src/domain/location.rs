//! Location identifiers correlating stamped elements with their on-disk source.
//!
//! The wire format is `relative/path:line:column`. Paths may themselves
//! contain colons, so decoding always splits from the right.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::errors::IdentifierError;

const SEPARATOR: char = ':';

/// A 1-based `(line, column)` pair. Columns count UTF-16 code units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourcePosition {
    pub line: u32,
    pub column: u32,
}

impl SourcePosition {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Identifier of one element within one project file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocationIdentifier {
    /// Path relative to the project root, always `/`-separated.
    pub path: String,
    pub position: SourcePosition,
}

impl LocationIdentifier {
    pub fn new(path: impl Into<String>, position: SourcePosition) -> Self {
        Self {
            path: path.into(),
            position,
        }
    }

    /// Encode into the wire format.
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Decode the wire format produced by [`LocationIdentifier::encode`].
    pub fn decode(raw: &str) -> Result<Self, IdentifierError> {
        let mut parts: Vec<&str> = raw.split(SEPARATOR).collect();
        if parts.len() < 3 {
            return Err(IdentifierError::MissingParts(raw.to_owned()));
        }

        // Both pops are guaranteed by the length check above.
        let column = parts.pop().unwrap_or_default();
        let line = parts.pop().unwrap_or_default();
        let column = parse_coordinate(raw, "column", column)?;
        let line = parse_coordinate(raw, "line", line)?;

        let path = parts.join(&SEPARATOR.to_string());
        if path.is_empty() {
            return Err(IdentifierError::EmptyPath(raw.to_owned()));
        }

        Ok(Self {
            path,
            position: SourcePosition { line, column },
        })
    }
}

fn parse_coordinate(raw: &str, field: &'static str, value: &str) -> Result<u32, IdentifierError> {
    // `u32::from_str` accepts a leading `+`; the wire format never produces one.
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(IdentifierError::NotNumeric {
            identifier: raw.to_owned(),
            field,
        });
    }
    match value.parse::<u32>() {
        Ok(0) => Err(IdentifierError::ZeroCoordinate {
            identifier: raw.to_owned(),
            field,
        }),
        Ok(parsed) => Ok(parsed),
        Err(_) => Err(IdentifierError::NotNumeric {
            identifier: raw.to_owned(),
            field,
        }),
    }
}

impl fmt::Display for LocationIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{SEPARATOR}{}{SEPARATOR}{}",
            self.path, self.position.line, self.position.column
        )
    }
}

impl FromStr for LocationIdentifier {
    type Err = IdentifierError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::decode(value)
    }
}
