//! Domain models shared by the stamping pass and the patch engine.

use std::path::PathBuf;

use crate::domain::location::LocationIdentifier;

/// One user edit: set the text of the element addressed by `identifier`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    pub identifier: LocationIdentifier,
    pub new_value: String,
}

/// Result of a successfully applied [`Patch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutcome {
    /// Path relative to the project root, as carried by the identifier.
    pub file_path: String,
    /// Absolute path that was rewritten.
    pub absolute_path: PathBuf,
    pub new_content: String,
}

/// Why the stamping pass left a file alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Extension not recognized.
    UnsupportedExtension,
    /// Outside the project root or inside an excluded directory.
    OutsideProject,
    /// The source could not be parsed at all.
    ParseFailure(String),
}

impl SkipReason {
    /// Whether the file was never a candidate, as opposed to failing.
    pub fn is_not_applicable(&self) -> bool {
        !matches!(self, SkipReason::ParseFailure(_))
    }
}
