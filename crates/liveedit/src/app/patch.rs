//! Patch engine: re-locate a stamped element in the on-disk source and
//! replace its text.

use std::fs;
use std::path::Path;

use anyhow::Result;

use crate::app::rewrite::Rewriter;
use crate::app::stamp::StampOptions;
use crate::domain::errors::PatchError;
use crate::domain::location::LocationIdentifier;
use crate::domain::model::{Patch, PatchOutcome};
use crate::infra::config::Config;
use crate::infra::fs::{FileLocks, write_atomic};
use crate::infra::syntax::{Dialect, SyntaxTree};
use crate::infra::workspace::ProjectRoot;

/// Applies patches to files of one project.
///
/// Safe to share between threads. Patches to different files run in
/// parallel; patches to the same file are serialized.
#[derive(Debug)]
pub struct PatchEngine {
    root: ProjectRoot,
    extensions: Vec<String>,
    locks: FileLocks,
}

impl PatchEngine {
    pub fn new(root: ProjectRoot, options: &StampOptions) -> Self {
        Self {
            root,
            extensions: options.extensions.clone(),
            locks: FileLocks::new(),
        }
    }

    pub fn from_config(root: &Path, config: &Config) -> Result<Self> {
        let root = ProjectRoot::new(root, &config.paths.excluded)?;
        Ok(Self::new(root, &StampOptions::from_config(config)))
    }

    pub fn root(&self) -> &ProjectRoot {
        &self.root
    }

    /// Decode `identifier` and set the addressed element's text to `new_value`.
    pub fn apply_patch(
        &self,
        identifier: &str,
        new_value: &str,
    ) -> Result<PatchOutcome, PatchError> {
        let identifier = LocationIdentifier::decode(identifier)?;
        self.apply(&Patch {
            identifier,
            new_value: new_value.to_owned(),
        })
    }

    pub fn apply(&self, patch: &Patch) -> Result<PatchOutcome, PatchError> {
        let identifier = &patch.identifier;
        let dialect = self.dialect_for(&identifier.path)?;
        let absolute = self.root.resolve(&identifier.path)?;

        let new_content = self.locks.with_lock(&absolute, || {
            rewrite_file(&absolute, dialect, identifier, &patch.new_value)
        })?;

        Ok(PatchOutcome {
            file_path: identifier.path.clone(),
            absolute_path: absolute,
            new_content,
        })
    }

    fn dialect_for(&self, relative: &str) -> Result<Dialect, PatchError> {
        let extension = Path::new(relative)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| {
                self.extensions
                    .iter()
                    .any(|known| known.trim_start_matches('.').eq_ignore_ascii_case(ext))
            })
            .ok_or_else(|| PatchError::AccessDenied {
                path: relative.to_owned(),
                reason: "not a recognized markup file",
            })?;
        Ok(Dialect::from_extension(extension))
    }
}

/// Read-modify-write cycle for one file. Callers hold the file's lock.
fn rewrite_file(
    absolute: &Path,
    dialect: Dialect,
    identifier: &LocationIdentifier,
    new_value: &str,
) -> Result<String, PatchError> {
    let original = fs::read_to_string(absolute).map_err(|source| PatchError::NotFound {
        path: absolute.to_path_buf(),
        source,
    })?;
    let new_content = replace_text(&original, dialect, identifier, new_value)?;

    if new_content == original {
        tracing::debug!(identifier = %identifier, "text already up to date");
    } else {
        write_atomic(absolute, &new_content).map_err(|source| PatchError::InternalFailure {
            path: absolute.to_path_buf(),
            source,
        })?;
        tracing::info!(identifier = %identifier, "patched element text");
    }
    Ok(new_content)
}

/// Replace the first text child of the element at `identifier` within
/// `source`, leaving every other byte untouched.
pub fn replace_text(
    source: &str,
    dialect: Dialect,
    identifier: &LocationIdentifier,
    new_value: &str,
) -> Result<String, PatchError> {
    let tree = SyntaxTree::parse(dialect, source).map_err(|err| {
        tracing::warn!(path = %identifier.path, error = %err, "parse failed");
        PatchError::ParseFailure {
            path: identifier.path.clone(),
        }
    })?;

    let element =
        tree.element_at(identifier.position)
            .ok_or_else(|| PatchError::TargetNotFound {
                identifier: identifier.encode(),
            })?;
    if element.has_error() {
        return Err(PatchError::ParseFailure {
            path: identifier.path.clone(),
        });
    }
    let slot = element
        .text_slot(source)
        .ok_or_else(|| PatchError::NotMutable {
            identifier: identifier.encode(),
        })?;

    let mut rewriter = Rewriter::new(source);
    rewriter.replace(slot, escape_text(new_value));
    Ok(rewriter.finish().code)
}

/// Characters that cannot appear literally in element text.
fn escape_text(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '{' => escaped.push_str("&#123;"),
            '}' => escaped.push_str("&#125;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            other => escaped.push(other),
        }
    }
    escaped
}
