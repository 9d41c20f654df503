//! Stamping pass: inject a location identifier attribute into every element.

use std::ops::ControlFlow;
use std::path::Path;

use crate::app::rewrite::{Rewriter, Rewritten};
use crate::domain::location::LocationIdentifier;
use crate::domain::model::SkipReason;
use crate::infra::config::Config;
use crate::infra::sourcemap::{PositionMap, SourceMap};
use crate::infra::syntax::{Dialect, SyntaxTree};
use crate::infra::workspace::ProjectRoot;

/// Settings for the stamping pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampOptions {
    pub attribute: String,
    pub extensions: Vec<String>,
}

impl StampOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            attribute: config.stamp.attribute.clone(),
            extensions: config.stamp.extensions.clone(),
        }
    }
}

impl Default for StampOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// A file with identifiers injected.
#[derive(Debug, Clone)]
pub struct StampedSource {
    pub relative_path: String,
    pub code: String,
    pub map: PositionMap,
    /// Number of elements that received an identifier.
    pub stamped: usize,
}

impl StampedSource {
    /// Source map from the stamped code back to `original`.
    pub fn source_map(&self, original: &str) -> SourceMap {
        SourceMap::from_position_map(&self.map, &self.relative_path, Some(original))
    }
}

/// What the build pipeline should do with a file.
#[derive(Debug, Clone)]
pub enum StampOutcome {
    Transformed(StampedSource),
    /// Nothing to stamp; use the input as is.
    Unchanged,
    Skipped(SkipReason),
}

/// Stamps files of one project. Holds no per-file state.
#[derive(Debug, Clone)]
pub struct Stamper {
    root: ProjectRoot,
    options: StampOptions,
}

impl Stamper {
    pub fn new(root: ProjectRoot, options: StampOptions) -> Self {
        Self { root, options }
    }

    pub fn root(&self) -> &ProjectRoot {
        &self.root
    }

    pub fn options(&self) -> &StampOptions {
        &self.options
    }

    /// Grammar for `path`, or `None` if its extension is not recognized.
    pub fn dialect_for(&self, path: &Path) -> Option<Dialect> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        self.options
            .extensions
            .iter()
            .any(|known| known.trim_start_matches('.').eq_ignore_ascii_case(&extension))
            .then(|| Dialect::from_extension(&extension))
    }

    /// Inject identifiers into `content`, the current text of `path`.
    pub fn stamp(&self, path: &Path, content: &str) -> StampOutcome {
        let Some(dialect) = self.dialect_for(path) else {
            return StampOutcome::Skipped(SkipReason::UnsupportedExtension);
        };
        let Some(relative_path) = self.root.relative_path(path) else {
            return StampOutcome::Skipped(SkipReason::OutsideProject);
        };

        let tree = match SyntaxTree::parse(dialect, content) {
            Ok(tree) => tree,
            Err(err) => {
                tracing::warn!(path = %relative_path, error = %err, "skipping file that failed to parse");
                return StampOutcome::Skipped(SkipReason::ParseFailure(err.to_string()));
            }
        };
        if tree.has_errors() {
            tracing::debug!(path = %relative_path, "stamping a file with syntax errors");
        }

        let attribute = self.options.attribute.as_str();
        let mut rewriter = Rewriter::new(content);
        let _ = tree.visit_elements(|element| {
            if element.opening_has_error() || element.has_attribute(content, attribute) {
                return ControlFlow::<()>::Continue(());
            }
            let identifier =
                LocationIdentifier::new(relative_path.as_str(), element.position(content));
            rewriter.insert(
                element.attribute_insertion_offset(),
                format!(
                    " {attribute}=\"{}\"",
                    escape_attribute_value(&identifier.encode())
                ),
            );
            ControlFlow::Continue(())
        });

        if rewriter.is_empty() {
            tracing::trace!(path = %relative_path, "nothing to stamp");
            return StampOutcome::Unchanged;
        }

        let stamped = rewriter.len();
        let Rewritten { code, map } = rewriter.finish();
        tracing::debug!(path = %relative_path, stamped, "stamped elements");

        StampOutcome::Transformed(StampedSource {
            relative_path,
            code,
            map,
            stamped,
        })
    }
}

fn escape_attribute_value(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}
