//! Project root boundary.
//!
//! Every path the engine parses or writes must resolve inside the project
//! root and outside excluded (dependency/vendor) directories.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::domain::errors::PatchError;

/// Canonical project root plus the excluded directory matcher.
#[derive(Debug, Clone)]
pub struct ProjectRoot {
    given: PathBuf,
    canonical: PathBuf,
    excluded: GlobSet,
}

impl ProjectRoot {
    pub fn new(root: impl AsRef<Path>, excluded: &[String]) -> Result<Self> {
        let given = root.as_ref().to_path_buf();
        let canonical = given
            .canonicalize()
            .with_context(|| format!("project root not found: {}", given.display()))?;
        let excluded = build_excluded_matcher(excluded)?;
        Ok(Self {
            given,
            canonical,
            excluded,
        })
    }

    pub fn path(&self) -> &Path {
        &self.canonical
    }

    /// Project-relative, `/`-separated form of `path` without touching the
    /// filesystem. `None` when the path is outside the root or excluded.
    pub fn relative_path(&self, path: &Path) -> Option<String> {
        let relative = if path.has_root() {
            path.strip_prefix(&self.canonical)
                .or_else(|_| path.strip_prefix(&self.given))
                .ok()?
        } else {
            path
        };

        let segments = normalize_segments(relative)?;
        if segments.is_empty() || self.is_excluded(&segments) {
            return None;
        }
        Some(segments.join("/"))
    }

    /// Resolve a project-relative path from an identifier to an existing
    /// absolute file path.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, PatchError> {
        let deny = |reason| PatchError::AccessDenied {
            path: relative.to_owned(),
            reason,
        };

        let candidate = Path::new(relative);
        if candidate.has_root() || candidate.is_absolute() {
            return Err(deny("absolute paths are not allowed"));
        }
        if relative.split(['/', '\\']).any(|segment| segment == "..") {
            return Err(deny("parent directory segments are not allowed"));
        }
        let segments =
            normalize_segments(candidate).ok_or_else(|| deny("path is not project-relative"))?;
        if segments.is_empty() {
            return Err(deny("path names no file"));
        }
        if self.is_excluded(&segments) {
            return Err(deny("path is inside an excluded directory"));
        }

        let mut joined = self.canonical.clone();
        joined.extend(&segments);
        let resolved = joined
            .canonicalize()
            .map_err(|source| PatchError::NotFound {
                path: joined.clone(),
                source,
            })?;

        // Symlinks may point anywhere; check where the path actually lands.
        let inside = resolved
            .strip_prefix(&self.canonical)
            .ok()
            .and_then(normalize_segments)
            .ok_or_else(|| deny("path resolves outside the project root"))?;
        if self.is_excluded(&inside) {
            return Err(deny("path resolves into an excluded directory"));
        }
        Ok(resolved)
    }

    fn is_excluded(&self, segments: &[String]) -> bool {
        self.excluded.is_match(segments.join("/"))
    }
}

fn normalize_segments(path: &Path) -> Option<Vec<String>> {
    let mut segments = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => segments.push(part.to_str()?.to_owned()),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(segments)
}

fn build_excluded_matcher(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        for expanded in expand_dir_pattern(pattern) {
            let glob = Glob::new(&expanded)
                .with_context(|| format!("invalid excluded directory pattern '{pattern}'"))?;
            builder.add(glob);
        }
    }
    builder
        .build()
        .context("failed to build excluded directory matcher")
}

fn expand_dir_pattern(raw: &str) -> Vec<String> {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Vec::new();
    }
    vec![
        format!("{trimmed}/**"),
        format!("**/{trimmed}/**"),
    ]
}
