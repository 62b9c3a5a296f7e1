//! Implied-root resolution: how much of each matched path is mirrored at the destination.
//!
//! The decision is structural. It is made once per pattern as a component
//! count ([`ImpliedDepth`]) and then replayed on every path the pattern
//! expands to, so all expansions of one pattern agree:
//!
//! 1. `/./` in the pattern: the root ends at the component before the marker.
//! 2. A wildcard in a non-final segment: the root ends at that segment's parent.
//! 3. Otherwise the root is the parent of the matched path.
//!
//! A trailing `/` adds no component, so the children it expands to keep the
//! directory name in their preserved part.

use std::path::{Component, Path, PathBuf};

use crate::app::pattern::PatternPath;
use crate::domain::errors::PatternError;

/// Number of components, below the filesystem root, that form the implied root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ImpliedDepth(pub usize);

#[derive(Debug, Default, Clone, Copy)]
pub struct ImplicationResolver;

impl ImplicationResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, pattern: &PatternPath) -> Result<ImpliedDepth, PatternError> {
        let first_wildcard = pattern.first_wildcard();

        if let Some(marker) = pattern.marker() {
            if first_wildcard.is_some_and(|index| index < marker) {
                return Err(PatternError::configuration(
                    "wildcard before the '/./' marker makes the implied directory ambiguous",
                ));
            }
            return Ok(ImpliedDepth(marker));
        }

        let count = pattern.segments().len();
        match first_wildcard {
            Some(index) if index + 1 < count => Ok(ImpliedDepth(index)),
            _ => Ok(ImpliedDepth(count.saturating_sub(1))),
        }
    }

    /// Truncate `path` to its first `depth` components below the root.
    pub fn apply(&self, depth: ImpliedDepth, path: &Path) -> PathBuf {
        let mut root = PathBuf::new();
        let mut taken = 0;
        for component in path.components() {
            match component {
                Component::Prefix(_) | Component::RootDir => root.push(component),
                _ if taken < depth.0 => {
                    root.push(component);
                    taken += 1;
                }
                _ => break,
            }
        }
        root
    }

    /// Resolve a single expansion of a parsed pattern.
    pub fn resolve_path(&self, pattern: &PatternPath, path: &Path) -> Result<PathBuf, PatternError> {
        let depth = self.resolve(pattern)?;
        Ok(self.apply(depth, path))
    }

    /// Parse an absolute, already substituted pattern and resolve one of its expansions.
    pub fn resolve_text(&self, text: &str, expanded: &Path) -> Result<PathBuf, PatternError> {
        let pattern = PatternPath::parse(text, Path::new("/"), false)?;
        self.resolve_path(&pattern, expanded)
    }
}

/// `path` relative to `implied_root`: the part preserved at the destination.
pub fn preserved_part(path: &Path, implied_root: &Path) -> PathBuf {
    path.strip_prefix(implied_root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}
