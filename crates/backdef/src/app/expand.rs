//! Pattern substitution and pathname expansion.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use globset::{GlobBuilder, GlobMatcher};

use crate::app::extglob::ExtGlob;
use crate::app::pattern::{PatternPath, Segment};
use crate::domain::errors::PatternError;
use crate::domain::model::FollowPolicy;
use crate::infra::env::Environment;

/// Switches controlling pathname expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExpandOptions {
    pub extended_glob: bool,
    pub follow: FollowPolicy,
}

/// A filesystem path matched by a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatch {
    pub path: PathBuf,
    pub follow: bool,
    pub is_dir: bool,
}

/// Performs `~`/`$VAR` substitution followed by glob expansion.
#[derive(Clone)]
pub struct PatternExpander {
    env: Arc<dyn Environment>,
    options: ExpandOptions,
}

impl std::fmt::Debug for PatternExpander {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternExpander")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl PatternExpander {
    pub fn new(env: Arc<dyn Environment>, options: ExpandOptions) -> Self {
        Self { env, options }
    }

    /// Substitute and expand `text`, returning the matched absolute paths.
    pub fn expand(&self, text: &str, base: &Path) -> Result<Vec<PathBuf>, PatternError> {
        let pattern = self.parse(text, base)?;
        Ok(self
            .matches(&pattern)?
            .into_iter()
            .map(|found| found.path)
            .collect())
    }

    /// Substitute `text` and split it into an anchored [`PatternPath`].
    pub fn parse(&self, text: &str, base: &Path) -> Result<PatternPath, PatternError> {
        let substituted = self.substitute(text)?;
        PatternPath::parse(&substituted, base, self.options.extended_glob)
    }

    /// Replace a leading `~` and every `$NAME`/`${NAME}` reference.
    pub fn substitute(&self, text: &str) -> Result<String, PatternError> {
        let text = self.expand_home(text)?;
        self.substitute_vars(&text)
    }

    fn expand_home(&self, text: &str) -> Result<String, PatternError> {
        let Some(rest) = text.strip_prefix('~') else {
            return Ok(text.to_owned());
        };
        if !rest.is_empty() && !rest.starts_with('/') {
            let user: String = rest.chars().take_while(|c| *c != '/').collect();
            return Err(PatternError::parse(format!(
                "unsupported home directory reference '~{user}'"
            )));
        }
        let home = self
            .env
            .home_dir()
            .ok_or_else(|| PatternError::configuration("cannot determine home directory"))?;
        Ok(format!("{}{rest}", home.display()))
    }

    /// Replace `$NAME`/`${NAME}` references; undefined variables become empty.
    pub fn substitute_vars(&self, text: &str) -> Result<String, PatternError> {
        let chars: Vec<char> = text.chars().collect();
        let mut out = String::with_capacity(text.len());
        let mut i = 0;
        while i < chars.len() {
            match chars[i] {
                '\\' => {
                    out.push('\\');
                    if let Some(next) = chars.get(i + 1) {
                        out.push(*next);
                    }
                    i += 2;
                }
                '$' if chars.get(i + 1) == Some(&'{') => {
                    let close = chars[i + 2..]
                        .iter()
                        .position(|c| *c == '}')
                        .ok_or_else(|| PatternError::parse("unterminated '${' reference"))?;
                    let name: String = chars[i + 2..i + 2 + close].iter().collect();
                    out.push_str(&self.env.var(&name).unwrap_or_default());
                    i += close + 3;
                }
                '$' if chars
                    .get(i + 1)
                    .is_some_and(|c| c.is_ascii_alphabetic() || *c == '_') =>
                {
                    let len = chars[i + 1..]
                        .iter()
                        .take_while(|c| c.is_ascii_alphanumeric() || **c == '_')
                        .count();
                    let name: String = chars[i + 1..i + 1 + len].iter().collect();
                    out.push_str(&self.env.var(&name).unwrap_or_default());
                    i += len + 1;
                }
                other => {
                    out.push(other);
                    i += 1;
                }
            }
        }
        Ok(out)
    }

    /// Expand a parsed pattern against the filesystem, in lexicographic order.
    ///
    /// A pattern without wildcards is returned as is, whether or not it exists.
    pub fn matches(&self, pattern: &PatternPath) -> Result<Vec<PathMatch>, PatternError> {
        let found = if pattern.has_wildcard() {
            self.walk(pattern.segments())?
        } else {
            vec![pattern.literal_path()]
        };

        let mut results = Vec::with_capacity(found.len());
        for path in found {
            if pattern.has_trailing_slash() && is_dir(&path) {
                let children = list_dir(&path)
                    .into_iter()
                    .filter(|name| !name.starts_with('.'))
                    .map(|name| path.join(name))
                    .collect::<Vec<_>>();
                if !children.is_empty() {
                    results.extend(children.into_iter().map(|child| self.describe(child, false)));
                    continue;
                }
            }
            results.push(self.describe(path, true));
        }
        Ok(results)
    }

    fn walk(&self, segments: &[Segment]) -> Result<Vec<PathBuf>, PatternError> {
        let mut current = vec![PathBuf::from("/")];
        for (index, segment) in segments.iter().enumerate() {
            let last = index + 1 == segments.len();
            let mut next = Vec::new();
            if segment.is_wildcard() {
                let matcher = SegmentMatcher::new(segment.raw(), self.options.extended_glob)?;
                for dir in &current {
                    for name in list_dir(dir) {
                        if !matcher.is_match(&name) {
                            continue;
                        }
                        let candidate = dir.join(&name);
                        if last || self.descends(&candidate) {
                            next.push(candidate);
                        }
                    }
                }
            } else {
                let name = segment.name();
                for dir in &current {
                    let candidate = dir.join(&name);
                    let keep = if last {
                        fs::symlink_metadata(&candidate).is_ok()
                    } else {
                        is_dir(&candidate)
                    };
                    if keep {
                        next.push(candidate);
                    }
                }
            }
            current = next;
            if current.is_empty() {
                break;
            }
        }
        Ok(current)
    }

    /// Whether a wildcard walk may continue below `path`.
    fn descends(&self, path: &Path) -> bool {
        if self.options.follow == FollowPolicy::Never && is_symlink(path) {
            return false;
        }
        is_dir(path)
    }

    fn describe(&self, path: PathBuf, specified: bool) -> PathMatch {
        let follow = match self.options.follow {
            FollowPolicy::Never => false,
            FollowPolicy::Pattern => specified && is_symlink(&path),
            FollowPolicy::Always => true,
        };
        PathMatch {
            is_dir: is_dir(&path),
            follow,
            path,
        }
    }
}

enum SegmentMatcher {
    Standard { glob: GlobMatcher, dot: bool },
    Extended { glob: ExtGlob, dot: bool },
}

impl SegmentMatcher {
    fn new(raw: &str, extended: bool) -> Result<Self, PatternError> {
        let dot = raw.starts_with('.') || raw.starts_with("\\.");
        if extended {
            return Ok(Self::Extended {
                glob: ExtGlob::new(raw),
                dot,
            });
        }
        let glob = GlobBuilder::new(&escape_braces(raw))
            .literal_separator(true)
            .backslash_escape(true)
            .build()
            .map_err(|err| PatternError::parse(format!("invalid glob '{raw}': {err}")))?;
        Ok(Self::Standard {
            glob: glob.compile_matcher(),
            dot,
        })
    }

    /// Names starting with `.` only match segments that start with `.` too.
    fn is_match(&self, name: &str) -> bool {
        match self {
            Self::Standard { glob, dot } => (*dot || !name.starts_with('.')) && glob.is_match(name),
            Self::Extended { glob, dot } => (*dot || !name.starts_with('.')) && glob.is_match(name),
        }
    }
}

/// Braces are literal in shell globs; globset would treat them as alternation.
fn escape_braces(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                out.push(c);
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

fn list_dir(dir: &Path) -> Vec<String> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::debug!(path = %dir.display(), error = %err, "skipping unreadable directory");
            return Vec::new();
        }
    };
    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn is_dir(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|meta| meta.is_dir())
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|meta| meta.file_type().is_symlink())
}
