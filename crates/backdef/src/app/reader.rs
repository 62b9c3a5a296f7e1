//! Definition-file tokenizer: comments, quoting, markers, copy labels, and inclusion.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::app::expand::PatternExpander;
use crate::domain::errors::{DefinitionError, Location, PatternError};
use crate::domain::model::{Marker, PatternRecord};

pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 32;
pub const STDIN_NAME: &str = "<stdin>";
pub const STDIN_LABEL: &str = "stdin";

static GROUP_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#\s*%\s*(\S+)").expect("group label regex compiles"));

/// A definition line after comment, marker, and quote handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Blank,
    Comment {
        label: Option<String>,
    },
    Pattern {
        marker: Marker,
        text: String,
        label: Option<String>,
    },
}

/// Split a line into its code part (trailing whitespace trimmed) and its comment.
///
/// `#` starts the comment unless it is backslash-escaped or inside double quotes.
pub fn split_comment(line: &str) -> Result<(&str, Option<&str>), PatternError> {
    let mut in_quote = false;
    let mut chars = line.char_indices();
    while let Some((index, c)) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '"' => in_quote = !in_quote,
            '#' if !in_quote => return Ok((line[..index].trim_end(), Some(&line[index..]))),
            _ => {}
        }
    }
    if in_quote {
        return Err(PatternError::parse("unterminated quote"));
    }
    Ok((line.trim_end(), None))
}

/// The code part of a line. Applying it twice yields the same text.
pub fn strip_comment(line: &str) -> Result<&str, PatternError> {
    split_comment(line).map(|(code, _)| code)
}

/// Remove quoting: enclosing `"` are dropped, `\"` and `\#` become literal.
/// Other backslash sequences are kept for the glob layer.
pub fn unquote(code: &str) -> Result<String, PatternError> {
    let mut out = String::with_capacity(code.len());
    let mut in_quote = false;
    let mut chars = code.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(next @ ('"' | '#')) => out.push(next),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            },
            '"' => in_quote = !in_quote,
            other => out.push(other),
        }
    }
    if in_quote {
        return Err(PatternError::parse("unterminated quote"));
    }
    Ok(out)
}

/// Label named by a `# %label` comment. Labels name staging directories, so
/// they must be a single path component.
fn group_label(comment: &str) -> Result<Option<String>, PatternError> {
    let Some(label) = GROUP_LABEL
        .captures(comment)
        .and_then(|captures| captures.get(1))
        .map(|label| label.as_str())
    else {
        return Ok(None);
    };
    if label.contains('/') || label == "." || label == ".." {
        return Err(PatternError::parse(format!(
            "copy label '{label}' is not a plain directory name"
        )));
    }
    Ok(Some(label.to_owned()))
}

/// Classify one raw line.
pub fn parse_line(raw: &str) -> Result<Line, PatternError> {
    let line = raw.trim();
    if line.is_empty() {
        return Ok(Line::Blank);
    }

    let (code, comment) = split_comment(line)?;
    let label = comment.map(group_label).transpose()?.flatten();
    let Some(first) = code.chars().next() else {
        return Ok(Line::Comment { label });
    };

    let (marker, rest) = match Marker::from_char(first) {
        Some(marker) => (marker, code[first.len_utf8()..].trim_start()),
        None => (Marker::Plain, code),
    };
    if rest.is_empty() {
        return Err(PatternError::parse(format!("missing pattern after '{first}'")));
    }

    let text = unquote(rest)?;
    if text.is_empty() {
        return Err(PatternError::parse("empty pattern"));
    }
    Ok(Line::Pattern {
        marker,
        text,
        label,
    })
}

/// Copy-group label accumulator folded over the line sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelState {
    default: String,
    active: Option<String>,
}

impl LabelState {
    pub fn new(default: impl Into<String>) -> Self {
        Self {
            default: default.into(),
            active: None,
        }
    }

    pub fn current(&self) -> &str {
        self.active.as_deref().unwrap_or(&self.default)
    }

    /// Advance over one line. Returns the new state and, for copy lines, the label to attach.
    pub fn fold(self, line: &Line) -> (Self, Option<String>) {
        let labelled = match line {
            Line::Blank => return (self.reset(), None),
            Line::Comment { label } | Line::Pattern { label, .. } => match label {
                Some(label) => Self {
                    active: Some(label.clone()),
                    ..self
                },
                None => self,
            },
        };
        match line {
            Line::Pattern {
                marker: Marker::Copy,
                ..
            } => {
                let label = labelled.current().to_owned();
                (labelled, Some(label))
            }
            Line::Pattern {
                marker: Marker::Plain | Marker::Purge,
                ..
            } => (labelled.reset(), None),
            _ => (labelled, None),
        }
    }

    fn reset(self) -> Self {
        Self {
            active: None,
            ..self
        }
    }
}

/// Reads definition text into ordered [`PatternRecord`]s, splicing inclusions in place.
#[derive(Debug)]
pub struct PatternFileReader<'a> {
    expander: &'a PatternExpander,
    base_dir: PathBuf,
    max_depth: usize,
}

struct ReadState {
    records: Vec<PatternRecord>,
    labels: LabelState,
    active: Vec<PathBuf>,
}

impl<'a> PatternFileReader<'a> {
    /// `base_dir` anchors relative file names; it must be absolute.
    pub fn new(expander: &'a PatternExpander, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            expander,
            base_dir: base_dir.into(),
            max_depth: DEFAULT_MAX_INCLUDE_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Read a definition file. Copy labels default to the file's base name.
    pub fn read_file(&self, path: &Path) -> Result<Vec<PatternRecord>, DefinitionError> {
        let text = fs::read_to_string(self.base_dir.join(path)).map_err(|source| DefinitionError::Io {
            location: Location::file(path),
            path: path.to_path_buf(),
            source,
        })?;
        let label = default_label(path);
        self.read_source(path, &text, &label)
    }

    /// Read definitions from standard input.
    pub fn read_stdin(&self) -> Result<Vec<PatternRecord>, DefinitionError> {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .map_err(|source| DefinitionError::Io {
                location: Location::file(STDIN_NAME),
                path: PathBuf::from(STDIN_NAME),
                source,
            })?;
        self.read_str(Path::new(STDIN_NAME), &text, STDIN_LABEL)
    }

    /// Read in-memory definition text attributed to `name`.
    pub fn read_str(
        &self,
        name: &Path,
        text: &str,
        default_label: &str,
    ) -> Result<Vec<PatternRecord>, DefinitionError> {
        let mut state = ReadState {
            records: Vec::new(),
            labels: LabelState::new(default_label),
            active: Vec::new(),
        };
        let dir = self.directory_of(name);
        self.read_lines(name, &dir, text, 0, &mut state)?;
        Ok(state.records)
    }

    fn read_source(
        &self,
        path: &Path,
        text: &str,
        default_label: &str,
    ) -> Result<Vec<PatternRecord>, DefinitionError> {
        let mut state = ReadState {
            records: Vec::new(),
            labels: LabelState::new(default_label),
            active: vec![self.identity(path)],
        };
        let dir = self.directory_of(path);
        self.read_lines(path, &dir, text, 0, &mut state)?;
        Ok(state.records)
    }

    fn read_lines(
        &self,
        name: &Path,
        dir: &Path,
        text: &str,
        depth: usize,
        state: &mut ReadState,
    ) -> Result<(), DefinitionError> {
        for (index, raw) in text.lines().enumerate() {
            let location = Location::new(name, index + 1);
            let line = parse_line(raw).map_err(|err| err.at(location.clone()))?;

            let (labels, group_label) = state.labels.clone().fold(&line);
            state.labels = labels;

            let Line::Pattern { marker, text, .. } = line else {
                continue;
            };
            if marker == Marker::Include {
                self.include(&text, dir, &location, depth, state)?;
                continue;
            }
            state.records.push(PatternRecord {
                marker,
                text,
                location,
                group_label,
            });
        }
        Ok(())
    }

    fn include(
        &self,
        text: &str,
        dir: &Path,
        location: &Location,
        depth: usize,
        state: &mut ReadState,
    ) -> Result<(), DefinitionError> {
        if depth >= self.max_depth {
            return Err(DefinitionError::CyclicInclusion {
                location: location.clone(),
                message: format!("inclusion nested deeper than {} levels", self.max_depth),
            });
        }

        let pattern = self
            .expander
            .parse(text, dir)
            .map_err(|err| err.at(location.clone()))?;
        let mut files: Vec<PathBuf> = self
            .expander
            .matches(&pattern)
            .map_err(|err| err.at(location.clone()))?
            .into_iter()
            .map(|found| found.path)
            .collect();
        if files.is_empty() {
            files.push(pattern.literal_path());
        }

        for file in files {
            let identity = self.identity(&file);
            if state.active.contains(&identity) {
                return Err(DefinitionError::CyclicInclusion {
                    location: location.clone(),
                    message: format!("{} includes itself", file.display()),
                });
            }
            let contents = fs::read_to_string(&file).map_err(|source| DefinitionError::Io {
                location: location.clone(),
                path: file.clone(),
                source,
            })?;
            tracing::debug!(file = %file.display(), from = %location, "including definitions");

            state.active.push(identity);
            let included_dir = self.directory_of(&file);
            self.read_lines(&file, &included_dir, &contents, depth + 1, state)?;
            state.active.pop();
        }
        Ok(())
    }

    fn directory_of(&self, path: &Path) -> PathBuf {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => self.base_dir.join(parent),
            _ => self.base_dir.clone(),
        }
    }

    fn identity(&self, path: &Path) -> PathBuf {
        let absolute = self.base_dir.join(path);
        fs::canonicalize(&absolute).unwrap_or(absolute)
    }
}

/// File base name without its suffix.
pub fn default_label(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| STDIN_LABEL.to_owned())
}
