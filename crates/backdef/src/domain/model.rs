//! Domain models for definition records, expanded paths, and work items.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::errors::Location;

/// Leading character selecting special handling for a definition line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Marker {
    Plain,
    /// `%`: copy the matches into a staging directory first.
    Copy,
    /// `!`: purge destination files absent from the sources.
    Purge,
    /// `@`: splice in the lines of other definition files.
    Include,
}

impl Marker {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '%' => Some(Marker::Copy),
            '!' => Some(Marker::Purge),
            '@' => Some(Marker::Include),
            _ => None,
        }
    }
}

/// One pattern line of a definition file, after comment and quote handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternRecord {
    pub marker: Marker,
    pub text: String,
    pub location: Location,
    /// Staging group, set only for [`Marker::Copy`] records.
    pub group_label: Option<String>,
}

/// A concrete path produced by expanding a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpandedPath {
    pub path: PathBuf,
    pub implied_root: PathBuf,
    pub follow: bool,
    pub is_dir: bool,
}

/// Unit handed to the directive builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub path: PathBuf,
    pub implied_root: PathBuf,
    pub marker: Marker,
    pub group_label: Option<String>,
    pub follow: bool,
    pub is_dir: bool,
}

impl WorkItem {
    pub fn new(expanded: ExpandedPath, record: &PatternRecord) -> Self {
        Self {
            path: expanded.path,
            implied_root: expanded.implied_root,
            marker: record.marker,
            group_label: record.group_label.clone(),
            follow: expanded.follow,
            is_dir: expanded.is_dir,
        }
    }
}

/// Which external tool the definitions are destined for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    Archive,
    Sync,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Archive => write!(f, "archive"),
            Mode::Sync => write!(f, "sync"),
        }
    }
}

/// Symbolic link handling during expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum FollowPolicy {
    /// Never follow symbolic links.
    #[default]
    Never,
    /// Follow links matched directly by a pattern.
    #[serde(alias = "pattern-specified")]
    Pattern,
    /// Follow every symbolic link.
    Always,
}

impl FromStr for FollowPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "never" | "none" | "no" => Ok(FollowPolicy::Never),
            "pattern" | "pattern-specified" | "h" => Ok(FollowPolicy::Pattern),
            "always" | "all" | "l" => Ok(FollowPolicy::Always),
            other => Err(format!("unknown symlink policy '{other}'")),
        }
    }
}

/// Compression applied to finished archives by the invocation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum Compression {
    /// Plain tar archive.
    #[default]
    None,
    /// gzip, `.gz` suffix.
    Gzip,
    /// bzip2, `.bz2` suffix.
    Bzip2,
}

impl Compression {
    pub fn extension(&self) -> &'static str {
        match self {
            Compression::None => "",
            Compression::Gzip => ".gz",
            Compression::Bzip2 => ".bz2",
        }
    }
}

impl FromStr for Compression {
    type Err = CompressionParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(Compression::None),
            "gzip" | "gz" | "z" => Ok(Compression::Gzip),
            "bzip2" | "bz2" | "j" => Ok(Compression::Bzip2),
            other => Err(CompressionParseError::Unknown(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum CompressionParseError {
    #[error("unknown compression '{0}'")]
    Unknown(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Locality {
    Local,
    Remote,
}

/// Target of a run, classified once by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Destination {
    pub root: String,
    pub locality: Locality,
}

impl Destination {
    pub fn local(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into().display().to_string(),
            locality: Locality::Local,
        }
    }

    pub fn remote(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            locality: Locality::Remote,
        }
    }

    /// Classify a target the way rsync does: `rsync://...` and `[user@]host:path`
    /// (a colon before the first slash) are remote.
    pub fn parse(target: &str) -> Self {
        if target.starts_with("rsync://") {
            return Self::remote(target);
        }
        let head = target.split('/').next().unwrap_or_default();
        if head.contains(':') && !is_drive_letter(head) {
            Self::remote(target)
        } else {
            Self::local(target)
        }
    }

    pub fn is_local(&self) -> bool {
        self.locality == Locality::Local
    }
}

fn is_drive_letter(head: &str) -> bool {
    let bytes = head.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
