//! Domain-specific errors.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Position inside a definition file. Line `0` designates the whole file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub file: PathBuf,
    pub line: usize,
}

impl Location {
    pub fn new(file: impl Into<PathBuf>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// Location covering an entire file, used when the file itself cannot be read.
    pub fn file(file: impl Into<PathBuf>) -> Self {
        Self::new(file, 0)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            write!(f, "{}", self.file.display())
        } else {
            write!(f, "{}:{}", self.file.display(), self.line)
        }
    }
}

/// Failure that aborts processing of a whole definition file.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("{location}: syntax error: {message}")]
    Parse { location: Location, message: String },

    #[error("{location}: {message}")]
    Configuration { location: Location, message: String },

    #[error("{location}: cannot read {}: {source}", path.display())]
    Io {
        location: Location,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{location}: {message}")]
    CyclicInclusion { location: Location, message: String },
}

impl DefinitionError {
    pub fn location(&self) -> &Location {
        match self {
            Self::Parse { location, .. }
            | Self::Configuration { location, .. }
            | Self::Io { location, .. }
            | Self::CyclicInclusion { location, .. } => location,
        }
    }
}

/// Error raised below the line level, before a source location is known.
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("{0}")]
    Parse(String),

    #[error("{0}")]
    Configuration(String),
}

impl PatternError {
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Pin the error to the definition line that produced it.
    pub fn at(self, location: Location) -> DefinitionError {
        match self {
            Self::Parse(message) => DefinitionError::Parse { location, message },
            Self::Configuration(message) => DefinitionError::Configuration { location, message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_display_omits_line_zero() {
        assert_eq!(Location::file("a.def").to_string(), "a.def");
        assert_eq!(Location::new("a.def", 7).to_string(), "a.def:7");
    }

    #[test]
    fn pattern_error_keeps_kind_when_located() {
        let err = PatternError::configuration("ambiguous").at(Location::new("x.def", 3));
        assert!(matches!(err, DefinitionError::Configuration { .. }));
        assert_eq!(err.location().line, 3);
        assert_eq!(err.to_string(), "x.def:3: ambiguous");
    }
}
