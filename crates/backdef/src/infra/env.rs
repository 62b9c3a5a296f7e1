//! Process environment access for home-directory and variable substitution.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

/// Source of the values substituted into patterns.
pub trait Environment: Send + Sync {
    fn home_dir(&self) -> Option<PathBuf>;
    fn var(&self, name: &str) -> Option<String>;
}

/// Reads the invoking user's real environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn home_dir(&self) -> Option<PathBuf> {
        dirs_next::home_dir()
    }

    fn var(&self, name: &str) -> Option<String> {
        env::var(name).ok()
    }
}

/// Fixed environment, for embedding callers and tests.
#[derive(Debug, Default, Clone)]
pub struct StaticEnvironment {
    home: Option<PathBuf>,
    vars: HashMap<String, String>,
}

impl StaticEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }
}

impl Environment for StaticEnvironment {
    fn home_dir(&self) -> Option<PathBuf> {
        self.home.clone()
    }

    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}
