//! Configuration management utilities.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use dirs_next::config_dir;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::app::reader::DEFAULT_MAX_INCLUDE_DEPTH;
use crate::domain::model::{Compression, FollowPolicy};

static DEFAULT_CONFIG: Lazy<&'static str> =
    Lazy::new(|| include_str!("../../assets/default-config.toml"));
static DEFAULT_WORKSPACE_CONFIG_PATH: &str = ".backdef/config.toml";

/// Layered configuration loaded from defaults, user, workspace, and env.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub expand: Expand,
    #[serde(default)]
    pub archive: Archive,
}

/// Pathname expansion settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Expand {
    #[serde(default)]
    extended_glob: Option<bool>,
    #[serde(default)]
    follow_symlinks: Option<FollowPolicy>,
    #[serde(default)]
    max_include_depth: Option<usize>,
}

impl Expand {
    pub fn extended_glob(&self) -> bool {
        self.extended_glob.unwrap_or(false)
    }

    pub fn follow_symlinks(&self) -> FollowPolicy {
        self.follow_symlinks.unwrap_or_default()
    }

    pub fn max_include_depth(&self) -> usize {
        self.max_include_depth.unwrap_or(DEFAULT_MAX_INCLUDE_DEPTH)
    }
}

/// Archive naming settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Archive {
    #[serde(default)]
    name_format: Option<String>,
    #[serde(default)]
    compression: Option<Compression>,
}

impl Archive {
    fn default_name_format() -> &'static str {
        "{}"
    }

    pub fn name_format(&self) -> String {
        self.name_format
            .clone()
            .unwrap_or_else(|| Self::default_name_format().to_owned())
    }

    pub fn compression(&self) -> Compression {
        self.compression.unwrap_or_default()
    }
}

/// Environment overrides for critical settings.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    extended_glob: Option<String>,
    follow_symlinks: Option<String>,
    archive_format: Option<String>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            extended_glob: env::var("BACKDEF_EXTGLOB").ok(),
            follow_symlinks: env::var("BACKDEF_FOLLOW").ok(),
            archive_format: env::var("BACKDEF_ARCHIVE_FORMAT").ok(),
        }
    }

    #[cfg(test)]
    fn for_tests(extended_glob: &str, follow_symlinks: &str, archive_format: &str) -> Self {
        Self {
            extended_glob: Some(extended_glob.to_owned()),
            follow_symlinks: Some(follow_symlinks.to_owned()),
            archive_format: Some(archive_format.to_owned()),
        }
    }
}

impl Config {
    /// Load configuration from defaults, user/global config, workspace config, and env overrides.
    pub fn load() -> Result<Self> {
        let env = EnvOverrides::from_env();
        let global = global_config_path();
        let workspace = workspace_config_path()?;
        Self::load_with_layers(global, workspace, env)
    }

    fn load_with_layers(
        global: Option<PathBuf>,
        workspace: Option<PathBuf>,
        env_overrides: EnvOverrides,
    ) -> Result<Self> {
        let mut layers: Vec<Config> = Vec::new();

        layers.push(Self::from_str(&DEFAULT_CONFIG)?);

        if let Some(global_path) = global.filter(|path| path.exists()) {
            layers.push(Self::from_file(&global_path)?);
        }

        if let Some(workspace_path) = workspace.filter(|path| path.exists()) {
            layers.push(Self::from_file(&workspace_path)?);
        }

        let merged = layers.into_iter().reduce(Config::merge).unwrap_or_default();
        apply_env_overrides(merged, env_overrides)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_str(&data)
            .with_context(|| format!("invalid config file: {}", path.display()))
    }

    fn from_str(contents: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(contents).with_context(|| "failed to parse TOML config".to_string())?;
        Ok(config)
    }

    fn merge(self, other: Self) -> Self {
        Self {
            expand: merge_expand(self.expand, other.expand),
            archive: merge_archive(self.archive, other.archive),
        }
    }
}

fn merge_expand(mut base: Expand, overlay: Expand) -> Expand {
    if let Some(value) = overlay.extended_glob {
        base.extended_glob = Some(value);
    }
    if let Some(value) = overlay.follow_symlinks {
        base.follow_symlinks = Some(value);
    }
    if let Some(value) = overlay.max_include_depth {
        base.max_include_depth = Some(value);
    }
    base
}

fn merge_archive(mut base: Archive, overlay: Archive) -> Archive {
    if let Some(value) = overlay.name_format {
        base.name_format = Some(value);
    }
    if let Some(value) = overlay.compression {
        base.compression = Some(value);
    }
    base
}

fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|base| base.join("backdef/config.toml"))
}

fn workspace_config_path() -> Result<Option<PathBuf>> {
    let cwd = env::current_dir()?;
    Ok(find_workspace_config(&cwd))
}

/// Nearest ancestor of `start` (inclusive) carrying a workspace config file.
fn find_workspace_config(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(DEFAULT_WORKSPACE_CONFIG_PATH))
        .find(|candidate| candidate.is_file())
}

fn apply_env_overrides(mut config: Config, env: EnvOverrides) -> Result<Config> {
    if let Some(value) = env.extended_glob {
        config.expand.extended_glob = Some(parse_flag(&value).context("BACKDEF_EXTGLOB")?);
    }
    if let Some(value) = env.follow_symlinks {
        let policy = value
            .parse::<FollowPolicy>()
            .map_err(|err| anyhow!(err))
            .context("BACKDEF_FOLLOW")?;
        config.expand.follow_symlinks = Some(policy);
    }
    if let Some(format) = env.archive_format {
        config.archive.name_format = Some(format);
    }
    Ok(config)
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(anyhow!("expected a boolean, got '{other}'")),
    }
}
