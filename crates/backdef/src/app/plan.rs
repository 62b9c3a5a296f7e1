//! Drives definition files through reading, expansion, implication and assembly.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use time::OffsetDateTime;

use crate::app::directives::{DirectiveBuilder, Directives};
use crate::app::expand::{ExpandOptions, PatternExpander};
use crate::app::implied::{ImplicationResolver, ImpliedDepth};
use crate::app::naming::{ArchiveName, archive_name};
use crate::app::reader::{PatternFileReader, STDIN_LABEL, STDIN_NAME, default_label};
use crate::domain::errors::{DefinitionError, Location, PatternError};
use crate::domain::model::{
    Compression, Destination, ExpandedPath, Marker, Mode, PatternRecord, WorkItem,
};
use crate::infra::config::Config;
use crate::infra::env::Environment;

/// Runtime options for one planning run.
#[derive(Debug, Clone)]
pub struct PlanOptions {
    pub mode: Mode,
    pub expand: ExpandOptions,
    pub max_include_depth: usize,
    /// Sync target; purge sets mirror implied roots here.
    pub destination: Option<Destination>,
    /// Replaces the implied directory of every pattern before globbing.
    pub source_root: Option<PathBuf>,
    pub name_format: String,
    pub compression: Compression,
    /// Directory the archives are written to.
    pub archive_dir: Option<PathBuf>,
}

impl PlanOptions {
    /// Build options from configuration defaults.
    pub fn from_config(config: &Config, mode: Mode) -> Self {
        Self {
            mode,
            expand: ExpandOptions {
                extended_glob: config.expand.extended_glob(),
                follow: config.expand.follow_symlinks(),
            },
            max_include_depth: config.expand.max_include_depth(),
            destination: None,
            source_root: None,
            name_format: config.archive.name_format(),
            compression: config.archive.compression(),
            archive_dir: None,
        }
    }
}

/// Where an archive run writes its output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveTarget {
    #[serde(flatten)]
    pub name: ArchiveName,
    pub path: PathBuf,
}

/// Everything the invocation layer needs for one definition file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub source: PathBuf,
    pub archive: Option<ArchiveTarget>,
    pub directives: Directives,
}

pub struct Planner {
    expander: PatternExpander,
    resolver: ImplicationResolver,
    options: PlanOptions,
    base_dir: PathBuf,
    now: OffsetDateTime,
}

impl Planner {
    /// `base_dir` anchors relative definition files and patterns; it must be absolute.
    pub fn new(env: Arc<dyn Environment>, options: PlanOptions, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            expander: PatternExpander::new(env, options.expand),
            resolver: ImplicationResolver::new(),
            options,
            base_dir: base_dir.into(),
            now: OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc()),
        }
    }

    /// Fix the timestamp used for archive names.
    pub fn with_clock(mut self, now: OffsetDateTime) -> Self {
        self.now = now;
        self
    }

    pub fn plan_file(&self, path: &Path) -> Result<Plan, DefinitionError> {
        let records = self.reader().read_file(path)?;
        self.build(path, &default_label(path), records)
    }

    pub fn plan_stdin(&self) -> Result<Plan, DefinitionError> {
        let name = Path::new(STDIN_NAME);
        self.reader()
            .read_stdin()
            .and_then(|records| self.build(name, STDIN_LABEL, records))
            .inspect_err(|err| warn_failed(name, err))
    }

    /// Plan in-memory definition text attributed to `name`.
    pub fn plan_str(&self, name: &Path, text: &str) -> Result<Plan, DefinitionError> {
        let label = default_label(name);
        let records = self.reader().read_str(name, text, &label)?;
        self.build(name, &label, records)
    }

    /// Plan independent files in parallel. Outcomes keep the input order.
    pub fn plan_files(&self, paths: &[PathBuf]) -> Vec<(PathBuf, Result<Plan, DefinitionError>)> {
        paths
            .par_iter()
            .map(|path| {
                let outcome = self.plan_file(path);
                if let Err(err) = &outcome {
                    warn_failed(path, err);
                }
                (path.clone(), outcome)
            })
            .collect()
    }

    fn reader(&self) -> PatternFileReader<'_> {
        PatternFileReader::new(&self.expander, &self.base_dir)
            .with_max_depth(self.options.max_include_depth)
    }

    fn build(
        &self,
        source: &Path,
        label: &str,
        records: Vec<PatternRecord>,
    ) -> Result<Plan, DefinitionError> {
        let mut builder = DirectiveBuilder::new(self.options.mode, self.options.destination.clone());
        builder.validate_records(&records)?;

        for record in &records {
            self.expand_record(record, &mut builder)
                .map_err(|err| err.at(record.location.clone()))?;
        }
        let directives = builder.finish();

        let archive = match self.options.mode {
            Mode::Archive => Some(
                self.archive_target(label)
                    .map_err(|err| err.at(Location::file(source)))?,
            ),
            Mode::Sync => None,
        };

        tracing::info!(
            file = %source.display(),
            members = directives.members.len(),
            copy_groups = directives.copy_groups.len(),
            purge_sets = directives.purge_sets.len(),
            "planned definition file"
        );
        Ok(Plan {
            source: source.to_path_buf(),
            archive,
            directives,
        })
    }

    fn expand_record(
        &self,
        record: &PatternRecord,
        builder: &mut DirectiveBuilder,
    ) -> Result<(), PatternError> {
        let pattern = self.expander.parse(&record.text, &self.base_dir)?;
        let mut depth = self.resolver.resolve(&pattern)?;
        let pattern = match &self.options.source_root {
            Some(root) => {
                let (rerooted, new_depth) = pattern.reroot(depth.0, &self.base_dir.join(root))?;
                depth = ImpliedDepth(new_depth);
                rerooted
            }
            None => pattern,
        };

        if record.marker == Marker::Purge {
            let implied_part = pattern.implied_part(depth.0);
            if implied_part.is_empty() {
                return Err(PatternError::configuration(
                    "purge pattern names nothing below its implied directory",
                ));
            }
            let implied_root = self.resolver.apply(depth, &pattern.literal_path());
            builder.add_purge(implied_root, implied_part);
        }

        let matches = self.expander.matches(&pattern)?;
        if matches.is_empty() {
            tracing::info!(location = %record.location, pattern = %record.text, "pattern matched nothing");
        } else {
            tracing::debug!(
                location = %record.location,
                pattern = %record.text,
                matches = matches.len(),
                "expanded pattern"
            );
        }

        for found in matches {
            let expanded = ExpandedPath {
                implied_root: self.resolver.apply(depth, &found.path),
                path: found.path,
                follow: found.follow,
                is_dir: found.is_dir,
            };
            builder.push(WorkItem::new(expanded, record));
        }
        Ok(())
    }

    fn archive_target(&self, label: &str) -> Result<ArchiveTarget, PatternError> {
        let name = archive_name(
            &self.options.name_format,
            label,
            self.options.compression,
            &self.expander,
            self.now,
        )?;
        let dir = match &self.options.archive_dir {
            Some(dir) => self.base_dir.join(dir),
            None => self.base_dir.clone(),
        };
        Ok(ArchiveTarget {
            path: dir.join(&name.file_name),
            name,
        })
    }
}

fn warn_failed(source: &Path, err: &DefinitionError) {
    tracing::warn!(file = %source.display(), error = %err, "definition file failed");
}
