//! Command line surface.

use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::app::plan::{Plan, PlanOptions, Planner};
use crate::app::reader::STDIN_NAME;
use crate::app::render;
use crate::domain::errors::DefinitionError;
use crate::domain::model::{Compression, Destination, FollowPolicy, Mode};
use crate::infra::config::Config;
use crate::infra::env::ProcessEnvironment;

#[derive(Debug, Parser)]
#[command(
    name = "backdef",
    version,
    about = "Plan archive and sync runs from backup definition files"
)]
pub struct Cli {
    /// Report per-file summaries and skipped patterns on stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Plan one tar archive per definition file.
    Archive(ArchiveArgs),
    /// Plan a sync of the matched paths to a destination.
    Sync(SyncArgs),
}

#[derive(Debug, Args)]
pub struct ArchiveArgs {
    /// Directory the archives are written to.
    #[arg(short = 't', long = "target", value_name = "DIR")]
    pub target: Option<PathBuf>,
    /// Archive name format; `{}` is the definition file name, `%` sequences are dates.
    #[arg(short = 'a', long = "name", value_name = "FMT")]
    pub name_format: Option<String>,
    /// Compress with gzip.
    #[arg(short = 'z', long, conflicts_with = "bzip2")]
    pub gzip: bool,
    /// Compress with bzip2.
    #[arg(short = 'j', long)]
    pub bzip2: bool,
    #[command(flatten)]
    pub common: CommonArgs,
    /// Definition files.
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Destination directory or `[user@]host:path`.
    #[arg(short = 't', long = "target", value_name = "DEST")]
    pub target: Option<String>,
    /// Read sources below SRC instead of their implied directories.
    #[arg(short = 's', long = "source", value_name = "SRC")]
    pub source: Option<PathBuf>,
    #[command(flatten)]
    pub common: CommonArgs,
    /// Definition files; standard input when omitted.
    #[arg(value_name = "FILE")]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Args)]
pub struct CommonArgs {
    /// Follow every symbolic link.
    #[arg(short = 'L', long = "dereference", conflicts_with = "follow_specified")]
    pub follow_all: bool,
    /// Follow symbolic links named directly by a pattern.
    #[arg(short = 'H', long = "follow-specified")]
    pub follow_specified: bool,
    /// Enable extended globbing: ?() *() +() @() !().
    #[arg(short = 'e', long = "extglob")]
    pub extglob: bool,
    /// Print plans as JSON.
    #[arg(long)]
    pub json: bool,
}

impl CommonArgs {
    fn apply(&self, options: &mut PlanOptions) {
        if self.follow_all {
            options.expand.follow = FollowPolicy::Always;
        } else if self.follow_specified {
            options.expand.follow = FollowPolicy::Pattern;
        }
        if self.extglob {
            options.expand.extended_glob = true;
        }
    }
}

/// Execute a parsed command line. Returns failure when any definition file failed.
pub fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::load().context("failed to load configuration")?;
    let base_dir = env::current_dir().context("failed to determine working directory")?;

    let (options, files, json) = match cli.command {
        Command::Archive(args) => {
            let mut options = PlanOptions::from_config(&config, Mode::Archive);
            args.common.apply(&mut options);
            options.archive_dir = args.target;
            if let Some(format) = args.name_format {
                options.name_format = format;
            }
            if args.gzip {
                options.compression = Compression::Gzip;
            } else if args.bzip2 {
                options.compression = Compression::Bzip2;
            }
            (options, args.files, args.common.json)
        }
        Command::Sync(args) => {
            let mut options = PlanOptions::from_config(&config, Mode::Sync);
            args.common.apply(&mut options);
            options.destination = Some(match args.target.as_deref() {
                Some(target) => Destination::parse(target),
                None => Destination::local(&base_dir),
            });
            options.source_root = args.source;
            (options, args.files, args.common.json)
        }
    };

    let planner = Planner::new(Arc::new(ProcessEnvironment), options, base_dir);
    let outcomes = if files.is_empty() {
        vec![(PathBuf::from(STDIN_NAME), planner.plan_stdin())]
    } else {
        planner.plan_files(&files)
    };
    report(&outcomes, json)
}

fn report(outcomes: &[(PathBuf, Result<Plan, DefinitionError>)], json: bool) -> Result<ExitCode> {
    // Failures were already logged by the planner.
    let plans: Vec<&Plan> = outcomes
        .iter()
        .filter_map(|(_, outcome)| outcome.as_ref().ok())
        .collect();

    let mut stdout = io::stdout().lock();
    if json {
        serde_json::to_writer_pretty(&mut stdout, &plans).context("failed to encode plans")?;
        writeln!(stdout)?;
    } else {
        for plan in &plans {
            write!(stdout, "{}", render::listing(plan))?;
        }
    }

    if plans.len() == outcomes.len() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
