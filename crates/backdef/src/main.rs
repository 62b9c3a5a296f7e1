use std::process::ExitCode;

use clap::Parser;

fn main() -> anyhow::Result<ExitCode> {
    let cli = backdef::cli::Cli::parse();
    backdef::init(cli.verbose);

    backdef::cli::run(cli)
}
