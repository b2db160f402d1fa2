//! upshift CLI
#![deny(unsafe_code)]

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use owo_colors::OwoColorize;
use tracing::debug;
use upshift::Cli;
use upshift_core::config::ConfigLoader;
use upshift_core::releaser::Releaser;

mod observability;

fn main() -> ExitCode {
    let cli = Cli::parse();
    observability::init(observability::env_filter(cli.quiet, cli.verbose));

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // One formatted line, no stack trace.
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir().context("failed to determine current directory")?;
    let cwd = camino::Utf8PathBuf::try_from(cwd).map_err(|e| {
        anyhow::anyhow!(
            "current directory is not valid UTF-8: {}",
            e.into_path_buf().display()
        )
    })?;

    let mut loader = ConfigLoader::new().with_project_search(&cwd);
    if let Some(ref config_path) = cli.config {
        loader = loader.with_file(config_path);
    }
    let mut config = loader.load().context("failed to load configuration")?;
    cli.apply_to(&mut config);

    debug!(
        file = ?config.file,
        vcs = ?config.vcs,
        dryrun = config.dryrun,
        "configuration resolved"
    );

    let dryrun = config.dryrun;
    let mut releaser = Releaser::new(config, &cwd)?;
    let version = releaser.version.clone();
    releaser.release()?;

    if dryrun {
        println!(
            "{} dry run complete, version {version} was not released",
            "ok".yellow().bold()
        );
    } else {
        println!("{} released version {version}", "ok".green().bold());
    }
    Ok(())
}
