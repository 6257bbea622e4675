use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

mod cli;
mod commands;
mod config;

use cli::{Cli, Commands};
use config::ProjectConfig;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays usable for reports and --json output
    let level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Catalog => {
            let config = ProjectConfig::load(cli.config.as_deref())?;
            commands::catalog(&config)
        }
        Commands::Scan {
            language,
            output,
            approve_all,
            parallel,
        } => {
            let config = ProjectConfig::load(cli.config.as_deref())?;
            commands::scan(&config, language.as_deref(), &output, approve_all, parallel)
        }
        Commands::Apply {
            plan,
            language,
            mode,
            business_types,
            output_dir,
        } => {
            let config = ProjectConfig::load(cli.config.as_deref())?;
            commands::apply(
                &config,
                &plan,
                language.as_deref(),
                mode.into(),
                &business_types,
                output_dir.as_deref(),
            )
        }
        Commands::Merge {
            inputs,
            output,
            resolutions,
            nest,
            json,
        } => commands::merge(&inputs, &output, resolutions.as_deref(), nest, json),
    }
}
