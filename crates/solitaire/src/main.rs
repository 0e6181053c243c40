mod config;
mod game;
mod pack;

use std::process::ExitCode;

use clap::Parser;

use solitaire_engine::device::GpuInit;
use solitaire_engine::logging::{init_logging, LoggingConfig};
use solitaire_engine::window::Runtime;

use config::{Cli, Command};
use game::Solitaire;

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(LoggingConfig {
        env_filter: cli.log.clone(),
        ..Default::default()
    });

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Command::Pack(args)) => pack::run(&args),
        None => {
            let config = cli.run.runtime_config();
            Runtime::run(config, GpuInit::default(), Solitaire::new(cli.run))
        }
    }
}
