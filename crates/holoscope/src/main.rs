mod cli;
mod config;
mod inspect;
mod paths;
mod run;

use anyhow::Result;
use cli::Command;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Run(args) => run::run(config_path, args),
        Command::Inspect(args) => inspect::inspect(config_path, args),
        Command::Config(config) => config::handle_config_command(config_path, config.action),
    }
}
