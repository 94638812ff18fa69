mod agents;
mod cli;
mod config;
mod error;
mod model;
mod registry;
mod utils;
mod workflow;

use clap::Parser;
use cli::{Cli, Commands, ConfigAction};
use colored::Colorize;
use std::process;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use workflow::Settings;

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("{} {}", "Warning:".yellow().bold(), e);
    }

    let settings = Settings {
        base_dir: cli.base_dir,
        config_path: cli.config,
        author_name: cli.author_name,
        author_email: cli.author_email,
    };

    let result = match cli.command {
        Commands::Scan => workflow::execute_scan(&settings),
        Commands::Update {
            repository,
            branch,
            only,
        } => workflow::execute_update(&settings, repository.as_deref(), branch, only),
        Commands::List => workflow::execute_list(&settings),
        Commands::Json => workflow::execute_json(&settings),
        Commands::Config { action } => match action {
            ConfigAction::Show => workflow::execute_config_show(&settings),
            ConfigAction::Init { force } => workflow::execute_config_init(&settings, force),
        },
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}
