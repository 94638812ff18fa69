use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "imgbump",
    about = "Finds container image pins in build scripts and bumps them on a fresh git branch",
    version,
    author
)]
pub struct Cli {
    /// Directory whose immediate subdirectories are the repositories to process
    #[arg(short = 'd', long, env = "IMGBUMP_BASE_DIR", default_value = ".", global = true)]
    pub base_dir: PathBuf,

    /// Configuration file (defaults to ~/.config/imgbump/config.json)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Commit author name, overriding git.author_name
    #[arg(long, env = "GIT_NAME", global = true)]
    pub author_name: Option<String>,

    /// Commit author email, overriding git.author_email
    #[arg(long, env = "GIT_EMAIL", global = true)]
    pub author_email: Option<String>,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan repositories and report available updates without changing anything
    Scan,

    /// Apply available updates on a new branch, commit and push
    Update {
        /// Only update this repository (defaults to every matching repository)
        #[arg(value_name = "REPOSITORY")]
        repository: Option<String>,

        /// Branch name prefix, overriding git.default_branch
        #[arg(short, long, value_name = "NAME")]
        branch: Option<String>,

        /// Only update the named dependencies (repeatable)
        #[arg(long = "only", value_name = "NAME")]
        only: Vec<String>,
    },

    /// List discovered repositories
    List,

    /// Scan repositories and print the results as JSON
    Json,

    /// Show or create the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_update_with_selection() {
        let cli = Cli::try_parse_from([
            "imgbump", "-d", "/srv/apps", "update", "ns8-demo", "--branch", "deps", "--only",
            "postgres", "--only", "redis",
        ])
        .unwrap();

        assert_eq!(cli.base_dir, PathBuf::from("/srv/apps"));
        match cli.command {
            Commands::Update {
                repository,
                branch,
                only,
            } => {
                assert_eq!(repository.as_deref(), Some("ns8-demo"));
                assert_eq!(branch.as_deref(), Some("deps"));
                assert_eq!(only, vec!["postgres", "redis"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_config_init() {
        let cli = Cli::try_parse_from(["imgbump", "config", "init", "--force"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Init { force: true }
            }
        ));
    }
}
