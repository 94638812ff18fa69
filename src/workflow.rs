use crate::agents::repository_workflow::UpdateOptions;
use crate::agents::update_service::UpdateService;
use crate::agents::version_control::{GitAuthor, GitProvider};
use crate::config::Config;
use crate::error::{Result, UpdaterError};
use crate::model::UpdateOutcome;
use crate::registry::RegistryClient;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use jiff::Timestamp;
use std::path::{Path, PathBuf};

/// Global command-line settings every command starts from.
pub struct Settings {
    pub base_dir: PathBuf,
    pub config_path: Option<PathBuf>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
}

impl Settings {
    fn config_path(&self) -> Result<PathBuf> {
        self.config_path
            .clone()
            .or_else(Config::default_path)
            .ok_or_else(|| {
                UpdaterError::Configuration(
                    "Cannot determine the config file location; pass --config".to_string(),
                )
            })
    }

    /// Loads the config file and layers the author overrides on top.
    fn load_config(&self) -> Result<Config> {
        let mut config = Config::load(&self.config_path()?)?;
        if let Some(name) = &self.author_name {
            config.git.author_name = name.clone();
        }
        if let Some(email) = &self.author_email {
            config.git.author_email = email.clone();
        }
        Ok(config)
    }
}

struct Runtime {
    config: Config,
    registry: RegistryClient,
    git: GitProvider,
}

impl Runtime {
    fn new(settings: &Settings) -> Result<Self> {
        let config = settings.load_config()?;
        config.validate()?;

        let registry = RegistryClient::new(config.registry_timeout())?;
        let git = GitProvider::new(GitAuthor {
            name: config.git.author_name.clone(),
            email: config.git.author_email.clone(),
        });

        Ok(Self {
            config,
            registry,
            git,
        })
    }

    fn service(&self, base_dir: &Path) -> Result<UpdateService<'_>> {
        UpdateService::new(&self.config, base_dir, &self.registry, &self.git)
    }
}

/// Execute the scan workflow (dry-run)
pub fn execute_scan(settings: &Settings) -> Result<()> {
    println!("{}", "Scanning repositories for image updates...".cyan().bold());

    let runtime = Runtime::new(settings)?;
    let service = runtime.service(&settings.base_dir)?;
    let outcomes = service.scan_all()?;

    if outcomes.is_empty() {
        print_no_repositories(&settings.base_dir);
        return Ok(());
    }

    for outcome in &outcomes {
        print_scan_outcome(outcome);
    }

    let pending: usize = outcomes.iter().map(UpdateOutcome::pending_updates).sum();
    if pending == 0 {
        println!("{}", "✨ All dependencies are up to date!".green().bold());
    } else {
        println!(
            "{}",
            format!("Found {} update(s) across {} repositories", pending, outcomes.len()).yellow()
        );
        println!("\n{}", "To apply these updates, run:".dimmed());
        println!("  {}", "imgbump update".cyan());
    }

    Ok(())
}

fn print_scan_outcome(outcome: &UpdateOutcome) {
    println!("{}", outcome.repository.white().bold());
    if !outcome.success {
        println!("  {} {}", "✗".red(), outcome.message.red());
        println!();
        return;
    }

    println!("  {}", outcome.message.dimmed());
    for dep in &outcome.dependencies {
        if dep.has_update() {
            println!(
                "  • {} {} → {}",
                dep.name.white().bold(),
                dep.current_version.red(),
                dep.latest_version.green().bold()
            );
        } else {
            println!(
                "  • {} {} {}",
                dep.name,
                dep.current_version.dimmed(),
                "(up to date)".dimmed()
            );
        }
    }
    println!();
}

/// Execute the update workflow
pub fn execute_update(
    settings: &Settings,
    repository: Option<&str>,
    branch: Option<String>,
    only: Vec<String>,
) -> Result<()> {
    println!("{}", "Starting dependency update process...".cyan().bold());

    let runtime = Runtime::new(settings)?;
    let service = runtime.service(&settings.base_dir)?;
    let options = UpdateOptions {
        selected: only,
        branch_base: branch,
    };
    let now = Timestamp::now();

    let outcomes = match repository {
        Some(name) => {
            println!("\n{}", format!("Updating repository {name}...").yellow());
            vec![service.update_repository(name, &options, now)?]
        }
        None => {
            let total = service.repositories()?.len();
            if total == 0 {
                print_no_repositories(&settings.base_dir);
                return Ok(());
            }

            println!("\n{}", format!("Updating {total} repositories...").yellow());
            let pb = ProgressBar::new(total as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("  [{bar:40}] {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=>-"),
            );

            let outcomes = service.update_all(&options, now, |outcome| {
                pb.set_message(outcome.repository.clone());
                pb.inc(1);
            })?;
            pb.finish_and_clear();
            outcomes
        }
    };

    println!();
    for outcome in &outcomes {
        print_update_outcome(outcome);
    }

    let failed = outcomes.iter().filter(|o| !o.success).count();
    if failed == 0 {
        println!("{}", "✨ Update process completed successfully!".green().bold());
    } else {
        println!(
            "{}",
            format!("{failed} of {} repositories failed", outcomes.len())
                .red()
                .bold()
        );
    }

    Ok(())
}

fn print_update_outcome(outcome: &UpdateOutcome) {
    println!("{}", outcome.repository.white().bold());
    if !outcome.success {
        println!("  {} {}", "✗".red(), outcome.message.red());
        println!();
        return;
    }

    println!("  {} {}", "✓".green(), outcome.message.green());
    if let Some(branch) = &outcome.branch {
        println!("  Branch: {}", branch.bright_cyan());
    }
    if let Some(commit) = &outcome.commit {
        println!("  Commit: {}", commit.dimmed());
    }
    for dep in &outcome.dependencies {
        println!(
            "  • {} {} → {}",
            dep.name.white().bold(),
            dep.current_version.red(),
            dep.latest_version.green().bold()
        );
    }
    println!();
}

/// Execute the list workflow - display discovered repositories
pub fn execute_list(settings: &Settings) -> Result<()> {
    let runtime = Runtime::new(settings)?;
    let service = runtime.service(&settings.base_dir)?;
    let repositories = service.repositories()?;

    if repositories.is_empty() {
        print_no_repositories(&settings.base_dir);
        return Ok(());
    }

    println!(
        "{}",
        format!("Found {} repositories:", repositories.len()).cyan().bold()
    );
    for repo in &repositories {
        let excluded = if runtime.config.is_excluded(&repo.name) {
            " (excluded)".yellow().to_string()
        } else {
            String::new()
        };
        println!("\n  {}{}", repo.name.white().bold(), excluded);
        println!("    Path: {}", repo.path.display().to_string().dimmed());
        match &repo.url {
            Some(url) => println!("    URL:  {}", url.dimmed()),
            None => println!("    URL:  {}", "(no origin remote)".dimmed()),
        }
    }

    Ok(())
}

/// Scan and print the outcomes as pretty JSON on stdout.
pub fn execute_json(settings: &Settings) -> Result<()> {
    let runtime = Runtime::new(settings)?;
    let service = runtime.service(&settings.base_dir)?;
    let outcomes = service.scan_all()?;
    println!("{}", serde_json::to_string_pretty(&outcomes)?);
    Ok(())
}

pub fn execute_config_show(settings: &Settings) -> Result<()> {
    let path = settings.config_path()?;
    let config = settings.load_config()?;

    let source = if path.exists() {
        path.display().to_string()
    } else {
        format!("{} (not found, using defaults)", path.display())
    };
    println!("{} {}", "Configuration:".cyan().bold(), source.dimmed());
    println!("{}", serde_json::to_string_pretty(&config)?);

    if let Err(e) = config.validate() {
        println!("\n{} {}", "⚠ Warning:".yellow().bold(), e);
    }
    Ok(())
}

pub fn execute_config_init(settings: &Settings, force: bool) -> Result<()> {
    let path = settings.config_path()?;
    if path.exists() && !force {
        return Err(UpdaterError::Configuration(format!(
            "{} already exists; pass --force to overwrite it",
            path.display()
        )));
    }

    Config::default().save(&path)?;
    println!(
        "{}",
        format!("✓ Default configuration created at {}", path.display()).green()
    );
    Ok(())
}

fn print_no_repositories(base_dir: &Path) {
    println!(
        "{}",
        "No repositories matching the configured patterns were found.".yellow()
    );
    println!("Base directory: {}", base_dir.display());
}
