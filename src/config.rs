use crate::error::{Result, UpdaterError};
use crate::utils::glob::PatternSet;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex")
});

/// Placeholder in `git.commit_template` replaced by the list of applied updates.
pub const UPDATES_PLACEHOLDER: &str = "{updates}";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Globs a repository directory name must match to be considered.
    pub repo_patterns: Vec<String>,
    /// Exact repository names never updated.
    pub exclude_repos: Vec<String>,
    /// Globs matched against file names inside a repository.
    pub scan_patterns: Vec<String>,
    pub registry: RegistryConfig,
    pub git: GitConfig,
    pub update: UpdateConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub timeout_secs: u64,
    /// Application name (the `<app>` of `<app>_version`) to image reference.
    pub known_images: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    pub default_branch: String,
    pub commit_template: String,
    pub author_name: String,
    pub author_email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    pub push_branches: bool,
    pub batch_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repo_patterns: vec!["ns8-*".to_string()],
            exclude_repos: Vec::new(),
            scan_patterns: vec!["build-images.sh".to_string()],
            registry: RegistryConfig::default(),
            git: GitConfig::default(),
            update: UpdateConfig::default(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        let known_images = [
            ("penpot", "docker.io/penpotapp/frontend"),
            ("nextcloud", "docker.io/nextcloud"),
            ("postgres", "docker.io/postgres"),
            ("redis", "docker.io/redis"),
            ("mariadb", "docker.io/mariadb"),
        ]
        .into_iter()
        .map(|(app, image)| (app.to_string(), image.to_string()))
        .collect();

        Self {
            timeout_secs: 30,
            known_images,
        }
    }
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            default_branch: "updater".to_string(),
            commit_template: format!("Update Docker dependencies\n\n{UPDATES_PLACEHOLDER}"),
            author_name: "NS8 Updater".to_string(),
            author_email: "ns8-updater@example.com".to_string(),
        }
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            push_branches: true,
            batch_size: 10,
        }
    }
}

impl Config {
    /// `$HOME/.config/imgbump/config.json`, or `None` without a home directory.
    pub fn default_path() -> Option<PathBuf> {
        std::env::var_os("HOME")
            .filter(|home| !home.is_empty())
            .map(|home| PathBuf::from(home).join(".config/imgbump/config.json"))
    }

    /// Reads the file at `path`, or returns defaults when it does not exist.
    ///
    /// Fields absent from the file take their default; so do lists and strings
    /// that are present but empty.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            UpdaterError::Configuration(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let mut config: Config = serde_json::from_str(&content).map_err(|e| {
            UpdaterError::Configuration(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })?;
        config.fill_empty_from_defaults();
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        fs::write(path, json)?;
        Ok(())
    }

    fn fill_empty_from_defaults(&mut self) {
        let defaults = Self::default();
        if self.repo_patterns.is_empty() {
            self.repo_patterns = defaults.repo_patterns;
        }
        if self.scan_patterns.is_empty() {
            self.scan_patterns = defaults.scan_patterns;
        }
        if self.git.default_branch.is_empty() {
            self.git.default_branch = defaults.git.default_branch;
        }
        if self.git.commit_template.is_empty() {
            self.git.commit_template = defaults.git.commit_template;
        }
        if self.update.batch_size == 0 {
            self.update.batch_size = defaults.update.batch_size;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.repo_patterns.is_empty() {
            return Err(UpdaterError::Configuration(
                "At least one repository pattern must be specified".to_string(),
            ));
        }
        if self.scan_patterns.is_empty() {
            return Err(UpdaterError::Configuration(
                "At least one scan pattern must be specified".to_string(),
            ));
        }

        self.repo_pattern_set()?;
        self.scan_pattern_set()?;

        if self.git.default_branch.trim().is_empty() {
            return Err(UpdaterError::Configuration(
                "Default branch name cannot be empty".to_string(),
            ));
        }
        if self.git.commit_template.trim().is_empty() {
            return Err(UpdaterError::Configuration(
                "Commit template cannot be empty".to_string(),
            ));
        }
        if !self.git.author_email.is_empty() && !EMAIL_REGEX.is_match(&self.git.author_email) {
            return Err(UpdaterError::Configuration(format!(
                "Invalid author email format: {}",
                self.git.author_email
            )));
        }
        if self.update.batch_size == 0 {
            return Err(UpdaterError::Configuration(
                "Batch size must be greater than 0".to_string(),
            ));
        }
        if self.registry.timeout_secs == 0 {
            return Err(UpdaterError::Configuration(
                "Registry timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn repo_pattern_set(&self) -> Result<PatternSet> {
        PatternSet::compile(&self.repo_patterns)
    }

    pub fn scan_pattern_set(&self) -> Result<PatternSet> {
        PatternSet::compile(&self.scan_patterns)
    }

    pub fn registry_timeout(&self) -> Duration {
        Duration::from_secs(self.registry.timeout_secs)
    }

    /// Invalid patterns never match; `validate` reports them.
    pub fn matches_repo_pattern(&self, name: &str) -> bool {
        self.repo_pattern_set()
            .map(|set| set.matches_any(name))
            .unwrap_or(false)
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.exclude_repos.iter().any(|excluded| excluded == name)
    }

    pub fn should_update_repo(&self, name: &str) -> bool {
        self.matches_repo_pattern(name) && !self.is_excluded(name)
    }

    /// Renders the commit message for the given `Name: current -> latest` lines.
    ///
    /// A template without the placeholder gets the lines appended after a blank line.
    pub fn render_commit_message(&self, update_lines: &[String]) -> String {
        let updates = update_lines.join("\n");
        let template = &self.git.commit_template;
        if template.contains(UPDATES_PLACEHOLDER) {
            template.replace(UPDATES_PLACEHOLDER, &updates)
        } else {
            format!("{}\n\n{}", template.trim_end(), updates)
        }
    }
}
