use crate::agents::repository_finder::RepositoryFinder;
use crate::agents::repository_scanner::RepositoryScannerAgent;
use crate::agents::repository_workflow::{RepositoryWorkflow, UpdateOptions};
use crate::agents::version_control::VersionControlProvider;
use crate::config::Config;
use crate::error::{Result, UpdaterError};
use crate::model::{RepositoryHandle, UpdateOutcome};
use crate::registry::{TagSource, VersionResolver};
use jiff::Timestamp;
use std::path::Path;
use tracing::{debug, info};

pub const EXCLUDED: &str = "Repository excluded by configuration";

/// Runs the per-repository workflow over every discovered checkout, one at a time.
pub struct UpdateService<'a> {
    config: &'a Config,
    finder: RepositoryFinder,
    scanner: RepositoryScannerAgent,
    tags: &'a dyn TagSource,
    vcs: &'a dyn VersionControlProvider,
}

impl<'a> UpdateService<'a> {
    /// Validates `config` before anything touches the disk or network.
    pub fn new(
        config: &'a Config,
        base_dir: &Path,
        tags: &'a dyn TagSource,
        vcs: &'a dyn VersionControlProvider,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            finder: RepositoryFinder::new(base_dir)?,
            scanner: RepositoryScannerAgent::new(config.scan_pattern_set()?)?,
            tags,
            vcs,
        })
    }

    /// Checkouts whose name matches `repo_patterns`, excluded ones included.
    pub fn repositories(&self) -> Result<Vec<RepositoryHandle>> {
        self.finder.discover(&self.config.repo_pattern_set()?)
    }

    /// Scans and resolves every repository without touching any file.
    pub fn scan_all(&self) -> Result<Vec<UpdateOutcome>> {
        let repositories = self.repositories()?;
        Ok(repositories.iter().map(|repo| self.scan_one(repo)).collect())
    }

    fn scan_one(&self, repository: &RepositoryHandle) -> UpdateOutcome {
        if !self.config.should_update_repo(&repository.name) {
            return UpdateOutcome::failed(&repository.name, EXCLUDED);
        }

        let resolver = self.resolver();
        let mut workflow =
            RepositoryWorkflow::new(repository, self.config, &self.scanner, &resolver);
        match workflow.scan() {
            Ok(dependencies) => {
                let mut outcome = UpdateOutcome::succeeded(
                    &repository.name,
                    format!("Found {} dependencies", dependencies.len()),
                );
                outcome.dependencies = dependencies;
                outcome
            }
            Err(e) => UpdateOutcome::failed(
                &repository.name,
                format!("Failed to scan dependencies: {e}"),
            ),
        }
    }

    /// Updates the repository called `name`; unknown names are an error.
    pub fn update_repository(
        &self,
        name: &str,
        options: &UpdateOptions,
        now: Timestamp,
    ) -> Result<UpdateOutcome> {
        let repository = self
            .repositories()?
            .into_iter()
            .find(|repo| repo.name == name)
            .ok_or_else(|| {
                UpdaterError::Configuration(format!("Repository {name} not found"))
            })?;

        Ok(self.update_one(&repository, options, now))
    }

    /// Updates every repository in batches of `update.batch_size`.
    ///
    /// `on_outcome` sees each outcome as soon as its repository finishes; a failed
    /// repository never stops the ones after it.
    pub fn update_all<F>(
        &self,
        options: &UpdateOptions,
        now: Timestamp,
        mut on_outcome: F,
    ) -> Result<Vec<UpdateOutcome>>
    where
        F: FnMut(&UpdateOutcome),
    {
        let repositories = self.repositories()?;
        let batches = repositories.len().div_ceil(self.config.update.batch_size);
        let mut outcomes = Vec::with_capacity(repositories.len());

        for (index, batch) in repositories
            .chunks(self.config.update.batch_size)
            .enumerate()
        {
            info!(batch = index + 1, of = batches, size = batch.len(), "updating batch");
            for repository in batch {
                let outcome = self.update_one(repository, options, now);
                on_outcome(&outcome);
                outcomes.push(outcome);
            }
        }

        Ok(outcomes)
    }

    fn update_one(
        &self,
        repository: &RepositoryHandle,
        options: &UpdateOptions,
        now: Timestamp,
    ) -> UpdateOutcome {
        if !self.config.should_update_repo(&repository.name) {
            return UpdateOutcome::failed(&repository.name, EXCLUDED);
        }

        let resolver = self.resolver();
        let mut workflow =
            RepositoryWorkflow::new(repository, self.config, &self.scanner, &resolver);
        let outcome = workflow.run(self.vcs, options, now);
        debug!(repository = %repository.name, state = %workflow.state(), "workflow finished");
        outcome
    }

    fn resolver(&self) -> VersionResolver<'_> {
        VersionResolver::new(self.tags, &self.config.registry.known_images)
    }
}
