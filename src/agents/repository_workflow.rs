use crate::agents::repository_scanner::RepositoryScannerAgent;
use crate::agents::update_applier::UpdateApplier;
use crate::agents::version_control::{VersionControl, VersionControlProvider, branch_name};
use crate::config::Config;
use crate::error::Result;
use crate::model::{Dependency, RepositoryHandle, UpdateOutcome};
use crate::registry::VersionResolver;
use jiff::Timestamp;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info, warn};

pub const NOTHING_TO_UPDATE: &str = "No dependencies need updating";

/// Where a repository is in the scan → apply → commit → push sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Scanning,
    Diffing,
    BranchReady,
    Applying,
    Committing,
    Pushing,
    Done,
    Failed,
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowState::Scanning => "scanning",
            WorkflowState::Diffing => "diffing",
            WorkflowState::BranchReady => "branch-ready",
            WorkflowState::Applying => "applying",
            WorkflowState::Committing => "committing",
            WorkflowState::Pushing => "pushing",
            WorkflowState::Done => "done",
            WorkflowState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Caller choices for one update run.
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// Dependency names to update; empty means every dependency with a newer version.
    pub selected: Vec<String>,
    /// Overrides `git.default_branch` as the branch name prefix.
    pub branch_base: Option<String>,
}

impl UpdateOptions {
    fn wants(&self, dependency: &Dependency) -> bool {
        self.selected.is_empty() || self.selected.iter().any(|name| *name == dependency.name)
    }
}

/// Drives a single repository through the update state machine.
pub struct RepositoryWorkflow<'a> {
    repository: &'a RepositoryHandle,
    config: &'a Config,
    scanner: &'a RepositoryScannerAgent,
    resolver: &'a VersionResolver<'a>,
    state: WorkflowState,
}

impl<'a> RepositoryWorkflow<'a> {
    pub fn new(
        repository: &'a RepositoryHandle,
        config: &'a Config,
        scanner: &'a RepositoryScannerAgent,
        resolver: &'a VersionResolver<'a>,
    ) -> Self {
        Self {
            repository,
            config,
            scanner,
            resolver,
            state: WorkflowState::Scanning,
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    fn transition(&mut self, next: WorkflowState) {
        debug!(
            repository = %self.repository.name,
            from = %self.state,
            to = %next,
            "workflow transition"
        );
        self.state = next;
    }

    fn fail(&mut self, outcome: UpdateOutcome) -> UpdateOutcome {
        self.transition(WorkflowState::Failed);
        warn!(repository = %self.repository.name, "{}", outcome.message);
        outcome
    }

    /// Scanning and Diffing: every dependency in the repository with its latest version attached.
    pub fn scan(&mut self) -> Result<Vec<Dependency>> {
        self.transition(WorkflowState::Scanning);
        let mut dependencies = self.scanner.scan_repository(&self.repository.path)?;

        self.transition(WorkflowState::Diffing);
        for dependency in &mut dependencies {
            self.resolver.resolve(dependency);
        }
        Ok(dependencies)
    }

    /// Full run: scan, then update whatever is out of date.
    ///
    /// Version control is opened through `provider` only once there is something to
    /// update, so an up-to-date repository never spawns a git process.
    pub fn run(
        &mut self,
        provider: &dyn VersionControlProvider,
        options: &UpdateOptions,
        now: Timestamp,
    ) -> UpdateOutcome {
        let name = self.repository.name.clone();
        let dependencies = match self.scan() {
            Ok(dependencies) => dependencies,
            Err(e) => {
                return self.fail(UpdateOutcome::failed(
                    &name,
                    format!("Failed to scan dependencies: {e}"),
                ));
            }
        };

        if !dependencies
            .iter()
            .any(|d| d.has_update() && options.wants(d))
        {
            self.transition(WorkflowState::Done);
            info!(repository = %name, "{NOTHING_TO_UPDATE}");
            return UpdateOutcome::succeeded(&name, NOTHING_TO_UPDATE);
        }

        let vcs = match provider.open(self.repository) {
            Ok(vcs) => vcs,
            Err(e) => {
                return self.fail(UpdateOutcome::failed(
                    &name,
                    format!("Failed to open repository: {e}"),
                ));
            }
        };

        match vcs.current_branch() {
            Ok(branch) => debug!(repository = %name, branch, "starting from branch"),
            Err(e) => {
                return self.fail(UpdateOutcome::failed(
                    &name,
                    format!("Failed to get current branch: {e}"),
                ));
            }
        }

        self.update(vcs.as_ref(), dependencies, options, now)
    }

    /// Branch, apply, commit and push for already resolved `dependencies`.
    ///
    /// Edits made before a failure stay on disk.
    pub fn update(
        &mut self,
        vcs: &dyn VersionControl,
        dependencies: Vec<Dependency>,
        options: &UpdateOptions,
        now: Timestamp,
    ) -> UpdateOutcome {
        let name = self.repository.name.clone();
        let pending: Vec<Dependency> = dependencies
            .into_iter()
            .filter(|d| d.has_update() && options.wants(d))
            .collect();

        if pending.is_empty() {
            self.transition(WorkflowState::Done);
            info!(repository = %name, "{NOTHING_TO_UPDATE}");
            return UpdateOutcome::succeeded(&name, NOTHING_TO_UPDATE);
        }

        let base = options
            .branch_base
            .as_deref()
            .unwrap_or(&self.config.git.default_branch);
        let branch = branch_name(base, now);
        if let Err(e) = vcs.create_or_checkout_branch(&branch) {
            return self.fail(UpdateOutcome::failed(
                &name,
                format!("Failed to create update branch: {e}"),
            ));
        }
        self.transition(WorkflowState::BranchReady);

        self.transition(WorkflowState::Applying);
        let mut changed: Vec<Dependency> = Vec::new();
        let mut files: Vec<PathBuf> = Vec::new();
        for dependency in pending {
            match UpdateApplier::apply_dependency(&dependency) {
                Ok(true) => {
                    if !files.contains(&dependency.file) {
                        files.push(dependency.file.clone());
                    }
                    changed.push(dependency);
                }
                Ok(false) => debug!(
                    repository = %name,
                    dependency = %dependency.name,
                    "declaration not found in file, nothing written"
                ),
                Err(e) => {
                    let mut outcome = UpdateOutcome::failed(
                        &name,
                        format!("Failed to apply update for {}: {e}", dependency.name),
                    );
                    outcome.branch = Some(branch);
                    return self.fail(outcome);
                }
            }
        }

        if changed.is_empty() {
            self.transition(WorkflowState::Done);
            let mut outcome = UpdateOutcome::succeeded(&name, NOTHING_TO_UPDATE);
            outcome.branch = Some(branch);
            return outcome;
        }

        self.transition(WorkflowState::Committing);
        let lines: Vec<String> = changed
            .iter()
            .map(|d| format!("{}: {} -> {}", d.name, d.current_version, d.latest_version))
            .collect();
        let message = self.config.render_commit_message(&lines);
        let commit = match vcs.stage_and_commit(&message, &files) {
            Ok(commit) => commit,
            Err(e) => {
                let mut outcome =
                    UpdateOutcome::failed(&name, format!("Failed to commit changes: {e}"));
                outcome.branch = Some(branch);
                return self.fail(outcome);
            }
        };

        let summary = if self.config.update.push_branches {
            self.transition(WorkflowState::Pushing);
            if let Err(e) = vcs.push(&branch) {
                let mut outcome =
                    UpdateOutcome::failed(&name, format!("Failed to push branch: {e}"));
                outcome.branch = Some(branch);
                outcome.commit = Some(commit);
                return self.fail(outcome);
            }
            format!(
                "Updated {} dependencies and pushed to branch {}",
                changed.len(),
                branch
            )
        } else {
            format!(
                "Updated {} dependencies on branch {} (push disabled)",
                changed.len(),
                branch
            )
        };

        self.transition(WorkflowState::Done);
        info!(repository = %name, commit = %commit, "{summary}");
        UpdateOutcome {
            repository: name,
            dependencies: changed,
            success: true,
            message: summary,
            branch: Some(branch),
            commit: Some(commit),
        }
    }
}
