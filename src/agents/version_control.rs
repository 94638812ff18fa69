use crate::error::{Result, UpdaterError};
use crate::model::RepositoryHandle;
use crate::utils::path_validator::PathValidator;
use jiff::Timestamp;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::debug;

/// Branch, commit and push primitives the update workflow needs from a checkout.
pub trait VersionControl {
    fn current_branch(&self) -> Result<String>;

    /// Checks out `name`, creating it from the current HEAD when it does not exist.
    fn create_or_checkout_branch(&self, name: &str) -> Result<()>;

    /// Stages exactly `files` and commits them; returns the new commit id.
    fn stage_and_commit(&self, message: &str, files: &[PathBuf]) -> Result<String>;

    fn push(&self, branch: &str) -> Result<()>;
}

/// Opens a [`VersionControl`] for a discovered repository.
pub trait VersionControlProvider {
    fn open(&self, repository: &RepositoryHandle) -> Result<Box<dyn VersionControl>>;
}

/// Identity recorded on update commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitAuthor {
    pub name: String,
    pub email: String,
}

pub struct GitProvider {
    author: GitAuthor,
}

impl GitProvider {
    pub fn new(author: GitAuthor) -> Self {
        Self { author }
    }
}

impl VersionControlProvider for GitProvider {
    fn open(&self, repository: &RepositoryHandle) -> Result<Box<dyn VersionControl>> {
        let agent = VersionControlAgent::new(&repository.path, self.author.clone())?;
        Ok(Box::new(agent))
    }
}

/// VersionControlAgent drives the `git` binary with hardened input validation.
pub struct VersionControlAgent {
    repo_path: PathBuf,
    author: GitAuthor,
}

impl VersionControlAgent {
    pub fn new<P: AsRef<Path>>(repo_path: P, author: GitAuthor) -> Result<Self> {
        let repo_path = Self::validate_git_path(repo_path.as_ref())?;
        Ok(Self { repo_path, author })
    }

    fn branch_exists(&self, name: &str) -> Result<bool> {
        let reference = format!("refs/heads/{name}");
        let output = self.run_git(&["rev-parse", "--verify", "--quiet", &reference])?;
        Ok(output.status.success())
    }

    fn run_git(&self, args: &[&str]) -> Result<Output> {
        debug!(repo = %self.repo_path.display(), "git {}", args.join(" "));
        Command::new("git")
            .current_dir(&self.repo_path)
            .args(args)
            .output()
            .map_err(|e| {
                UpdaterError::GitOperation(format!(
                    "Failed to execute git command '{}': {e}",
                    args.join(" ")
                ))
            })
    }

    fn ensure_success(output: &Output, command: &str) -> Result<()> {
        if output.status.success() {
            return Ok(());
        }

        Err(UpdaterError::GitOperation(format!(
            "{} failed: {}",
            command,
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }

    fn validate_git_path(path: &Path) -> Result<PathBuf> {
        let dangerous = [';', '|', '&', '$', '`', '\n', '\r'];
        let path_str = path.to_string_lossy();
        if let Some(ch) = dangerous.iter().find(|c| path_str.contains(**c)) {
            return Err(UpdaterError::GitOperation(format!(
                "Path contains dangerous character: '{}'",
                ch
            )));
        }

        if !path.is_absolute() {
            return Err(UpdaterError::GitOperation(
                "Only absolute paths are allowed for Git operations".to_string(),
            ));
        }

        PathValidator::validate_base_dir(path)
            .map_err(|err| UpdaterError::GitOperation(format!("Invalid Git path: {}", err)))
    }

    fn validate_branch(name: &str) -> Result<()> {
        if name.is_empty() || name.starts_with('-') {
            return Err(UpdaterError::GitOperation(format!(
                "Refusing to use branch name '{name}'"
            )));
        }
        Ok(())
    }
}

impl VersionControl for VersionControlAgent {
    fn current_branch(&self) -> Result<String> {
        let output = self.run_git(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        Self::ensure_success(&output, "git rev-parse")?;

        let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if branch == "HEAD" {
            return Err(UpdaterError::GitOperation("Not on a branch".to_string()));
        }
        Ok(branch)
    }

    fn create_or_checkout_branch(&self, name: &str) -> Result<()> {
        Self::validate_branch(name)?;

        if self.branch_exists(name)? {
            let output = self.run_git(&["checkout", name])?;
            Self::ensure_success(&output, "git checkout")
        } else {
            let output = self.run_git(&["checkout", "-b", name])?;
            Self::ensure_success(&output, "git checkout -b")
        }
    }

    fn stage_and_commit(&self, message: &str, files: &[PathBuf]) -> Result<String> {
        let relative = files
            .iter()
            .map(|file| {
                PathValidator::relative_within(file, &self.repo_path)
                    .map(|p| p.to_string_lossy().into_owned())
            })
            .collect::<Result<Vec<_>>>()?;

        let mut add_args = vec!["add", "--"];
        add_args.extend(relative.iter().map(String::as_str));
        let output = self.run_git(&add_args)?;
        Self::ensure_success(&output, "git add")?;

        let name_setting = format!("user.name={}", self.author.name);
        let email_setting = format!("user.email={}", self.author.email);
        let output = self.run_git(&[
            "-c",
            &name_setting,
            "-c",
            &email_setting,
            "commit",
            "-m",
            message,
        ])?;
        Self::ensure_success(&output, "git commit")?;

        let output = self.run_git(&["rev-parse", "HEAD"])?;
        Self::ensure_success(&output, "git rev-parse HEAD")?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn push(&self, branch: &str) -> Result<()> {
        Self::validate_branch(branch)?;
        let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
        let output = self.run_git(&["push", "origin", &refspec])?;
        Self::ensure_success(&output, "git push")
    }
}

/// `{base}-{YYYYmmdd-HHMMSS}` in UTC, restricted to characters git accepts everywhere.
pub fn branch_name(base: &str, now: Timestamp) -> String {
    let stamp = now.strftime("%Y%m%d-%H%M%S");
    format!("{}-{}", base.trim(), stamp)
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '/' | '.' => c,
            _ => '-',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{tempdir, tempdir_in};

    fn author() -> GitAuthor {
        GitAuthor {
            name: "Test Bot".to_string(),
            email: "bot@example.com".to_string(),
        }
    }

    fn git_available() -> bool {
        Command::new("git").arg("--version").output().is_ok()
    }

    fn git(dir: &Path, args: &[&str]) -> String {
        let output = Command::new("git").current_dir(dir).args(args).output().unwrap();
        assert!(output.status.success(), "git {:?} failed", args);
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    #[test]
    fn rejects_relative_paths() {
        let cwd = std::env::current_dir().unwrap();
        let temp = tempdir_in(&cwd).unwrap();
        let relative = PathBuf::from(temp.path().file_name().unwrap());
        assert!(VersionControlAgent::new(&relative, author()).is_err());
    }

    #[test]
    fn rejects_dangerous_paths() {
        let dir = tempdir().unwrap();
        let dangerous = dir.path().join("sub;dir");
        fs::create_dir_all(&dangerous).unwrap();
        assert!(VersionControlAgent::new(dangerous, author()).is_err());
    }

    #[test]
    fn branch_name_uses_utc_timestamp() {
        let now: Timestamp = "2024-03-05T07:08:09Z".parse().unwrap();
        assert_eq!(branch_name("updater", now), "updater-20240305-070809");
        assert_eq!(branch_name("deps update", now), "deps-update-20240305-070809");
    }

    #[test]
    fn commits_only_listed_files_on_new_branch() {
        if !git_available() {
            return;
        }

        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        git(&root, &["init", "--quiet"]);
        fs::write(root.join("build-images.sh"), "app_version=\"1.0.0\"\n").unwrap();
        fs::write(root.join("other.txt"), "one\n").unwrap();
        git(&root, &["add", "."]);
        git(
            &root,
            &["-c", "user.name=Seed", "-c", "user.email=seed@example.com", "commit", "--quiet", "-m", "seed"],
        );

        let agent = VersionControlAgent::new(&root, author()).unwrap();
        agent.create_or_checkout_branch("updater-test").unwrap();
        assert_eq!(agent.current_branch().unwrap(), "updater-test");

        fs::write(root.join("build-images.sh"), "app_version=\"1.1.0\"\n").unwrap();
        fs::write(root.join("other.txt"), "two\n").unwrap();
        let commit = agent
            .stage_and_commit("Update app", &[root.join("build-images.sh")])
            .unwrap();

        assert_eq!(commit, git(&root, &["rev-parse", "HEAD"]));
        assert_eq!(git(&root, &["log", "-1", "--format=%an <%ae>"]), "Test Bot <bot@example.com>");
        assert_eq!(git(&root, &["status", "--porcelain"]), "M other.txt");

        // An existing branch is checked out rather than recreated.
        git(&root, &["checkout", "--quiet", "-"]);
        agent.create_or_checkout_branch("updater-test").unwrap();
        assert_eq!(agent.current_branch().unwrap(), "updater-test");
    }

    #[test]
    fn refuses_to_stage_outside_repository() {
        if !git_available() {
            return;
        }

        let dir = tempdir().unwrap();
        let outside = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        git(&root, &["init", "--quiet"]);
        let stray = outside.path().join("build-images.sh");
        fs::write(&stray, "").unwrap();

        let agent = VersionControlAgent::new(&root, author()).unwrap();
        assert!(matches!(
            agent.stage_and_commit("msg", &[stray]),
            Err(UpdaterError::GitOperation(_))
        ));
    }
}
