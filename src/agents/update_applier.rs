use crate::error::{Result, UpdaterError};
use crate::model::Dependency;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Textual patcher that swaps one version literal for another inside a build script.
pub struct UpdateApplier;

impl UpdateApplier {
    /// Rewrites `file` so every `name="current"` and `name:current` carries `latest`.
    ///
    /// Returns `Ok(false)` when neither pattern occurs; the file is then left untouched.
    /// Permission bits of the original file are kept.
    pub fn apply(file: &Path, name: &str, current: &str, latest: &str) -> Result<bool> {
        let content = fs::read_to_string(file).map_err(|e| {
            UpdaterError::Apply(format!("Failed to read file {}: {}", file.display(), e))
        })?;

        let updated = rewrite(&content, name, current, latest);
        if updated == content {
            debug!(file = %file.display(), name, "no occurrence to rewrite");
            return Ok(false);
        }

        let permissions = fs::metadata(file)
            .map_err(|e| {
                UpdaterError::Apply(format!("Failed to stat file {}: {}", file.display(), e))
            })?
            .permissions();

        fs::write(file, updated).map_err(|e| {
            UpdaterError::Apply(format!(
                "Failed to write updated file {}: {}",
                file.display(),
                e
            ))
        })?;
        fs::set_permissions(file, permissions).map_err(|e| {
            UpdaterError::Apply(format!(
                "Failed to restore permissions on {}: {}",
                file.display(),
                e
            ))
        })?;

        debug!(file = %file.display(), name, current, latest, "rewrote version literal");
        Ok(true)
    }

    pub fn apply_dependency(dependency: &Dependency) -> Result<bool> {
        Self::apply(
            &dependency.file,
            &dependency.name,
            &dependency.current_version,
            &dependency.latest_version,
        )
    }
}

/// Pure form of [`UpdateApplier::apply`]: both literal patterns, case-sensitive.
pub fn rewrite(content: &str, name: &str, current: &str, latest: &str) -> String {
    let quoted_old = format!("{name}=\"{current}\"");
    let quoted_new = format!("{name}=\"{latest}\"");
    let tagged_old = format!("{name}:{current}");
    let tagged_new = format!("{name}:{latest}");

    content
        .replace(&quoted_old, &quoted_new)
        .replace(&tagged_old, &tagged_new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn scenario_b_changes_only_the_target_image() {
        let content = "images=\"docker.io/postgres:15 docker.io/redis:15\"\n";
        assert_eq!(
            rewrite(content, "postgres", "15", "16"),
            "images=\"docker.io/postgres:16 docker.io/redis:15\"\n"
        );
    }

    #[test]
    fn rewrites_version_variables() {
        let content = "penpot_version=\"2.8.0\"\nother_version=\"2.8.0\"\n";
        assert_eq!(
            rewrite(content, "penpot_version", "2.8.0", "2.8.1"),
            "penpot_version=\"2.8.1\"\nother_version=\"2.8.0\"\n"
        );
    }

    #[test]
    fn matching_is_case_sensitive() {
        let content = "docker.io/Postgres:15\n";
        assert_eq!(rewrite(content, "postgres", "15", "16"), content);
    }

    #[test]
    fn writes_file_and_is_idempotent() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("build-images.sh");
        fs::write(&file, "from docker.io/postgres:15\nfrom docker.io/redis:7\n").unwrap();

        assert!(UpdateApplier::apply(&file, "postgres", "15", "16").unwrap());
        let once = fs::read_to_string(&file).unwrap();
        assert_eq!(once, "from docker.io/postgres:16\nfrom docker.io/redis:7\n");

        assert!(!UpdateApplier::apply(&file, "postgres", "15", "16").unwrap());
        assert_eq!(fs::read_to_string(&file).unwrap(), once);
    }

    #[test]
    fn missing_file_is_an_apply_error() {
        let dir = tempdir().unwrap();
        let result = UpdateApplier::apply(&dir.path().join("gone.sh"), "redis", "7", "8");
        assert!(matches!(result, Err(UpdaterError::Apply(_))));
    }

    #[cfg(unix)]
    #[test]
    fn keeps_executable_bit() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let file = dir.path().join("build-images.sh");
        fs::write(&file, "app_version=\"1.0.0\"\n").unwrap();
        fs::set_permissions(&file, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(UpdateApplier::apply(&file, "app_version", "1.0.0", "1.1.0").unwrap());
        let mode = fs::metadata(&file).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o755);
    }
}
