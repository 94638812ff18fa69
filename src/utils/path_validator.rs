use crate::error::{Result, UpdaterError};
use std::path::{Path, PathBuf};

/// Path checks shared by repository discovery and git staging.
pub struct PathValidator;

impl PathValidator {
    /// Canonicalises a directory that repositories live in and refuses system locations.
    pub fn validate_base_dir(path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();

        let canonical = path.canonicalize().map_err(|e| {
            UpdaterError::Configuration(format!("Invalid path '{}': {e}", path.display()))
        })?;

        if !canonical.is_dir() {
            return Err(UpdaterError::Configuration(format!(
                "Path '{}' is not a directory",
                canonical.display()
            )));
        }

        const FORBIDDEN: &[&str] = &["/etc", "/sys", "/proc", "/dev", "/boot"];

        for forbidden in FORBIDDEN {
            let forbidden_path = Path::new(forbidden);

            if path.starts_with(forbidden_path) || canonical.starts_with(forbidden_path) {
                return Err(UpdaterError::Configuration(format!(
                    "Access to system directory '{}' is not allowed",
                    forbidden
                )));
            }

            if let Ok(canonical_forbidden) = forbidden_path.canonicalize() {
                if canonical.starts_with(&canonical_forbidden) {
                    return Err(UpdaterError::Configuration(format!(
                        "Access to system directory '{}' is not allowed",
                        forbidden
                    )));
                }
            }
        }

        Ok(canonical)
    }

    /// Returns `file_path` relative to `base_dir`, failing when it escapes the base.
    pub fn relative_within(
        file_path: impl AsRef<Path>,
        base_dir: impl AsRef<Path>,
    ) -> Result<PathBuf> {
        let file_path = file_path.as_ref();
        let base_dir = base_dir.as_ref();

        let canonical_file = file_path.canonicalize().map_err(|e| {
            UpdaterError::GitOperation(format!("Invalid file path '{}': {e}", file_path.display()))
        })?;

        let canonical_base = base_dir.canonicalize().map_err(|e| {
            UpdaterError::GitOperation(format!(
                "Invalid repository directory '{}': {e}",
                base_dir.display()
            ))
        })?;

        canonical_file
            .strip_prefix(&canonical_base)
            .map(Path::to_path_buf)
            .map_err(|_| {
                UpdaterError::GitOperation(format!(
                    "File '{}' is outside the repository",
                    file_path.display()
                ))
            })
    }
}
