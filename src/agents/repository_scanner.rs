use crate::agents::script_scanner::ScriptScanner;
use crate::error::{Result, UpdaterError};
use crate::model::Dependency;
use crate::utils::glob::PatternSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Walks one repository checkout and runs the script scanner over every matching file.
pub struct RepositoryScannerAgent {
    scanner: ScriptScanner,
    scan_patterns: PatternSet,
}

impl RepositoryScannerAgent {
    pub fn new(scan_patterns: PatternSet) -> Result<Self> {
        Ok(Self {
            scanner: ScriptScanner::new()?,
            scan_patterns,
        })
    }

    /// Files under `root` whose name matches a scan pattern, sorted by path.
    ///
    /// `.git` and symbolic links are never followed. Only an unreadable `root`
    /// is an error; deeper directories that cannot be read are logged and skipped.
    pub fn find_scripts(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(root).map_err(|e| {
            UpdaterError::Scan(format!("Cannot read directory {}: {}", root.display(), e))
        })?;

        let mut found = Vec::new();
        let mut pending: Vec<PathBuf> = Vec::new();
        self.collect(entries, &mut found, &mut pending);

        while let Some(dir) = pending.pop() {
            match fs::read_dir(&dir) {
                Ok(entries) => self.collect(entries, &mut found, &mut pending),
                Err(e) => warn!(path = %dir.display(), "skipping unreadable directory: {e}"),
            }
        }

        found.sort();
        Ok(found)
    }

    fn collect(&self, entries: fs::ReadDir, found: &mut Vec<PathBuf>, pending: &mut Vec<PathBuf>) {
        for entry in entries.flatten() {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            let name = entry.file_name();
            let name = name.to_string_lossy();

            if file_type.is_dir() {
                if name != ".git" {
                    pending.push(entry.path());
                }
            } else if file_type.is_file() && self.scan_patterns.matches_any(&name) {
                found.push(entry.path());
            }
        }
    }

    /// Every dependency declared in the repository, file by file.
    pub fn scan_repository(&self, root: &Path) -> Result<Vec<Dependency>> {
        let mut dependencies = Vec::new();

        for file in self.find_scripts(root)? {
            match fs::read_to_string(&file) {
                Ok(content) => {
                    let result = self.scanner.scan(&file, &content);
                    debug!(
                        file = %file.display(),
                        dependencies = result.dependencies.len(),
                        images = result.images.len(),
                        "scanned build script"
                    );
                    dependencies.extend(result.dependencies);
                }
                Err(e) => warn!(file = %file.display(), "skipping unreadable file: {e}"),
            }
        }

        Ok(dependencies)
    }
}
