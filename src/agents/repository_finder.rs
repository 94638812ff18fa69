use crate::error::Result;
use crate::model::RepositoryHandle;
use crate::utils::glob::PatternSet;
use crate::utils::path_validator::PathValidator;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Discovers git checkouts directly under a base directory.
pub struct RepositoryFinder {
    base_dir: PathBuf,
}

impl RepositoryFinder {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        Ok(Self {
            base_dir: PathValidator::validate_base_dir(base_dir)?,
        })
    }

    /// Immediate subdirectories holding a `.git` entry whose name matches `patterns`,
    /// sorted by name.
    pub fn discover(&self, patterns: &PatternSet) -> Result<Vec<RepositoryHandle>> {
        let mut repositories = Vec::new();

        for entry in fs::read_dir(&self.base_dir)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("skipping unreadable entry in {}: {e}", self.base_dir.display());
                    continue;
                }
            };

            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if !path.is_dir() || !patterns.matches_any(&name) {
                continue;
            }

            let git_dir = path.join(".git");
            if !git_dir.exists() {
                debug!(repository = %name, "matching directory is not a git checkout");
                continue;
            }

            let url = origin_url(&git_dir);
            repositories.push(RepositoryHandle { name, path, url });
        }

        repositories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(repositories)
    }
}

/// `url` of `[remote "origin"]` in `.git/config`, when `.git` is a plain directory.
fn origin_url(git_dir: &Path) -> Option<String> {
    let config = fs::read_to_string(git_dir.join("config")).ok()?;
    parse_origin_url(&config)
}

fn parse_origin_url(config: &str) -> Option<String> {
    let mut in_origin = false;

    for line in config.lines().map(str::trim) {
        if line.starts_with('[') {
            in_origin = line == r#"[remote "origin"]"#;
            continue;
        }
        if !in_origin {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            if key.trim() == "url" {
                return Some(value.trim().to_string());
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn patterns(list: &[&str]) -> PatternSet {
        let list: Vec<String> = list.iter().map(|p| p.to_string()).collect();
        PatternSet::compile(&list).unwrap()
    }

    #[test]
    fn finds_matching_git_checkouts() {
        let dir = tempdir().unwrap();
        let base = dir.path();
        fs::create_dir_all(base.join("ns8-b/.git")).unwrap();
        fs::create_dir_all(base.join("ns8-a/.git")).unwrap();
        fs::create_dir_all(base.join("ns8-plain")).unwrap();
        fs::create_dir_all(base.join("other/.git")).unwrap();
        fs::write(base.join("ns8-file"), "").unwrap();

        let finder = RepositoryFinder::new(base).unwrap();
        let names: Vec<_> = finder
            .discover(&patterns(&["ns8-*"]))
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["ns8-a", "ns8-b"]);
    }

    #[test]
    fn reads_origin_url() {
        let dir = tempdir().unwrap();
        let repo = dir.path().join("ns8-demo");
        fs::create_dir_all(repo.join(".git")).unwrap();
        fs::write(
            repo.join(".git/config"),
            "[core]\n\tbare = false\n[remote \"upstream\"]\n\turl = https://example.com/up.git\n\
             [remote \"origin\"]\n\turl = git@github.com:org/ns8-demo.git\n\tfetch = +refs/heads/*:refs/remotes/origin/*\n",
        )
        .unwrap();

        let found = RepositoryFinder::new(dir.path())
            .unwrap()
            .discover(&patterns(&["ns8-*"]))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].url.as_deref(), Some("git@github.com:org/ns8-demo.git"));
        assert_eq!(found[0].path, dir.path().canonicalize().unwrap().join("ns8-demo"));
    }

    #[test]
    fn missing_origin_has_no_url() {
        assert_eq!(parse_origin_url("[core]\n\tbare = false\n"), None);
    }

    #[test]
    fn rejects_missing_base_dir() {
        let dir = tempdir().unwrap();
        assert!(RepositoryFinder::new(dir.path().join("absent")).is_err());
    }
}
