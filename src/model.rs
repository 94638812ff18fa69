use crate::error::{Result, UpdaterError};
use crate::registry::Registry;
use serde::Serialize;
use std::path::PathBuf;

/// Tag assumed when an image reference carries none.
pub const FLOATING_TAG: &str = "latest";

/// A `registry/path[:tag]` reference found in a build script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageReference {
    pub registry: Registry,
    pub repository: String,
    pub tag: String,
    /// The reference after variable substitution, used for deduplication.
    pub raw: String,
}

impl ImageReference {
    pub fn parse(raw: &str) -> Result<Self> {
        let (host, rest) = raw.split_once('/').ok_or_else(|| {
            UpdaterError::Scan(format!("Image reference '{raw}' has no registry host"))
        })?;
        let registry = Registry::from_host(host)?;

        let (repository, tag) = match rest.split_once(':') {
            Some((repository, tag)) => (repository, tag),
            None => (rest, FLOATING_TAG),
        };

        if repository.is_empty() {
            return Err(UpdaterError::Scan(format!(
                "Image reference '{raw}' has no repository path"
            )));
        }

        Ok(Self {
            registry,
            repository: repository.to_string(),
            tag: tag.to_string(),
            raw: raw.to_string(),
        })
    }

    /// `true` when any part of the tag is still a `$VAR`/`${VAR}` the scanner could not
    /// substitute, as in `v${VER}` or `15.${MINOR}`.
    pub fn has_unresolved_tag(&self) -> bool {
        self.tag.contains('$')
    }
}

/// Which extraction path produced a dependency; decides how it is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceKind {
    /// `<app>_version="x.y.z"` assignment.
    VersionVariable { app: String },
    /// Image reference with a concrete tag.
    Image(ImageReference),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dependency {
    pub name: String,
    pub current_version: String,
    pub latest_version: String,
    pub file: PathBuf,
    pub source: SourceKind,
}

impl Dependency {
    pub fn version_variable(app: &str, current: &str, file: impl Into<PathBuf>) -> Self {
        Self {
            name: format!("{app}_version"),
            current_version: current.to_string(),
            latest_version: current.to_string(),
            file: file.into(),
            source: SourceKind::VersionVariable {
                app: app.to_string(),
            },
        }
    }

    pub fn image(image: ImageReference, file: impl Into<PathBuf>) -> Self {
        Self {
            name: image.repository.clone(),
            current_version: image.tag.clone(),
            latest_version: image.tag.clone(),
            file: file.into(),
            source: SourceKind::Image(image),
        }
    }

    pub fn has_update(&self) -> bool {
        self.current_version != self.latest_version
    }
}

/// A local checkout the updater may operate on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryHandle {
    pub name: String,
    pub path: PathBuf,
    pub url: Option<String>,
}

/// Result of scanning or updating one repository.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateOutcome {
    pub repository: String,
    pub dependencies: Vec<Dependency>,
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

impl UpdateOutcome {
    pub fn succeeded(repository: &str, message: impl Into<String>) -> Self {
        Self {
            repository: repository.to_string(),
            dependencies: Vec::new(),
            success: true,
            message: message.into(),
            branch: None,
            commit: None,
        }
    }

    pub fn failed(repository: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::succeeded(repository, message)
        }
    }

    pub fn pending_updates(&self) -> usize {
        self.dependencies.iter().filter(|d| d.has_update()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_reference() {
        let image = ImageReference::parse("ghcr.io/owner/app:v1.2.3").unwrap();
        assert_eq!(image.registry, Registry::Ghcr);
        assert_eq!(image.repository, "owner/app");
        assert_eq!(image.tag, "v1.2.3");
        assert_eq!(image.raw, "ghcr.io/owner/app:v1.2.3");
    }

    #[test]
    fn missing_tag_defaults_to_latest() {
        let image = ImageReference::parse("docker.io/nginx").unwrap();
        assert_eq!(image.tag, FLOATING_TAG);
    }

    #[test]
    fn unsupported_host_is_rejected() {
        assert!(matches!(
            ImageReference::parse("example.com/app:1.0.0"),
            Err(UpdaterError::UnsupportedRegistry(_))
        ));
    }

    #[test]
    fn version_variable_names_keep_suffix() {
        let dep = Dependency::version_variable("penpot", "2.8.0", "/repo/build-images.sh");
        assert_eq!(dep.name, "penpot_version");
        assert!(!dep.has_update());
    }

    #[test]
    fn outcome_serializes_stable_contract() {
        let mut outcome = UpdateOutcome::succeeded("ns8-demo", "No dependencies need updating");
        outcome.dependencies.push(Dependency::image(
            ImageReference::parse("docker.io/redis:7").unwrap(),
            "/repo/build-images.sh",
        ));

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["repository"], "ns8-demo");
        assert_eq!(json["success"], true);
        assert_eq!(json["dependencies"][0]["name"], "redis");
        assert_eq!(json["dependencies"][0]["source"]["kind"], "image");
        assert_eq!(json["dependencies"][0]["source"]["registry"], "docker.io");
        assert!(json.get("branch").is_none());
        assert!(json.get("commit").is_none());
    }
}
