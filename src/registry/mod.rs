use crate::error::{Result, UpdaterError};
use serde::Serialize;
use std::fmt;

pub mod client;
pub mod resolver;
pub mod tags;
pub mod version;

pub use client::RegistryClient;
pub use resolver::VersionResolver;
pub use tags::{SelectionPolicy, Tag};

/// The registries whose image references are recognised in build scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Registry {
    #[serde(rename = "docker.io")]
    DockerHub,
    #[serde(rename = "ghcr.io")]
    Ghcr,
    #[serde(rename = "quay.io")]
    Quay,
    #[serde(rename = "registry.k8s.io")]
    K8s,
}

/// Response layout of a registry's tag listing endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingShape {
    /// `{ "results": [{ "name": .. }], "next": .. }`, followed page by page.
    Paginated,
    /// `{ "name": .., "tags": [..] }` in a single response.
    Flat,
}

impl Registry {
    pub const ALL: [Registry; 4] = [
        Registry::DockerHub,
        Registry::Ghcr,
        Registry::Quay,
        Registry::K8s,
    ];

    pub fn from_host(host: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|registry| registry.host() == host)
            .ok_or_else(|| UpdaterError::UnsupportedRegistry(host.to_string()))
    }

    pub fn host(&self) -> &'static str {
        match self {
            Registry::DockerHub => "docker.io",
            Registry::Ghcr => "ghcr.io",
            Registry::Quay => "quay.io",
            Registry::K8s => "registry.k8s.io",
        }
    }

    pub fn listing_shape(&self) -> ListingShape {
        match self {
            Registry::DockerHub => ListingShape::Paginated,
            Registry::Ghcr | Registry::Quay | Registry::K8s => ListingShape::Flat,
        }
    }

    /// URL of the first tag listing page for `repository`.
    pub fn tags_endpoint(&self, repository: &str) -> String {
        match self {
            Registry::DockerHub => {
                // Official images live under the implicit `library/` namespace.
                let repository = if repository.contains('/') {
                    repository.to_string()
                } else {
                    format!("library/{repository}")
                };
                format!("https://hub.docker.com/v2/repositories/{repository}/tags?page_size=100")
            }
            Registry::Ghcr | Registry::Quay | Registry::K8s => {
                format!("https://{}/v2/{}/tags/list", self.host(), repository)
            }
        }
    }
}

impl fmt::Display for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.host())
    }
}

/// Anything able to list the tags published for an image.
pub trait TagSource: Send + Sync {
    fn fetch_tags(&self, registry: Registry, repository: &str) -> Result<Vec<Tag>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_hosts() {
        for registry in Registry::ALL {
            assert_eq!(Registry::from_host(registry.host()).unwrap(), registry);
        }
    }

    #[test]
    fn unknown_host_is_a_hard_error() {
        let err = Registry::from_host("registry.example.com").unwrap_err();
        assert!(matches!(err, UpdaterError::UnsupportedRegistry(host) if host == "registry.example.com"));
    }

    #[test]
    fn docker_hub_endpoint_adds_library_namespace() {
        assert_eq!(
            Registry::DockerHub.tags_endpoint("postgres"),
            "https://hub.docker.com/v2/repositories/library/postgres/tags?page_size=100"
        );
        assert_eq!(
            Registry::DockerHub.tags_endpoint("penpotapp/frontend"),
            "https://hub.docker.com/v2/repositories/penpotapp/frontend/tags?page_size=100"
        );
    }

    #[test]
    fn flat_registries_use_distribution_api() {
        assert_eq!(
            Registry::Ghcr.tags_endpoint("owner/app"),
            "https://ghcr.io/v2/owner/app/tags/list"
        );
        assert_eq!(
            Registry::K8s.tags_endpoint("pause"),
            "https://registry.k8s.io/v2/pause/tags/list"
        );
        assert_eq!(Registry::Quay.listing_shape(), ListingShape::Flat);
        assert_eq!(Registry::DockerHub.listing_shape(), ListingShape::Paginated);
    }
}
