use crate::error::Result;
use crate::model::{Dependency, FLOATING_TAG, ImageReference, SourceKind};
use crate::registry::version::VersionComparator;
use crate::registry::{SelectionPolicy, TagSource};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Picks the target version for a scanned dependency.
///
/// Image references move to the absolute latest release. Version variables move to the
/// nearest upgrade of the image their application is mapped to in `known_images`.
pub struct VersionResolver<'a> {
    source: &'a dyn TagSource,
    known_images: &'a BTreeMap<String, String>,
}

impl<'a> VersionResolver<'a> {
    pub fn new(source: &'a dyn TagSource, known_images: &'a BTreeMap<String, String>) -> Self {
        Self {
            source,
            known_images,
        }
    }

    /// The version `dependency` should move to, `None` when no newer version is known.
    pub fn latest_for(&self, dependency: &Dependency) -> Result<Option<String>> {
        match &dependency.source {
            SourceKind::Image(image) => self.latest_image_tag(image, &dependency.current_version),
            SourceKind::VersionVariable { app } => {
                self.nearest_app_version(app, &dependency.current_version)
            }
        }
    }

    /// Attaches the latest version to `dependency`.
    ///
    /// A failed lookup leaves the dependency at its current version, which reads the
    /// same as "up to date" downstream.
    pub fn resolve(&self, dependency: &mut Dependency) {
        match self.latest_for(dependency) {
            Ok(Some(latest)) => dependency.latest_version = latest,
            Ok(None) => dependency.latest_version = dependency.current_version.clone(),
            Err(e) => {
                warn!(
                    dependency = %dependency.name,
                    file = %dependency.file.display(),
                    "could not check latest version: {e}"
                );
                dependency.latest_version = dependency.current_version.clone();
            }
        }
    }

    fn latest_image_tag(&self, image: &ImageReference, current: &str) -> Result<Option<String>> {
        if image.tag == FLOATING_TAG {
            debug!(image = %image.raw, "floating tag, skipping lookup");
            return Ok(None);
        }

        let tags = self.source.fetch_tags(image.registry, &image.repository)?;
        let Some(latest) = SelectionPolicy::AbsoluteLatest.select(current, &tags) else {
            return Ok(None);
        };

        // Never propose a downgrade when the current tag is itself comparable.
        if let Some(candidate) = &latest.version {
            let candidate = candidate.to_string();
            if VersionComparator::compare(current, &candidate).is_some()
                && !VersionComparator::is_newer(&candidate, current)
            {
                return Ok(None);
            }
        }

        Ok(Some(latest.name))
    }

    fn nearest_app_version(&self, app: &str, current: &str) -> Result<Option<String>> {
        let Some(image) = self.known_images.get(app) else {
            debug!(app, "no image mapped for application");
            return Ok(None);
        };

        let image = ImageReference::parse(image)?;
        let tags = self.source.fetch_tags(image.registry, &image.repository)?;

        Ok(SelectionPolicy::NearestUpgrade
            .select(current, &tags)
            .map(|tag| tag.name))
    }
}
