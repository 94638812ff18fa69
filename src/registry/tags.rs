use crate::registry::version::{parse_embedded, parse_exact};
use semver::Version;
use std::collections::HashMap;

/// One registry tag and the version embedded in it, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    pub version: Option<Version>,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let version = parse_embedded(&name);
        Self { name, version }
    }

    /// `true` for tags like `2.8.0-arm64` that carry a hyphenated qualifier.
    fn has_qualifier(&self) -> bool {
        self.name.contains('-')
    }
}

/// Collapses tags to one entry per version, newest first.
///
/// Qualified variants of the same release (`1.2.3-amd64`, `1.2.3-arm64`) share a group;
/// the unqualified tag represents the group when the registry publishes one.
pub fn canonicalize(tags: &[Tag]) -> Vec<Tag> {
    let mut groups: Vec<Tag> = Vec::new();
    let mut slots: HashMap<&Version, usize> = HashMap::new();

    for tag in tags {
        let Some(version) = &tag.version else {
            continue;
        };

        match slots.get(version) {
            Some(&slot) => {
                if groups[slot].has_qualifier() && !tag.has_qualifier() {
                    groups[slot] = tag.clone();
                }
            }
            None => {
                slots.insert(version, groups.len());
                groups.push(tag.clone());
            }
        }
    }

    groups.sort_by(|a, b| b.version.cmp(&a.version));
    groups
}

/// How a target version is chosen from a tag listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// The greatest version published, regardless of the current one.
    AbsoluteLatest,
    /// The smallest version strictly greater than the current one.
    NearestUpgrade,
}

impl SelectionPolicy {
    pub fn select(&self, current: &str, tags: &[Tag]) -> Option<Tag> {
        match self {
            SelectionPolicy::AbsoluteLatest => absolute_latest(tags),
            SelectionPolicy::NearestUpgrade => nearest_upgrade(current, tags),
        }
    }
}

pub fn absolute_latest(tags: &[Tag]) -> Option<Tag> {
    canonicalize(tags).into_iter().next()
}

pub fn nearest_upgrade(current: &str, tags: &[Tag]) -> Option<Tag> {
    let current = parse_exact(current)?;

    canonicalize(tags)
        .into_iter()
        .filter(|tag| tag.version.as_ref().is_some_and(|v| *v > current))
        .min_by(|a, b| a.version.cmp(&b.version))
}
