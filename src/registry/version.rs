use regex::Regex;
use semver::Version;
use std::cmp::Ordering;
use std::sync::LazyLock;

static EMBEDDED_VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"v?(\d+)\.(\d+)\.(\d+)").expect("embedded version regex"));

/// Parses exactly `MAJOR.MINOR.PATCH`, optionally prefixed with `v`.
///
/// Two-component versions, pre-release suffixes and surrounding text are rejected, so
/// `None` means "not comparable" rather than an error.
pub fn parse_exact(input: &str) -> Option<Version> {
    let trimmed = input.strip_prefix('v').unwrap_or(input);
    let mut parts = trimmed.split('.');

    let major = parse_component(parts.next()?)?;
    let minor = parse_component(parts.next()?)?;
    let patch = parse_component(parts.next()?)?;

    if parts.next().is_some() {
        return None;
    }

    Some(Version::new(major, minor, patch))
}

/// Extracts the first `v?N.N.N` embedded in a registry tag such as `v1.29.3-alpine`.
pub fn parse_embedded(tag: &str) -> Option<Version> {
    let caps = EMBEDDED_VERSION_RE.captures(tag)?;
    let component = |idx: usize| caps.get(idx)?.as_str().parse::<u64>().ok();

    Some(Version::new(component(1)?, component(2)?, component(3)?))
}

fn parse_component(part: &str) -> Option<u64> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

pub struct VersionComparator;

impl VersionComparator {
    /// Orders two version strings, `None` when either side is not a plain triple.
    pub fn compare(a: &str, b: &str) -> Option<Ordering> {
        Some(parse_exact(a)?.cmp(&parse_exact(b)?))
    }

    /// Check if `candidate` is strictly newer than `current`
    pub fn is_newer(candidate: &str, current: &str) -> bool {
        Self::compare(candidate, current) == Some(Ordering::Greater)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_prefixed_triples() {
        assert_eq!(parse_exact("1.2.3"), Some(Version::new(1, 2, 3)));
        assert_eq!(parse_exact("v10.0.7"), Some(Version::new(10, 0, 7)));
    }

    #[test]
    fn rejects_malformed_versions() {
        for input in ["", "15", "1.25", "1.2.3.4", "1.2.3-alpine", "latest", "1..3", "v", "1.2.x"] {
            assert_eq!(parse_exact(input), None, "{input} should not parse");
        }
    }

    #[test]
    fn embedded_version_ignores_surrounding_text() {
        assert_eq!(parse_embedded("v1.29.3-alpine"), Some(Version::new(1, 29, 3)));
        assert_eq!(parse_embedded("arm64-2.8.0"), Some(Version::new(2, 8, 0)));
        assert_eq!(parse_embedded("latest"), None);
        assert_eq!(parse_embedded("15-bookworm"), None);
    }

    #[test]
    fn compares_numerically_not_lexically() {
        assert_eq!(
            VersionComparator::compare("1.10.0", "1.9.9"),
            Some(Ordering::Greater)
        );
        assert_eq!(VersionComparator::compare("2.0.0", "v2.0.0"), Some(Ordering::Equal));
        assert!(VersionComparator::is_newer("1.2.1", "1.2.0"));
        assert!(!VersionComparator::is_newer("1.2.0", "1.2.0"));
    }

    #[test]
    fn incomparable_inputs_never_panic() {
        assert_eq!(VersionComparator::compare("1.2", "1.2.0"), None);
        assert!(!VersionComparator::is_newer("nightly", "1.0.0"));
    }
}
