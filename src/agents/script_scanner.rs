use crate::error::{Result, UpdaterError};
use crate::model::{Dependency, ImageReference};
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, warn};

const VERSION_VARIABLE: &str = r#"(\w+)_version="([^"]+)""#;
const IMAGE_REFERENCE: &str =
    r#"(docker\.io|ghcr\.io|quay\.io|registry\.k8s\.io)/[a-zA-Z0-9._/-]+(?::[^\s"'`;)]+)?"#;
const ASSIGNMENT: &str = r#"(?m)^([A-Za-z_][A-Za-z0-9_]*)=(?:"([^"]+)"|([^\s#]+))"#;
const VARIABLE_REFERENCE: &str = r"\$\{([A-Za-z0-9_]+)\}";

/// Everything one build script declares.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    /// Version variables in line order, then image references in first-seen order.
    pub dependencies: Vec<Dependency>,
    /// Every distinct image reference, including ones left with an unresolved tag.
    pub images: Vec<ImageReference>,
}

/// Text-level scanner for shell build scripts.
///
/// Only two shapes are recognised: `<app>_version="x"` assignments and
/// `registry/path[:tag]` references. Nothing here is a shell parser.
pub struct ScriptScanner {
    version_variable: Regex,
    image_reference: Regex,
    assignment: Regex,
    variable_reference: Regex,
}

impl ScriptScanner {
    pub fn new() -> Result<Self> {
        Ok(Self {
            version_variable: Self::compile(VERSION_VARIABLE)?,
            image_reference: Self::compile(IMAGE_REFERENCE)?,
            assignment: Self::compile(ASSIGNMENT)?,
            variable_reference: Self::compile(VARIABLE_REFERENCE)?,
        })
    }

    fn compile(pattern: &str) -> Result<Regex> {
        Regex::new(pattern).map_err(|e| UpdaterError::Scan(format!("Regex error: {}", e)))
    }

    /// Extracts dependencies from `content`, attributing them to `file`.
    pub fn scan(&self, file: &Path, content: &str) -> ScanResult {
        let stripped = strip_comments(content);
        let variables = self.extract_variables(&stripped);

        let mut dependencies = self.version_variables(file, &stripped);
        let images = self.image_references(&stripped, &variables);

        for image in &images {
            if image.has_unresolved_tag() {
                debug!(image = %image.raw, "dropping image with unresolved tag");
                continue;
            }
            dependencies.push(Dependency::image(image.clone(), file));
        }

        ScanResult {
            dependencies,
            images,
        }
    }

    /// Top-of-line `NAME=value` / `NAME="value"` assignments; the last one wins.
    pub fn extract_variables(&self, content: &str) -> HashMap<String, String> {
        let mut variables = HashMap::new();

        for caps in self.assignment.captures_iter(content) {
            let value = caps.get(2).or_else(|| caps.get(3)).map(|m| m.as_str());
            if let (Some(name), Some(value)) = (caps.get(1), value) {
                variables.insert(name.as_str().to_string(), value.to_string());
            }
        }

        variables
    }

    /// Replaces `${NAME}` with known values; unknown references stay as written.
    pub fn resolve_variables<'t>(
        &self,
        input: &'t str,
        variables: &HashMap<String, String>,
    ) -> Cow<'t, str> {
        self.variable_reference
            .replace_all(input, |caps: &Captures| match variables.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
    }

    fn version_variables(&self, file: &Path, stripped: &str) -> Vec<Dependency> {
        let mut found: Vec<Dependency> = Vec::new();

        for line in stripped.lines().filter(|l| !l.trim().is_empty()) {
            let Some(caps) = self.version_variable.captures(line) else {
                continue;
            };
            let dependency = Dependency::version_variable(&caps[1], &caps[2], file);

            // Same variable assigned twice: keep the first position, last value.
            match found.iter_mut().find(|d| d.name == dependency.name) {
                Some(existing) => *existing = dependency,
                None => found.push(dependency),
            }
        }

        found
    }

    fn image_references(
        &self,
        stripped: &str,
        variables: &HashMap<String, String>,
    ) -> Vec<ImageReference> {
        let mut seen = HashSet::new();
        let mut images = Vec::new();

        for raw in self.image_reference.find_iter(stripped) {
            let resolved = self.resolve_variables(raw.as_str(), variables);
            if !seen.insert(resolved.to_string()) {
                continue;
            }

            match ImageReference::parse(&resolved) {
                Ok(image) => images.push(image),
                Err(e) => warn!(reference = %resolved, "skipping image reference: {e}"),
            }
        }

        images
    }
}

/// Drops shell comments while leaving `#` inside quotes alone.
///
/// Quote state is tracked per line; a quote left open does not carry to the next line.
pub fn strip_comments(content: &str) -> String {
    content
        .split('\n')
        .map(strip_line_comment)
        .collect::<Vec<_>>()
        .join("\n")
}

fn strip_line_comment(line: &str) -> &str {
    let mut in_single = false;
    let mut in_double = false;

    for (idx, ch) in line.char_indices() {
        match ch {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            '#' if !in_single && !in_double => return &line[..idx],
            _ => {}
        }
    }

    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceKind;
    use crate::registry::Registry;

    fn scanner() -> ScriptScanner {
        ScriptScanner::new().unwrap()
    }

    fn summary(result: &ScanResult) -> Vec<String> {
        result
            .dependencies
            .iter()
            .map(|d| format!("{}@{}", d.name, d.current_version))
            .collect()
    }

    #[test]
    fn keeps_hash_inside_quotes() {
        let content = "echo 'a # b' \"c # d\" # trailing comment\n# full line\nplain # gone";
        assert_eq!(
            strip_comments(content),
            "echo 'a # b' \"c # d\" \n\nplain "
        );
    }

    #[test]
    fn quote_state_resets_each_line() {
        let content = "echo \"unterminated # kept\nnext # stripped";
        assert_eq!(strip_comments(content), "echo \"unterminated # kept\nnext ");
    }

    #[test]
    fn nested_quote_characters_do_not_toggle() {
        assert_eq!(strip_comments(r#"echo "it's # here" # x"#), r#"echo "it's # here" "#);
        assert_eq!(strip_comments(r#"echo 'say "hi # there"' # x"#), r#"echo 'say "hi # there"' "#);
    }

    #[test]
    fn resolves_known_variables_only() {
        let scanner = scanner();
        let variables = scanner.extract_variables("FOO=\"bar\"\nBAZ=qux\n");
        assert_eq!(scanner.resolve_variables("x-${FOO}-${BAZ}", &variables), "x-bar-qux");
        assert_eq!(
            scanner.resolve_variables("x-${MISSING}-$FOO", &variables),
            "x-${MISSING}-$FOO"
        );
    }

    #[test]
    fn later_assignment_wins() {
        let scanner = scanner();
        let variables = scanner.extract_variables("TAG=1.0.0\nTAG=\"2.0.0\"\n  TAG=indented\n");
        assert_eq!(variables.get("TAG").map(String::as_str), Some("2.0.0"));
    }

    #[test]
    fn scenario_a_reports_four_dependencies() {
        let content = "#!/bin/bash\n\
            demo_version=\"1.0.0\"\n\
            images=\"docker.io/postgres:15 docker.io/redis:7 docker.io/nginx:1.25\"\n";
        let result = scanner().scan(Path::new("/repo/build-images.sh"), content);

        assert_eq!(
            summary(&result),
            vec!["demo_version@1.0.0", "postgres@15", "redis@7", "nginx@1.25"]
        );
        assert!(matches!(
            &result.dependencies[0].source,
            SourceKind::VersionVariable { app } if app == "demo"
        ));
        assert!(matches!(
            &result.dependencies[1].source,
            SourceKind::Image(image) if image.registry == Registry::DockerHub
        ));
    }

    #[test]
    fn repeated_image_is_reported_once() {
        let content = "pull docker.io/redis:7\nrun docker.io/redis:7\ntag docker.io/redis:7 local\n";
        let result = scanner().scan(Path::new("build-images.sh"), content);
        assert_eq!(summary(&result), vec!["redis@7"]);
        assert_eq!(result.images.len(), 1);
    }

    #[test]
    fn unresolved_tag_is_never_a_dependency() {
        let content = "buildah from docker.io/penpotapp/frontend:${penpot_version}\n\
            buildah from docker.io/library/alpine:$ALPINE\n";
        let result = scanner().scan(Path::new("build-images.sh"), content);

        assert!(result.dependencies.is_empty());
        assert_eq!(result.images.len(), 2);
        assert!(result.images.iter().all(ImageReference::has_unresolved_tag));
    }

    #[test]
    fn partially_substituted_tag_is_never_a_dependency() {
        let content = "MAJOR=15\n\
            images=\"docker.io/postgres:${MAJOR}.${MINOR} docker.io/app/web:v${VER}\"\n";
        let result = scanner().scan(Path::new("build-images.sh"), content);

        assert!(result.dependencies.is_empty());
        let tags: Vec<&str> = result.images.iter().map(|i| i.tag.as_str()).collect();
        assert_eq!(tags, vec!["15.${MINOR}", "v${VER}"]);
    }

    #[test]
    fn substituted_tag_becomes_a_dependency() {
        let content = "penpot_version=\"2.8.0\"\n\
            buildah from docker.io/penpotapp/frontend:${penpot_version}\n";
        let result = scanner().scan(Path::new("build-images.sh"), content);

        assert_eq!(
            summary(&result),
            vec!["penpot_version@2.8.0", "penpotapp/frontend@2.8.0"]
        );
    }

    #[test]
    fn commented_declarations_are_ignored() {
        let content = "# old_version=\"0.1.0\"\n\
            # docker.io/redis:6\n\
            echo \"docker.io/redis:7 # not a comment\"\n";
        let result = scanner().scan(Path::new("build-images.sh"), content);
        assert_eq!(summary(&result), vec!["redis@7"]);
    }

    #[test]
    fn recognises_every_supported_registry() {
        let content = "a=ghcr.io/owner/app:v1.0.0\n\
            b=quay.io/org/tool:2.3.4\n\
            c=registry.k8s.io/pause:3.9\n\
            d=registry.example.com/other:1.0.0\n";
        let result = scanner().scan(Path::new("build-images.sh"), content);
        assert_eq!(
            summary(&result),
            vec!["owner/app@v1.0.0", "org/tool@2.3.4", "pause@3.9"]
        );
    }

    #[test]
    fn untagged_reference_defaults_to_latest() {
        let result = scanner().scan(Path::new("build-images.sh"), "from docker.io/nginx\n");
        assert_eq!(summary(&result), vec!["nginx@latest"]);
    }

    #[test]
    fn tag_stops_at_shell_punctuation() {
        let content = "images=('docker.io/redis:7')\nrun docker.io/nginx:1.25;\n";
        let result = scanner().scan(Path::new("build-images.sh"), content);
        assert_eq!(summary(&result), vec!["redis@7", "nginx@1.25"]);
    }

    #[test]
    fn duplicate_version_variable_keeps_last_value() {
        let content = "app_version=\"1.0.0\"\napp_version=\"1.1.0\"\n";
        let result = scanner().scan(Path::new("build-images.sh"), content);
        assert_eq!(summary(&result), vec!["app_version@1.1.0"]);
    }
}
