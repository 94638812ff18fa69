use crate::error::{Result, UpdaterError};
use regex::Regex;

/// Shell-style file name pattern (`*` and `?` wildcards), matched against the whole name.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    regex: Regex,
}

impl GlobPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let trimmed = pattern.trim();
        if trimmed.is_empty() {
            return Err(UpdaterError::Configuration(
                "Glob pattern cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            regex: Self::compile_glob(trimmed)?,
        })
    }

    pub fn matches(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }

    fn compile_glob(pattern: &str) -> Result<Regex> {
        let mut regex = String::from("^");
        for ch in pattern.chars() {
            match ch {
                '*' => regex.push_str("[^/]*"),
                '?' => regex.push_str("[^/]"),
                '.' | '+' | '(' | ')' | '|' | '^' | '$' | '{' | '}' | '[' | ']' | '\\' => {
                    regex.push('\\');
                    regex.push(ch);
                }
                _ => regex.push(ch),
            }
        }
        regex.push('$');

        Regex::new(&regex).map_err(|e| {
            UpdaterError::Configuration(format!("Invalid glob pattern '{}': {}", pattern, e))
        })
    }
}

/// A list of globs where any single match is enough.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<GlobPattern>,
}

impl PatternSet {
    pub fn compile(patterns: &[String]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| GlobPattern::new(p))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn matches_any(&self, value: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(value))
    }
}
