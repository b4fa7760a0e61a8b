//! Layered indexing configuration.
//!
//! Settings are resolved from four sources, lowest precedence first:
//!
//! 1. Built-in defaults
//! 2. `tsfamix.json` at the project root
//! 3. Environment variables (`TSFAMIX_INCLUDE`, `TSFAMIX_EXCLUDE`,
//!    `TSFAMIX_COMMENTS`, `TSFAMIX_LOG`)
//! 4. CLI flags
//!
//! Every value remembers the [`ConfigSource`] it came from, so callers can
//! report why a setting has the value it has.
//!
//! Include/exclude patterns are gitignore-style globs matched against
//! project-relative paths. Files they reject are not traversed; references
//! into them become stubs.

use std::fs;
use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

/// Name of the project configuration file.
pub const PROJECT_CONFIG_FILE: &str = "tsfamix.json";

/// Exclusions that always apply.
pub const DEFAULT_EXCLUSIONS: &[&str] = &["**/node_modules/**", "**/.git/**"];

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid glob pattern syntax.
    #[error("invalid glob pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Project config file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Project config file is not valid JSON for this schema.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

// ============================================================================
// Configuration Sources
// ============================================================================

/// Configuration value source (for precedence tracking).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigSource {
    /// Built-in default value.
    Default = 0,
    /// From `tsfamix.json`.
    ProjectConfig = 1,
    /// From environment variable.
    EnvVar = 2,
    /// From CLI flag (highest precedence).
    CliFlag = 3,
}

/// A configuration value with its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        ConfigValue { value, source }
    }

    /// Merge with another value, preferring higher precedence.
    pub fn merge(self, other: Self) -> Self {
        if other.source >= self.source {
            other
        } else {
            self
        }
    }
}

// ============================================================================
// Resolved Configuration
// ============================================================================

/// `tsfamix.json` schema. All keys are optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProjectConfigFile {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    pub hash_names_private: Option<bool>,
    pub comments: Option<bool>,
    pub log_level: Option<String>,
}

/// CLI configuration overrides.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    /// --include flags.
    pub include_patterns: Vec<String>,
    /// --exclude flags.
    pub exclude_patterns: Vec<String>,
    /// --comments / --no-comments.
    pub comments: Option<bool>,
    /// --log-level flag.
    pub log_level: Option<String>,
}

/// Resolved configuration for one indexing session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    /// Include patterns; empty means every file.
    pub include_patterns: ConfigValue<Vec<String>>,
    /// Exclude patterns, applied after includes.
    pub exclude_patterns: ConfigValue<Vec<String>>,
    /// Treat `#name` members as private.
    pub hash_names_private: ConfigValue<bool>,
    /// Create Comment entities for leading comments.
    pub index_comments: ConfigValue<bool>,
    /// Default log filter directive for the binary.
    pub log_level: ConfigValue<String>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            include_patterns: ConfigValue::new(Vec::new(), ConfigSource::Default),
            exclude_patterns: ConfigValue::new(Vec::new(), ConfigSource::Default),
            hash_names_private: ConfigValue::new(true, ConfigSource::Default),
            index_comments: ConfigValue::new(true, ConfigSource::Default),
            log_level: ConfigValue::new("warn".to_string(), ConfigSource::Default),
        }
    }
}

impl IndexConfig {
    /// Resolve configuration from all sources.
    ///
    /// Precedence (highest to lowest):
    /// 1. CLI flags
    /// 2. Environment variables
    /// 3. Project config (`tsfamix.json`)
    /// 4. Defaults
    pub fn resolve(project_root: &Path, cli: &CliOverrides) -> Result<Self, ConfigError> {
        let mut config = IndexConfig::default();
        let path = project_root.join(PROJECT_CONFIG_FILE);
        if path.exists() {
            config.apply_project_config(&path)?;
        }
        config.apply_env(|key| std::env::var(key).ok());
        config.apply_cli_overrides(cli);
        Ok(config)
    }

    /// Apply `tsfamix.json`.
    pub fn apply_project_config(&mut self, path: &Path) -> Result<(), ConfigError> {
        let display = path.display().to_string();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        let file: ProjectConfigFile =
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: display,
                source,
            })?;
        self.apply_file(file);
        Ok(())
    }

    fn apply_file(&mut self, file: ProjectConfigFile) {
        let src = ConfigSource::ProjectConfig;
        if !file.include.is_empty() {
            self.set_include(file.include, src);
        }
        if !file.exclude.is_empty() {
            self.set_exclude(file.exclude, src);
        }
        if let Some(v) = file.hash_names_private {
            self.hash_names_private = self.hash_names_private.clone().merge(ConfigValue::new(v, src));
        }
        if let Some(v) = file.comments {
            self.index_comments = self.index_comments.clone().merge(ConfigValue::new(v, src));
        }
        if let Some(v) = file.log_level {
            self.log_level = self.log_level.clone().merge(ConfigValue::new(v, src));
        }
    }

    /// Apply environment variables read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let src = ConfigSource::EnvVar;
        if let Some(v) = lookup("TSFAMIX_INCLUDE") {
            self.set_include(split_patterns(&v), src);
        }
        if let Some(v) = lookup("TSFAMIX_EXCLUDE") {
            self.set_exclude(split_patterns(&v), src);
        }
        if let Some(v) = lookup("TSFAMIX_COMMENTS") {
            match parse_bool(&v) {
                Some(b) => {
                    self.index_comments = self.index_comments.clone().merge(ConfigValue::new(b, src))
                }
                None => warn!(value = %v, "ignoring TSFAMIX_COMMENTS: expected a boolean"),
            }
        }
        if let Some(v) = lookup("TSFAMIX_LOG") {
            self.log_level = self.log_level.clone().merge(ConfigValue::new(v, src));
        }
    }

    pub fn apply_cli_overrides(&mut self, cli: &CliOverrides) {
        let src = ConfigSource::CliFlag;
        if !cli.include_patterns.is_empty() {
            self.set_include(cli.include_patterns.clone(), src);
        }
        if !cli.exclude_patterns.is_empty() {
            self.set_exclude(cli.exclude_patterns.clone(), src);
        }
        if let Some(b) = cli.comments {
            self.index_comments = self.index_comments.clone().merge(ConfigValue::new(b, src));
        }
        if let Some(ref level) = cli.log_level {
            self.log_level = self.log_level.clone().merge(ConfigValue::new(level.clone(), src));
        }
    }

    fn set_include(&mut self, patterns: Vec<String>, src: ConfigSource) {
        self.include_patterns = self
            .include_patterns
            .clone()
            .merge(ConfigValue::new(patterns, src));
    }

    fn set_exclude(&mut self, patterns: Vec<String>, src: ConfigSource) {
        self.exclude_patterns = self
            .exclude_patterns
            .clone()
            .merge(ConfigValue::new(patterns, src));
    }

    /// Compile the include/exclude patterns.
    pub fn file_filter(&self) -> Result<FileFilter, ConfigError> {
        FileFilter::new(&self.include_patterns.value, &self.exclude_patterns.value)
    }
}

fn split_patterns(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ============================================================================
// File Filter
// ============================================================================

/// Compiled include/exclude globs.
#[derive(Debug, Clone)]
pub struct FileFilter {
    inclusions: Option<GlobSet>,
    exclusions: GlobSet,
    default_exclusions: GlobSet,
}

impl FileFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, ConfigError> {
        let inclusions = if include.is_empty() {
            None
        } else {
            Some(build_glob_set(include)?)
        };
        let defaults: Vec<String> = DEFAULT_EXCLUSIONS.iter().map(|s| s.to_string()).collect();
        Ok(FileFilter {
            inclusions,
            exclusions: build_glob_set(exclude)?,
            default_exclusions: build_glob_set(&defaults)?,
        })
    }

    /// A filter accepting everything except the default exclusions.
    pub fn accept_all() -> Result<Self, ConfigError> {
        FileFilter::new(&[], &[])
    }

    /// Check a project-relative path.
    pub fn matches(&self, path: &str) -> bool {
        if self.default_exclusions.is_match(path) || self.exclusions.is_match(path) {
            return false;
        }
        match &self.inclusions {
            Some(inclusions) => inclusions.is_match(path),
            None => true,
        }
    }
}

fn build_glob_set(patterns: &[String]) -> Result<GlobSet, ConfigError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| ConfigError::InvalidPattern {
            pattern: pattern.clone(),
            message: e.to_string(),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| ConfigError::InvalidPattern {
        pattern: "<combined>".to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn merge_prefers_higher_precedence() {
        let low = ConfigValue::new(1, ConfigSource::ProjectConfig);
        let high = ConfigValue::new(2, ConfigSource::CliFlag);
        assert_eq!(low.clone().merge(high.clone()).value, 2);
        assert_eq!(high.merge(low).value, 2);
    }

    #[test]
    fn defaults() {
        let config = IndexConfig::default();
        assert!(config.index_comments.value);
        assert!(config.hash_names_private.value);
        assert_eq!(config.log_level.source, ConfigSource::Default);
    }

    #[test]
    fn project_file_then_env_then_cli() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(PROJECT_CONFIG_FILE),
            r#"{ "include": ["src/**"], "comments": false, "logLevel": "info" }"#,
        )
        .unwrap();

        let mut config = IndexConfig::default();
        config
            .apply_project_config(&dir.path().join(PROJECT_CONFIG_FILE))
            .unwrap();
        assert_eq!(config.include_patterns.value, vec!["src/**".to_string()]);
        assert_eq!(config.include_patterns.source, ConfigSource::ProjectConfig);
        assert!(!config.index_comments.value);

        config.apply_env(env(&[("TSFAMIX_LOG", "debug"), ("TSFAMIX_COMMENTS", "yes")]));
        assert_eq!(config.log_level.value, "debug");
        assert!(config.index_comments.value);

        config.apply_cli_overrides(&CliOverrides {
            log_level: Some("trace".to_string()),
            ..CliOverrides::default()
        });
        assert_eq!(config.log_level.value, "trace");
        assert_eq!(config.log_level.source, ConfigSource::CliFlag);
        assert_eq!(config.index_comments.source, ConfigSource::EnvVar);
    }

    #[test]
    fn invalid_env_bool_is_ignored() {
        let mut config = IndexConfig::default();
        config.apply_env(env(&[("TSFAMIX_COMMENTS", "maybe")]));
        assert_eq!(config.index_comments.source, ConfigSource::Default);
    }

    #[test]
    fn malformed_project_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(PROJECT_CONFIG_FILE);
        fs::write(&path, r#"{ "inclde": [] }"#).unwrap();
        let err = IndexConfig::default().apply_project_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn resolve_without_project_file() {
        let dir = TempDir::new().unwrap();
        let cli = CliOverrides {
            exclude_patterns: vec!["**/*.spec.ts".to_string()],
            ..CliOverrides::default()
        };
        let config = IndexConfig::resolve(dir.path(), &cli).unwrap();
        assert_eq!(config.exclude_patterns.source, ConfigSource::CliFlag);
    }

    mod filter {
        use super::*;

        #[test]
        fn env_patterns_are_comma_separated() {
            let mut config = IndexConfig::default();
            config.apply_env(env(&[("TSFAMIX_EXCLUDE", "gen/**, **/*.spec.ts")]));
            let filter = config.file_filter().unwrap();
            assert!(!filter.matches("gen/a.ts"));
            assert!(!filter.matches("src/a.spec.ts"));
            assert!(filter.matches("src/a.ts"));
        }

        #[test]
        fn inclusions_restrict() {
            let filter = FileFilter::new(&["src/**".to_string()], &[]).unwrap();
            assert!(filter.matches("src/deep/a.ts"));
            assert!(!filter.matches("lib/a.ts"));
        }

        #[test]
        fn default_exclusions_always_apply() {
            let filter = FileFilter::accept_all().unwrap();
            assert!(!filter.matches("node_modules/x/index.d.ts"));
            assert!(filter.matches("a.ts"));
        }

        #[test]
        fn invalid_pattern_reports_it() {
            let err = FileFilter::new(&["a[".to_string()], &[]).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidPattern { pattern, .. } if pattern == "a["));
        }
    }
}
