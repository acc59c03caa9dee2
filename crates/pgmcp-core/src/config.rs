//! Gateway configuration: the database list and compaction defaults.
//!
//! Configuration is loaded from a single JSONC file and merged with
//! environment overrides. Supports variable substitution:
//! - `{env:VAR_NAME}` - substitute an environment variable
//! - `{file:path}` - substitute file contents

use crate::compactor::CompactionOptions;
use crate::error::{ConfigError, CoreResult};
use crate::estimate::ProviderProfile;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

fn var_regex() -> &'static regex::Regex {
    VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\{(env|file):([^}]+)\}").expect("invalid regex pattern - compile-time constant")
    })
}

/// Connection parameters for a single configured database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub name: String,
    pub connection_string: String,
    #[serde(default)]
    pub is_default: bool,
}

/// Gateway-wide defaults for the compaction endpoint, mirroring
/// [`CompactionOptions`] but carrying `max_tokens`/`recent_window` as well.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactionDefaults {
    pub max_tokens: u32,
    pub recent_window: u32,
    pub options: CompactionOptions,
}

impl Default for CompactionDefaults {
    fn default() -> Self {
        Self {
            max_tokens: 100_000,
            recent_window: 10,
            options: CompactionOptions::default(),
        }
    }
}

impl CompactionDefaults {
    pub fn token_counter(&self) -> ProviderProfile {
        self.options.token_counter_type
    }
}

/// Top-level gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    pub databases: Vec<DatabaseConfig>,

    pub compaction: CompactionDefaults,

    /// Static bearer token required of callers, or `None` to disable auth.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Config {
    /// Loads configuration from `path` (if it exists) merged over defaults,
    /// then applies `PGMCP_CONFIG_CONTENT` environment overrides.
    pub async fn load(path: Option<&Path>) -> CoreResult<(Self, Vec<PathBuf>)> {
        let mut config = Config::default();
        let mut sources = Vec::new();

        if let Some(path) = path {
            if tokio::fs::try_exists(path).await.unwrap_or(false) {
                let loaded = Self::load_file(path).await?;
                config = config.merge(loaded);
                sources.push(path.to_path_buf());
            }
        }

        if let Ok(content) = std::env::var("PGMCP_CONFIG_CONTENT") {
            let loaded = Self::parse_jsonc(&content, "<env>")?;
            config = config.merge(loaded);
        }

        Ok((config, sources))
    }

    pub async fn load_file(path: &Path) -> CoreResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let content = Self::substitute_variables(&content, path)?;
        Self::parse_jsonc(&content, &path.display().to_string())
    }

    fn parse_jsonc(content: &str, source: &str) -> CoreResult<Self> {
        let stripped = Self::strip_comments(content);
        serde_json::from_str(&stripped).map_err(|e| {
            ConfigError::InvalidJson {
                path: source.to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }

    fn strip_comments(input: &str) -> String {
        let mut result = String::with_capacity(input.len());
        let mut chars = input.chars().peekable();
        let mut in_string = false;
        let mut escape_next = false;

        while let Some(c) = chars.next() {
            if escape_next {
                result.push(c);
                escape_next = false;
                continue;
            }
            if in_string {
                if c == '\\' {
                    escape_next = true;
                    result.push(c);
                    continue;
                }
                if c == '"' {
                    in_string = false;
                }
                result.push(c);
                continue;
            }
            match c {
                '"' => {
                    in_string = true;
                    result.push(c);
                }
                '/' if chars.peek() == Some(&'/') => {
                    for c in chars.by_ref() {
                        if c == '\n' {
                            result.push('\n');
                            break;
                        }
                    }
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    let mut prev = ' ';
                    for c in chars.by_ref() {
                        if prev == '*' && c == '/' {
                            break;
                        }
                        prev = c;
                    }
                }
                _ => result.push(c),
            }
        }
        result
    }

    fn substitute_variables(content: &str, config_path: &Path) -> CoreResult<String> {
        let re = var_regex();
        let config_dir = config_path.parent().unwrap_or(Path::new("."));

        let mut result = content.to_string();
        let mut last_error: Option<ConfigError> = None;

        for cap in re.captures_iter(content) {
            let Some(full_match) = cap.get(0).map(|m| m.as_str()) else {
                continue;
            };
            let Some(kind) = cap.get(1).map(|m| m.as_str()) else {
                continue;
            };
            let Some(value) = cap.get(2).map(|m| m.as_str()) else {
                continue;
            };

            let replacement = match kind {
                "env" => match std::env::var(value) {
                    Ok(v) => v,
                    Err(_) => {
                        last_error = Some(ConfigError::EnvVarNotFound {
                            name: value.to_string(),
                        });
                        continue;
                    }
                },
                "file" => {
                    let file_path = config_dir.join(value);
                    match std::fs::read_to_string(&file_path) {
                        Ok(v) => v.trim_end().to_string(),
                        Err(_) => {
                            last_error = Some(ConfigError::InvalidPath(file_path.display().to_string()));
                            continue;
                        }
                    }
                }
                _ => continue,
            };

            result = result.replacen(full_match, &replacement, 1);
        }

        if let Some(err) = last_error {
            return Err(err.into());
        }
        Ok(result)
    }

    /// Merges `other` over `self`: every field `other` sets explicitly wins.
    pub fn merge(mut self, other: Self) -> Self {
        if other.schema.is_some() {
            self.schema = other.schema;
        }
        if !other.databases.is_empty() {
            self.databases = other.databases;
        }
        if other.api_key.is_some() {
            self.api_key = other.api_key;
        }
        self.compaction = other.compaction;
        self
    }

    /// The database marked `is_default`, or the first configured database.
    pub fn default_database(&self) -> Option<&DatabaseConfig> {
        self.databases.iter().find(|d| d.is_default).or_else(|| self.databases.first())
    }

    pub fn database(&self, name: &str) -> Option<&DatabaseConfig> {
        self.databases.iter().find(|d| d.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_compaction_matches_spec_defaults() {
        let defaults = CompactionDefaults::default();
        assert_eq!(defaults.max_tokens, 100_000);
        assert_eq!(defaults.recent_window, 10);
        assert_eq!(defaults.options.min_important_messages, 3);
        assert!(defaults.options.enable_summarization);
        assert!(!defaults.options.enable_caching);
        assert!(!defaults.options.enable_analytics);
    }

    #[test]
    fn test_strip_comments_preserves_string_contents() {
        let input = r#"{ "a": "// not a comment", "b": 1 /* trailing */ }"#;
        let stripped = Config::strip_comments(input);
        assert!(stripped.contains("// not a comment"));
        assert!(!stripped.contains("trailing"));
    }

    #[test]
    fn test_merge_overwrites_databases_when_present() {
        let base = Config {
            databases: vec![DatabaseConfig {
                name: "a".to_string(),
                connection_string: "postgres://a".to_string(),
                is_default: true,
            }],
            ..Default::default()
        };
        let overlay = Config {
            databases: vec![DatabaseConfig {
                name: "b".to_string(),
                connection_string: "postgres://b".to_string(),
                is_default: true,
            }],
            ..Default::default()
        };
        let merged = base.merge(overlay);
        assert_eq!(merged.databases.len(), 1);
        assert_eq!(merged.databases[0].name, "b");
    }

    #[test]
    fn test_default_database_prefers_is_default() {
        let config = Config {
            databases: vec![
                DatabaseConfig {
                    name: "a".to_string(),
                    connection_string: "postgres://a".to_string(),
                    is_default: false,
                },
                DatabaseConfig {
                    name: "b".to_string(),
                    connection_string: "postgres://b".to_string(),
                    is_default: true,
                },
            ],
            ..Default::default()
        };
        assert_eq!(config.default_database().unwrap().name, "b");
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("PGMCP_TEST_SUBST_VAR", "secretvalue");
        let content = r#"{"api_key": "{env:PGMCP_TEST_SUBST_VAR}"}"#;
        let substituted = Config::substitute_variables(content, Path::new("config.json")).unwrap();
        assert!(substituted.contains("secretvalue"));
        std::env::remove_var("PGMCP_TEST_SUBST_VAR");
    }

    #[tokio::test]
    async fn test_load_file_strips_comments_and_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.jsonc");
        std::fs::write(
            &path,
            r#"{
                // primary database
                "databases": [{"name": "main", "connection_string": "postgres://localhost/main", "is_default": true}]
            }"#,
        )
        .unwrap();
        let config = Config::load_file(&path).await.unwrap();
        assert_eq!(config.databases[0].name, "main");
    }

    #[tokio::test]
    async fn test_load_merges_file_with_env_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.jsonc");
        std::fs::write(
            &path,
            r#"{"databases": [{"name": "main", "connection_string": "postgres://localhost/main", "is_default": true}]}"#,
        )
        .unwrap();
        std::env::set_var("PGMCP_CONFIG_CONTENT", r#"{"api_key": "overridden"}"#);
        let (config, sources) = Config::load(Some(&path)).await.unwrap();
        std::env::remove_var("PGMCP_CONFIG_CONTENT");
        assert_eq!(sources, vec![path]);
        assert_eq!(config.databases[0].name, "main");
        assert_eq!(config.api_key.as_deref(), Some("overridden"));
    }

    #[tokio::test]
    async fn test_load_with_missing_path_falls_back_to_defaults() {
        let (config, sources) = Config::load(Some(Path::new("/nonexistent/gateway.jsonc"))).await.unwrap();
        assert!(sources.is_empty());
        assert!(config.databases.is_empty());
    }
}
