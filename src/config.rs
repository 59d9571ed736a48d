use crate::error::{QueryError, Result};
use crate::token::{Category, MAX_DEPTH_CEILING, TreeLimits};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Free-form label for the loaded profile.
    pub profile_name: String,
    pub limits: LimitRules,
    pub categories: CategoryTable,
    pub destinations: DestinationTable,
    pub markup: MarkupRules,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            profile_name: "base".to_string(),
            limits: LimitRules::default(),
            categories: CategoryTable::default(),
            destinations: DestinationTable::default(),
            markup: MarkupRules::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitRules {
    pub max_nodes: usize,
    /// Clamped to `MAX_DEPTH_CEILING` on load.
    pub max_depth: usize,
    /// Cap on entities returned by the extractor.
    pub max_entities: usize,
}

impl Default for LimitRules {
    fn default() -> Self {
        let tree = TreeLimits::default();
        Self {
            max_nodes: tree.max_nodes,
            max_depth: tree.max_depth,
            max_entities: 100,
        }
    }
}

impl LimitRules {
    pub fn tree(&self) -> TreeLimits {
        TreeLimits {
            max_nodes: self.max_nodes,
            max_depth: self.max_depth.min(MAX_DEPTH_CEILING),
        }
    }
}

/// The closed set of categories accepted from upstream, plus extra names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryTable {
    /// Accepted categories. Names resolving outside this set are unknown.
    pub enabled: Vec<Category>,
    /// Additional spellings, e.g. `ric = "instrument"`.
    pub aliases: BTreeMap<String, Category>,
}

impl Default for CategoryTable {
    fn default() -> Self {
        let aliases = [
            ("organization", Category::Organisation),
            ("org", Category::Organisation),
            ("company", Category::Organisation),
            ("ric", Category::Instrument),
            ("lang", Category::Language),
            ("op", Category::Operator),
        ]
        .into_iter()
        .map(|(name, category)| (name.to_string(), category))
        .collect();

        Self {
            enabled: Category::ALL.to_vec(),
            aliases,
        }
    }
}

impl CategoryTable {
    /// Resolve a category name (case-insensitive) through aliases and the
    /// enabled set.
    pub fn resolve(&self, name: &str) -> Result<Category> {
        let lower = name.trim().to_lowercase();
        let category = match self.aliases.get(&lower) {
            Some(category) => *category,
            None => lower
                .parse::<Category>()
                .map_err(|_| QueryError::UnknownCategory(name.to_string()))?,
        };

        if self.enabled.contains(&category) {
            Ok(category)
        } else {
            Err(QueryError::UnknownCategory(name.to_string()))
        }
    }
}

/// Repository identifier to wire destination code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationTable {
    /// Joins destination codes in the provider's syntax.
    pub separator: String,
    pub codes: BTreeMap<String, String>,
}

impl Default for DestinationTable {
    fn default() -> Self {
        let codes = [
            ("NewsWire", "NWS"),
            ("NewsRoom", "NRM"),
            ("WebNews", "WEB"),
            ("Research", "RSH"),
        ]
        .into_iter()
        .map(|(repository, code)| (repository.to_string(), code.to_string()))
        .collect();

        Self {
            separator: ",".to_string(),
            codes,
        }
    }
}

impl DestinationTable {
    pub fn code(&self, repository: &str) -> Option<&str> {
        self.codes.get(repository).map(String::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkupRules {
    /// Namespace prefix for every element; empty for none.
    pub prefix: String,
    pub root_element: String,
}

impl Default for MarkupRules {
    fn default() -> Self {
        Self {
            prefix: "req".to_string(),
            root_element: "Expression".to_string(),
        }
    }
}

pub fn load_config(path: Option<&Path>) -> std::result::Result<CompilerConfig, ConfigError> {
    if let Some(path) = path {
        load_config_from_path(path)
    } else {
        Ok(default_config().clone())
    }
}

pub fn load_config_from_path(path: &Path) -> std::result::Result<CompilerConfig, ConfigError> {
    let path_display = path.display().to_string();
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path_display.clone(),
        source,
    })?;

    let mut config =
        toml::from_str::<CompilerConfig>(&raw).map_err(|source| ConfigError::Parse {
            path: path_display,
            source,
        })?;

    if config.limits.max_depth > MAX_DEPTH_CEILING {
        tracing::warn!(
            profile = %config.profile_name,
            max_depth = config.limits.max_depth,
            ceiling = MAX_DEPTH_CEILING,
            "max_depth above ceiling, clamping"
        );
        config.limits.max_depth = MAX_DEPTH_CEILING;
    }
    Ok(config)
}

pub fn default_config() -> &'static CompilerConfig {
    static DEFAULT_CONFIG: LazyLock<CompilerConfig> = LazyLock::new(CompilerConfig::default);
    &DEFAULT_CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_uses_aliases_case_insensitively() {
        let table = CategoryTable::default();
        assert_eq!(table.resolve("RIC").unwrap(), Category::Instrument);
        assert_eq!(table.resolve("Organization").unwrap(), Category::Organisation);
        assert_eq!(table.resolve("portfolio").unwrap(), Category::Portfolio);
    }

    #[test]
    fn test_resolve_respects_enabled_set() {
        let table = CategoryTable {
            enabled: vec![Category::Organisation, Category::Operator],
            aliases: BTreeMap::new(),
        };
        assert!(table.resolve("organisation").is_ok());
        assert_eq!(
            table.resolve("topic"),
            Err(QueryError::UnknownCategory("topic".to_string()))
        );
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: CompilerConfig = toml::from_str(
            r#"
profile_name = "alerts"

[limits]
max_entities = 25

[destinations.codes]
Archive = "ARC"
"#,
        )
        .expect("valid toml");

        assert_eq!(config.profile_name, "alerts");
        assert_eq!(config.limits.max_entities, 25);
        assert_eq!(config.limits.max_nodes, 10_000);
        assert_eq!(config.destinations.code("Archive"), Some("ARC"));
        assert_eq!(config.destinations.separator, ",");
        assert_eq!(config.markup.prefix, "req");
    }
}
