use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to parse JSON config file: {0}")]
    ParseJson(#[from] serde_json::Error),
}

/// Top-level configuration loaded from .pr-changelog.toml (or a JSON file).
///
/// Every field has a default, so the tool works with zero config. Regex
/// patterns are kept as strings here and compiled once by
/// `changelog::Pipeline::new`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Sections of the changelog, in output order
    pub categories: Vec<CategoryConfig>,
    /// Records carrying any of these labels go to the ignored bucket
    pub ignore_labels: Vec<String>,
    pub sort: SortConfig,
    /// Top-level document template
    pub template: String,
    /// Per-record template
    pub pr_template: String,
    /// Rendered instead of `template` when there are no records
    pub empty_template: String,
    /// Extractors synthesizing extra labels
    pub label_extractor: Vec<ExtractorConfig>,
    /// Extractor discovering a parent record number
    pub reference: Option<ExtractorConfig>,
    /// Extractor computing the deduplication key
    pub duplicate_filter: Option<ExtractorConfig>,
    /// Rewrites applied to every rendered record body
    pub transformers: Vec<TransformerConfig>,
    pub custom_placeholders: Vec<CustomPlaceholderConfig>,
    /// Trim whitespace around every substituted value
    pub trim_values: bool,
    /// chrono strftime format for dates; RFC 3339 when unset
    pub date_format: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            categories: default_categories(),
            ignore_labels: vec!["ignore".to_string()],
            sort: SortConfig::default(),
            template: "${{CHANGELOG}}".to_string(),
            pr_template: "- ${{TITLE}}\n   - PR: #${{NUMBER}}".to_string(),
            empty_template: "- no changes".to_string(),
            label_extractor: Vec::new(),
            reference: None,
            duplicate_filter: None,
            transformers: Vec::new(),
            custom_placeholders: Vec::new(),
            trim_values: false,
            date_format: None,
        }
    }
}

fn default_categories() -> Vec<CategoryConfig> {
    [("## 🚀 Features", "feature"), ("## 🐛 Fixes", "fix"), ("## 🧪 Tests", "test")]
        .into_iter()
        .map(|(title, label)| CategoryConfig {
            title: Some(title.to_string()),
            labels: vec![label.to_string()],
            ..CategoryConfig::default()
        })
        .collect()
}

/// A changelog section and the criteria selecting its records.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CategoryConfig {
    pub title: Option<String>,
    /// Key used for the structured per-category output; falls back to the title
    pub key: Option<String>,
    pub labels: Vec<String>,
    pub exclude_labels: Vec<String>,
    pub rules: Vec<RuleConfig>,
    /// Require every label (and by default every rule) instead of any one
    pub exhaustive: bool,
    /// Override the any/all policy for rules
    pub exhaustive_rules: Option<bool>,
    /// Emitted under the title when no record matched
    pub empty_content: Option<String>,
}

/// A regex predicate over one record property.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleConfig {
    pub pattern: String,
    #[serde(default = "default_rule_property")]
    pub on_property: String,
    #[serde(default)]
    pub flags: Option<String>,
}

fn default_rule_property() -> String {
    "title".to_string()
}

/// Sort specification. Accepts either `sort = "DESC"` or a full table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "SortRepr")]
pub struct SortConfig {
    pub order: String,
    pub on_property: String,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            order: "ASC".to_string(),
            on_property: default_sort_property(),
        }
    }
}

fn default_sort_property() -> String {
    "mergedAt".to_string()
}

fn default_sort_order() -> String {
    "ASC".to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SortRepr {
    Order(String),
    Full {
        #[serde(default = "default_sort_order")]
        order: String,
        #[serde(default = "default_sort_property", alias = "onProperty")]
        on_property: String,
    },
}

impl From<SortRepr> for SortConfig {
    fn from(repr: SortRepr) -> Self {
        match repr {
            SortRepr::Order(order) => SortConfig {
                order,
                on_property: default_sort_property(),
            },
            SortRepr::Full { order, on_property } => SortConfig { order, on_property },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractMethod {
    /// Replace every match in the property value with the target
    #[default]
    Replace,
    /// Emit the target once per match, expanded with its capture groups
    Match,
}

/// A regex extractor as written in the configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractorConfig {
    pub pattern: String,
    #[serde(default = "default_target")]
    pub target: String,
    #[serde(default)]
    pub method: ExtractMethod,
    /// Record properties to read from; `body` when empty
    #[serde(default, deserialize_with = "one_or_many")]
    pub on_property: Vec<String>,
    /// Fallback value when nothing was extracted
    #[serde(default)]
    pub on_empty: Option<String>,
    #[serde(default)]
    pub flags: Option<String>,
}

fn default_target() -> String {
    "$0".to_string()
}

/// Regex rewrite applied to rendered text.
#[derive(Debug, Clone, Deserialize)]
pub struct TransformerConfig {
    pub pattern: String,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub flags: Option<String>,
}

/// A configuration-defined placeholder derived from a built-in one.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomPlaceholderConfig {
    /// Name of the new placeholder, used as `${{NAME}}`
    pub name: String,
    /// Built-in placeholder key the value is derived from
    pub source: String,
    pub transformer: TransformerConfig,
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}

impl Config {
    /// Load configuration from .pr-changelog.toml in the current directory.
    /// Returns default config if the file doesn't exist.
    pub fn load() -> Result<Config, ConfigError> {
        let path = Path::new(".pr-changelog.toml");
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load from a specific path. `.json` files are parsed as JSON, anything
    /// else as TOML.
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config = if is_json {
            serde_json::from_str(&contents)?
        } else {
            toml::from_str(&contents)?
        };
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.categories.len(), 3);
        assert_eq!(config.ignore_labels, vec!["ignore"]);
        assert_eq!(config.sort, SortConfig::default());
        assert_eq!(config.template, "${{CHANGELOG}}");
        assert!(!config.trim_values);
        assert!(config.reference.is_none());
    }

    #[test]
    fn test_parse_config_toml() {
        let toml_str = r###"
ignore_labels = ["skip-changelog"]
trim_values = true

[sort]
order = "DESC"
on_property = "title"

[[categories]]
title = "## Bugs"
labels = ["bug"]
exhaustive = true

[[categories]]
title = "## Other"

[duplicate_filter]
pattern = "\\[ABC-(\\d+)\\]"
target = "$1"
method = "match"
on_property = "title"
"###;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.ignore_labels, vec!["skip-changelog"]);
        assert!(config.trim_values);
        assert_eq!(config.sort.order, "DESC");
        assert_eq!(config.sort.on_property, "title");
        assert_eq!(config.categories.len(), 2);
        assert!(config.categories[0].exhaustive);
        assert!(config.categories[1].labels.is_empty());
        let dedup = config.duplicate_filter.unwrap();
        assert_eq!(dedup.method, ExtractMethod::Match);
        assert_eq!(dedup.on_property, vec!["title"]);
        // unspecified fields keep their defaults
        assert_eq!(config.empty_template, "- no changes");
    }

    #[test]
    fn test_sort_as_bare_direction() {
        let config: Config = serde_json::from_str(r#"{"sort": "DESC"}"#).unwrap();
        assert_eq!(config.sort.order, "DESC");
        assert_eq!(config.sort.on_property, "mergedAt");
    }

    #[test]
    fn test_extractor_defaults() {
        let extractor: ExtractorConfig = serde_json::from_str(r#"{"pattern": "x"}"#).unwrap();
        assert_eq!(extractor.method, ExtractMethod::Replace);
        assert_eq!(extractor.target, "$0");
        assert!(extractor.on_property.is_empty());
        assert!(extractor.on_empty.is_none());
    }

    #[test]
    fn test_load_json_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r##"{"template": "# Release\n${{CHANGELOG}}",
                "custom_placeholders": [{"name": "JIRA", "source": "BODY",
                    "transformer": {"pattern": ".*(ABC-\\d+).*", "target": "$1"}}]}"##,
        )
        .unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.template, "# Release\n${{CHANGELOG}}");
        assert_eq!(config.custom_placeholders[0].source, "BODY");
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "categories = [").unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::Parse(_))));
    }
}
