use regex::Regex;
use thiserror::Error;

use super::extract::{compile_pattern, is_known_property, record_property, PropertyValue};
use crate::config::RuleConfig;
use crate::pr::PullRequest;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("unknown rule property '{0}'")]
    UnknownProperty(String),

    #[error("invalid rule pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A compiled category rule: a regex tested against one record property.
#[derive(Debug, Clone)]
pub struct Rule {
    pattern: Regex,
    property: String,
}

impl Rule {
    /// Compile a rule. The caller knows which category it belongs to.
    pub fn compile(config: &RuleConfig) -> Result<Self, RuleError> {
        if !is_known_property(&config.on_property) {
            return Err(RuleError::UnknownProperty(config.on_property.clone()));
        }
        let pattern = compile_pattern(&config.pattern, config.flags.as_deref()).map_err(|source| {
            RuleError::InvalidPattern {
                pattern: config.pattern.clone(),
                source,
            }
        })?;
        Ok(Self {
            pattern,
            property: config.on_property.clone(),
        })
    }

    /// List-valued properties hold when any element matches; an unset
    /// property never matches.
    pub fn matches(&self, pr: &PullRequest) -> bool {
        match record_property(pr, &self.property) {
            Some(PropertyValue::Text(text)) => self.pattern.is_match(&text),
            Some(PropertyValue::List(items)) => items.iter().any(|item| self.pattern.is_match(item)),
            Some(PropertyValue::Absent) | None => false,
        }
    }
}

/// Combine rules with all-of (`exhaustive`) or any-of semantics.
pub fn matches_rules(rules: &[Rule], pr: &PullRequest, exhaustive: bool) -> bool {
    if exhaustive {
        rules.iter().all(|rule| rule.matches(pr))
    } else {
        rules.iter().any(|rule| rule.matches(pr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changelog::tests::test_pull_request;

    fn rule(pattern: &str, on_property: &str) -> Rule {
        Rule::compile(&RuleConfig {
            pattern: pattern.to_string(),
            on_property: on_property.to_string(),
            flags: None,
        })
        .unwrap()
    }

    #[test]
    fn test_rule_on_title() {
        let pr = test_pull_request(1, "fix: crash on start");
        assert!(rule("^fix", "title").matches(&pr));
        assert!(!rule("^feat", "title").matches(&pr));
    }

    #[test]
    fn test_rule_on_list_property_matches_any_element() {
        let mut pr = test_pull_request(1, "x");
        pr.labels = vec!["area/api".to_string(), "bug".to_string()];
        assert!(rule("^bug$", "labels").matches(&pr));
        assert!(!rule("^feature$", "labels").matches(&pr));
    }

    #[test]
    fn test_rule_on_missing_milestone() {
        let pr = test_pull_request(1, "x");
        assert!(!rule(".*", "milestone").matches(&pr));
    }

    #[test]
    fn test_rule_on_status() {
        let pr = test_pull_request(1, "x");
        assert!(rule("^merged$", "status").matches(&pr));
    }

    #[test]
    fn test_any_and_all_policies() {
        let pr = test_pull_request(1, "fix: crash");
        let rules = vec![rule("^fix", "title"), rule("^nobody$", "author")];
        assert!(matches_rules(&rules, &pr, false));
        assert!(!matches_rules(&rules, &pr, true));
    }

    #[test]
    fn test_compile_rejects_bad_rules() {
        let bad_property = RuleConfig {
            pattern: "x".to_string(),
            on_property: "size".to_string(),
            flags: None,
        };
        assert!(matches!(
            Rule::compile(&bad_property),
            Err(RuleError::UnknownProperty(property)) if property == "size"
        ));
        let bad_pattern = RuleConfig {
            pattern: "(".to_string(),
            on_property: "title".to_string(),
            flags: None,
        };
        assert!(matches!(
            Rule::compile(&bad_pattern),
            Err(RuleError::InvalidPattern { pattern, .. }) if pattern == "("
        ));
    }
}
