use tracing::{debug, instrument};

use super::rules::{matches_rules, Rule};
use super::ChangelogError;
use crate::config::CategoryConfig;
use crate::pr::{PrStatus, PullRequest};

/// A compiled category.
#[derive(Debug, Clone)]
pub struct Category {
    pub title: Option<String>,
    pub key: Option<String>,
    labels: Vec<String>,
    exclude_labels: Vec<String>,
    rules: Vec<Rule>,
    exhaustive: bool,
    exhaustive_rules: Option<bool>,
    pub empty_content: Option<String>,
}

impl Category {
    pub fn compile(config: &CategoryConfig, index: usize) -> Result<Self, ChangelogError> {
        let rules = config
            .rules
            .iter()
            .map(Rule::compile)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| ChangelogError::InvalidCategory {
                category: config
                    .title
                    .clone()
                    .or_else(|| config.key.clone())
                    .unwrap_or_else(|| format!("#{}", index)),
                source,
            })?;

        Ok(Self {
            title: config.title.clone(),
            key: config.key.clone(),
            labels: config.labels.iter().map(|l| l.to_lowercase()).collect(),
            exclude_labels: config.exclude_labels.iter().map(|l| l.to_lowercase()).collect(),
            rules,
            exhaustive: config.exhaustive,
            exhaustive_rules: config.exhaustive_rules,
            empty_content: config.empty_content.clone(),
        })
    }

    /// Key of this category in the structured output: its key, else its
    /// title, else its position.
    pub fn output_key(&self, index: usize) -> String {
        self.key
            .clone()
            .or_else(|| self.title.clone())
            .unwrap_or_else(|| format!("category_{}", index))
    }

    /// A category with neither labels nor rules absorbs uncategorized records.
    pub fn is_catch_all(&self) -> bool {
        self.labels.is_empty() && self.rules.is_empty()
    }

    pub fn matches(&self, pr: &PullRequest) -> bool {
        if self.exclude_labels.iter().any(|label| pr.has_label(label)) {
            return false;
        }

        let has_labels = !self.labels.is_empty();
        let has_rules = !self.rules.is_empty();

        if self.exhaustive && (has_labels || has_rules) {
            let mut matched = has_labels && self.labels.iter().all(|label| pr.has_label(label));
            if (matched || !has_labels) && has_rules {
                matched = matches_rules(&self.rules, pr, self.exhaustive_rules.unwrap_or(true));
            }
            matched
        } else {
            let mut matched = has_labels && self.labels.iter().any(|label| pr.has_label(label));
            if !matched && has_rules {
                matched = matches_rules(&self.rules, pr, self.exhaustive_rules.unwrap_or(false));
            }
            matched
        }
    }
}

/// Record indices routed into each bucket. Indices refer to the slice given
/// to [`classify`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// One list per category, in configured order
    pub categories: Vec<Vec<usize>>,
    pub categorized: Vec<usize>,
    pub uncategorized: Vec<usize>,
    pub open: Vec<usize>,
    pub ignored: Vec<usize>,
}

/// Assign records to categories and buckets.
///
/// Ignored records are routed away before anything else. Open records are
/// additionally tracked in the open bucket. Membership in categories is
/// non-exclusive; a record matching none of them lands in the catch-all
/// category (if configured) and always in the uncategorized bucket.
#[instrument(skip_all, fields(records = records.len(), categories = categories.len()))]
pub fn classify(
    records: &[PullRequest],
    categories: &[Category],
    ignore_labels: &[String],
) -> Classification {
    let catch_all = categories.iter().position(Category::is_catch_all);
    let mut result = Classification {
        categories: vec![Vec::new(); categories.len()],
        ..Classification::default()
    };

    for (index, pr) in records.iter().enumerate() {
        if ignore_labels.iter().any(|label| pr.has_label(label)) {
            debug!(pr = pr.number, "ignored");
            result.ignored.push(index);
            continue;
        }

        if pr.status == PrStatus::Open {
            result.open.push(index);
        }

        let mut matched_once = false;
        for (category_index, category) in categories.iter().enumerate() {
            if category.matches(pr) {
                result.categories[category_index].push(index);
                matched_once = true;
            }
        }

        if matched_once {
            result.categorized.push(index);
        } else {
            if let Some(catch_all) = catch_all {
                result.categories[catch_all].push(index);
            }
            result.uncategorized.push(index);
        }
    }

    debug!(
        categorized = result.categorized.len(),
        uncategorized = result.uncategorized.len(),
        open = result.open.len(),
        ignored = result.ignored.len(),
        "classified records"
    );
    result
}
