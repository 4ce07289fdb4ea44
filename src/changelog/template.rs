//! Placeholder substitution.
//!
//! Templates reference values as `${{KEY}}`. Array-valued keys additionally
//! accept an index (`${{KEY[0]}}`), a join over all items (`${{KEY[*]}}`)
//! and, for arrays of records or reviews, a field (`${{KEY[0].title}}`).
//! Custom placeholders derive new values from built-in ones through a regex
//! transformer; their per-record values can be addressed by index once the
//! whole document is assembled.

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::{Captures, Regex};
use tracing::debug;

use super::extract::{ExtractorUsage, RegexTransformer};
use super::labels::is_internal_label;
use crate::config::CustomPlaceholderConfig;
use crate::pr::{PullRequest, Review};

static INDEXED_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{\{([A-Za-z0-9_]+)\[(\*|\d+)\](?:\.([A-Za-z_]+))?\}\}")
        .expect("indexed placeholder pattern is valid")
});

/// Built-in keys with array values.
pub const ARRAY_KEYS: &[&str] = &["REVIEWS", "REFERENCED", "ASSIGNEES", "REVIEWERS", "APPROVERS"];

fn token(key: &str) -> String {
    format!("${{{{{}}}}}", key)
}

/// An insertion-ordered key/value table. Substitution follows this order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placeholders {
    entries: Vec<(String, String)>,
}

impl Placeholders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value; an existing key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// One element of an array placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArrayItem {
    Text(String),
    /// Named fields; the first field is used when no field is selected.
    Fields(Vec<(&'static str, String)>),
}

impl ArrayItem {
    fn value(&self, field: Option<&str>) -> &str {
        match (self, field) {
            (ArrayItem::Text(text), None) => text,
            (ArrayItem::Text(_), Some(_)) => "",
            (ArrayItem::Fields(fields), None) => fields.first().map(|(_, v)| v.as_str()).unwrap_or(""),
            (ArrayItem::Fields(fields), Some(field)) => fields
                .iter()
                .find(|(name, _)| *name == field)
                .map(|(_, v)| v.as_str())
                .unwrap_or(""),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayPlaceholder {
    pub key: &'static str,
    pub items: Vec<ArrayItem>,
}

impl ArrayPlaceholder {
    fn joined(&self, field: Option<&str>) -> String {
        self.items
            .iter()
            .map(|item| item.value(field))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn at(&self, index: &str, field: Option<&str>) -> String {
        index
            .parse::<usize>()
            .ok()
            .and_then(|i| self.items.get(i))
            .map(|item| item.value(field).to_string())
            .unwrap_or_default()
    }
}

/// A compiled custom placeholder.
#[derive(Debug, Clone)]
pub struct CustomPlaceholder {
    name: String,
    source: String,
    transformer: RegexTransformer,
}

impl CustomPlaceholder {
    pub fn compile_or_warn(config: &CustomPlaceholderConfig) -> Option<Self> {
        let transformer =
            RegexTransformer::compile_or_warn(&config.transformer, ExtractorUsage::CustomPlaceholder)?;
        Some(Self {
            name: config.name.clone(),
            source: config.source.clone(),
            transformer,
        })
    }
}

/// Custom placeholder values recorded while rendering records, keyed by
/// placeholder name in first-seen order, values in render order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackedValues {
    entries: Vec<(String, Vec<String>)>,
}

impl TrackedValues {
    fn push(&mut self, name: &str, value: String) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((name.to_string(), vec![value])),
        }
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
    }
}

/// Renders templates against placeholder tables.
#[derive(Debug, Clone, Copy)]
pub struct TemplateEngine<'a> {
    custom: &'a [CustomPlaceholder],
    trim_values: bool,
}

impl<'a> TemplateEngine<'a> {
    pub fn new(custom: &'a [CustomPlaceholder], trim_values: bool) -> Self {
        Self { custom, trim_values }
    }

    fn prepare<'v>(&self, value: &'v str) -> &'v str {
        if self.trim_values {
            value.trim()
        } else {
            value
        }
    }

    /// Substitute array placeholders, then scalars, then the custom
    /// placeholders derived from either. Custom values are recorded into
    /// `tracked` when given, for later indexed substitution.
    pub fn render(
        &self,
        template: &str,
        arrays: &[ArrayPlaceholder],
        scalars: &Placeholders,
        mut tracked: Option<&mut TrackedValues>,
    ) -> String {
        let mut out = self.fill_arrays(template, arrays);

        for (key, value) in scalars.iter() {
            out = out.replace(&token(key), self.prepare(value));
        }

        for array in arrays {
            self.apply_custom(&mut out, array.key, &array.joined(None), tracked.as_deref_mut());
        }
        for (key, value) in scalars.iter() {
            // ASSIGNEES & co. exist in both tables; derive from them once
            if arrays.iter().any(|array| array.key == key) {
                continue;
            }
            self.apply_custom(&mut out, key, value, tracked.as_deref_mut());
        }

        out
    }

    fn fill_arrays(&self, template: &str, arrays: &[ArrayPlaceholder]) -> String {
        if arrays.is_empty() {
            return template.to_string();
        }
        INDEXED_PLACEHOLDER
            .replace_all(template, |caps: &Captures| {
                let Some(array) = arrays.iter().find(|a| a.key == &caps[1]) else {
                    return caps[0].to_string();
                };
                let field = caps.get(3).map(|m| m.as_str());
                match &caps[2] {
                    "*" => array
                        .items
                        .iter()
                        .map(|item| self.prepare(item.value(field)))
                        .collect::<Vec<_>>()
                        .join(", "),
                    index => self.prepare(&array.at(index, field)).to_string(),
                }
            })
            .into_owned()
    }

    fn apply_custom(
        &self,
        out: &mut String,
        key: &str,
        value: &str,
        mut tracked: Option<&mut TrackedValues>,
    ) {
        for placeholder in self.custom.iter().filter(|p| p.source == key) {
            let Some(extracted) = placeholder.transformer.extract(value) else {
                continue;
            };
            *out = out.replace(&token(&placeholder.name), self.prepare(&extracted));
            if let Some(tracked) = tracked.as_deref_mut() {
                tracked.push(&placeholder.name, extracted);
            }
        }
    }

    /// Substitute `${{NAME[i]}}` and `${{NAME[*]}}` for custom placeholders
    /// from the values recorded across all rendered records.
    pub fn fill_tracked(&self, text: &str, tracked: &TrackedValues) -> String {
        INDEXED_PLACEHOLDER
            .replace_all(text, |caps: &Captures| {
                let values = match (tracked.get(&caps[1]), caps.get(3)) {
                    (Some(values), None) => values,
                    _ => return caps[0].to_string(),
                };
                match &caps[2] {
                    "*" => values
                        .iter()
                        .map(|v| self.prepare(v))
                        .collect::<Vec<_>>()
                        .join(", "),
                    index => index
                        .parse::<usize>()
                        .ok()
                        .and_then(|i| values.get(i))
                        .map(|v| self.prepare(v).to_string())
                        .unwrap_or_default(),
                }
            })
            .into_owned()
    }

    /// Remove custom placeholder tokens that were never populated and any
    /// indexed built-in placeholder left in the text.
    pub fn cleanup(&self, text: &str) -> String {
        let is_custom = |key: &str| self.custom.iter().any(|p| p.name == key);
        let mut out = INDEXED_PLACEHOLDER
            .replace_all(text, |caps: &Captures| {
                let key = &caps[1];
                if ARRAY_KEYS.contains(&key) || is_custom(key) {
                    String::new()
                } else {
                    caps[0].to_string()
                }
            })
            .into_owned();
        for placeholder in self.custom {
            out = out.replace(&token(&placeholder.name), "");
        }
        out
    }
}

pub fn format_date(date: &DateTime<Utc>, format: Option<&str>) -> String {
    match format {
        Some(format) => date.format(format).to_string(),
        None => date.to_rfc3339_opts(SecondsFormat::Secs, true),
    }
}

fn display_labels(pr: &PullRequest) -> String {
    pr.labels
        .iter()
        .filter(|label| !is_internal_label(label))
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn record_fields(pr: &PullRequest, date_format: Option<&str>) -> Vec<(&'static str, String)> {
    vec![
        ("number", pr.number.to_string()),
        ("title", pr.title.clone()),
        ("url", pr.url.clone()),
        ("author", pr.author.clone()),
        ("body", pr.body.clone()),
        ("status", pr.status.to_string()),
        ("branch", pr.branch.clone()),
        ("base_branch", pr.base_branch.clone()),
        ("created_at", format_date(&pr.created_at, date_format)),
        (
            "merged_at",
            pr.merged_at
                .map(|d| format_date(&d, date_format))
                .unwrap_or_default(),
        ),
        ("merge_sha", pr.merge_commit_sha.clone()),
        ("milestone", pr.milestone.clone().unwrap_or_default()),
        ("labels", display_labels(pr)),
    ]
}

fn review_fields(review: &Review, date_format: Option<&str>) -> Vec<(&'static str, String)> {
    vec![
        ("body", review.body.clone()),
        ("author", review.author.clone()),
        ("state", review.state.clone()),
        (
            "submitted_at",
            review
                .submitted_at
                .map(|d| format_date(&d, date_format))
                .unwrap_or_default(),
        ),
        ("url", review.url.clone()),
    ]
}

fn text_items(values: &[String]) -> Vec<ArrayItem> {
    values.iter().cloned().map(ArrayItem::Text).collect()
}

/// Array and scalar placeholders for one record. `children` resolves the
/// numbers in `child_prs`.
pub fn record_placeholders(
    pr: &PullRequest,
    children: &HashMap<u64, &PullRequest>,
    date_format: Option<&str>,
) -> (Vec<ArrayPlaceholder>, Placeholders) {
    let referenced: Vec<ArrayItem> = pr
        .child_prs
        .iter()
        .filter_map(|number| children.get(number))
        .map(|child| ArrayItem::Fields(record_fields(child, date_format)))
        .collect();
    if referenced.len() != pr.child_prs.len() {
        debug!(pr = pr.number, "some referenced records could not be resolved");
    }

    let arrays = vec![
        ArrayPlaceholder {
            key: "REVIEWS",
            items: pr
                .reviews
                .iter()
                .map(|review| ArrayItem::Fields(review_fields(review, date_format)))
                .collect(),
        },
        ArrayPlaceholder {
            key: "REFERENCED",
            items: referenced,
        },
        ArrayPlaceholder {
            key: "ASSIGNEES",
            items: text_items(&pr.assignees),
        },
        ArrayPlaceholder {
            key: "REVIEWERS",
            items: text_items(&pr.reviewers),
        },
        ArrayPlaceholder {
            key: "APPROVERS",
            items: text_items(&pr.approvers),
        },
    ];

    let mut scalars = Placeholders::new();
    scalars.insert("NUMBER", pr.number.to_string());
    scalars.insert("TITLE", pr.title.as_str());
    scalars.insert("URL", pr.url.as_str());
    scalars.insert("STATUS", pr.status.to_string());
    scalars.insert("CREATED_AT", format_date(&pr.created_at, date_format));
    scalars.insert(
        "MERGED_AT",
        pr.merged_at
            .map(|d| format_date(&d, date_format))
            .unwrap_or_default(),
    );
    scalars.insert("MERGE_SHA", pr.merge_commit_sha.as_str());
    scalars.insert("AUTHOR", pr.author.as_str());
    scalars.insert("LABELS", display_labels(pr));
    scalars.insert("MILESTONE", pr.milestone.clone().unwrap_or_default());
    scalars.insert("BODY", pr.body.as_str());
    scalars.insert("ASSIGNEES", pr.assignees.join(", "));
    scalars.insert("REVIEWERS", pr.reviewers.join(", "));
    scalars.insert("APPROVERS", pr.approvers.join(", "));
    scalars.insert("BRANCH", pr.branch.as_str());
    scalars.insert("BASE_BRANCH", pr.base_branch.as_str());

    (arrays, scalars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changelog::tests::test_pull_request;
    use crate::config::TransformerConfig;

    fn custom(name: &str, source: &str, pattern: &str, target: &str) -> CustomPlaceholder {
        CustomPlaceholder::compile_or_warn(&CustomPlaceholderConfig {
            name: name.to_string(),
            source: source.to_string(),
            transformer: TransformerConfig {
                pattern: pattern.to_string(),
                target: target.to_string(),
                flags: None,
            },
        })
        .unwrap()
    }

    fn render_record(engine: &TemplateEngine, template: &str, pr: &PullRequest) -> String {
        let (arrays, scalars) = record_placeholders(pr, &HashMap::new(), None);
        engine.render(template, &arrays, &scalars, None)
    }

    #[test]
    fn test_scalar_placeholders() {
        let engine = TemplateEngine::new(&[], false);
        let mut pr = test_pull_request(42, "Add cache");
        pr.labels = vec!["feature".to_string(), "--internal-merged".to_string(), "perf".to_string()];
        let out = render_record(&engine, "- ${{TITLE}} (#${{NUMBER}}) by ${{AUTHOR}} [${{LABELS}}]", &pr);
        assert_eq!(out, "- Add cache (#42) by alice [feature, perf]");
    }

    #[test]
    fn test_dates_and_missing_values() {
        let engine = TemplateEngine::new(&[], false);
        let mut pr = test_pull_request(1, "x");
        pr.merged_at = None;
        pr.milestone = None;
        let out = render_record(&engine, "${{CREATED_AT}}|${{MERGED_AT}}|${{MILESTONE}}", &pr);
        assert_eq!(out, "2024-01-01T00:00:00Z||");
    }

    #[test]
    fn test_custom_date_format() {
        let pr = test_pull_request(1, "x");
        assert_eq!(format_date(&pr.created_at, Some("%Y/%m/%d")), "2024/01/01");
    }

    #[test]
    fn test_array_placeholders() {
        let engine = TemplateEngine::new(&[], false);
        let mut pr = test_pull_request(1, "x");
        pr.assignees = vec!["bob".to_string(), "carol".to_string()];
        pr.reviews = vec![Review {
            author: "dave".to_string(),
            body: "LGTM".to_string(),
            state: "APPROVED".to_string(),
            ..Review::default()
        }];
        let out = render_record(
            &engine,
            "${{ASSIGNEES[*]}}|${{ASSIGNEES[1]}}|${{ASSIGNEES[5]}}|${{REVIEWS[0].author}}|${{REVIEWS[*]}}|${{ASSIGNEES}}",
            &pr,
        );
        assert_eq!(out, "bob, carol|carol||dave|LGTM|bob, carol");
    }

    #[test]
    fn test_referenced_children() {
        let engine = TemplateEngine::new(&[], false);
        let mut parent = test_pull_request(3, "Parent");
        parent.child_prs = vec![5];
        let child = test_pull_request(5, "Child");
        let children = HashMap::from([(5, &child)]);
        let (arrays, scalars) = record_placeholders(&parent, &children, None);
        let out = engine.render(
            "${{TITLE}}: ${{REFERENCED[*].title}} (${{REFERENCED[*]}})",
            &arrays,
            &scalars,
            None,
        );
        assert_eq!(out, "Parent: Child (5)");
    }

    #[test]
    fn test_trim_values() {
        let mut pr = test_pull_request(1, " Fix bug ");
        pr.assignees = vec![" bob ".to_string()];
        let trimmed = TemplateEngine::new(&[], true);
        assert_eq!(render_record(&trimmed, "[${{TITLE}}][${{ASSIGNEES[0]}}]", &pr), "[Fix bug][bob]");

        pr.assignees = vec![" bob ".to_string(), " carol ".to_string()];
        assert_eq!(render_record(&trimmed, "[${{ASSIGNEES[*]}}]", &pr), "[bob, carol]");
        let verbatim = TemplateEngine::new(&[], false);
        assert_eq!(render_record(&verbatim, "[${{TITLE}}]", &pr), "[ Fix bug ]");
    }

    #[test]
    fn test_custom_placeholder_inline_and_tracked() {
        let customs = vec![custom("TICKET", "BODY", r".*(ABC-\d+).*", "$1")];
        let engine = TemplateEngine::new(&customs, false);
        let mut tracked = TrackedValues::default();

        let mut first = test_pull_request(1, "a");
        first.body = "Implements ABC-7".to_string();
        let (arrays, scalars) = record_placeholders(&first, &HashMap::new(), None);
        let out = engine.render("${{TITLE}} ${{TICKET}}", &arrays, &scalars, Some(&mut tracked));
        assert_eq!(out, "a ABC-7");

        let mut second = test_pull_request(2, "b");
        second.body = "no ticket".to_string();
        let (arrays, scalars) = record_placeholders(&second, &HashMap::new(), None);
        let out = engine.render("${{TITLE}} ${{TICKET}}", &arrays, &scalars, Some(&mut tracked));
        assert_eq!(out, "b ${{TICKET}}");

        assert_eq!(tracked.get("TICKET"), Some(&["ABC-7".to_string()][..]));
        assert_eq!(engine.cleanup(&out), "b ");
    }

    #[test]
    fn test_custom_placeholder_replace_with_self() {
        let customs = vec![custom("SAME", "TITLE", "^release$", "$0")];
        let engine = TemplateEngine::new(&customs, false);
        let pr = test_pull_request(1, "release");
        assert_eq!(render_record(&engine, "${{SAME}}", &pr), "release");
    }

    #[test]
    fn test_custom_placeholder_on_array_key() {
        let customs = vec![custom("FIRST_ASSIGNEE", "ASSIGNEES", "^([^,]+).*", "$1")];
        let engine = TemplateEngine::new(&customs, false);
        let mut pr = test_pull_request(1, "x");
        pr.assignees = vec!["bob".to_string(), "carol".to_string()];
        assert_eq!(render_record(&engine, "${{FIRST_ASSIGNEE}}", &pr), "bob");
    }

    #[test]
    fn test_fill_tracked_and_cleanup() {
        let customs = vec![custom("TICKET", "BODY", r".*(ABC-\d+).*", "$1")];
        let engine = TemplateEngine::new(&customs, false);
        let mut tracked = TrackedValues::default();
        tracked.push("TICKET", "ABC-1".to_string());
        tracked.push("TICKET", "ABC-2".to_string());

        let text = "${{TICKET[*]}}|${{TICKET[1]}}|${{TICKET[9]}}|${{OTHER[0]}}";
        assert_eq!(engine.fill_tracked(text, &tracked), "ABC-1, ABC-2|ABC-2||${{OTHER[0]}}");

        let leftovers = "a${{TICKET[0]}}b${{REVIEWS[0].author}}c${{TICKET}}d${{OTHER[0]}}";
        assert_eq!(engine.cleanup(leftovers), "abcd${{OTHER[0]}}");
    }

    #[test]
    fn test_placeholders_keep_insertion_order() {
        let mut table = Placeholders::new();
        table.insert("B", "1");
        table.insert("A", "2");
        table.insert("B", "3");
        let keys: Vec<_> = table.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["B", "A"]);
        assert_eq!(table.get("B"), Some("3"));
    }

    #[test]
    fn test_custom_placeholder_tracks_empty_rewrites() {
        let customs = vec![custom("TICKET", "TITLE", "^(?:ABC-(\\d+)|none)$", "$1")];
        let engine = TemplateEngine::new(&customs, false);
        let mut tracked = TrackedValues::default();
        for (number, title) in [(1, "ABC-1"), (2, "none"), (3, "ABC-3")] {
            let pr = test_pull_request(number, title);
            let (arrays, scalars) = record_placeholders(&pr, &HashMap::new(), None);
            engine.render("${{TICKET}}", &arrays, &scalars, Some(&mut tracked));
        }
        let expected = ["1".to_string(), String::new(), "3".to_string()];
        assert_eq!(tracked.get("TICKET"), Some(&expected[..]));
        assert_eq!(engine.fill_tracked("${{TICKET[2]}}|${{TICKET[*]}}", &tracked), "3|1, , 3");
    }
}
