use std::borrow::Cow;

use regex::{Regex, RegexBuilder};
use tracing::warn;

use crate::config::{ExtractMethod, ExtractorConfig, TransformerConfig};
use crate::pr::PullRequest;

/// What an extractor is used for. Only affects diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorUsage {
    Reference,
    DuplicateFilter,
    LabelExtractor,
    Transformer,
    CustomPlaceholder,
}

impl std::fmt::Display for ExtractorUsage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractorUsage::Reference => write!(f, "reference"),
            ExtractorUsage::DuplicateFilter => write!(f, "duplicate_filter"),
            ExtractorUsage::LabelExtractor => write!(f, "label_extractor"),
            ExtractorUsage::Transformer => write!(f, "transformer"),
            ExtractorUsage::CustomPlaceholder => write!(f, "custom_placeholder"),
        }
    }
}

/// Record properties addressable from extractors and rules.
pub const KNOWN_PROPERTIES: &[&str] = &[
    "number",
    "title",
    "url",
    "status",
    "author",
    "body",
    "milestone",
    "branch",
    "base_branch",
    "merge_sha",
    "labels",
    "assignees",
    "reviewers",
    "approvers",
];

/// Value of a record property.
pub enum PropertyValue<'a> {
    Text(Cow<'a, str>),
    List(&'a [String]),
    /// The property exists but is unset on this record (e.g. no milestone)
    Absent,
}

impl PropertyValue<'_> {
    /// Flatten to a single string; lists are joined with `,`.
    pub fn joined(&self) -> Option<Cow<'_, str>> {
        match self {
            PropertyValue::Text(text) => Some(Cow::Borrowed(text.as_ref())),
            PropertyValue::List(items) => Some(Cow::Owned(items.join(","))),
            PropertyValue::Absent => None,
        }
    }
}

/// Look up a property by name. Returns `None` for unknown names.
pub fn record_property<'a>(pr: &'a PullRequest, name: &str) -> Option<PropertyValue<'a>> {
    let value = match name {
        "number" => PropertyValue::Text(Cow::Owned(pr.number.to_string())),
        "title" => PropertyValue::Text(Cow::Borrowed(&pr.title)),
        "url" => PropertyValue::Text(Cow::Borrowed(&pr.url)),
        "status" => PropertyValue::Text(Cow::Owned(pr.status.to_string())),
        "author" => PropertyValue::Text(Cow::Borrowed(&pr.author)),
        "body" => PropertyValue::Text(Cow::Borrowed(&pr.body)),
        "milestone" => match &pr.milestone {
            Some(milestone) => PropertyValue::Text(Cow::Borrowed(milestone)),
            None => PropertyValue::Absent,
        },
        "branch" => PropertyValue::Text(Cow::Borrowed(&pr.branch)),
        "base_branch" | "baseBranch" => PropertyValue::Text(Cow::Borrowed(&pr.base_branch)),
        "merge_sha" | "mergeCommitSha" => PropertyValue::Text(Cow::Borrowed(&pr.merge_commit_sha)),
        "labels" => PropertyValue::List(&pr.labels),
        "assignees" => PropertyValue::List(&pr.assignees),
        "reviewers" => PropertyValue::List(&pr.reviewers),
        "approvers" => PropertyValue::List(&pr.approvers),
        _ => return None,
    };
    Some(value)
}

pub fn is_known_property(name: &str) -> bool {
    KNOWN_PROPERTIES.contains(&name) || name == "baseBranch" || name == "mergeCommitSha"
}

/// Compile a pattern with JavaScript-style flags.
///
/// `i`, `m`, `s`, `x` and `U` map onto the regex builder; `g` and `u` are
/// accepted and ignored since replacement is always global and patterns are
/// always Unicode-aware.
pub fn compile_pattern(pattern: &str, flags: Option<&str>) -> Result<Regex, regex::Error> {
    let mut builder = RegexBuilder::new(pattern);
    for flag in flags.unwrap_or_default().chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            'U' => builder.swap_greed(true),
            _ => &mut builder,
        };
    }
    builder.build()
}

/// A compiled pattern/target pair applied with replace semantics.
#[derive(Debug, Clone)]
pub struct RegexTransformer {
    pattern: Regex,
    target: String,
}

impl RegexTransformer {
    /// `target` uses JavaScript replacement syntax (`$1`, `$&`, `$<name>`,
    /// `$$`) plus `$0` for the whole match; it is rewritten once into the
    /// `regex` crate's `${N}` form so `$1_x` keeps meaning group 1 then `_x`.
    pub fn new(pattern: Regex, target: impl Into<String>) -> Self {
        let target = normalize_target(&target.into(), pattern.captures_len());
        Self { pattern, target }
    }

    /// Compile from configuration, skipping (with a warning) invalid patterns.
    pub fn compile_or_warn(config: &TransformerConfig, usage: ExtractorUsage) -> Option<Self> {
        match compile_pattern(&config.pattern, config.flags.as_deref()) {
            Ok(pattern) => Some(Self::new(pattern, config.target.clone())),
            Err(err) => {
                warn!(%usage, pattern = %config.pattern, error = %err, "invalid regex, skipping");
                None
            }
        }
    }

    /// Rewrite every match in `text`.
    pub fn apply<'t>(&self, text: &'t str) -> Cow<'t, str> {
        self.pattern.replace_all(text, self.target.as_str())
    }

    /// Replace-style extraction: the rewritten value, or `None` when the
    /// input does not match.
    ///
    /// A rewrite that leaves the value unchanged, or empties it, still counts
    /// when the pattern matched.
    pub fn extract(&self, value: &str) -> Option<String> {
        if !self.pattern.is_match(value) {
            return None;
        }
        Some(self.apply(value).into_owned())
    }
}

/// Rewrite a JavaScript-style replacement target into `regex` syntax.
///
/// `$N`/`$NN` pick the longest group number that exists, as JavaScript does;
/// a `$` not starting a known reference stays literal.
fn normalize_target(target: &str, groups: usize) -> String {
    let chars: Vec<char> = target.chars().collect();
    let mut out = String::with_capacity(target.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '$' {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        let next = chars.get(i + 1).copied();
        match next {
            Some('$') => {
                out.push_str("$$");
                i += 2;
            }
            Some('&') => {
                out.push_str("${0}");
                i += 2;
            }
            Some(d) if d.is_ascii_digit() => {
                let one = d.to_digit(10).unwrap_or(0) as usize;
                let two = chars
                    .get(i + 2)
                    .and_then(|c| c.to_digit(10))
                    .map(|second| one * 10 + second as usize)
                    .filter(|&n| n < groups);
                match two {
                    Some(n) => {
                        out.push_str(&format!("${{{}}}", n));
                        i += 3;
                    }
                    None if one < groups => {
                        out.push_str(&format!("${{{}}}", one));
                        i += 2;
                    }
                    None => {
                        out.push_str("$$");
                        i += 1;
                    }
                }
            }
            Some('<') => {
                let close = chars[i + 2..].iter().position(|&c| c == '>');
                match close {
                    Some(len) => {
                        let name: String = chars[i + 2..i + 2 + len].iter().collect();
                        out.push_str(&format!("${{{}}}", name));
                        i += len + 3;
                    }
                    None => {
                        out.push_str("$$");
                        i += 1;
                    }
                }
            }
            _ => {
                out.push_str("$$");
                i += 1;
            }
        }
    }
    out
}

/// A compiled extractor reading one or more record properties.
#[derive(Debug, Clone)]
pub struct RegexExtractor {
    usage: ExtractorUsage,
    transformer: RegexTransformer,
    method: ExtractMethod,
    on_property: Vec<String>,
    on_empty: Option<String>,
}

impl RegexExtractor {
    /// Compile an extractor. Unknown properties are dropped with a warning;
    /// an invalid pattern disables the whole extractor.
    pub fn compile_or_warn(config: &ExtractorConfig, usage: ExtractorUsage) -> Option<Self> {
        let pattern = match compile_pattern(&config.pattern, config.flags.as_deref()) {
            Ok(pattern) => pattern,
            Err(err) => {
                warn!(%usage, pattern = %config.pattern, error = %err, "invalid regex, skipping");
                return None;
            }
        };

        let mut on_property = Vec::new();
        for property in &config.on_property {
            if is_known_property(property) {
                on_property.push(property.clone());
            } else {
                warn!(%usage, %property, "the provided property is not valid, ignoring it");
            }
        }
        if on_property.is_empty() {
            on_property.push("body".to_string());
        }

        Some(Self {
            usage,
            transformer: RegexTransformer::new(pattern, config.target.clone()),
            method: config.method,
            on_property,
            on_empty: config.on_empty.clone(),
        })
    }

    pub fn usage(&self) -> ExtractorUsage {
        self.usage
    }

    /// Extract values from a record. An empty vector means nothing was
    /// extracted and no fallback is configured.
    pub fn extract(&self, pr: &PullRequest) -> Vec<String> {
        let mut results = Vec::new();
        for property in &self.on_property {
            let Some(value) = record_property(pr, property) else {
                continue;
            };
            let Some(value) = value.joined() else {
                continue;
            };
            match self.method {
                ExtractMethod::Replace => results.extend(
                    self.transformer
                        .extract(&value)
                        .filter(|extracted| !extracted.is_empty()),
                ),
                ExtractMethod::Match => results.extend(self.match_all(&value)),
            }
        }

        if results.is_empty() {
            if let Some(fallback) = &self.on_empty {
                results.push(fallback.clone());
            }
        }
        results
    }

    fn match_all(&self, value: &str) -> Vec<String> {
        let target = self.transformer.target.as_str();
        self.transformer
            .pattern
            .captures_iter(value)
            .filter_map(|caps| {
                let extracted = if target.is_empty() {
                    caps[0].to_string()
                } else {
                    let mut expanded = String::new();
                    caps.expand(target, &mut expanded);
                    expanded
                };
                (!extracted.is_empty()).then_some(extracted)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changelog::tests::test_pull_request;

    fn extractor(json: &str) -> RegexExtractor {
        let config: ExtractorConfig = serde_json::from_str(json).unwrap();
        RegexExtractor::compile_or_warn(&config, ExtractorUsage::LabelExtractor).unwrap()
    }

    #[test]
    fn test_replace_extracts_from_body_by_default() {
        let mut pr = test_pull_request(1, "Title");
        pr.body = "Fixes ABC-12 for real".to_string();
        let ex = extractor(r#"{"pattern": ".*(ABC-\\d+).*", "target": "$1"}"#);
        assert_eq!(ex.extract(&pr), vec!["ABC-12"]);
    }

    #[test]
    fn test_replace_without_match_extracts_nothing() {
        let pr = test_pull_request(1, "Title");
        let ex = extractor(r#"{"pattern": "ABC-\\d+", "target": "$0"}"#);
        assert!(ex.extract(&pr).is_empty());
    }

    #[test]
    fn test_replace_with_self_counts_as_match() {
        let pr = test_pull_request(1, "feature");
        let ex = extractor(r#"{"pattern": "feature", "target": "$0", "on_property": "title"}"#);
        assert_eq!(ex.extract(&pr), vec!["feature"]);
    }

    #[test]
    fn test_match_emits_every_occurrence() {
        let mut pr = test_pull_request(1, "Title");
        pr.body = "Closes #3 and #4".to_string();
        let ex = extractor(r##"{"pattern": "#(\\d+)", "target": "$1", "method": "match"}"##);
        assert_eq!(ex.extract(&pr), vec!["3", "4"]);
    }

    #[test]
    fn test_match_with_empty_target_emits_whole_match() {
        let pr = test_pull_request(1, "[core] [ui] tidy");
        let ex = extractor(
            r#"{"pattern": "\\[\\w+\\]", "target": "", "method": "match", "on_property": "title"}"#,
        );
        assert_eq!(ex.extract(&pr), vec!["[core]", "[ui]"]);
    }

    #[test]
    fn test_on_empty_fallback() {
        let pr = test_pull_request(1, "Title");
        let ex = extractor(r#"{"pattern": "nothing", "on_empty": "misc"}"#);
        assert_eq!(ex.extract(&pr), vec!["misc"]);
    }

    #[test]
    fn test_multiple_properties_in_order() {
        let mut pr = test_pull_request(1, "feat: x");
        pr.branch = "feat/y".to_string();
        let ex = extractor(
            r#"{"pattern": "^(feat).*", "target": "$1", "on_property": ["title", "branch"]}"#,
        );
        assert_eq!(ex.extract(&pr), vec!["feat", "feat"]);
    }

    #[test]
    fn test_labels_property_is_joined() {
        let mut pr = test_pull_request(1, "Title");
        pr.labels = vec!["a".to_string(), "b".to_string()];
        let ex = extractor(r#"{"pattern": "^a,b$", "on_property": "labels"}"#);
        assert_eq!(ex.extract(&pr), vec!["a,b"]);
    }

    #[test]
    fn test_unknown_property_falls_back_to_body() {
        let mut pr = test_pull_request(1, "Title");
        pr.body = "body text".to_string();
        let ex = extractor(r#"{"pattern": "body", "on_property": "nope"}"#);
        assert_eq!(ex.extract(&pr), vec!["body"]);
    }

    #[test]
    fn test_invalid_pattern_is_skipped() {
        let config: ExtractorConfig = serde_json::from_str(r#"{"pattern": "("}"#).unwrap();
        assert!(RegexExtractor::compile_or_warn(&config, ExtractorUsage::Reference).is_none());
    }

    #[test]
    fn test_flags() {
        let regex = compile_pattern("^fix", Some("gi")).unwrap();
        assert!(regex.is_match("FIX: crash"));
        let regex = compile_pattern("a.b", Some("s")).unwrap();
        assert!(regex.is_match("a\nb"));
    }

    #[test]
    fn test_transformer_apply_is_global() {
        let t = RegexTransformer::new(Regex::new("o").unwrap(), "0");
        assert_eq!(t.apply("foo boo"), "f00 b00");
    }

    #[test]
    fn test_group_reference_followed_by_word_characters() {
        let t = RegexTransformer::new(Regex::new(r"(?s).*(ABC-\d+).*").unwrap(), "$1_fixed");
        assert_eq!(t.extract("Implements ABC-7"), Some("ABC-7_fixed".to_string()));
    }

    #[test]
    fn test_javascript_replacement_tokens() {
        let pattern = Regex::new(r"(?P<key>\w+)=(\d)").unwrap();
        let t = RegexTransformer::new(pattern.clone(), "[$&] $<key> $$ $2$9 $x");
        assert_eq!(t.apply("a=1"), "[a=1] a $ 1$9 $x");
        let t = RegexTransformer::new(pattern, "$0|$10");
        assert_eq!(t.apply("b=2"), "b=2|b0");
    }

    #[test]
    fn test_replace_to_empty_is_an_extraction_for_transformers_only() {
        let t = RegexTransformer::new(Regex::new("^none$").unwrap(), "");
        assert_eq!(t.extract("none"), Some(String::new()));

        let ex = extractor(r#"{"pattern": "^none$", "target": "", "on_property": "title"}"#);
        assert!(ex.extract(&test_pull_request(1, "none")).is_empty());
    }
}
