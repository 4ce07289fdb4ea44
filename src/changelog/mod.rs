pub mod assemble;
pub mod classify;
pub mod dedup;
pub mod extract;
pub mod labels;
pub mod link;
pub mod rules;
pub mod sort;
pub mod template;

use std::collections::HashMap;

use chrono::format::{Item, StrftimeItems};
use thiserror::Error;
use tracing::{debug, info, instrument};

use self::assemble::{assemble_sections, category_outputs, document_placeholders, Sections};
use self::classify::{classify, Category, Classification};
use self::dedup::deduplicate;
use self::extract::{ExtractorUsage, RegexExtractor, RegexTransformer};
use self::labels::{apply_status_labels, extract_labels};
use self::link::{link_references, Linked};
use self::sort::{sort, SortSpec};
use self::template::{record_placeholders, CustomPlaceholder, TemplateEngine, TrackedValues};
use crate::config::Config;
use crate::pr::{ChangelogInput, PullRequest, ReleaseInfo};
use crate::report::types::{ChangelogCounts, ChangelogResult};

#[derive(Debug, Error)]
pub enum ChangelogError {
    #[error("Unknown sort field '{0}' (expected createdAt, mergedAt, title, number or author)")]
    UnknownSortField(String),

    #[error("Unknown sort order '{0}' (expected ASC or DESC)")]
    UnknownSortOrder(String),

    #[error("Invalid category {category}: {source}")]
    InvalidCategory {
        category: String,
        #[source]
        source: rules::RuleError,
    },

    #[error("Invalid date format '{0}'")]
    InvalidDateFormat(String),
}

/// Pipeline stages, in the only order they are ever visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Sorted,
    Linked,
    Deduplicated,
    LabelExtracted,
    Classified,
    Rendered,
    Assembled,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Sorted => write!(f, "sorted"),
            Stage::Linked => write!(f, "linked"),
            Stage::Deduplicated => write!(f, "deduplicated"),
            Stage::LabelExtracted => write!(f, "label_extracted"),
            Stage::Classified => write!(f, "classified"),
            Stage::Rendered => write!(f, "rendered"),
            Stage::Assembled => write!(f, "assembled"),
        }
    }
}

/// A validated, compiled configuration ready to build changelogs.
///
/// Compilation happens once. Invalid extractor, transformer and custom
/// placeholder patterns are skipped with a warning; an unknown sort field, a
/// malformed category or an invalid date format rejects the configuration.
#[derive(Debug, Clone)]
pub struct Pipeline {
    sort: SortSpec,
    categories: Vec<Category>,
    ignore_labels: Vec<String>,
    label_extractors: Vec<RegexExtractor>,
    reference: Option<RegexExtractor>,
    duplicate_filter: Option<RegexExtractor>,
    transformers: Vec<RegexTransformer>,
    custom_placeholders: Vec<CustomPlaceholder>,
    template: String,
    pr_template: String,
    empty_template: String,
    trim_values: bool,
    date_format: Option<String>,
}

impl Pipeline {
    pub fn new(config: &Config) -> Result<Self, ChangelogError> {
        let sort = SortSpec::from_config(&config.sort)?;

        let categories = config
            .categories
            .iter()
            .enumerate()
            .map(|(index, category)| Category::compile(category, index))
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(format) = &config.date_format {
            if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
                return Err(ChangelogError::InvalidDateFormat(format.clone()));
            }
        }

        let pipeline = Self {
            sort,
            categories,
            ignore_labels: config.ignore_labels.iter().map(|l| l.to_lowercase()).collect(),
            label_extractors: config
                .label_extractor
                .iter()
                .filter_map(|c| RegexExtractor::compile_or_warn(c, ExtractorUsage::LabelExtractor))
                .collect(),
            reference: config
                .reference
                .as_ref()
                .and_then(|c| RegexExtractor::compile_or_warn(c, ExtractorUsage::Reference)),
            duplicate_filter: config
                .duplicate_filter
                .as_ref()
                .and_then(|c| RegexExtractor::compile_or_warn(c, ExtractorUsage::DuplicateFilter)),
            transformers: config
                .transformers
                .iter()
                .filter_map(|c| RegexTransformer::compile_or_warn(c, ExtractorUsage::Transformer))
                .collect(),
            custom_placeholders: config
                .custom_placeholders
                .iter()
                .filter_map(CustomPlaceholder::compile_or_warn)
                .collect(),
            template: config.template.clone(),
            pr_template: config.pr_template.clone(),
            empty_template: config.empty_template.clone(),
            trim_values: config.trim_values,
            date_format: config.date_format.clone(),
        };

        debug!(
            categories = pipeline.categories.len(),
            label_extractors = pipeline.label_extractors.len(),
            transformers = pipeline.transformers.len(),
            custom_placeholders = pipeline.custom_placeholders.len(),
            "compiled configuration"
        );
        Ok(pipeline)
    }

    /// Build the changelog for `records`.
    ///
    /// Pure: identical records and release info always produce an identical
    /// result.
    #[instrument(skip_all, fields(records = records.len(), to_tag = %release.to_tag))]
    pub fn run(&self, records: Vec<PullRequest>, release: &ReleaseInfo) -> ChangelogResult {
        let engine = TemplateEngine::new(&self.custom_placeholders, self.trim_values);

        if records.is_empty() {
            info!("no pull requests, rendering empty template");
            return self.render_empty(&engine, release);
        }
        let total = records.len();

        let records = sort(records, self.sort);
        debug!(stage = %Stage::Sorted, records = records.len());

        let Linked { roots, children } = match &self.reference {
            Some(extractor) => link_references(records, extractor),
            None => Linked {
                roots: records,
                children: Vec::new(),
            },
        };
        debug!(stage = %Stage::Linked, roots = roots.len(), children = children.len());

        let (mut records, duplicates_removed) = match &self.duplicate_filter {
            Some(extractor) => deduplicate(roots, extractor, self.sort),
            None => (roots, 0),
        };
        debug!(stage = %Stage::Deduplicated, records = records.len(), duplicates_removed);

        apply_status_labels(&mut records);
        extract_labels(&mut records, &self.label_extractors);
        debug!(stage = %Stage::LabelExtracted);

        let classification = classify(&records, &self.categories, &self.ignore_labels);
        debug!(stage = %Stage::Classified);

        let child_lookup: HashMap<u64, &PullRequest> =
            children.iter().map(|child| (child.number, child)).collect();
        let mut tracked = TrackedValues::default();
        let bodies: Vec<String> = records
            .iter()
            .map(|pr| self.render_record(&engine, pr, &child_lookup, &mut tracked))
            .collect();
        debug!(stage = %Stage::Rendered, bodies = bodies.len());

        let counts = ChangelogCounts {
            total,
            categorized: classification.categorized.len(),
            uncategorized: classification.uncategorized.len(),
            open: classification.open.len(),
            ignored: classification.ignored.len(),
            duplicates_removed,
            linked: children.len(),
        };
        let sections = assemble_sections(&self.categories, &classification, &bodies);
        let document = self.render_document(&engine, &self.template, release, &sections, &counts);
        let document = engine.fill_tracked(&document, &tracked);
        let document = engine.cleanup(&document);
        debug!(stage = %Stage::Assembled, bytes = document.len());

        info!(
            categorized = counts.categorized,
            uncategorized = counts.uncategorized,
            open = counts.open,
            ignored = counts.ignored,
            "changelog built"
        );

        let finished: Vec<String> = bodies
            .iter()
            .map(|body| engine.cleanup(&engine.fill_tracked(body, &tracked)))
            .collect();
        ChangelogResult {
            document,
            categories: category_outputs(&self.categories, &classification, &finished),
            counts,
        }
    }

    fn render_empty(&self, engine: &TemplateEngine, release: &ReleaseInfo) -> ChangelogResult {
        let counts = ChangelogCounts::default();
        let document = self.render_document(
            engine,
            &self.empty_template,
            release,
            &Sections::default(),
            &counts,
        );
        let classification = Classification {
            categories: vec![Vec::new(); self.categories.len()],
            ..Classification::default()
        };
        ChangelogResult {
            document: engine.cleanup(&document),
            categories: category_outputs(&self.categories, &classification, &[]),
            counts,
        }
    }

    fn render_document(
        &self,
        engine: &TemplateEngine,
        template: &str,
        release: &ReleaseInfo,
        sections: &Sections,
        counts: &ChangelogCounts,
    ) -> String {
        let placeholders =
            document_placeholders(release, sections, counts, self.date_format.as_deref());
        engine.render(template, &[], &placeholders, None)
    }

    fn render_record(
        &self,
        engine: &TemplateEngine,
        pr: &PullRequest,
        children: &HashMap<u64, &PullRequest>,
        tracked: &mut TrackedValues,
    ) -> String {
        let (arrays, scalars) = record_placeholders(pr, children, self.date_format.as_deref());
        let mut body = engine.render(&self.pr_template, &arrays, &scalars, Some(tracked));
        for transformer in &self.transformers {
            body = transformer.apply(&body).into_owned();
        }
        if self.trim_values {
            body = body.trim().to_string();
        }
        body
    }
}

/// Compile `config` and build the changelog for `input`.
pub fn build_changelog(
    input: ChangelogInput,
    config: &Config,
) -> Result<ChangelogResult, ChangelogError> {
    let pipeline = Pipeline::new(config)?;
    Ok(pipeline.run(input.pull_requests, &input.release))
}
