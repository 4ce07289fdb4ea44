use serde::Serialize;

/// Record counts exposed alongside the document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChangelogCounts {
    /// Records handed to the pipeline, before linking and deduplication
    pub total: usize,
    /// Records matching at least one category
    pub categorized: usize,
    /// Records matching no category
    pub uncategorized: usize,
    /// Open records (also counted as categorized or uncategorized)
    pub open: usize,
    /// Records carrying an ignore label
    pub ignored: usize,
    /// Records removed by the duplicate filter
    pub duplicates_removed: usize,
    /// Records linked beneath a parent by the reference extractor
    pub linked: usize,
}

/// Rendered bodies of one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryOutput {
    /// Category key, falling back to its title
    pub key: String,
    pub title: Option<String>,
    pub bodies: Vec<String>,
}

/// Everything one changelog build produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangelogResult {
    pub document: String,
    pub categories: Vec<CategoryOutput>,
    pub counts: ChangelogCounts,
}
