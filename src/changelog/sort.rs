use std::cmp::Ordering;

use super::ChangelogError;
use crate::config::SortConfig;
use crate::pr::PullRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    /// Falls back to the creation date for records that were never merged
    MergedAt,
    Title,
    Number,
    Author,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// A validated sort specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub field: SortField,
    pub order: SortOrder,
}

impl SortSpec {
    pub fn from_config(config: &SortConfig) -> Result<Self, ChangelogError> {
        let field = match config.on_property.as_str() {
            "createdAt" | "created_at" => SortField::CreatedAt,
            "mergedAt" | "merged_at" => SortField::MergedAt,
            "title" => SortField::Title,
            "number" => SortField::Number,
            "author" => SortField::Author,
            other => return Err(ChangelogError::UnknownSortField(other.to_string())),
        };
        let order = if config.order.eq_ignore_ascii_case("asc") {
            SortOrder::Asc
        } else if config.order.eq_ignore_ascii_case("desc") {
            SortOrder::Desc
        } else {
            return Err(ChangelogError::UnknownSortOrder(config.order.clone()));
        };
        Ok(Self { field, order })
    }

    fn compare(&self, a: &PullRequest, b: &PullRequest) -> Ordering {
        let ordering = match self.field {
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::MergedAt => a
                .merged_at
                .unwrap_or(a.created_at)
                .cmp(&b.merged_at.unwrap_or(b.created_at)),
            SortField::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            SortField::Number => a.number.cmp(&b.number),
            SortField::Author => a.author.to_lowercase().cmp(&b.author.to_lowercase()),
        };
        match self.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

/// Order records per `spec`. The sort is stable: ties keep their prior
/// relative order in both directions.
pub fn sort(mut records: Vec<PullRequest>, spec: SortSpec) -> Vec<PullRequest> {
    records.sort_by(|a, b| spec.compare(a, b));
    records
}
