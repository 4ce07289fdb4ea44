use super::classify::{Category, Classification};
use super::template::{format_date, Placeholders};
use crate::pr::ReleaseInfo;
use crate::report::types::{CategoryOutput, ChangelogCounts};

/// The document sections substituted into the top-level template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sections {
    pub changelog: String,
    pub uncategorized: String,
    pub open: String,
    pub ignored: String,
}

/// Build the document sections from classified record bodies.
///
/// A category with bodies emits its title, a blank line, one body per line
/// and a closing blank line. An empty category emits its title and
/// `empty_content` when configured, and nothing otherwise.
pub fn assemble_sections(
    categories: &[Category],
    classification: &Classification,
    bodies: &[String],
) -> Sections {
    let mut changelog = String::new();
    for (category, members) in categories.iter().zip(&classification.categories) {
        if !members.is_empty() {
            if let Some(title) = &category.title {
                changelog.push_str(&format!("{}\n\n", title));
            }
            for &index in members {
                changelog.push_str(&format!("{}\n", bodies[index]));
            }
            changelog.push('\n');
        } else if let Some(empty_content) = &category.empty_content {
            if let Some(title) = &category.title {
                changelog.push_str(&format!("{}\n\n", title));
            }
            changelog.push_str(&format!("{}\n\n", empty_content));
        }
    }

    Sections {
        changelog,
        uncategorized: flat_join(&classification.uncategorized, bodies),
        open: flat_join(&classification.open, bodies),
        ignored: flat_join(&classification.ignored, bodies),
    }
}

fn flat_join(members: &[usize], bodies: &[String]) -> String {
    members
        .iter()
        .map(|&index| format!("{}\n", bodies[index]))
        .collect()
}

/// Per-category body lists for the structured output.
pub fn category_outputs(
    categories: &[Category],
    classification: &Classification,
    bodies: &[String],
) -> Vec<CategoryOutput> {
    categories
        .iter()
        .zip(&classification.categories)
        .enumerate()
        .map(|(index, (category, members))| CategoryOutput {
            key: category.output_key(index),
            title: category.title.clone(),
            bodies: members.iter().map(|&i| bodies[i].clone()).collect(),
        })
        .collect()
}

/// Document-level placeholders. Sections come first so that placeholders
/// written inside record templates (e.g. `${{OWNER}}`) resolve as well.
pub fn document_placeholders(
    release: &ReleaseInfo,
    sections: &Sections,
    counts: &ChangelogCounts,
    date_format: Option<&str>,
) -> Placeholders {
    let date = |d: Option<chrono::DateTime<chrono::Utc>>| {
        d.map(|d| format_date(&d, date_format)).unwrap_or_default()
    };

    let mut placeholders = Placeholders::new();
    placeholders.insert("CHANGELOG", sections.changelog.as_str());
    placeholders.insert("UNCATEGORIZED", sections.uncategorized.as_str());
    placeholders.insert("OPEN", sections.open.as_str());
    placeholders.insert("IGNORED", sections.ignored.as_str());
    placeholders.insert("CATEGORIZED_COUNT", counts.categorized.to_string());
    placeholders.insert("UNCATEGORIZED_COUNT", counts.uncategorized.to_string());
    placeholders.insert("OPEN_COUNT", counts.open.to_string());
    placeholders.insert("IGNORED_COUNT", counts.ignored.to_string());
    placeholders.insert("CHANGED_FILES", release.diff.changed_files.to_string());
    placeholders.insert("ADDITIONS", release.diff.additions.to_string());
    placeholders.insert("DELETIONS", release.diff.deletions.to_string());
    placeholders.insert("CHANGES", release.diff.changes.to_string());
    placeholders.insert("COMMITS", release.diff.commits.to_string());
    placeholders.insert("OWNER", release.owner.as_str());
    placeholders.insert("REPO", release.repo.as_str());
    placeholders.insert("FROM_TAG", release.from_tag.as_str());
    placeholders.insert("FROM_TAG_DATE", date(release.from_tag_date));
    placeholders.insert("TO_TAG", release.to_tag.as_str());
    placeholders.insert("TO_TAG_DATE", date(release.to_tag_date));
    placeholders.insert(
        "DAYS_SINCE",
        release.days_since().map(|d| d.to_string()).unwrap_or_default(),
    );
    placeholders.insert("RELEASE_DIFF", release.release_diff_url());
    placeholders
}
