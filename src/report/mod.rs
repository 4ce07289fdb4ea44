pub mod types;

pub use types::{CategoryOutput, ChangelogCounts, ChangelogResult};

use colored::Colorize;
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::pr::ReleaseInfo;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write changelog file: {0}")]
    FileWrite(#[from] std::io::Error),

    #[error("Failed to serialize changelog result: {0}")]
    Json(#[from] serde_json::Error),
}

/// Output the changelog document to stdout (default) or to a file.
#[instrument(skip(result), fields(bytes = result.document.len()))]
pub fn output(result: &ChangelogResult, output_path: Option<&Path>) -> Result<(), ReportError> {
    match output_path {
        None => {
            debug!("writing changelog to stdout");
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(result.document.as_bytes())?;
            if !result.document.ends_with('\n') {
                stdout.write_all(b"\n")?;
            }
            Ok(())
        }
        Some(path) => {
            debug!(path = %path.display(), "writing changelog to file");
            std::fs::write(path, &result.document)?;
            Ok(())
        }
    }
}

/// Write the structured result as pretty-printed JSON.
#[instrument(skip(result))]
pub fn write_json(result: &ChangelogResult, path: &Path) -> Result<(), ReportError> {
    let json = serde_json::to_string_pretty(result)?;
    std::fs::write(path, json)?;
    debug!(path = %path.display(), "wrote structured result");
    Ok(())
}

/// Print a colored count summary to stderr, leaving stdout to the document.
pub fn print_summary(result: &ChangelogResult, release: &ReleaseInfo) {
    eprintln!("{}", summary_text(result, release));
}

fn summary_text(result: &ChangelogResult, release: &ReleaseInfo) -> String {
    let counts = &result.counts;
    let mut text = format!(
        "═══ {}/{} {} → {} ═══\n",
        release.owner,
        release.repo,
        display_tag(&release.from_tag),
        display_tag(&release.to_tag)
    );

    for category in &result.categories {
        let label = category.title.as_deref().unwrap_or(&category.key);
        let count = if category.bodies.is_empty() {
            "0".dimmed()
        } else {
            category.bodies.len().to_string().green().bold()
        };
        text.push_str(&format!("  • {}: {}\n", label, count));
    }

    text.push_str(&format!(
        "Categorized: {} | Uncategorized: {} | Open: {} | Ignored: {}\n",
        counts.categorized.to_string().green(),
        colorize_attention(counts.uncategorized),
        counts.open.to_string().cyan(),
        counts.ignored.to_string().dimmed()
    ));
    if counts.duplicates_removed > 0 || counts.linked > 0 {
        text.push_str(&format!(
            "Duplicates removed: {} | Linked: {} | Total records: {}\n",
            counts.duplicates_removed, counts.linked, counts.total
        ));
    }
    text
}

fn display_tag(tag: &str) -> &str {
    if tag.is_empty() {
        "?"
    } else {
        tag
    }
}

/// Uncategorized records usually mean a missing label.
fn colorize_attention(count: usize) -> colored::ColoredString {
    if count == 0 {
        count.to_string().green()
    } else {
        count.to_string().yellow().bold()
    }
}
