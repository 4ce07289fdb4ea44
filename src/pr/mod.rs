pub mod diff;
pub mod types;

pub use types::{ChangelogInput, DiffSummary, PrStatus, PullRequest, ReleaseInfo, Review};

use std::path::Path;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum PrError {
    #[error("Failed to read pull request input: {0}")]
    InputRead(#[from] std::io::Error),

    #[error("Failed to parse pull request input: {0}")]
    InputParse(#[from] serde_json::Error),

    #[error("Failed to parse diff: {0}")]
    DiffParse(String),

    #[error("Duplicate pull request number #{0} in input")]
    DuplicateNumber(u64),
}

/// Load pull request records and release metadata from a JSON file.
#[instrument]
pub fn load_input(path: &Path) -> Result<ChangelogInput, PrError> {
    let contents = std::fs::read_to_string(path)?;
    debug!(bytes = contents.len(), "read pull request input");
    parse_input(&contents)
}

/// Parse the JSON input document.
///
/// Record numbers key every lookup the changelog engine performs, so a
/// document repeating a number is rejected here.
pub fn parse_input(json: &str) -> Result<ChangelogInput, PrError> {
    let input: ChangelogInput = serde_json::from_str(json)?;

    let mut seen = std::collections::HashSet::new();
    for pr in &input.pull_requests {
        if !seen.insert(pr.number) {
            return Err(PrError::DuplicateNumber(pr.number));
        }
    }

    debug!(
        owner = %input.release.owner,
        repo = %input.release.repo,
        pull_requests = input.pull_requests.len(),
        "parsed pull request input"
    );
    Ok(input)
}
