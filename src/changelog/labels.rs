use tracing::{debug, instrument};

use super::extract::RegexExtractor;
use crate::pr::PullRequest;

/// Prefix of labels synthesized by the engine itself. They take part in
/// matching but never show up in `${{LABELS}}`.
pub const INTERNAL_LABEL_PREFIX: &str = "--internal-";

pub fn is_internal_label(label: &str) -> bool {
    label.starts_with(INTERNAL_LABEL_PREFIX)
}

/// Give every record a `--internal-<status>` label so categories and rules
/// can select records by status.
pub fn apply_status_labels(records: &mut [PullRequest]) {
    for pr in records {
        let label = format!("{}{}", INTERNAL_LABEL_PREFIX, pr.status);
        pr.add_label(label);
    }
}

/// Run every label extractor, in configured order, against every record and
/// append the lower-cased results as labels. Existing labels are never
/// replaced or duplicated.
#[instrument(skip_all, fields(records = records.len(), extractors = extractors.len()))]
pub fn extract_labels(records: &mut [PullRequest], extractors: &[RegexExtractor]) {
    for extractor in extractors {
        for pr in records.iter_mut() {
            for label in extractor.extract(pr) {
                let label = label.to_lowercase();
                if pr.add_label(label.clone()) {
                    debug!(pr = pr.number, %label, "extracted label");
                }
            }
        }
    }
}
