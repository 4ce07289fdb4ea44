use std::collections::HashMap;

use tracing::{debug, instrument};

use super::extract::RegexExtractor;
use super::sort::{sort, SortSpec};
use crate::pr::PullRequest;

/// Collapse records sharing a deduplication key.
///
/// The key is the first extracted value. For a repeated key the record
/// processed last survives; records without a key are always kept. The
/// survivors are re-sorted with `spec`. Returns the survivors and the number
/// of removed records.
#[instrument(skip_all, fields(records = records.len()))]
pub fn deduplicate(
    records: Vec<PullRequest>,
    extractor: &RegexExtractor,
    spec: SortSpec,
) -> (Vec<PullRequest>, usize) {
    let total = records.len();
    let mut slots: Vec<PullRequest> = Vec::new();
    let mut by_key: HashMap<String, usize> = HashMap::new();
    let mut unmatched = Vec::new();

    for pr in records {
        let Some(key) = extractor.extract(&pr).into_iter().next() else {
            unmatched.push(pr);
            continue;
        };
        match by_key.get(&key) {
            Some(&slot) => {
                debug!(%key, replaced = slots[slot].number, by = pr.number, "duplicate record");
                slots[slot] = pr;
            }
            None => {
                by_key.insert(key, slots.len());
                slots.push(pr);
            }
        }
    }

    slots.extend(unmatched);
    let removed = total - slots.len();
    debug!(removed, "deduplicated records");
    (sort(slots, spec), removed)
}
