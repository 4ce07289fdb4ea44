use std::collections::HashMap;

use tracing::{debug, instrument, warn};

use super::extract::RegexExtractor;
use crate::pr::PullRequest;

/// Records split into the top-level list and the records linked beneath a
/// parent. Parents refer to their children by number through `child_prs`.
#[derive(Debug, Default)]
pub struct Linked {
    pub roots: Vec<PullRequest>,
    pub children: Vec<PullRequest>,
}

/// Attach records to the parent they reference.
///
/// The first extracted value is parsed as a record number (a leading `#` is
/// tolerated). A record is linked when that number names another record in
/// the input; it is then removed from the roots and its number appended to
/// the parent's `child_prs`.
///
/// Linking is a single pass: a record that already has children stays a
/// root, and a record that was already linked cannot adopt children, so the
/// relation never nests and never forms a cycle. Deeper hierarchies are not
/// resolved.
#[instrument(skip_all, fields(records = records.len()))]
pub fn link_references(records: Vec<PullRequest>, extractor: &RegexExtractor) -> Linked {
    let positions: HashMap<u64, usize> = records
        .iter()
        .enumerate()
        .map(|(i, pr)| (pr.number, i))
        .collect();

    let parents: Vec<Option<usize>> = records
        .iter()
        .map(|pr| resolve_parent(pr, extractor, &positions))
        .collect();

    let mut records: Vec<Option<PullRequest>> = records.into_iter().map(Some).collect();
    let mut linked = vec![false; records.len()];
    let mut children = Vec::new();

    for (child, parent) in parents.into_iter().enumerate() {
        let Some(parent) = parent else {
            continue;
        };
        let has_children = records[child].as_ref().is_some_and(|pr| !pr.child_prs.is_empty());
        if linked[parent] || has_children {
            debug!(child, parent, "skipping nested reference");
            continue;
        }
        let Some(pr) = records[child].take() else {
            continue;
        };
        if let Some(parent_pr) = records[parent].as_mut() {
            parent_pr.child_prs.push(pr.number);
        }
        linked[child] = true;
        children.push(pr);
    }

    let roots: Vec<PullRequest> = records.into_iter().flatten().collect();
    debug!(roots = roots.len(), children = children.len(), "linked references");
    Linked { roots, children }
}

fn resolve_parent(
    pr: &PullRequest,
    extractor: &RegexExtractor,
    positions: &HashMap<u64, usize>,
) -> Option<usize> {
    let extracted = extractor.extract(pr);
    let candidate = extracted.first()?;
    let number = match candidate.trim().trim_start_matches('#').parse::<u64>() {
        Ok(number) => number,
        Err(_) => {
            warn!(
                usage = %extractor.usage(),
                pr = pr.number,
                value = %candidate,
                "extracted reference is not a number, keeping record as root"
            );
            return None;
        }
    };
    if number == pr.number {
        return None;
    }
    positions.get(&number).copied()
}
