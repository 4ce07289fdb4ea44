use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a pull request at the time the changelog is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrStatus {
    Open,
    Merged,
    Closed,
}

impl std::fmt::Display for PrStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrStatus::Open => write!(f, "open"),
            PrStatus::Merged => write!(f, "merged"),
            PrStatus::Closed => write!(f, "closed"),
        }
    }
}

/// A single pull request record as delivered by the fetching collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    /// PR number (e.g., 42), unique within one invocation
    pub number: u64,
    /// PR title
    pub title: String,
    /// Web URL of the PR
    #[serde(default)]
    pub url: String,
    pub status: PrStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub merge_commit_sha: String,
    /// Author's GitHub login
    pub author: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub milestone: Option<String>,
    /// Head branch
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub base_branch: String,
    /// Labels in display order. Matching is case-insensitive.
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub assignees: Vec<String>,
    /// Requested reviewers
    #[serde(default)]
    pub reviewers: Vec<String>,
    /// Reviewers who approved
    #[serde(default)]
    pub approvers: Vec<String>,
    #[serde(default)]
    pub reviews: Vec<Review>,
    /// Numbers of the records linked beneath this one by the reference linker.
    #[serde(skip_deserializing, default)]
    pub child_prs: Vec<u64>,
}

impl PullRequest {
    /// Case-insensitive label membership, folding with Unicode lowercase
    /// like the configured labels are.
    pub fn has_label(&self, label: &str) -> bool {
        let label = label.to_lowercase();
        self.labels.iter().any(|l| l.to_lowercase() == label)
    }

    /// Append a label unless an equal one (ignoring case) is already present.
    pub fn add_label(&mut self, label: String) -> bool {
        if self.has_label(&label) {
            return false;
        }
        self.labels.push(label);
        true
    }
}

/// A review comment left on a pull request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Review {
    pub author: String,
    #[serde(default)]
    pub body: String,
    /// Review state as reported by GitHub (APPROVED, COMMENTED, ...)
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub url: String,
}

/// Aggregate diff statistics between the two release tags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    #[serde(default)]
    pub changed_files: u64,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    #[serde(default)]
    pub changes: u64,
    #[serde(default)]
    pub commits: u64,
}

/// Document-level metadata describing the release range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseInfo {
    pub owner: String,
    pub repo: String,
    #[serde(default)]
    pub from_tag: String,
    #[serde(default)]
    pub from_tag_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to_tag: String,
    #[serde(default)]
    pub to_tag_date: Option<DateTime<Utc>>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub diff: DiffSummary,
}

fn default_base_url() -> String {
    "https://github.com".to_string()
}

impl ReleaseInfo {
    /// Compare URL between the two tags, e.g. `https://github.com/org/repo/compare/v1...v2`.
    pub fn release_diff_url(&self) -> String {
        format!(
            "{}/{}/{}/compare/{}...{}",
            self.base_url.trim_end_matches('/'),
            self.owner,
            self.repo,
            self.from_tag,
            self.to_tag
        )
    }

    /// Whole days between the from-tag and to-tag dates, if both are known.
    pub fn days_since(&self) -> Option<i64> {
        match (self.from_tag_date, self.to_tag_date) {
            (Some(from), Some(to)) => Some((to - from).num_days()),
            _ => None,
        }
    }
}

/// Everything the input supplier hands to the changelog engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangelogInput {
    pub release: ReleaseInfo,
    #[serde(default)]
    pub pull_requests: Vec<PullRequest>,
}
