use super::types::DiffSummary;
use super::PrError;

/// Summarize a unified diff (as produced by `git diff` or GitHub's compare
/// endpoint) into the statistics exposed to changelog templates.
///
/// Each file section starts with `diff --git a/{path} b/{path}`; hunks start
/// with `@@ -{old} +{new} @@`. Only lines inside a hunk are counted, so the
/// `---`/`+++` file headers never inflate the totals. `commits` is left at
/// zero because a diff carries no commit information.
pub fn summarize_diff(raw_diff: &str) -> Result<DiffSummary, PrError> {
    let mut summary = DiffSummary::default();
    if raw_diff.trim().is_empty() {
        return Ok(summary);
    }

    let mut in_file = false;
    let mut in_hunk = false;

    for line in raw_diff.lines() {
        if let Some(rest) = line.strip_prefix("diff --git ") {
            if rest.split_whitespace().count() < 2 {
                return Err(PrError::DiffParse(format!("Malformed file header: {}", line)));
            }
            summary.changed_files += 1;
            in_file = true;
            in_hunk = false;
            continue;
        }

        if line.starts_with("@@") {
            if !in_file {
                return Err(PrError::DiffParse("Hunk outside of a file section".to_string()));
            }
            validate_hunk_header(line)?;
            in_hunk = true;
            continue;
        }

        if !in_hunk {
            continue;
        }

        if line.starts_with('+') {
            summary.additions += 1;
        } else if line.starts_with('-') {
            summary.deletions += 1;
        }
    }

    summary.changes = summary.additions + summary.deletions;
    Ok(summary)
}

fn validate_hunk_header(line: &str) -> Result<(), PrError> {
    let header = line
        .trim()
        .strip_prefix("@@")
        .and_then(|h| h.split("@@").next())
        .map(str::trim)
        .ok_or_else(|| PrError::DiffParse("Invalid hunk header".to_string()))?;

    let mut parts = header.split_whitespace();
    for prefix in ['-', '+'] {
        let part = parts
            .next()
            .ok_or_else(|| PrError::DiffParse(format!("Missing range in {}", line)))?;
        let range = part
            .strip_prefix(prefix)
            .ok_or_else(|| PrError::DiffParse(format!("Invalid range prefix in {}", line)))?;
        let valid = range
            .split(',')
            .all(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()));
        if !valid {
            return Err(PrError::DiffParse(format!("Invalid range {} in {}", part, line)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_DIFF: &str = r#"diff --git a/src/main.rs b/src/main.rs
index abc1234..def5678 100644
--- a/src/main.rs
+++ b/src/main.rs
@@ -1,5 +1,7 @@
 fn main() {
-    println!("old");
+    println!("new");
+    // Added a comment
 }
diff --git a/new_file.txt b/new_file.txt
new file mode 100644
--- /dev/null
+++ b/new_file.txt
@@ -0,0 +1,2 @@
+hello
+world
"#;

    #[test]
    fn test_summarize_multi_file_diff() {
        let summary = summarize_diff(SAMPLE_DIFF).unwrap();
        assert_eq!(summary.changed_files, 2);
        assert_eq!(summary.additions, 4);
        assert_eq!(summary.deletions, 1);
        assert_eq!(summary.changes, 5);
        assert_eq!(summary.commits, 0);
    }

    #[test]
    fn test_summarize_empty_diff() {
        assert_eq!(summarize_diff("").unwrap(), DiffSummary::default());
    }

    #[test]
    fn test_rejects_malformed_hunk_header() {
        let diff = "diff --git a/x b/x\n@@ -a,1 +1,1 @@\n+x\n";
        assert!(summarize_diff(diff).is_err());
    }

    #[test]
    fn test_rejects_hunk_without_file() {
        assert!(summarize_diff("@@ -1,1 +1,1 @@\n+x\n").is_err());
    }
}
