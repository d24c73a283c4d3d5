//! Parse unified diff format (as produced by `git diff`).

use crate::model::{DiffLine, FileDiff, FileStatus, Hunk, LineKind};
use thiserror::Error;
use unidiff::{Hunk as UnidiffHunk, Line as UnidiffLine, PatchSet, PatchedFile};

/// Errors that can occur during diff parsing.
#[derive(Debug, Error)]
pub enum DiffError {
    #[error("failed to parse diff: {0}")]
    ParseFailed(String),
}

/// Parse a unified diff string into per-file structured diffs.
pub fn parse_unified_diff(diff_text: &str) -> Result<Vec<FileDiff>, DiffError> {
    let mut patch_set = PatchSet::new();
    patch_set
        .parse(diff_text)
        .map_err(|e| DiffError::ParseFailed(e.to_string()))?;

    let mut files = Vec::new();
    for patched_file in patch_set.files() {
        files.push(parse_patched_file(patched_file));
    }
    Ok(files)
}

fn parse_patched_file(file: &PatchedFile) -> FileDiff {
    let target = clean_path(&file.target_file);
    let source = clean_path(&file.source_file);

    // For deletions the post-image path is /dev/null; keep the name the
    // file had, so lookups by path still find it.
    let path = if target == "/dev/null" || target.is_empty() {
        source.clone()
    } else {
        target.clone()
    };
    let mut file_diff = FileDiff::new(path);
    file_diff.status = determine_status(&source, &target);

    if source != target && !source.is_empty() && source != "/dev/null" {
        file_diff.old_path = Some(source);
    }

    for hunk in file.hunks() {
        file_diff.hunks.push(parse_hunk(hunk));
    }

    file_diff.recalculate_stats();
    file_diff
}

fn parse_hunk(hunk: &UnidiffHunk) -> Hunk {
    let mut parsed = Hunk::new(
        hunk.source_start as u32,
        hunk.source_length as u32,
        hunk.target_start as u32,
        hunk.target_length as u32,
    );
    for line in hunk.lines() {
        if line.line_type == "\\" {
            // "\ No newline at end of file" carries no line numbers.
            continue;
        }
        parsed.lines.push(parse_line(line));
    }
    parsed
}

fn parse_line(line: &UnidiffLine) -> DiffLine {
    let kind = match line.line_type.as_str() {
        "+" => LineKind::Addition,
        "-" => LineKind::Deletion,
        _ => LineKind::Context,
    };
    DiffLine {
        kind,
        content: line.value.to_string(),
        old_line: line.source_line_no.map(|n| n as u32),
        new_line: line.target_line_no.map(|n| n as u32),
    }
}

fn determine_status(source: &str, target: &str) -> FileStatus {
    if source == "/dev/null" || source.is_empty() {
        FileStatus::Added
    } else if target == "/dev/null" || target.is_empty() {
        FileStatus::Deleted
    } else if source != target {
        FileStatus::Renamed
    } else {
        FileStatus::Modified
    }
}

/// Clean the path by removing a/b prefixes from git diff output.
fn clean_path(path: &str) -> String {
    let path = path.trim();
    if let Some(stripped) = path.strip_prefix("a/") {
        return stripped.to_string();
    }
    if let Some(stripped) = path.strip_prefix("b/") {
        return stripped.to_string();
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE_DIFF: &str = r#"diff --git a/src/main.rs b/src/main.rs
index abc123..def456 100644
--- a/src/main.rs
+++ b/src/main.rs
@@ -1,5 +1,6 @@ fn main()
 fn main() {
     println!("Hello");
+    println!("World");
 }

diff --git a/src/lib.rs b/src/lib.rs
index 111222..333444 100644
--- a/src/lib.rs
+++ b/src/lib.rs
@@ -10,7 +10,6 @@ impl Foo {
 impl Foo {
     fn bar(&self) {
-        // old comment
         self.do_thing();
     }
 }
"#;

    #[test]
    fn parses_simple_diff() {
        let files = parse_unified_diff(SAMPLE_DIFF).unwrap();
        assert_eq!(files.len(), 2);

        let file1 = &files[0];
        assert_eq!(file1.path, "src/main.rs");
        assert_eq!(file1.status, FileStatus::Modified);
        assert_eq!(file1.additions, 1);
        assert_eq!(file1.deletions, 0);
        assert_eq!(file1.hunks.len(), 1);

        let file2 = &files[1];
        assert_eq!(file2.path, "src/lib.rs");
        assert_eq!(file2.additions, 0);
        assert_eq!(file2.deletions, 1);
    }

    #[test]
    fn parses_new_file() {
        let diff = r#"diff --git a/new_file.rs b/new_file.rs
new file mode 100644
index 0000000..abc1234
--- /dev/null
+++ b/new_file.rs
@@ -0,0 +1,3 @@
+fn new_function() {
+    // new code
+}
"#;
        let files = parse_unified_diff(diff).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].status, FileStatus::Added);
        assert_eq!(files[0].additions, 3);
    }

    #[test]
    fn deleted_file_keeps_its_name() {
        let diff = r#"diff --git a/old_file.rs b/old_file.rs
deleted file mode 100644
index abc1234..0000000
--- a/old_file.rs
+++ /dev/null
@@ -1,3 +0,0 @@
-fn old_function() {
-    // old code
-}
"#;
        let files = parse_unified_diff(diff).unwrap();
        assert_eq!(files[0].status, FileStatus::Deleted);
        assert_eq!(files[0].path, "old_file.rs");
        assert_eq!(files[0].deletions, 3);
    }

    #[test]
    fn renamed_file_matches_post_rename_name() {
        let diff = r#"diff --git a/old_name.rs b/new_name.rs
similarity index 95%
rename from old_name.rs
rename to new_name.rs
index abc123..def456 100644
--- a/old_name.rs
+++ b/new_name.rs
@@ -1,3 +1,3 @@
 fn example() {
-    // old
+    // new
 }
"#;
        let files = parse_unified_diff(diff).unwrap();
        let file = &files[0];
        assert_eq!(file.path, "new_name.rs");
        assert_eq!(file.old_path, Some("old_name.rs".to_string()));
        assert_eq!(file.status, FileStatus::Renamed);
        assert!(file.matches("new_name.rs"));
        assert!(!file.matches("old_name.rs"));
    }

    #[test]
    fn line_numbers_follow_sides() {
        let files = parse_unified_diff(SAMPLE_DIFF).unwrap();
        let hunk = &files[0].hunks[0];

        assert_eq!(hunk.lines[0].kind, LineKind::Context);
        assert_eq!(hunk.lines[0].old_line, Some(1));
        assert_eq!(hunk.lines[0].new_line, Some(1));

        let addition = hunk
            .lines
            .iter()
            .find(|l| l.kind == LineKind::Addition)
            .unwrap();
        assert!(addition.old_line.is_none());
        assert_eq!(addition.new_line, Some(3));
    }

    #[test]
    fn clean_path_strips_git_prefixes() {
        assert_eq!(clean_path("a/src/main.rs"), "src/main.rs");
        assert_eq!(clean_path("b/src/main.rs"), "src/main.rs");
        assert_eq!(clean_path("src/main.rs"), "src/main.rs");
        assert_eq!(clean_path("/dev/null"), "/dev/null");
    }
}
