//! The review draft file format.
//!
//! While reading a diff the user drops comment drafts into a single file,
//! each introduced by a marker header naming the commit and the exact diff
//! line the comment attaches to. Submitting turns every draft into one
//! anchored discussion.

use crate::normalize::normalize_body;
use crate::{CodecError, MARKER};
use regex::Regex;

/// Which kind of diff line a draft is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftKind {
    Context,
    Addition,
    Deletion,
}

impl DraftKind {
    pub fn marker(&self) -> char {
        match self {
            DraftKind::Context => ' ',
            DraftKind::Addition => '+',
            DraftKind::Deletion => '-',
        }
    }

    fn from_marker(c: &str) -> Option<Self> {
        match c {
            " " => Some(DraftKind::Context),
            "+" => Some(DraftKind::Addition),
            "-" => Some(DraftKind::Deletion),
            _ => None,
        }
    }
}

/// One pending review comment, addressed by commit and diff line.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewDraft {
    pub commit: String,
    pub path: String,
    /// New-side line number of the target diff line.
    pub new_line: u32,
    pub kind: DraftKind,
    /// Old-side line number of the target diff line.
    pub old_line: u32,
    pub body: String,
}

/// Render the header line the user comments under.
///
/// The draft file is seeded with one header per commented-on location, or
/// the user writes headers by hand next to the diff they are reading.
pub fn render_draft_header(
    commit: &str,
    path: &str,
    new_line: u32,
    kind: DraftKind,
    old_line: u32,
) -> String {
    format!(
        "{MARKER} {commit} {path}:{new_line} {}{old_line}\n",
        match kind {
            DraftKind::Context => "  ",
            DraftKind::Addition => "+ ",
            DraftKind::Deletion => "- ",
        }
    )
}

/// Parse a draft file into its pending comments.
///
/// Diff lines under a header (prefixed ' ', '+' or '-') are quoted context
/// and are skipped, as are blank lines before the body starts. Drafts whose
/// body normalizes to empty are dropped. A marker line that is not a valid
/// header is fatal, since it means a comment would be silently lost.
pub fn parse_review_drafts(text: &str) -> Result<Vec<ReviewDraft>, CodecError> {
    let header = Regex::new(&format!(
        r"^{MARKER} (\S+) ([^:]+):(\d+) ([ +\-]) (\d+)$"
    ))
    .unwrap();

    let mut drafts: Vec<ReviewDraft> = Vec::new();
    let mut body: Vec<&str> = Vec::new();

    let finish = |drafts: &mut Vec<ReviewDraft>, body: &mut Vec<&str>| {
        if let Some(draft) = drafts.last_mut() {
            draft.body = normalize_body(&body.join("\n"));
        }
        body.clear();
    };

    for (i, row) in text.lines().enumerate() {
        if let Some(caps) = header.captures(row) {
            finish(&mut drafts, &mut body);
            drafts.push(ReviewDraft {
                commit: caps[1].to_string(),
                path: caps[2].to_string(),
                new_line: caps[3].parse().map_err(|_| CodecError::MalformedDraft {
                    line: i + 1,
                })?,
                kind: DraftKind::from_marker(&caps[4])
                    .ok_or(CodecError::MalformedDraft { line: i + 1 })?,
                old_line: caps[5].parse().map_err(|_| CodecError::MalformedDraft {
                    line: i + 1,
                })?,
                body: String::new(),
            });
            continue;
        }
        if row.chars().next() == Some(MARKER) {
            return Err(CodecError::MalformedDraft { line: i + 1 });
        }
        if drafts.is_empty() {
            // Free text before the first header is preamble the user left
            // for themselves; never a comment.
            continue;
        }
        if body.is_empty() {
            if row.is_empty() || matches!(row.chars().next(), Some(' ' | '+' | '-')) {
                continue;
            }
        }
        body.push(row);
    }
    finish(&mut drafts, &mut body);

    drafts.retain(|d| !d.body.is_empty());
    Ok(drafts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn header_round_trips() {
        let header = render_draft_header("abc123", "src/lib.rs", 42, DraftKind::Addition, 40);
        let mut text = header;
        text.push_str("+    let x = compute();\n\nShould this be lazy?\n");
        let drafts = parse_review_drafts(&text).unwrap();
        assert_eq!(
            drafts,
            vec![ReviewDraft {
                commit: "abc123".into(),
                path: "src/lib.rs".into(),
                new_line: 42,
                kind: DraftKind::Addition,
                old_line: 40,
                body: "Should this be lazy?".into(),
            }]
        );
    }

    #[test]
    fn multiple_drafts_with_quoted_diff_lines() {
        let text = format!(
            "{MARKER} c1 a.rs:10   9\n fn old() {{\nRename this.\n\n\
             {MARKER} c2 b.rs:3 - 3\n-    removed\nWhy was this dropped?\nSecond line.\n"
        );
        let drafts = parse_review_drafts(&text).unwrap();
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].kind, DraftKind::Context);
        assert_eq!(drafts[0].body, "Rename this.");
        assert_eq!(drafts[1].kind, DraftKind::Deletion);
        assert_eq!(drafts[1].new_line, 3);
        assert_eq!(drafts[1].body, "Why was this dropped?\nSecond line.");
    }

    #[test]
    fn empty_bodies_are_dropped() {
        let text = format!("{MARKER} c1 a.rs:10 + 9\n+    added\n\n");
        let drafts = parse_review_drafts(&text).unwrap();
        assert_eq!(drafts, vec![]);
    }

    #[test]
    fn preamble_before_first_header_is_ignored() {
        let text = format!("notes to self\n\n{MARKER} c1 a.rs:1   1\nLooks wrong.\n");
        let drafts = parse_review_drafts(&text).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].body, "Looks wrong.");
    }

    #[test]
    fn malformed_marker_line_is_fatal() {
        let text = format!("{MARKER} not a header\n");
        let err = parse_review_drafts(&text).unwrap_err();
        assert!(matches!(err, CodecError::MalformedDraft { line: 1 }));
    }
}
