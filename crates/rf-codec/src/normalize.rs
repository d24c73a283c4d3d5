//! Body normalization and note tagging.

use rf_model::Note;

/// Normalize a note body for comparison and submission: line endings
/// become LF and surrounding blank lines are trimmed.
///
/// Rendering inserts blank separator rows between threads and the parser
/// cannot tell them apart from trailing blank body lines, so both sides of
/// every comparison go through this function. Without it a fetch/submit
/// cycle would emit spurious no-op edits.
pub fn normalize_body(body: &str) -> String {
    body.replace("\r\n", "\n").trim().to_string()
}

/// The tag rendered in front of a note's first line.
///
/// Notes written by the user themselves are tagged with their note ID
/// instead of the username. Several consecutive self-authored notes would
/// otherwise be indistinguishable when the text is parsed back, and edits
/// could re-match against the wrong note.
pub fn note_tag(note: &Note, self_user: &str) -> String {
    if note.author == self_user {
        note.id.to_string()
    } else {
        note.author.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rf_model::NoteId;

    fn note(id: u64, author: &str) -> Note {
        Note {
            id: NoteId(id),
            author: author.to_string(),
            body: String::new(),
            commit: None,
            created_at: None,
        }
    }

    #[test]
    fn normalize_trims_surrounding_blank_lines() {
        assert_eq!(normalize_body("\n\nhello\nworld\n\n\n"), "hello\nworld");
        assert_eq!(normalize_body("single"), "single");
        assert_eq!(normalize_body("\n \n"), "");
    }

    #[test]
    fn normalize_converts_crlf() {
        assert_eq!(normalize_body("a\r\nb\r\n"), "a\nb");
    }

    #[test]
    fn normalize_keeps_interior_blank_lines() {
        assert_eq!(normalize_body("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn own_notes_are_tagged_by_id() {
        assert_eq!(note_tag(&note(17, "me"), "me"), "17");
        assert_eq!(note_tag(&note(17, "reviewer"), "me"), "reviewer");
    }
}
