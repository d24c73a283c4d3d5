//! Structured representation of a unified diff.

/// A single file's diff.
#[derive(Debug, Clone)]
pub struct FileDiff {
    /// Current file path (after rename if applicable).
    pub path: String,
    /// Previous file path (if renamed).
    pub old_path: Option<String>,
    pub status: FileStatus,
    pub hunks: Vec<Hunk>,
    pub additions: usize,
    pub deletions: usize,
}

impl FileDiff {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            old_path: None,
            status: FileStatus::Modified,
            hunks: Vec::new(),
            additions: 0,
            deletions: 0,
        }
    }

    /// Whether this entry describes `path`, matching the post-rename name.
    pub fn matches(&self, path: &str) -> bool {
        self.path == path
    }

    /// All lines across hunks, in diff order.
    pub fn lines(&self) -> impl Iterator<Item = &DiffLine> {
        self.hunks.iter().flat_map(|h| h.lines.iter())
    }

    /// Recalculate line statistics from hunks.
    pub fn recalculate_stats(&mut self) {
        self.additions = self.lines().filter(|l| l.kind == LineKind::Addition).count();
        self.deletions = self.lines().filter(|l| l.kind == LineKind::Deletion).count();
    }
}

/// File status in the diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
    Copied,
}

/// A contiguous region of changes.
///
/// Diffs are computed with maximal context, so in practice each file
/// carries a single hunk spanning the whole file.
#[derive(Debug, Clone)]
pub struct Hunk {
    pub old_start: u32,
    pub old_count: u32,
    pub new_start: u32,
    pub new_count: u32,
    pub lines: Vec<DiffLine>,
}

impl Hunk {
    pub fn new(old_start: u32, old_count: u32, new_start: u32, new_count: u32) -> Self {
        Self {
            old_start,
            old_count,
            new_start,
            new_count,
            lines: Vec::new(),
        }
    }
}

/// A single line in the diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub kind: LineKind,
    /// Line content without the leading +/-/space.
    pub content: String,
    /// Line number in the old file (Context and Deletion).
    pub old_line: Option<u32>,
    /// Line number in the new file (Context and Addition).
    pub new_line: Option<u32>,
}

impl DiffLine {
    pub fn context(content: impl Into<String>, old_line: u32, new_line: u32) -> Self {
        Self {
            kind: LineKind::Context,
            content: content.into(),
            old_line: Some(old_line),
            new_line: Some(new_line),
        }
    }

    pub fn addition(content: impl Into<String>, new_line: u32) -> Self {
        Self {
            kind: LineKind::Addition,
            content: content.into(),
            old_line: None,
            new_line: Some(new_line),
        }
    }

    pub fn deletion(content: impl Into<String>, old_line: u32) -> Self {
        Self {
            kind: LineKind::Deletion,
            content: content.into(),
            old_line: Some(old_line),
            new_line: None,
        }
    }

    /// Render the line as it appears in a unified diff.
    pub fn rendered(&self) -> String {
        format!("{}{}", self.kind.prefix(), self.content)
    }
}

/// Line type in the diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Unchanged line.
    Context,
    /// Added line (+).
    Addition,
    /// Removed line (-).
    Deletion,
}

impl LineKind {
    pub fn prefix(&self) -> char {
        match self {
            LineKind::Context => ' ',
            LineKind::Addition => '+',
            LineKind::Deletion => '-',
        }
    }

    /// Parse the first character of a diff line.
    pub fn from_prefix(c: char) -> Option<Self> {
        match c {
            ' ' => Some(LineKind::Context),
            '+' => Some(LineKind::Addition),
            '-' => Some(LineKind::Deletion),
            _ => None,
        }
    }
}
