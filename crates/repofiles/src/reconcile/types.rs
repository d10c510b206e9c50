//! Core types shared by the reconciliation phases.

use std::collections::BTreeMap;

/// A single file: its repository path and raw content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileEntry {
    pub path: String,
    pub content: Vec<u8>,
}

impl FileEntry {
    pub fn new(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// A set of files keyed by path.
///
/// Paths are unique and iterate in lexicographic order. Equality of two
/// entries is equality of both path and content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSet {
    entries: BTreeMap<String, Vec<u8>>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, returning the content previously stored at its path.
    pub fn insert(&mut self, entry: FileEntry) -> Option<Vec<u8>> {
        self.entries.insert(entry.path, entry.content)
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.entries.get(path).map(Vec::as_slice)
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Whether an entry with exactly this path and content is present.
    pub fn contains(&self, path: &str, content: &[u8]) -> bool {
        self.get(path) == Some(content)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries
            .iter()
            .map(|(path, content)| (path.as_str(), content.as_slice()))
    }
}

impl FromIterator<FileEntry> for FileSet {
    fn from_iter<I: IntoIterator<Item = FileEntry>>(iter: I) -> Self {
        let mut set = Self::new();
        for entry in iter {
            set.insert(entry);
        }
        set
    }
}

impl IntoIterator for FileSet {
    type Item = FileEntry;
    type IntoIter = std::iter::Map<
        std::collections::btree_map::IntoIter<String, Vec<u8>>,
        fn((String, Vec<u8>)) -> FileEntry,
    >;

    fn into_iter(self) -> Self::IntoIter {
        self.entries
            .into_iter()
            .map(into_entry as fn((String, Vec<u8>)) -> FileEntry)
    }
}

fn into_entry((path, content): (String, Vec<u8>)) -> FileEntry {
    FileEntry { path, content }
}

/// Kind of change applied to one path within a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Create,
    Delete,
    Update,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Delete => "delete",
            Self::Update => "update",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One path-level change. Deletes carry no content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub kind: ActionKind,
    pub path: String,
    pub content: Option<Vec<u8>>,
}

impl Action {
    pub fn create(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: ActionKind::Create,
            path: path.into(),
            content: Some(content.into()),
        }
    }

    pub fn update(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: ActionKind::Update,
            path: path.into(),
            content: Some(content.into()),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            kind: ActionKind::Delete,
            path: path.into(),
            content: None,
        }
    }
}

/// Where a reconciliation commits and under which metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitTarget {
    pub project: String,
    pub branch: String,
    /// Branch to fork `branch` from when it does not exist yet.
    pub start_branch: Option<String>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub commit_message: String,
}

/// The desired file set together with its commit target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredState {
    pub target: CommitTarget,
    pub files: FileSet,
}

/// A fully assembled atomic commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationRequest {
    pub project: String,
    pub branch: String,
    pub start_branch: Option<String>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub commit_message: String,
    pub actions: Vec<Action>,
}
