//! Set Differ / Action Classifier.
//!
//! Entries are compared by the full `(path, content)` pair, so a changed file
//! first shows up as both "to create" (new content) and "to delete" (old
//! content). Those collisions are folded into a single update through a
//! path-keyed index.

use std::collections::BTreeMap;

use super::types::{Action, FileEntry, FileSet};

/// Classified changes between a desired and an observed file set.
///
/// The three classes are disjoint by path and each is sorted by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionPlan {
    pub creates: Vec<FileEntry>,
    pub deletes: Vec<String>,
    pub updates: Vec<FileEntry>,
}

impl ActionPlan {
    /// True when desired and observed state already agree.
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.deletes.is_empty() && self.updates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.creates.len() + self.deletes.len() + self.updates.len()
    }

    /// Flatten into commit order: creates, then deletes, then updates.
    pub fn into_actions(self) -> Vec<Action> {
        let creates = self
            .creates
            .into_iter()
            .map(|e| Action::create(e.path, e.content));
        let deletes = self.deletes.into_iter().map(Action::delete);
        let updates = self
            .updates
            .into_iter()
            .map(|e| Action::update(e.path, e.content));
        creates.chain(deletes).chain(updates).collect()
    }
}

/// Classify the changes needed to turn `observed` into `desired`.
pub fn classify(desired: &FileSet, observed: &FileSet) -> ActionPlan {
    let mut to_create: BTreeMap<&str, &[u8]> = desired
        .iter()
        .filter(|(path, content)| !observed.contains(path, content))
        .collect();
    let mut to_delete: BTreeMap<&str, &[u8]> = observed
        .iter()
        .filter(|(path, content)| !desired.contains(path, content))
        .collect();

    let colliding: Vec<&str> = to_create
        .keys()
        .copied()
        .filter(|path| to_delete.contains_key(path))
        .collect();

    let mut updates = Vec::with_capacity(colliding.len());
    for path in colliding {
        to_delete.remove(path);
        if let Some(content) = to_create.remove(path) {
            updates.push(FileEntry::new(path, content));
        }
    }

    ActionPlan {
        creates: to_create
            .into_iter()
            .map(|(path, content)| FileEntry::new(path, content))
            .collect(),
        deletes: to_delete.into_keys().map(str::to_string).collect(),
        updates,
    }
}
