//! Arena-backed entry tree.
//!
//! Entries live in a flat map keyed by [`EntryId`]; directories hold
//! name-to-id maps and a separate index records each entry's parent. There
//! are no back-pointers inside entries, so detaching or moving a subtree is
//! a pair of map updates.

use std::collections::HashMap;

use mfvfs_types::EntryId;

use super::error::{VfsError, VfsResult};
use super::types::{Entry, EntryKind};

/// The cached hierarchy for one URI scheme.
#[derive(Debug)]
pub struct EntryTree {
    entries: HashMap<EntryId, Entry>,
    parents: HashMap<EntryId, EntryId>,
    next_id: EntryId,
}

impl Default for EntryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl EntryTree {
    /// Tree holding only the root directory.
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        entries.insert(EntryId::ROOT, Entry::directory(""));
        Self {
            entries,
            parents: HashMap::new(),
            next_id: EntryId::ROOT.next(),
        }
    }

    pub fn root(&self) -> EntryId {
        EntryId::ROOT
    }

    pub fn get(&self, id: EntryId) -> Option<&Entry> {
        self.entries.get(&id)
    }

    pub fn get_mut(&mut self, id: EntryId) -> Option<&mut Entry> {
        self.entries.get_mut(&id)
    }

    /// Like [`get`](Self::get), failing with `NotFound` for a stale slot.
    pub fn entry(&self, id: EntryId) -> VfsResult<&Entry> {
        self.get(id)
            .ok_or_else(|| VfsError::not_found(id.to_string()))
    }

    pub fn entry_mut(&mut self, id: EntryId) -> VfsResult<&mut Entry> {
        self.get_mut(id)
            .ok_or_else(|| VfsError::not_found(id.to_string()))
    }

    /// Parent of an attached entry. The root and detached entries have none.
    pub fn parent_of(&self, id: EntryId) -> Option<EntryId> {
        self.parents.get(&id).copied()
    }

    /// Child of `dir` by name.
    pub fn child(&self, dir: EntryId, name: &str) -> Option<EntryId> {
        self.get(dir)?.as_dir()?.child(name)
    }

    /// Children of `dir`, sorted by name.
    pub fn children(&self, dir: EntryId) -> Vec<(String, EntryId)> {
        let Some(data) = self.get(dir).and_then(Entry::as_dir) else {
            return Vec::new();
        };
        let mut out: Vec<(String, EntryId)> = data
            .entries
            .iter()
            .map(|(name, id)| (name.clone(), *id))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Number of slots in the arena, detached ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    /// Insert `entry` under `parent`, replacing any child of the same name.
    pub fn insert(&mut self, parent: EntryId, entry: Entry) -> VfsResult<EntryId> {
        self.ensure_directory(parent)?;
        let id = self.next_id;
        self.next_id = id.next();
        self.entries.insert(id, entry);
        self.attach(parent, id)?;
        Ok(id)
    }

    /// Attach a detached entry under `parent` using its current name.
    ///
    /// A child already holding that name is removed along with its subtree.
    pub fn attach(&mut self, parent: EntryId, id: EntryId) -> VfsResult<()> {
        self.ensure_directory(parent)?;
        let name = self
            .get(id)
            .map(|e| e.name.clone())
            .ok_or_else(|| VfsError::not_found(id.to_string()))?;

        if let Some(existing) = self.child(parent, &name) {
            if existing != id {
                self.detach(parent, &name);
                self.remove_subtree(existing);
            } else {
                return Ok(());
            }
        }

        if let Some(dir_entry) = self.entries.get_mut(&parent) {
            if let Some(dir) = dir_entry.as_dir_mut() {
                dir.entries.insert(name, id);
                dir.size += 1;
            }
            dir_entry.touch();
        }
        self.parents.insert(id, parent);
        Ok(())
    }

    /// Unlink a child from `parent`. The subtree stays in the arena.
    pub fn detach(&mut self, parent: EntryId, name: &str) -> Option<EntryId> {
        let dir_entry = self.entries.get_mut(&parent)?;
        let id = dir_entry.as_dir_mut()?.entries.remove(name)?;
        if let Some(dir) = dir_entry.as_dir_mut() {
            dir.size = dir.size.saturating_sub(1);
        }
        dir_entry.touch();
        self.parents.remove(&id);
        Some(id)
    }

    /// Unlink an attached entry from wherever it sits. Returns its old parent.
    pub fn detach_entry(&mut self, id: EntryId) -> Option<EntryId> {
        let parent = self.parent_of(id)?;
        let name = self.get(id)?.name.clone();
        self.detach(parent, &name)?;
        Some(parent)
    }

    /// Whether `id` is `ancestor` or sits somewhere below it.
    pub fn is_within(&self, id: EntryId, ancestor: EntryId) -> bool {
        let mut cur = Some(id);
        while let Some(next) = cur {
            if next == ancestor {
                return true;
            }
            cur = self.parent_of(next);
        }
        false
    }

    /// Free an entry and everything below it. Returns the freed entry.
    pub fn remove_subtree(&mut self, id: EntryId) -> Option<Entry> {
        if id.is_root() {
            return None;
        }
        let mut stack: Vec<EntryId> = self
            .get(id)
            .and_then(Entry::as_dir)
            .map(|d| d.entries.values().copied().collect())
            .unwrap_or_default();
        while let Some(next) = stack.pop() {
            if let Some(entry) = self.entries.remove(&next) {
                if let Some(dir) = entry.as_dir() {
                    stack.extend(dir.entries.values().copied());
                }
            }
            self.parents.remove(&next);
        }
        self.parents.remove(&id);
        self.entries.remove(&id)
    }

    /// Tree path of an attached entry, e.g. `/sestest/u/a.txt`.
    pub fn path_of(&self, id: EntryId) -> Option<String> {
        let mut names = Vec::new();
        let mut cur = id;
        while !cur.is_root() {
            names.push(self.get(cur)?.name.as_str());
            cur = self.parent_of(cur)?;
        }
        names.reverse();
        Some(format!("/{}", names.join("/")))
    }

    /// Rewrite the remote paths of everything below `dir` from its own path.
    ///
    /// Runs top-down, so each child is rewritten after its parent.
    pub fn update_child_paths(&mut self, dir: EntryId) {
        let mut stack = vec![dir];
        while let Some(current) = stack.pop() {
            let Some(base) = self
                .get(current)
                .and_then(|e| e.metadata.as_ref())
                .cloned()
            else {
                continue;
            };
            for (name, child) in self.children(current) {
                let Some(entry) = self.entries.get_mut(&child) else {
                    continue;
                };
                let kind = entry.kind();
                if let Some(meta) = entry.metadata.as_mut() {
                    meta.path = base.child(&name, kind).path;
                }
                if kind == EntryKind::Directory {
                    stack.push(child);
                }
            }
        }
    }

    fn ensure_directory(&self, id: EntryId) -> VfsResult<()> {
        match self.get(id) {
            Some(e) if e.is_dir() => Ok(()),
            Some(e) => Err(VfsError::not_a_directory(e.name.clone())),
            None => Err(VfsError::not_found(id.to_string())),
        }
    }
}
