//! Path resolution over an [`EntryTree`].
//!
//! Every lookup comes in a strict form returning [`VfsResult`] and a silent
//! `try_` form returning `Option`. Strict lookups fail with `NotFound` on a
//! missing segment and with `IsADirectory`/`NotADirectory` on a kind
//! mismatch; silent lookups turn both into `None`.

use mfvfs_types::{EntryId, ResourceUri};

use super::error::{VfsError, VfsResult};
use super::tree::EntryTree;
use super::types::{Entry, EntryKind, LookupOptions};

impl EntryTree {
    fn walk(&self, uri: &ResourceUri) -> Option<EntryId> {
        let mut cur = self.root();
        for segment in uri.segments() {
            cur = self.child(cur, segment)?;
        }
        Some(cur)
    }

    /// Resolve a URI to an entry of either kind.
    pub fn lookup(&self, uri: &ResourceUri) -> VfsResult<EntryId> {
        self.walk(uri)
            .ok_or_else(|| VfsError::not_found(uri.path()))
    }

    pub fn try_lookup(&self, uri: &ResourceUri) -> Option<EntryId> {
        self.walk(uri)
    }

    /// Resolve a URI that must be a directory.
    pub fn lookup_as_directory(&self, uri: &ResourceUri) -> VfsResult<EntryId> {
        let id = self.lookup(uri)?;
        match self.get(id) {
            Some(entry) if entry.is_dir() => Ok(id),
            _ => Err(VfsError::not_a_directory(uri.path())),
        }
    }

    pub fn try_lookup_as_directory(&self, uri: &ResourceUri) -> Option<EntryId> {
        self.walk(uri)
            .filter(|id| self.get(*id).is_some_and(Entry::is_dir))
    }

    /// Resolve a URI that must be a file.
    pub fn lookup_as_file(&self, uri: &ResourceUri) -> VfsResult<EntryId> {
        let id = self.lookup(uri)?;
        match self.get(id) {
            Some(entry) if entry.is_file() => Ok(id),
            _ => Err(VfsError::is_a_directory(uri.path())),
        }
    }

    pub fn try_lookup_as_file(&self, uri: &ResourceUri) -> Option<EntryId> {
        self.walk(uri)
            .filter(|id| self.get(*id).is_some_and(Entry::is_file))
    }

    /// File lookup with options.
    ///
    /// With `build_full_path`, missing ancestors are created as directories
    /// and the file itself as an empty, never-fetched file; remote metadata
    /// is derived from the nearest ancestor that has some. With `silent`, a
    /// missing file (or a directory in its place) yields `Ok(None)`.
    pub fn lookup_as_file_with(
        &mut self,
        uri: &ResourceUri,
        opts: LookupOptions,
    ) -> VfsResult<Option<EntryId>> {
        if opts.build_full_path {
            self.build_tree_for_path(uri);
        }
        if opts.silent {
            return Ok(self.try_lookup_as_file(uri));
        }
        self.lookup_as_file(uri).map(Some)
    }

    /// Parent directory of a URI.
    pub fn lookup_parent_directory(&self, uri: &ResourceUri) -> VfsResult<EntryId> {
        self.lookup_as_directory(&uri.parent())
    }

    pub fn try_lookup_parent_directory(&self, uri: &ResourceUri) -> Option<EntryId> {
        self.try_lookup_as_directory(&uri.parent())
    }

    /// Create whatever is missing along `uri`, the last segment as a file.
    ///
    /// Stops early if an intermediate segment exists as a file.
    pub fn build_tree_for_path(&mut self, uri: &ResourceUri) {
        let segments: Vec<String> = uri.segments().map(str::to_string).collect();
        let mut cur = self.root();
        for (i, segment) in segments.iter().enumerate() {
            let is_last = i + 1 == segments.len();
            if let Some(next) = self.child(cur, segment) {
                let Some(entry) = self.get(next) else { return };
                if !is_last && !entry.is_dir() {
                    return;
                }
                cur = next;
                continue;
            }

            let kind = if is_last {
                EntryKind::File
            } else {
                EntryKind::Directory
            };
            let metadata = self
                .get(cur)
                .and_then(|parent| parent.metadata.as_ref())
                .map(|m| m.child(segment, kind));
            let entry = match kind {
                EntryKind::File => Entry::file(segment.as_str()),
                EntryKind::Directory => Entry::directory(segment.as_str()),
            }
            .with_metadata(metadata);

            match self.insert(cur, entry) {
                Ok(id) => {
                    tracing::trace!(segment = %segment, %kind, "built missing path segment");
                    cur = id;
                }
                Err(_) => return,
            }
        }
    }
}
