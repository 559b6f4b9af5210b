//! Rename, move and delete.
//!
//! Remote-first: the remote operation runs before the cache is touched, and
//! a remote failure leaves the tree exactly as it was. Delete is the one
//! exception that detaches first, so the entry disappears from listings
//! while the request is in flight, and re-attaches it on failure.

use mfvfs_types::ResourceUri;
use tracing::{debug, trace, warn};

use super::error::{VfsError, VfsResult};
use super::provider::FsProvider;
use super::tree::EntryTree;
use super::types::{DeleteMetadata, Entry, EntryKind, EntryNode, FileChangeEvent, FileData};
use crate::remote::RemoteError;
use crate::surface::{MessageOptions, Severity};

/// Shown when the profile's API cannot move entries.
pub const MOVE_UNSUPPORTED_MESSAGE: &str =
    "The 'move' function is not implemented for this USS API.";

impl FsProvider {
    /// Rename (or re-parent) an entry, remote first.
    #[tracing::instrument(skip(self), fields(old = %old_uri, new = %new_uri))]
    pub async fn rename(
        &self,
        old_uri: &ResourceUri,
        new_uri: &ResourceUri,
        overwrite: bool,
    ) -> VfsResult<()> {
        let new_name = new_uri.basename().to_string();
        let (metadata, kind, new_parent_meta) = {
            let tree = self.tree.read();
            if !overwrite && tree.try_lookup(new_uri).is_some() {
                return Err(VfsError::already_exists(new_uri.path()));
            }
            let id = tree.lookup(old_uri)?;
            tree.lookup_parent_directory(old_uri)?;
            let new_parent = tree.lookup_parent_directory(new_uri)?;
            let entry = tree.entry(id)?;
            (
                entry.metadata.clone(),
                entry.kind(),
                tree.entry(new_parent)?.metadata.clone(),
            )
        };
        let metadata = self.resolve_metadata(metadata, old_uri)?;

        let new_metadata = match new_parent_meta {
            Some(parent) => parent.child(&new_name, kind),
            None => {
                let old_path = metadata.remote_path();
                let dir = &old_path[..old_path.rfind('/').map_or(0, |i| i + 1)];
                let mut path = format!("{dir}{new_name}");
                if kind.is_dir() {
                    path.push('/');
                }
                metadata.with_path(path)
            }
        };

        let api = self.api_for(&metadata)?;
        api.rename(metadata.remote_path(), new_metadata.remote_path())
            .await?;

        {
            let mut tree = self.tree.write();
            let (Some(old_parent), Some(new_parent)) = (
                tree.try_lookup_parent_directory(old_uri),
                tree.try_lookup_parent_directory(new_uri),
            ) else {
                debug!("parents vanished during rename");
                return Ok(());
            };
            let Some(id) = tree.detach(old_parent, old_uri.basename()) else {
                debug!("entry vanished during rename");
                return Ok(());
            };
            let entry = tree.entry_mut(id)?;
            entry.name = new_name;
            entry.metadata = Some(new_metadata);
            entry.touch();
            tree.attach(new_parent, id)?;
            if kind.is_dir() {
                tree.update_child_paths(id);
            }
        }

        self.fire_soon([
            FileChangeEvent::deleted(old_uri.clone()),
            FileChangeEvent::created(new_uri.clone()),
        ]);
        Ok(())
    }

    /// Move an entry on the remote, then relocate it in the cache.
    ///
    /// Returns `Ok(false)` (after telling the user) when the profile's API
    /// has no move operation.
    #[tracing::instrument(skip(self), fields(old = %old_uri, new = %new_uri))]
    pub async fn move_entry(
        &self,
        old_uri: &ResourceUri,
        new_uri: &ResourceUri,
    ) -> VfsResult<bool> {
        let new_info = self.metadata_for_uri(new_uri)?;
        let old_info = self.metadata_for_uri(old_uri)?;
        let api = self.api_for(&new_info)?;

        match api.move_entry(&old_info.path, &new_info.path).await {
            Ok(()) => {}
            Err(RemoteError::Unsupported(op)) => {
                warn!(op, "file API cannot move entries");
                self.prompts
                    .show_message(
                        MOVE_UNSUPPORTED_MESSAGE,
                        MessageOptions::default().severity(Severity::Error),
                    )
                    .await;
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        }

        self.relocate_entry(old_uri, new_uri, &new_info.path).await;
        Ok(true)
    }

    /// Move a cached entry to a new location after the remote already moved.
    ///
    /// Files keep their content, etag and access state. Directories are
    /// recreated empty and re-listed on next access. A missing source or
    /// parent makes this a no-op. An editor tab showing the old URI is
    /// reopened on the new one in the same column.
    #[tracing::instrument(skip(self), fields(old = %old_uri, new = %new_uri))]
    pub async fn relocate_entry(
        &self,
        old_uri: &ResourceUri,
        new_uri: &ResourceUri,
        new_remote_path: &str,
    ) {
        if old_uri.segments().eq(new_uri.segments()) || new_uri.is_root() {
            return;
        }
        {
            let mut tree = self.tree.write();
            let resolved = (
                tree.try_lookup(old_uri),
                tree.try_lookup_parent_directory(new_uri),
            );
            let (Some(id), Some(new_parent)) = resolved else {
                trace!("nothing cached to relocate");
                return;
            };
            if id.is_root() || tree.is_within(new_parent, id) {
                debug!("destination is inside the source, not relocating");
                return;
            }
            let Some(replacement) = relocated(&tree, id, new_uri.basename(), new_remote_path)
            else {
                return;
            };
            let Some(old_parent) = tree.detach_entry(id) else {
                trace!("source is not attached");
                return;
            };
            if let Err(e) = tree.insert(new_parent, replacement) {
                warn!(error = %e, "could not insert relocated entry");
                if let Err(e) = tree.attach(old_parent, id) {
                    warn!(error = %e, "could not restore source entry");
                }
                return;
            }
            tree.remove_subtree(id);
        }

        self.fire_soon([
            FileChangeEvent::deleted(old_uri.clone()),
            FileChangeEvent::created(new_uri.clone()),
        ]);

        let tab = self
            .editor
            .open_tabs()
            .into_iter()
            .find(|tab| tab.uri.path() == old_uri.path());
        if let Some(tab) = tab {
            if let Err(e) = self.editor.close_tab(&tab).await {
                warn!(error = %e, "could not close tab for relocated entry");
            }
            if let Err(e) = self.editor.open_with(new_uri, tab.view_column).await {
                warn!(error = %e, "could not reopen relocated entry");
            }
        }
    }

    /// Detach an entry pending deletion.
    ///
    /// The entry stays in the arena so a failed remote delete can put it
    /// back. A non-empty cached directory needs `recursive`.
    pub fn delete_entry(&self, uri: &ResourceUri, recursive: bool) -> VfsResult<DeleteMetadata> {
        let mut tree = self.tree.write();
        let parent = tree.lookup_parent_directory(uri)?;
        let id = tree
            .child(parent, uri.basename())
            .ok_or_else(|| VfsError::not_found(uri.path()))?;
        let entry = tree.entry(id)?;
        if !recursive && entry.as_dir().is_some_and(|d| !d.is_empty()) {
            return Err(VfsError::directory_not_empty(uri.path()));
        }
        tree.detach(parent, uri.basename());
        Ok(DeleteMetadata {
            entry_to_delete: id,
            parent,
            parent_uri: uri.parent(),
        })
    }

    /// Delete an entry remotely and from the cache.
    ///
    /// Conflict-view entries exist only locally and skip the remote call.
    #[tracing::instrument(skip(self), fields(uri = %uri))]
    pub async fn delete(&self, uri: &ResourceUri, recursive: bool) -> VfsResult<()> {
        let pending = self.delete_entry(uri, recursive)?;
        let (metadata, kind, is_conflict_file) = {
            let tree = self.tree.read();
            let entry = tree.entry(pending.entry_to_delete)?;
            (
                entry.metadata.clone(),
                entry.kind(),
                entry.as_file().is_some_and(|f| f.is_conflict_file),
            )
        };

        if !is_conflict_file {
            let remote: VfsResult<()> = async {
                let metadata = self.resolve_metadata(metadata, uri)?;
                let api = self.api_for(&metadata)?;
                api.delete(metadata.remote_path(), kind.is_dir()).await?;
                Ok(())
            }
            .await;
            if let Err(e) = remote {
                let mut tree = self.tree.write();
                if let Err(reattach) = tree.attach(pending.parent, pending.entry_to_delete) {
                    warn!(error = %reattach, "could not restore entry after failed delete");
                }
                return Err(e);
            }
        }

        self.tree.write().remove_subtree(pending.entry_to_delete);
        self.fire_soon([
            FileChangeEvent::changed(pending.parent_uri),
            FileChangeEvent::deleted(uri.clone()),
        ]);
        Ok(())
    }
}

/// Build the entry that replaces `id` at its new location.
fn relocated(
    tree: &EntryTree,
    id: mfvfs_types::EntryId,
    new_name: &str,
    new_remote_path: &str,
) -> Option<Entry> {
    let entry = tree.get(id)?;
    let metadata = entry.metadata.clone().map(|mut m| {
        m.path = new_remote_path.to_string();
        m
    });
    let replacement = match &entry.node {
        EntryNode::File(file) => {
            let mut moved = Entry::file(new_name);
            moved.was_accessed = entry.was_accessed;
            moved.node = EntryNode::File(FileData {
                data: file.data.clone(),
                etag: file.etag.clone(),
                binary: file.binary,
                attributes: file.attributes.clone(),
                ..FileData::default()
            });
            moved
        }
        EntryNode::Directory(_) => Entry::directory(new_name),
    };
    let kind = replacement.kind();
    let mut replacement = replacement.with_metadata(metadata);
    if kind == EntryKind::Directory {
        if let Some(m) = replacement.metadata.as_mut() {
            if !m.path.ends_with('/') {
                m.path.push('/');
            }
        }
    }
    Some(replacement)
}
