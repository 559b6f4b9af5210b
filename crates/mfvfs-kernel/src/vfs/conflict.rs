//! Conflict resolution between cached edits and a newer remote version.
//!
//! A conflict starts when an upload is rejected by etag. The remote content
//! is captured into `conflict_data`, the user's content into `local_data`,
//! and the user picks one of:
//!
//! - **Compare**: open a diff of `uri?conflict=true` (remote) against
//!   `uri?inDiff=true` (local); later resolved by [`FsProvider::diff_overwrite`]
//!   or [`FsProvider::diff_use_remote`].
//! - **Overwrite**: force-upload the local content right away.
//! - dismiss: drop the conflict; the edit stays in the cache, unsaved remotely.
//!
//! The remote etag is kept in `conflict_etag`. Dismissal and both
//! resolutions clear the conflict fields.

use std::sync::Arc;

use mfvfs_types::ResourceUri;
use tracing::{debug, info, warn};

use super::error::{VfsError, VfsResult};
use super::provider::{CONFLICT_QUERY, FsProvider, IN_DIFF_QUERY};
use super::types::{ConflictDescriptor, EntryMetadata, FileChangeEvent};
use crate::remote::{FileApi, GetContentsOptions, UploadOptions};
use crate::surface::{MessageOptions, Severity};

/// Prompt shown when an upload hits a newer remote version.
pub const CONFLICT_MESSAGE: &str =
    "There is a newer version of this file on the mainframe. Compare with remote contents or overwrite?";

pub const COMPARE_LABEL: &str = "Compare";
pub const OVERWRITE_LABEL: &str = "Overwrite";

/// What the user chose in the conflict prompt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
pub enum ConflictViewSelection {
    UserDismissed,
    Compare,
    Overwrite,
}

struct Snapshot {
    name: String,
    metadata: EntryMetadata,
    binary: bool,
}

impl FsProvider {
    fn conflict_snapshot(&self, uri: &ResourceUri) -> VfsResult<Snapshot> {
        let metadata = {
            let tree = self.tree.read();
            let id = tree.lookup_as_file(uri)?;
            let entry = tree.entry(id)?;
            let binary = entry.as_file().is_some_and(|f| f.binary);
            (entry.name.clone(), entry.metadata.clone(), binary)
        };
        let (name, metadata, binary) = metadata;
        Ok(Snapshot {
            name,
            metadata: self.resolve_metadata(metadata, uri)?,
            binary,
        })
    }

    /// Upload with no etag, then re-fetch to learn the etag the remote now has.
    async fn force_upload(
        &self,
        api: &Arc<dyn FileApi>,
        snapshot: &Snapshot,
        content: &[u8],
    ) -> VfsResult<Option<String>> {
        let path = snapshot.metadata.remote_path();
        let upload = UploadOptions {
            etag: None,
            return_etag: true,
            binary: snapshot.binary,
            encoding: snapshot.metadata.profile.encoding.clone(),
        };
        api.upload_buffer_as_file(content, path, upload).await?;
        let confirm = GetContentsOptions {
            return_etag: true,
            binary: snapshot.binary,
            encoding: snapshot.metadata.profile.encoding.clone(),
            response_timeout: snapshot.metadata.profile.response_timeout,
        };
        Ok(api.get_contents(path, confirm).await?.etag)
    }

    /// Capture both sides of a rejected upload and ask the user what to do.
    ///
    /// If the remote content cannot be fetched the conflict is abandoned and
    /// the entry is left as it was.
    #[tracing::instrument(skip(self, api, conflict), fields(uri = %conflict.uri))]
    pub(crate) async fn handle_conflict(
        &self,
        api: &Arc<dyn FileApi>,
        conflict: ConflictDescriptor,
    ) -> VfsResult<ConflictViewSelection> {
        let snapshot = self.conflict_snapshot(&conflict.uri)?;
        let opts = GetContentsOptions {
            return_etag: true,
            binary: snapshot.binary,
            encoding: snapshot.metadata.profile.encoding.clone(),
            response_timeout: snapshot.metadata.profile.response_timeout,
        };
        let remote = api
            .get_contents(snapshot.metadata.remote_path(), opts)
            .await?;

        {
            let mut tree = self.tree.write();
            let Some(id) = tree.try_lookup_as_file(&conflict.uri) else {
                debug!("entry vanished before conflict could be recorded");
                return Ok(ConflictViewSelection::UserDismissed);
            };
            if id != conflict.entry {
                debug!("entry was replaced while uploading");
            }
            if let Some(file) = tree.entry_mut(id)?.as_file_mut() {
                file.conflict_data = Some(remote.data);
                file.conflict_etag = remote.etag;
                file.local_data = Some(conflict.content.clone());
                file.in_diff_view = true;
            }
        }

        let choice = self
            .prompts
            .show_message(
                CONFLICT_MESSAGE,
                MessageOptions::with_items([COMPARE_LABEL, OVERWRITE_LABEL])
                    .severity(Severity::Warning),
            )
            .await;

        match choice.as_deref() {
            Some(COMPARE_LABEL) => {
                let remote_uri = conflict
                    .uri
                    .with_query(Some(format!("{CONFLICT_QUERY}=true").as_str()));
                let local_uri = conflict
                    .uri
                    .with_query(Some(format!("{IN_DIFF_QUERY}=true").as_str()));
                let title = format!("{0} (Remote) ↔ {0}", snapshot.name);
                if let Err(e) = self.prompts.show_diff(&remote_uri, &local_uri, &title).await {
                    warn!(error = %e, "could not open conflict diff");
                }
                Ok(ConflictViewSelection::Compare)
            }
            Some(OVERWRITE_LABEL) => {
                self.overwrite_with_local(&conflict.uri, false).await?;
                Ok(ConflictViewSelection::Overwrite)
            }
            _ => {
                {
                    let mut tree = self.tree.write();
                    if let Some(id) = tree.try_lookup_as_file(&conflict.uri) {
                        if let Some(file) = tree.entry_mut(id)?.as_file_mut() {
                            file.clear_conflict();
                            file.data = Some(conflict.content);
                        }
                    }
                }
                info!("conflict dismissed, edit kept locally");
                Ok(ConflictViewSelection::UserDismissed)
            }
        }
    }

    /// Resolve a conflict from the diff view by force-uploading the local
    /// content. The diff editor is closed afterwards.
    #[tracing::instrument(skip(self), fields(uri = %uri))]
    pub async fn diff_overwrite(&self, uri: &ResourceUri) -> VfsResult<()> {
        self.overwrite_with_local(uri, true).await
    }

    async fn overwrite_with_local(&self, uri: &ResourceUri, close_diff: bool) -> VfsResult<()> {
        let uri = uri.with_query(None);
        let snapshot = self.conflict_snapshot(&uri)?;
        let (content, was_in_diff) = {
            let tree = self.tree.read();
            let id = tree.lookup_as_file(&uri)?;
            let file = tree
                .entry(id)?
                .as_file()
                .ok_or_else(|| VfsError::is_a_directory(uri.path()))?;
            (file.local_content(), file.in_diff_view)
        };

        let api = self.api_for(&snapshot.metadata)?;
        let etag = self.force_upload(&api, &snapshot, &content).await?;

        {
            let mut tree = self.tree.write();
            if let Some(id) = tree.try_lookup_as_file(&uri) {
                let entry = tree.entry_mut(id)?;
                entry.was_accessed = true;
                entry.touch();
                if let Some(file) = entry.as_file_mut() {
                    file.data = Some(content);
                    file.etag = etag;
                    file.force_upload = false;
                    file.clear_conflict();
                }
            }
        }

        if close_diff && was_in_diff {
            if let Err(e) = self.editor.close_active_editor().await {
                warn!(error = %e, "could not close diff editor");
            }
        }
        self.prompts.set_status_bar_message(
            &format!("Overwrite applied for {}", snapshot.name),
            self.config.status_timeout(),
        );
        self.fire_soon([FileChangeEvent::changed(uri)]);
        Ok(())
    }

    /// Resolve a conflict by adopting the remote content.
    ///
    /// When the local copy already matches the remote, only the cache is
    /// updated; otherwise the remote content is written back with a forced
    /// upload to learn its etag, and the editor is reverted.
    #[tracing::instrument(skip(self), fields(uri = %uri))]
    pub async fn diff_use_remote(&self, uri: &ResourceUri) -> VfsResult<()> {
        let uri = uri.with_query(None);
        let snapshot = self.conflict_snapshot(&uri)?;
        let (local, remote, remote_etag) = {
            let tree = self.tree.read();
            let id = tree.lookup_as_file(&uri)?;
            let file = tree
                .entry(id)?
                .as_file()
                .ok_or_else(|| VfsError::is_a_directory(uri.path()))?;
            (
                file.local_content(),
                file.conflict_data.clone(),
                file.conflict_etag.clone(),
            )
        };
        let Some(remote) = remote else {
            debug!("no conflict recorded, nothing to resolve");
            return Ok(());
        };

        let identical = local == remote;
        let etag = if identical {
            remote_etag
        } else {
            let api = self.api_for(&snapshot.metadata)?;
            self.force_upload(&api, &snapshot, &remote).await?
        };

        {
            let mut tree = self.tree.write();
            if let Some(id) = tree.try_lookup_as_file(&uri) {
                let entry = tree.entry_mut(id)?;
                entry.was_accessed = true;
                entry.touch();
                if let Some(file) = entry.as_file_mut() {
                    file.data = Some(remote);
                    if etag.is_some() {
                        file.etag = etag;
                    }
                    file.clear_conflict();
                }
            }
        }

        self.prompts.set_status_bar_message(
            &format!("Used remote content for {}", snapshot.name),
            self.config.status_timeout(),
        );
        if let Err(e) = self.editor.close_active_editor().await {
            warn!(error = %e, "could not close diff editor");
        }
        if !identical {
            if let Err(e) = self.editor.revert_active().await {
                warn!(error = %e, "could not revert editor");
            }
        }
        self.fire_soon([FileChangeEvent::changed(uri)]);
        Ok(())
    }

    /// The conflict diff was closed without a choice. Treated as dismissal:
    /// the local edit is kept and the conflict state dropped.
    pub fn close_diff(&self, uri: &ResourceUri) -> VfsResult<bool> {
        let uri = uri.with_query(None);
        let mut tree = self.tree.write();
        let id = tree.lookup_as_file(&uri)?;
        let Some(file) = tree.entry_mut(id)?.as_file_mut() else {
            return Ok(false);
        };
        if file.conflict_data.is_none() && !file.in_diff_view {
            return Ok(false);
        }
        if let Some(local) = file.local_data.take() {
            file.data = Some(local);
        }
        file.clear_conflict();
        Ok(true)
    }
}
