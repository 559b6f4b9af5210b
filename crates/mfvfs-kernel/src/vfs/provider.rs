//! The filesystem provider.
//!
//! `FsProvider` owns the cached [`EntryTree`] for one URI scheme and
//! mediates every access to the remote system. Tree access goes through a
//! `parking_lot::RwLock` that is only ever held between suspension points:
//! an operation snapshots what it needs, releases the lock, awaits the
//! remote call, then re-resolves the entry by URI before applying the
//! result. An entry that disappeared in the meantime is simply skipped.

use std::collections::HashSet;
use std::sync::Arc;

use mfvfs_types::{Profile, ResourceUri};
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::error::{VfsError, VfsResult};
use super::notify::ChangeNotifier;
use super::tree::EntryTree;
use super::types::{
    ConflictDescriptor, Entry, EntryKind, EntryMetadata, FileChangeEvent, FileStat,
    LookupOptions, UssAttributes, WriteOptions,
};
use crate::config::ProviderConfig;
use crate::remote::{ApiRegistry, FileApi, GetContentsOptions, RemoteError, UploadOptions};
use crate::surface::{EditorSurface, PromptSurface};

/// Query flag marking the remote side of a conflict diff.
pub const CONFLICT_QUERY: &str = "conflict";

/// Query flag marking the local side of a conflict diff.
pub const IN_DIFF_QUERY: &str = "inDiff";

/// `.`, `..` and `...` are never real listing entries.
fn is_dot_entry(name: &str) -> bool {
    (1..=3).contains(&name.len()) && name.chars().all(|c| c == '.')
}

enum WritePlan {
    Done(Vec<FileChangeEvent>),
    Upload {
        entry: mfvfs_types::EntryId,
        metadata: Option<EntryMetadata>,
        etag: Option<String>,
        binary: bool,
        content: Vec<u8>,
        created: bool,
    },
}

/// Cached virtual filesystem over remote profiles.
pub struct FsProvider {
    scheme: String,
    pub(crate) tree: RwLock<EntryTree>,
    apis: Arc<ApiRegistry>,
    pub(crate) prompts: Arc<dyn PromptSurface>,
    pub(crate) editor: Arc<dyn EditorSurface>,
    pub(crate) notifier: ChangeNotifier,
    pub(crate) config: ProviderConfig,
    opened: Mutex<HashSet<ResourceUri>>,
}

impl FsProvider {
    pub fn new(
        scheme: impl Into<String>,
        apis: Arc<ApiRegistry>,
        prompts: Arc<dyn PromptSurface>,
        editor: Arc<dyn EditorSurface>,
        config: ProviderConfig,
    ) -> Self {
        let notifier = ChangeNotifier::new(config.change_delay(), config.event_capacity);
        Self {
            scheme: scheme.into(),
            tree: RwLock::new(EntryTree::new()),
            apis,
            prompts,
            editor,
            notifier,
            config,
            opened: Mutex::new(HashSet::new()),
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// URI in this provider's scheme.
    pub fn uri(&self, path: impl Into<String>) -> ResourceUri {
        ResourceUri::new(self.scheme.clone(), path)
    }

    /// Read access to the cached tree. Do not hold across an await.
    pub fn tree(&self) -> RwLockReadGuard<'_, EntryTree> {
        self.tree.read()
    }

    /// Subscribe to batched change events.
    pub fn subscribe(&self) -> broadcast::Receiver<Vec<FileChangeEvent>> {
        self.notifier.subscribe()
    }

    /// Deliver buffered change events without waiting for the quiet period.
    pub fn flush_events(&self) {
        self.notifier.flush_now();
    }

    pub(crate) fn fire_soon(&self, events: impl IntoIterator<Item = FileChangeEvent>) {
        self.notifier.fire_soon(events);
    }

    /// Add a profile's root directory under the scheme root.
    #[tracing::instrument(skip(self, profile), fields(profile = %profile.name))]
    pub fn mount_profile(&self, profile: Profile) -> VfsResult<ResourceUri> {
        let uri = self.uri(format!("/{}", profile.name));
        {
            let mut tree = self.tree.write();
            if let Some(id) = tree.try_lookup_as_directory(&uri) {
                tree.entry_mut(id)?.metadata = Some(EntryMetadata::new(profile, "/"));
                return Ok(uri);
            }
            let entry = Entry::directory(profile.name.clone())
                .with_metadata(Some(EntryMetadata::new(profile, "/")));
            let root = tree.root();
            tree.insert(root, entry)?;
        }
        info!(uri = %uri, "mounted profile");
        self.fire_soon([FileChangeEvent::created(uri.clone())]);
        Ok(uri)
    }

    /// Remote metadata derived from the URI alone.
    pub fn metadata_for_uri(&self, uri: &ResourceUri) -> VfsResult<EntryMetadata> {
        let info = uri.info();
        let name = info
            .profile_name
            .ok_or_else(|| VfsError::invalid_path(uri.path()))?;
        let api = self
            .apis
            .get(&name)
            .ok_or(VfsError::NoApiForProfile(name))?;
        Ok(EntryMetadata::new(api.profile().clone(), info.remote_path))
    }

    pub(crate) fn api_for(&self, metadata: &EntryMetadata) -> VfsResult<Arc<dyn FileApi>> {
        self.apis
            .get(&metadata.profile.name)
            .ok_or_else(|| VfsError::NoApiForProfile(metadata.profile.name.clone()))
    }

    pub(crate) fn resolve_metadata(
        &self,
        metadata: Option<EntryMetadata>,
        uri: &ResourceUri,
    ) -> VfsResult<EntryMetadata> {
        match metadata {
            Some(m) => Ok(m),
            None => self.metadata_for_uri(uri),
        }
    }

    pub fn exists(&self, uri: &ResourceUri) -> bool {
        self.tree.read().try_lookup(uri).is_some()
    }

    pub fn stat(&self, uri: &ResourceUri) -> VfsResult<FileStat> {
        let tree = self.tree.read();
        let id = tree.lookup(uri)?;
        Ok(tree.entry(id)?.stat())
    }

    /// List a directory, fetching the remote listing on first access.
    #[tracing::instrument(skip(self), fields(uri = %uri))]
    pub async fn read_directory(&self, uri: &ResourceUri) -> VfsResult<Vec<(String, EntryKind)>> {
        let needs_listing = {
            let tree = self.tree.read();
            let id = tree.lookup_as_directory(uri)?;
            let entry = tree.entry(id)?;
            if id.is_root() || entry.was_accessed {
                None
            } else {
                Some(entry.metadata.clone())
            }
        };

        if let Some(metadata) = needs_listing {
            let metadata = self.resolve_metadata(metadata, uri)?;
            let api = self.api_for(&metadata)?;
            let items = api.file_list(metadata.remote_path()).await?;
            debug!(count = items.len(), "fetched remote listing");

            let mut tree = self.tree.write();
            let id = tree.lookup_as_directory(uri)?;
            for item in items {
                if is_dot_entry(&item.name) {
                    continue;
                }
                let kind = if item.is_directory() {
                    EntryKind::Directory
                } else {
                    EntryKind::File
                };
                if let Some(existing) = tree.child(id, &item.name) {
                    if tree.entry(existing)?.kind() == kind {
                        continue;
                    }
                }
                let child_meta = metadata.child(&item.name, kind);
                let mut entry = match kind {
                    EntryKind::Directory => Entry::directory(item.name.clone()),
                    EntryKind::File => Entry::file(item.name.clone()),
                };
                if let Some(file) = entry.as_file_mut() {
                    file.attributes = Some(UssAttributes {
                        owner: item.user,
                        group: item.group,
                        perms: Some(item.mode),
                        size: item.size,
                    });
                }
                tree.insert(id, entry.with_metadata(Some(child_meta)))?;
            }
            tree.entry_mut(id)?.was_accessed = true;
        }

        let tree = self.tree.read();
        let id = tree.lookup_as_directory(uri)?;
        let mut out = Vec::new();
        for (name, child) in tree.children(id) {
            out.push((name, tree.entry(child)?.kind()));
        }
        Ok(out)
    }

    /// Fetch a file's contents and etag from the remote into the cache.
    ///
    /// Missing ancestors are created along the way. With `reload_editor`,
    /// the open editor for the file is refreshed afterwards.
    #[tracing::instrument(skip(self), fields(uri = %uri))]
    pub async fn fetch_file_at_uri(
        &self,
        uri: &ResourceUri,
        reload_editor: bool,
    ) -> VfsResult<Vec<u8>> {
        let uri = uri.with_query(None);
        let (metadata, binary) = {
            let mut tree = self.tree.write();
            let build = LookupOptions {
                build_full_path: true,
                silent: false,
            };
            let id = tree
                .lookup_as_file_with(&uri, build)?
                .ok_or_else(|| VfsError::not_found(uri.path()))?;
            let entry = tree.entry(id)?;
            (
                entry.metadata.clone(),
                entry.as_file().is_some_and(|f| f.binary),
            )
        };
        let metadata = self.resolve_metadata(metadata, &uri)?;
        let api = self.api_for(&metadata)?;
        let opts = GetContentsOptions {
            return_etag: true,
            binary,
            encoding: metadata.profile.encoding.clone(),
            response_timeout: metadata.profile.response_timeout,
        };
        let response = api.get_contents(metadata.remote_path(), opts).await?;
        debug!(bytes = response.data.len(), etag = ?response.etag, "fetched file");

        {
            let mut tree = self.tree.write();
            if let Some(id) = tree.try_lookup_as_file(&uri) {
                let entry = tree.entry_mut(id)?;
                entry.was_accessed = true;
                entry.touch();
                if entry.metadata.is_none() {
                    entry.metadata = Some(metadata);
                }
                if let Some(file) = entry.as_file_mut() {
                    file.data = Some(response.data.clone());
                    file.etag = response.etag.clone();
                }
            }
        }

        if reload_editor {
            self.update_resource_in_editor(&uri).await;
        }
        Ok(response.data)
    }

    /// Read a file.
    ///
    /// `?conflict=true` reads the remote side of an open conflict and
    /// `?inDiff=true` the local side; neither touches the network.
    pub async fn read_file(&self, uri: &ResourceUri) -> VfsResult<Vec<u8>> {
        let conflict_view = uri.has_query_flag(CONFLICT_QUERY);
        let diff_view = uri.has_query_flag(IN_DIFF_QUERY);
        let cached = {
            let tree = self.tree.read();
            match tree.try_lookup(uri) {
                Some(id) => {
                    let entry = tree.entry(id)?;
                    let file = entry
                        .as_file()
                        .ok_or_else(|| VfsError::is_a_directory(uri.path()))?;
                    if conflict_view {
                        Some(
                            file.conflict_data
                                .clone()
                                .or_else(|| file.data.clone())
                                .unwrap_or_default(),
                        )
                    } else if diff_view {
                        Some(file.local_content())
                    } else if entry.was_accessed || file.is_conflict_file {
                        Some(file.data.clone().unwrap_or_default())
                    } else {
                        None
                    }
                }
                None if conflict_view || diff_view => {
                    return Err(VfsError::not_found(uri.path()));
                }
                None => None,
            }
        };
        match cached {
            Some(data) => Ok(data),
            None => self.fetch_file_at_uri(uri, false).await,
        }
    }

    /// Write a file, uploading to the remote when the entry is backed by one.
    ///
    /// A new file is uploaded unless it is empty. An etag mismatch on upload
    /// starts conflict resolution instead of failing. Writes while a conflict
    /// diff is open stay local.
    #[tracing::instrument(skip(self, content), fields(uri = %uri, bytes = content.len()))]
    pub async fn write_file(
        &self,
        uri: &ResourceUri,
        content: Vec<u8>,
        opts: WriteOptions,
    ) -> VfsResult<()> {
        let plain = uri.with_query(None);
        let plan = {
            let mut tree = self.tree.write();
            let parent = tree.lookup_parent_directory(&plain)?;
            let name = plain.basename().to_string();
            match tree.child(parent, &name) {
                None if !opts.create => return Err(VfsError::not_found(plain.path())),
                None => {
                    let metadata = match tree.entry(parent)?.metadata.as_ref() {
                        Some(m) => Some(m.child(&name, EntryKind::File)),
                        None => self.metadata_for_uri(&plain).ok(),
                    };
                    let upload = !content.is_empty() && metadata.is_some();
                    let mut entry = Entry::file(name).with_metadata(metadata.clone());
                    if let Some(file) = entry.as_file_mut() {
                        file.force_upload = opts.force_upload;
                        if !upload {
                            file.data = Some(content.clone());
                        }
                    }
                    let id = tree.insert(parent, entry)?;
                    if upload {
                        WritePlan::Upload {
                            entry: id,
                            metadata,
                            etag: None,
                            binary: false,
                            content,
                            created: true,
                        }
                    } else {
                        WritePlan::Done(vec![FileChangeEvent::created(plain.clone())])
                    }
                }
                Some(id) => {
                    if tree.entry(id)?.is_dir() {
                        return Err(VfsError::is_a_directory(plain.path()));
                    }
                    if opts.create && !opts.overwrite {
                        return Err(VfsError::already_exists(plain.path()));
                    }
                    let entry = tree.entry_mut(id)?;
                    entry.touch();
                    let was_accessed = entry.was_accessed;
                    let metadata = entry.metadata.clone();
                    let file = entry
                        .as_file_mut()
                        .ok_or_else(|| VfsError::is_a_directory(plain.path()))?;

                    if uri.has_query_flag(CONFLICT_QUERY) {
                        file.conflict_data = Some(content);
                        WritePlan::Done(Vec::new())
                    } else if uri.has_query_flag(IN_DIFF_QUERY) || file.in_diff_view {
                        file.local_data = Some(content);
                        WritePlan::Done(Vec::new())
                    } else if file.is_conflict_file || (!was_accessed && content.is_empty()) {
                        file.data = Some(content);
                        WritePlan::Done(vec![FileChangeEvent::changed(plain.clone())])
                    } else {
                        let force = opts.force_upload || file.force_upload;
                        WritePlan::Upload {
                            entry: id,
                            metadata,
                            etag: if force { None } else { file.etag.clone() },
                            binary: file.binary,
                            content,
                            created: false,
                        }
                    }
                }
            }
        };

        let (entry, metadata, etag, binary, content, created) = match plan {
            WritePlan::Done(events) => {
                self.fire_soon(events);
                return Ok(());
            }
            WritePlan::Upload {
                entry,
                metadata,
                etag,
                binary,
                content,
                created,
            } => (entry, metadata, etag, binary, content, created),
        };

        let metadata = self.resolve_metadata(metadata, &plain)?;
        let api = self.api_for(&metadata)?;
        let upload = UploadOptions {
            etag,
            return_etag: true,
            binary,
            encoding: metadata.profile.encoding.clone(),
        };
        match api
            .upload_buffer_as_file(&content, metadata.remote_path(), upload)
            .await
        {
            Ok(response) => {
                let etag = match response.etag {
                    Some(etag) => Some(etag),
                    None => {
                        let opts = GetContentsOptions {
                            return_etag: true,
                            binary,
                            ..GetContentsOptions::default()
                        };
                        api.get_contents(metadata.remote_path(), opts).await?.etag
                    }
                };
                {
                    let mut tree = self.tree.write();
                    if let Some(id) = tree.try_lookup_as_file(&plain) {
                        let entry = tree.entry_mut(id)?;
                        entry.was_accessed = true;
                        if let Some(file) = entry.as_file_mut() {
                            file.data = Some(content);
                            file.etag = etag;
                            file.force_upload = false;
                        }
                    }
                }
                self.fire_soon([if created {
                    FileChangeEvent::created(plain)
                } else {
                    FileChangeEvent::changed(plain)
                }]);
                Ok(())
            }
            Err(RemoteError::Conflict(message)) => {
                info!(%message, "upload rejected by etag, resolving conflict");
                let conflict = ConflictDescriptor {
                    entry,
                    uri: plain,
                    content,
                };
                let selection = self.handle_conflict(&api, conflict).await?;
                debug!(%selection, "conflict prompt answered");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Create a directory entry locally. The remote directory is created by
    /// whoever asked for this one.
    pub fn create_directory(&self, uri: &ResourceUri) -> VfsResult<()> {
        let parent_uri = uri.parent();
        {
            let mut tree = self.tree.write();
            let parent = tree.lookup_as_directory(&parent_uri)?;
            let name = uri.basename().to_string();
            if tree.child(parent, &name).is_some() {
                return Err(VfsError::already_exists(uri.path()));
            }
            let metadata = match tree.entry(parent)?.metadata.as_ref() {
                Some(m) => Some(m.child(&name, EntryKind::Directory)),
                None => self.metadata_for_uri(uri).ok().map(|mut m| {
                    m.path.push('/');
                    m
                }),
            };
            tree.insert(parent, Entry::directory(name).with_metadata(metadata))?;
        }
        self.fire_soon([
            FileChangeEvent::changed(parent_uri),
            FileChangeEvent::created(uri.clone()),
        ]);
        Ok(())
    }

    /// Drop an entry from the cache if present. No remote call.
    pub fn remove_entry_if_exists(&self, uri: &ResourceUri) -> bool {
        let removed = {
            let mut tree = self.tree.write();
            match tree.try_lookup_parent_directory(uri) {
                Some(parent) => match tree.detach(parent, uri.basename()) {
                    Some(id) => tree.remove_subtree(id).is_some(),
                    None => false,
                },
                None => false,
            }
        };
        if removed {
            self.fire_soon([FileChangeEvent::deleted(uri.clone())]);
        }
        removed
    }

    /// Remember that an editor opened this URI.
    pub fn cache_opened_uri(&self, uri: &ResourceUri) {
        self.opened.lock().insert(uri.with_query(None));
    }

    pub fn is_opened(&self, uri: &ResourceUri) -> bool {
        self.opened.lock().contains(&uri.with_query(None))
    }

    /// Forget cached content so the next read goes to the remote.
    pub fn invalidate_data_for_uri(&self, uri: &ResourceUri) -> bool {
        self.opened.lock().remove(&uri.with_query(None));
        let mut tree = self.tree.write();
        let Some(id) = tree.try_lookup(uri) else {
            return false;
        };
        let Some(entry) = tree.get_mut(id) else {
            return false;
        };
        entry.was_accessed = false;
        if let Some(file) = entry.as_file_mut() {
            file.data = None;
        }
        true
    }

    /// Reopen and revert the editor showing `uri` so it picks up fresh
    /// content. Failures are logged.
    pub async fn update_resource_in_editor(&self, uri: &ResourceUri) {
        if let Err(e) = self.editor.open_with(uri, None).await {
            warn!(uri = %uri, error = %e, "failed to open editor for refresh");
            return;
        }
        if let Err(e) = self.editor.revert_active().await {
            warn!(uri = %uri, error = %e, "failed to revert editor");
        }
    }
}
