//! Core types for the virtual filesystem cache.

use std::collections::HashMap;
use std::time::SystemTime;

use mfvfs_types::{EntryId, Profile, ResourceUri};
use serde::{Deserialize, Serialize};

/// Type of cached entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    pub fn is_file(&self) -> bool {
        matches!(self, EntryKind::File)
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, EntryKind::Directory)
    }
}

/// Where an entry lives on the remote system.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryMetadata {
    pub profile: Profile,
    /// Remote path. Directory paths end with `/`.
    pub path: String,
}

impl EntryMetadata {
    pub fn new(profile: Profile, path: impl Into<String>) -> Self {
        Self {
            profile,
            path: path.into(),
        }
    }

    /// Same profile, different remote path.
    pub fn with_path(&self, path: impl Into<String>) -> Self {
        Self::new(self.profile.clone(), path)
    }

    /// Metadata for `name` inside this directory.
    pub fn child(&self, name: &str, kind: EntryKind) -> Self {
        let mut path = self.path.clone();
        if !path.ends_with('/') {
            path.push('/');
        }
        path.push_str(name);
        if kind.is_dir() {
            path.push('/');
        }
        Self::new(self.profile.clone(), path)
    }

    /// Remote path without the trailing slash directories carry.
    pub fn remote_path(&self) -> &str {
        match self.path.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        }
    }
}

/// USS file attributes from a directory listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UssAttributes {
    pub owner: Option<String>,
    pub group: Option<String>,
    /// `ls`-style permission string, e.g. `-rw-r--r--`.
    pub perms: Option<String>,
    pub size: u64,
}

impl UssAttributes {
    /// Octal-looking permission number, e.g. `644`.
    pub fn perms_octal(&self) -> Option<u32> {
        self.perms.as_deref().map(perm_string_to_octal)
    }
}

/// Convert `drwxr-xr-x` style permissions into the decimal number whose
/// digits spell the octal mode, e.g. `755`.
///
/// The leading file-type character is optional. Unknown characters count as
/// unset bits.
pub fn perm_string_to_octal(perms: &str) -> u32 {
    perm_triplets(perms)
        .iter()
        .fold(0, |acc, digit| acc * 10 + digit)
}

/// Convert `drwxr-xr-x` style permissions into a mode value, e.g. `0o755`.
pub fn perm_string_to_mode(perms: &str) -> u32 {
    perm_triplets(perms)
        .iter()
        .fold(0, |acc, digit| (acc << 3) | digit)
}

fn perm_triplets(perms: &str) -> [u32; 3] {
    let chars: Vec<char> = perms.chars().collect();
    let bits = if chars.len() > 9 {
        &chars[chars.len() - 9..]
    } else {
        &chars[..]
    };
    let mut out = [0u32; 3];
    for (i, c) in bits.iter().enumerate().take(9) {
        let value = match (i % 3, c) {
            (0, 'r') => 4,
            (1, 'w') => 2,
            (2, 'x' | 's' | 't') => 1,
            _ => 0,
        };
        out[i / 3] += value;
    }
    out
}

/// Directory payload.
#[derive(Clone, Debug, Default)]
pub struct DirectoryData {
    pub(crate) entries: HashMap<String, EntryId>,
    /// Number of children.
    pub size: usize,
}

impl DirectoryData {
    /// Child slot by name.
    pub fn child(&self, name: &str) -> Option<EntryId> {
        self.entries.get(name).copied()
    }

    /// Child names, unordered.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// File payload and sync state.
#[derive(Clone, Debug, Default)]
pub struct FileData {
    /// Last known content. `None` until fetched or invalidated.
    pub data: Option<Vec<u8>>,
    /// Remote version tag from the last fetch or upload.
    pub etag: Option<String>,
    /// Remote content captured when a conflict was detected.
    pub conflict_data: Option<Vec<u8>>,
    /// Remote etag that came with `conflict_data`.
    pub conflict_etag: Option<String>,
    /// Local content held aside while a conflict is open.
    pub local_data: Option<Vec<u8>>,
    /// This entry is a conflict view, not a real remote file.
    pub is_conflict_file: bool,
    /// A conflict diff is open for this entry.
    pub in_diff_view: bool,
    pub binary: bool,
    /// Upload without an etag on the next write.
    pub force_upload: bool,
    pub attributes: Option<UssAttributes>,
}

impl FileData {
    /// Lifecycle state derived from the conflict fields.
    pub fn conflict_state(&self) -> ConflictState {
        match (&self.conflict_data, self.in_diff_view) {
            (None, _) => ConflictState::Clean,
            (Some(_), false) => ConflictState::ConflictDetected,
            (Some(_), true) => ConflictState::AwaitingUserChoice,
        }
    }

    /// Drop every conflict-only field.
    pub fn clear_conflict(&mut self) {
        self.conflict_data = None;
        self.conflict_etag = None;
        self.local_data = None;
        self.in_diff_view = false;
    }

    /// Content the user is editing: the held-aside copy, else the cache.
    pub fn local_content(&self) -> Vec<u8> {
        self.local_data
            .clone()
            .or_else(|| self.data.clone())
            .unwrap_or_default()
    }
}

/// Conflict lifecycle of a file entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
pub enum ConflictState {
    Clean,
    ConflictDetected,
    AwaitingUserChoice,
}

/// Payload of an entry.
#[derive(Clone, Debug)]
pub enum EntryNode {
    Directory(DirectoryData),
    File(FileData),
}

/// A cached file or directory.
#[derive(Clone, Debug)]
pub struct Entry {
    pub name: String,
    /// `None` only for the scheme root.
    pub metadata: Option<EntryMetadata>,
    pub ctime: SystemTime,
    pub mtime: SystemTime,
    /// Content (or listing) has been fetched from the remote at least once.
    pub was_accessed: bool,
    pub node: EntryNode,
}

impl Entry {
    /// Empty directory.
    pub fn directory(name: impl Into<String>) -> Self {
        Self::with_node(name, EntryNode::Directory(DirectoryData::default()))
    }

    /// Empty, never-fetched file.
    pub fn file(name: impl Into<String>) -> Self {
        Self::with_node(
            name,
            EntryNode::File(FileData {
                data: Some(Vec::new()),
                ..FileData::default()
            }),
        )
    }

    fn with_node(name: impl Into<String>, node: EntryNode) -> Self {
        let now = SystemTime::now();
        Self {
            name: name.into(),
            metadata: None,
            ctime: now,
            mtime: now,
            was_accessed: false,
            node,
        }
    }

    pub fn with_metadata(mut self, metadata: Option<EntryMetadata>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn kind(&self) -> EntryKind {
        match self.node {
            EntryNode::Directory(_) => EntryKind::Directory,
            EntryNode::File(_) => EntryKind::File,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind().is_dir()
    }

    pub fn is_file(&self) -> bool {
        self.kind().is_file()
    }

    pub fn as_file(&self) -> Option<&FileData> {
        match &self.node {
            EntryNode::File(f) => Some(f),
            EntryNode::Directory(_) => None,
        }
    }

    pub fn as_file_mut(&mut self) -> Option<&mut FileData> {
        match &mut self.node {
            EntryNode::File(f) => Some(f),
            EntryNode::Directory(_) => None,
        }
    }

    pub fn as_dir(&self) -> Option<&DirectoryData> {
        match &self.node {
            EntryNode::Directory(d) => Some(d),
            EntryNode::File(_) => None,
        }
    }

    pub(crate) fn as_dir_mut(&mut self) -> Option<&mut DirectoryData> {
        match &mut self.node {
            EntryNode::Directory(d) => Some(d),
            EntryNode::File(_) => None,
        }
    }

    /// Byte length for files, child count for directories.
    pub fn size(&self) -> u64 {
        match &self.node {
            EntryNode::File(f) => f.data.as_ref().map_or(0, |d| d.len() as u64),
            EntryNode::Directory(d) => d.size as u64,
        }
    }

    pub fn touch(&mut self) {
        self.mtime = SystemTime::now();
    }

    pub fn stat(&self) -> FileStat {
        FileStat {
            kind: self.kind(),
            size: self.size(),
            ctime: self.ctime,
            mtime: self.mtime,
        }
    }
}

/// What `stat` reports.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileStat {
    pub kind: EntryKind,
    pub size: u64,
    pub ctime: SystemTime,
    pub mtime: SystemTime,
}

/// A detected remote/local divergence awaiting resolution.
#[derive(Clone, Debug)]
pub struct ConflictDescriptor {
    pub entry: EntryId,
    pub uri: ResourceUri,
    /// Content the user tried to save.
    pub content: Vec<u8>,
}

/// Bookkeeping for an entry detached pending remote deletion.
#[derive(Clone, Debug)]
pub struct DeleteMetadata {
    /// Detached slot; still in the arena until the delete is committed.
    pub entry_to_delete: EntryId,
    pub parent: EntryId,
    pub parent_uri: ResourceUri,
}

/// Kind of change reported to listeners.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
pub enum FileChangeType {
    Created,
    Changed,
    Deleted,
}

/// One change notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileChangeEvent {
    pub kind: FileChangeType,
    pub uri: ResourceUri,
}

impl FileChangeEvent {
    pub fn created(uri: ResourceUri) -> Self {
        Self {
            kind: FileChangeType::Created,
            uri,
        }
    }

    pub fn changed(uri: ResourceUri) -> Self {
        Self {
            kind: FileChangeType::Changed,
            uri,
        }
    }

    pub fn deleted(uri: ResourceUri) -> Self {
        Self {
            kind: FileChangeType::Deleted,
            uri,
        }
    }
}

/// Options for `write_file`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Create the file if missing.
    pub create: bool,
    /// Allow replacing an existing file.
    pub overwrite: bool,
    /// Upload without the cached etag.
    pub force_upload: bool,
}

impl WriteOptions {
    /// `create` and `overwrite`, the editor-save default.
    pub fn upsert() -> Self {
        Self {
            create: true,
            overwrite: true,
            force_upload: false,
        }
    }
}

/// Options for `lookup_as_file_with`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LookupOptions {
    /// Return `None` instead of `NotFound`.
    pub silent: bool,
    /// Create missing ancestors and the file itself.
    pub build_full_path: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perm_string_to_octal() {
        assert_eq!(perm_string_to_octal("drwxr-xr-x"), 755);
        assert_eq!(perm_string_to_octal("-rw-r--r--"), 644);
        assert_eq!(perm_string_to_octal("rwx------"), 700);
        assert_eq!(perm_string_to_octal("----------"), 0);
        assert_eq!(perm_string_to_octal("drwxrwxrwx"), 777);
        assert_eq!(perm_string_to_octal("d---------"), 0);
        assert_eq!(perm_string_to_octal("-rwxrwxrwx"), 777);
    }

    #[test]
    fn test_perm_string_to_mode() {
        assert_eq!(perm_string_to_mode("drwxr-xr-x"), 0o755);
        assert_eq!(perm_string_to_mode("-rw-r-----"), 0o640);
        assert_eq!(perm_string_to_mode("-rwsr-xr-t"), 0o755);
    }

    #[test]
    fn test_metadata_child_paths() {
        let root = EntryMetadata::new(Profile::new("sestest", "zosmf"), "/");
        let dir = root.child("u", EntryKind::Directory);
        assert_eq!(dir.path, "/u/");
        assert_eq!(dir.remote_path(), "/u");
        let file = dir.child("a.txt", EntryKind::File);
        assert_eq!(file.path, "/u/a.txt");
        assert_eq!(root.remote_path(), "/");
    }

    #[test]
    fn test_conflict_state() {
        let mut f = FileData::default();
        assert_eq!(f.conflict_state(), ConflictState::Clean);
        f.conflict_data = Some(b"remote".to_vec());
        f.conflict_etag = Some("etag-7".to_string());
        assert_eq!(f.conflict_state(), ConflictState::ConflictDetected);
        f.in_diff_view = true;
        assert_eq!(f.conflict_state(), ConflictState::AwaitingUserChoice);
        f.local_data = Some(b"mine".to_vec());
        assert_eq!(f.local_content(), b"mine");
        f.clear_conflict();
        assert_eq!(f.conflict_state(), ConflictState::Clean);
        assert!(f.local_data.is_none());
        assert!(f.conflict_etag.is_none());
    }

    #[test]
    fn test_entry_size() {
        let mut file = Entry::file("a.txt");
        assert_eq!(file.size(), 0);
        file.as_file_mut().unwrap().data = Some(b"hello".to_vec());
        assert_eq!(file.size(), 5);
        assert_eq!(file.stat().kind, EntryKind::File);
        assert!(Entry::directory("d").as_file().is_none());
    }
}
