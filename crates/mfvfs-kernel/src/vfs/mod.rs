//! Cached virtual filesystem over remote profiles.
//!
//! Key components:
//!
//! - [`EntryTree`] - Arena of cached files and directories
//! - [`FsProvider`] - Filesystem operations, backed by a remote [`FileApi`]
//! - [`ChangeNotifier`] - Debounced change events
//!
//! ## Design Decisions
//!
//! - **Arena, not pointers**: entries are addressed by [`EntryId`]; a parent
//!   index replaces back-pointers, so moving a subtree is two map updates.
//! - **No lock across awaits**: operations snapshot, call the remote, then
//!   re-resolve by URI before writing the result back.
//! - **Query-tagged diff sides**: `?conflict=true` is the remote side of a
//!   conflict diff, `?inDiff=true` the local side. Both read and write the
//!   held-aside buffers and never reach the network.
//!
//! [`FileApi`]: crate::remote::FileApi
//! [`EntryId`]: mfvfs_types::EntryId

mod conflict;
mod error;
pub mod notify;
mod provider;
mod relocate;
mod resolve;
mod tree;
mod types;

pub use conflict::{COMPARE_LABEL, CONFLICT_MESSAGE, ConflictViewSelection, OVERWRITE_LABEL};
pub use error::{VfsError, VfsResult};
pub use notify::ChangeNotifier;
pub use provider::{CONFLICT_QUERY, FsProvider, IN_DIFF_QUERY};
pub use relocate::MOVE_UNSUPPORTED_MESSAGE;
pub use tree::EntryTree;
pub use types::{
    ConflictDescriptor, ConflictState, DeleteMetadata, DirectoryData, Entry, EntryKind,
    EntryMetadata, EntryNode, FileChangeEvent, FileChangeType, FileData, FileStat, LookupOptions,
    UssAttributes, WriteOptions, perm_string_to_mode, perm_string_to_octal,
};
