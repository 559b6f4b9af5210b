//! # mfvfs-kernel
//!
//! Client-side cache and coordination layer for remote mainframe
//! filesystems.
//!
//! - [`vfs`] caches remote files and directories per profile, detects
//!   edit conflicts by etag and walks the user through resolving them.
//! - [`auth`] serializes re-authentication per profile so concurrent
//!   operations that hit the same expired session prompt once.
//! - [`remote`] and [`surface`] are the seams: the remote file API on one
//!   side, host prompts/editors/tree views on the other.

pub mod auth;
pub mod config;
pub mod remote;
pub mod surface;
pub mod vfs;

pub use auth::{
    AuthHandler, AuthMethods, AuthPromptOpts, CredentialManagedApi, MutexRegistry, ProfileMutex,
    is_using_token_auth,
};
pub use config::{AuthConfig, ConfigError, MfvfsConfig, ProviderConfig};
pub use remote::{
    ApiRegistry, AuthError, AuthErrorKind, FileApi, RemoteError, RemoteItem, RemoteResult,
};
pub use surface::{
    EditorSurface, MessageOptions, ProfileTree, PromptSurface, RefreshError, ResourceRefresher,
    SurfaceError, TabInfo, TreeProviders,
};
pub use vfs::{
    ConflictViewSelection, EntryKind, EntryTree, FileChangeEvent, FileChangeType, FsProvider,
    VfsError, VfsResult, WriteOptions,
};
