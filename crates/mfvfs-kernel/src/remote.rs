//! Remote file API boundary.
//!
//! The kernel never talks to a mainframe directly. Each mounted profile has
//! an implementation of [`FileApi`] registered in an [`ApiRegistry`]; the
//! filesystem provider resolves the API for an entry through its profile
//! name. Errors come back as [`RemoteError`], classified once at the
//! boundary so callers match on variants instead of status codes and
//! message strings.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use mfvfs_types::Profile;
use thiserror::Error;

/// Message fragment returned when a session token has lapsed.
pub const TOKEN_EXPIRED_MESSAGE: &str = "Token is not valid or expired";

/// Message fragment returned when every configured auth method was rejected.
pub const ALL_AUTH_METHODS_FAILED_MESSAGE: &str = "All configured authentication methods failed";

/// HTTP status for rejected credentials.
pub const HTTP_UNAUTHORIZED: u16 = 401;

/// HTTP status for an etag mismatch on upload.
pub const HTTP_PRECONDITION_FAILED: u16 = 412;

/// What kind of authentication failure occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum AuthErrorKind {
    /// The session token is no longer valid.
    TokenExpired,
    /// User/password (or certificate) were rejected.
    CredentialsInvalid,
    /// Any other authentication problem.
    Other,
}

/// An authentication failure reported by the remote system.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct AuthError {
    /// Classification used by the lock and prompt logic.
    pub kind: AuthErrorKind,
    /// Server-provided message.
    pub message: String,
    /// HTTP status, when the transport had one.
    pub status: Option<u16>,
}

impl AuthError {
    /// Build an auth error without a status code.
    pub fn new(kind: AuthErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    /// Attach the HTTP status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// True when the failure is an expired token.
    pub fn is_token_expired(&self) -> bool {
        self.kind == AuthErrorKind::TokenExpired
    }
}

/// Errors from remote file operations.
#[derive(Clone, Debug, Error)]
pub enum RemoteError {
    /// Authentication failed; the caller may prompt and retry.
    #[error("authentication failed: {0}")]
    Auth(AuthError),

    /// The remote copy changed since it was fetched (etag mismatch).
    #[error("remote version changed: {0}")]
    Conflict(String),

    /// Any other HTTP failure.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Connection-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The API does not implement this operation.
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),
}

impl RemoteError {
    /// Classify a failed HTTP exchange.
    pub fn from_http(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if message.contains(TOKEN_EXPIRED_MESSAGE) {
            Self::Auth(AuthError::new(AuthErrorKind::TokenExpired, message).with_status(status))
        } else if status == HTTP_UNAUTHORIZED || message.contains(ALL_AUTH_METHODS_FAILED_MESSAGE)
        {
            Self::Auth(
                AuthError::new(AuthErrorKind::CredentialsInvalid, message).with_status(status),
            )
        } else if status == HTTP_PRECONDITION_FAILED {
            Self::Conflict(message)
        } else {
            Self::Http { status, message }
        }
    }

    /// Create a Transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// The auth failure, if this is one.
    pub fn as_auth(&self) -> Option<&AuthError> {
        match self {
            Self::Auth(e) => Some(e),
            _ => None,
        }
    }

    /// True for etag conflicts.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Remote result type.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Options for fetching file contents.
#[derive(Clone, Debug, Default)]
pub struct GetContentsOptions {
    /// Ask the server to return the current etag.
    pub return_etag: bool,
    /// Transfer as binary.
    pub binary: bool,
    /// Codepage for text transfers.
    pub encoding: Option<String>,
    /// Server response timeout in seconds.
    pub response_timeout: Option<u32>,
}

/// Options for uploading a buffer.
#[derive(Clone, Debug, Default)]
pub struct UploadOptions {
    /// Etag the upload must match; `None` forces the write.
    pub etag: Option<String>,
    /// Ask the server to return the new etag.
    pub return_etag: bool,
    /// Transfer as binary.
    pub binary: bool,
    /// Codepage for text transfers.
    pub encoding: Option<String>,
}

/// Fetched file contents.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContentsResponse {
    pub data: Vec<u8>,
    pub etag: Option<String>,
}

/// Result of an upload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UploadResponse {
    /// New etag, when the server returned one.
    pub etag: Option<String>,
    /// Human-readable server response.
    pub command_response: String,
}

/// One item of a remote directory listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteItem {
    pub name: String,
    /// `ls`-style mode string, e.g. `drwxr-xr-x`.
    pub mode: String,
    pub size: u64,
    pub user: Option<String>,
    pub group: Option<String>,
}

impl RemoteItem {
    /// True when the mode string marks a directory.
    pub fn is_directory(&self) -> bool {
        self.mode.starts_with('d')
    }
}

/// What [`FileApi::create`] should make.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum CreateKind {
    File,
    Directory,
}

/// File operations against one remote profile.
#[async_trait]
pub trait FileApi: Send + Sync {
    /// The profile this API talks to.
    fn profile(&self) -> &Profile;

    /// Fetch a file's contents.
    async fn get_contents(
        &self,
        path: &str,
        opts: GetContentsOptions,
    ) -> RemoteResult<ContentsResponse>;

    /// Upload a buffer, optionally guarded by an etag.
    async fn upload_buffer_as_file(
        &self,
        data: &[u8],
        path: &str,
        opts: UploadOptions,
    ) -> RemoteResult<UploadResponse>;

    /// List a directory.
    async fn file_list(&self, path: &str) -> RemoteResult<Vec<RemoteItem>>;

    /// Delete a file or directory.
    async fn delete(&self, path: &str, recursive: bool) -> RemoteResult<()>;

    /// Rename within the same system.
    async fn rename(&self, old_path: &str, new_path: &str) -> RemoteResult<()>;

    /// Move a file or directory. Not every API supports this.
    async fn move_entry(&self, _old_path: &str, _new_path: &str) -> RemoteResult<()> {
        Err(RemoteError::Unsupported("move"))
    }

    /// Create an empty file or directory.
    async fn create(&self, path: &str, kind: CreateKind) -> RemoteResult<()>;
}

/// File APIs keyed by profile name.
#[derive(Default)]
pub struct ApiRegistry {
    apis: DashMap<String, Arc<dyn FileApi>>,
}

impl ApiRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the API for its profile.
    pub fn register(&self, api: Arc<dyn FileApi>) {
        let name = api.profile().name.clone();
        tracing::debug!(profile = %name, "registered file API");
        self.apis.insert(name, api);
    }

    /// Look up the API for a profile.
    pub fn get(&self, profile_name: &str) -> Option<Arc<dyn FileApi>> {
        self.apis.get(profile_name).map(|api| Arc::clone(api.value()))
    }

    /// Remove a profile's API.
    pub fn unregister(&self, profile_name: &str) -> Option<Arc<dyn FileApi>> {
        self.apis.remove(profile_name).map(|(_, api)| api)
    }

    /// Registered profile names.
    pub fn profile_names(&self) -> Vec<String> {
        self.apis.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.apis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apis.is_empty()
    }
}
