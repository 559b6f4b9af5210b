//! Lock-and-retry wrapper for remote calls.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use mfvfs_types::{Profile, ProfileRef};
use tracing::warn;

use super::handler::{AuthHandler, AuthMethods, AuthPromptOpts, is_using_token_auth};
use crate::remote::{
    ContentsResponse, CreateKind, FileApi, GetContentsOptions, RemoteError, RemoteItem,
    RemoteResult, UploadOptions, UploadResponse,
};

impl AuthHandler {
    /// Run a remote operation under the profile's lock.
    ///
    /// An auth failure prompts the user once; if they re-authenticate, the
    /// operation is retried exactly once more and that result is final.
    /// The profile stays locked while the operation runs, so managed calls
    /// on one profile run one at a time.
    /// Other errors are returned as-is. The lock is always released before
    /// returning.
    pub async fn with_credential_management<T, F, Fut>(
        &self,
        methods: &Arc<dyn AuthMethods>,
        profile: impl Into<ProfileRef>,
        mut operation: F,
    ) -> RemoteResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RemoteResult<T>>,
    {
        let profile = profile.into();
        self.lock_profile(&profile, None, None).await;
        let error = match operation().await {
            Ok(value) => {
                self.unlock_profile(&profile, false);
                return Ok(value);
            }
            Err(RemoteError::Auth(error)) => error,
            Err(other) => {
                self.unlock_profile(&profile, false);
                return Err(other);
            }
        };

        warn!(profile = %profile, kind = %error.kind, "remote call rejected credentials");
        let token_auth = profile
            .loaded()
            .is_some_and(|p| is_using_token_auth(&p.secure, None));
        let opts = AuthPromptOpts::new(Arc::clone(methods)).token_auth(token_auth);
        if !self.prompt_for_authentication(&error, &profile, &opts).await {
            self.unlock_profile(&profile, false);
            return Err(RemoteError::Auth(error));
        }

        self.lock_profile(&profile, None, None).await;
        let retried = operation().await;
        self.unlock_profile(&profile, false);
        retried
    }
}

/// A [`FileApi`] whose every call goes through
/// [`AuthHandler::with_credential_management`].
pub struct CredentialManagedApi {
    inner: Arc<dyn FileApi>,
    auth: Arc<AuthHandler>,
    methods: Arc<dyn AuthMethods>,
}

impl CredentialManagedApi {
    pub fn new(
        inner: Arc<dyn FileApi>,
        auth: Arc<AuthHandler>,
        methods: Arc<dyn AuthMethods>,
    ) -> Self {
        Self {
            inner,
            auth,
            methods,
        }
    }

    /// Wrap and erase, ready for an [`ApiRegistry`](crate::remote::ApiRegistry).
    pub fn wrap(
        inner: Arc<dyn FileApi>,
        auth: Arc<AuthHandler>,
        methods: Arc<dyn AuthMethods>,
    ) -> Arc<dyn FileApi> {
        Arc::new(Self::new(inner, auth, methods))
    }
}

#[async_trait]
impl FileApi for CredentialManagedApi {
    fn profile(&self) -> &Profile {
        self.inner.profile()
    }

    async fn get_contents(
        &self,
        path: &str,
        opts: GetContentsOptions,
    ) -> RemoteResult<ContentsResponse> {
        let inner = &self.inner;
        self.auth
            .with_credential_management(&self.methods, inner.profile(), || {
                inner.get_contents(path, opts.clone())
            })
            .await
    }

    async fn upload_buffer_as_file(
        &self,
        data: &[u8],
        path: &str,
        opts: UploadOptions,
    ) -> RemoteResult<UploadResponse> {
        let inner = &self.inner;
        self.auth
            .with_credential_management(&self.methods, inner.profile(), || {
                inner.upload_buffer_as_file(data, path, opts.clone())
            })
            .await
    }

    async fn file_list(&self, path: &str) -> RemoteResult<Vec<RemoteItem>> {
        let inner = &self.inner;
        self.auth
            .with_credential_management(&self.methods, inner.profile(), || inner.file_list(path))
            .await
    }

    async fn delete(&self, path: &str, recursive: bool) -> RemoteResult<()> {
        let inner = &self.inner;
        self.auth
            .with_credential_management(&self.methods, inner.profile(), || {
                inner.delete(path, recursive)
            })
            .await
    }

    async fn rename(&self, old_path: &str, new_path: &str) -> RemoteResult<()> {
        let inner = &self.inner;
        self.auth
            .with_credential_management(&self.methods, inner.profile(), || {
                inner.rename(old_path, new_path)
            })
            .await
    }

    async fn move_entry(&self, old_path: &str, new_path: &str) -> RemoteResult<()> {
        let inner = &self.inner;
        self.auth
            .with_credential_management(&self.methods, inner.profile(), || {
                inner.move_entry(old_path, new_path)
            })
            .await
    }

    async fn create(&self, path: &str, kind: CreateKind) -> RemoteResult<()> {
        let inner = &self.inner;
        self.auth
            .with_credential_management(&self.methods, inner.profile(), || {
                inner.create(path, kind)
            })
            .await
    }
}
