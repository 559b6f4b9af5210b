//! Profile locking and re-authentication prompts.

use std::sync::Arc;

use async_trait::async_trait;
use mfvfs_types::{Profile, ProfileRef};
use tracing::{debug, info, warn};

use super::mutex::MutexRegistry;
use crate::config::AuthConfig;
use crate::remote::AuthError;
use crate::surface::{MessageOptions, PromptSurface, ResourceRefresher, Severity, TreeProviders};

/// Secure property that marks token-based auth.
const TOKEN_VALUE_PROP: &str = "tokenValue";

/// Re-authentication callbacks supplied by the caller.
#[async_trait]
pub trait AuthMethods: Send + Sync {
    /// Log in to the authentication service for a profile.
    async fn sso_login(&self, profile_name: &str) -> bool;

    /// Ask for new credentials. Returns the profile with them applied, or
    /// `None` if the user cancelled.
    async fn prompt_credentials(&self, profile: &ProfileRef, re_prompt: bool) -> Option<Profile>;
}

/// How to prompt when re-authentication is needed.
#[derive(Clone)]
pub struct AuthPromptOpts {
    pub methods: Arc<dyn AuthMethods>,
    /// The profile authenticates with a token, whatever the error says.
    pub is_using_token_auth: bool,
    /// Message to show instead of the raw error.
    pub error_correlation: Option<String>,
}

impl AuthPromptOpts {
    pub fn new(methods: Arc<dyn AuthMethods>) -> Self {
        Self {
            methods,
            is_using_token_auth: false,
            error_correlation: None,
        }
    }

    pub fn token_auth(mut self, is_using_token_auth: bool) -> Self {
        self.is_using_token_auth = is_using_token_auth;
        self
    }

    pub fn with_correlation(mut self, message: impl Into<String>) -> Self {
        self.error_correlation = Some(message.into());
        self
    }
}

/// Whether a profile authenticates with a token rather than user/password.
///
/// A profile that stores both user and password is basic-auth regardless of
/// any token. Otherwise its own `tokenValue`, then the base profile's,
/// decides.
pub fn is_using_token_auth(secure: &[String], base_secure: Option<&[String]>) -> bool {
    let has = |props: &[String], name: &str| props.iter().any(|p| p == name);
    let uses_basic = has(secure, "user") && has(secure, "password");
    if uses_basic {
        return false;
    }
    if has(secure, TOKEN_VALUE_PROP) {
        return true;
    }
    base_secure.is_some_and(|base| has(base, TOKEN_VALUE_PROP))
}

/// Serializes re-authentication per profile.
///
/// Operations that hit an auth failure lock the profile before prompting;
/// a second operation on the same profile waits on the lock instead of
/// prompting again, and proceeds with the refreshed credentials once the
/// first one unlocks.
pub struct AuthHandler {
    registry: Arc<MutexRegistry>,
    prompts: Arc<dyn PromptSurface>,
    refresher: Arc<dyn ResourceRefresher>,
    trees: Arc<dyn TreeProviders>,
    config: AuthConfig,
}

impl AuthHandler {
    pub fn new(
        registry: Arc<MutexRegistry>,
        prompts: Arc<dyn PromptSurface>,
        refresher: Arc<dyn ResourceRefresher>,
        trees: Arc<dyn TreeProviders>,
        config: AuthConfig,
    ) -> Self {
        Self {
            registry,
            prompts,
            refresher,
            trees,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<MutexRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Lock a profile, waiting for any current holder to finish.
    ///
    /// With an error and prompt options, the user is asked to
    /// re-authenticate; a successful prompt unlocks the profile again, a
    /// failed one releases the lock here.
    ///
    /// The result only says the lock was acquired. It does **not** mean the
    /// profile's credentials are now valid; check the outcome of the retried
    /// operation for that. False means the lock was closed.
    #[tracing::instrument(skip_all, fields(profile = tracing::field::Empty))]
    pub async fn lock_profile(
        &self,
        profile: impl Into<ProfileRef>,
        error: Option<&AuthError>,
        opts: Option<&AuthPromptOpts>,
    ) -> bool {
        let profile = profile.into();
        tracing::Span::current().record("profile", profile.name());
        let mutex = self.registry.get_or_create(profile.name());
        if !mutex.acquire().await {
            warn!("profile lock closed");
            return false;
        }
        debug!("profile locked");

        if let (Some(error), Some(opts)) = (error, opts) {
            if !self.prompt_for_authentication(error, &profile, opts).await {
                mutex.release();
                warn!("re-authentication failed, lock released");
            }
        }
        true
    }

    /// Release a profile's lock if it is held.
    ///
    /// With `refresh_resources`, open editors and workspaces for the profile
    /// are reloaded in the background. Returns whether a release happened.
    pub fn unlock_profile(&self, profile: impl Into<ProfileRef>, refresh_resources: bool) -> bool {
        let profile = profile.into();
        let Some(mutex) = self.registry.get(profile.name()) else {
            return false;
        };
        if !mutex.release() {
            return false;
        }
        debug!(profile = %profile, "profile unlocked");
        if refresh_resources {
            self.spawn_refresh(profile.name().to_string());
        }
        true
    }

    /// True while the profile's lock is held. Never-locked profiles are not.
    ///
    /// The lock is also held for the whole of every call made through
    /// [`AuthHandler::with_credential_management`], so `true` can mean a
    /// managed call is in flight rather than that the profile needs
    /// re-authentication.
    pub fn is_locked(&self, profile_name: &str) -> bool {
        self.registry
            .get(profile_name)
            .is_some_and(|m| m.is_locked())
    }

    /// Wait until whoever holds the profile's lock lets go.
    pub async fn wait_if_locked(&self, profile_name: &str) {
        let Some(mutex) = self.registry.get(profile_name) else {
            return;
        };
        if mutex.is_locked() && mutex.acquire().await {
            mutex.release();
        }
    }

    /// Ask the user to re-authenticate a profile.
    ///
    /// Token failures (or token-auth profiles) offer an SSO login; anything
    /// else offers to update credentials, and new credentials are pushed to
    /// every tree view showing the profile. Success unlocks the profile.
    /// Failure leaves the lock as it was.
    #[tracing::instrument(skip_all, fields(profile = tracing::field::Empty, kind = %error.kind))]
    pub async fn prompt_for_authentication(
        &self,
        error: &AuthError,
        profile: impl Into<ProfileRef>,
        opts: &AuthPromptOpts,
    ) -> bool {
        let profile = profile.into();
        tracing::Span::current().record("profile", profile.name());
        let message = opts
            .error_correlation
            .clone()
            .unwrap_or_else(|| error.message.clone());

        if error.is_token_expired() || opts.is_using_token_auth {
            let label = self.config.login_label.clone();
            let choice = self
                .prompts
                .show_message(&message, MessageOptions::with_items([label.clone()]).modal())
                .await;
            if choice.as_deref() != Some(label.as_str()) {
                debug!("login declined");
                return false;
            }
            if !opts.methods.sso_login(profile.name()).await {
                warn!("SSO login failed");
                return false;
            }
            info!("SSO login succeeded");
            self.unlock_profile(&profile, self.config.refresh_on_unlock);
            return true;
        }

        let label = self.config.update_credentials_label.clone();
        let choice = self
            .prompts
            .show_message(
                &message,
                MessageOptions::with_items([label.clone()])
                    .modal()
                    .severity(Severity::Error),
            )
            .await;
        if choice.as_deref() != Some(label.as_str()) {
            debug!("credential update declined");
            return false;
        }
        let Some(updated) = opts.methods.prompt_credentials(&profile, true).await else {
            debug!("no credentials entered");
            return false;
        };

        for tree in self.trees.providers() {
            if tree.set_profile_to_choice(&updated).await {
                debug!(tree = %tree.kind(), "propagated credentials to tree");
            }
        }
        info!("credentials updated");
        self.unlock_profile(&profile, self.config.refresh_on_unlock);
        true
    }

    fn spawn_refresh(&self, profile_name: String) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(profile = %profile_name, "no runtime, skipping resource refresh");
            return;
        };
        let refresher = Arc::clone(&self.refresher);
        handle.spawn(async move {
            if let Err(e) = refresher.reload_active_editor_for_profile(&profile_name).await {
                warn!(error = %e, "editor refresh failed");
            }
            if let Err(e) = refresher.reload_workspaces_for_profile(&profile_name).await {
                warn!(error = %e, "workspace refresh failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_token_auth_from_own_props() {
        assert!(is_using_token_auth(&props(&["tokenValue"]), None));
        assert!(!is_using_token_auth(&props(&["user", "password"]), None));
        assert!(!is_using_token_auth(
            &props(&["user", "password", "tokenValue"]),
            None
        ));
        assert!(!is_using_token_auth(&props(&[]), None));
    }

    #[test]
    fn test_token_auth_from_base_profile() {
        let base = props(&["tokenValue"]);
        assert!(is_using_token_auth(&props(&["user"]), Some(&base)));
        assert!(!is_using_token_auth(&props(&["user", "password"]), Some(&base)));
        assert!(!is_using_token_auth(&props(&[]), Some(&props(&["user"]))));
    }
}
