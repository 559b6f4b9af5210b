//! Per-profile authentication coordination.
//!
//! - [`ProfileMutex`] / [`MutexRegistry`] - one FIFO lock per profile name
//! - [`AuthHandler`] - lock, prompt, unlock and refresh
//! - [`CredentialManagedApi`] - wraps a file API with lock + retry-once

mod credential;
mod handler;
mod mutex;

pub use credential::CredentialManagedApi;
pub use handler::{AuthHandler, AuthMethods, AuthPromptOpts, is_using_token_auth};
pub use mutex::{MutexRegistry, ProfileMutex};
