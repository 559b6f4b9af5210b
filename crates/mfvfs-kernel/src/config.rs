//! Kernel configuration.
//!
//! Loaded from RON. Every field has a default, so a partial file (or none
//! at all) is valid:
//!
//! ```ron
//! (
//!     provider: (change_delay_ms: 10),
//!     auth: (refresh_on_unlock: false),
//! )
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::vfs::notify::{DEFAULT_CHANGE_DELAY, DEFAULT_EVENT_CAPACITY};

/// Button label offered for token-based re-authentication.
pub const LOGIN_LABEL: &str = "Log in to Authentication Service";

/// Button label offered for user/password re-authentication.
pub const UPDATE_CREDENTIALS_LABEL: &str = "Update Credentials";

/// Default lifetime of transient status-bar messages.
pub const DEFAULT_STATUS_TIMEOUT: Duration = Duration::from_millis(4000);

/// Top-level configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MfvfsConfig {
    pub provider: ProviderConfig,
    pub auth: AuthConfig,
}

/// Filesystem provider settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Quiet period before change events are delivered.
    pub change_delay_ms: u64,
    /// Broadcast buffer for change batches.
    pub event_capacity: usize,
    /// Lifetime of status-bar messages.
    pub status_timeout_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            change_delay_ms: DEFAULT_CHANGE_DELAY.as_millis() as u64,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            status_timeout_ms: DEFAULT_STATUS_TIMEOUT.as_millis() as u64,
        }
    }
}

impl ProviderConfig {
    pub fn change_delay(&self) -> Duration {
        Duration::from_millis(self.change_delay_ms)
    }

    pub fn status_timeout(&self) -> Duration {
        Duration::from_millis(self.status_timeout_ms)
    }
}

/// Auth handler settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Reload editors and workspaces after a successful re-authentication.
    pub refresh_on_unlock: bool,
    pub login_label: String,
    pub update_credentials_label: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            refresh_on_unlock: true,
            login_label: LOGIN_LABEL.to_string(),
            update_credentials_label: UPDATE_CREDENTIALS_LABEL.to_string(),
        }
    }
}

/// Error type for config loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

impl MfvfsConfig {
    /// Parse from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }

    /// Read and parse a RON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_ron_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }
}
