//! Remote profile types.
//!
//! A `Profile` describes one remote system connection: where it lives, what
//! API type serves it, and which credentials it carries. Everything that locks,
//! prompts or propagates credentials keys on the profile *name*; a
//! [`ProfileRef`] is the value those call sites accept, built from either a
//! bare name or a loaded profile.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A loaded remote profile.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Unique profile name, e.g. "lpar.zosmf".
    pub name: String,
    /// API type serving this profile, e.g. "zosmf".
    #[serde(rename = "type")]
    pub profile_type: String,
    /// Remote host.
    #[serde(default)]
    pub host: Option<String>,
    /// Remote port.
    #[serde(default)]
    pub port: Option<u16>,
    /// Basic-auth user.
    #[serde(default)]
    pub user: Option<String>,
    /// Basic-auth password.
    #[serde(default)]
    pub password: Option<String>,
    /// Session token (SSO login).
    #[serde(default)]
    pub token_value: Option<String>,
    /// Codepage used when transferring text.
    #[serde(default)]
    pub encoding: Option<String>,
    /// Remote response timeout in seconds.
    #[serde(default)]
    pub response_timeout: Option<u32>,
    /// Names of properties stored in the secure vault ("user", "tokenValue", ...).
    #[serde(default)]
    pub secure: Vec<String>,
}

impl Profile {
    /// Create a profile with only a name and API type.
    pub fn new(name: impl Into<String>, profile_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            profile_type: profile_type.into(),
            host: None,
            port: None,
            user: None,
            password: None,
            token_value: None,
            encoding: None,
            response_timeout: None,
            secure: Vec::new(),
        }
    }

    /// Set basic-auth credentials.
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    /// Set the session token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token_value = Some(token.into());
        self
    }

    /// Mark properties as vault-backed.
    pub fn with_secure(mut self, props: &[&str]) -> Self {
        self.secure = props.iter().map(|p| p.to_string()).collect();
        self
    }
}

// Credentials stay out of logs.
impl fmt::Debug for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Profile")
            .field("name", &self.name)
            .field("profile_type", &self.profile_type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("token_value", &self.token_value.as_ref().map(|_| "<redacted>"))
            .field("secure", &self.secure)
            .finish()
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.profile_type)
    }
}

/// Reference to a profile by name, optionally carrying the loaded profile.
///
/// Lock and prompt entry points accept `impl Into<ProfileRef>`, so a bare
/// `"lpar.zosmf"` and a full [`Profile`] both work. Only credential
/// propagation needs the loaded profile; everything else uses the name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProfileRef {
    name: String,
    loaded: Option<Profile>,
}

impl ProfileRef {
    /// Reference a profile by name only.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            loaded: None,
        }
    }

    /// The profile name (the lock key).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The loaded profile, when one was supplied.
    pub fn loaded(&self) -> Option<&Profile> {
        self.loaded.as_ref()
    }
}

impl fmt::Display for ProfileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<&str> for ProfileRef {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl From<String> for ProfileRef {
    fn from(name: String) -> Self {
        Self::named(name)
    }
}

impl From<&String> for ProfileRef {
    fn from(name: &String) -> Self {
        Self::named(name.clone())
    }
}

impl From<Profile> for ProfileRef {
    fn from(profile: Profile) -> Self {
        Self {
            name: profile.name.clone(),
            loaded: Some(profile),
        }
    }
}

impl From<&Profile> for ProfileRef {
    fn from(profile: &Profile) -> Self {
        Self::from(profile.clone())
    }
}

impl From<&ProfileRef> for ProfileRef {
    fn from(profile: &ProfileRef) -> Self {
        profile.clone()
    }
}
