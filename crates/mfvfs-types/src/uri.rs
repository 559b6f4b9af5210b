//! Resource URIs for the virtual filesystem.
//!
//! A resource URI has the shape `scheme:/{profile}/{remote path}?{query}`.
//! The first path segment names the profile; everything after it is the
//! path on the remote system. The query carries view flags such as
//! `conflict=true` (the remote side of a diff) or `inDiff=true` (the local
//! side).

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors parsing a resource URI.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UriError {
    /// No `scheme:` prefix.
    #[error("missing scheme: {0}")]
    MissingScheme(String),

    /// Path does not start with `/`.
    #[error("path must be absolute: {0}")]
    RelativePath(String),
}

/// A hierarchical resource identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResourceUri {
    scheme: String,
    path: String,
    query: Option<String>,
}

/// Profile and remote path derived from a URI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UriInfo {
    /// Name of the profile (first path segment), if any.
    pub profile_name: Option<String>,
    /// Path on the remote system, `/` for the profile root.
    pub remote_path: String,
    /// True when the URI points at the profile root itself.
    pub is_root: bool,
}

impl ResourceUri {
    /// Build a URI from a scheme and absolute path.
    pub fn new(scheme: impl Into<String>, path: impl Into<String>) -> Self {
        let path = path.into();
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };
        Self {
            scheme: scheme.into(),
            path,
            query: None,
        }
    }

    /// The URI scheme.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The full path, including the profile segment.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The raw query string, if any.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Same scheme and query, different path.
    pub fn with_path(&self, path: impl Into<String>) -> Self {
        let mut uri = Self::new(self.scheme.clone(), path);
        uri.query = self.query.clone();
        uri
    }

    /// Same scheme and path, different query.
    pub fn with_query(&self, query: Option<&str>) -> Self {
        Self {
            scheme: self.scheme.clone(),
            path: self.path.clone(),
            query: query.filter(|q| !q.is_empty()).map(str::to_string),
        }
    }

    /// Non-empty path segments. Double slashes are skipped.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('/').filter(|s| !s.is_empty())
    }

    /// Last non-empty segment, or `""` for the root.
    pub fn basename(&self) -> &str {
        self.segments().last().unwrap_or("")
    }

    /// The URI one level up (query dropped). The root is its own parent.
    pub fn parent(&self) -> Self {
        let segments: Vec<&str> = self.segments().collect();
        let parent = match segments.split_last() {
            Some((_, rest)) if !rest.is_empty() => format!("/{}", rest.join("/")),
            _ => "/".to_string(),
        };
        Self::new(self.scheme.clone(), parent)
    }

    /// Child URI with `name` appended (query dropped).
    pub fn join(&self, name: &str) -> Self {
        let base = self.path.trim_end_matches('/');
        Self::new(self.scheme.clone(), format!("{base}/{name}"))
    }

    /// True when the path has no segments.
    pub fn is_root(&self) -> bool {
        self.segments().next().is_none()
    }

    /// True when `key=true` (or a bare `key`) appears in the query.
    pub fn has_query_flag(&self, key: &str) -> bool {
        self.query_value(key)
            .map(|v| v.is_empty() || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    /// Value of `key` in the query, if present.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query.as_deref()?.split('&').find_map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (k == key).then_some(v)
        })
    }

    /// Split out the profile name and remote path.
    pub fn info(&self) -> UriInfo {
        let mut segments = self.segments();
        let profile_name = segments.next().map(str::to_string);
        let rest: Vec<&str> = segments.collect();
        let is_root = profile_name.is_some() && rest.is_empty();
        let remote_path = format!("/{}", rest.join("/"));
        UriInfo {
            profile_name,
            remote_path,
            is_root,
        }
    }
}

impl fmt::Display for ResourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scheme, self.path)?;
        if let Some(query) = &self.query {
            write!(f, "?{query}")?;
        }
        Ok(())
    }
}

impl FromStr for ResourceUri {
    type Err = UriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = s
            .split_once(':')
            .filter(|(scheme, _)| !scheme.is_empty())
            .ok_or_else(|| UriError::MissingScheme(s.to_string()))?;
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (rest, None),
        };
        if !path.starts_with('/') {
            return Err(UriError::RelativePath(s.to_string()));
        }
        Ok(Self::new(scheme, path).with_query(query))
    }
}
