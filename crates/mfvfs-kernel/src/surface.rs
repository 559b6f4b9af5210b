//! Host-facing collaborator interfaces.
//!
//! The kernel asks the host to show prompts, manage editor tabs, reload
//! resources and update tree views. Each concern is a small trait so tests
//! can substitute recording fakes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mfvfs_types::{Profile, ResourceUri};
use thiserror::Error;

/// Failure reported by a host surface.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SurfaceError {
    /// The editor could not perform the request.
    #[error("editor: {0}")]
    Editor(String),

    /// The surface is gone (window closed, host shutting down).
    #[error("surface unavailable")]
    Unavailable,
}

/// Failure while reloading resources after re-authentication.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RefreshError {
    #[error("reloading editors for {profile}: {reason}")]
    Editors { profile: String, reason: String },

    #[error("reloading workspaces for {profile}: {reason}")]
    Workspaces { profile: String, reason: String },
}

/// How a message should be presented.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Error,
}

/// Options for [`PromptSurface::show_message`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageOptions {
    /// Button labels, in display order.
    pub items: Vec<String>,
    /// Block the host until answered.
    pub modal: bool,
    pub severity: Severity,
}

impl MessageOptions {
    /// Non-modal message with the given buttons.
    pub fn with_items<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            items: items.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn modal(mut self) -> Self {
        self.modal = true;
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

/// Options for [`PromptSurface::show_input_box`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InputBoxOptions {
    pub prompt: String,
    pub value: Option<String>,
    pub password: bool,
}

/// Interactive prompts.
#[async_trait]
pub trait PromptSurface: Send + Sync {
    /// Show a message; resolves to the chosen button label, `None` if dismissed.
    async fn show_message(&self, text: &str, opts: MessageOptions) -> Option<String>;

    /// Ask for free text.
    async fn show_input_box(&self, _opts: InputBoxOptions) -> Option<String> {
        None
    }

    /// Ask the user to pick one item.
    async fn show_quick_pick(&self, _items: Vec<String>) -> Option<String> {
        None
    }

    /// Open a side-by-side diff of two resources.
    async fn show_diff(
        &self,
        left: &ResourceUri,
        right: &ResourceUri,
        title: &str,
    ) -> Result<(), SurfaceError>;

    /// Show a transient status-bar message.
    fn set_status_bar_message(&self, text: &str, timeout: Duration);
}

/// An open editor tab.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TabInfo {
    pub uri: ResourceUri,
    pub view_column: Option<u32>,
    pub is_dirty: bool,
}

/// Editor tab management.
#[async_trait]
pub trait EditorSurface: Send + Sync {
    /// Currently open tabs.
    fn open_tabs(&self) -> Vec<TabInfo>;

    async fn close_tab(&self, tab: &TabInfo) -> Result<(), SurfaceError>;

    /// Open a resource, optionally in a specific column.
    async fn open_with(
        &self,
        uri: &ResourceUri,
        view_column: Option<u32>,
    ) -> Result<(), SurfaceError>;

    /// Discard unsaved changes in the active editor.
    async fn revert_active(&self) -> Result<(), SurfaceError>;

    async fn close_active_editor(&self) -> Result<(), SurfaceError>;
}

/// Reloads host resources after a profile's credentials change.
#[async_trait]
pub trait ResourceRefresher: Send + Sync {
    /// Reload open editors backed by the profile.
    async fn reload_active_editor_for_profile(&self, profile_name: &str)
    -> Result<(), RefreshError>;

    /// Reload workspace folders backed by the profile.
    async fn reload_workspaces_for_profile(&self, profile_name: &str) -> Result<(), RefreshError>;
}

/// Which tree view a provider drives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum TreeKind {
    Ds,
    Uss,
    Job,
}

/// A tree view that shows profile nodes.
#[async_trait]
pub trait ProfileTree: Send + Sync {
    fn kind(&self) -> TreeKind;

    /// Replace the profile on the node with a matching name.
    ///
    /// Returns false when the tree has no such node.
    async fn set_profile_to_choice(&self, profile: &Profile) -> bool;
}

/// All tree views, in the order they should be updated.
pub trait TreeProviders: Send + Sync {
    fn providers(&self) -> Vec<Arc<dyn ProfileTree>>;
}
