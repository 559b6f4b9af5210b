//! Shared identity types for mfvfs.
//!
//! This crate is the leaf of the workspace: remote profiles, the references
//! the auth layer passes around, resource URIs the editor surface speaks, and
//! the arena IDs of the entry tree. It has **no internal mfvfs dependencies**.
//!
//! # Key Types
//!
//! |-------------------|----------------------------------------------------|
//! | Type              | Purpose                                            |
//! |-------------------|----------------------------------------------------|
//! | [`Profile`]       | A loaded remote profile (host, credentials, type)  |
//! | [`ProfileRef`]    | Bare profile name, optionally carrying the profile |
//! | [`ResourceUri`]   | `scheme:/{profile}/{remote path}?query`            |
//! | [`UriInfo`]       | Profile name + remote path split out of a URI      |
//! | [`EntryId`]       | Slot of an entry in the in-memory tree arena       |
//! |-------------------|----------------------------------------------------|

pub mod ids;
pub mod profile;
pub mod uri;

pub use ids::EntryId;
pub use profile::{Profile, ProfileRef};
pub use uri::{ResourceUri, UriError, UriInfo};
