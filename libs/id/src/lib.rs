//! # tempest-id
//!
//! Typed identifiers and blob-key conventions shared by the tempest
//! coordinator and its supervisors.
//!
//! ## Design Principles
//!
//! - Job and node identifiers are opaque strings minted outside this
//!   workspace; we only validate that they are usable as coordination-tree
//!   child names
//! - Identifiers are typed so a `NodeId` cannot be passed where a `JobId`
//!   is expected
//! - Identifiers serialize as plain strings, so they can key JSON maps
//!
//! ## Blob keys
//!
//! Every job owns exactly three canonical blobs, named by suffix:
//!
//! - `{job}-stormjar.jar` (executable package)
//! - `{job}-stormcode.ser` (serialized job definition)
//! - `{job}-stormconf.ser` (serialized configuration)
//!
//! See [`TopologyBlob`].

mod blob;
mod error;
mod macros;
mod types;

pub use blob::{canonical_keys, TopologyBlob};
pub use error::IdError;
pub use types::*;
