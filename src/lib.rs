//! Asset Usage Index
//!
//! Maintains a secondary index mapping binary assets to the content-tree
//! locations that reference them, across workspaces and dimension
//! combinations. An incremental updater keeps the index in step with
//! individual node changes; a full reconciler rebuilds it from the
//! authoritative node set when drift is suspected.

pub mod classify;
pub mod cli;
pub mod config;
pub mod content;
pub mod error;
pub mod format;
pub mod key;
pub mod logging;
pub mod query;
pub mod reconcile;
pub mod snapshot;
pub mod store;
pub mod types;
pub mod updater;
