//! Usage queries.
//!
//! Read-only lookups over the store, used by hosts to answer "where is this
//! asset used" and to guard asset deletion behind an in-use check.

use crate::error::IndexError;
use crate::store::{UsageRecord, UsageStore};
use std::sync::Arc;

pub struct UsageQuery {
    store: Arc<dyn UsageStore>,
}

impl UsageQuery {
    pub fn new(store: Arc<dyn UsageStore>) -> Self {
        Self { store }
    }

    /// Every recorded usage of `asset_id`, one per node location.
    pub fn usage_references(&self, asset_id: &str) -> Result<Vec<UsageRecord>, IndexError> {
        Ok(self.store.list_by_asset(asset_id)?)
    }

    /// Number of node locations referencing `asset_id`.
    pub fn usage_count(&self, asset_id: &str) -> Result<usize, IndexError> {
        Ok(self.store.list_by_asset(asset_id)?.len())
    }

    /// Whether any node location references `asset_id`.
    pub fn is_in_use(&self, asset_id: &str) -> Result<bool, IndexError> {
        Ok(!self.store.list_by_asset(asset_id)?.is_empty())
    }
}
