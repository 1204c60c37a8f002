//! In-memory usage store.
//!
//! Map-backed implementation for tests and embedders that do not need
//! persistence. Iteration order is deterministic (key, then asset id).

use super::{UsageMetadata, UsageRecord, UsageStore};
use crate::error::StoreError;
use crate::types::{AssetId, UsageKey};
use parking_lot::RwLock;
use std::collections::BTreeMap;

#[derive(Default)]
pub struct MemoryUsageStore {
    records: RwLock<BTreeMap<(UsageKey, AssetId), UsageMetadata>>,
}

impl MemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

fn record(usage_key: UsageKey, asset_id: &str, metadata: UsageMetadata) -> UsageRecord {
    UsageRecord {
        usage_key,
        asset_id: asset_id.to_string(),
        metadata,
    }
}

impl UsageStore for MemoryUsageStore {
    fn register(
        &self,
        usage_key: UsageKey,
        asset_id: &str,
        metadata: UsageMetadata,
    ) -> Result<(), StoreError> {
        self.records
            .write()
            .insert((usage_key, asset_id.to_string()), metadata);
        Ok(())
    }

    fn unregister(&self, usage_key: UsageKey, asset_id: &str) -> Result<bool, StoreError> {
        Ok(self
            .records
            .write()
            .remove(&(usage_key, asset_id.to_string()))
            .is_some())
    }

    fn unregister_all_by_asset(&self, asset_id: &str) -> Result<usize, StoreError> {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|(_, recorded_asset), _| recorded_asset != asset_id);
        Ok(before - records.len())
    }

    fn list_all(&self) -> Result<Vec<UsageRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .iter()
            .map(|((key, asset_id), metadata)| record(*key, asset_id, metadata.clone()))
            .collect())
    }

    fn list_by_asset(&self, asset_id: &str) -> Result<Vec<UsageRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .iter()
            .filter(|((_, recorded_asset), _)| recorded_asset == asset_id)
            .map(|((key, recorded_asset), metadata)| {
                record(*key, recorded_asset, metadata.clone())
            })
            .collect())
    }

    fn exists(&self, usage_key: UsageKey, asset_id: &str) -> Result<bool, StoreError> {
        Ok(self
            .records
            .read()
            .contains_key(&(usage_key, asset_id.to_string())))
    }

    fn count_by_key(&self, usage_key: UsageKey) -> Result<usize, StoreError> {
        Ok(self
            .records
            .read()
            .range((usage_key, String::new())..)
            .take_while(|((key, _), _)| *key == usage_key)
            .count())
    }
}
