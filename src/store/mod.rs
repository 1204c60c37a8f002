//! Usage record store.
//!
//! Persists the fact that a usage key references an asset. The index treats
//! the store as a collaborator with an idempotent upsert/delete contract;
//! implementations keep at most one record per `(usage key, asset id)` pair
//! and must support one concurrent writer per key.

pub mod memory;
pub mod persistence;

use crate::error::StoreError;
use crate::types::{AssetId, DimensionValues, UsageKey};
use serde::{Deserialize, Serialize};

/// Metadata payload stored with every usage record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub node_identifier: String,
    pub workspace: String,
    pub dimensions: DimensionValues,
    pub node_type: String,
}

/// One persisted usage: `usage_key` references `asset_id`.
///
/// A node location referencing the same asset through several properties
/// collapses into this single record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub usage_key: UsageKey,
    pub asset_id: AssetId,
    pub metadata: UsageMetadata,
}

/// Usage store contract.
pub trait UsageStore: Send + Sync {
    /// Idempotent upsert. Overwrites the metadata when the pair exists.
    fn register(
        &self,
        usage_key: UsageKey,
        asset_id: &str,
        metadata: UsageMetadata,
    ) -> Result<(), StoreError>;

    /// Idempotent delete. Returns whether a record was actually removed;
    /// unregistering an absent pair is a no-op, not an error.
    fn unregister(&self, usage_key: UsageKey, asset_id: &str) -> Result<bool, StoreError>;

    /// Remove every record for `asset_id` regardless of key. Returns the
    /// number of records removed. Used when the asset itself is deleted.
    fn unregister_all_by_asset(&self, asset_id: &str) -> Result<usize, StoreError>;

    /// Point-in-time snapshot of all records.
    fn list_all(&self) -> Result<Vec<UsageRecord>, StoreError>;

    /// All records for one asset.
    fn list_by_asset(&self, asset_id: &str) -> Result<Vec<UsageRecord>, StoreError>;

    /// Whether the pair is currently recorded.
    fn exists(&self, usage_key: UsageKey, asset_id: &str) -> Result<bool, StoreError>;

    /// Number of assets recorded under one usage key.
    fn count_by_key(&self, usage_key: UsageKey) -> Result<usize, StoreError>;
}
