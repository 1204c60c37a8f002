//! Sled-backed usage store.
//!
//! Records live in a single sled tree keyed by the raw 16-byte usage key
//! followed by the asset id bytes; values are bincode-encoded metadata. The
//! fixed-width key prefix makes per-key lookups a prefix scan.

use super::{UsageMetadata, UsageRecord, UsageStore};
use crate::error::StoreError;
use crate::types::UsageKey;
use std::path::Path;

const USAGE_TREE: &str = "usages";

pub struct SledUsageStore {
    tree: sled::Tree,
}

impl SledUsageStore {
    /// Open (or create) a store at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let db = sled::open(path).map_err(backend)?;
        Self::from_db(&db)
    }

    /// Build a store on an already-open database, sharing it with other
    /// trees the host may keep in the same file.
    pub fn from_db(db: &sled::Db) -> Result<Self, StoreError> {
        let tree = db.open_tree(USAGE_TREE).map_err(backend)?;
        Ok(Self { tree })
    }

    /// Flush dirty pages to disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.tree.flush().map_err(backend)?;
        Ok(())
    }

    fn encode_key(usage_key: UsageKey, asset_id: &str) -> Vec<u8> {
        let mut key = Vec::with_capacity(usage_key.len() + asset_id.len());
        key.extend_from_slice(&usage_key);
        key.extend_from_slice(asset_id.as_bytes());
        key
    }

    fn decode_record(key_bytes: &[u8], value: &[u8]) -> Result<UsageRecord, StoreError> {
        if key_bytes.len() < 16 {
            return Err(StoreError::Decode(format!(
                "usage record key is {} bytes, expected at least 16",
                key_bytes.len()
            )));
        }
        let mut usage_key: UsageKey = [0u8; 16];
        usage_key.copy_from_slice(&key_bytes[..16]);
        let asset_id = std::str::from_utf8(&key_bytes[16..])
            .map_err(|e| StoreError::Decode(format!("asset id is not valid UTF-8: {}", e)))?
            .to_string();
        let metadata: UsageMetadata =
            bincode::deserialize(value).map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(UsageRecord {
            usage_key,
            asset_id,
            metadata,
        })
    }
}

fn backend(e: sled::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

impl UsageStore for SledUsageStore {
    fn register(
        &self,
        usage_key: UsageKey,
        asset_id: &str,
        metadata: UsageMetadata,
    ) -> Result<(), StoreError> {
        let value =
            bincode::serialize(&metadata).map_err(|e| StoreError::Encode(e.to_string()))?;
        self.tree
            .insert(Self::encode_key(usage_key, asset_id), value)
            .map_err(backend)?;
        Ok(())
    }

    fn unregister(&self, usage_key: UsageKey, asset_id: &str) -> Result<bool, StoreError> {
        let previous = self
            .tree
            .remove(Self::encode_key(usage_key, asset_id))
            .map_err(backend)?;
        Ok(previous.is_some())
    }

    fn unregister_all_by_asset(&self, asset_id: &str) -> Result<usize, StoreError> {
        let asset_bytes = asset_id.as_bytes();
        let mut matching_keys = Vec::new();
        for item in self.tree.iter() {
            let (key, _) = item.map_err(backend)?;
            if key.len() >= 16 && &key[16..] == asset_bytes {
                matching_keys.push(key);
            }
        }
        let removed = matching_keys.len();
        for key in matching_keys {
            self.tree.remove(key).map_err(backend)?;
        }
        Ok(removed)
    }

    fn list_all(&self) -> Result<Vec<UsageRecord>, StoreError> {
        let mut records = Vec::new();
        for item in self.tree.iter() {
            let (key, value) = item.map_err(backend)?;
            records.push(Self::decode_record(&key, &value)?);
        }
        Ok(records)
    }

    fn list_by_asset(&self, asset_id: &str) -> Result<Vec<UsageRecord>, StoreError> {
        let asset_bytes = asset_id.as_bytes();
        let mut records = Vec::new();
        for item in self.tree.iter() {
            let (key, value) = item.map_err(backend)?;
            if key.len() >= 16 && &key[16..] == asset_bytes {
                records.push(Self::decode_record(&key, &value)?);
            }
        }
        Ok(records)
    }

    fn exists(&self, usage_key: UsageKey, asset_id: &str) -> Result<bool, StoreError> {
        self.tree
            .contains_key(Self::encode_key(usage_key, asset_id))
            .map_err(backend)
    }

    fn count_by_key(&self, usage_key: UsageKey) -> Result<usize, StoreError> {
        let mut count = 0;
        for item in self.tree.scan_prefix(usage_key) {
            item.map_err(backend)?;
            count += 1;
        }
        Ok(count)
    }
}
