//! Property classification.
//!
//! Determines, per node type, which declared properties can hold asset
//! references. Classification is pure schema introspection, so results are
//! memoized per type name for the lifetime of the process; type schemas are
//! assumed immutable during a run and the cache is never invalidated.

use crate::content::NodeTypeSchema;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Classifier with an owned per-type cache.
///
/// Both the incremental updater and the reconciler hold the same classifier
/// instance so they agree on what counts as asset-capable.
pub struct PropertyClassifier {
    cache: RwLock<HashMap<String, Arc<BTreeSet<String>>>>,
}

impl PropertyClassifier {
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Names of all asset-capable properties declared by `schema`.
    ///
    /// The first call per type name computes and caches the set; later calls
    /// return the cached value. Schemas with no asset-capable properties
    /// yield an empty set.
    pub fn asset_property_names(&self, schema: &NodeTypeSchema) -> Arc<BTreeSet<String>> {
        {
            let cache = self.cache.read();
            if let Some(names) = cache.get(&schema.name) {
                return Arc::clone(names);
            }
        }

        let names: BTreeSet<String> = schema
            .properties
            .iter()
            .filter(|(_, property_type)| property_type.holds_assets())
            .map(|(name, _)| name.clone())
            .collect();

        let mut cache = self.cache.write();
        // Another thread may have populated the entry between the read and
        // the write lock; keep whichever landed first.
        Arc::clone(
            cache
                .entry(schema.name.clone())
                .or_insert_with(|| Arc::new(names)),
        )
    }

    /// Number of node types classified so far.
    pub fn cached_types(&self) -> usize {
        self.cache.read().len()
    }
}

impl Default for PropertyClassifier {
    fn default() -> Self {
        Self::new()
    }
}
