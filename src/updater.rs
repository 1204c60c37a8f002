//! Incremental usage index updates.
//!
//! Reacts to content-tree change notifications and applies minimal add and
//! remove operations to the usage store. Handlers run synchronously within
//! the triggering mutation: each one completes (or fails with a reported
//! error) before that mutation is considered done. Store failures propagate
//! to the caller; unresolvable asset references are skipped per reference.

use crate::classify::PropertyClassifier;
use crate::content::{
    AssetRef, AssetResolver, ContentTreeReader, Node, PropertyValue, SchemaReader,
};
use crate::error::IndexError;
use crate::key::encode_usage_key;
use crate::store::{UsageMetadata, UsageStore};
use crate::types::AssetId;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

/// Content-tree change notifications consumed by the index.
///
/// The host wires its own event source (signals, pub/sub, direct calls) to
/// these methods. Delivery must be synchronous and at-least-once, with
/// `before_node_publishing` arriving before `after_node_publishing` for the
/// same publish. The index registers no listeners of its own.
pub trait ChangeListener {
    /// The asset itself was deleted; purge every usage record for it.
    fn asset_removed(&self, asset: &AssetRef) -> Result<(), IndexError>;

    /// A node was created (or first became visible to the index).
    fn node_added(&self, node: &Node) -> Result<(), IndexError>;

    /// A node was removed from its workspace.
    fn node_removed(&self, node: &Node) -> Result<(), IndexError>;

    /// A workspace-local change to the node was discarded.
    fn node_discarded(&self, node: &Node) -> Result<(), IndexError>;

    /// One property of a node changed value.
    fn node_property_changed(
        &self,
        node: &Node,
        property_name: &str,
        old_value: Option<&PropertyValue>,
        new_value: Option<&PropertyValue>,
    ) -> Result<(), IndexError>;

    /// A publish into `target_workspace` is about to move this node's
    /// content there, overwriting whatever the target currently holds.
    fn before_node_publishing(&self, node: &Node, target_workspace: &str)
        -> Result<(), IndexError>;

    /// The publish completed; `node` reflects the target location.
    fn after_node_publishing(&self, node: &Node) -> Result<(), IndexError>;
}

/// Event-driven index maintenance.
pub struct IncrementalUpdater {
    store: Arc<dyn UsageStore>,
    resolver: Arc<dyn AssetResolver>,
    schemas: Arc<dyn SchemaReader>,
    tree: Arc<dyn ContentTreeReader>,
    classifier: Arc<PropertyClassifier>,
}

impl IncrementalUpdater {
    pub fn new(
        store: Arc<dyn UsageStore>,
        resolver: Arc<dyn AssetResolver>,
        schemas: Arc<dyn SchemaReader>,
        tree: Arc<dyn ContentTreeReader>,
        classifier: Arc<PropertyClassifier>,
    ) -> Self {
        Self {
            store,
            resolver,
            schemas,
            tree,
            classifier,
        }
    }

    /// Asset-capable property names for the node's type. Unknown types have
    /// none.
    fn asset_properties(&self, node: &Node) -> Arc<BTreeSet<String>> {
        match self.schemas.node_type(&node.node_type) {
            Some(schema) => self.classifier.asset_property_names(&schema),
            None => Arc::new(BTreeSet::new()),
        }
    }

    fn metadata_for(node: &Node) -> UsageMetadata {
        UsageMetadata {
            node_identifier: node.identifier.clone(),
            workspace: node.workspace.clone(),
            dimensions: node.dimensions.clone(),
            node_type: node.node_type.clone(),
        }
    }

    /// Register one record per distinct resolved asset in `references` under
    /// the node's key. Duplicate references collapse through the store's
    /// upsert contract.
    fn register_references(
        &self,
        node: &Node,
        property_name: &str,
        references: &[AssetRef],
    ) -> Result<(), IndexError> {
        let usage_key = node.usage_key();
        for reference in references {
            let asset_id = match self.resolver.resolve_original(reference) {
                Ok(asset_id) => asset_id,
                Err(e) => {
                    warn!(
                        node = %node.identifier,
                        property = %property_name,
                        error = %e,
                        "skipping unresolvable asset reference"
                    );
                    continue;
                }
            };
            self.store
                .register(usage_key, &asset_id, Self::metadata_for(node))?;
            debug!(
                usage_key = %encode_usage_key(&usage_key),
                asset_id = %asset_id,
                node = %node.identifier,
                workspace = %node.workspace,
                "registered usage"
            );
        }
        Ok(())
    }

    /// Register every asset referenced by the node's asset-capable
    /// properties.
    fn register_node_usages(&self, node: &Node) -> Result<(), IndexError> {
        for property_name in self.asset_properties(node).iter() {
            let Some(value) = node.property(property_name) else {
                continue;
            };
            if value.is_empty() {
                continue;
            }
            self.register_references(node, property_name, value.references())?;
        }
        Ok(())
    }

    /// Unregister the given references under the node's key.
    ///
    /// When `changed_property` is set, the node is still live and only that
    /// property's values are going away: count references across the *other*
    /// asset-capable properties first and keep any record a sibling still
    /// justifies. When it is `None` the whole node location is going away
    /// and no counting is needed.
    fn unregister_references(
        &self,
        node: &Node,
        references: &[AssetRef],
        changed_property: Option<&str>,
    ) -> Result<(), IndexError> {
        let usage_key = node.usage_key();

        let sibling_counts = changed_property.and_then(|changed| {
            let properties = self.asset_properties(node);
            if properties.len() > 1 {
                Some(self.reference_counts(node, &properties, changed))
            } else {
                None
            }
        });

        for reference in references {
            let asset_id = match self.resolver.resolve_original(reference) {
                Ok(asset_id) => asset_id,
                Err(e) => {
                    warn!(
                        node = %node.identifier,
                        error = %e,
                        "skipping unresolvable asset reference during unregister"
                    );
                    continue;
                }
            };
            if let Some(counts) = &sibling_counts {
                if counts.get(&asset_id).copied().unwrap_or(0) > 0 {
                    debug!(
                        asset_id = %asset_id,
                        node = %node.identifier,
                        "sibling property still references asset, keeping usage"
                    );
                    continue;
                }
            }
            let removed = self.store.unregister(usage_key, &asset_id)?;
            if removed {
                debug!(
                    usage_key = %encode_usage_key(&usage_key),
                    asset_id = %asset_id,
                    node = %node.identifier,
                    "unregistered usage"
                );
            }
        }
        Ok(())
    }

    /// How often each asset is referenced across the node's asset-capable
    /// properties, excluding `exclude_property`.
    fn reference_counts(
        &self,
        node: &Node,
        properties: &BTreeSet<String>,
        exclude_property: &str,
    ) -> HashMap<AssetId, usize> {
        let mut counts = HashMap::new();
        for property_name in properties {
            if property_name == exclude_property {
                continue;
            }
            let Some(value) = node.property(property_name) else {
                continue;
            };
            for reference in value.references() {
                match self.resolver.resolve_original(reference) {
                    Ok(asset_id) => *counts.entry(asset_id).or_insert(0) += 1,
                    Err(e) => {
                        warn!(
                            node = %node.identifier,
                            property = %property_name,
                            error = %e,
                            "unresolvable asset reference ignored while counting siblings"
                        );
                    }
                }
            }
        }
        counts
    }

    /// Unregister every asset referenced by the node, without sibling
    /// counting. Used when the node location disappears entirely.
    fn unregister_node_usages(&self, node: &Node) -> Result<(), IndexError> {
        for property_name in self.asset_properties(node).iter() {
            let Some(value) = node.property(property_name) else {
                continue;
            };
            if value.is_empty() {
                continue;
            }
            self.unregister_references(node, value.references(), None)?;
        }
        Ok(())
    }
}

impl ChangeListener for IncrementalUpdater {
    fn asset_removed(&self, asset: &AssetRef) -> Result<(), IndexError> {
        let asset_id = match self.resolver.resolve_original(asset) {
            Ok(asset_id) => asset_id,
            Err(e) => {
                warn!(error = %e, "cannot resolve removed asset, leaving index untouched");
                return Ok(());
            }
        };
        let removed = self.store.unregister_all_by_asset(&asset_id)?;
        debug!(asset_id = %asset_id, removed, "purged usages for removed asset");
        Ok(())
    }

    fn node_added(&self, node: &Node) -> Result<(), IndexError> {
        self.register_node_usages(node)
    }

    fn node_removed(&self, node: &Node) -> Result<(), IndexError> {
        // The node is gone entirely; no sibling property can still hold any
        // of its references.
        self.unregister_node_usages(node)
    }

    fn node_discarded(&self, node: &Node) -> Result<(), IndexError> {
        self.node_removed(node)
    }

    fn node_property_changed(
        &self,
        node: &Node,
        property_name: &str,
        old_value: Option<&PropertyValue>,
        new_value: Option<&PropertyValue>,
    ) -> Result<(), IndexError> {
        if old_value == new_value {
            return Ok(());
        }
        if !self.asset_properties(node).contains(property_name) {
            return Ok(());
        }

        // Unregister before register so the sibling count never sees the
        // property's own old value.
        if let Some(old) = old_value {
            if !old.is_empty() {
                self.unregister_references(node, old.references(), Some(property_name))?;
            }
        }
        if let Some(new) = new_value {
            if !new.is_empty() {
                self.register_references(node, property_name, new.references())?;
            }
        }
        Ok(())
    }

    fn before_node_publishing(
        &self,
        node: &Node,
        target_workspace: &str,
    ) -> Result<(), IndexError> {
        // The publish overwrites whatever the target workspace holds for
        // this identifier/dimensions; its usages must go first so a
        // reference removed in the source cannot survive as a stale target
        // record. Both locations are re-registered by after_node_publishing,
        // so no sibling counting applies.
        if let Some(target) =
            self.tree
                .node_in_workspace(&node.identifier, target_workspace, &node.dimensions)
        {
            self.unregister_node_usages(&target)?;
        }
        self.unregister_node_usages(node)
    }

    fn after_node_publishing(&self, node: &Node) -> Result<(), IndexError> {
        if node.removed {
            debug!(node = %node.identifier, "skipping publish of removed node");
            return Ok(());
        }
        self.register_node_usages(node)
    }
}
