//! Full index reconciliation.
//!
//! Mark-and-sweep rebuild of the usage index against the authoritative
//! content tree: load every stored record as unconfirmed, scan all nodes
//! confirming (or adding) the usages they justify, then sweep whatever no
//! node confirmed. Safe to run on an empty store (acts as a full build) and
//! after crashes of earlier runs, since every step is an idempotent upsert
//! or delete.

use crate::classify::PropertyClassifier;
use crate::content::{AssetResolver, ContentTreeReader, Node, SchemaReader};
use crate::error::IndexError;
use crate::key::encode_usage_key;
use crate::store::{UsageMetadata, UsageStore};
use crate::types::{AssetId, UsageKey};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// One usage added or removed by a reconciliation run.
#[derive(Debug, Clone, Serialize)]
pub struct UsageChange {
    pub usage_key: String,
    pub asset_id: AssetId,
    pub node_identifier: String,
    pub workspace: String,
    pub node_type: String,
}

impl UsageChange {
    fn new(usage_key: UsageKey, asset_id: &str, metadata: &UsageMetadata) -> Self {
        Self {
            usage_key: encode_usage_key(&usage_key),
            asset_id: asset_id.to_string(),
            node_identifier: metadata.node_identifier.clone(),
            workspace: metadata.workspace.clone(),
            node_type: metadata.node_type.clone(),
        }
    }
}

/// A reference the scan could not resolve. The node's remaining references
/// are still processed; the row exists so operators can chase the dangling
/// reference afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct ScanError {
    pub node_identifier: String,
    pub workspace: String,
    pub property: String,
    pub reference: String,
    pub message: String,
}

/// Outcome of one reconciliation run.
#[derive(Debug, Default, Serialize)]
pub struct ReconcileReport {
    pub added: Vec<UsageChange>,
    pub removed: Vec<UsageChange>,
    pub errors: Vec<ScanError>,
    pub nodes_processed: usize,
    pub nodes_total: usize,
}

impl ReconcileReport {
    /// Whether the run changed the store at all.
    pub fn changed(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

/// Observer for long-running reconciliations.
pub trait ReconcileProgress {
    fn begin(&self, nodes_total: usize);
    fn node_scanned(&self, nodes_processed: usize, nodes_total: usize);
    fn finish(&self, report: &ReconcileReport);
}

/// Progress sink that reports nothing.
pub struct NoProgress;

impl ReconcileProgress for NoProgress {
    fn begin(&self, _nodes_total: usize) {}
    fn node_scanned(&self, _nodes_processed: usize, _nodes_total: usize) {}
    fn finish(&self, _report: &ReconcileReport) {}
}

type PairMap = BTreeMap<UsageKey, BTreeMap<AssetId, UsageMetadata>>;

pub struct Reconciler {
    store: Arc<dyn UsageStore>,
    resolver: Arc<dyn AssetResolver>,
    schemas: Arc<dyn SchemaReader>,
    classifier: Arc<PropertyClassifier>,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn UsageStore>,
        resolver: Arc<dyn AssetResolver>,
        schemas: Arc<dyn SchemaReader>,
        classifier: Arc<PropertyClassifier>,
    ) -> Self {
        Self {
            store,
            resolver,
            schemas,
            classifier,
        }
    }

    pub fn run(&self, tree: &dyn ContentTreeReader) -> Result<ReconcileReport, IndexError> {
        self.run_with_progress(tree, &NoProgress)
    }

    /// Reconcile the store against `tree`, reporting per-node progress.
    ///
    /// Store failures abort the run immediately; a partially applied run
    /// leaves the store no worse than before (only idempotent operations
    /// were applied) and the next run completes the work.
    pub fn run_with_progress(
        &self,
        tree: &dyn ContentTreeReader,
        progress: &dyn ReconcileProgress,
    ) -> Result<ReconcileReport, IndexError> {
        let mut report = ReconcileReport {
            nodes_total: tree.node_count(),
            ..Default::default()
        };
        progress.begin(report.nodes_total);

        // Mark: every stored pair starts out unconfirmed.
        let mut known: PairMap = BTreeMap::new();
        for record in self.store.list_all()? {
            known
                .entry(record.usage_key)
                .or_default()
                .insert(record.asset_id, record.metadata);
        }
        let mut unconfirmed = known.clone();
        info!(
            records = known.values().map(BTreeMap::len).sum::<usize>(),
            nodes = report.nodes_total,
            "reconciliation started"
        );

        // Scan: confirm or add the usages each node justifies.
        for node in tree.nodes() {
            self.scan_node(&node, &mut known, &mut unconfirmed, &mut report)?;
            report.nodes_processed += 1;
            progress.node_scanned(report.nodes_processed, report.nodes_total);
        }

        // Sweep: whatever stayed unconfirmed is no longer justified by any
        // node. Attribution comes from the stored metadata; the node it
        // described may be gone.
        for (usage_key, assets) in unconfirmed {
            for (asset_id, metadata) in assets {
                self.store.unregister(usage_key, &asset_id)?;
                report
                    .removed
                    .push(UsageChange::new(usage_key, &asset_id, &metadata));
            }
        }

        info!(
            added = report.added.len(),
            removed = report.removed.len(),
            errors = report.errors.len(),
            "reconciliation finished"
        );
        progress.finish(&report);
        Ok(report)
    }

    fn scan_node(
        &self,
        node: &Node,
        known: &mut PairMap,
        unconfirmed: &mut PairMap,
        report: &mut ReconcileReport,
    ) -> Result<(), IndexError> {
        if node.removed {
            debug!(node = %node.identifier, workspace = %node.workspace, "skipping removed node");
            return Ok(());
        }
        let Some(schema) = self.schemas.node_type(&node.node_type) else {
            debug!(
                node = %node.identifier,
                node_type = %node.node_type,
                "skipping node with unknown type"
            );
            return Ok(());
        };

        let usage_key = node.usage_key();
        for property_name in self.classifier.asset_property_names(&schema).iter() {
            let Some(value) = node.property(property_name) else {
                continue;
            };
            for reference in value.references() {
                let asset_id = match self.resolver.resolve_original(reference) {
                    Ok(asset_id) => asset_id,
                    Err(e) => {
                        report.errors.push(ScanError {
                            node_identifier: node.identifier.clone(),
                            workspace: node.workspace.clone(),
                            property: property_name.clone(),
                            reference: e.reference.clone(),
                            message: e.message.clone(),
                        });
                        continue;
                    }
                };

                if let Some(assets) = unconfirmed.get_mut(&usage_key) {
                    assets.remove(&asset_id);
                }
                if known
                    .get(&usage_key)
                    .is_some_and(|assets| assets.contains_key(&asset_id))
                {
                    continue;
                }

                let metadata = UsageMetadata {
                    node_identifier: node.identifier.clone(),
                    workspace: node.workspace.clone(),
                    dimensions: node.dimensions.clone(),
                    node_type: node.node_type.clone(),
                };
                self.store.register(usage_key, &asset_id, metadata.clone())?;
                report
                    .added
                    .push(UsageChange::new(usage_key, &asset_id, &metadata));
                // Later references to the same pair (another property of the
                // same node, or a duplicate list entry) must not produce a
                // second added row.
                known
                    .entry(usage_key)
                    .or_default()
                    .insert(asset_id, metadata);
            }
        }
        Ok(())
    }
}
