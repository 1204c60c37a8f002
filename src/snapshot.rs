//! Self-contained content-tree snapshots.
//!
//! A snapshot bundles node-type schemas, nodes and the variant-to-original
//! asset mapping into one serializable value, giving the reconciler and the
//! CLI a host-independent content source. Hosts with a live content
//! repository implement the traits in [`crate::content`] directly instead.

use crate::content::{
    AssetRef, AssetResolver, ContentTreeReader, Node, NodeTypeSchema, SchemaReader,
};
use crate::error::{IndexError, ResolveError};
use crate::types::{AssetId, DimensionValues};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentSnapshot {
    /// Schemas for every node type appearing in `nodes`.
    #[serde(default)]
    pub node_types: Vec<NodeTypeSchema>,

    /// Every current node location across workspaces and dimensions.
    #[serde(default)]
    pub nodes: Vec<Node>,

    /// Variant reference to original asset id. References absent from this
    /// map resolve to themselves (they already name an original).
    #[serde(default)]
    pub variants: BTreeMap<String, AssetId>,

    /// References known to be dangling; resolving one fails. Snapshots use
    /// this to represent variants whose original asset no longer exists.
    #[serde(default)]
    pub orphaned_variants: Vec<String>,
}

impl ContentSnapshot {
    /// Load a snapshot from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, IndexError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            IndexError::ContentTree(format!("cannot read snapshot {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            IndexError::ContentTree(format!("invalid snapshot {}: {}", path.display(), e))
        })
    }
}

impl SchemaReader for ContentSnapshot {
    fn node_type(&self, type_name: &str) -> Option<NodeTypeSchema> {
        self.node_types
            .iter()
            .find(|schema| schema.name == type_name)
            .cloned()
    }
}

impl AssetResolver for ContentSnapshot {
    fn resolve_original(&self, reference: &AssetRef) -> Result<AssetId, ResolveError> {
        if self.orphaned_variants.iter().any(|r| r == &reference.0) {
            return Err(ResolveError {
                reference: reference.0.clone(),
                message: "original asset no longer exists".to_string(),
            });
        }
        Ok(self
            .variants
            .get(&reference.0)
            .cloned()
            .unwrap_or_else(|| reference.0.clone()))
    }
}

impl ContentTreeReader for ContentSnapshot {
    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn nodes(&self) -> Box<dyn Iterator<Item = Node> + '_> {
        Box::new(self.nodes.iter().cloned())
    }

    fn node_in_workspace(
        &self,
        identifier: &str,
        workspace: &str,
        dimensions: &DimensionValues,
    ) -> Option<Node> {
        self.nodes
            .iter()
            .find(|node| {
                node.identifier == identifier
                    && node.workspace == workspace
                    && &node.dimensions == dimensions
            })
            .cloned()
    }
}
