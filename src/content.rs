//! Read-only view of the content tree.
//!
//! The index never owns content. Hosts supply nodes, node-type schemas and
//! asset resolution through the interfaces in this module; the index only
//! reads them.

use crate::error::ResolveError;
use crate::key::derive_usage_key;
use crate::types::{AssetId, DimensionValues, UsageKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Declared type of a node property, reduced to the closed set the index
/// recognizes. Schema introspection maps whatever the host's type system
/// calls these onto one of the tags below; the index never pattern-matches
/// on raw type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PropertyType {
    /// A single concrete asset.
    SingleAsset,
    /// The asset supertype (any asset kind).
    AssetSupertype,
    /// An image.
    Image,
    /// An ordered collection of assets.
    AssetArray,
    /// Anything else; never indexed.
    Other,
}

impl PropertyType {
    /// Whether properties of this type can hold asset references.
    pub fn holds_assets(self) -> bool {
        !matches!(self, PropertyType::Other)
    }
}

/// Property schema of one node type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeTypeSchema {
    pub name: String,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyType>,
}

/// Raw asset reference as stored in a node property. May point at a variant;
/// resolve through [`AssetResolver`] before it reaches the usage store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetRef(pub String);

impl AssetRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }
}

/// Value of an asset-capable property: one reference or an ordered list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Single(AssetRef),
    Multiple(Vec<AssetRef>),
}

impl PropertyValue {
    /// The references held by this value, in property order.
    pub fn references(&self) -> &[AssetRef] {
        match self {
            PropertyValue::Single(reference) => std::slice::from_ref(reference),
            PropertyValue::Multiple(references) => references,
        }
    }

    /// An empty multi-valued property carries no references; it behaves like
    /// an absent property everywhere in the index.
    pub fn is_empty(&self) -> bool {
        self.references().is_empty()
    }
}

/// One content node as the index sees it: a single location in a single
/// workspace under one dimension combination. Several instances may share an
/// `identifier` across workspaces and dimensions; they represent the same
/// logical content in different contexts.
///
/// Only asset-capable properties need to be present in `properties`; the
/// classifier filters by schema before any lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub identifier: String,
    pub node_type: String,
    pub workspace: String,
    #[serde(default)]
    pub dimensions: DimensionValues,
    #[serde(default)]
    pub removed: bool,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
}

impl Node {
    /// The usage key of this node location.
    pub fn usage_key(&self) -> UsageKey {
        derive_usage_key(&self.identifier, &self.dimensions, &self.workspace)
    }

    /// Look up a property value by name.
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }
}

/// Resolves asset references to the identifier of their original asset.
///
/// Usage is always attributed to the original asset: a reference to a
/// derived rendition (variant) must resolve to the original's identifier.
pub trait AssetResolver: Send + Sync {
    fn resolve_original(&self, reference: &AssetRef) -> Result<AssetId, ResolveError>;
}

/// Resolves node-type names to their property schema.
pub trait SchemaReader: Send + Sync {
    /// Schema for `type_name`, or `None` when the type is unknown to the
    /// host. Callers treat `None` as "no asset-capable properties".
    fn node_type(&self, type_name: &str) -> Option<NodeTypeSchema>;
}

/// Read-only enumeration of the authoritative node set.
pub trait ContentTreeReader: Send + Sync {
    /// Number of nodes [`ContentTreeReader::nodes`] will yield, for progress
    /// reporting.
    fn node_count(&self) -> usize;

    /// Iterate every current node across all workspaces and dimensions.
    fn nodes(&self) -> Box<dyn Iterator<Item = Node> + '_>;

    /// Find the node with `identifier` in `workspace` under `dimensions`.
    /// Used to locate the node a publish is about to overwrite.
    fn node_in_workspace(
        &self,
        identifier: &str,
        workspace: &str,
        dimensions: &DimensionValues,
    ) -> Option<Node>;
}
