//! Core types for the asset usage index.

use std::collections::BTreeMap;

/// UsageKey: 128-bit hash identifying one node, in one workspace, under one
/// dimension combination.
pub type UsageKey = [u8; 16];

/// AssetId: stable identifier of an original asset. Variant identifiers are
/// resolved to their original before they reach the store.
pub type AssetId = String;

/// Dimension values of a node, e.g. `{"language": ["en", "de"]}`.
///
/// The ordered map gives dimension names a stable order, so serialization is
/// canonical regardless of construction order.
pub type DimensionValues = BTreeMap<String, Vec<String>>;
