//! Usage key derivation.
//!
//! A usage key identifies "one node, in one workspace, under one dimension
//! combination". The incremental updater and the reconciler both derive keys
//! through this function, so the same node location always maps to the same
//! record no matter which path touched it.

use crate::types::{DimensionValues, UsageKey};

/// Compute the usage key for a node location.
///
/// Hashes `nodeIdentifier || serialized(dimensionValues) || workspaceName`
/// with blake3 and truncates to 128 bits. Dimension values serialize in map
/// key order, so semantically identical dimension sets yield the same key
/// regardless of construction order. Collisions are not handled; the key
/// width is chosen for realistic identifier and dimension cardinalities.
pub fn derive_usage_key(
    node_identifier: &str,
    dimension_values: &DimensionValues,
    workspace_name: &str,
) -> UsageKey {
    let mut hasher = blake3::Hasher::new();
    hasher.update(node_identifier.as_bytes());
    hasher.update(b"|");
    // String-keyed maps always serialize; the Result only exists for
    // serializers that can reject non-string keys.
    let serialized = serde_json::to_writer(&mut hasher, dimension_values);
    debug_assert!(serialized.is_ok());
    hasher.update(b"|");
    hasher.update(workspace_name.as_bytes());

    let mut key = [0u8; 16];
    key.copy_from_slice(&hasher.finalize().as_bytes()[..16]);
    key
}

/// Hex representation of a usage key, used for display and CLI input.
pub fn encode_usage_key(key: &UsageKey) -> String {
    hex::encode(key)
}

/// Parse a hex-encoded usage key. Returns `None` for anything that is not
/// exactly 32 hex digits.
pub fn decode_usage_key(input: &str) -> Option<UsageKey> {
    let bytes = hex::decode(input).ok()?;
    let mut key = [0u8; 16];
    if bytes.len() != key.len() {
        return None;
    }
    key.copy_from_slice(&bytes);
    Some(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn dims(entries: &[(&str, &[&str])]) -> DimensionValues {
        entries
            .iter()
            .map(|(name, values)| {
                (
                    name.to_string(),
                    values.iter().map(|v| v.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_same_inputs_same_key() {
        let dimensions = dims(&[("language", &["en"])]);
        let a = derive_usage_key("node-1", &dimensions, "live");
        let b = derive_usage_key("node-1", &dimensions, "live");
        assert_eq!(a, b);
    }

    #[test]
    fn test_insertion_order_does_not_matter() {
        let mut forward = DimensionValues::new();
        forward.insert("country".to_string(), vec!["de".to_string()]);
        forward.insert("language".to_string(), vec!["en".to_string()]);

        let mut reverse = DimensionValues::new();
        reverse.insert("language".to_string(), vec!["en".to_string()]);
        reverse.insert("country".to_string(), vec!["de".to_string()]);

        assert_eq!(
            derive_usage_key("node-1", &forward, "live"),
            derive_usage_key("node-1", &reverse, "live")
        );
    }

    #[test]
    fn test_distinct_locations_distinct_keys() {
        let empty = DimensionValues::new();
        let base = derive_usage_key("node-1", &empty, "live");
        assert_ne!(base, derive_usage_key("node-2", &empty, "live"));
        assert_ne!(base, derive_usage_key("node-1", &empty, "user-jane"));
        assert_ne!(
            base,
            derive_usage_key("node-1", &dims(&[("language", &["en"])]), "live")
        );
    }

    #[test]
    fn test_hex_round_trip() {
        let key = derive_usage_key("node-1", &DimensionValues::new(), "live");
        let encoded = encode_usage_key(&key);
        assert_eq!(encoded.len(), 32);
        assert_eq!(decode_usage_key(&encoded), Some(key));
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert_eq!(decode_usage_key("abc"), None);
        assert_eq!(decode_usage_key("zz".repeat(16).as_str()), None);
    }

    proptest! {
        #[test]
        fn prop_key_is_stable(
            identifier in "[a-z0-9-]{1,36}",
            workspace in "[a-z-]{1,20}",
            entries in proptest::collection::btree_map(
                "[a-z]{1,10}",
                proptest::collection::vec("[a-z]{1,5}", 0..3),
                0..4,
            ),
        ) {
            let dimensions: DimensionValues = entries;
            let first = derive_usage_key(&identifier, &dimensions, &workspace);
            let second = derive_usage_key(&identifier, &dimensions.clone(), &workspace);
            prop_assert_eq!(first, second);
        }
    }
}
