//! Reconciliation against drifted stores: missed events, stale records and
//! agreement with the incremental path.

use asset_usage::classify::PropertyClassifier;
use asset_usage::content::{
    AssetRef, AssetResolver, ContentTreeReader, Node, NodeTypeSchema, PropertyType, PropertyValue,
    SchemaReader,
};
use asset_usage::reconcile::Reconciler;
use asset_usage::snapshot::ContentSnapshot;
use asset_usage::store::memory::MemoryUsageStore;
use asset_usage::store::UsageStore;
use asset_usage::types::DimensionValues;
use asset_usage::updater::{ChangeListener, IncrementalUpdater};
use std::sync::Arc;

fn page_schema() -> NodeTypeSchema {
    NodeTypeSchema {
        name: "Page".to_string(),
        properties: [
            ("headline".to_string(), PropertyType::Other),
            ("heroImage".to_string(), PropertyType::Image),
            ("attachments".to_string(), PropertyType::AssetArray),
        ]
        .into_iter()
        .collect(),
    }
}

fn page(identifier: &str, workspace: &str, properties: &[(&str, PropertyValue)]) -> Node {
    Node {
        identifier: identifier.to_string(),
        node_type: "Page".to_string(),
        workspace: workspace.to_string(),
        dimensions: DimensionValues::new(),
        removed: false,
        properties: properties
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect(),
    }
}

fn single(asset: &str) -> PropertyValue {
    PropertyValue::Single(AssetRef::new(asset))
}

fn reconciler(store: &Arc<MemoryUsageStore>, content: &Arc<ContentSnapshot>) -> Reconciler {
    Reconciler::new(
        Arc::clone(store) as Arc<dyn UsageStore>,
        Arc::clone(content) as Arc<dyn AssetResolver>,
        Arc::clone(content) as Arc<dyn SchemaReader>,
        Arc::new(PropertyClassifier::new()),
    )
}

fn updater(store: &Arc<MemoryUsageStore>, content: &Arc<ContentSnapshot>) -> IncrementalUpdater {
    IncrementalUpdater::new(
        Arc::clone(store) as Arc<dyn UsageStore>,
        Arc::clone(content) as Arc<dyn AssetResolver>,
        Arc::clone(content) as Arc<dyn SchemaReader>,
        Arc::clone(content) as Arc<dyn ContentTreeReader>,
        Arc::new(PropertyClassifier::new()),
    )
}

#[test]
fn test_reconcile_repairs_missed_events() {
    // The index saw p1 being created but missed p2 entirely, and still
    // carries a record for a page that no longer exists.
    let p1 = page("p1", "live", &[("heroImage", single("a1"))]);
    let p2 = page("p2", "live", &[("heroImage", single("a2"))]);
    let ghost = page("ghost", "live", &[("heroImage", single("a9"))]);

    let content = Arc::new(ContentSnapshot {
        node_types: vec![page_schema()],
        nodes: vec![p1.clone(), p2.clone()],
        ..Default::default()
    });
    let store = Arc::new(MemoryUsageStore::new());

    let updater = updater(&store, &content);
    updater.node_added(&p1).unwrap();
    updater.node_added(&ghost).unwrap();

    let report = reconciler(&store, &content).run(content.as_ref()).unwrap();

    assert_eq!(report.added.len(), 1);
    assert_eq!(report.added[0].asset_id, "a2");
    assert_eq!(report.removed.len(), 1);
    assert_eq!(report.removed[0].node_identifier, "ghost");
    assert!(report.errors.is_empty());

    assert!(store.exists(p1.usage_key(), "a1").unwrap());
    assert!(store.exists(p2.usage_key(), "a2").unwrap());
    assert!(!store.exists(ghost.usage_key(), "a9").unwrap());
}

#[test]
fn test_incremental_and_reconcile_agree() {
    // Feeding all events incrementally and rebuilding from scratch must
    // produce identical stores.
    let nodes = vec![
        page("p1", "live", &[("heroImage", single("a1"))]),
        page(
            "p2",
            "live",
            &[
                ("heroImage", single("a1")),
                (
                    "attachments",
                    PropertyValue::Multiple(vec![AssetRef::new("a2"), AssetRef::new("a3")]),
                ),
            ],
        ),
        page("p3", "user-carol", &[("heroImage", single("a3"))]),
    ];
    let content = Arc::new(ContentSnapshot {
        node_types: vec![page_schema()],
        nodes: nodes.clone(),
        ..Default::default()
    });

    let incremental_store = Arc::new(MemoryUsageStore::new());
    let incremental = updater(&incremental_store, &content);
    for node in &nodes {
        incremental.node_added(node).unwrap();
    }

    let rebuilt_store = Arc::new(MemoryUsageStore::new());
    reconciler(&rebuilt_store, &content)
        .run(content.as_ref())
        .unwrap();

    let mut incremental_records = incremental_store.list_all().unwrap();
    let mut rebuilt_records = rebuilt_store.list_all().unwrap();
    incremental_records.sort_by(|a, b| (a.usage_key, &a.asset_id).cmp(&(b.usage_key, &b.asset_id)));
    rebuilt_records.sort_by(|a, b| (a.usage_key, &a.asset_id).cmp(&(b.usage_key, &b.asset_id)));
    assert_eq!(incremental_records, rebuilt_records);
}

#[test]
fn test_dangling_references_reported_not_fatal() {
    let content = Arc::new(ContentSnapshot {
        node_types: vec![page_schema()],
        nodes: vec![
            page("p1", "live", &[("heroImage", single("dangling-variant"))]),
            page("p2", "live", &[("heroImage", single("a1"))]),
        ],
        orphaned_variants: vec!["dangling-variant".to_string()],
        ..Default::default()
    });
    let store = Arc::new(MemoryUsageStore::new());

    let report = reconciler(&store, &content).run(content.as_ref()).unwrap();

    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].node_identifier, "p1");
    assert_eq!(report.nodes_processed, 2);
    assert_eq!(store.len(), 1);
}

#[test]
fn test_reconcile_from_snapshot_file() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "node_types": [
                {{"name": "Page", "properties": {{"heroImage": "image"}}}}
            ],
            "nodes": [
                {{
                    "identifier": "p1",
                    "node_type": "Page",
                    "workspace": "live",
                    "properties": {{"heroImage": "thumb-1"}}
                }}
            ],
            "variants": {{"thumb-1": "original-1"}}
        }}"#
    )
    .unwrap();

    let content = Arc::new(ContentSnapshot::from_file(file.path()).unwrap());
    let store = Arc::new(MemoryUsageStore::new());

    let report = reconciler(&store, &content).run(content.as_ref()).unwrap();

    assert_eq!(report.added.len(), 1);
    assert_eq!(report.added[0].asset_id, "original-1");
    assert_eq!(store.list_by_asset("original-1").unwrap().len(), 1);
}
