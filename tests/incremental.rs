//! End-to-end exercise of the incremental updater over a persistent store:
//! a node's lifecycle from creation through editing, publishing and asset
//! deletion, with the index checked at every step.

use asset_usage::classify::PropertyClassifier;
use asset_usage::content::{
    AssetRef, AssetResolver, ContentTreeReader, Node, NodeTypeSchema, PropertyType, PropertyValue,
    SchemaReader,
};
use asset_usage::snapshot::ContentSnapshot;
use asset_usage::store::persistence::SledUsageStore;
use asset_usage::store::UsageStore;
use asset_usage::types::DimensionValues;
use asset_usage::updater::{ChangeListener, IncrementalUpdater};
use std::sync::Arc;

fn document_schema() -> NodeTypeSchema {
    NodeTypeSchema {
        name: "Document".to_string(),
        properties: [
            ("title".to_string(), PropertyType::Other),
            ("teaserImage".to_string(), PropertyType::Image),
            ("downloads".to_string(), PropertyType::AssetArray),
        ]
        .into_iter()
        .collect(),
    }
}

fn document(identifier: &str, workspace: &str) -> Node {
    Node {
        identifier: identifier.to_string(),
        node_type: "Document".to_string(),
        workspace: workspace.to_string(),
        dimensions: DimensionValues::new(),
        removed: false,
        properties: Default::default(),
    }
}

fn single(asset: &str) -> PropertyValue {
    PropertyValue::Single(AssetRef::new(asset))
}

fn multiple(assets: &[&str]) -> PropertyValue {
    PropertyValue::Multiple(assets.iter().map(|asset| AssetRef::new(*asset)).collect())
}

struct World {
    _dir: tempfile::TempDir,
    store: Arc<SledUsageStore>,
    updater: IncrementalUpdater,
}

fn world(content: ContentSnapshot) -> World {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SledUsageStore::open(dir.path()).unwrap());
    let content = Arc::new(content);
    let updater = IncrementalUpdater::new(
        Arc::clone(&store) as Arc<dyn UsageStore>,
        Arc::clone(&content) as Arc<dyn AssetResolver>,
        Arc::clone(&content) as Arc<dyn SchemaReader>,
        content as Arc<dyn ContentTreeReader>,
        Arc::new(PropertyClassifier::new()),
    );
    World {
        _dir: dir,
        store,
        updater,
    }
}

#[test]
fn test_document_lifecycle() {
    let w = world(ContentSnapshot {
        node_types: vec![document_schema()],
        ..Default::default()
    });

    // Author creates a document in their workspace.
    let mut doc = document("doc-1", "user-alice");
    doc.properties
        .insert("teaserImage".to_string(), single("hero.jpg"));
    doc.properties
        .insert("downloads".to_string(), multiple(&["brochure.pdf", "specs.pdf"]));
    w.updater.node_added(&doc).unwrap();

    let key = doc.usage_key();
    assert!(w.store.exists(key, "hero.jpg").unwrap());
    assert!(w.store.exists(key, "brochure.pdf").unwrap());
    assert!(w.store.exists(key, "specs.pdf").unwrap());
    assert_eq!(w.store.count_by_key(key).unwrap(), 3);

    // One download is dropped from the list.
    let mut edited = doc.clone();
    edited
        .properties
        .insert("downloads".to_string(), multiple(&["brochure.pdf"]));
    w.updater
        .node_property_changed(
            &edited,
            "downloads",
            Some(&multiple(&["brochure.pdf", "specs.pdf"])),
            Some(&multiple(&["brochure.pdf"])),
        )
        .unwrap();
    assert!(!w.store.exists(key, "specs.pdf").unwrap());
    assert!(w.store.exists(key, "brochure.pdf").unwrap());

    // Publish to live: the source records move to the target location.
    w.updater.before_node_publishing(&edited, "live").unwrap();
    let mut published = edited.clone();
    published.workspace = "live".to_string();
    w.updater.after_node_publishing(&published).unwrap();

    assert_eq!(w.store.count_by_key(key).unwrap(), 0);
    let live_key = published.usage_key();
    assert!(w.store.exists(live_key, "hero.jpg").unwrap());
    assert!(w.store.exists(live_key, "brochure.pdf").unwrap());

    // The brochure asset is deleted from the media library.
    w.updater
        .asset_removed(&AssetRef::new("brochure.pdf"))
        .unwrap();
    assert!(!w.store.exists(live_key, "brochure.pdf").unwrap());
    assert!(w.store.exists(live_key, "hero.jpg").unwrap());

    // Finally the document itself is removed.
    w.updater.node_removed(&published).unwrap();
    assert_eq!(w.store.list_all().unwrap().len(), 0);
}

#[test]
fn test_dimension_variants_are_independent_locations() {
    let w = world(ContentSnapshot {
        node_types: vec![document_schema()],
        ..Default::default()
    });

    let mut english = document("doc-1", "live");
    english
        .dimensions
        .insert("language".to_string(), vec!["en".to_string()]);
    english
        .properties
        .insert("teaserImage".to_string(), single("hero-en.jpg"));

    let mut german = english.clone();
    german
        .dimensions
        .insert("language".to_string(), vec!["de".to_string()]);
    german
        .properties
        .insert("teaserImage".to_string(), single("hero-de.jpg"));

    w.updater.node_added(&english).unwrap();
    w.updater.node_added(&german).unwrap();
    assert_ne!(english.usage_key(), german.usage_key());
    assert_eq!(w.store.list_all().unwrap().len(), 2);

    // Removing one translation leaves the other untouched.
    w.updater.node_removed(&german).unwrap();
    assert!(w.store.exists(english.usage_key(), "hero-en.jpg").unwrap());
    assert!(!w.store.exists(german.usage_key(), "hero-de.jpg").unwrap());
}

#[test]
fn test_discard_in_user_workspace_keeps_live_intact() {
    let w = world(ContentSnapshot {
        node_types: vec![document_schema()],
        ..Default::default()
    });

    let mut live = document("doc-1", "live");
    live.properties
        .insert("teaserImage".to_string(), single("hero.jpg"));
    w.updater.node_added(&live).unwrap();

    let mut draft = document("doc-1", "user-bob");
    draft
        .properties
        .insert("teaserImage".to_string(), single("draft.jpg"));
    w.updater.node_added(&draft).unwrap();

    w.updater.node_discarded(&draft).unwrap();

    assert!(w.store.exists(live.usage_key(), "hero.jpg").unwrap());
    assert!(!w.store.exists(draft.usage_key(), "draft.jpg").unwrap());
}

#[test]
fn test_records_survive_store_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let content = Arc::new(ContentSnapshot {
        node_types: vec![document_schema()],
        ..Default::default()
    });

    let mut doc = document("doc-1", "live");
    doc.properties
        .insert("teaserImage".to_string(), single("hero.jpg"));

    {
        let store = Arc::new(SledUsageStore::open(dir.path()).unwrap());
        let updater = IncrementalUpdater::new(
            Arc::clone(&store) as Arc<dyn UsageStore>,
            Arc::clone(&content) as Arc<dyn AssetResolver>,
            Arc::clone(&content) as Arc<dyn SchemaReader>,
            Arc::clone(&content) as Arc<dyn ContentTreeReader>,
            Arc::new(PropertyClassifier::new()),
        );
        updater.node_added(&doc).unwrap();
        store.flush().unwrap();
    }

    let reopened = SledUsageStore::open(dir.path()).unwrap();
    assert!(reopened.exists(doc.usage_key(), "hero.jpg").unwrap());
    let records = reopened.list_all().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].metadata.node_identifier, "doc-1");
    assert_eq!(records[0].metadata.workspace, "live");
}
