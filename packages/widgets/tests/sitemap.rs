use serde_json::json;
use tandem_core::{register_base_classes, Component, ConfigRegistry, Configurator, Value};
use tandem_widgets::sitemap::{self, SITEMAP};
use tandem_widgets::{register_widgets, LOAD, RECORD_CHANGE};

fn configurator() -> Configurator {
    let registry = ConfigRegistry::new();
    register_base_classes(&registry);
    register_widgets(&registry);
    Configurator::new(registry)
}

fn groups() -> serde_json::Value {
    json!([
        {"id": 1, "name": "Learn", "column": 0},
        {"id": 2, "name": "Apps", "column": 0},
        {"id": 3, "name": "Community", "column": 2}
    ])
}

fn items() -> serde_json::Value {
    json!([
        {"id": 10, "groupId": 1, "name": "Getting started"},
        {"id": 11, "groupId": 3, "name": "Slack"}
    ])
}

fn loaded() -> Component {
    configurator()
        .construct(
            SITEMAP,
            json!({
                "group_store": {"data": groups()},
                "item_store": {"data": items()}
            })
            .into(),
        )
        .unwrap()
}

#[test]
fn test_columns_follow_group_store() {
    let sitemap = loaded();

    assert_eq!(sitemap.items().len(), 3);
    for column in sitemap.items() {
        assert!(column.vdom().has_cls("neo-sitemap-column"));
        assert_eq!(column.parent_id(), Some(sitemap.id()));
    }

    let group = sitemap::group_store(&sitemap).unwrap();
    assert_eq!(
        sitemap.get("group_store"),
        Some(&Value::from(json!({"storeId": group.id(), "count": 3})))
    );
}

#[test]
fn test_no_columns_without_both_stores() {
    let sitemap = configurator()
        .construct(SITEMAP, json!({"group_store": {"data": groups()}}).into())
        .unwrap();
    assert!(sitemap.items().is_empty());
    assert!(sitemap::item_store(&sitemap).is_none());
    assert_eq!(sitemap.get("item_store"), Some(&Value::Null));
}

#[test]
fn test_replacing_a_store_destroys_the_old_one() {
    let mut sitemap = loaded();
    let old = sitemap::group_store(&sitemap).cloned().unwrap();
    assert_eq!(old.events().listener_count(LOAD), 1);

    sitemap
        .set("group_store", json!({"data": [{"id": 7, "column": 0}]}))
        .unwrap();

    assert!(old.is_destroyed());
    assert_eq!(old.events().listener_count(LOAD), 0);
    let new = sitemap::group_store(&sitemap).unwrap();
    assert_ne!(new.id(), old.id());
    assert_eq!(new.events().listener_count(RECORD_CHANGE), 1);
    assert_eq!(sitemap.items().len(), 1);
}

#[test]
fn test_refresh_after_late_load() {
    let mut sitemap = configurator()
        .construct(
            SITEMAP,
            json!({"group_store": {"data": []}, "item_store": {"data": []}}).into(),
        )
        .unwrap();
    assert!(sitemap.items().is_empty());

    let to_records = |value: serde_json::Value| -> Vec<Value> {
        Value::from(value)
            .as_array()
            .map(<[Value]>::to_vec)
            .unwrap_or_default()
    };
    sitemap::group_store(&sitemap).unwrap().load(to_records(groups()));
    sitemap::item_store(&sitemap).unwrap().load(to_records(items()));

    sitemap::refresh_columns(&mut sitemap).unwrap();
    assert_eq!(sitemap.items().len(), 3);
}

#[test]
fn test_destroy_releases_stores() {
    let sitemap = loaded();
    let group = sitemap::group_store(&sitemap).cloned().unwrap();
    let item = sitemap::item_store(&sitemap).cloned().unwrap();

    sitemap.destroy().unwrap();

    assert!(group.is_destroyed());
    assert!(item.is_destroyed());
    assert_eq!(item.events().listener_count(LOAD), 0);
}

#[test]
fn test_invalid_store_config_is_rejected() {
    let err = configurator()
        .construct(SITEMAP, json!({"group_store": "groups"}).into())
        .unwrap_err();
    assert!(matches!(err, tandem_core::ConfigError::Hook(ref e) if e.kind == "Validation"));
}

#[test]
fn test_swapping_stores_does_not_accumulate_resources() {
    let mut sitemap = loaded();
    let before = sitemap.tracked_resources();
    let first = sitemap::group_store(&sitemap).cloned().unwrap();

    for column in 0..100 {
        sitemap
            .set("group_store", json!({"data": [{"id": column, "column": 0}]}))
            .unwrap();
    }

    assert_eq!(sitemap.tracked_resources(), before);
    assert_eq!(first.events().listener_count(LOAD), 0);
    let current = sitemap::group_store(&sitemap).unwrap();
    assert_eq!(current.events().listener_count(LOAD), 1);
    assert_eq!(current.events().listener_count(RECORD_CHANGE), 1);
}

#[test]
fn test_rejected_store_keeps_the_current_one() {
    let mut sitemap = loaded();
    let current = sitemap::group_store(&sitemap).cloned().unwrap();
    let descriptor = sitemap.get("group_store").cloned();

    assert!(sitemap.set("group_store", "bogus").is_err());

    assert_eq!(sitemap.get("group_store").cloned(), descriptor);
    assert!(!current.is_destroyed());
    assert_eq!(
        sitemap::group_store(&sitemap).map(|store| store.id().to_string()),
        Some(current.id().to_string())
    );
    assert_eq!(current.events().listener_count(LOAD), 1);
}
