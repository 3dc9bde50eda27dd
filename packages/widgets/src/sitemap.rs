//! `Neo.sitemap.Container`: one column container per group, fed by two
//! data stores.

use serde_json::json;
use tandem_core::base::{CLASS_NAME_KEY, CONTAINER};
use tandem_core::{
    ClassDecl, Component, ConfigEntry, ConfigLayer, ConfigRegistry, ListenerId, MutationScope,
    Result, Value,
};
use tracing::debug;

use crate::store::{DataStore, FILTER, LOAD, RECORD_CHANGE, SORT};

pub const SITEMAP: &str = "Neo.sitemap.Container";

#[derive(Debug, Clone, Copy)]
enum Slot {
    Group,
    Item,
}

impl Slot {
    fn property(self) -> &'static str {
        match self {
            Slot::Group => "group_store",
            Slot::Item => "item_store",
        }
    }
}

/// A live store and the listeners the sitemap installed on it.
struct BoundStore {
    store: DataStore,
    listeners: Vec<ListenerId>,
}

impl BoundStore {
    fn new(store: DataStore) -> Self {
        Self {
            store,
            listeners: Vec::new(),
        }
    }

    fn release(self) {
        for listener in self.listeners {
            self.store.events().un(listener);
        }
        self.store.destroy();
    }
}

/// The live stores behind the `group_store` / `item_store` descriptors.
#[derive(Default)]
struct SitemapStores {
    group: Option<BoundStore>,
    item: Option<BoundStore>,
}

impl SitemapStores {
    fn slot(&mut self, slot: Slot) -> &mut Option<BoundStore> {
        match slot {
            Slot::Group => &mut self.group,
            Slot::Item => &mut self.item,
        }
    }

    fn both_loaded(&self) -> bool {
        matches!(
            (&self.group, &self.item),
            (Some(g), Some(i)) if g.store.count() > 0 && i.store.count() > 0
        )
    }
}

pub(crate) fn register(registry: &ConfigRegistry) {
    registry.define(
        ClassDecl::new(SITEMAP)
            .extends(CONTAINER)
            .ntype("sitemap")
            .config(
                ConfigLayer::new()
                    .with(ConfigEntry::inherited("cls", vec!["neo-sitemap", "neo-container"]))
                    .with(ConfigEntry::reactive("group_store", Value::Null).quiet())
                    .with(ConfigEntry::reactive("item_store", Value::Null).quiet())
                    .with(ConfigEntry::plain(
                        "item_defaults",
                        json!({
                            CLASS_NAME_KEY: CONTAINER,
                            "cls": ["neo-sitemap-column", "neo-container"],
                        }),
                    )),
            )
            .before_set("group_store", |scope, value, _old| {
                replace_store(scope, Slot::Group, value)
            })
            .after_set("group_store", |scope, _value, _old| {
                bind_store(scope, Slot::Group)
            })
            .before_set("item_store", |scope, value, _old| {
                replace_store(scope, Slot::Item, value)
            })
            .after_set("item_store", |scope, _value, _old| {
                bind_store(scope, Slot::Item)
            })
            .on_destroy(|scope| {
                if let Some(mut stores) = scope.extensions_mut().remove::<SitemapStores>() {
                    for slot in [Slot::Group, Slot::Item] {
                        if let Some(bound) = stores.slot(slot).take() {
                            bound.release();
                        }
                    }
                }
                Ok(())
            }),
    );
}

/// The group store, once one is set.
pub fn group_store(sitemap: &Component) -> Option<&DataStore> {
    sitemap
        .extensions()
        .get::<SitemapStores>()
        .and_then(|stores| stores.group.as_ref())
        .map(|bound| &bound.store)
}

/// The item store, once one is set.
pub fn item_store(sitemap: &Component) -> Option<&DataStore> {
    sitemap
        .extensions()
        .get::<SitemapStores>()
        .and_then(|stores| stores.item.as_ref())
        .map(|bound| &bound.store)
}

/// Rebuild the columns after the stores were loaded.
pub fn refresh_columns(sitemap: &mut Component) -> Result<()> {
    sitemap.with_mutation_scope(|scope| {
        if stores_loaded(scope) {
            create_columns(scope)?;
        }
        Ok(())
    })
}

/// Build the store for `slot` from a config map and swap it in, destroying
/// the previous one. Stores the new store's descriptor as the config value.
/// An invalid config leaves the current store in place.
fn replace_store(scope: &mut MutationScope<'_>, slot: Slot, value: Value) -> Result<Value> {
    let store = if value.is_null() {
        None
    } else {
        Some(DataStore::from_config(&value)?)
    };
    let descriptor = store.as_ref().map_or(Value::Null, DataStore::descriptor);

    let mut stores = scope
        .extensions_mut()
        .remove::<SitemapStores>()
        .unwrap_or_default();
    if let Some(old) = stores.slot(slot).take() {
        debug!(store = %old.store.id(), property = slot.property(), "store replaced");
        old.release();
    }
    *stores.slot(slot) = store.map(BoundStore::new);
    scope.extensions_mut().insert(stores);
    Ok(descriptor)
}

/// Listen to the store in `slot`. Listeners live as long as the store and
/// are released with it.
fn bind_store(scope: &mut MutationScope<'_>, slot: Slot) -> Result<()> {
    let property = slot.property();
    if let Some(bound) = scope
        .extensions_mut()
        .get_mut::<SitemapStores>()
        .and_then(|stores| stores.slot(slot).as_mut())
    {
        if bound.listeners.is_empty() {
            for event in [FILTER, LOAD, RECORD_CHANGE, SORT] {
                let store_id = bound.store.id().to_string();
                let listener = bound.store.on(event, move |payload| {
                    debug!(store = %store_id, property, event, ?payload, "store event");
                });
                bound.listeners.push(listener);
            }
        }
    }

    if stores_loaded(scope) {
        create_columns(scope)?;
    }
    Ok(())
}

fn stores_loaded(scope: &MutationScope<'_>) -> bool {
    scope
        .extensions()
        .get::<SitemapStores>()
        .is_some_and(SitemapStores::both_loaded)
}

/// One column container per distinct group column.
fn create_columns(scope: &mut MutationScope<'_>) -> Result<()> {
    let columns = scope
        .extensions()
        .get::<SitemapStores>()
        .and_then(|stores| stores.group.as_ref())
        .map(|group| {
            group
                .store
                .records()
                .iter()
                .filter_map(|record| record.get("column").and_then(Value::as_i64))
                .map(|column| column.max(0) as usize + 1)
                .max()
                .unwrap_or(0)
        })
        .unwrap_or(0);

    let defaults = scope.get("item_defaults").cloned().unwrap_or_default();
    debug!(component = %scope.id(), columns, "creating sitemap columns");
    scope.set("items", Value::Array(vec![defaults; columns]))
}
