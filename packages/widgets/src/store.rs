//! A minimal record store that fires `load`, `filter`, `sort` and
//! `recordChange`.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::json;
use tandem_core::{ConfigError, HookError, ListenerId, Observable, Value};
use tracing::debug;

pub const LOAD: &str = "load";
pub const FILTER: &str = "filter";
pub const SORT: &str = "sort";
pub const RECORD_CHANGE: &str = "recordChange";

static NEXT_STORE: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
struct StoreState {
    key_property: String,
    records: Vec<Value>,
    filter: Option<(String, Value)>,
    destroyed: bool,
}

/// A shared handle to a list of map records. Clones share state and
/// listeners.
#[derive(Clone, Debug)]
pub struct DataStore {
    id: String,
    state: Arc<Mutex<StoreState>>,
    events: Observable,
}

impl DataStore {
    pub fn new(key_property: &str) -> Self {
        let id = format!("store-{}", NEXT_STORE.fetch_add(1, AtomicOrdering::Relaxed));
        Self {
            id,
            state: Arc::new(Mutex::new(StoreState {
                key_property: key_property.to_string(),
                records: Vec::new(),
                filter: None,
                destroyed: false,
            })),
            events: Observable::new(),
        }
    }

    /// Build a store from a config map: `{"keyProperty": "id", "data": [...]}`.
    /// Both keys are optional.
    pub fn from_config(config: &Value) -> Result<Self, ConfigError> {
        let map = config.as_map().ok_or_else(|| {
            HookError::with_kind("Validation", "a store config must be a map")
        })?;
        let key_property = map
            .get("keyProperty")
            .and_then(Value::as_str)
            .unwrap_or("id");
        let store = Self::new(key_property);
        if let Some(data) = map.get("data") {
            let records = data.as_array().ok_or_else(|| {
                HookError::with_kind("Validation", "store data must be an array")
            })?;
            store.state().records = records.to_vec();
        }
        Ok(store)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// A config value describing this store.
    pub fn descriptor(&self) -> Value {
        Value::from(json!({"storeId": self.id, "count": self.count()}))
    }

    fn state(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of records passing the current filter.
    pub fn count(&self) -> usize {
        let state = self.state();
        state.records.iter().filter(|r| passes(&state.filter, r)).count()
    }

    /// Records passing the current filter.
    pub fn records(&self) -> Vec<Value> {
        let state = self.state();
        state
            .records
            .iter()
            .filter(|r| passes(&state.filter, r))
            .cloned()
            .collect()
    }

    pub fn get(&self, key: &Value) -> Option<Value> {
        let state = self.state();
        let key_property = state.key_property.clone();
        state
            .records
            .iter()
            .find(|r| r.get(&key_property) == Some(key))
            .cloned()
    }

    /// Replace all records and fire `load`.
    pub fn load(&self, records: Vec<Value>) {
        let count = {
            let mut state = self.state();
            if state.destroyed {
                return;
            }
            state.records = records;
            state.records.len()
        };
        debug!(store = %self.id, count, "store loaded");
        self.events.fire(LOAD, &Value::from(json!({"items": count})));
    }

    /// Keep only records whose `field` equals `value`; `None` clears the
    /// filter.
    pub fn filter(&self, filter: Option<(&str, Value)>) {
        self.state().filter = filter.map(|(field, value)| (field.to_string(), value));
        let count = self.count();
        self.events.fire(FILTER, &Value::from(json!({"items": count})));
    }

    /// Sort records by `field`, ascending or descending.
    pub fn sort(&self, field: &str, descending: bool) {
        {
            let mut state = self.state();
            state.records.sort_by(|a, b| {
                let ordering = compare(a.get(field), b.get(field));
                if descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }
        let direction = if descending { "DESC" } else { "ASC" };
        self.events.fire(
            SORT,
            &Value::from(json!({"property": field, "direction": direction})),
        );
    }

    /// Set `field` on the record with the given key. Returns false if no
    /// record has that key.
    pub fn update_record(&self, key: &Value, field: &str, value: Value) -> bool {
        let old = {
            let mut state = self.state();
            let key_property = state.key_property.clone();
            let Some(record) = state
                .records
                .iter_mut()
                .find(|r| r.get(&key_property) == Some(key))
            else {
                return false;
            };
            let old = record.get(field).cloned().unwrap_or_default();
            if record.insert(field, value.clone()).is_err() {
                return false;
            }
            old
        };
        let mut payload = Value::map();
        let _ = payload.insert("key", key.clone());
        let _ = payload.insert("field", Value::from(field));
        let _ = payload.insert("value", value);
        let _ = payload.insert("oldValue", old);
        self.events.fire(RECORD_CHANGE, &payload);
        true
    }

    pub fn on<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.events.on(event, listener)
    }

    pub fn events(&self) -> &Observable {
        &self.events
    }

    /// Drop all records and listeners. Later loads are ignored.
    pub fn destroy(&self) {
        {
            let mut state = self.state();
            state.destroyed = true;
            state.records.clear();
            state.filter = None;
        }
        self.events.clear();
        debug!(store = %self.id, "store destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.state().destroyed
    }
}

fn passes(filter: &Option<(String, Value)>, record: &Value) -> bool {
    match filter {
        Some((field, value)) => record.get(field) == Some(value),
        None => true,
    }
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(a), Some(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use collection_literals::btree;
    use std::sync::atomic::AtomicUsize;

    fn records() -> Vec<Value> {
        vec![
            json!({"id": 1, "name": "Home", "column": 0}).into(),
            json!({"id": 2, "name": "Docs", "column": 1}).into(),
            json!({"id": 3, "name": "Blog", "column": 1}).into(),
        ]
    }

    #[test]
    fn from_config_reads_data() {
        let config = Value::Map(btree! {
            "keyProperty".to_string() => Value::from("name"),
            "data".to_string() => Value::from(json!([{"name": "Home"}])),
        });
        let store = DataStore::from_config(&config).unwrap();
        assert_eq!(store.count(), 1);
        assert!(store.get(&Value::from("Home")).is_some());
        assert!(DataStore::from_config(&Value::from("nope")).is_err());
    }

    #[test]
    fn filter_and_sort() {
        let store = DataStore::new("id");
        store.load(records());

        store.filter(Some(("column", Value::from(1i64))));
        assert_eq!(store.count(), 2);

        store.sort("name", false);
        let names: Vec<_> = store
            .records()
            .iter()
            .filter_map(|r| r.get("name").and_then(Value::as_str).map(str::to_string))
            .collect();
        assert_eq!(names, vec!["Blog", "Docs"]);

        store.filter(None);
        assert_eq!(store.count(), 3);
    }

    #[test]
    fn events_fire_and_destroy_clears_listeners() {
        let store = DataStore::new("id");
        let fired = Arc::new(AtomicUsize::new(0));
        for event in [LOAD, RECORD_CHANGE] {
            let fired = Arc::clone(&fired);
            store.on(event, move |_| {
                fired.fetch_add(1, AtomicOrdering::SeqCst);
            });
        }

        store.load(records());
        assert!(store.update_record(&Value::from(2i64), "name", Value::from("API")));
        assert!(!store.update_record(&Value::from(9i64), "name", Value::from("x")));
        assert_eq!(fired.load(AtomicOrdering::SeqCst), 2);
        assert_eq!(
            store.get(&Value::from(2i64)).and_then(|r| r.get("name").cloned()),
            Some(Value::from("API"))
        );

        store.destroy();
        store.load(records());
        assert_eq!(store.count(), 0);
        assert_eq!(store.events().listener_count(LOAD), 0);
    }
}
