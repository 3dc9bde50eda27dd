use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};

use async_trait::async_trait;
use tandem_bridge::{
    BridgeError, EventEmitter, RegistrationHandle, RemoteCapabilitySurface, RemoteTarget, Result,
};
use tandem_core::{ListenerId, Observable, Value};
use tracing::{debug, trace, warn};

use super::sdk::{MapHandle, MapsSdk, MarkerHandle};
use super::{
    AddMarker, CreateMap, MapRef, MarkerClick, MarkerRef, PanTo, PathEntry, SetCenter, SetZoom,
    ZoomChange, MAP_CREATED, MARKER_CLICK_EVENT, METHODS, NAMESPACE, ZOOM_CHANGE_EVENT,
};

#[derive(Default)]
struct MapsState {
    maps: HashMap<String, MapHandle>,
    markers: HashMap<String, HashMap<String, MarkerHandle>>,
    map_ids: HashMap<MapHandle, String>,
    marker_ids: HashMap<MarkerHandle, MarkerRef>,
}

impl MapsState {
    fn map(&self, map_id: &str) -> Result<MapHandle> {
        self.maps
            .get(map_id)
            .copied()
            .ok_or_else(|| BridgeError::application(format!("unknown map '{}'", map_id)))
    }

    fn marker(&self, marker: &MarkerRef) -> Result<MarkerHandle> {
        self.markers
            .get(&marker.map_id)
            .and_then(|markers| markers.get(&marker.id))
            .copied()
            .ok_or_else(|| {
                BridgeError::application(format!(
                    "unknown marker '{}' on map '{}'",
                    marker.id, marker.map_id
                ))
            })
    }
}

/// The privileged maps singleton.
pub struct MapsAddon {
    this: Weak<MapsAddon>,
    sdk: Arc<dyn MapsSdk>,
    emitter: EventEmitter,
    observable: Observable,
    state: Mutex<MapsState>,
}

impl MapsAddon {
    pub fn new(sdk: Arc<dyn MapsSdk>, emitter: EventEmitter) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            sdk,
            emitter,
            observable: Observable::new(),
            state: Mutex::new(MapsState::default()),
        })
    }

    /// Expose the addon's methods on `surface`.
    pub fn register(
        self: &Arc<Self>,
        surface: &Arc<RemoteCapabilitySurface>,
    ) -> Result<RegistrationHandle> {
        surface.register(NAMESPACE, METHODS, Arc::clone(self) as Arc<dyn RemoteTarget>)
    }

    /// Local events (`mapCreated`).
    pub fn events(&self) -> &Observable {
        &self.observable
    }

    fn state(&self) -> MutexGuard<'_, MapsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn has_map(&self, map_id: &str) -> bool {
        self.state().maps.contains_key(map_id)
    }

    pub fn marker_count(&self, map_id: &str) -> usize {
        self.state().markers.get(map_id).map_or(0, HashMap::len)
    }

    /// Add a marker. If the map does not exist yet, the marker is added as
    /// soon as it is created.
    pub fn add_marker(&self, data: AddMarker) -> Result<()> {
        let mut state = self.state();
        let Ok(map) = state.map(&data.map_id) else {
            // Registered under the lock `create` inserts under.
            self.defer_marker(data);
            return Ok(());
        };

        let marker = self
            .sdk
            .create_marker(map, data.position, data.title.as_deref())?;
        state
            .markers
            .entry(data.map_id.clone())
            .or_default()
            .insert(data.id.clone(), marker);
        state.marker_ids.insert(
            marker,
            MarkerRef {
                id: data.id.clone(),
                map_id: data.map_id.clone(),
            },
        );
        debug!(map = %data.map_id, marker = %data.id, "marker added");
        Ok(())
    }

    fn defer_marker(&self, data: AddMarker) {
        let own_id: Arc<OnceLock<ListenerId>> = Arc::new(OnceLock::new());
        let done = Arc::new(AtomicBool::new(false));
        let map_id = data.map_id.clone();
        let addon = self.this.clone();
        trace!(map = %map_id, marker = %data.id, "marker deferred until the map exists");

        let listener = {
            let own_id = Arc::clone(&own_id);
            self.observable.on(MAP_CREATED, move |created| {
                if created.as_str() != Some(map_id.as_str()) || done.swap(true, Ordering::SeqCst) {
                    return;
                }
                let Some(addon) = addon.upgrade() else {
                    return;
                };
                if let Some(id) = own_id.get() {
                    addon.observable.un(*id);
                }
                if let Err(e) = addon.add_marker(data.clone()) {
                    warn!(map = %map_id, marker = %data.id, error = %e, "deferred marker failed");
                }
            })
        };
        let _ = own_id.set(listener);
    }

    /// Create a map and fire `mapCreated` with its id.
    pub fn create(&self, data: CreateMap) -> Result<()> {
        let options = map_options(&data)?;
        let map = self.sdk.create_map(&data.id, &options)?;
        {
            let mut state = self.state();
            if let Some(previous) = state.maps.insert(data.id.clone(), map) {
                state.map_ids.remove(&previous);
            }
            state.map_ids.insert(map, data.id.clone());
        }
        debug!(map = %data.id, "map created");
        self.observable.fire(MAP_CREATED, &Value::from(data.id));
        Ok(())
    }

    pub async fn geocode(&self, request: Value) -> Result<Value> {
        self.sdk.geocode(request).await
    }

    pub fn hide_marker(&self, data: MarkerRef) -> Result<()> {
        let marker = self.state().marker(&data)?;
        self.sdk.set_marker_map(marker, None)
    }

    pub fn show_marker(&self, data: MarkerRef) -> Result<()> {
        let (marker, map) = {
            let state = self.state();
            (state.marker(&data)?, state.map(&data.map_id)?)
        };
        self.sdk.set_marker_map(marker, Some(map))
    }

    pub fn pan_to(&self, data: PanTo) -> Result<()> {
        let map = self.state().map(&data.map_id)?;
        self.sdk.pan_to(map, data.position)
    }

    /// Forget a map and all its markers.
    pub fn remove_map(&self, data: MapRef) -> Result<()> {
        let mut state = self.state();
        if let Some(map) = state.maps.remove(&data.map_id) {
            state.map_ids.remove(&map);
        }
        for marker in state.markers.remove(&data.map_id).unwrap_or_default().into_values() {
            state.marker_ids.remove(&marker);
        }
        debug!(map = %data.map_id, "map removed");
        Ok(())
    }

    pub fn remove_marker(&self, data: MarkerRef) -> Result<()> {
        let marker = {
            let mut state = self.state();
            let marker = state.marker(&data)?;
            if let Some(markers) = state.markers.get_mut(&data.map_id) {
                markers.remove(&data.id);
            }
            state.marker_ids.remove(&marker);
            marker
        };
        self.sdk.set_marker_map(marker, None)
    }

    pub fn set_center(&self, data: SetCenter) -> Result<()> {
        let map = self.state().map(&data.id)?;
        self.sdk.set_center(map, data.value)
    }

    pub fn set_zoom(&self, data: SetZoom) -> Result<()> {
        let map = self.state().map(&data.id)?;
        self.sdk.set_zoom(map, data.value)
    }

    /// SDK callback: a map's zoom level changed.
    pub fn map_zoom_changed(&self, map: MapHandle, zoom: f64) {
        let Some(map_id) = self.state().map_ids.get(&map).cloned() else {
            trace!(?map, "zoom change on an unknown map");
            return;
        };
        let event = ZoomChange {
            id: map_id.clone(),
            path: PathEntry::map(&map_id),
            value: zoom,
        };
        self.push(ZOOM_CHANGE_EVENT, &event);
    }

    /// SDK callback: a marker was clicked.
    pub fn marker_clicked(&self, marker: MarkerHandle, dom_event: Value) {
        let Some(MarkerRef { id, map_id }) = self.state().marker_ids.get(&marker).cloned() else {
            trace!(?marker, "click on an unknown marker");
            return;
        };
        let event = MarkerClick {
            id,
            path: PathEntry::map(&map_id),
            dom_event,
        };
        self.push(MARKER_CLICK_EVENT, &event);
    }

    fn push<T: serde::Serialize>(&self, event_name: &str, payload: &T) {
        let result = Value::from_serialize(payload)
            .map_err(BridgeError::from)
            .and_then(|payload| self.emitter.emit(NAMESPACE, event_name, payload));
        if let Err(e) = result {
            warn!(event = event_name, error = %e, "failed to push maps event");
        }
    }
}

/// The named `create` options with `map_options` merged over them.
fn map_options(data: &CreateMap) -> Result<Value> {
    let mut options = Value::from_serialize(data)?;
    if let Value::Map(map) = &mut options {
        map.remove("id");
        map.remove("mapOptions");
        if let Value::Map(extra) = &data.map_options {
            map.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }
    Ok(options)
}

#[async_trait]
impl RemoteTarget for MapsAddon {
    async fn call(&self, method: &str, args: Value) -> Result<Value> {
        trace!(namespace = NAMESPACE, method, "maps call");
        match method {
            "addMarker" => self.add_marker(args.deserialize()?)?,
            "create" => self.create(args.deserialize()?)?,
            "geocode" => return self.geocode(args).await,
            "hideMarker" => self.hide_marker(args.deserialize()?)?,
            "panTo" => self.pan_to(args.deserialize()?)?,
            "removeMap" => self.remove_map(args.deserialize()?)?,
            "removeMarker" => self.remove_marker(args.deserialize()?)?,
            "setCenter" => self.set_center(args.deserialize()?)?,
            "setZoom" => self.set_zoom(args.deserialize()?)?,
            "showMarker" => self.show_marker(args.deserialize()?)?,
            other => return Err(BridgeError::method_not_found(NAMESPACE, other)),
        }
        Ok(Value::Null)
    }
}

impl std::fmt::Debug for MapsAddon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("MapsAddon")
            .field("maps", &state.maps.len())
            .field("markers", &state.marker_ids.len())
            .finish_non_exhaustive()
    }
}
