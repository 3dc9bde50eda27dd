use serde::Serialize;
use tandem_bridge::{Dispatcher, RemoteProxy, Result, Subscription};
use tandem_core::Value;
use tracing::warn;

use super::{
    AddMarker, CreateMap, LatLng, MapRef, MarkerClick, MarkerRef, PanTo, SetCenter, SetZoom,
    ZoomChange, MARKER_CLICK_EVENT, METHODS, NAMESPACE, ZOOM_CHANGE_EVENT,
};

/// App-side handle on the maps addon.
#[derive(Debug, Clone)]
pub struct MapsRemote {
    proxy: RemoteProxy,
}

impl MapsRemote {
    /// A stub for the well-known method list. Usable before the addon has
    /// announced itself.
    pub fn new(dispatcher: &Dispatcher) -> Self {
        Self {
            proxy: dispatcher.proxy(NAMESPACE, METHODS),
        }
    }

    /// Wait for the addon to announce itself and use what it announced.
    pub async fn announced(dispatcher: &Dispatcher) -> Result<Self> {
        let proxy = dispatcher.wait_for_remote(NAMESPACE).await?;
        Ok(Self { proxy })
    }

    pub fn proxy(&self) -> &RemoteProxy {
        &self.proxy
    }

    async fn send<A: Serialize>(&self, method: &str, args: &A) -> Result<()> {
        let _: Value = self.proxy.call_as(method, args).await?;
        Ok(())
    }

    pub async fn create(&self, map: &CreateMap) -> Result<()> {
        self.send("create", map).await
    }

    pub async fn add_marker(&self, marker: &AddMarker) -> Result<()> {
        self.send("addMarker", marker).await
    }

    pub async fn geocode(&self, request: impl Into<Value>) -> Result<Value> {
        self.proxy.call("geocode", request).await
    }

    pub async fn hide_marker(&self, map_id: &str, id: &str) -> Result<()> {
        self.send("hideMarker", &marker_ref(map_id, id)).await
    }

    pub async fn show_marker(&self, map_id: &str, id: &str) -> Result<()> {
        self.send("showMarker", &marker_ref(map_id, id)).await
    }

    pub async fn remove_marker(&self, map_id: &str, id: &str) -> Result<()> {
        self.send("removeMarker", &marker_ref(map_id, id)).await
    }

    pub async fn pan_to(&self, map_id: &str, position: LatLng) -> Result<()> {
        let args = PanTo {
            map_id: map_id.to_string(),
            position,
        };
        self.send("panTo", &args).await
    }

    pub async fn remove_map(&self, map_id: &str) -> Result<()> {
        let args = MapRef {
            map_id: map_id.to_string(),
        };
        self.send("removeMap", &args).await
    }

    pub async fn set_center(&self, map_id: &str, center: LatLng) -> Result<()> {
        let args = SetCenter {
            id: map_id.to_string(),
            value: center,
        };
        self.send("setCenter", &args).await
    }

    pub async fn set_zoom(&self, map_id: &str, zoom: f64) -> Result<()> {
        let args = SetZoom {
            id: map_id.to_string(),
            value: zoom,
        };
        self.send("setZoom", &args).await
    }

    /// Handle `googleMapZoomChange` events.
    pub fn on_zoom_change<F>(&self, handler: F) -> Subscription
    where
        F: Fn(ZoomChange) + Send + Sync + 'static,
    {
        self.on_event(ZOOM_CHANGE_EVENT, handler)
    }

    /// Handle `googleMarkerClick` events.
    pub fn on_marker_click<F>(&self, handler: F) -> Subscription
    where
        F: Fn(MarkerClick) + Send + Sync + 'static,
    {
        self.on_event(MARKER_CLICK_EVENT, handler)
    }

    fn on_event<T, F>(&self, name: &'static str, handler: F) -> Subscription
    where
        T: serde::de::DeserializeOwned,
        F: Fn(T) + Send + Sync + 'static,
    {
        self.proxy.subscribe(move |event, payload| {
            if event != name {
                return;
            }
            match payload.clone().deserialize::<T>() {
                Ok(data) => handler(data),
                Err(e) => warn!(event, error = %e, "malformed maps event"),
            }
        })
    }
}

fn marker_ref(map_id: &str, id: &str) -> MarkerRef {
    MarkerRef {
        id: id.to_string(),
        map_id: map_id.to_string(),
    }
}
