//! Google Maps: a privileged addon and the app-side stub that drives it.
//!
//! The addon owns every SDK object and keeps them in id side tables; the
//! app only ever sees the string ids it chose. Zoom changes and marker
//! clicks travel back as events on the addon's namespace.

mod addon;
mod remote;
mod sdk;

use serde::{Deserialize, Serialize};
use tandem_core::Value;

pub use addon::MapsAddon;
pub use remote::MapsRemote;
pub use sdk::{MapHandle, MapsSdk, MarkerHandle};

pub const NAMESPACE: &str = "Neo.main.addon.GoogleMaps";

/// Methods the addon exposes to the app.
pub const METHODS: [&str; 10] = [
    "addMarker",
    "create",
    "geocode",
    "hideMarker",
    "panTo",
    "removeMap",
    "removeMarker",
    "setCenter",
    "setZoom",
    "showMarker",
];

pub const ZOOM_CHANGE_EVENT: &str = "googleMapZoomChange";
pub const MARKER_CLICK_EVENT: &str = "googleMarkerClick";

/// Fired on the addon's local observable after a map was created.
pub const MAP_CREATED: &str = "mapCreated";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// Arguments of `create`. `map_options` entries override the named ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMap {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center: Option<LatLng>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fullscreen_control: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_zoom: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_zoom: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoom: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoom_control: Option<bool>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub map_options: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMarker {
    pub id: String,
    pub map_id: String,
    pub position: LatLng,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Addresses one marker of one map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerRef {
    pub id: String,
    pub map_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapRef {
    pub map_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanTo {
    pub map_id: String,
    pub position: LatLng,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetCenter {
    pub id: String,
    pub value: LatLng,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetZoom {
    pub id: String,
    pub value: f64,
}

/// One step of an event path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathEntry {
    pub cls: Vec<String>,
    pub id: String,
}

impl PathEntry {
    fn map(map_id: &str) -> Vec<PathEntry> {
        vec![PathEntry {
            cls: Vec::new(),
            id: map_id.to_string(),
        }]
    }
}

/// Payload of `googleMapZoomChange`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoomChange {
    pub id: String,
    pub path: Vec<PathEntry>,
    pub value: f64,
}

/// Payload of `googleMarkerClick`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerClick {
    pub id: String,
    pub path: Vec<PathEntry>,
    #[serde(default)]
    pub dom_event: Value,
}
