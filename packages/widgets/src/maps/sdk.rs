use async_trait::async_trait;
use tandem_bridge::Result;
use tandem_core::Value;

use super::LatLng;

/// Opaque SDK map object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MapHandle(pub u64);

/// Opaque SDK marker object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkerHandle(pub u64);

/// The third-party maps SDK, as seen from the privileged context.
///
/// Implementations report zoom changes and marker clicks back through
/// [`MapsAddon::map_zoom_changed`](super::MapsAddon::map_zoom_changed) and
/// [`MapsAddon::marker_clicked`](super::MapsAddon::marker_clicked).
#[async_trait]
pub trait MapsSdk: Send + Sync {
    /// Create a map inside the DOM element `element_id`.
    fn create_map(&self, element_id: &str, options: &Value) -> Result<MapHandle>;

    fn create_marker(
        &self,
        map: MapHandle,
        position: LatLng,
        title: Option<&str>,
    ) -> Result<MarkerHandle>;

    /// Attach a marker to a map, or detach it with `None`.
    fn set_marker_map(&self, marker: MarkerHandle, map: Option<MapHandle>) -> Result<()>;

    fn pan_to(&self, map: MapHandle, position: LatLng) -> Result<()>;

    fn set_center(&self, map: MapHandle, center: LatLng) -> Result<()>;

    fn set_zoom(&self, map: MapHandle, zoom: f64) -> Result<()>;

    /// Resolve an address or location. The result is plain data.
    async fn geocode(&self, request: Value) -> Result<Value>;
}
