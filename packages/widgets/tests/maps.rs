use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::oneshot;

use tandem_bridge::{
    channel, BridgeConfig, BridgeError, CapabilityServer, Dispatcher, ErrorKind,
    RegistrationHandle, RemoteCapabilitySurface, Result,
};
use tandem_core::Value;
use tandem_widgets::maps::{
    AddMarker, CreateMap, LatLng, MapHandle, MarkerHandle, MAP_CREATED, NAMESPACE,
};
use tandem_widgets::{MapsAddon, MapsRemote, MapsSdk};

/// Records every SDK call and hands out sequential handles.
#[derive(Default)]
struct MockSdk {
    next_handle: AtomicU64,
    calls: Mutex<Vec<String>>,
    map_options: Mutex<Vec<Value>>,
}

impl MockSdk {
    fn handle(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MapsSdk for MockSdk {
    fn create_map(&self, element_id: &str, options: &Value) -> Result<MapHandle> {
        self.log(format!("create_map {}", element_id));
        self.map_options.lock().unwrap().push(options.clone());
        Ok(MapHandle(self.handle()))
    }

    fn create_marker(
        &self,
        map: MapHandle,
        _position: LatLng,
        title: Option<&str>,
    ) -> Result<MarkerHandle> {
        self.log(format!("create_marker {} {}", map.0, title.unwrap_or("-")));
        Ok(MarkerHandle(self.handle()))
    }

    fn set_marker_map(&self, marker: MarkerHandle, map: Option<MapHandle>) -> Result<()> {
        self.log(format!("set_marker_map {} {:?}", marker.0, map.map(|m| m.0)));
        Ok(())
    }

    fn pan_to(&self, map: MapHandle, position: LatLng) -> Result<()> {
        self.log(format!("pan_to {} {}", map.0, position.lat));
        Ok(())
    }

    fn set_center(&self, map: MapHandle, center: LatLng) -> Result<()> {
        self.log(format!("set_center {} {}", map.0, center.lng));
        Ok(())
    }

    fn set_zoom(&self, map: MapHandle, zoom: f64) -> Result<()> {
        self.log(format!("set_zoom {} {}", map.0, zoom));
        Ok(())
    }

    async fn geocode(&self, request: Value) -> Result<Value> {
        match request.get("address").and_then(Value::as_str) {
            Some("Berlin") => Ok(json!({"results": [{"lat": 52.52, "lng": 13.405}]}).into()),
            _ => Err(BridgeError::application("ZERO_RESULTS")),
        }
    }
}

struct Fixture {
    sdk: Arc<MockSdk>,
    addon: Arc<MapsAddon>,
    dispatcher: Dispatcher,
    remote: MapsRemote,
    _registration: RegistrationHandle,
}

async fn fixture() -> Fixture {
    let (app, main) = channel::pair();
    let surface = RemoteCapabilitySurface::new();
    let server = CapabilityServer::new(Arc::clone(&surface), main, BridgeConfig::default());

    let sdk = Arc::new(MockSdk::default());
    let addon = MapsAddon::new(Arc::clone(&sdk) as Arc<dyn MapsSdk>, server.events());
    let registration = addon.register(&surface).unwrap();
    server.spawn();

    let dispatcher = Dispatcher::spawn(app, BridgeConfig::default());
    let remote = MapsRemote::announced(&dispatcher).await.unwrap();
    Fixture {
        sdk,
        addon,
        dispatcher,
        remote,
        _registration: registration,
    }
}

fn marker(id: &str, map_id: &str) -> AddMarker {
    AddMarker {
        id: id.to_string(),
        map_id: map_id.to_string(),
        position: LatLng { lat: 1.0, lng: 2.0 },
        title: Some(id.to_uppercase()),
    }
}

fn map(id: &str) -> CreateMap {
    CreateMap {
        id: id.to_string(),
        zoom: Some(5.0),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_marker_added_before_map_is_deferred() {
    let f = fixture().await;

    f.remote.add_marker(&marker("m1", "map-1")).await.unwrap();
    assert!(f.sdk.calls().is_empty());
    assert_eq!(f.addon.events().listener_count(MAP_CREATED), 1);

    f.remote.create(&map("map-1")).await.unwrap();
    assert_eq!(
        f.sdk.calls(),
        vec!["create_map map-1".to_string(), "create_marker 1 M1".to_string()]
    );
    assert_eq!(f.addon.marker_count("map-1"), 1);
    assert_eq!(f.addon.events().listener_count(MAP_CREATED), 0);

    // A second map with another id does not replay the marker.
    f.remote.create(&map("map-2")).await.unwrap();
    assert_eq!(f.addon.marker_count("map-2"), 0);
}

#[tokio::test]
async fn test_map_options_override_named_options() {
    let f = fixture().await;
    let create = CreateMap {
        map_options: json!({"zoom": 7, "styles": "dark"}).into(),
        ..map("map-1")
    };
    f.remote.create(&create).await.unwrap();

    let options = f.sdk.map_options.lock().unwrap()[0].clone();
    assert_eq!(options, Value::from(json!({"zoom": 7, "styles": "dark"})));
    assert!(f.addon.has_map("map-1"));
}

#[tokio::test]
async fn test_marker_visibility_and_removal() {
    let f = fixture().await;
    f.remote.create(&map("map-1")).await.unwrap();
    f.remote.add_marker(&marker("m1", "map-1")).await.unwrap();

    f.remote.hide_marker("map-1", "m1").await.unwrap();
    f.remote.show_marker("map-1", "m1").await.unwrap();
    f.remote.remove_marker("map-1", "m1").await.unwrap();

    let calls = f.sdk.calls();
    assert_eq!(
        &calls[2..],
        &[
            "set_marker_map 2 None".to_string(),
            "set_marker_map 2 Some(1)".to_string(),
            "set_marker_map 2 None".to_string(),
        ]
    );
    assert_eq!(f.addon.marker_count("map-1"), 0);

    match f.remote.hide_marker("map-1", "m1").await {
        Err(BridgeError::Remote(info)) => {
            assert_eq!(info.kind, ErrorKind::Application);
            assert!(info.message.contains("m1"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_map_commands_and_removal() {
    let f = fixture().await;
    f.remote.create(&map("map-1")).await.unwrap();
    f.remote.add_marker(&marker("m1", "map-1")).await.unwrap();

    f.remote
        .pan_to("map-1", LatLng { lat: 3.0, lng: 4.0 })
        .await
        .unwrap();
    f.remote
        .set_center("map-1", LatLng { lat: 5.0, lng: 6.0 })
        .await
        .unwrap();
    f.remote.set_zoom("map-1", 9.0).await.unwrap();
    assert_eq!(
        &f.sdk.calls()[2..],
        &[
            "pan_to 1 3".to_string(),
            "set_center 1 6".to_string(),
            "set_zoom 1 9".to_string(),
        ]
    );

    f.remote.remove_map("map-1").await.unwrap();
    assert!(!f.addon.has_map("map-1"));
    assert_eq!(f.addon.marker_count("map-1"), 0);
    assert!(matches!(
        f.remote.set_zoom("map-1", 3.0).await,
        Err(BridgeError::Remote(_))
    ));
}

#[tokio::test]
async fn test_geocode_returns_plain_data() {
    let f = fixture().await;
    let found = f.remote.geocode(json!({"address": "Berlin"})).await.unwrap();
    assert_eq!(found.get_path("results/0/lat"), Some(&Value::Float(52.52)));

    let missing = f.remote.geocode(json!({"address": "Atlantis"})).await;
    assert!(matches!(missing, Err(BridgeError::Remote(ref info)) if info.message == "ZERO_RESULTS"));
}

#[tokio::test]
async fn test_sdk_events_reach_the_app() {
    let f = fixture().await;
    f.remote.create(&map("map-1")).await.unwrap();
    f.remote.add_marker(&marker("m1", "map-1")).await.unwrap();

    let (zoom_tx, zoom_rx) = oneshot::channel();
    let zoom_tx = Mutex::new(Some(zoom_tx));
    let _zoom = f.remote.on_zoom_change(move |event| {
        if let Some(tx) = zoom_tx.lock().unwrap().take() {
            let _ = tx.send(event);
        }
    });
    let (click_tx, click_rx) = oneshot::channel();
    let click_tx = Mutex::new(Some(click_tx));
    let _click = f.remote.on_marker_click(move |event| {
        if let Some(tx) = click_tx.lock().unwrap().take() {
            let _ = tx.send(event);
        }
    });

    f.addon.map_zoom_changed(MapHandle(1), 12.0);
    f.addon
        .marker_clicked(MarkerHandle(2), json!({"button": 0}).into());

    let zoom = zoom_rx.await.unwrap();
    assert_eq!(zoom.id, "map-1");
    assert_eq!(zoom.path[0].id, "map-1");
    assert_eq!(zoom.value, 12.0);

    let click = click_rx.await.unwrap();
    assert_eq!(click.id, "m1");
    assert_eq!(click.path[0].id, "map-1");
    assert_eq!(click.dom_event, Value::from(json!({"button": 0})));
}

#[tokio::test]
async fn test_only_whitelisted_methods_are_callable() {
    let f = fixture().await;
    let err = f
        .dispatcher
        .call(NAMESPACE, "loadApi", Value::Null)
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::MethodNotFound { .. }));
    assert!(f.sdk.calls().is_empty());
}
