use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{oneshot, Notify};

use tandem_bridge::{
    channel, BridgeConfig, BridgeError, CapabilityServer, Dispatcher, ErrorKind, EventEmitter,
    RemoteCapabilitySurface, RemoteTarget, Result,
};
use tandem_core::Value;

/// Privileged object with more methods than it exposes.
#[derive(Default)]
struct Target {
    bar_calls: AtomicUsize,
    gate: Notify,
}

#[async_trait]
impl RemoteTarget for Target {
    async fn call(&self, method: &str, args: Value) -> Result<Value> {
        match method {
            "foo" | "echo" => Ok(args),
            "bar" => {
                self.bar_calls.fetch_add(1, Ordering::SeqCst);
                Ok(Value::from("bar reached"))
            }
            "wait" => {
                self.gate.notified().await;
                Ok(Value::from("released"))
            }
            "fail" => Err(BridgeError::application("no results")),
            "explode" => panic!("sdk crashed"),
            other => Err(BridgeError::application(format!("unhandled {other}"))),
        }
    }
}

struct Realm {
    dispatcher: Dispatcher,
    surface: Arc<RemoteCapabilitySurface>,
    events: EventEmitter,
    target: Arc<Target>,
}

fn connect(methods: &[&str]) -> (Realm, tandem_bridge::RegistrationHandle) {
    let (app, main) = channel::pair();
    let surface = RemoteCapabilitySurface::new();
    let target = Arc::new(Target::default());
    let handle = surface
        .register("N", methods.iter().copied(), Arc::clone(&target) as Arc<dyn RemoteTarget>)
        .unwrap();

    let server = CapabilityServer::new(Arc::clone(&surface), main, BridgeConfig::default());
    let events = server.events();
    server.spawn();

    let realm = Realm {
        dispatcher: Dispatcher::spawn(app, BridgeConfig::default()),
        surface,
        events,
        target,
    };
    (realm, handle)
}

#[tokio::test]
async fn test_echo_round_trip_preserves_arguments() {
    let (realm, _handle) = connect(&["echo"]);

    let value = realm
        .dispatcher
        .call("N", "echo", json!({"x": 1}))
        .await
        .unwrap();
    assert_eq!(value, Value::from(json!({"x": 1})));
}

#[tokio::test]
async fn test_typed_round_trip_through_proxy() {
    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct LatLng {
        lat: f64,
        lng: f64,
    }

    let (realm, _handle) = connect(&["echo"]);
    let proxy = realm.dispatcher.wait_for_remote("N").await.unwrap();

    let point = LatLng {
        lat: 52.52,
        lng: 13.405,
    };
    let back: LatLng = proxy.call_as("echo", &point).await.unwrap();
    assert_eq!(back, point);
}

#[tokio::test]
async fn test_capability_boundary() {
    let (realm, _handle) = connect(&["foo"]);

    let err = realm
        .dispatcher
        .call("N", "bar", Value::Null)
        .await
        .unwrap_err();
    assert!(
        matches!(err, BridgeError::MethodNotFound { ref namespace, ref method } if namespace == "N" && method == "bar")
    );
    assert_eq!(realm.target.bar_calls.load(Ordering::SeqCst), 0);

    let unknown = realm.dispatcher.call("Missing", "foo", Value::Null).await;
    assert!(matches!(unknown, Err(BridgeError::MethodNotFound { .. })));

    // The announced proxy refuses locally too.
    let proxy = realm.dispatcher.wait_for_remote("N").await.unwrap();
    assert!(matches!(
        proxy.method("bar"),
        Err(BridgeError::MethodNotFound { .. })
    ));
    assert_eq!(
        proxy.method("foo").unwrap().call(json!([1, 2])).await.unwrap(),
        Value::from(json!([1, 2]))
    );
}

#[tokio::test]
async fn test_channel_closure_rejects_all_pending_calls() {
    let (app, mut main) = channel::pair();
    let dispatcher = Dispatcher::spawn(app, BridgeConfig::default());

    let foo = tokio::spawn({
        let dispatcher = dispatcher.clone();
        async move { dispatcher.call("N", "foo", Value::Null).await }
    });
    let baz = tokio::spawn({
        let dispatcher = dispatcher.clone();
        async move { dispatcher.call("N", "baz", Value::Null).await }
    });

    // Both requests are on the wire before the transport goes away.
    let mut ids = Vec::new();
    for _ in 0..2 {
        match main.recv().await {
            Some(Ok(message)) => ids.extend(message.correlation_id()),
            other => panic!("unexpected {other:?}"),
        }
    }
    main.close();
    // A response queued after closure is never processed.
    assert!(main.send(&tandem_bridge::Message::ok(ids[0], Value::Null)).is_err());

    assert!(matches!(foo.await.unwrap(), Err(BridgeError::ChannelClosed)));
    assert!(matches!(baz.await.unwrap(), Err(BridgeError::ChannelClosed)));
    assert_eq!(dispatcher.pending_count(), 0);

    // Later calls fail the same way.
    assert!(matches!(
        dispatcher.call("N", "foo", Value::Null).await,
        Err(BridgeError::ChannelClosed)
    ));
}

#[tokio::test]
async fn test_slow_call_does_not_block_fast_call() {
    let (realm, _handle) = connect(&["wait", "echo"]);

    let slow = tokio::spawn({
        let dispatcher = realm.dispatcher.clone();
        async move { dispatcher.call("N", "wait", Value::Null).await }
    });
    let fast = realm
        .dispatcher
        .call("N", "echo", Value::from(2i64))
        .await
        .unwrap();
    assert_eq!(fast, Value::from(2i64));
    assert!(!slow.is_finished());

    realm.target.gate.notify_one();
    assert_eq!(slow.await.unwrap().unwrap(), Value::from("released"));
}

#[tokio::test]
async fn test_errors_and_panics_are_normalized() {
    let (realm, _handle) = connect(&["fail", "explode", "echo"]);

    match realm.dispatcher.call("N", "fail", Value::Null).await {
        Err(BridgeError::Remote(info)) => {
            assert_eq!(info.kind, ErrorKind::Application);
            assert_eq!(info.message, "no results");
        }
        other => panic!("unexpected {other:?}"),
    }

    match realm.dispatcher.call("N", "explode", Value::Null).await {
        Err(BridgeError::Remote(info)) => {
            assert_eq!(info.kind, ErrorKind::Panic);
            assert!(info.message.contains("sdk crashed"));
        }
        other => panic!("unexpected {other:?}"),
    }

    // The server survives.
    assert_eq!(
        realm.dispatcher.call("N", "echo", Value::from(3i64)).await.unwrap(),
        Value::from(3i64)
    );
}

#[tokio::test]
async fn test_events_are_routed_per_namespace() {
    let (realm, _handle) = connect(&["echo"]);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let (done_tx, done_rx) = oneshot::channel();
    let done = Mutex::new(Some(done_tx));

    let log = Arc::clone(&seen);
    let subscription = realm.dispatcher.subscribe("N", move |event, payload| {
        log.lock().unwrap().push((event.to_string(), payload.clone()));
        if event == "last" {
            if let Some(tx) = done.lock().unwrap().take() {
                let _ = tx.send(());
            }
        }
    });
    let _other = realm
        .dispatcher
        .subscribe("M", |event, _| panic!("{event} delivered to the wrong namespace"));

    realm.events.emit("N", "zoomChange", json!({"zoom": 4})).unwrap();
    realm.events.emit("N", "last", Value::Null).unwrap();
    done_rx.await.unwrap();

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], ("zoomChange".to_string(), Value::from(json!({"zoom": 4}))));

    assert_eq!(realm.dispatcher.subscriber_count("N"), 1);
    subscription.unsubscribe();
    assert_eq!(realm.dispatcher.subscriber_count("N"), 0);
}

#[tokio::test]
async fn test_registrations_are_announced_and_withdrawn() {
    let (realm, handle) = connect(&["echo"]);
    let proxy = realm.dispatcher.wait_for_remote("N").await.unwrap();
    assert_eq!(proxy.methods().collect::<Vec<_>>(), vec!["echo"]);

    let late = Arc::new(Target::default());
    let _late = realm
        .surface
        .register("Late", ["foo"], late as Arc<dyn RemoteTarget>)
        .unwrap();
    let late_proxy = realm.dispatcher.wait_for_remote("Late").await.unwrap();
    assert_eq!(late_proxy.call("foo", 5i64).await.unwrap(), Value::from(5i64));

    handle.deregister();
    // Calls fail on the privileged side as soon as the namespace is gone.
    assert!(matches!(
        realm.dispatcher.call("N", "echo", Value::Null).await,
        Err(BridgeError::MethodNotFound { .. })
    ));
}

#[tokio::test]
async fn test_no_watcher_without_announcements() {
    let (app, main) = channel::pair();
    let surface = RemoteCapabilitySurface::new();
    let config = BridgeConfig {
        announce_registrations: false,
        ..BridgeConfig::default()
    };
    CapabilityServer::new(Arc::clone(&surface), main, config.clone()).spawn();
    let dispatcher = Dispatcher::spawn(app, config);

    let target = Arc::new(Target::default());
    let _handle = surface
        .register("N", ["echo"], target as Arc<dyn RemoteTarget>)
        .unwrap();
    assert_eq!(
        dispatcher.call("N", "echo", 1i64).await.unwrap(),
        Value::from(1i64)
    );
    assert_eq!(surface.watcher_count(), 0);
}

/// Counts targets whose call was dropped before finishing.
#[derive(Default)]
struct Stuck {
    started: Notify,
    dropped: Arc<AtomicUsize>,
}

struct DropFlag(Arc<AtomicUsize>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemoteTarget for Stuck {
    async fn call(&self, _method: &str, _args: Value) -> Result<Value> {
        let _flag = DropFlag(Arc::clone(&self.dropped));
        self.started.notify_one();
        std::future::pending::<()>().await;
        Ok(Value::Null)
    }
}

#[tokio::test]
async fn test_shutdown_stops_in_flight_calls() {
    let (app, main) = channel::pair();
    let surface = RemoteCapabilitySurface::new();
    let stuck = Arc::new(Stuck::default());
    let _handle = surface
        .register("N", ["hang"], Arc::clone(&stuck) as Arc<dyn RemoteTarget>)
        .unwrap();

    let server = CapabilityServer::new(Arc::clone(&surface), main, BridgeConfig::default()).spawn();
    let dispatcher = Dispatcher::spawn(app, BridgeConfig::default());

    let call = tokio::spawn({
        let dispatcher = dispatcher.clone();
        async move { dispatcher.call("N", "hang", Value::Null).await }
    });
    stuck.started.notified().await;

    dispatcher.close();
    server.await.unwrap();
    assert!(matches!(call.await.unwrap(), Err(BridgeError::ChannelClosed)));

    for _ in 0..1000 {
        if stuck.dropped.load(Ordering::SeqCst) == 1 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(stuck.dropped.load(Ordering::SeqCst), 1);
}
