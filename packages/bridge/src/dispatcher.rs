//! The app side of a channel: correlation ids, pending invocations, event
//! routing.
//!
//! [`Dispatcher::call`] records a [`PendingInvocation`] before the request
//! leaves, then waits on its oneshot. A pump task owns the receiving half of
//! the endpoint and completes pending invocations strictly by correlation
//! id, so responses may arrive in any order. When the channel closes every
//! pending invocation fails with `ChannelClosed` in one sweep, and so does
//! every later call.
//!
//! There is no timeout. A caller that stops caring drops its future; the
//! invocation still completes when its response arrives and the result is
//! discarded.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use tandem_core::{Teardown, Value};
use tokio::sync::{oneshot, watch};
use tracing::{debug, trace, warn};

use crate::channel::{Endpoint, EndpointReceiver, EndpointSender};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, ErrorInfo, Result};
use crate::message::{Announcement, CorrelationId, Message, DEREGISTER_EVENT, REGISTER_EVENT};
use crate::proxy::RemoteProxy;

/// A remote call waiting for its response.
pub struct PendingInvocation {
    pub correlation_id: CorrelationId,
    pub namespace: String,
    pub method_name: String,
    pub created_at: Instant,
    responder: oneshot::Sender<Result<Value>>,
}

impl fmt::Debug for PendingInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingInvocation")
            .field("correlation_id", &self.correlation_id)
            .field("namespace", &self.namespace)
            .field("method_name", &self.method_name)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// A pending invocation older than the configured threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleInvocation {
    pub correlation_id: CorrelationId,
    pub namespace: String,
    pub method_name: String,
    pub age: Duration,
}

type EventHandler = Arc<dyn Fn(&str, &Value) + Send + Sync>;

#[derive(Default)]
struct State {
    pending: HashMap<CorrelationId, PendingInvocation>,
    subscribers: HashMap<String, Vec<(u64, EventHandler)>>,
    remotes: BTreeMap<String, BTreeSet<String>>,
    closed: bool,
}

struct Shared {
    state: Mutex<State>,
    next_correlation_id: AtomicU64,
    next_subscriber_id: AtomicU64,
    sender: EndpointSender,
    config: BridgeConfig,
    remotes_changed: watch::Sender<u64>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn complete(
        &self,
        correlation_id: CorrelationId,
        ok: bool,
        value: Option<Value>,
        error_info: Option<ErrorInfo>,
    ) {
        let Some(pending) = self.state().pending.remove(&correlation_id) else {
            warn!(correlation_id, "response for unknown correlation id");
            return;
        };

        let outcome = if ok {
            Ok(value.unwrap_or_default())
        } else {
            let info = error_info.unwrap_or_else(|| {
                ErrorInfo::application("failed response carried no error info")
            });
            Err(BridgeError::from_info(
                info,
                &pending.namespace,
                &pending.method_name,
            ))
        };

        trace!(
            correlation_id,
            namespace = %pending.namespace,
            method = %pending.method_name,
            ok,
            "response matched"
        );
        if pending.responder.send(outcome).is_err() {
            trace!(correlation_id, "caller no longer waiting");
        }
    }

    fn route_event(&self, namespace: String, event_name: String, payload: Value) {
        match event_name.as_str() {
            REGISTER_EVENT => {
                let methods = match payload.deserialize::<Announcement>() {
                    Ok(announcement) => announcement.methods,
                    Err(e) => {
                        warn!(namespace = %namespace, error = %e, "malformed registration announcement");
                        return;
                    }
                };
                debug!(namespace = %namespace, methods = methods.len(), "remote announced");
                self.state()
                    .remotes
                    .insert(namespace, methods.into_iter().collect());
                self.remotes_changed.send_modify(|generation| *generation += 1);
            }
            DEREGISTER_EVENT => {
                debug!(namespace = %namespace, "remote withdrawn");
                self.state().remotes.remove(&namespace);
                self.remotes_changed.send_modify(|generation| *generation += 1);
            }
            _ => {
                let handlers: Vec<EventHandler> = self
                    .state()
                    .subscribers
                    .get(&namespace)
                    .map(|handlers| handlers.iter().map(|(_, h)| Arc::clone(h)).collect())
                    .unwrap_or_default();
                trace!(
                    namespace = %namespace,
                    event = %event_name,
                    subscribers = handlers.len(),
                    "event"
                );
                for handler in handlers {
                    handler(&event_name, &payload);
                }
            }
        }
    }

    fn reject_request(&self, correlation_id: CorrelationId, namespace: &str, method: &str) {
        warn!(correlation_id, namespace, method, "app context serves no remote methods");
        let info = BridgeError::method_not_found(namespace, method).to_info();
        if self.sender.send(&Message::error(correlation_id, info)).is_err() {
            trace!(correlation_id, "channel closed before rejection was sent");
        }
    }

    /// Fail every pending invocation and refuse new ones.
    fn close(&self) {
        let drained: Vec<PendingInvocation> = {
            let mut state = self.state();
            if state.closed {
                return;
            }
            state.closed = true;
            state.remotes.clear();
            state.pending.drain().map(|(_, pending)| pending).collect()
        };
        debug!(pending = drained.len(), "dispatcher closed");
        for pending in drained {
            if pending.responder.send(Err(BridgeError::ChannelClosed)).is_err() {
                trace!(correlation_id = pending.correlation_id, "caller no longer waiting");
            }
        }
        self.remotes_changed.send_modify(|generation| *generation += 1);
    }
}

async fn pump(shared: Arc<Shared>, mut receiver: EndpointReceiver) {
    while let Some(message) = receiver.recv().await {
        match message {
            Ok(Message::Response {
                correlation_id,
                ok,
                value,
                error_info,
            }) => shared.complete(correlation_id, ok, value, error_info),
            Ok(Message::Event {
                namespace,
                event_name,
                payload,
            }) => shared.route_event(namespace, event_name, payload),
            Ok(Message::Request {
                correlation_id,
                namespace,
                method_name,
                ..
            }) => shared.reject_request(correlation_id, &namespace, &method_name),
            Err(e) => warn!(error = %e, "undecodable frame on dispatcher"),
        }
    }
    shared.close();
}

/// Issues remote calls and routes events. Cheap to clone; clones share
/// pending invocations and subscribers.
#[derive(Clone)]
pub struct Dispatcher {
    shared: Arc<Shared>,
}

impl Dispatcher {
    /// Take over `endpoint` and start the receive pump on the current
    /// runtime.
    pub fn spawn(endpoint: Endpoint, config: BridgeConfig) -> Self {
        let (sender, receiver) = endpoint.split();
        let shared = Arc::new(Shared {
            state: Mutex::new(State::default()),
            next_correlation_id: AtomicU64::new(0),
            next_subscriber_id: AtomicU64::new(0),
            sender,
            config,
            remotes_changed: watch::Sender::new(0),
        });
        tokio::spawn(pump(Arc::clone(&shared), receiver));
        Self { shared }
    }

    /// Call `namespace.method_name` on the privileged side.
    pub async fn call(
        &self,
        namespace: &str,
        method_name: &str,
        args: impl Into<Value>,
    ) -> Result<Value> {
        let correlation_id = self.shared.next_correlation_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (responder, response) = oneshot::channel();

        {
            let mut state = self.shared.state();
            if state.closed {
                return Err(BridgeError::ChannelClosed);
            }
            state.pending.insert(
                correlation_id,
                PendingInvocation {
                    correlation_id,
                    namespace: namespace.to_string(),
                    method_name: method_name.to_string(),
                    created_at: Instant::now(),
                    responder,
                },
            );
        }

        let request = Message::Request {
            correlation_id,
            namespace: namespace.to_string(),
            method_name: method_name.to_string(),
            args: args.into(),
        };
        if let Err(e) = self.shared.sender.send(&request) {
            self.shared.state().pending.remove(&correlation_id);
            return Err(e);
        }
        trace!(correlation_id, namespace, method = method_name, "request sent");

        response.await.unwrap_or(Err(BridgeError::ChannelClosed))
    }

    /// Subscribe to events pushed under `namespace`.
    pub fn subscribe<F>(&self, namespace: &str, handler: F) -> Subscription
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        let id = self.shared.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        self.shared
            .state()
            .subscribers
            .entry(namespace.to_string())
            .or_default()
            .push((id, Arc::new(handler)));
        Subscription {
            shared: Arc::downgrade(&self.shared),
            namespace: namespace.to_string(),
            id,
        }
    }

    pub fn subscriber_count(&self, namespace: &str) -> usize {
        self.shared
            .state()
            .subscribers
            .get(namespace)
            .map_or(0, Vec::len)
    }

    /// A proxy for a statically declared method list.
    pub fn proxy<I, S>(&self, namespace: &str, methods: I) -> RemoteProxy
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RemoteProxy::new(
            self.clone(),
            namespace,
            methods.into_iter().map(Into::into).collect(),
        )
    }

    /// A proxy for a namespace the privileged side has announced.
    pub fn remote(&self, namespace: &str) -> Option<RemoteProxy> {
        let methods = self.shared.state().remotes.get(namespace).cloned()?;
        Some(RemoteProxy::new(self.clone(), namespace, methods))
    }

    /// Namespaces announced so far.
    pub fn remotes(&self) -> Vec<String> {
        self.shared.state().remotes.keys().cloned().collect()
    }

    /// Wait until `namespace` is announced.
    pub async fn wait_for_remote(&self, namespace: &str) -> Result<RemoteProxy> {
        let mut changed = self.shared.remotes_changed.subscribe();
        loop {
            if let Some(proxy) = self.remote(namespace) {
                return Ok(proxy);
            }
            if self.is_closed() {
                return Err(BridgeError::ChannelClosed);
            }
            changed
                .changed()
                .await
                .map_err(|_| BridgeError::ChannelClosed)?;
        }
    }

    pub fn pending_count(&self) -> usize {
        self.shared.state().pending.len()
    }

    /// Pending invocations older than `BridgeConfig::stale_after_secs`.
    pub fn stale(&self) -> Vec<StaleInvocation> {
        let threshold = self.shared.config.stale_after();
        let now = Instant::now();
        let state = self.shared.state();
        let mut stale: Vec<StaleInvocation> = state
            .pending
            .values()
            .filter_map(|pending| {
                let age = now.saturating_duration_since(pending.created_at);
                (age >= threshold).then(|| StaleInvocation {
                    correlation_id: pending.correlation_id,
                    namespace: pending.namespace.clone(),
                    method_name: pending.method_name.clone(),
                    age,
                })
            })
            .collect();
        stale.sort_by_key(|s| s.correlation_id);
        stale
    }

    /// Close the channel and fail every pending call with `ChannelClosed`.
    pub fn close(&self) {
        self.shared.sender.close();
        self.shared.close();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state().closed
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state();
        f.debug_struct("Dispatcher")
            .field("pending", &state.pending.len())
            .field("remotes", &state.remotes.keys().collect::<Vec<_>>())
            .field("closed", &state.closed)
            .finish()
    }
}

/// An event subscription. Dropping it unsubscribes.
#[must_use = "dropping the subscription unsubscribes"]
pub struct Subscription {
    shared: Weak<Shared>,
    namespace: String,
    id: u64,
}

impl Subscription {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn unsubscribe(self) {
        drop(self);
    }

    /// Hand the subscription to a component so it is released on destroy.
    pub fn into_teardown(self) -> Box<dyn Teardown> {
        Box::new(move || self.unsubscribe())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let mut state = shared.state();
        if let Some(handlers) = state.subscribers.get_mut(&self.namespace) {
            handlers.retain(|(id, _)| *id != self.id);
            if handlers.is_empty() {
                state.subscribers.remove(&self.namespace);
            }
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("namespace", &self.namespace)
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::pair;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn responses_are_matched_by_correlation_id() {
        let (app, mut main) = pair();
        let dispatcher = Dispatcher::spawn(app, BridgeConfig::default());

        let first = tokio::spawn({
            let dispatcher = dispatcher.clone();
            async move { dispatcher.call("N", "slow", Value::from(1i64)).await }
        });
        let Some(Ok(Message::Request { correlation_id: slow, .. })) = main.recv().await else {
            panic!("expected request");
        };

        let second = tokio::spawn({
            let dispatcher = dispatcher.clone();
            async move { dispatcher.call("N", "fast", Value::from(2i64)).await }
        });
        let Some(Ok(Message::Request { correlation_id: fast, .. })) = main.recv().await else {
            panic!("expected request");
        };
        assert_ne!(slow, fast);

        main.send(&Message::ok(fast, Value::from("fast"))).unwrap();
        assert_eq!(second.await.unwrap().unwrap(), Value::from("fast"));
        assert!(!first.is_finished());
        assert_eq!(dispatcher.pending_count(), 1);

        main.send(&Message::ok(slow, Value::from("slow"))).unwrap();
        assert_eq!(first.await.unwrap().unwrap(), Value::from("slow"));
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[tokio::test]
    async fn stray_requests_are_rejected() {
        let (app, mut main) = pair();
        let _dispatcher = Dispatcher::spawn(app, BridgeConfig::default());

        main.send(&Message::Request {
            correlation_id: 99,
            namespace: "App".into(),
            method_name: "anything".into(),
            args: Value::Null,
        })
        .unwrap();

        match main.recv().await {
            Some(Ok(Message::Response {
                correlation_id: 99,
                ok: false,
                error_info: Some(info),
                ..
            })) => assert_eq!(info.kind, ErrorKind::MethodNotFound),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn stale_reports_old_pending_calls() {
        let (app, _main) = pair();
        let config = BridgeConfig {
            stale_after_secs: 0,
            ..BridgeConfig::default()
        };
        let dispatcher = Dispatcher::spawn(app, config);

        let call = tokio::spawn({
            let dispatcher = dispatcher.clone();
            async move { dispatcher.call("N", "geocode", Value::Null).await }
        });
        while dispatcher.pending_count() == 0 {
            tokio::task::yield_now().await;
        }

        let stale = dispatcher.stale();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].method_name, "geocode");

        dispatcher.close();
        assert!(matches!(call.await.unwrap(), Err(BridgeError::ChannelClosed)));
    }
}
