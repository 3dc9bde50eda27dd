//! The privileged side of a channel.
//!
//! A [`CapabilityServer`] reads requests off its endpoint and answers each
//! through the surface in its own task, so a slow SDK call never holds up a
//! fast one. Responses go out in completion order; the dispatcher matches
//! them by correlation id.

use std::any::Any;
use std::sync::Arc;

use tandem_core::Value;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle, JoinSet};
use tracing::{debug, error, warn};

use crate::channel::{Endpoint, EndpointSender};
use crate::config::BridgeConfig;
use crate::error::{ErrorInfo, ErrorKind, Result};
use crate::message::{Announcement, CorrelationId, Message, DEREGISTER_EVENT, REGISTER_EVENT};
use crate::surface::{RemoteCapabilitySurface, SurfaceChange};

/// Pushes unsolicited events to the app context. Fire-and-forget.
#[derive(Clone)]
pub struct EventEmitter {
    sender: EndpointSender,
}

impl EventEmitter {
    pub fn new(sender: EndpointSender) -> Self {
        Self { sender }
    }

    pub fn emit(
        &self,
        namespace: &str,
        event_name: &str,
        payload: impl Into<Value>,
    ) -> Result<()> {
        self.sender
            .send(&Message::event(namespace, event_name, payload))
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Serves a [`RemoteCapabilitySurface`] over one endpoint.
pub struct CapabilityServer {
    surface: Arc<RemoteCapabilitySurface>,
    endpoint: Endpoint,
    config: BridgeConfig,
}

impl CapabilityServer {
    pub fn new(
        surface: Arc<RemoteCapabilitySurface>,
        endpoint: Endpoint,
        config: BridgeConfig,
    ) -> Self {
        Self {
            surface,
            endpoint,
            config,
        }
    }

    /// An emitter sharing this server's endpoint.
    pub fn events(&self) -> EventEmitter {
        EventEmitter::new(self.endpoint.sender())
    }

    /// Run on the current runtime until the channel closes.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Serve requests until the channel closes. In-flight handlers are
    /// aborted on close and have stopped when this returns; their
    /// responses could no longer be delivered.
    pub async fn run(self) {
        let (sender, mut receiver) = self.endpoint.split();

        let mut changes = None;
        if self.config.announce_registrations {
            let (snapshot, watcher) = self.surface.watch();
            for change in snapshot {
                announce_change(&sender, change);
            }
            changes = Some(watcher);
        }

        let mut tasks = JoinSet::new();
        loop {
            tokio::select! {
                message = receiver.recv() => match message {
                    None => break,
                    Some(Ok(Message::Request { correlation_id, namespace, method_name, args })) => {
                        let surface = Arc::clone(&self.surface);
                        let sender = sender.clone();
                        tasks.spawn(async move {
                            let response =
                                serve(surface, correlation_id, namespace, method_name, args).await;
                            if sender.send(&response).is_err() {
                                debug!(correlation_id, "channel closed before response was sent");
                            }
                        });
                    }
                    Some(Ok(other)) => {
                        warn!(message = ?other, "capability server ignores non-request message");
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "undecodable frame on capability server");
                    }
                },
                Some(change) = next_change(&mut changes) => announce_change(&sender, change),
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "request task failed");
                    }
                }
            }
        }

        let in_flight = tasks.len();
        tasks.abort_all();
        while tasks.join_next().await.is_some() {}
        debug!(in_flight, "capability server stopped");
    }
}

async fn next_change(
    changes: &mut Option<mpsc::UnboundedReceiver<SurfaceChange>>,
) -> Option<SurfaceChange> {
    match changes {
        Some(changes) => changes.recv().await,
        None => std::future::pending().await,
    }
}

/// Aborts the call task when the request task is dropped, so aborting a
/// request also stops the target it called.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn announce_change(sender: &EndpointSender, change: SurfaceChange) {
    let message = match change {
        SurfaceChange::Registered { namespace, methods } => {
            match Value::from_serialize(&Announcement { methods }) {
                Ok(payload) => Message::event(namespace, REGISTER_EVENT, payload),
                Err(e) => {
                    error!(error = %e, "failed to encode announcement");
                    return;
                }
            }
        }
        SurfaceChange::Deregistered { namespace } => {
            Message::event(namespace, DEREGISTER_EVENT, Value::Null)
        }
    };
    if sender.send(&message).is_err() {
        debug!("channel closed before announcement was sent");
    }
}

/// Answer one request. The call runs in its own task so a panicking target
/// becomes an error response instead of taking the server down.
async fn serve(
    surface: Arc<RemoteCapabilitySurface>,
    correlation_id: CorrelationId,
    namespace: String,
    method_name: String,
    args: Value,
) -> Message {
    let call = tokio::spawn({
        let namespace = namespace.clone();
        let method_name = method_name.clone();
        async move {
            surface
                .respond(correlation_id, &namespace, &method_name, args)
                .await
        }
    });
    let _abort = AbortOnDrop(call.abort_handle());

    match call.await {
        Ok(response) => response,
        Err(e) if e.is_panic() => {
            let message = panic_message(e.into_panic());
            error!(namespace = %namespace, method = %method_name, correlation_id, panic = %message, "remote method panicked");
            Message::error(correlation_id, ErrorInfo::new(ErrorKind::Panic, message))
        }
        Err(_) => Message::error(
            correlation_id,
            ErrorInfo::new(ErrorKind::ChannelClosed, "request cancelled"),
        ),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "remote method panicked".to_string()
    }
}
