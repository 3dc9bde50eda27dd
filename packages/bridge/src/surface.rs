//! The remote capability surface: the whitelist of what the app context may
//! call.
//!
//! A privileged object registers under a namespace with an explicit list of
//! method names. [`RemoteCapabilitySurface::invoke`] refuses anything not on
//! that list with `MethodNotFound` before the target is touched; the target
//! is never reflected over.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use async_trait::async_trait;
use tandem_core::{Teardown, Value};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::{BridgeError, Result};
use crate::message::{CorrelationId, Message};

/// A privileged object that serves remote calls.
///
/// Implementations dispatch on `method` themselves; the surface guarantees
/// that only whitelisted names ever reach them.
#[async_trait]
pub trait RemoteTarget: Send + Sync {
    async fn call(&self, method: &str, args: Value) -> Result<Value>;
}

/// A change to the set of registrations, delivered to capability servers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceChange {
    Registered {
        namespace: String,
        methods: Vec<String>,
    },
    Deregistered {
        namespace: String,
    },
}

struct Registration {
    methods: BTreeSet<String>,
    target: Arc<dyn RemoteTarget>,
}

/// Registry of privileged objects by namespace.
#[derive(Default)]
pub struct RemoteCapabilitySurface {
    registrations: RwLock<BTreeMap<String, Registration>>,
    watchers: Mutex<Vec<mpsc::UnboundedSender<SurfaceChange>>>,
}

impl RemoteCapabilitySurface {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register `target` under `namespace`, exposing exactly `methods`.
    ///
    /// The registration lives until the returned handle is dropped or
    /// deregistered.
    pub fn register<I, S>(
        self: &Arc<Self>,
        namespace: &str,
        methods: I,
        target: Arc<dyn RemoteTarget>,
    ) -> Result<RegistrationHandle>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let methods: BTreeSet<String> = methods.into_iter().map(Into::into).collect();
        let mut registrations = self
            .registrations
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if registrations.contains_key(namespace) {
            return Err(BridgeError::NamespaceTaken(namespace.to_string()));
        }

        debug!(namespace, methods = methods.len(), "remote namespace registered");
        self.broadcast(SurfaceChange::Registered {
            namespace: namespace.to_string(),
            methods: methods.iter().cloned().collect(),
        });
        registrations.insert(namespace.to_string(), Registration { methods, target });

        Ok(RegistrationHandle {
            surface: Arc::downgrade(self),
            namespace: namespace.to_string(),
        })
    }

    fn deregister(&self, namespace: &str) {
        let mut registrations = self
            .registrations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if registrations.remove(namespace).is_some() {
            debug!(namespace, "remote namespace deregistered");
            self.broadcast(SurfaceChange::Deregistered {
                namespace: namespace.to_string(),
            });
        }
    }

    fn broadcast(&self, change: SurfaceChange) {
        let mut watchers = self.watchers.lock().unwrap_or_else(PoisonError::into_inner);
        watchers.retain(|watcher| watcher.send(change.clone()).is_ok());
    }

    /// Current registrations plus a stream of later changes. Taken under
    /// one lock, so no change is missed or seen twice.
    pub fn watch(&self) -> (Vec<SurfaceChange>, mpsc::UnboundedReceiver<SurfaceChange>) {
        let registrations = self
            .registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let snapshot = registrations
            .iter()
            .map(|(namespace, registration)| SurfaceChange::Registered {
                namespace: namespace.clone(),
                methods: registration.methods.iter().cloned().collect(),
            })
            .collect();

        let (tx, rx) = mpsc::unbounded_channel();
        self.watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        (snapshot, rx)
    }

    /// Number of live change watchers.
    pub fn watcher_count(&self) -> usize {
        self.watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_registered(&self, namespace: &str) -> bool {
        self.registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(namespace)
    }

    pub fn namespaces(&self) -> Vec<String> {
        self.registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Whitelisted methods of a namespace.
    pub fn methods(&self, namespace: &str) -> Option<Vec<String>> {
        self.registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(namespace)
            .map(|r| r.methods.iter().cloned().collect())
    }

    /// Call a whitelisted method.
    pub async fn invoke(&self, namespace: &str, method: &str, args: Value) -> Result<Value> {
        let target = {
            let registrations = self
                .registrations
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            match registrations.get(namespace) {
                Some(registration) if registration.methods.contains(method) => {
                    Arc::clone(&registration.target)
                }
                _ => {
                    debug!(namespace, method, "rejected call outside the whitelist");
                    return Err(BridgeError::method_not_found(namespace, method));
                }
            }
        };

        trace!(namespace, method, "invoke");
        target.call(method, args).await
    }

    /// Call a whitelisted method and normalize the outcome into a response
    /// envelope.
    pub async fn respond(
        &self,
        correlation_id: CorrelationId,
        namespace: &str,
        method: &str,
        args: Value,
    ) -> Message {
        match self.invoke(namespace, method, args).await {
            Ok(value) => Message::ok(correlation_id, value),
            Err(error) => {
                debug!(namespace, method, correlation_id, error = %error, "remote call failed");
                Message::error(correlation_id, error.to_info())
            }
        }
    }
}

impl fmt::Debug for RemoteCapabilitySurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteCapabilitySurface")
            .field("namespaces", &self.namespaces())
            .finish()
    }
}

/// Keeps a registration alive. Dropping it deregisters the namespace.
#[must_use = "dropping the handle deregisters the namespace"]
pub struct RegistrationHandle {
    surface: Weak<RemoteCapabilitySurface>,
    namespace: String,
}

impl RegistrationHandle {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn deregister(self) {
        drop(self);
    }

    /// Hand the registration to a component so it is released on destroy.
    pub fn into_teardown(self) -> Box<dyn Teardown> {
        Box::new(move || self.deregister())
    }
}

impl Drop for RegistrationHandle {
    fn drop(&mut self) {
        if let Some(surface) = self.surface.upgrade() {
            surface.deregister(&self.namespace);
        }
    }
}

impl fmt::Debug for RegistrationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationHandle")
            .field("namespace", &self.namespace)
            .finish()
    }
}
