//! App-side stubs for a remote namespace.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tandem_core::Value;
use tracing::debug;

use crate::dispatcher::{Dispatcher, Subscription};
use crate::error::{BridgeError, Result};

/// Calls into one remote namespace as if it were local.
///
/// Methods missing from the proxy's list are rejected here with
/// `MethodNotFound` without touching the channel. The privileged side
/// checks its own whitelist regardless.
#[derive(Clone)]
pub struct RemoteProxy {
    dispatcher: Dispatcher,
    namespace: String,
    methods: Arc<BTreeSet<String>>,
}

impl RemoteProxy {
    pub(crate) fn new(dispatcher: Dispatcher, namespace: &str, methods: BTreeSet<String>) -> Self {
        Self {
            dispatcher,
            namespace: namespace.to_string(),
            methods: Arc::new(methods),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.methods.iter().map(String::as_str)
    }

    pub fn has_method(&self, method: &str) -> bool {
        self.methods.contains(method)
    }

    pub async fn call(&self, method: &str, args: impl Into<Value>) -> Result<Value> {
        if !self.has_method(method) {
            debug!(namespace = %self.namespace, method, "call rejected by proxy");
            return Err(BridgeError::method_not_found(&self.namespace, method));
        }
        self.dispatcher.call(&self.namespace, method, args).await
    }

    /// Typed call: `args` is serialized, the result deserialized.
    pub async fn call_as<A, R>(&self, method: &str, args: &A) -> Result<R>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let args = Value::from_serialize(args)?;
        let result = self.call(method, args).await?;
        Ok(result.deserialize()?)
    }

    /// A callable stub for one method.
    pub fn method(&self, method: &str) -> Result<RemoteMethod> {
        if !self.has_method(method) {
            return Err(BridgeError::method_not_found(&self.namespace, method));
        }
        Ok(RemoteMethod {
            proxy: self.clone(),
            method: method.to_string(),
        })
    }

    /// Subscribe to events this namespace pushes.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        self.dispatcher.subscribe(&self.namespace, handler)
    }
}

impl fmt::Debug for RemoteProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteProxy")
            .field("namespace", &self.namespace)
            .field("methods", &self.methods)
            .finish()
    }
}

/// One remote method bound to its namespace.
#[derive(Debug, Clone)]
pub struct RemoteMethod {
    proxy: RemoteProxy,
    method: String,
}

impl RemoteMethod {
    pub fn name(&self) -> &str {
        &self.method
    }

    pub async fn call(&self, args: impl Into<Value>) -> Result<Value> {
        self.proxy.call(&self.method, args).await
    }
}
