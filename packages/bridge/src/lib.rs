//! Tandem Bridge: remote calls between the app and privileged contexts
//!
//! - `channel::pair`: the ordered, bidirectional mailbox of JSON frames
//! - `RemoteCapabilitySurface`: the per-namespace method whitelist, the sole
//!   authorization boundary
//! - `CapabilityServer`: serves the surface on the privileged end
//! - `Dispatcher` / `RemoteProxy`: correlation ids, pending invocations and
//!   event routing on the app end
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use tandem_bridge::{
//!     channel, BridgeConfig, CapabilityServer, Dispatcher, RemoteCapabilitySurface,
//!     RemoteTarget, Result,
//! };
//! use tandem_core::Value;
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl RemoteTarget for Echo {
//!     async fn call(&self, _method: &str, args: Value) -> Result<Value> {
//!         Ok(args)
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<()> {
//! let (app, main) = channel::pair();
//! let surface = RemoteCapabilitySurface::new();
//! let _registration = surface.register("Demo.Echo", ["echo"], Arc::new(Echo))?;
//! CapabilityServer::new(surface, main, BridgeConfig::default()).spawn();
//!
//! let dispatcher = Dispatcher::spawn(app, BridgeConfig::default());
//! let value = dispatcher.call("Demo.Echo", "echo", Value::from("hi")).await?;
//! assert_eq!(value, Value::from("hi"));
//! # Ok(())
//! # }
//! ```

pub mod channel;
mod config;
mod dispatcher;
mod error;
mod message;
mod proxy;
mod server;
mod surface;

pub use channel::{Endpoint, EndpointReceiver, EndpointSender};
pub use config::BridgeConfig;
pub use dispatcher::{Dispatcher, PendingInvocation, StaleInvocation, Subscription};
pub use error::{BridgeError, ErrorInfo, ErrorKind, Result};
pub use message::{Announcement, CorrelationId, Message, DEREGISTER_EVENT, REGISTER_EVENT};
pub use proxy::{RemoteMethod, RemoteProxy};
pub use server::{CapabilityServer, EventEmitter};
pub use surface::{RegistrationHandle, RemoteCapabilitySurface, RemoteTarget, SurfaceChange};
