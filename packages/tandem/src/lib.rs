//! Tandem: reactive components split across an app context and a
//! privileged context
//!
//! This crate wires the layers together:
//!
//! - [`tandem_core`]: class schemas, reactive properties, mutation scopes
//! - [`tandem_bridge`]: the channel and remote calls between contexts
//! - [`tandem_widgets`]: the widgets and addons built on both
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use tandem::{Realms, TandemConfig};
//! use tandem::widgets::fieldset::FIELDSET;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> tandem::Result<()> {
//! let mut realms = Realms::connect(TandemConfig::default());
//! let mut updates = realms.take_updates().unwrap();
//!
//! let mut fieldset = realms
//!     .configurator()
//!     .construct(FIELDSET, json!({"title": "Options"}).into())?;
//! fieldset.set("collapsed", false)?;
//!
//! let update = updates.recv().await.unwrap();
//! assert!(fieldset.find(update.component).is_some());
//!
//! realms.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod realms;

pub use config::TandemConfig;
pub use error::{Result, TandemError};
pub use realms::Realms;

pub use tandem_bridge as bridge;
pub use tandem_core as reactive;
pub use tandem_widgets as widgets;

pub use tandem_bridge::{BridgeConfig, BridgeError, Dispatcher, RemoteProxy};
pub use tandem_core::{Component, ConfigError, Configurator, ReactiveConfig, Value};
