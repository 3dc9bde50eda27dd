//! Tandem Widgets: components and addons built on the class system and the
//! bridge
//!
//! - `Neo.component.Legend` and `Neo.form.Fieldset`
//! - `Neo.sitemap.Container` with its [`DataStore`]s
//! - `Docs.app.view.ExamplesTreeList`
//! - the privileged Google Maps addon and its app-side [`MapsRemote`]
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use tandem_core::{register_base_classes, ConfigRegistry, Configurator};
//! use tandem_widgets::{fieldset, register_widgets};
//!
//! let registry = ConfigRegistry::new();
//! register_base_classes(&registry);
//! register_widgets(&registry);
//!
//! let configurator = Configurator::new(registry);
//! let mut fieldset = configurator
//!     .construct(fieldset::FIELDSET, json!({"title": "Options"}).into())
//!     .unwrap();
//! assert!(fieldset.vdom().has_cls("neo-collapsed"));
//!
//! fieldset::on_legend_click(&mut fieldset).unwrap();
//! assert!(!fieldset.vdom().has_cls("neo-collapsed"));
//! ```

pub mod examples_tree;
pub mod fieldset;
pub mod legend;
pub mod maps;
pub mod sitemap;
mod store;

pub use maps::{MapsAddon, MapsRemote, MapsSdk};
pub use store::{DataStore, FILTER, LOAD, RECORD_CHANGE, SORT};

use tandem_core::ConfigRegistry;

/// Register every widget class. The base classes must be registered too.
pub fn register_widgets(registry: &ConfigRegistry) {
    legend::register(registry);
    fieldset::register(registry);
    sitemap::register(registry);
    examples_tree::register(registry);
}
