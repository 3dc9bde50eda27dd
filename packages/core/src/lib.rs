//! Tandem Core: inheritable reactive class configuration
//!
//! This layer turns class declarations into live components:
//! - `ConfigRegistry`: folds a class's config layer over its ancestors'
//!   into one memoized schema
//! - reactive writes: equality check, `beforeSet`, store, `afterSet`
//! - `Configurator`: builds instances from a constructor config in schema
//!   order
//! - `MutationScope`: stages render-tree writes and commits them once per
//!   outermost scope
//! - `Observable`: named-event subscriptions for stores and singletons
//!
//! # Example
//!
//! ```rust
//! use tandem_core::{ClassDecl, ConfigEntry, ConfigLayer, ConfigRegistry, Configurator, Value};
//!
//! let registry = ConfigRegistry::new();
//! tandem_core::register_base_classes(&registry);
//! registry.define(
//!     ClassDecl::new("Demo.Badge")
//!         .extends(tandem_core::base::COMPONENT)
//!         .config(ConfigLayer::new().with(ConfigEntry::reactive("label", "")))
//!         .after_set("label", |scope, value, _old| {
//!             scope.vdom_mut().text = value.as_str().map(str::to_string);
//!             Ok(())
//!         }),
//! );
//!
//! let configurator = Configurator::new(registry);
//! let mut badge = configurator.construct("Demo.Badge", Value::Null).unwrap();
//! badge.set("label", "new").unwrap();
//! assert_eq!(badge.vdom().text.as_deref(), Some("new"));
//! ```

pub mod base;
mod class;
mod component;
mod config;
mod configurator;
mod error;
mod observable;
mod reactive;
mod registry;
mod scope;
mod value;
mod vdom;

pub use base::register_base_classes;
pub use class::{
    AfterSetFn, BeforeSetFn, ClassDecl, ConfigEntry, ConfigLayer, Equality, LifecycleFn,
    PropertyHooks, Visibility, REACTIVE_MARKER,
};
pub use component::{Component, ComponentId, Extensions, Teardown, TreeChanged, UpdateSink};
pub use config::ReactiveConfig;
pub use configurator::Configurator;
pub use error::{ConfigError, HookError, Result};
pub use observable::{ListenerId, Observable};
pub use registry::{ClassSchema, ConfigRegistry, SchemaEntry};
pub use scope::MutationScope;
pub use value::Value;
pub use vdom::VNode;
