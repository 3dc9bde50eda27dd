//! Instance construction.
//!
//! [`Configurator::construct`] applies a constructor config against the
//! resolved schema of a class:
//!
//! 1. keys absent from the schema are rejected before anything runs
//! 2. plain entries are assigned (supplied value or default), no hooks
//! 3. reactive entries are written in schema order through the normal
//!    setter path, defaults included, except quiet defaults which are stored
//!    without hooks
//! 4. each class's `on_constructed` hook runs once, root ancestor first
//!
//! Steps 3 and 4 share one silent mutation scope, so the initial render tree
//! is committed in one swap without a change notification; whoever mounts
//! the component reads [`Component::vdom`].

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::class::kind_of;
use crate::component::{Component, ComponentId, UpdateSink};
use crate::config::ReactiveConfig;
use crate::error::{ConfigError, Result};
use crate::registry::ConfigRegistry;
use crate::value::Value;

/// Builds components from a registry.
///
/// Every component keeps a clone of the configurator that built it, so
/// children constructed from hooks share the same registry, limits and
/// update sink.
#[derive(Clone)]
pub struct Configurator {
    registry: ConfigRegistry,
    config: Arc<ReactiveConfig>,
    sink: Option<UpdateSink>,
}

impl Configurator {
    pub fn new(registry: ConfigRegistry) -> Self {
        Self {
            registry,
            config: Arc::new(ReactiveConfig::default()),
            sink: None,
        }
    }

    pub fn with_config(mut self, config: ReactiveConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    /// Deliver `TreeChanged` notifications of every component built by this
    /// configurator to `sink`.
    pub fn with_sink(mut self, sink: UpdateSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn registry(&self) -> &ConfigRegistry {
        &self.registry
    }

    pub fn reactive_config(&self) -> &ReactiveConfig {
        &self.config
    }

    pub fn sink(&self) -> Option<&UpdateSink> {
        self.sink.as_ref()
    }

    /// Construct a root component.
    pub fn construct(&self, class_name: &str, config: Value) -> Result<Component> {
        self.construct_in(class_name, config, None)
    }

    /// Construct a component with an optional parent back-reference.
    pub fn construct_in(
        &self,
        class_name: &str,
        config: Value,
        parent: Option<ComponentId>,
    ) -> Result<Component> {
        let schema = self.registry.resolve_schema(class_name)?;

        let mut supplied: BTreeMap<String, Value> = match config {
            Value::Null => BTreeMap::new(),
            Value::Map(map) => map,
            other => {
                return Err(ConfigError::InvalidConfig {
                    class: class_name.to_string(),
                    found: kind_of(&other).to_string(),
                })
            }
        };

        if let Some(key) = supplied.keys().find(|key| !schema.contains(key)) {
            return Err(ConfigError::UnknownConfigKey {
                class: class_name.to_string(),
                key: key.clone(),
            });
        }

        let mut component = Component::new(Arc::clone(&schema), self.clone(), parent);

        for (index, entry) in schema.entries().iter().enumerate() {
            if !entry.reactive {
                let value = supplied
                    .remove(&entry.name)
                    .unwrap_or_else(|| entry.default.clone());
                component.values[index] = Some(value);
            }
        }

        component.run_scope(true, |scope| {
            for (index, entry) in schema.entries().iter().enumerate() {
                if !entry.reactive {
                    continue;
                }
                match supplied.remove(&entry.name) {
                    Some(value) => scope.write_reactive(&schema, index, value)?,
                    None if entry.quiet => {
                        scope.component.values[index] = Some(entry.default.clone());
                    }
                    None => scope.write_reactive(&schema, index, entry.default.clone())?,
                }
            }
            for hook in schema.on_constructed() {
                hook(scope)?;
            }
            Ok(())
        })?;

        debug!(
            class = %class_name,
            component = %component.id(),
            "component constructed"
        );
        Ok(component)
    }
}

impl std::fmt::Debug for Configurator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Configurator")
            .field("config", &self.config)
            .field("sink", &self.sink.is_some())
            .finish_non_exhaustive()
    }
}
