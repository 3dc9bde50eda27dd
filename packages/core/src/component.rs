//! Component instances.
//!
//! A [`Component`] owns one value per schema entry, its render tree, its
//! child components and every resource it installed (event subscriptions,
//! capability registrations). It holds its parent only by id, so a child
//! never keeps its parent alive.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::class::Visibility;
use crate::configurator::Configurator;
use crate::error::{ConfigError, Result};
use crate::registry::ClassSchema;
use crate::scope::{Commit, MutationScope, RenderState};
use crate::value::Value;
use crate::vdom::VNode;

/// Unique identifier for a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(Uuid);

impl ComponentId {
    /// Create a new random ComponentId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ComponentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Notification that a component committed a new render tree.
///
/// Delivered through the component's update sink after the outermost
/// mutation scope closes; consumers read [`Component::vdom`] to get the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeChanged {
    pub component: ComponentId,
    pub revision: u64,
}

/// Sending half of the tree-change notification queue.
pub type UpdateSink = mpsc::UnboundedSender<TreeChanged>;

/// A resource a component must release when it is destroyed.
pub trait Teardown: Send {
    fn teardown(self: Box<Self>);
}

impl<F: FnOnce() + Send> Teardown for F {
    fn teardown(self: Box<Self>) {
        (*self)()
    }
}

/// Per-instance typed side storage.
///
/// Widgets keep composed sub-objects here (a data store instance created by
/// a `beforeSet` coercion, SDK handles) instead of squeezing them into
/// config values.
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, Box<dyn Any + Send>>,
}

impl Extensions {
    pub fn insert<T: Any + Send>(&mut self, value: T) -> Option<T> {
        self.map
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast::<T>().ok().map(|boxed| *boxed))
    }

    pub fn get<T: Any + Send>(&self) -> Option<&T> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<T>())
    }

    pub fn get_mut<T: Any + Send>(&mut self) -> Option<&mut T> {
        self.map
            .get_mut(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_mut::<T>())
    }

    pub fn remove<T: Any + Send>(&mut self) -> Option<T> {
        self.map
            .remove(&TypeId::of::<T>())
            .and_then(|old| old.downcast::<T>().ok().map(|boxed| *boxed))
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

/// A constructed component instance.
pub struct Component {
    pub(crate) id: ComponentId,
    pub(crate) dom_id: String,
    pub(crate) schema: Arc<ClassSchema>,
    pub(crate) configurator: Configurator,
    pub(crate) values: Vec<Option<Value>>,
    pub(crate) tree: RenderState,
    pub(crate) items: Vec<Component>,
    pub(crate) parent_id: Option<ComponentId>,
    pub(crate) resources: Vec<Box<dyn Teardown>>,
    pub(crate) extensions: Extensions,
    pub(crate) active_writes: Vec<usize>,
    pub(crate) destroyed: bool,
}

impl Component {
    pub(crate) fn new(
        schema: Arc<ClassSchema>,
        configurator: Configurator,
        parent_id: Option<ComponentId>,
    ) -> Self {
        let id = ComponentId::new();
        let dom_id = match schema.ntype() {
            Some(ntype) => format!("neo-{}-{}", ntype, id),
            None => id.to_string(),
        };
        let mut vdom = schema.vdom_template().clone();
        if vdom.id.is_none() {
            vdom.id = Some(dom_id.clone());
        }
        let len = schema.len();

        Self {
            id,
            dom_id,
            schema,
            configurator,
            values: vec![None; len],
            tree: RenderState::new(vdom),
            items: Vec::new(),
            parent_id,
            resources: Vec::new(),
            extensions: Extensions::default(),
            active_writes: vec![0; len],
            destroyed: false,
        }
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// Id prefix for render nodes owned by this component, derived from the
    /// class `ntype`.
    pub fn dom_id(&self) -> &str {
        &self.dom_id
    }

    pub fn class_name(&self) -> &str {
        self.schema.class_name()
    }

    pub fn schema(&self) -> &Arc<ClassSchema> {
        &self.schema
    }

    pub fn parent_id(&self) -> Option<ComponentId> {
        self.parent_id
    }

    pub fn configurator(&self) -> &Configurator {
        &self.configurator
    }

    /// Current value of a config entry. No side effects.
    pub fn get(&self, name: &str) -> Option<&Value> {
        let index = self.schema.index_of(name)?;
        self.values[index].as_ref()
    }

    /// Current value of a config entry, deserialized.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        match self.get(name) {
            Some(value) => Ok(Some(value.clone().deserialize()?)),
            None => Ok(None),
        }
    }

    /// Write one config entry. Reactive entries run their hooks and any
    /// render-tree change is committed before this returns.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.run_scope(false, |scope| scope.set(name, value))
    }

    /// Write several entries in schema order inside one mutation scope:
    /// one commit, one notification.
    pub fn set_many(&mut self, config: Value) -> Result<()> {
        self.run_scope(false, |scope| scope.set_many(config))
    }

    /// Like [`set_many`](Self::set_many), but the commit is not announced to
    /// the update sink.
    pub fn set_silent(&mut self, config: Value) -> Result<()> {
        self.run_scope(true, |scope| scope.set_many(config))
    }

    /// Run `f` inside a mutation scope on this component.
    pub fn with_mutation_scope<R>(
        &mut self,
        f: impl FnOnce(&mut MutationScope<'_>) -> Result<R>,
    ) -> Result<R> {
        self.run_scope(false, f)
    }

    pub(crate) fn run_scope<R>(
        &mut self,
        silent: bool,
        f: impl FnOnce(&mut MutationScope<'_>) -> Result<R>,
    ) -> Result<R> {
        self.tree.enter(silent);
        let result = f(&mut MutationScope::new(self));
        match self.tree.exit(result.is_ok()) {
            Commit::Notify(revision) => self.notify(revision),
            Commit::Silent(revision) => {
                trace!(component = %self.id, revision, "silent commit");
            }
            Commit::Discarded => {
                debug!(component = %self.id, "mutation scope failed, staged tree discarded");
            }
            Commit::Nested | Commit::Unchanged => {}
        }
        result
    }

    fn notify(&self, revision: u64) {
        trace!(component = %self.id, revision, "tree committed");
        if let Some(sink) = self.configurator.sink() {
            let update = TreeChanged {
                component: self.id,
                revision,
            };
            if sink.send(update).is_err() {
                trace!(component = %self.id, "update sink closed");
            }
        }
    }

    /// The last committed render tree.
    pub fn vdom(&self) -> &VNode {
        self.tree.committed()
    }

    /// Number of commits so far.
    pub fn revision(&self) -> u64 {
        self.tree.revision()
    }

    pub fn items(&self) -> &[Component] {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut Vec<Component> {
        &mut self.items
    }

    /// Find a descendant by id.
    pub fn find(&self, id: ComponentId) -> Option<&Component> {
        if self.id == id {
            return Some(self);
        }
        self.items.iter().find_map(|item| item.find(id))
    }

    /// Find a descendant by id, mutably.
    pub fn find_mut(&mut self, id: ComponentId) -> Option<&mut Component> {
        if self.id == id {
            return Some(self);
        }
        self.items.iter_mut().find_map(|item| item.find_mut(id))
    }

    /// Register a resource released on destroy.
    pub fn track(&mut self, resource: Box<dyn Teardown>) {
        self.resources.push(resource);
    }

    pub fn tracked_resources(&self) -> usize {
        self.resources.len()
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Public config entries and their current values.
    pub fn public_config(&self) -> Value {
        let mut map = std::collections::BTreeMap::new();
        for (entry, value) in self.schema.entries().iter().zip(&self.values) {
            if entry.visibility == Visibility::Public {
                map.insert(entry.name.clone(), value.clone().unwrap_or_default());
            }
        }
        Value::Map(map)
    }

    /// Destroy the component: run teardown hooks (leaf class first), destroy
    /// children, release tracked resources in reverse order of
    /// registration, and drop the render tree.
    ///
    /// Resources are released even when a teardown hook fails; the first
    /// hook error is returned afterwards.
    pub fn destroy(mut self) -> Result<()> {
        let schema = Arc::clone(&self.schema);
        let hooks = self.run_scope(true, |scope| {
            for hook in schema.on_destroy() {
                hook(scope)?;
            }
            Ok(())
        });
        self.release(true);
        debug!(component = %self.id, class = %self.class_name(), "component destroyed");
        hooks
    }

    fn release(&mut self, run_child_hooks: bool) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;

        for item in self.items.drain(..) {
            if run_child_hooks {
                if let Err(e) = item.destroy() {
                    warn!(error = %e, "child teardown hook failed");
                }
            }
        }
        while let Some(resource) = self.resources.pop() {
            resource.teardown();
        }
        self.extensions.clear();
        self.tree = RenderState::new(VNode::default());
    }

    pub(crate) fn unknown_property(&self, name: &str) -> ConfigError {
        ConfigError::UnknownProperty {
            class: self.class_name().to_string(),
            property: name.to_string(),
        }
    }
}

impl Drop for Component {
    fn drop(&mut self) {
        if !self.destroyed {
            self.release(false);
        }
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("id", &self.id)
            .field("class", &self.class_name())
            .field("parent_id", &self.parent_id)
            .field("items", &self.items.len())
            .field("revision", &self.revision())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_id_display() {
        let id = ComponentId::new();
        assert_eq!(id.to_string().len(), 36);
        assert_ne!(ComponentId::default(), ComponentId::default());
    }

    #[test]
    fn extensions_are_typed() {
        #[derive(Debug, PartialEq)]
        struct Handle(u32);

        let mut ext = Extensions::default();
        assert!(ext.insert(Handle(1)).is_none());
        assert_eq!(ext.insert(Handle(2)), Some(Handle(1)));
        ext.get_mut::<Handle>().unwrap().0 += 1;
        assert_eq!(ext.get::<Handle>(), Some(&Handle(3)));
        assert_eq!(ext.remove::<Handle>(), Some(Handle(3)));
        assert!(ext.get::<Handle>().is_none());
    }

    #[test]
    fn closures_are_teardown_resources() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let released = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&released);
        let resource: Box<dyn Teardown> = Box::new(move || flag.store(true, Ordering::SeqCst));
        resource.teardown();
        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn dom_id_uses_ntype() {
        let registry = crate::ConfigRegistry::new();
        crate::register_base_classes(&registry);
        let component = Configurator::new(registry)
            .construct(crate::base::CONTAINER, Value::Null)
            .unwrap();

        assert_eq!(
            component.dom_id(),
            format!("neo-container-{}", component.id())
        );
        assert_eq!(component.vdom().id.as_deref(), Some(component.dom_id()));
    }
}
