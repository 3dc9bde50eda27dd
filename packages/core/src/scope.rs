//! Mutation scopes: staged render-tree changes with one commit per
//! outermost scope.
//!
//! Inside a scope, [`MutationScope::vdom`] keeps returning the last
//! committed tree while [`MutationScope::vdom_mut`] writes into a scratch
//! copy taken lazily on first write. When the outermost scope exits
//! successfully the scratch copy replaces the committed tree in one swap and
//! a `TreeChanged` notification is queued. Nested scopes only bump a depth
//! counter.
//!
//! A scope that exits with an error, at any depth, discards the scratch
//! copy. The committed tree is left as it was and the error propagates; an
//! enclosing scope that chooses to swallow the error continues from the
//! committed tree.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::component::{Component, ComponentId, Extensions, Teardown};
use crate::configurator::Configurator;
use crate::error::Result;
use crate::registry::ClassSchema;
use crate::value::Value;
use crate::vdom::VNode;

/// What closing a scope did to the committed tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Commit {
    /// An enclosing scope is still open.
    Nested,
    /// Nothing was staged, or the staged tree equals the committed one.
    Unchanged,
    /// The scope failed and its staged tree was thrown away.
    Discarded,
    Notify(u64),
    Silent(u64),
}

pub(crate) struct RenderState {
    committed: VNode,
    scratch: Option<VNode>,
    depth: usize,
    silent: bool,
    revision: u64,
}

impl RenderState {
    pub(crate) fn new(committed: VNode) -> Self {
        Self {
            committed,
            scratch: None,
            depth: 0,
            silent: false,
            revision: 0,
        }
    }

    pub(crate) fn committed(&self) -> &VNode {
        &self.committed
    }

    pub(crate) fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn enter(&mut self, silent: bool) {
        if self.depth == 0 {
            self.scratch = None;
            self.silent = silent;
        }
        self.depth += 1;
    }

    fn staged(&self) -> &VNode {
        self.scratch.as_ref().unwrap_or(&self.committed)
    }

    fn staged_mut(&mut self) -> &mut VNode {
        let committed = &self.committed;
        self.scratch.get_or_insert_with(|| committed.clone())
    }

    pub(crate) fn exit(&mut self, ok: bool) -> Commit {
        self.depth = self.depth.saturating_sub(1);

        if !ok {
            self.scratch = None;
            return if self.depth > 0 {
                Commit::Nested
            } else {
                Commit::Discarded
            };
        }
        if self.depth > 0 {
            return Commit::Nested;
        }

        match self.scratch.take() {
            Some(staged) if staged != self.committed => {
                self.committed = staged;
                self.revision += 1;
                if self.silent {
                    Commit::Silent(self.revision)
                } else {
                    Commit::Notify(self.revision)
                }
            }
            _ => Commit::Unchanged,
        }
    }
}

/// Handle to a component inside an open mutation scope.
///
/// Hooks receive one of these; it is the only way to stage render-tree
/// writes.
pub struct MutationScope<'a> {
    pub(crate) component: &'a mut Component,
}

impl<'a> MutationScope<'a> {
    pub(crate) fn new(component: &'a mut Component) -> Self {
        Self { component }
    }

    pub fn id(&self) -> ComponentId {
        self.component.id
    }

    pub fn dom_id(&self) -> &str {
        &self.component.dom_id
    }

    pub fn class_name(&self) -> &str {
        self.component.class_name()
    }

    pub fn schema(&self) -> &Arc<ClassSchema> {
        &self.component.schema
    }

    pub fn parent_id(&self) -> Option<ComponentId> {
        self.component.parent_id
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.component.get(name)
    }

    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        self.component.get_as(name)
    }

    /// String value of a config entry, empty if unset or not a string.
    pub fn get_str(&self, name: &str) -> &str {
        self.get(name).and_then(Value::as_str).unwrap_or("")
    }

    /// Loose truthiness of a config entry; unset is false.
    pub fn get_flag(&self, name: &str) -> bool {
        self.get(name).is_some_and(Value::is_truthy)
    }

    /// The last committed tree. Writes staged in this scope are not visible
    /// here until the outermost scope commits.
    pub fn vdom(&self) -> &VNode {
        self.component.tree.committed()
    }

    /// The tree as staged so far in this scope.
    pub fn staged_vdom(&self) -> &VNode {
        self.component.tree.staged()
    }

    /// Stage a write to the render tree.
    pub fn vdom_mut(&mut self) -> &mut VNode {
        self.component.tree.staged_mut()
    }

    /// Open a nested scope. Only the outermost scope commits.
    pub fn with_mutation_scope<R>(
        &mut self,
        f: impl FnOnce(&mut MutationScope<'_>) -> Result<R>,
    ) -> Result<R> {
        self.component.run_scope(false, f)
    }

    pub fn items(&self) -> &[Component] {
        &self.component.items
    }

    pub fn items_mut(&mut self) -> &mut Vec<Component> {
        &mut self.component.items
    }

    pub fn item_mut(&mut self, index: usize) -> Option<&mut Component> {
        self.component.items.get_mut(index)
    }

    /// Construct a child of this component. The child is not inserted.
    pub fn construct_child(&self, class_name: &str, config: Value) -> Result<Component> {
        self.component
            .configurator
            .construct_in(class_name, config, Some(self.component.id))
    }

    /// Insert a child at `index` (clamped to the item count) and stage a
    /// placeholder for its tree at the same position under the root node.
    pub fn insert(&mut self, index: usize, mut child: Component) -> &mut Component {
        let index = index.min(self.component.items.len());
        child.parent_id = Some(self.component.id);

        let placeholder = VNode::component_ref(child.id.to_string());
        let root = self.vdom_mut();
        let at = index.min(root.children.len());
        root.children.insert(at, placeholder);

        self.component.items.insert(index, child);
        &mut self.component.items[index]
    }

    /// Append a child.
    pub fn add(&mut self, child: Component) -> &mut Component {
        let index = self.component.items.len();
        self.insert(index, child)
    }

    /// Remove a child and its placeholder. The caller decides whether to
    /// destroy it.
    pub fn remove_item(&mut self, id: ComponentId) -> Option<Component> {
        let position = self.component.items.iter().position(|c| c.id == id)?;
        let reference = id.to_string();
        self.vdom_mut()
            .children
            .retain(|node| node.component_id.as_deref() != Some(reference.as_str()));

        let mut child = self.component.items.remove(position);
        child.parent_id = None;
        Some(child)
    }

    /// Register a resource released when the component is destroyed.
    pub fn track(&mut self, resource: Box<dyn Teardown>) {
        self.component.track(resource);
    }

    pub fn extensions(&self) -> &Extensions {
        &self.component.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.component.extensions
    }

    pub fn configurator(&self) -> &Configurator {
        &self.component.configurator
    }
}
