//! Class declarations: config layers and hook tables.
//!
//! A class is declared once, as data. Its own [`ConfigLayer`] lists the
//! entries it introduces or overrides, and its hook table maps a property
//! name to optional `beforeSet`/`afterSet` functions. The registry folds the
//! layers of a class and all its ancestors into one resolved schema.
//!
//! # Example
//!
//! ```rust
//! use tandem_core::{ClassDecl, ConfigEntry, ConfigLayer, HookError, Value};
//!
//! let decl = ClassDecl::new("Demo.Counter")
//!     .extends("Neo.component.Base")
//!     .config(
//!         ConfigLayer::new()
//!             .with(ConfigEntry::reactive("count", 0i64))
//!             .with(ConfigEntry::plain("step", 1i64)),
//!     )
//!     .before_set("count", |_scope, value, _old| match value.as_i64() {
//!         Some(n) if n >= 0 => Ok(value),
//!         _ => Err(HookError::with_kind("Validation", "count must be >= 0").into()),
//!     });
//! assert_eq!(decl.class_name(), "Demo.Counter");
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::scope::MutationScope;
use crate::value::Value;
use crate::vdom::VNode;

/// Suffix marking a reactive entry in map-style declarations.
pub const REACTIVE_MARKER: char = '_';

/// Who may see a config entry. Ordered from narrowest to widest.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Private,
    Protected,
    #[default]
    Public,
}

/// How a reactive setter decides that a new value is "unchanged".
#[derive(Debug, Clone, Copy, Default)]
pub enum Equality {
    /// Structural equality of the two values.
    #[default]
    Structural,
    /// Every write counts as a change; hooks always fire.
    Never,
    /// Caller-supplied comparison.
    Custom(fn(&Value, &Value) -> bool),
}

impl Equality {
    pub fn is_equal(&self, current: &Value, new: &Value) -> bool {
        match self {
            Equality::Structural => current == new,
            Equality::Never => false,
            Equality::Custom(eq) => eq(current, new),
        }
    }
}

/// One entry of a class's own config declaration.
///
/// Fields left as `None` inherit whatever an ancestor declared.
#[derive(Debug, Clone)]
pub struct ConfigEntry {
    pub name: String,
    pub default: Option<Value>,
    pub reactive: Option<bool>,
    pub visibility: Option<Visibility>,
    pub equality: Option<Equality>,
    pub quiet: Option<bool>,
    /// Explicit override marker: permits changing the reactive flag or
    /// widening visibility relative to an ancestor.
    pub overrides: bool,
}

impl ConfigEntry {
    fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
            reactive: None,
            visibility: None,
            equality: None,
            quiet: None,
            overrides: false,
        }
    }

    /// A reactive entry with a default value.
    pub fn reactive(name: impl Into<String>, default: impl Into<Value>) -> Self {
        Self {
            default: Some(default.into()),
            reactive: Some(true),
            ..Self::named(name)
        }
    }

    /// A plain (non-reactive) entry with a default value.
    pub fn plain(name: impl Into<String>, default: impl Into<Value>) -> Self {
        Self {
            default: Some(default.into()),
            reactive: Some(false),
            ..Self::named(name)
        }
    }

    /// Override only the default of an inherited entry; the reactive flag
    /// and visibility stay whatever the ancestor declared.
    pub fn inherited(name: impl Into<String>, default: impl Into<Value>) -> Self {
        Self {
            default: Some(default.into()),
            ..Self::named(name)
        }
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }

    pub fn protected(self) -> Self {
        self.visibility(Visibility::Protected)
    }

    pub fn private(self) -> Self {
        self.visibility(Visibility::Private)
    }

    pub fn equality(mut self, equality: Equality) -> Self {
        self.equality = Some(equality);
        self
    }

    /// Initialize from the default without firing hooks when the
    /// constructor config leaves this entry out.
    pub fn quiet(mut self) -> Self {
        self.quiet = Some(true);
        self
    }

    pub fn overriding(mut self) -> Self {
        self.overrides = true;
        self
    }
}

/// The ordered list of entries one class declares itself.
///
/// The registry compares layers by `Arc` identity: swapping a class's layer
/// for a new allocation is what invalidates its memoized schema.
#[derive(Debug, Clone, Default)]
pub struct ConfigLayer {
    entries: Vec<ConfigEntry>,
}

impl ConfigLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry. Redeclaring a name within the same layer replaces the
    /// earlier entry in place.
    pub fn with(mut self, entry: ConfigEntry) -> Self {
        match self.entries.iter_mut().find(|e| e.name == entry.name) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
        self
    }

    pub fn entries(&self) -> &[ConfigEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build a layer from a map-style declaration.
    ///
    /// Keys ending in `_` declare reactive entries (`collapsed_` declares
    /// `collapsed`). Other keys only set a default, so a subclass can write
    /// `collapsed: false` without accidentally turning a reactive ancestor
    /// entry into a plain one.
    ///
    /// Entries keep the order they are declared in, which is the order
    /// construction applies them in. A later entry's hooks can rely on
    /// every earlier entry being resolved.
    pub fn from_declaration<I, K, V>(declaration: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        declaration
            .into_iter()
            .fold(ConfigLayer::new(), |layer, (key, default)| {
                let key = key.into();
                let entry = match key.strip_suffix(REACTIVE_MARKER) {
                    Some(name) if !name.is_empty() => ConfigEntry::reactive(name, default),
                    _ => ConfigEntry::inherited(key, default),
                };
                layer.with(entry)
            })
    }
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Integer(_) => "integer",
        Value::Float(_) => "float",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Map(_) => "map",
    }
}

/// `beforeSet(newValue, oldValue) -> storedValue`.
///
/// `old` is `None` while the instance is being constructed and the property
/// has never held a value.
pub type BeforeSetFn =
    dyn Fn(&mut MutationScope<'_>, Value, Option<&Value>) -> Result<Value> + Send + Sync;

/// `afterSet(newValue, oldValue)`.
pub type AfterSetFn =
    dyn Fn(&mut MutationScope<'_>, &Value, Option<&Value>) -> Result<()> + Send + Sync;

/// Post-construction and teardown hooks.
pub type LifecycleFn = dyn Fn(&mut MutationScope<'_>) -> Result<()> + Send + Sync;

/// The optional hook pair registered for one property.
#[derive(Clone, Default)]
pub struct PropertyHooks {
    pub(crate) before: Option<Arc<BeforeSetFn>>,
    pub(crate) after: Option<Arc<AfterSetFn>>,
}

impl PropertyHooks {
    pub fn has_before(&self) -> bool {
        self.before.is_some()
    }

    pub fn has_after(&self) -> bool {
        self.after.is_some()
    }
}

impl fmt::Debug for PropertyHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyHooks")
            .field("before", &self.has_before())
            .field("after", &self.has_after())
            .finish()
    }
}

/// A class declaration: name, parent, own config layer, hooks.
#[derive(Clone)]
pub struct ClassDecl {
    pub(crate) class_name: String,
    pub(crate) parent: Option<String>,
    pub(crate) ntype: Option<String>,
    pub(crate) config: Arc<ConfigLayer>,
    pub(crate) vdom: Option<VNode>,
    pub(crate) hooks: BTreeMap<String, PropertyHooks>,
    pub(crate) on_constructed: Option<Arc<LifecycleFn>>,
    pub(crate) on_destroy: Option<Arc<LifecycleFn>>,
}

impl ClassDecl {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            parent: None,
            ntype: None,
            config: Arc::new(ConfigLayer::new()),
            vdom: None,
            hooks: BTreeMap::new(),
            on_constructed: None,
            on_destroy: None,
        }
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn ntype(mut self, ntype: impl Into<String>) -> Self {
        self.ntype = Some(ntype.into());
        self
    }

    pub fn config(self, layer: ConfigLayer) -> Self {
        self.shared_config(Arc::new(layer))
    }

    /// Use an already shared layer. Redefining a class with the same `Arc`
    /// (and the same hooks) keeps its memoized schema valid.
    pub fn shared_config(mut self, layer: Arc<ConfigLayer>) -> Self {
        self.config = layer;
        self
    }

    /// The render tree every instance starts from.
    pub fn vdom(mut self, vdom: VNode) -> Self {
        self.vdom = Some(vdom);
        self
    }

    pub fn before_set<F>(mut self, property: &str, hook: F) -> Self
    where
        F: Fn(&mut MutationScope<'_>, Value, Option<&Value>) -> Result<Value>
            + Send
            + Sync
            + 'static,
    {
        self.hooks.entry(property.to_string()).or_default().before = Some(Arc::new(hook));
        self
    }

    pub fn after_set<F>(mut self, property: &str, hook: F) -> Self
    where
        F: Fn(&mut MutationScope<'_>, &Value, Option<&Value>) -> Result<()> + Send + Sync + 'static,
    {
        self.hooks.entry(property.to_string()).or_default().after = Some(Arc::new(hook));
        self
    }

    pub fn on_constructed<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut MutationScope<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.on_constructed = Some(Arc::new(hook));
        self
    }

    pub fn on_destroy<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut MutationScope<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.on_destroy = Some(Arc::new(hook));
        self
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn config_layer(&self) -> &Arc<ConfigLayer> {
        &self.config
    }
}

impl fmt::Debug for ClassDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDecl")
            .field("class_name", &self.class_name)
            .field("parent", &self.parent)
            .field("ntype", &self.ntype)
            .field("config", &self.config)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}
