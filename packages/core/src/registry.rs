//! The config registry: resolves class declarations into flat schemas.
//!
//! Resolution walks the inheritance chain from root to leaf and folds each
//! level's own layer over the accumulated result. The conflict rules are:
//!
//! - a new name appends an entry (ancestor-declared entries keep their
//!   position, so schema order is ancestor-first)
//! - a redeclared name overwrites the default but keeps the inherited
//!   reactive flag unless the redeclaration states one
//! - stating a *different* reactive flag, or a wider visibility, requires the
//!   explicit override marker; otherwise resolution fails with
//!   `SchemaConflict`
//! - hooks override per slot (a subclass `afterSet` replaces the ancestor's,
//!   leaving the ancestor's `beforeSet` in place) and must target a reactive
//!   entry of the resolved schema
//!
//! Schemas are memoized per class and shared by every instance. A cached
//! schema is reused as long as every declaration along its chain keeps the
//! same parent, ntype and vdom, the same config layer allocation and the
//! same hook allocations. Redefining a class with a shared layer and shared
//! hooks does not invalidate it.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{debug, trace};

use crate::class::{ClassDecl, ConfigLayer, Equality, LifecycleFn, PropertyHooks, Visibility};
use crate::error::{ConfigError, Result};
use crate::value::Value;
use crate::vdom::VNode;

/// One resolved config entry.
#[derive(Debug, Clone)]
pub struct SchemaEntry {
    pub name: String,
    pub default: Value,
    pub reactive: bool,
    pub visibility: Visibility,
    pub equality: Equality,
    pub quiet: bool,
    /// The class that first introduced this name.
    pub declared_by: String,
    pub(crate) hooks: PropertyHooks,
}

impl SchemaEntry {
    pub fn hooks(&self) -> &PropertyHooks {
        &self.hooks
    }
}

/// The flattened, read-only schema of one class.
pub struct ClassSchema {
    class_name: String,
    ntype: Option<String>,
    lineage: Vec<String>,
    entries: Vec<SchemaEntry>,
    index: HashMap<String, usize>,
    vdom: VNode,
    on_constructed: Vec<Arc<LifecycleFn>>,
    on_destroy: Vec<Arc<LifecycleFn>>,
}

impl ClassSchema {
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn ntype(&self) -> Option<&str> {
        self.ntype.as_deref()
    }

    /// Class names from the root ancestor down to this class.
    pub fn lineage(&self) -> &[String] {
        &self.lineage
    }

    /// Whether this class is `class_name` or inherits from it.
    pub fn is_a(&self, class_name: &str) -> bool {
        self.lineage.iter().any(|c| c == class_name)
    }

    /// Entries in application order: ancestor-declared before
    /// subclass-declared.
    pub fn entries(&self) -> &[SchemaEntry] {
        &self.entries
    }

    pub fn entry(&self, name: &str) -> Option<&SchemaEntry> {
        self.index_of(name).map(|i| &self.entries[i])
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn vdom_template(&self) -> &VNode {
        &self.vdom
    }

    /// Post-construction hooks, root ancestor first.
    pub(crate) fn on_constructed(&self) -> &[Arc<LifecycleFn>] {
        &self.on_constructed
    }

    /// Teardown hooks, leaf class first.
    pub(crate) fn on_destroy(&self) -> &[Arc<LifecycleFn>] {
        &self.on_destroy
    }
}

impl std::fmt::Debug for ClassSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassSchema")
            .field("class_name", &self.class_name)
            .field("lineage", &self.lineage)
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

/// Whether two declarations of a class resolve to the same schema level.
fn same_declaration(a: &ClassDecl, b: &ClassDecl) -> bool {
    fn same_fn<T: ?Sized>(a: &Option<Arc<T>>, b: &Option<Arc<T>>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    Arc::ptr_eq(&a.config, &b.config)
        && a.class_name == b.class_name
        && a.parent == b.parent
        && a.ntype == b.ntype
        && a.vdom == b.vdom
        && same_fn(&a.on_constructed, &b.on_constructed)
        && same_fn(&a.on_destroy, &b.on_destroy)
        && a.hooks.len() == b.hooks.len()
        && a.hooks.iter().zip(&b.hooks).all(|((na, ha), (nb, hb))| {
            na == nb && same_fn(&ha.before, &hb.before) && same_fn(&ha.after, &hb.after)
        })
}

struct CachedSchema {
    chain: Vec<Arc<ClassDecl>>,
    schema: Arc<ClassSchema>,
}

#[derive(Default)]
struct RegistryInner {
    classes: RwLock<BTreeMap<String, Arc<ClassDecl>>>,
    cache: Mutex<HashMap<String, CachedSchema>>,
}

/// Registry of class declarations and their memoized schemas.
///
/// Cloning is cheap; clones share the same registry.
#[derive(Clone, Default)]
pub struct ConfigRegistry {
    inner: Arc<RegistryInner>,
}

impl ConfigRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define (or redefine) a class.
    pub fn define(&self, decl: ClassDecl) {
        let name = decl.class_name.clone();
        let mut classes = self
            .inner
            .classes
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if classes.insert(name.clone(), Arc::new(decl)).is_some() {
            debug!(class = %name, "class redefined");
        }
    }

    /// Swap a class's own config layer, keeping its hooks and parent.
    ///
    /// This is the hot-reload path; ordinary runtime code never needs it.
    pub fn redeclare_config(&self, class_name: &str, layer: ConfigLayer) -> Result<()> {
        let mut classes = self
            .inner
            .classes
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let current = classes
            .get(class_name)
            .ok_or_else(|| ConfigError::UnknownClass(class_name.to_string()))?;
        let updated = ClassDecl::clone(current).config(layer);
        classes.insert(class_name.to_string(), Arc::new(updated));
        debug!(class = %class_name, "config layer redeclared");
        Ok(())
    }

    pub fn is_defined(&self, class_name: &str) -> bool {
        self.inner
            .classes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(class_name)
    }

    pub fn declaration(&self, class_name: &str) -> Option<Arc<ClassDecl>> {
        self.inner
            .classes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(class_name)
            .cloned()
    }

    /// Resolve the merged schema of a class.
    pub fn resolve_schema(&self, class_name: &str) -> Result<Arc<ClassSchema>> {
        let chain = self.chain(class_name)?;

        let mut cache = self
            .inner
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(cached) = cache.get(class_name) {
            let unchanged = cached.chain.len() == chain.len()
                && cached
                    .chain
                    .iter()
                    .zip(&chain)
                    .all(|(a, b)| same_declaration(a, b));
            if unchanged {
                trace!(class = %class_name, "schema cache hit");
                return Ok(Arc::clone(&cached.schema));
            }
        }

        let schema = Arc::new(build_schema(&chain)?);
        debug!(
            class = %class_name,
            entries = schema.len(),
            depth = chain.len(),
            "schema resolved"
        );
        cache.insert(
            class_name.to_string(),
            CachedSchema {
                chain,
                schema: Arc::clone(&schema),
            },
        );
        Ok(schema)
    }

    /// The declaration chain of a class, root ancestor first.
    fn chain(&self, class_name: &str) -> Result<Vec<Arc<ClassDecl>>> {
        let classes = self
            .inner
            .classes
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(class_name.to_string());

        while let Some(name) = next {
            if !seen.insert(name.clone()) {
                return Err(ConfigError::SchemaConflict {
                    class: class_name.to_string(),
                    property: String::new(),
                    reason: format!("inheritance cycle through {}", name),
                });
            }
            let decl = classes
                .get(&name)
                .ok_or_else(|| ConfigError::UnknownClass(name.clone()))?;
            next = decl.parent.clone();
            chain.push(Arc::clone(decl));
        }

        chain.reverse();
        Ok(chain)
    }
}

fn build_schema(chain: &[Arc<ClassDecl>]) -> Result<ClassSchema> {
    let leaf = chain
        .last()
        .map(|d| d.class_name.clone())
        .unwrap_or_default();

    let mut entries: Vec<SchemaEntry> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut hooks: BTreeMap<String, PropertyHooks> = BTreeMap::new();
    let mut ntype = None;
    let mut vdom = VNode::default();
    let mut on_constructed = Vec::new();
    let mut on_destroy = Vec::new();

    for decl in chain {
        for declared in decl.config.entries() {
            match index.get(&declared.name) {
                None => {
                    index.insert(declared.name.clone(), entries.len());
                    entries.push(SchemaEntry {
                        name: declared.name.clone(),
                        default: declared.default.clone().unwrap_or_default(),
                        reactive: declared.reactive.unwrap_or(false),
                        visibility: declared.visibility.unwrap_or_default(),
                        equality: declared.equality.unwrap_or_default(),
                        quiet: declared.quiet.unwrap_or(false),
                        declared_by: decl.class_name.clone(),
                        hooks: PropertyHooks::default(),
                    });
                }
                Some(&i) => {
                    let existing = &mut entries[i];

                    if let Some(reactive) = declared.reactive {
                        if reactive != existing.reactive && !declared.overrides {
                            return Err(ConfigError::SchemaConflict {
                                class: decl.class_name.clone(),
                                property: declared.name.clone(),
                                reason: format!(
                                    "declares reactive={} but {} declares reactive={}",
                                    reactive, existing.declared_by, existing.reactive
                                ),
                            });
                        }
                        existing.reactive = reactive;
                    }

                    if let Some(visibility) = declared.visibility {
                        if visibility > existing.visibility && !declared.overrides {
                            return Err(ConfigError::SchemaConflict {
                                class: decl.class_name.clone(),
                                property: declared.name.clone(),
                                reason: format!(
                                    "widens visibility from {:?} to {:?}",
                                    existing.visibility, visibility
                                ),
                            });
                        }
                        existing.visibility = visibility;
                    }

                    if let Some(default) = &declared.default {
                        existing.default = default.clone();
                    }
                    if let Some(equality) = declared.equality {
                        existing.equality = equality;
                    }
                    if let Some(quiet) = declared.quiet {
                        existing.quiet = quiet;
                    }
                }
            }
        }

        for (property, declared) in &decl.hooks {
            let slot = hooks.entry(property.clone()).or_default();
            if declared.before.is_some() {
                slot.before = declared.before.clone();
            }
            if declared.after.is_some() {
                slot.after = declared.after.clone();
            }
        }

        if decl.ntype.is_some() {
            ntype = decl.ntype.clone();
        }
        if let Some(template) = &decl.vdom {
            vdom = template.clone();
        }
        if let Some(hook) = &decl.on_constructed {
            on_constructed.push(Arc::clone(hook));
        }
        if let Some(hook) = &decl.on_destroy {
            on_destroy.push(Arc::clone(hook));
        }
    }

    for (property, property_hooks) in hooks {
        match index.get(&property) {
            Some(&i) if entries[i].reactive => entries[i].hooks = property_hooks,
            _ => {
                return Err(ConfigError::OrphanHook {
                    class: leaf,
                    property,
                })
            }
        }
    }

    on_destroy.reverse();

    Ok(ClassSchema {
        class_name: leaf,
        ntype,
        lineage: chain.iter().map(|d| d.class_name.clone()).collect(),
        entries,
        index,
        vdom,
        on_constructed,
        on_destroy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ConfigEntry;

    fn registry_with_chain() -> ConfigRegistry {
        let registry = ConfigRegistry::new();
        registry.define(
            ClassDecl::new("C").config(
                ConfigEntry::reactive("a", 1i64)
                    .into_layer()
                    .with(ConfigEntry::plain("flag", false))
                    .with(ConfigEntry::reactive("secret", Value::Null).protected()),
            ),
        );
        registry.define(
            ClassDecl::new("B").extends("C").config(
                ConfigLayer::new()
                    .with(ConfigEntry::inherited("a", 2i64))
                    .with(ConfigEntry::reactive("b", "b")),
            ),
        );
        registry.define(
            ClassDecl::new("A")
                .extends("B")
                .config(ConfigLayer::new().with(ConfigEntry::plain("c", 3i64))),
        );
        registry
    }

    impl ConfigEntry {
        fn into_layer(self) -> ConfigLayer {
            ConfigLayer::new().with(self)
        }
    }

    #[test]
    fn leaf_contains_every_ancestor_entry_in_order() {
        let registry = registry_with_chain();
        let schema = registry.resolve_schema("A").unwrap();

        let names: Vec<_> = schema.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "flag", "secret", "b", "c"]);
        assert_eq!(schema.lineage(), ["C", "B", "A"]);
        assert!(schema.is_a("C"));
    }

    #[test]
    fn inherited_override_keeps_reactive_flag() {
        let registry = registry_with_chain();
        let schema = registry.resolve_schema("B").unwrap();
        let a = schema.entry("a").unwrap();
        assert!(a.reactive);
        assert_eq!(a.default, Value::Integer(2));
        assert_eq!(a.declared_by, "C");
    }

    #[test]
    fn reactive_flag_change_without_marker_conflicts() {
        let registry = registry_with_chain();
        registry.define(
            ClassDecl::new("Bad")
                .extends("C")
                .config(ConfigLayer::new().with(ConfigEntry::plain("a", 0i64))),
        );
        let err = registry.resolve_schema("Bad").unwrap_err();
        assert!(matches!(err, ConfigError::SchemaConflict { ref property, .. } if property == "a"));

        registry.define(
            ClassDecl::new("Good")
                .extends("C")
                .config(ConfigLayer::new().with(ConfigEntry::plain("a", 0i64).overriding())),
        );
        let schema = registry.resolve_schema("Good").unwrap();
        assert!(!schema.entry("a").unwrap().reactive);
    }

    #[test]
    fn visibility_never_widens_silently() {
        let registry = registry_with_chain();
        registry.define(ClassDecl::new("Leaky").extends("C").config(
            ConfigLayer::new().with(ConfigEntry::inherited("secret", 1i64).visibility(Visibility::Public)),
        ));
        assert!(matches!(
            registry.resolve_schema("Leaky"),
            Err(ConfigError::SchemaConflict { .. })
        ));

        // Narrowing is fine, and plain default overrides keep the ancestor's visibility.
        registry.define(ClassDecl::new("Tight").extends("C").config(
            ConfigLayer::new()
                .with(ConfigEntry::inherited("secret", 1i64))
                .with(ConfigEntry::inherited("flag", true).private()),
        ));
        let schema = registry.resolve_schema("Tight").unwrap();
        assert_eq!(schema.entry("secret").unwrap().visibility, Visibility::Protected);
        assert_eq!(schema.entry("flag").unwrap().visibility, Visibility::Private);
    }

    #[test]
    fn schema_is_memoized_until_declaration_changes() {
        let registry = registry_with_chain();
        let first = registry.resolve_schema("A").unwrap();
        let second = registry.resolve_schema("A").unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        registry
            .redeclare_config("B", ConfigLayer::new().with(ConfigEntry::reactive("b", "changed")))
            .unwrap();
        let third = registry.resolve_schema("A").unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(third.entry("b").unwrap().default, Value::from("changed"));
    }

    #[test]
    fn redefining_with_the_same_layer_keeps_the_schema() {
        let registry = ConfigRegistry::new();
        let layer = Arc::new(ConfigLayer::new().with(ConfigEntry::reactive("m", 1i64)));

        registry.define(ClassDecl::new("M").shared_config(Arc::clone(&layer)));
        let first = registry.resolve_schema("M").unwrap();

        registry.define(ClassDecl::new("M").shared_config(Arc::clone(&layer)));
        let second = registry.resolve_schema("M").unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        registry.define(
            ClassDecl::new("M").shared_config(Arc::new(ConfigLayer::clone(&layer))),
        );
        let third = registry.resolve_schema("M").unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn hooks_must_target_reactive_entries() {
        let registry = registry_with_chain();
        registry.define(
            ClassDecl::new("Typo")
                .extends("C")
                .after_set("colapsed", |_s, _v, _o| Ok(())),
        );
        assert!(matches!(
            registry.resolve_schema("Typo"),
            Err(ConfigError::OrphanHook { ref property, .. }) if property == "colapsed"
        ));

        registry.define(
            ClassDecl::new("Plain")
                .extends("C")
                .after_set("flag", |_s, _v, _o| Ok(())),
        );
        assert!(matches!(
            registry.resolve_schema("Plain"),
            Err(ConfigError::OrphanHook { .. })
        ));
    }

    #[test]
    fn subclass_hook_replaces_only_its_slot() {
        let registry = registry_with_chain();
        registry.define(
            ClassDecl::new("Base")
                .extends("C")
                .before_set("a", |_s, v, _o| Ok(v))
                .after_set("a", |_s, _v, _o| Ok(())),
        );
        registry.define(
            ClassDecl::new("Sub")
                .extends("Base")
                .after_set("a", |_s, _v, _o| Ok(())),
        );
        let schema = registry.resolve_schema("Sub").unwrap();
        let hooks = schema.entry("a").unwrap().hooks();
        assert!(hooks.has_before());
        assert!(hooks.has_after());
    }

    #[test]
    fn unknown_and_cyclic_classes() {
        let registry = ConfigRegistry::new();
        assert!(matches!(
            registry.resolve_schema("Missing"),
            Err(ConfigError::UnknownClass(_))
        ));

        registry.define(ClassDecl::new("X").extends("Y"));
        registry.define(ClassDecl::new("Y").extends("X"));
        assert!(matches!(
            registry.resolve_schema("X"),
            Err(ConfigError::SchemaConflict { .. })
        ));
    }
}
