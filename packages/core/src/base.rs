//! The root classes every widget extends.
//!
//! `Neo.component.Base` owns the root node's classes, inline style,
//! visibility and DOM listener declarations. `Neo.container.Base` adds
//! `items`: child configs that are turned into child components.

use std::collections::BTreeMap;

use crate::class::{ClassDecl, ConfigEntry, ConfigLayer};
use crate::component::ComponentId;
use crate::error::{HookError, Result};
use crate::registry::ConfigRegistry;
use crate::scope::MutationScope;
use crate::value::Value;
use crate::vdom::VNode;

pub const COMPONENT: &str = "Neo.component.Base";
pub const CONTAINER: &str = "Neo.container.Base";

/// Key naming the class of a child in an `items` config.
pub const CLASS_NAME_KEY: &str = "className";

/// Register `Neo.component.Base` and `Neo.container.Base`.
pub fn register_base_classes(registry: &ConfigRegistry) {
    registry.define(
        ClassDecl::new(COMPONENT)
            .ntype("component")
            .vdom(VNode::tag("div"))
            .config(
                ConfigLayer::new()
                    .with(ConfigEntry::reactive("cls", Value::array()))
                    .with(ConfigEntry::reactive("style", Value::map()))
                    .with(ConfigEntry::reactive("hidden", false))
                    .with(ConfigEntry::reactive("dom_listeners", Value::array()).protected()),
            )
            .after_set("cls", |scope, value, old| {
                let root = scope.vdom_mut();
                for cls in string_list(old) {
                    root.remove_cls(&cls);
                }
                for cls in string_list(Some(value)) {
                    root.add_cls(cls);
                }
                Ok(())
            })
            .before_set("style", |_scope, value, _old| match value {
                Value::Map(_) => Ok(value),
                Value::Null => Ok(Value::map()),
                _ => Err(HookError::with_kind("Validation", "style must be a map").into()),
            })
            .after_set("style", |scope, value, _old| {
                let style = value
                    .as_map()
                    .map(|map| {
                        map.iter()
                            .filter_map(|(k, v)| style_value(v).map(|v| (k.clone(), v)))
                            .collect::<BTreeMap<_, _>>()
                    })
                    .unwrap_or_default();
                scope.vdom_mut().style = style;
                Ok(())
            })
            .after_set("hidden", |scope, value, _old| {
                scope.vdom_mut().remove_dom = value.is_truthy();
                Ok(())
            })
            .before_set("dom_listeners", |_scope, value, _old| match value {
                Value::Null => Ok(Value::array()),
                Value::Map(_) => Ok(Value::Array(vec![value])),
                Value::Array(_) => Ok(value),
                _ => Err(HookError::with_kind(
                    "Validation",
                    "dom_listeners must be a listener map or a list of them",
                )
                .into()),
            }),
    );

    registry.define(
        ClassDecl::new(CONTAINER)
            .extends(COMPONENT)
            .ntype("container")
            .config(ConfigLayer::new().with(ConfigEntry::reactive("items", Value::array()).quiet()))
            .after_set("items", |scope, value, _old| replace_items(scope, value)),
    );
}

/// Destroy the current children and construct one child per config in
/// `items`.
fn replace_items(scope: &mut MutationScope<'_>, items: &Value) -> Result<()> {
    let existing: Vec<ComponentId> = scope.items().iter().map(|c| c.id()).collect();
    for id in existing {
        if let Some(child) = scope.remove_item(id) {
            child.destroy()?;
        }
    }

    for item in items.as_array().unwrap_or_default() {
        let mut config = item.as_map().cloned().ok_or_else(|| {
            HookError::with_kind("Validation", "each item must be a config map")
        })?;
        let class_name = match config.remove(CLASS_NAME_KEY) {
            Some(Value::String(name)) => name,
            _ => {
                return Err(HookError::with_kind(
                    "Validation",
                    format!("item config needs a '{}'", CLASS_NAME_KEY),
                )
                .into())
            }
        };
        let child = scope.construct_child(&class_name, Value::Map(config))?;
        scope.add(child);
    }
    Ok(())
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(s)) => s.split_whitespace().map(str::to_string).collect(),
        _ => Vec::new(),
    }
}

fn style_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Integer(i) => Some(format!("{}px", i)),
        Value::Float(f) => Some(format!("{}px", f)),
        _ => None,
    }
}
