//! `Neo.form.Fieldset`: a collapsible container with a legend.
//!
//! The legend is created on demand as item 0 once there is an icon or a
//! title to show. Collapsing swaps the legend icon and hides every other
//! item.

use serde_json::json;
use tandem_core::base::CONTAINER;
use tandem_core::{
    ClassDecl, Component, ComponentId, ConfigEntry, ConfigLayer, ConfigRegistry, MutationScope,
    Result, Value, VNode,
};
use tracing::trace;

use crate::legend::LEGEND;

pub const FIELDSET: &str = "Neo.form.Fieldset";

/// Handler name the fieldset registers for clicks on its legend.
pub const ON_LEGEND_CLICK: &str = "onLegendClick";

const COLLAPSED_CLS: &str = "neo-collapsed";

/// Id of the legend child.
struct LegendRef(ComponentId);

pub(crate) fn register(registry: &ConfigRegistry) {
    registry.define(
        ClassDecl::new(FIELDSET)
            .extends(CONTAINER)
            .ntype("fieldset")
            .vdom(VNode::tag("fieldset"))
            .config(
                ConfigLayer::new()
                    .with(ConfigEntry::inherited("cls", vec!["neo-fieldset"]))
                    .with(ConfigEntry::reactive("collapsed", true))
                    .with(ConfigEntry::reactive("collapsible", true))
                    .with(ConfigEntry::plain("has_label_click_listener", false).protected())
                    .with(ConfigEntry::reactive("icon_cls", "far fa-check-square"))
                    .with(ConfigEntry::plain("icon_cls_checked", "far fa-check-square"))
                    .with(ConfigEntry::plain("icon_cls_unchecked", "far fa-square"))
                    .with(ConfigEntry::reactive("title", "")),
            )
            .after_set("collapsed", |scope, value, old| {
                apply_collapsed(scope, value.is_truthy(), old.is_some())
            })
            .after_set("collapsible", |scope, value, _old| {
                let collapsible = value.is_truthy();
                if let Some(legend) = legend_mut(scope) {
                    legend.set("use_icon", collapsible)?;
                }

                if collapsible && !scope.get_flag("has_label_click_listener") {
                    scope.set("has_label_click_listener", true)?;
                    let mut listeners = scope
                        .get("dom_listeners")
                        .and_then(Value::as_array)
                        .unwrap_or_default()
                        .to_vec();
                    listeners.push(
                        json!({"click": ON_LEGEND_CLICK, "delegate": "neo-legend"}).into(),
                    );
                    scope.set("dom_listeners", Value::Array(listeners))?;
                }
                Ok(())
            })
            .after_set("icon_cls", |scope, _value, _old| update_legend(scope))
            .after_set("title", |scope, _value, _old| update_legend(scope))
            .on_constructed(|scope| {
                if scope.get_flag("collapsed") {
                    apply_collapsed(scope, true, true)?;
                }
                Ok(())
            }),
    );
}

/// Toggle `collapsed`, as a click on the legend does.
pub fn on_legend_click(fieldset: &mut Component) -> Result<()> {
    let collapsed = fieldset.get("collapsed").is_some_and(Value::is_truthy);
    trace!(component = %fieldset.id(), collapsed = !collapsed, "legend clicked");
    fieldset.set("collapsed", !collapsed)
}

/// The fieldset's legend, once created.
pub fn legend(fieldset: &Component) -> Option<&Component> {
    let id = fieldset.extensions().get::<LegendRef>()?.0;
    fieldset.items().iter().find(|c| c.id() == id)
}

fn legend_id(scope: &MutationScope<'_>) -> Option<ComponentId> {
    scope.extensions().get::<LegendRef>().map(|legend| legend.0)
}

fn legend_mut<'s>(scope: &'s mut MutationScope<'_>) -> Option<&'s mut Component> {
    let id = legend_id(scope)?;
    scope.items_mut().iter_mut().find(|c| c.id() == id)
}

fn current_icon_cls(scope: &MutationScope<'_>, collapsed: bool) -> String {
    let name = if collapsed {
        "icon_cls_unchecked"
    } else {
        "icon_cls_checked"
    };
    scope.get_str(name).to_string()
}

/// Reflect `collapsed` on the root node. Once the fieldset is initialized,
/// also swap the legend icon and hide or show the other items.
fn apply_collapsed(scope: &mut MutationScope<'_>, collapsed: bool, initialized: bool) -> Result<()> {
    scope.vdom_mut().toggle_cls(COLLAPSED_CLS, collapsed);
    if !initialized {
        return Ok(());
    }

    let icon_cls = current_icon_cls(scope, collapsed);
    let legend = legend_id(scope);
    for item in scope.items_mut() {
        if Some(item.id()) == legend {
            item.set("icon_cls", icon_cls.as_str())?;
        } else {
            item.set("hidden", collapsed)?;
        }
    }
    Ok(())
}

fn update_legend(scope: &mut MutationScope<'_>) -> Result<()> {
    let collapsed = scope.get_flag("collapsed");
    let icon_cls = current_icon_cls(scope, collapsed);
    let title = scope.get_str("title").to_string();
    let empty = icon_cls.is_empty() && title.is_empty();

    if let Some(legend) = legend_mut(scope) {
        if empty {
            legend.set("hidden", true)?;
        } else {
            legend.set_silent(json!({"icon_cls": icon_cls, "text": title, "hidden": false}).into())?;
        }
        return Ok(());
    }
    if empty {
        return Ok(());
    }

    let use_icon = scope.get_flag("collapsible");
    let legend = scope.construct_child(
        LEGEND,
        json!({"icon_cls": icon_cls, "text": title, "use_icon": use_icon}).into(),
    )?;
    let id = legend.id();
    scope.insert(0, legend);
    scope.extensions_mut().insert(LegendRef(id));
    trace!(component = %scope.id(), legend = %id, "legend created");
    Ok(())
}
