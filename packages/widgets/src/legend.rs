//! `Neo.component.Legend`: the caption of a fieldset.

use tandem_core::base::COMPONENT;
use tandem_core::{ClassDecl, ConfigEntry, ConfigLayer, ConfigRegistry, MutationScope, Value, VNode};

pub const LEGEND: &str = "Neo.component.Legend";

const ICON_CLS: &str = "neo-legend-icon";
const TEXT_CLS: &str = "neo-legend-text";

pub(crate) fn register(registry: &ConfigRegistry) {
    registry.define(
        ClassDecl::new(LEGEND)
            .extends(COMPONENT)
            .ntype("legend")
            .vdom(
                VNode::tag("legend")
                    .with_child(VNode::tag("span").with_cls(ICON_CLS))
                    .with_child(VNode::tag("span").with_cls(TEXT_CLS)),
            )
            .config(
                ConfigLayer::new()
                    .with(ConfigEntry::inherited("cls", vec!["neo-legend"]))
                    .with(ConfigEntry::reactive("icon_cls", ""))
                    .with(ConfigEntry::reactive("text", ""))
                    .with(ConfigEntry::reactive("use_icon", true)),
            )
            .after_set("icon_cls", |scope, _value, _old| {
                update_icon(scope);
                Ok(())
            })
            .after_set("use_icon", |scope, _value, _old| {
                update_icon(scope);
                Ok(())
            })
            .after_set("text", |scope, value, _old| {
                if let Some(node) = scope.vdom_mut().find_by_cls_mut(TEXT_CLS) {
                    node.text = Some(value.as_str().unwrap_or_default().to_string());
                }
                Ok(())
            }),
    );
}

fn update_icon(scope: &mut MutationScope<'_>) {
    let icon_cls = scope.get_str("icon_cls").to_string();
    let use_icon = scope.get_flag("use_icon");

    if let Some(node) = scope.vdom_mut().find_by_cls_mut(ICON_CLS) {
        let mut cls = vec![ICON_CLS.to_string()];
        cls.extend(icon_cls.split_whitespace().map(str::to_string));
        node.cls = cls;
        node.remove_dom = !use_icon || icon_cls.is_empty();
    }
}

/// The icon classes and text a legend currently renders.
pub fn rendered(legend: &VNode) -> (Vec<String>, Option<String>) {
    let icon = legend
        .children
        .iter()
        .find(|n| n.has_cls(ICON_CLS))
        .filter(|n| !n.remove_dom)
        .map(|n| {
            n.cls
                .iter()
                .filter(|c| c.as_str() != ICON_CLS)
                .cloned()
                .collect()
        })
        .unwrap_or_default();
    let text = legend
        .children
        .iter()
        .find(|n| n.has_cls(TEXT_CLS))
        .and_then(|n| n.text.clone());
    (icon, text)
}
