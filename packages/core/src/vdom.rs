//! Virtual DOM nodes.
//!
//! A component's render tree is a plain, exclusively owned [`VNode`] tree.
//! How it ends up in a real DOM is the rendering pipeline's business; this
//! crate only stages and commits it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One node of a render tree.
///
/// Field names on the wire follow the vdom conventions (`cn` for children,
/// `removeDom` for nodes that stay in the tree but are not rendered).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cls: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub style: BTreeMap<String, String>,

    /// Placeholder for a child component's own tree, referenced by id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_id: Option<String>,

    #[serde(default, rename = "cn", skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<VNode>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub remove_dom: bool,
}

impl VNode {
    /// Create a node with the given tag.
    pub fn tag(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            ..Default::default()
        }
    }

    /// Create a placeholder for a child component.
    pub fn component_ref(id: impl Into<String>) -> Self {
        Self {
            component_id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_cls(mut self, cls: impl Into<String>) -> Self {
        self.add_cls(cls);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: VNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn has_cls(&self, cls: &str) -> bool {
        self.cls.iter().any(|c| c == cls)
    }

    /// Add a class name unless already present.
    pub fn add_cls(&mut self, cls: impl Into<String>) {
        let cls = cls.into();
        if !self.has_cls(&cls) {
            self.cls.push(cls);
        }
    }

    pub fn remove_cls(&mut self, cls: &str) {
        self.cls.retain(|c| c != cls);
    }

    /// Add or remove a class name depending on `enabled`.
    pub fn toggle_cls(&mut self, cls: &str, enabled: bool) {
        if enabled {
            self.add_cls(cls);
        } else {
            self.remove_cls(cls);
        }
    }

    /// Depth-first search for a node by id.
    pub fn find(&self, id: &str) -> Option<&VNode> {
        if self.id.as_deref() == Some(id) {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    /// Depth-first search for a node by id, mutably.
    pub fn find_mut(&mut self, id: &str) -> Option<&mut VNode> {
        if self.id.as_deref() == Some(id) {
            return Some(self);
        }
        self.children.iter_mut().find_map(|child| child.find_mut(id))
    }

    /// Depth-first search for the first node carrying a class name.
    pub fn find_by_cls_mut(&mut self, cls: &str) -> Option<&mut VNode> {
        if self.has_cls(cls) {
            return Some(self);
        }
        self.children
            .iter_mut()
            .find_map(|child| child.find_by_cls_mut(cls))
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(VNode::node_count).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cls_helpers_do_not_duplicate() {
        let mut node = VNode::tag("fieldset").with_cls("neo-fieldset");
        node.add_cls("neo-fieldset");
        node.toggle_cls("neo-collapsed", true);
        assert_eq!(node.cls, vec!["neo-fieldset", "neo-collapsed"]);

        node.toggle_cls("neo-collapsed", false);
        assert!(!node.has_cls("neo-collapsed"));
    }

    #[test]
    fn find_descends_into_children() {
        let mut tree = VNode::tag("ul").with_id("list").with_child(
            VNode::tag("li")
                .with_id("item-1")
                .with_child(VNode::tag("span").with_cls("neo-list-item-content")),
        );

        assert!(tree.find("item-1").is_some());
        assert!(tree.find("missing").is_none());

        tree.find_by_cls_mut("neo-list-item-content").unwrap().text = Some("Hi".into());
        assert_eq!(tree.node_count(), 3);
    }

    #[test]
    fn wire_field_names() {
        let mut node = VNode::tag("div").with_child(VNode::component_ref("c1"));
        node.remove_dom = true;
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"tag": "div", "cn": [{"componentId": "c1"}], "removeDom": true})
        );
    }
}
