//! `Docs.app.view.ExamplesTreeList`: the docs app's tree of examples.
//!
//! The tree arrives as a flat list of records linked by `parentId` and is
//! rendered in one mutation scope after construction.

use std::path::PathBuf;

use async_trait::async_trait;
use tandem_core::base::COMPONENT;
use tandem_core::{
    ClassDecl, Component, ConfigEntry, ConfigLayer, ConfigRegistry, HookError, Result, Value,
    VNode,
};
use tracing::{debug, warn};

pub const EXAMPLES_TREE_LIST: &str = "Docs.app.view.ExamplesTreeList";

const ITEM_INDENT_PX: usize = 10;

pub(crate) fn register(registry: &ConfigRegistry) {
    registry.define(
        ClassDecl::new(EXAMPLES_TREE_LIST)
            .extends(COMPONENT)
            .ntype("examples-treelist")
            .vdom(
                VNode::tag("div").with_child(
                    VNode::tag("ul")
                        .with_cls("neo-list-container")
                        .with_cls("neo-list"),
                ),
            )
            .config(
                ConfigLayer::new()
                    .with(ConfigEntry::inherited(
                        "cls",
                        vec![
                            "docs-examples-treelist",
                            "neo-tree-list",
                            "neo-list-container",
                            "neo-list",
                        ],
                    ))
                    .with(ConfigEntry::plain("records", Value::array()).protected()),
            ),
    );
}

/// Where the examples tree comes from.
#[async_trait]
pub trait ExampleSource: Send + Sync {
    async fn examples(&self) -> Result<Value>;
}

/// Reads the tree from a JSON file.
#[derive(Debug, Clone)]
pub struct ExamplesFile {
    path: PathBuf,
}

impl ExamplesFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ExampleSource for ExamplesFile {
    async fn examples(&self) -> Result<Value> {
        let text = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            HookError::with_kind(
                "Io",
                format!("failed to read {}: {}", self.path.display(), e),
            )
        })?;
        let json: serde_json::Value = serde_json::from_str(&text)?;
        Ok(json.into())
    }
}

/// Fetch the tree from `source` and render it.
pub async fn load(list: &mut Component, source: &dyn ExampleSource) -> Result<()> {
    let records = source.examples().await?;
    populate(list, records)
}

/// Replace the list's records and render them as nested list items, in
/// one commit.
pub fn populate(list: &mut Component, records: Value) -> Result<()> {
    let items = records
        .as_array()
        .ok_or_else(|| HookError::with_kind("Validation", "the examples tree must be an array"))?
        .to_vec();
    let count = items.len();

    list.with_mutation_scope(|scope| {
        let prefix = scope.dom_id().to_string();
        scope.set("records", Value::Array(items.clone()))?;

        let root = scope.vdom_mut();
        if root.children.is_empty() {
            root.children.push(VNode::tag("ul"));
        }
        root.children[0].children = create_items(&prefix, &items, &Value::Null, &mut Vec::new());
        Ok(())
    })?;

    debug!(component = %list.id(), records = count, "examples tree populated");
    Ok(())
}

/// Build the items whose `parentId` is `parent`. `ancestors` holds the ids
/// of the folders above this level; a folder without an id or one that is
/// already an ancestor is rendered without children.
fn create_items(
    prefix: &str,
    records: &[Value],
    parent: &Value,
    ancestors: &mut Vec<Value>,
) -> Vec<VNode> {
    let level = ancestors.len();
    let mut items = Vec::new();

    for record in records
        .iter()
        .filter(|record| record.get("parentId").unwrap_or(&Value::Null) == parent)
    {
        let id = record.get("id").cloned().unwrap_or_default();
        let name = record.get("name").and_then(Value::as_str).unwrap_or_default();
        let is_leaf = record.get("isLeaf").is_some_and(Value::is_truthy);

        let mut item = VNode::tag("li")
            .with_id(format!("{}__{}", prefix, key(&id)))
            .with_cls("neo-list-item")
            .with_child(
                VNode::tag("span")
                    .with_cls("neo-list-item-content")
                    .with_text(name),
            );
        item.style.insert(
            "padding-left".to_string(),
            format!("{}px", level * ITEM_INDENT_PX),
        );

        if is_leaf {
            item.add_cls("neo-list-item-leaf");
            items.push(item);
            continue;
        }

        item.add_cls("neo-list-folder");
        if !record.get("collapsed").is_some_and(Value::is_truthy) {
            item.add_cls("neo-folder-open");
        }

        if id.is_null() || ancestors.contains(&id) {
            warn!(folder = %key(&id), "examples folder skipped: missing id or parent cycle");
            items.push(item);
            continue;
        }

        ancestors.push(id.clone());
        let children = create_items(prefix, records, &id, ancestors);
        ancestors.pop();
        if !children.is_empty() {
            let mut list = VNode::tag("ul")
                .with_cls("neo-list-container")
                .with_cls("neo-list");
            list.children = children;
            item.children.push(list);
        }
        items.push(item);
    }
    items
}

fn key(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        Value::Integer(i) => i.to_string(),
        other => serde_json::Value::from(other.clone()).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tandem_core::{register_base_classes, Configurator};

    fn list() -> Component {
        let registry = ConfigRegistry::new();
        register_base_classes(&registry);
        register(&registry);
        Configurator::new(registry)
            .construct(EXAMPLES_TREE_LIST, Value::Null)
            .unwrap()
    }

    fn tree() -> Value {
        json!([
            {"id": 1, "name": "Forms", "parentId": null, "isLeaf": false},
            {"id": 2, "name": "Fieldset", "parentId": 1, "isLeaf": true},
            {"id": 3, "name": "Maps", "parentId": null, "isLeaf": false, "collapsed": true},
            {"id": 4, "name": "Google Maps", "parentId": 3, "isLeaf": true}
        ])
        .into()
    }

    #[test]
    fn populate_renders_nested_items_in_one_commit() {
        let mut list = list();
        let before = list.revision();
        populate(&mut list, tree()).unwrap();
        assert_eq!(list.revision(), before + 1);

        let root = &list.vdom().children[0];
        assert_eq!(root.children.len(), 2);

        let forms = &root.children[0];
        assert!(forms.has_cls("neo-folder-open"));
        let fieldset = &forms.children[1].children[0];
        assert!(fieldset.has_cls("neo-list-item-leaf"));
        assert_eq!(fieldset.children[0].text.as_deref(), Some("Fieldset"));
        assert_eq!(fieldset.style["padding-left"], "10px");

        assert!(!root.children[1].has_cls("neo-folder-open"));
        assert_eq!(list.get("records").and_then(Value::as_array).map(<[_]>::len), Some(4));
    }

    #[test]
    fn folders_without_ids_or_with_cycles_stop_recursing() {
        let mut list = list();
        populate(
            &mut list,
            json!([
                {"name": "Folder", "isLeaf": false},
                {"id": 5, "name": "Loop", "parentId": null, "isLeaf": false},
                {"id": 6, "name": "Inner", "parentId": 5, "isLeaf": false},
                {"id": 5, "name": "Back", "parentId": 6, "isLeaf": false}
            ])
            .into(),
        )
        .unwrap();

        let root = &list.vdom().children[0];
        assert_eq!(root.children.len(), 2);
        assert!(root.children[0].children.iter().all(|n| n.tag.as_deref() == Some("span")));

        let inner = &root.children[1].children[1].children[0];
        assert_eq!(inner.children[0].text.as_deref(), Some("Inner"));
        let back = &inner.children[1].children[0];
        assert_eq!(back.children[0].text.as_deref(), Some("Back"));
        assert_eq!(back.children.len(), 1);
    }

    #[test]
    fn populate_rejects_non_arrays() {
        let mut list = list();
        assert!(populate(&mut list, Value::from("nope")).is_err());
        assert!(list.vdom().children[0].children.is_empty());
    }

    #[tokio::test]
    async fn load_reads_from_source() {
        struct Fixed(Value);

        #[async_trait]
        impl ExampleSource for Fixed {
            async fn examples(&self) -> Result<Value> {
                Ok(self.0.clone())
            }
        }

        let mut list = list();
        load(&mut list, &Fixed(tree())).await.unwrap();
        assert_eq!(list.vdom().children[0].children.len(), 2);
    }
}
