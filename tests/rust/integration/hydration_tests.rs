//! Shape building and hydration over typed models, without a driver

use rowgraph::hydrate::{hydrate, hydrate_values, HydrateError};
use rowgraph::shape::{BuildOptions, ColumnMetadata, Entity, EntityShape, ShapeTree};
use rowgraph::value::{DbValue, ScalarType};
use serde::Deserialize;
use serde_json::json;

use super::models::{columns, int, joined_row, sample_rows, text, Child, Root};

fn root_tree() -> ShapeTree {
    ShapeTree::build(&Root::shape(), &columns(), BuildOptions::default()).unwrap()
}

#[test]
fn test_roots_deduplicated_in_first_seen_order() {
    let roots: Vec<Root> = hydrate(&root_tree(), sample_rows()).unwrap();
    assert_eq!(roots.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(roots[0].sibling.id, 5);
    assert_eq!(roots[1].sibling.name, "sib b");
}

#[test]
fn test_interleaved_rows_merge_into_existing_root() {
    let rows = vec![
        joined_row((1, "root a"), (5, "sib a"), (10, "child x"), None),
        joined_row((2, "root b"), (6, "sib b"), (20, "child z"), None),
        joined_row((1, "root a"), (5, "sib a"), (11, "child y"), Some((110, Some("g")))),
    ];
    let roots: Vec<Root> = hydrate(&root_tree(), rows).unwrap();

    assert_eq!(roots.len(), 2);
    let children: Vec<_> = roots[0].children.iter().map(|c| c.id).collect();
    assert_eq!(children, vec![10, 11]);
    assert_eq!(roots[0].children[1].grandchildren[0].id, 110);
}

#[test]
fn test_phantom_grandchildren_never_added() {
    let rows = vec![
        joined_row((1, "root a"), (5, "sib a"), (10, "child x"), None),
        joined_row((1, "root a"), (5, "sib a"), (11, "child y"), None),
    ];
    let roots: Vec<Root> = hydrate(&root_tree(), rows).unwrap();
    assert!(roots[0].children.iter().all(|c| c.grandchildren.is_empty()));
}

#[test]
fn test_first_write_wins_within_group() {
    let rows = vec![
        joined_row((1, "first"), (5, "sib a"), (10, "child x"), Some((100, Some("g1")))),
        joined_row((1, "second"), (5, "sib renamed"), (10, "child renamed"), Some((101, None))),
    ];
    let roots: Vec<Root> = hydrate(&root_tree(), rows).unwrap();

    assert_eq!(roots[0].name, "first");
    assert_eq!(roots[0].sibling.name, "sib a");
    assert_eq!(roots[0].children[0].name, "child x");
    assert_eq!(roots[0].children[0].grandchildren.len(), 2);
}

#[test]
fn test_non_nullable_sibling_null_is_an_error() {
    let mut row = joined_row((1, "root a"), (5, "sib a"), (10, "child x"), None);
    row[4] = DbValue::Null;

    let err = hydrate::<Root, _>(&root_tree(), vec![row]).unwrap_err();
    match err {
        HydrateError::NullabilityViolation { entity, field, column } => {
            assert_eq!(entity, "Sibling");
            assert_eq!(field, "name");
            assert_eq!(column, "Name");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_element_shape_resolves_against_its_own_table() {
    let tree = root_tree();
    let children = tree.child(tree.root(), "children").unwrap();
    let name = tree.child(children, "name").unwrap();
    assert_eq!(tree.node(name).ordinal(), Some(7));
    assert_eq!(tree.node(children).target.as_deref(), Some("Child"));
}

#[test]
fn test_missing_columns_reported_together() {
    let cols: Vec<ColumnMetadata> = columns()
        .into_iter()
        .filter(|c| c.table.as_deref() != Some("child") || c.name == "Id")
        .collect();

    let err = ShapeTree::build(&Root::shape(), &cols, BuildOptions::default()).unwrap_err();
    let fields: Vec<_> = err.issues().iter().filter_map(|i| i.field()).collect();
    assert_eq!(fields, vec!["root_id", "name"]);
}

#[test]
fn test_child_alone_as_root() {
    let cols = vec![
        ColumnMetadata::new("Id", "child", 0),
        ColumnMetadata::new("RootId", "child", 1),
        ColumnMetadata::new("Name", "child", 2),
        ColumnMetadata::new("Id", "grandchild", 3),
        ColumnMetadata::new("ChildId", "grandchild", 4),
        ColumnMetadata::new("Name", "grandchild", 5),
    ];
    let tree = ShapeTree::build(&Child::shape(), &cols, BuildOptions::default()).unwrap();
    let rows = vec![
        vec![int(10), int(1), text("x"), int(100), int(10), DbValue::Null],
        vec![int(10), int(1), text("x"), int(101), int(10), text("n")],
    ];

    let children: Vec<Child> = hydrate(&tree, rows).unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].grandchildren[1].name.as_deref(), Some("n"));
}

#[derive(Debug, Deserialize)]
struct Category {
    id: i64,
    #[serde(default)]
    subcategories: Vec<Category>,
}

impl Entity for Category {
    fn shape() -> EntityShape {
        EntityShape::new("Category")
            .table("category")
            .key("id", ScalarType::Int)
            .collection::<Category>("subcategories")
    }
}

#[test]
fn test_self_reference_stops_at_max_depth() {
    let cols = vec![ColumnMetadata::new("id", "category", 0)];
    let options = BuildOptions {
        max_depth: 1,
        ..Default::default()
    };
    let tree = ShapeTree::build(&Category::shape(), &cols, options).unwrap();
    let subcategories = tree.child(tree.root(), "subcategories").unwrap();
    assert!(tree.child(subcategories, "subcategories").is_none());

    let categories: Vec<Category> = hydrate(&tree, vec![vec![int(3)]]).unwrap();
    assert_eq!(categories[0].id, 3);
    assert!(categories[0].subcategories[0].subcategories.is_empty());
}

#[test]
fn test_schema_qualified_table() {
    let shape = EntityShape::new("Account")
        .table("account")
        .schema("billing")
        .key("Id", ScalarType::Int);
    let cols = vec![
        ColumnMetadata::new("Id", "account", 0).with_schema("audit"),
        ColumnMetadata::new("Id", "account", 1).with_schema("billing"),
    ];
    let tree = ShapeTree::build(&shape, &cols, BuildOptions::default()).unwrap();

    let values = hydrate_values(&tree, vec![vec![int(1), int(2)]]).unwrap();
    assert_eq!(values, vec![json!({"Id": 2})]);
}

#[test]
fn test_computed_columns_are_ignored() {
    let shape = EntityShape::new("Root").table("root").key("Id", ScalarType::Int);
    let cols = vec![
        ColumnMetadata::computed("Id", 0),
        ColumnMetadata::new("Id", "root", 1),
    ];
    let tree = ShapeTree::build(&shape, &cols, BuildOptions::default()).unwrap();

    let values = hydrate_values(&tree, vec![vec![int(99), int(7)]]).unwrap();
    assert_eq!(values, vec![json!({"Id": 7})]);
}
