//! Client facade against the in-memory driver

use std::time::Duration;

use rowgraph::client::memory::{MemoryConnector, ResultSet};
use rowgraph::client::{cancel_pair, Client, ClientError, ErrorKind};
use rowgraph::config::ClientConfig;
use rowgraph::shape::{ColumnMetadata, Entity, EntityShape, FieldShape};
use rowgraph::tokenizer::Params;
use rowgraph::value::{DbValue, ScalarType};
use serde::Deserialize;

use super::models::{columns, int, joined_row, sample_rows, text, Root, SQL};

fn sample_client() -> (Client<MemoryConnector>, MemoryConnector) {
    let connector = MemoryConnector::new().with_result(SQL, ResultSet::new(columns(), sample_rows()));
    (Client::new(connector.clone()), connector)
}

#[tokio::test]
async fn test_to_list_hydrates_join() {
    let (client, connector) = sample_client();
    let roots: Vec<Root> = client.to_list(SQL, &Params::new()).await.unwrap();

    assert_eq!(roots.len(), 2);
    let first = &roots[0];
    assert_eq!(first.id, 1);
    assert_eq!(first.sibling.name, "sib a");
    assert_eq!(first.label, None);
    assert_eq!(
        first.children.iter().map(|c| c.id).collect::<Vec<_>>(),
        vec![10, 11]
    );
    assert_eq!(
        first.children[0]
            .grandchildren
            .iter()
            .map(|g| (g.id, g.name.clone()))
            .collect::<Vec<_>>(),
        vec![(100, Some("g1".to_string())), (101, None)]
    );
    assert!(first.children[1].grandchildren.is_empty());

    assert_eq!(roots[1].children.len(), 1);
    assert_eq!(roots[1].children[0].grandchildren[0].id, 102);
    assert_eq!(connector.stats().open(), 0);
}

#[tokio::test]
async fn test_first_returns_first_complete_root() {
    let (client, connector) = sample_client();
    let root: Root = client.first(SQL, &Params::new()).await.unwrap();

    assert_eq!(root.id, 1);
    assert_eq!(root.children.len(), 2);
    assert_eq!(root.children[0].grandchildren.len(), 2);
    assert_eq!(connector.stats().open(), 0);
}

#[tokio::test]
async fn test_first_ignores_rows_of_later_roots() {
    // the second root has a NULL in a non-nullable field but is never populated
    let mut bad = joined_row((2, "root b"), (6, "sib b"), (12, "child z"), None);
    bad[1] = DbValue::Null;
    let mut rows = sample_rows();
    rows.truncate(3);
    rows.push(bad);
    let connector = MemoryConnector::new().with_fallback(ResultSet::new(columns(), rows));
    let stats = connector.stats();
    let client = Client::new(connector);

    let root: Root = client.first(SQL, &Params::new()).await.unwrap();
    assert_eq!(root.id, 1);
    assert_eq!(root.children.len(), 2);
    assert_eq!(stats.open(), 0);

    let err = client.to_list::<Root>(SQL, &Params::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Hydration);
}

#[tokio::test]
async fn test_no_rows() {
    let connector = MemoryConnector::new().with_fallback(ResultSet::new(columns(), vec![]));
    let client = Client::new(connector);

    let roots: Vec<Root> = client.to_list(SQL, &Params::new()).await.unwrap();
    assert!(roots.is_empty());

    let none: Option<Root> = client.first_or_default(SQL, &Params::new()).await.unwrap();
    assert!(none.is_none());

    let err = client.first::<Root>(SQL, &Params::new()).await.unwrap_err();
    assert!(matches!(err, ClientError::NotFound));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_execute_scalar() {
    let name_column = vec![ColumnMetadata::new("Name", "root", 0)];
    let connector = MemoryConnector::new()
        .with_result(
            "select Name from root",
            ResultSet::new(name_column.clone(), vec![vec![text("root a")], vec![text("root b")]]),
        )
        .with_result(
            "select Name from root where Id = 3",
            ResultSet::new(name_column.clone(), vec![vec![DbValue::Null]]),
        )
        .with_result(
            "select Name from root where Id = -1",
            ResultSet::new(name_column, vec![]),
        )
        .with_result(
            "select count(*) from root",
            ResultSet::new(vec![ColumnMetadata::computed("count(*)", 0)], vec![vec![int(2)]]),
        );
    let client = Client::new(connector);

    let name: Option<String> = client
        .execute_scalar("select Name from root", &Params::new())
        .await
        .unwrap();
    assert_eq!(name.as_deref(), Some("root a"));

    let null: Option<String> = client
        .execute_scalar("select Name from root where Id = :id", &Params::new().bind("id", 3))
        .await
        .unwrap();
    assert_eq!(null, None);

    let missing: Option<String> = client
        .execute_scalar("select Name from root where Id = :id", &Params::new().bind("id", -1))
        .await
        .unwrap();
    assert_eq!(missing, None);

    let count: Option<i64> = client
        .execute_scalar("select count(*) from root", &Params::new())
        .await
        .unwrap();
    assert_eq!(count, Some(2));
}

#[tokio::test]
async fn test_execute_scalar_type_mismatch() {
    let connector = MemoryConnector::new().with_fallback(ResultSet::new(
        vec![ColumnMetadata::new("Name", "root", 0)],
        vec![vec![text("not a number")]],
    ));
    let client = Client::new(connector);

    let err = client
        .execute_scalar::<i64>("select Name from root", &Params::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
}

#[tokio::test]
async fn test_execute_substitutes_parameters() {
    let connector = MemoryConnector::new().with_result(
        "update root set Name = 'Some root' where Id = 1",
        ResultSet::affected(1),
    );
    let stats = connector.stats();
    let client = Client::new(connector);

    let params = Params::new().bind("id", 1).bind("name", "Some root");
    let rows = client
        .execute("update root set Name = :name where Id = :id", &params)
        .await
        .unwrap();

    assert_eq!(rows, 1);
    assert_eq!(
        stats.executed(),
        vec!["update root set Name = 'Some root' where Id = 1"]
    );
    assert_eq!(stats.open(), 0);
}

#[tokio::test]
async fn test_params_from_struct() {
    #[derive(serde::Serialize)]
    struct Update<'a> {
        id: i64,
        name: &'a str,
    }

    let connector = MemoryConnector::new().with_fallback(ResultSet::affected(1));
    let stats = connector.stats();
    let client = Client::new(connector);

    let params = Params::from_serialize(&Update { id: 4, name: "it's" }).unwrap();
    client
        .execute("update root set Name = :name where Id = :id", &params)
        .await
        .unwrap();
    assert_eq!(
        stats.executed(),
        vec![r"update root set Name = 'it\'s' where Id = 4"]
    );
}

#[tokio::test]
async fn test_binding_error_never_reaches_driver() {
    let connector = MemoryConnector::new().with_fallback(ResultSet::affected(1));
    let stats = connector.stats();
    let client = Client::new(connector);

    let err = client
        .execute("delete from root where Id = :id", &Params::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Binding);
    assert!(err.to_string().contains("id"));
    assert_eq!(stats.opened(), 0);
    assert!(stats.executed().is_empty());
}

#[tokio::test]
async fn test_shape_error_before_rows() {
    // sibling.Name is missing from the result
    let mut cols = columns();
    cols.retain(|c| !(c.name == "Name" && c.table.as_deref() == Some("sibling")));
    let connector = MemoryConnector::new().with_fallback(ResultSet::new(cols, vec![]));
    let stats = connector.stats();
    let client = Client::new(connector);

    let err = client.to_list::<Root>(SQL, &Params::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Shape);
    match err {
        ClientError::Shape(shape) => assert!(shape.mentions_field("name")),
        other => panic!("expected shape error, got {other}"),
    }
    assert_eq!(stats.open(), 0);
}

#[tokio::test]
async fn test_nullability_violation_discards_results() {
    let mut bad = joined_row((2, "root b"), (6, "sib b"), (12, "child z"), None);
    bad[1] = DbValue::Null;
    let rows = vec![sample_rows().remove(0), bad];
    let connector = MemoryConnector::new().with_fallback(ResultSet::new(columns(), rows));
    let stats = connector.stats();
    let client = Client::new(connector);

    let err = client.to_list::<Root>(SQL, &Params::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Hydration);
    assert_eq!(stats.open(), 0);
}

#[tokio::test]
async fn test_type_mismatch() {
    let mut rows = sample_rows();
    rows[0][2] = text("five");
    let connector = MemoryConnector::new().with_fallback(ResultSet::new(columns(), rows));
    let client = Client::new(connector);

    let err = client.to_list::<Root>(SQL, &Params::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
}

#[tokio::test]
async fn test_driver_error_mid_stream() {
    let connector = MemoryConnector::new()
        .with_fallback(ResultSet::new(columns(), sample_rows()).failing_at(2));
    let stats = connector.stats();
    let client = Client::new(connector);

    let err = client.to_list::<Root>(SQL, &Params::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Driver);
    assert!(err.to_string().contains("connection lost"));
    assert_eq!(stats.open(), 0);
}

#[tokio::test]
async fn test_connect_failure_is_driver_error() {
    let client = Client::new(MemoryConnector::new().failing_connect("access denied"));
    let err = client.execute("select 1", &Params::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Driver);
    assert!(err.to_string().contains("access denied"));
}

#[tokio::test]
async fn test_cancellation_mid_stream() {
    let connector = MemoryConnector::new()
        .with_fallback(ResultSet::new(columns(), sample_rows()))
        .with_row_delay(Duration::from_millis(50));
    let stats = connector.stats();
    let client = Client::new(connector);
    let (handle, signal) = cancel_pair();

    let params = Params::new();
    let query = client.to_list_with::<Root>(SQL, &params, &signal);
    let cancel = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.cancel();
    };
    let (result, ()) = tokio::join!(query, cancel);

    let err = result.unwrap_err();
    assert!(matches!(err, ClientError::Cancelled));
    assert_eq!(stats.opened(), 1);
    assert_eq!(stats.open(), 0);
}

#[derive(Debug, Deserialize)]
struct Tag {
    label: String,
}

impl Entity for Tag {
    fn shape() -> EntityShape {
        EntityShape::new("Tag").table("tag").scalar("label", ScalarType::Text)
    }
}

#[derive(Debug, Deserialize)]
struct Post {
    id: i64,
    tags: Vec<Tag>,
}

impl Entity for Post {
    fn shape() -> EntityShape {
        EntityShape::new("Post")
            .table("post")
            .key("id", ScalarType::Int)
            .collection::<Tag>("tags")
    }
}

fn tagged_posts() -> ResultSet {
    ResultSet::new(
        vec![
            ColumnMetadata::new("id", "post", 0),
            ColumnMetadata::new("label", "tag", 1),
        ],
        vec![
            vec![int(1), text("rust")],
            vec![int(1), text("orm")],
            vec![int(1), text("rust")],
        ],
    )
}

#[tokio::test]
async fn test_keyless_collection_requires_identity() {
    let client = Client::new(MemoryConnector::new().with_fallback(tagged_posts()));
    let err = client
        .to_list::<Post>("select * from post", &Params::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Shape);
    assert!(err.to_string().contains("Tag"));
}

#[tokio::test]
async fn test_identity_fallback_uses_all_fields() {
    let config = ClientConfig {
        identity_fallback: true,
        ..Default::default()
    };
    let client =
        Client::with_config(MemoryConnector::new().with_fallback(tagged_posts()), config).unwrap();

    let posts = client
        .to_list::<Post>("select * from post", &Params::new())
        .await
        .unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].id, 1);
    let labels: Vec<_> = posts[0].tags.iter().map(|t| t.label.as_str()).collect();
    assert_eq!(labels, vec!["rust", "orm"]);
}

#[tokio::test]
async fn test_dynamic_shape_values() {
    let shape = EntityShape::new("Post")
        .table("post")
        .key("id", ScalarType::Int)
        .field(FieldShape::collection(
            "tags",
            EntityShape::new("Tag").table("tag").key("label", ScalarType::Text),
        ));
    let client = Client::new(MemoryConnector::new().with_fallback(tagged_posts()));

    let values = client
        .to_values(&shape, "select * from post", &Params::new())
        .await
        .unwrap();
    assert_eq!(
        values,
        vec![serde_json::json!({"id": 1, "tags": [{"label": "rust"}, {"label": "orm"}]})]
    );
}
