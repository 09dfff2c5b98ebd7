//! Tests for engine module

use super::*;
use crate::http::HttpClientConfig;
use crate::pagination::RecordSelector;
use crate::sink::{MemorySink, Message};
use crate::state::State;
use crate::streams::PaginationKind;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Graph Tests
// ============================================================================

#[test]
fn test_graph_order_parents_first() {
    let graph = StreamGraph::new([
        ("submissions", Some("forms")),
        ("contacts", None),
        ("forms", None),
    ])
    .unwrap();

    assert_eq!(graph.order(), vec!["contacts", "forms", "submissions"]);
    assert_eq!(graph.roots(), vec!["contacts", "forms"]);
    assert_eq!(graph.parent("submissions"), Some("forms"));
    assert_eq!(graph.children("forms"), vec!["submissions"]);
}

#[test]
fn test_graph_ties_follow_catalog_order() {
    let graph = StreamGraph::new([
        ("campaigns", None),
        ("campaign_assets", Some("campaigns")),
        ("owners", None),
        ("campaign_revenue", Some("campaigns")),
    ])
    .unwrap();

    assert_eq!(
        graph.order(),
        vec!["campaigns", "campaign_assets", "owners", "campaign_revenue"]
    );
    assert_eq!(
        graph.children("campaigns"),
        vec!["campaign_assets", "campaign_revenue"]
    );
}

#[test]
fn test_graph_rejects_cycles() {
    let err = StreamGraph::new([("a", Some("b")), ("b", Some("a"))]).unwrap_err();
    assert!(matches!(err, Error::Graph { .. }));
    assert!(err.to_string().contains("cycle"));
}

#[test]
fn test_graph_rejects_unknown_parent() {
    let err = StreamGraph::new([("a", Some("missing"))]).unwrap_err();
    assert!(err.to_string().contains("missing"));
}

#[test]
fn test_graph_rejects_duplicates() {
    assert!(StreamGraph::new([("a", None), ("a", None)]).is_err());
}

#[test]
fn test_graph_ancestors_and_subtree() {
    let graph = StreamGraph::new([
        ("root", None),
        ("mid", Some("root")),
        ("leaf", Some("mid")),
        ("other", None),
    ])
    .unwrap();

    assert_eq!(graph.ancestors("leaf"), vec!["mid", "root"]);
    assert!(graph.ancestors("root").is_empty());
    assert_eq!(graph.subtree("root"), vec!["root", "mid", "leaf"]);
    assert_eq!(graph.subtree("other"), vec!["other"]);
    assert!(graph.subtree("nope").is_empty());
}

#[test]
fn test_hubspot_catalog_graph() {
    let graph = StreamGraph::from_catalog(&Catalog::hubspot()).unwrap();
    assert_eq!(graph.len(), 28);
    assert_eq!(graph.parent("form_submissions"), Some("forms"));
    assert_eq!(
        graph.children("campaigns"),
        vec!["campaign_revenue", "campaign_metrics", "campaign_assets"]
    );
}

#[test]
fn test_stats_merge() {
    let mut total = SyncStats {
        records_emitted: 2,
        pages_fetched: 1,
        ..SyncStats::default()
    };
    total.merge(&SyncStats {
        records_emitted: 3,
        records_skipped: 1,
        checkpoints: 2,
        ..SyncStats::default()
    });

    assert_eq!(total.records_emitted, 5);
    assert_eq!(total.records_skipped, 1);
    assert_eq!(total.checkpoints, 2);
    assert!(StreamStatus::Failed.is_terminal());
    assert!(!StreamStatus::Running.is_terminal());
}

// ============================================================================
// Sync Tests
// ============================================================================

fn form_context(record: &JsonObject, _now: DateTime<Utc>) -> Vec<Context> {
    record
        .get("id")
        .and_then(Value::as_str)
        .map(|id| vec![Context::new().with("form_id", id)])
        .unwrap_or_default()
}

fn test_catalog() -> Catalog {
    Catalog::new(vec![
        StreamDefinition::new(
            "items",
            "/items",
            ObjectSchema::new([("id", FieldType::String), ("name", FieldType::String)]),
        )
        .pagination(PaginationKind::None),
        StreamDefinition::new(
            "events",
            "/events",
            ObjectSchema::new([("id", FieldType::String), ("updatedAt", FieldType::DateTime)]),
        )
        .incremental("updatedAt", SortOrder::Ascending),
        StreamDefinition::new("forms", "/forms", ObjectSchema::new([("id", FieldType::String)]))
            .pagination(PaginationKind::None),
        StreamDefinition::new(
            "submissions",
            "/forms/{{ form_id }}/submissions",
            ObjectSchema::new([
                ("form_id", FieldType::String),
                ("conversionId", FieldType::String),
                ("submittedAt", FieldType::DateTime),
            ]),
        )
        .primary_key(&["form_id", "conversionId"])
        .incremental("submittedAt", SortOrder::Descending)
        .child_of("forms", form_context),
        StreamDefinition::crm_object(
            "contacts",
            "/crm/v3/objects/contacts",
            "/crm/v3/objects/contacts/search",
            "lastmodifieddate",
        ),
    ])
}

fn test_config(server: &MockServer, streams: &[&str]) -> TapConfig {
    TapConfig {
        access_token: Some("token".to_string()),
        api_base_url: server.uri(),
        streams: streams.iter().map(ToString::to_string).collect(),
        ..TapConfig::default()
    }
}

fn engine(config: TapConfig, state: StateManager, sink: Arc<MemorySink>) -> SyncEngine {
    engine_with_catalog(config, state, sink, test_catalog())
}

fn engine_with_catalog(
    config: TapConfig,
    state: StateManager,
    sink: Arc<MemorySink>,
    catalog: Catalog,
) -> SyncEngine {
    let client = HttpClient::with_config(
        HttpClientConfig::builder()
            .base_url(&config.api_base_url)
            .max_retries(0)
            .no_rate_limit()
            .build(),
    )
    .unwrap();
    SyncEngine::with_catalog(Arc::new(config), client, state, sink, catalog).unwrap()
}

async fn bookmark(engine: &SyncEngine, stream: &str, context: Option<&Context>) -> Option<i64> {
    engine
        .state()
        .bookmark(stream, context)
        .await
        .and_then(|v| ReplicationValue::from_json(&v))
        .and_then(|v| v.to_millis())
}

fn millis(s: &str) -> i64 {
    crate::types::parse_datetime(s).unwrap().timestamp_millis()
}

#[tokio::test]
async fn test_full_table_sync() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": "1", "name": "a"}, {"id": 2, "name": "b", "extra": true}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let sink = Arc::new(MemorySink::new());
    let engine = engine(
        test_config(&server, &["items"]),
        StateManager::in_memory(),
        sink.clone(),
    );
    let stats = engine.run().await.unwrap();

    assert_eq!(stats.records_emitted, 2);
    assert_eq!(stats.streams_completed, 1);
    assert_eq!(
        sink.records("items").await,
        vec![
            json!({"id": "1", "name": "a"}).as_object().unwrap().clone(),
            json!({"id": "2", "name": "b"}).as_object().unwrap().clone(),
        ]
    );
    assert_eq!(sink.schema_streams().await, vec!["items"]);
    assert_eq!(engine.status("items").await, Some(StreamStatus::Completed));
    assert_eq!(engine.status("events").await, Some(StreamStatus::Pending));

    let messages = sink.messages().await;
    assert!(matches!(messages.first(), Some(Message::Schema { .. })));
    assert!(matches!(messages.last(), Some(Message::State { .. })));
}

#[tokio::test]
async fn test_incremental_sync_filters_and_advances_bookmark() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"id": "1", "updatedAt": "2024-01-01T00:00:00Z"},
                {"id": "2", "updatedAt": "2024-01-02T00:00:00Z"},
                {"id": "3", "updatedAt": "2024-01-03T00:00:00Z"}
            ]
        })))
        .mount(&server)
        .await;

    let mut state = State::new();
    state.advance_bookmark("events", None, "updatedAt", &json!("2024-01-02T00:00:00Z"));

    let sink = Arc::new(MemorySink::new());
    let engine = engine(
        test_config(&server, &["events"]),
        StateManager::from_state(state),
        sink.clone(),
    );
    let stats = engine.run().await.unwrap();

    let records = sink.records("events").await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["id"], "3");
    assert_eq!(stats.records_emitted, 1);
    assert_eq!(
        bookmark(&engine, "events", None).await,
        Some(millis("2024-01-03T00:00:00Z"))
    );

    let last = sink.states().await.pop().unwrap();
    assert_eq!(
        last["bookmarks"]["events"]["replication_key_value"],
        "2024-01-03T00:00:00Z"
    );
}

#[tokio::test]
async fn test_end_date_stops_ascending_stream() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"id": "1", "updatedAt": "2024-01-01T00:00:00Z"},
                {"id": "2", "updatedAt": "2024-03-01T00:00:00Z"}
            ],
            "paging": {"next": {"after": "2"}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = test_config(&server, &["events"]);
    config.end_date = Some("2024-02-01T00:00:00Z".to_string());

    let sink = Arc::new(MemorySink::new());
    let engine = engine(config, StateManager::in_memory(), sink.clone());
    engine.run().await.unwrap();

    assert_eq!(sink.records("events").await.len(), 1);
    assert_eq!(
        bookmark(&engine, "events", None).await,
        Some(millis("2024-01-01T00:00:00Z"))
    );
}

#[tokio::test]
async fn test_malformed_record_is_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"name": "no id"}, {"id": "2", "name": ["wrong"]}, {"id": "3"}]
        })))
        .mount(&server)
        .await;

    let sink = Arc::new(MemorySink::new());
    let engine = engine(
        test_config(&server, &["items"]),
        StateManager::in_memory(),
        sink.clone(),
    );
    let stats = engine.run().await.unwrap();

    assert_eq!(stats.records_emitted, 1);
    assert_eq!(stats.records_skipped, 2);
    assert_eq!(sink.records("items").await[0]["id"], "3");
}

#[tokio::test]
async fn test_missing_replication_value_is_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": "1"}, {"id": "2", "updatedAt": "2024-01-05T00:00:00Z"}]
        })))
        .mount(&server)
        .await;

    let sink = Arc::new(MemorySink::new());
    let engine = engine(
        test_config(&server, &["events"]),
        StateManager::in_memory(),
        sink.clone(),
    );
    let stats = engine.run().await.unwrap();

    assert_eq!(stats.records_emitted, 1);
    assert_eq!(stats.records_skipped, 1);
}

#[tokio::test]
async fn test_child_stream_traverses_unselected_parent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/forms"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": "f1"}, {"id": "f2"}]
        })))
        .mount(&server)
        .await;
    for form in ["f1", "f2"] {
        Mock::given(method("GET"))
            .and(path(format!("/forms/{form}/submissions")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"conversionId": format!("{form}-c1"), "submittedAt": 1_704_067_200_000_i64}]
            })))
            .expect(1)
            .mount(&server)
            .await;
    }

    let sink = Arc::new(MemorySink::new());
    let engine = engine(
        test_config(&server, &["submissions"]),
        StateManager::in_memory(),
        sink.clone(),
    );
    let stats = engine.run().await.unwrap();

    assert!(sink.records("forms").await.is_empty());
    let submissions = sink.records("submissions").await;
    assert_eq!(submissions.len(), 2);
    assert_eq!(submissions[0]["form_id"], "f1");
    assert_eq!(submissions[1]["form_id"], "f2");
    assert_eq!(submissions[0]["submittedAt"], "2024-01-01T00:00:00.000Z");
    assert_eq!(sink.schema_streams().await, vec!["submissions"]);
    assert_eq!(stats.streams_completed, 1);

    let f1 = Context::new().with("form_id", "f1");
    assert_eq!(
        bookmark(&engine, "submissions", Some(&f1)).await,
        Some(1_704_067_200_000)
    );
    assert_eq!(engine.state().bookmark("forms", None).await, None);
}

#[tokio::test]
async fn test_descending_stream_stops_at_bookmark() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/forms"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": [{"id": "f1"}]})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/forms/f1/submissions"))
        .and(query_param("after", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/forms/f1/submissions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"conversionId": "c3", "submittedAt": 3000},
                {"conversionId": "c2", "submittedAt": 2000},
                {"conversionId": "c1", "submittedAt": 1000}
            ],
            "paging": {"next": {"after": "2"}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let f1 = Context::new().with("form_id", "f1");
    let mut state = State::new();
    state.advance_bookmark("submissions", Some(&f1), "submittedAt", &json!(2000));

    let sink = Arc::new(MemorySink::new());
    let engine = engine(
        test_config(&server, &["forms", "submissions"]),
        StateManager::from_state(state),
        sink.clone(),
    );
    engine.run().await.unwrap();

    let submissions = sink.records("submissions").await;
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0]["conversionId"], "c3");
    assert_eq!(sink.records("forms").await.len(), 1);
    assert_eq!(bookmark(&engine, "submissions", Some(&f1)).await, Some(3000));
}

#[tokio::test]
async fn test_crm_object_list_requests_discovered_properties() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/crm/v3/properties/contacts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"name": "email"}, {"name": "lastmodifieddate"}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/crm/v3/objects/contacts"))
        .and(query_param("properties", "email,lastmodifieddate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{
                "id": "101",
                "properties": {"email": "a@example.com", "lastmodifieddate": "2024-02-01T00:00:00Z"},
                "createdAt": "2024-01-01T00:00:00Z",
                "updatedAt": "2024-02-01T00:00:00Z",
                "archived": false
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let sink = Arc::new(MemorySink::new());
    let engine = engine(
        test_config(&server, &["contacts"]),
        StateManager::in_memory(),
        sink.clone(),
    );
    engine.run().await.unwrap();

    let records = sink.records("contacts").await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["lastmodifieddate"], "2024-02-01T00:00:00Z");
    assert_eq!(records[0]["properties"]["email"], "a@example.com");

    let schema = sink
        .messages()
        .await
        .into_iter()
        .find_map(|m| match m {
            Message::Schema { schema, .. } => Some(schema),
            _ => None,
        })
        .unwrap();
    assert_eq!(
        schema["properties"]["properties"]["properties"]["email"]["type"],
        json!(["string", "null"])
    );
}

#[tokio::test]
async fn test_crm_object_uses_search_after_start_date() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/crm/v3/properties/contacts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"name": "lastmodifieddate"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/crm/v3/objects/contacts/search"))
        .and(body_partial_json(json!({
            "filterGroups": [{"filters": [{
                "propertyName": "lastmodifieddate",
                "operator": "GTE",
                "value": millis("2024-01-01T00:00:00Z").to_string()
            }]}],
            "properties": ["lastmodifieddate"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"id": "1", "properties": {"lastmodifieddate": "2024-01-01T00:00:00Z"}},
                {"id": "2", "properties": {"lastmodifieddate": "2024-01-10T00:00:00Z"}}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = test_config(&server, &["contacts"]);
    config.start_date = Some("2024-01-01T00:00:00Z".to_string());

    let sink = Arc::new(MemorySink::new());
    let engine = engine(config, StateManager::in_memory(), sink.clone());
    engine.run().await.unwrap();

    let records = sink.records("contacts").await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["id"], "2");
    assert_eq!(
        bookmark(&engine, "contacts", None).await,
        Some(millis("2024-01-10T00:00:00Z"))
    );
}

fn search_window(since: &str, until: i64) -> Value {
    json!({
        "filterGroups": [{"filters": [
            {"propertyName": "lastmodifieddate", "operator": "GTE", "value": millis(since).to_string()},
            {"propertyName": "lastmodifieddate", "operator": "LT", "value": until.to_string()}
        ]}]
    })
}

#[tokio::test]
async fn test_windowed_search_posts_one_request_per_window() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/crm/v3/properties/contacts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"name": "lastmodifieddate"}]
        })))
        .mount(&server)
        .await;

    let end = millis("2024-01-03T00:00:00Z");
    Mock::given(method("POST"))
        .and(path("/crm/v3/objects/contacts/search"))
        .and(body_partial_json(search_window(
            "2024-01-01T00:00:00Z",
            millis("2024-01-02T00:00:00Z"),
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": "1", "properties": {"lastmodifieddate": "2024-01-01T12:00:00Z"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/crm/v3/objects/contacts/search"))
        .and(body_partial_json(search_window("2024-01-02T00:00:00Z", end + 1)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": "2", "properties": {"lastmodifieddate": "2024-01-03T00:00:00Z"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = test_config(&server, &["contacts"]);
    config.start_date = Some("2024-01-01T00:00:00Z".to_string());
    config.end_date = Some("2024-01-03T00:00:00Z".to_string());
    config.search_window_days = Some(1);

    let sink = Arc::new(MemorySink::new());
    let engine = engine(config, StateManager::in_memory(), sink.clone());
    engine.run().await.unwrap();

    let ids: Vec<_> = sink
        .records("contacts")
        .await
        .iter()
        .map(|r| r["id"].clone())
        .collect();
    assert_eq!(ids, vec![json!("1"), json!("2")]);
    assert_eq!(bookmark(&engine, "contacts", None).await, Some(end));
}

#[tokio::test]
async fn test_concurrent_roots_abort_together() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/events"))
        .and(query_param("after", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/events"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "results": [{"id": "9", "updatedAt": "2024-05-01T00:00:00Z"}],
                    "paging": {"next": {"after": "2"}}
                }))
                .set_delay(std::time::Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let mut state = State::new();
    state.advance_bookmark("events", None, "updatedAt", &json!("2024-01-02T00:00:00Z"));

    let mut config = test_config(&server, &["items", "events"]);
    config.max_concurrent_streams = 2;

    let sink = Arc::new(MemorySink::new());
    let engine = engine(config, StateManager::from_state(state), sink.clone());
    let err = engine.run().await.unwrap_err();

    assert!(matches!(err, Error::Client { status: 400, .. }));
    assert!(sink.records("events").await.is_empty());
    assert_eq!(engine.status("items").await, Some(StreamStatus::Failed));
    assert_eq!(engine.status("events").await, Some(StreamStatus::Failed));

    let last = sink.states().await.pop().unwrap();
    assert_eq!(
        last["bookmarks"]["events"]["replication_key_value"],
        "2024-01-02T00:00:00Z"
    );
}

fn list_context(record: &JsonObject, _now: DateTime<Utc>) -> Vec<Context> {
    record
        .get("id")
        .and_then(Value::as_str)
        .map(|id| vec![Context::new().with("list_id", id)])
        .unwrap_or_default()
}

#[tokio::test]
async fn test_parent_bookmark_waits_for_children() {
    let catalog = Catalog::new(vec![
        StreamDefinition::new(
            "lists",
            "/lists",
            ObjectSchema::new([("id", FieldType::String), ("updatedAt", FieldType::DateTime)]),
        )
        .incremental("updatedAt", SortOrder::Ascending),
        StreamDefinition::new(
            "members",
            "/lists/{{ list_id }}/members",
            ObjectSchema::new([("id", FieldType::String), ("list_id", FieldType::String)]),
        )
        .pagination(PaginationKind::None)
        .child_of("lists", list_context),
    ]);

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/lists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"id": "l1", "updatedAt": "2024-01-01T00:00:00Z"},
                {"id": "l2", "updatedAt": "2024-01-02T00:00:00Z"}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/lists/l1/members"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": [{"id": "m1"}]})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/lists/l2/members"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .mount(&server)
        .await;

    let sink = Arc::new(MemorySink::new());
    let engine = engine_with_catalog(
        test_config(&server, &["lists", "members"]),
        StateManager::in_memory(),
        sink.clone(),
        catalog,
    );
    engine.run().await.unwrap_err();

    assert_eq!(sink.records("lists").await.len(), 2);
    assert_eq!(sink.records("members").await.len(), 1);
    assert_eq!(
        bookmark(&engine, "lists", None).await,
        Some(millis("2024-01-01T00:00:00Z"))
    );
    let last = sink.states().await.pop().unwrap();
    assert_eq!(
        last["bookmarks"]["lists"]["replication_key_value"],
        "2024-01-01T00:00:00Z"
    );
}

#[tokio::test]
async fn test_checkpoint_interval_emits_state_mid_stream() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"id": "1", "updatedAt": "2024-01-01T00:00:00Z"},
                {"id": "2", "updatedAt": "2024-01-02T00:00:00Z"},
                {"id": "3", "updatedAt": "2024-01-03T00:00:00Z"}
            ]
        })))
        .mount(&server)
        .await;

    let mut config = test_config(&server, &["events"]);
    config.checkpoint_interval = 2;

    let sink = Arc::new(MemorySink::new());
    let engine = engine(config, StateManager::in_memory(), sink.clone());
    engine.run().await.unwrap();

    let messages = sink.messages().await;
    let first_state = messages
        .iter()
        .position(|m| matches!(m, Message::State { .. }))
        .unwrap();
    let records_before = messages[..first_state]
        .iter()
        .filter(|m| matches!(m, Message::Record { .. }))
        .count();
    assert_eq!(records_before, 2);

    let Message::State { value } = &messages[first_state] else {
        unreachable!()
    };
    assert_eq!(
        value["bookmarks"]["events"]["replication_key_value"],
        "2024-01-02T00:00:00Z"
    );
}

#[tokio::test]
async fn test_fatal_error_aborts_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .mount(&server)
        .await;

    let sink = Arc::new(MemorySink::new());
    let engine = engine(
        test_config(&server, &["items"]),
        StateManager::in_memory(),
        sink.clone(),
    );
    let err = engine.run().await.unwrap_err();

    assert!(matches!(err, Error::Client { status: 400, .. }));
    assert_eq!(engine.status("items").await, Some(StreamStatus::Failed));
    assert!(!sink.states().await.is_empty());
}

#[tokio::test]
async fn test_cancelled_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": [{"id": "1"}]})))
        .expect(0)
        .mount(&server)
        .await;

    let token = CancellationToken::new();
    token.cancel();

    let sink = Arc::new(MemorySink::new());
    let engine = engine(
        test_config(&server, &["items"]),
        StateManager::in_memory(),
        sink.clone(),
    )
    .with_cancellation(token);

    let err = engine.run().await.unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert!(sink.records("items").await.is_empty());
}

#[tokio::test]
async fn test_unknown_stream_selection() {
    let server = MockServer::start().await;
    let engine = engine(
        test_config(&server, &["widgets"]),
        StateManager::in_memory(),
        Arc::new(MemorySink::new()),
    );

    let err = engine.run().await.unwrap_err();
    assert!(matches!(err, Error::StreamNotFound { ref stream } if stream == "widgets"));
}

#[test]
fn test_default_selector_reads_results() {
    let def = StreamDefinition::new("items", "/items", ObjectSchema::open());
    assert_eq!(def.selector, RecordSelector::Field("results"));
}
