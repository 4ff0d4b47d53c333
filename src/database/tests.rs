use super::*;
use httpmock::prelude::*;
use reqwest::Client;
use reqwest_middleware::ClientBuilder;
use serde_json::json;

fn database(server: &MockServer) -> Database {
    let client = ClientBuilder::new(Client::new()).build();
    Database::new(client, &server.base_url())
}

#[test]
fn base_url_is_normalized_to_a_trailing_slash() {
    let client = ClientBuilder::new(Client::new()).build();

    let db = Database::new(client.clone(), "https://demo.firebaseio.com");
    let url = db.child("users").build_request_url(None).unwrap();
    assert_eq!(url, "https://demo.firebaseio.com/users.json");

    let db = Database::new(client, "https://demo.firebaseio.com/");
    let url = db.child("users").build_request_url(None).unwrap();
    assert_eq!(url, "https://demo.firebaseio.com/users.json");
}

#[test]
fn request_url_quotes_strings_and_leaves_numbers_bare() {
    let client = ClientBuilder::new(Client::new()).build();
    let db = Database::new(client, "https://demo.firebaseio.com");

    let url = db
        .child("players")
        .order_by_child("score")
        .limit_to_first(5)
        .build_request_url(None)
        .unwrap();

    assert!(
        url.contains("orderBy=%22score%22&limitToFirst=5"),
        "unexpected query string: {url}"
    );

    // The builder was consumed; a fresh one carries no leftover state.
    let url = db.query().build_request_url(None).unwrap();
    assert_eq!(url, "https://demo.firebaseio.com/.json");
}

#[test]
fn auth_token_leads_the_query_string() {
    let client = ClientBuilder::new(Client::new()).build();
    let db = Database::new(client, "https://demo.firebaseio.com");

    let url = db
        .child("users")
        .shallow()
        .build_request_url(Some("id-token"))
        .unwrap();

    assert_eq!(
        url,
        "https://demo.firebaseio.com/users.json?auth=id-token&shallow=true"
    );
}

#[test]
fn child_accepts_nested_and_absolute_segments() {
    let client = ClientBuilder::new(Client::new()).build();
    let db = Database::new(client, "https://demo.firebaseio.com");

    let url = db
        .child("/users")
        .child("alice/games")
        .child(7)
        .build_request_url(None)
        .unwrap();

    assert_eq!(url, "https://demo.firebaseio.com/users/alice/games/7.json");
}

#[tokio::test]
async fn get_normalizes_object_responses_with_order_by() {
    let server = MockServer::start();
    let db = database(&server);

    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/players.json")
            .query_param("orderBy", "\"score\"");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({"b": {"score": 2}, "a": {"score": 1}}));
    });

    let response = db
        .child("players")
        .order_by_child("score")
        .get(None)
        .await
        .unwrap();

    assert_eq!(response.key(), "players");
    assert_eq!(
        response.val(),
        json!({"a": {"score": 1}, "b": {"score": 2}})
    );

    mock.assert();
}

#[tokio::test]
async fn get_materializes_array_responses_as_plain_lists() {
    let server = MockServer::start();
    let db = database(&server);

    let mock = server.mock(|when, then| {
        when.method(GET).path("/scores.json");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!([10, 20, 30]));
    });

    let response = db.child("scores").get(None).await.unwrap();
    assert_eq!(response.val(), json!([10, 20, 30]));

    mock.assert();
}

#[tokio::test]
async fn shallow_get_returns_keys_only() {
    let server = MockServer::start();
    let db = database(&server);

    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/rooms.json")
            .query_param("shallow", "true");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({"x": {"deep": 1}, "y": {"deep": 2}}));
    });

    let response = db.child("rooms").shallow().get(None).await.unwrap();
    assert_eq!(response.val(), json!(["x", "y"]));

    mock.assert();
}

#[tokio::test]
async fn set_puts_data_and_returns_the_stored_value() {
    let server = MockServer::start();
    let db = database(&server);

    let mock = server.mock(|when, then| {
        when.method(PUT)
            .path("/users/alice.json")
            .json_body(json!({"name": "Alice"}));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({"name": "Alice"}));
    });

    let stored = db
        .child("users")
        .child("alice")
        .set(&json!({"name": "Alice"}), None)
        .await
        .unwrap();
    assert_eq!(stored, json!({"name": "Alice"}));

    mock.assert();
}

#[tokio::test]
async fn push_posts_data_and_returns_the_assigned_key() {
    let server = MockServer::start();
    let db = database(&server);

    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/messages.json")
            .query_param("auth", "id-token")
            .json_body(json!({"text": "hi"}));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({"name": "-NxAbCdEfGhIjKlMnOpQ"}));
    });

    let pushed = db
        .child("messages")
        .push(&json!({"text": "hi"}), Some("id-token"))
        .await
        .unwrap();
    assert_eq!(pushed.name, "-NxAbCdEfGhIjKlMnOpQ");

    mock.assert();
}

#[tokio::test]
async fn update_patches_and_remove_deletes() {
    let server = MockServer::start();
    let db = database(&server);

    let patch = server.mock(|when, then| {
        when.method(PATCH)
            .path("/users/alice.json")
            .json_body(json!({"age": 31}));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({"age": 31}));
    });

    let delete = server.mock(|when, then| {
        when.method(DELETE).path("/users/bob.json");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!(null));
    });

    let updated = db
        .child("users/alice")
        .update(&json!({"age": 31}), None)
        .await
        .unwrap();
    assert_eq!(updated, json!({"age": 31}));

    let removed = db.child("users/bob").remove(None).await.unwrap();
    assert_eq!(removed, json!(null));

    patch.assert();
    delete.assert();
}

#[tokio::test]
async fn write_urls_ignore_the_query_spec() {
    let server = MockServer::start();
    let db = database(&server);

    // No orderBy parameter may reach the server on a write.
    let mock = server.mock(|when, then| {
        when.method(PUT)
            .path("/items.json")
            .query_param_missing("orderBy");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!(1));
    });

    db.child("items")
        .order_by_key()
        .set(&json!(1), None)
        .await
        .unwrap();

    mock.assert();
}

#[tokio::test]
async fn get_etag_sends_the_etag_request_header() {
    let server = MockServer::start();
    let db = database(&server);

    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/users/alice.json")
            .header("X-Firebase-ETag", "true");
        then.status(200)
            .header("content-type", "application/json")
            .header("ETag", "etag-1")
            .json_body(json!({"name": "Alice"}));
    });

    let etag = db.child("users/alice").get_etag(None).await.unwrap();
    assert_eq!(etag, "etag-1");

    mock.assert();
}

#[tokio::test]
async fn conditional_set_with_stale_etag_returns_the_current_one() {
    let server = MockServer::start();
    let db = database(&server);

    let mock = server.mock(|when, then| {
        when.method(PUT)
            .path("/users/alice.json")
            .header("If-Match", "stale-etag");
        then.status(412).header("ETag", "current-etag");
    });

    let result = db
        .child("users/alice")
        .conditional_set(&json!({"name": "Alice"}), "stale-etag", None)
        .await
        .unwrap();

    assert_eq!(
        result,
        ConditionalResult::PreconditionFailed {
            etag: "current-etag".to_string()
        }
    );

    mock.assert();
}

#[tokio::test]
async fn conditional_set_with_matching_etag_commits() {
    let server = MockServer::start();
    let db = database(&server);

    let mock = server.mock(|when, then| {
        when.method(PUT)
            .path("/users/alice.json")
            .header("If-Match", "etag-1")
            .json_body(json!({"name": "Alice"}));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({"name": "Alice"}));
    });

    let result = db
        .child("users/alice")
        .conditional_set(&json!({"name": "Alice"}), "etag-1", None)
        .await
        .unwrap();

    assert_eq!(
        result,
        ConditionalResult::Committed(json!({"name": "Alice"}))
    );

    mock.assert();
}

#[tokio::test]
async fn conditional_remove_reports_precondition_failures() {
    let server = MockServer::start();
    let db = database(&server);

    let mock = server.mock(|when, then| {
        when.method(DELETE)
            .path("/users/alice.json")
            .header("If-Match", "stale-etag");
        then.status(412).header("ETag", "current-etag");
    });

    let result = db
        .child("users/alice")
        .conditional_remove("stale-etag", None)
        .await
        .unwrap();

    assert_eq!(
        result,
        ConditionalResult::PreconditionFailed {
            etag: "current-etag".to_string()
        }
    );

    mock.assert();
}

#[tokio::test]
async fn errors_carry_the_raw_response_body() {
    let server = MockServer::start();
    let db = database(&server);

    server.mock(|when, then| {
        when.method(GET).path("/secret.json");
        then.status(401)
            .header("content-type", "application/json")
            .body("{\"error\" : \"Permission denied.\"}");
    });

    let err = db.child("secret").get(None).await.unwrap_err();
    match err {
        DatabaseError::ApiError(api) => {
            assert_eq!(api.status, 401);
            assert!(api.body.contains("Permission denied."), "{}", api.body);
        }
        other => panic!("expected ApiError, got {other:?}"),
    }
}

#[tokio::test]
async fn stream_delivers_events_to_the_handler_and_joins_on_close() {
    let server = MockServer::start();
    let db = database(&server);

    server.mock(|when, then| {
        when.method(GET)
            .path("/chat.json")
            .header("Accept", "text/event-stream");
        then.status(200)
            .header("content-type", "text/event-stream")
            .body(concat!(
                "event: put\n",
                "data: {\"path\": \"/\", \"data\": {\"msg\": \"hello\"}}\n",
                "\n",
                "event: keep-alive\n",
                "data: null\n",
                "\n",
            ));
    });

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let stream = db
        .child("chat")
        .stream(
            move |event| {
                let _ = tx.send(event);
            },
            None,
            Some("chat-1".to_string()),
        )
        .unwrap();

    let first = rx.recv().await.expect("first event");
    assert_eq!(first.event, "put");
    assert_eq!(first.data, json!({"path": "/", "data": {"msg": "hello"}}));
    assert_eq!(first.stream_id.as_deref(), Some("chat-1"));

    let second = rx.recv().await.expect("second event");
    assert_eq!(second.event, "keep-alive");
    assert_eq!(second.data, json!(null));

    stream.close().await;
}

#[test]
fn generate_key_is_unique_and_ordered_per_instance() {
    let client = ClientBuilder::new(Client::new()).build();
    let db = Database::new(client, "https://demo.firebaseio.com");

    let keys: Vec<String> = (0..64).map(|_| db.generate_key()).collect();

    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted, "keys should already be in generation order");

    for pair in keys.windows(2) {
        assert!(pair[0] < pair[1], "{} vs {}", pair[0], pair[1]);
    }
    assert!(keys.iter().all(|k| k.len() == 20));
}
