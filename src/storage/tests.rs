use super::*;
use httpmock::prelude::*;
use reqwest::Client;
use reqwest_middleware::ClientBuilder;
use serde_json::json;

fn storage(server: &MockServer) -> FirebaseStorage {
    let client = ClientBuilder::new(Client::new()).build();
    FirebaseStorage::new_with_client(client, server.url("/v0/b/test-bucket"))
}

#[tokio::test]
async fn put_uploads_with_a_firebase_token_header() {
    let server = MockServer::start();
    let storage = storage(&server);

    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v0/b/test-bucket/o")
            .query_param("name", "images/profile.png")
            .header("Authorization", "Firebase id-token")
            .header("Content-Type", "image/png")
            .body("fake-png");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({"name": "images/profile.png", "bucket": "test-bucket"}));
    });

    let metadata = storage
        .child("images")
        .child("profile.png")
        .put("fake-png", Some("image/png"), Some("id-token"))
        .await
        .unwrap();

    assert_eq!(metadata["name"], "images/profile.png");
    mock.assert();
}

#[tokio::test]
async fn download_requests_media_with_an_encoded_object_name() {
    let server = MockServer::start();
    let storage = storage(&server);

    let mock = server.mock(|when, then| {
        when.method(GET).query_param("alt", "media");
        then.status(200)
            .header("content-type", "image/png")
            .body("fake-png");
    });

    let content = storage
        .child("images/profile.png")
        .download(None)
        .await
        .unwrap();

    assert_eq!(content.as_ref(), b"fake-png");
    mock.assert();
}

#[test]
fn get_url_embeds_the_download_token() {
    let client = ClientBuilder::new(Client::new()).build();
    let storage =
        FirebaseStorage::new_with_client(client, format!("{STORAGE_V0_API}/test-bucket"));

    let url = storage
        .child("images/profile.png")
        .get_url(Some("download-token"))
        .unwrap();

    assert_eq!(
        url,
        "https://firebasestorage.googleapis.com/v0/b/test-bucket/o/images%2Fprofile.png?alt=media&token=download-token"
    );
}

#[tokio::test]
async fn delete_addresses_the_object_by_name() {
    let server = MockServer::start();
    let storage = storage(&server);

    let mock = server.mock(|when, then| {
        when.method(DELETE)
            .path("/v0/b/test-bucket/o")
            .query_param("name", "old/file.txt");
        then.status(204);
    });

    storage.child("old/file.txt").delete(None).await.unwrap();
    mock.assert();
}

#[tokio::test]
async fn list_files_returns_the_bucket_items() {
    let server = MockServer::start();
    let storage = storage(&server);

    let mock = server.mock(|when, then| {
        when.method(GET).path("/v0/b/test-bucket/o");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "prefixes": ["images/"],
                "items": [{"name": "readme.txt", "bucket": "test-bucket"}]
            }));
    });

    let listing = storage.list_files().await.unwrap();
    assert_eq!(listing.prefixes, ["images/"]);
    assert_eq!(listing.items[0].name, "readme.txt");

    mock.assert();
}
