//! Cloud Firestore module.
//!
//! A wrapper over the Firestore v1 REST API covering document CRUD:
//! collection and document references, reads, writes, updates and deletes,
//! with transparent translation between plain JSON and Firestore's typed
//! value envelope. Structured queries are out of scope.

pub mod models;


use log::debug;
use reqwest::header;
use reqwest_middleware::ClientWithMiddleware;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::core::{raise_detailed_error, HttpApiError};
use models::{decode_fields, document_id, encode_fields, DocumentSnapshot};

const FIRESTORE_V1_API: &str = "https://firestore.googleapis.com/v1/projects";

/// Errors that can occur during Firestore operations.
#[derive(Error, Debug)]
pub enum FirestoreError {
    /// Wrapper for `reqwest::Error`.
    #[error("HTTP Request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    /// Wrapper for `reqwest_middleware::Error`.
    #[error("Middleware error: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),
    /// Non-2xx response from the REST API, carrying the response body.
    #[error(transparent)]
    ApiError(#[from] HttpApiError),
    /// Wrapper for `serde_json::Error`.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    /// A derived request URL failed to parse.
    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),
}

/// Client for Cloud Firestore documents.
#[derive(Clone)]
pub struct FirebaseFirestore {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: String,
}

impl FirebaseFirestore {
    /// Creates a new `FirebaseFirestore` for the project's default database.
    ///
    /// This is typically called via `FirebaseApp::firestore()`.
    pub fn new(client: ClientWithMiddleware, project_id: String, api_key: String) -> Self {
        Self {
            client,
            base_url: format!("{FIRESTORE_V1_API}/{project_id}/databases/(default)/documents"),
            api_key,
        }
    }

    /// Creates an instance with a custom base URL, primarily for testing.
    #[allow(dead_code)]
    pub(crate) fn new_with_client(
        client: ClientWithMiddleware,
        base_url: String,
        api_key: String,
    ) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }

    /// Returns a reference to a top-level collection.
    pub fn collection(&self, collection_id: impl ToString) -> CollectionReference {
        CollectionReference {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            path: collection_id.to_string(),
        }
    }
}

/// A reference to a collection of documents.
#[derive(Clone)]
pub struct CollectionReference {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: String,
    path: String,
}

impl CollectionReference {
    /// Returns a reference to a document in this collection.
    pub fn document(&self, document_id: impl ToString) -> DocumentReference {
        DocumentReference {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            path: format!("{}/{}", self.path, document_id.to_string()),
        }
    }

    /// Creates a document with a server-assigned ID.
    pub async fn add(
        &self,
        data: &Value,
        token: Option<&str>,
    ) -> Result<DocumentSnapshot, FirestoreError> {
        let url = request_url(&self.base_url, &self.path, &self.api_key)?;

        debug!("POST {url}");
        let request = self.client.post(url).json(&encode_fields(data));
        let response = with_token(request, token).send().await?;
        let response = raise_detailed_error(response).await?;

        let document: Value = response.json().await?;
        Ok(snapshot(&document))
    }

    /// Fetches every document of the collection.
    pub async fn get(&self, token: Option<&str>) -> Result<Vec<DocumentSnapshot>, FirestoreError> {
        let url = request_url(&self.base_url, &self.path, &self.api_key)?;

        debug!("GET {url}");
        let response = with_token(self.client.get(url), token).send().await?;
        let response = raise_detailed_error(response).await?;

        let body: Value = response.json().await?;
        Ok(body
            .get("documents")
            .and_then(Value::as_array)
            .map(|documents| documents.iter().map(snapshot).collect())
            .unwrap_or_default())
    }

    /// Lists the IDs of the documents in the collection.
    pub async fn list_of_documents(
        &self,
        token: Option<&str>,
    ) -> Result<Vec<String>, FirestoreError> {
        Ok(self
            .get(token)
            .await?
            .into_iter()
            .map(|snapshot| snapshot.id)
            .collect())
    }
}

/// A reference to a single document.
#[derive(Clone)]
pub struct DocumentReference {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: String,
    path: String,
}

impl DocumentReference {
    /// Returns a reference to a sub-collection of this document.
    pub fn collection(&self, collection_id: impl ToString) -> CollectionReference {
        CollectionReference {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            path: format!("{}/{}", self.path, collection_id.to_string()),
        }
    }

    /// Fetches the document, decoded to plain JSON.
    pub async fn get(&self, token: Option<&str>) -> Result<DocumentSnapshot, FirestoreError> {
        let url = request_url(&self.base_url, &self.path, &self.api_key)?;

        debug!("GET {url}");
        let response = with_token(self.client.get(url), token).send().await?;
        let response = raise_detailed_error(response).await?;

        let document: Value = response.json().await?;
        Ok(snapshot(&document))
    }

    /// Writes `data` as the document's content, replacing existing fields.
    pub async fn set(
        &self,
        data: &Value,
        token: Option<&str>,
    ) -> Result<DocumentSnapshot, FirestoreError> {
        let url = request_url(&self.base_url, &self.path, &self.api_key)?;

        debug!("PATCH {url}");
        let request = self.client.patch(url).json(&encode_fields(data));
        let response = with_token(request, token).send().await?;
        let response = raise_detailed_error(response).await?;

        let document: Value = response.json().await?;
        Ok(snapshot(&document))
    }

    /// Updates only the named top-level fields, leaving others untouched.
    pub async fn update(
        &self,
        data: &Value,
        token: Option<&str>,
    ) -> Result<DocumentSnapshot, FirestoreError> {
        let mut url = request_url(&self.base_url, &self.path, &self.api_key)?;

        if let Value::Object(map) = data {
            let mut pairs = url.query_pairs_mut();
            for field in map.keys() {
                pairs.append_pair("updateMask.fieldPaths", field);
            }
        }

        debug!("PATCH {url}");
        let request = self.client.patch(url).json(&encode_fields(data));
        let response = with_token(request, token).send().await?;
        let response = raise_detailed_error(response).await?;

        let document: Value = response.json().await?;
        Ok(snapshot(&document))
    }

    /// Deletes the document.
    pub async fn delete(&self, token: Option<&str>) -> Result<(), FirestoreError> {
        let url = request_url(&self.base_url, &self.path, &self.api_key)?;

        debug!("DELETE {url}");
        let response = with_token(self.client.delete(url), token).send().await?;
        raise_detailed_error(response).await?;

        Ok(())
    }
}

fn request_url(base_url: &str, path: &str, api_key: &str) -> Result<Url, FirestoreError> {
    let mut url = Url::parse(&format!("{base_url}/{path}"))?;
    url.query_pairs_mut().append_pair("key", api_key);
    Ok(url)
}

// User ID tokens ride in the `Firebase` authorization scheme; without one the
// service-account middleware may attach a Bearer header instead.
fn with_token(
    request: reqwest_middleware::RequestBuilder,
    token: Option<&str>,
) -> reqwest_middleware::RequestBuilder {
    match token {
        Some(token) => request.header(header::AUTHORIZATION, format!("Firebase {token}")),
        None => request,
    }
}

fn snapshot(document: &Value) -> DocumentSnapshot {
    DocumentSnapshot {
        id: document
            .get("name")
            .and_then(Value::as_str)
            .map(document_id)
            .unwrap_or_default(),
        data: decode_fields(document),
    }
}
