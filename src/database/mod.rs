//! Firebase Realtime Database module.
//!
//! This module wraps the Realtime Database REST API: reads with ordering,
//! filtering and pagination directives, writes, conditional (ETag) writes,
//! client-side push-ID generation, and server-sent-event streaming.
//!
//! # Query lifecycle
//!
//! [`Database::child`] returns an owned [`Query`]. Configuration setters take
//! and return the builder; every terminal operation consumes it, so each
//! request starts from a fresh path and query spec by construction:
//!
//! ```rust,ignore
//! # use firebase_rest_api::FirebaseApp;
//! # async fn run(app: FirebaseApp) {
//! let db = app.database();
//! let players = db
//!     .child("players")
//!     .order_by_child("score")
//!     .limit_to_first(10)
//!     .get(None)
//!     .await;
//! # }
//! ```

pub mod query;
pub mod response;
pub mod stream;

mod push_id;

#[cfg(test)]
mod tests;

use std::sync::{Arc, Mutex};

use chrono::Utc;
use log::debug;
use reqwest::header;
use reqwest_middleware::ClientWithMiddleware;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::core::{raise_detailed_error, HttpApiError};
use push_id::PushIdState;
use query::{QuerySpec, QueryValue};
use response::{normalize, sort_by_child, FirebaseResponse};
use stream::{Stream, StreamEvent};

/// Errors that can occur during Realtime Database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
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
    /// The database URL or a derived request URL failed to parse.
    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),
    /// The server response lacked the expected `ETag` header.
    #[error("response is missing the ETag header")]
    MissingEtag,
}

/// Response body of a successful push, carrying the server-assigned key.
#[derive(Debug, Deserialize)]
pub struct PushResponse {
    pub name: String,
}

/// Outcome of a conditional (`If-Match`) write.
#[derive(Debug, PartialEq)]
pub enum ConditionalResult {
    /// The precondition held and the write was applied.
    Committed(Value),
    /// HTTP 412: the supplied ETag was stale. Carries the server's current
    /// ETag so the caller can retry with fresh state. Not an error.
    PreconditionFailed { etag: String },
}

/// Client for the Firebase Realtime Database.
#[derive(Clone)]
pub struct Database {
    client: ClientWithMiddleware,
    base_url: String,
    push_ids: Arc<Mutex<PushIdState>>,
}

impl Database {
    /// Creates a new `Database` against `database_url`.
    ///
    /// This is typically called via `FirebaseApp::database()`; it doubles as
    /// the testing seam for pointing the client at a mock server. The base
    /// URL is normalized to end with `/`.
    pub fn new(client: ClientWithMiddleware, database_url: &str) -> Self {
        let base_url = if database_url.ends_with('/') {
            database_url.to_string()
        } else {
            format!("{database_url}/")
        };

        Self {
            client,
            base_url,
            push_ids: Arc::new(Mutex::new(PushIdState::default())),
        }
    }

    /// Starts a query at the database root.
    pub fn query(&self) -> Query {
        Query {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            path: String::new(),
            spec: QuerySpec::default(),
        }
    }

    /// Starts a query at the given child path.
    pub fn child(&self, path: impl ToString) -> Query {
        self.query().child(path)
    }

    /// Generates a Firebase push ID client-side, without a server round-trip.
    ///
    /// IDs are 20 characters, lexicographically ordered by generation time;
    /// generator state is owned by this `Database` instance.
    pub fn generate_key(&self) -> String {
        let now = Utc::now().timestamp_millis() as u64;
        self.push_ids
            .lock()
            .expect("push id state lock poisoned")
            .next_id(now)
    }

    /// Re-sorts fetched data by a child key value.
    ///
    /// Children lacking `by_key` sort as null, before everything else.
    pub fn sort(&self, origin: &FirebaseResponse, by_key: &str, reverse: bool) -> FirebaseResponse {
        sort_by_child(origin, by_key, reverse)
    }
}

/// A single-use query builder bound to one path.
///
/// Setters chain by value; terminal operations consume the builder. A user
/// ID token may be supplied per call and is sent as the `auth` query
/// parameter; without one, service-account credentials (when configured) are
/// attached as a Bearer header by the client middleware.
#[derive(Clone)]
pub struct Query {
    client: ClientWithMiddleware,
    base_url: String,
    path: String,
    spec: QuerySpec,
}

impl Query {
    /// Appends one or more segments to the path. Leading slashes are
    /// stripped; embedded slashes create nested segments.
    pub fn child(mut self, path: impl ToString) -> Self {
        let segment = path.to_string();
        let segment = segment.strip_prefix('/').unwrap_or(&segment);

        if self.path.is_empty() {
            self.path = segment.to_string();
        } else {
            self.path = format!("{}/{}", self.path, segment);
        }

        self
    }

    /// Orders children by key.
    pub fn order_by_key(mut self) -> Self {
        self.spec.set("orderBy", "$key".into());
        self
    }

    /// Orders children by their value.
    pub fn order_by_value(mut self) -> Self {
        self.spec.set("orderBy", "$value".into());
        self
    }

    /// Orders children by a common child key.
    pub fn order_by_child(mut self, order: impl Into<String>) -> Self {
        self.spec.set("orderBy", QueryValue::String(order.into()));
        self
    }

    /// Lower bound for the ordered value.
    pub fn start_at(mut self, start: impl Into<QueryValue>) -> Self {
        self.spec.set("startAt", start.into());
        self
    }

    /// Upper bound for the ordered value.
    pub fn end_at(mut self, end: impl Into<QueryValue>) -> Self {
        self.spec.set("endAt", end.into());
        self
    }

    /// Exact match on the ordered value.
    pub fn equal_to(mut self, equal: impl Into<QueryValue>) -> Self {
        self.spec.set("equalTo", equal.into());
        self
    }

    /// Limits the result to the first `limit` children.
    pub fn limit_to_first(mut self, limit: u32) -> Self {
        self.spec.set("limitToFirst", limit.into());
        self
    }

    /// Limits the result to the last `limit` children.
    pub fn limit_to_last(mut self, limit: u32) -> Self {
        self.spec.set("limitToLast", limit.into());
        self
    }

    /// Requests a shallow response: immediate child keys only.
    pub fn shallow(mut self) -> Self {
        self.spec.set("shallow", true.into());
        self
    }

    /// Builds the full request URL for this query and consumes the builder.
    ///
    /// String parameters are double-quoted (percent-encoded on the wire),
    /// booleans render as `true`/`false`, numbers bare. The path is suffixed
    /// with `.json`; the token, when present, becomes the `auth` parameter.
    pub fn build_request_url(self, token: Option<&str>) -> Result<String, DatabaseError> {
        Ok(self.request_url(token)?.to_string())
    }

    fn request_url(&self, token: Option<&str>) -> Result<Url, DatabaseError> {
        let mut url = Url::parse(&format!("{}{}.json", self.base_url, self.path))?;

        if token.is_some() || !self.spec.is_empty() {
            let mut pairs = url.query_pairs_mut();

            if let Some(token) = token {
                pairs.append_pair("auth", token);
            }

            for (name, value) in self.spec.iter() {
                pairs.append_pair(name, &value.to_parameter());
            }
        }

        Ok(url)
    }

    // Write URLs carry the auth token but never the query spec.
    fn write_url(&self, token: Option<&str>) -> Result<Url, DatabaseError> {
        let mut url = Url::parse(&format!("{}{}.json", self.base_url, self.path))?;

        if let Some(token) = token {
            url.query_pairs_mut().append_pair("auth", token);
        }

        Ok(url)
    }

    fn query_key(&self) -> String {
        self.path.rsplit('/').next().unwrap_or_default().to_string()
    }

    /// Reads data, applying any pending ordering/filtering directives to the
    /// response.
    pub async fn get(self, token: Option<&str>) -> Result<FirebaseResponse, DatabaseError> {
        let query_key = self.query_key();
        let url = self.request_url(token)?;

        debug!("GET {url}");
        let response = self.client.get(url).send().await?;
        let response = raise_detailed_error(response).await?;

        let raw: Value = response.json().await?;
        Ok(normalize(raw, query_key, &self.spec))
    }

    /// Writes `data` at the path (HTTP PUT), replacing whatever is there.
    pub async fn set<T: Serialize + ?Sized>(
        self,
        data: &T,
        token: Option<&str>,
    ) -> Result<Value, DatabaseError> {
        let url = self.write_url(token)?;

        debug!("PUT {url}");
        let response = self.client.put(url).json(data).send().await?;
        let response = raise_detailed_error(response).await?;

        Ok(response.json().await?)
    }

    /// Appends `data` under a server-assigned push-ID key (HTTP POST).
    pub async fn push<T: Serialize + ?Sized>(
        self,
        data: &T,
        token: Option<&str>,
    ) -> Result<PushResponse, DatabaseError> {
        let url = self.write_url(token)?;

        debug!("POST {url}");
        let response = self.client.post(url).json(data).send().await?;
        let response = raise_detailed_error(response).await?;

        Ok(response.json().await?)
    }

    /// Updates the named children at the path (HTTP PATCH), leaving siblings
    /// untouched.
    pub async fn update<T: Serialize + ?Sized>(
        self,
        data: &T,
        token: Option<&str>,
    ) -> Result<Value, DatabaseError> {
        let url = self.write_url(token)?;

        debug!("PATCH {url}");
        let response = self.client.patch(url).json(data).send().await?;
        let response = raise_detailed_error(response).await?;

        Ok(response.json().await?)
    }

    /// Deletes the data at the path (HTTP DELETE).
    pub async fn remove(self, token: Option<&str>) -> Result<Value, DatabaseError> {
        let url = self.write_url(token)?;

        debug!("DELETE {url}");
        let response = self.client.delete(url).send().await?;
        let response = raise_detailed_error(response).await?;

        Ok(response.json().await?)
    }

    /// Fetches the ETag for the data at the path.
    pub async fn get_etag(self, token: Option<&str>) -> Result<String, DatabaseError> {
        let url = self.request_url(token)?;

        let response = self
            .client
            .get(url)
            .header("X-Firebase-ETag", "true")
            .send()
            .await?;
        let response = raise_detailed_error(response).await?;

        etag_header(&response).ok_or(DatabaseError::MissingEtag)
    }

    /// Writes `data` only if `etag` still matches the stored data.
    ///
    /// An ETag mismatch (HTTP 412) is not an error: it returns
    /// [`ConditionalResult::PreconditionFailed`] with the current ETag so the
    /// caller can retry. No retry loop is provided here.
    pub async fn conditional_set<T: Serialize + ?Sized>(
        self,
        data: &T,
        etag: &str,
        token: Option<&str>,
    ) -> Result<ConditionalResult, DatabaseError> {
        let url = self.write_url(token)?;

        let response = self
            .client
            .put(url)
            .header(header::IF_MATCH, etag)
            .json(data)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::PRECONDITION_FAILED {
            let etag = etag_header(&response).ok_or(DatabaseError::MissingEtag)?;
            return Ok(ConditionalResult::PreconditionFailed { etag });
        }

        let response = raise_detailed_error(response).await?;
        Ok(ConditionalResult::Committed(response.json().await?))
    }

    /// Deletes the data at the path only if `etag` still matches.
    pub async fn conditional_remove(
        self,
        etag: &str,
        token: Option<&str>,
    ) -> Result<ConditionalResult, DatabaseError> {
        let url = self.write_url(token)?;

        let response = self
            .client
            .delete(url)
            .header(header::IF_MATCH, etag)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::PRECONDITION_FAILED {
            let etag = etag_header(&response).ok_or(DatabaseError::MissingEtag)?;
            return Ok(ConditionalResult::PreconditionFailed { etag });
        }

        let response = raise_detailed_error(response).await?;
        Ok(ConditionalResult::Committed(response.json().await?))
    }

    /// Subscribes to server-sent events at the path.
    ///
    /// `handler` runs on a dedicated background task, once per event; it must
    /// synchronize any shared state itself. Use [`Stream::close`] to stop the
    /// subscription and wait for the worker to exit.
    pub fn stream<F>(
        self,
        handler: F,
        token: Option<&str>,
        stream_id: Option<String>,
    ) -> Result<Stream, DatabaseError>
    where
        F: FnMut(StreamEvent) + Send + 'static,
    {
        let url = self.request_url(token)?;
        Ok(Stream::spawn(self.client, url, handler, stream_id))
    }
}

fn etag_header(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(header::ETAG)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}
