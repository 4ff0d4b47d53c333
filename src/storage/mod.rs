//! Cloud Storage for Firebase module.
//!
//! A wrapper over the Firebase Storage v0 object API. Paths accumulate
//! through a consuming [`StorageRef`] builder, mirroring the database query
//! builder:
//!
//! ```rust,ignore
//! # use firebase_rest_api::FirebaseApp;
//! # async fn run(app: FirebaseApp) {
//! let storage = app.storage();
//! let _ = storage
//!     .child("images")
//!     .child("profile.png")
//!     .put(b"...".to_vec(), Some("image/png"), None)
//!     .await;
//! # }
//! ```
//!
//! A user ID token is sent as an `Authorization: Firebase <token>` header;
//! without one, service-account credentials (when configured) sign the
//! request instead.

#[cfg(test)]
mod tests;

use bytes::Bytes;
use log::debug;
use reqwest::header;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::core::{raise_detailed_error, HttpApiError};

const STORAGE_V0_API: &str = "https://firebasestorage.googleapis.com/v0/b";

/// Errors that can occur during Storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
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
    /// The bucket URL or a derived object URL failed to parse.
    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),
}

/// Listing of the objects in a bucket.
#[derive(Debug, Deserialize)]
pub struct ObjectList {
    #[serde(default)]
    pub prefixes: Vec<String>,
    #[serde(default)]
    pub items: Vec<ObjectItem>,
}

#[derive(Debug, Deserialize)]
pub struct ObjectItem {
    pub name: String,
    #[serde(default)]
    pub bucket: Option<String>,
}

/// Client for Cloud Storage for Firebase.
#[derive(Clone)]
pub struct FirebaseStorage {
    client: ClientWithMiddleware,
    base_url: String,
}

impl FirebaseStorage {
    /// Creates a new `FirebaseStorage` for `bucket`.
    ///
    /// This is typically called via `FirebaseApp::storage()`.
    pub fn new(client: ClientWithMiddleware, bucket: String) -> Self {
        Self {
            client,
            base_url: format!("{STORAGE_V0_API}/{bucket}"),
        }
    }

    /// Creates an instance with a custom base URL, primarily for testing.
    #[allow(dead_code)]
    pub(crate) fn new_with_client(client: ClientWithMiddleware, base_url: String) -> Self {
        Self { client, base_url }
    }

    /// Starts an object reference at the given path.
    pub fn child(&self, path: impl ToString) -> StorageRef {
        StorageRef {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            path: String::new(),
        }
        .child(path)
    }

    /// Lists the objects in the bucket.
    pub async fn list_files(&self) -> Result<ObjectList, StorageError> {
        let url = format!("{}/o", self.base_url);

        let response = self.client.get(url).send().await?;
        let response = raise_detailed_error(response).await?;

        Ok(response.json().await?)
    }
}

/// A reference to one object path, built by consuming `child` calls.
#[derive(Clone)]
pub struct StorageRef {
    client: ClientWithMiddleware,
    base_url: String,
    path: String,
}

impl StorageRef {
    /// Appends a segment to the object path.
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

    // The object name is a single path segment with its slashes
    // percent-encoded, per the v0 API.
    fn object_url(&self) -> Result<Url, StorageError> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .push("o")
            .push(&self.path);
        Ok(url)
    }

    /// Uploads `data` as the object's new content.
    pub async fn put(
        self,
        data: impl Into<reqwest::Body>,
        content_type: Option<&str>,
        token: Option<&str>,
    ) -> Result<Value, StorageError> {
        let mut url = Url::parse(&format!("{}/o", self.base_url))?;
        url.query_pairs_mut().append_pair("name", &self.path);

        debug!("POST {url}");
        let mut request = self.client.post(url).body(data);

        if let Some(content_type) = content_type {
            request = request.header(header::CONTENT_TYPE, content_type);
        }
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Firebase {token}"));
        }

        let response = request.send().await?;
        let response = raise_detailed_error(response).await?;

        Ok(response.json().await?)
    }

    /// Downloads the object's content.
    pub async fn download(self, token: Option<&str>) -> Result<Bytes, StorageError> {
        let mut url = self.object_url()?;
        url.query_pairs_mut().append_pair("alt", "media");

        debug!("GET {url}");
        let mut request = self.client.get(url);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Firebase {token}"));
        }

        let response = request.send().await?;
        let response = raise_detailed_error(response).await?;

        Ok(response.bytes().await?)
    }

    /// Returns the media URL for the object, with the download token when
    /// one is supplied.
    pub fn get_url(&self, token: Option<&str>) -> Result<String, StorageError> {
        let mut url = self.object_url()?;

        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("alt", "media");
            if let Some(token) = token {
                pairs.append_pair("token", token);
            }
        }

        Ok(url.to_string())
    }

    /// Deletes the object.
    pub async fn delete(self, token: Option<&str>) -> Result<(), StorageError> {
        let mut url = Url::parse(&format!("{}/o", self.base_url))?;
        url.query_pairs_mut().append_pair("name", &self.path);

        debug!("DELETE {url}");
        let mut request = self.client.delete(url);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Firebase {token}"));
        }

        let response = request.send().await?;
        raise_detailed_error(response).await?;

        Ok(())
    }
}
