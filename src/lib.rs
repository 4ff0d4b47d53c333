//! A Rust client for Google's Firebase REST APIs.
//!
//! Services are reached through a [`FirebaseApp`] built from a
//! [`FirebaseConfig`]. All services share one HTTP client with transparent
//! transient-failure retries; when a service account is configured, requests
//! without user credentials are signed with an OAuth2 Bearer token.
//!
//! ```rust,ignore
//! use firebase_rest_api::{initialize_app, FirebaseConfig};
//!
//! # async fn run(config: FirebaseConfig) {
//! let app = initialize_app(config);
//! let db = app.database();
//!
//! let response = db.child("users").order_by_key().get(None).await;
//! # }
//! ```

pub mod core;

#[cfg(feature = "auth")]
pub mod auth;
#[cfg(feature = "database")]
pub mod database;
#[cfg(feature = "firestore")]
pub mod firestore;
#[cfg(feature = "storage")]
pub mod storage;

use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use yup_oauth2::ServiceAccountKey;

#[cfg(feature = "auth")]
use auth::FirebaseAuth;
#[cfg(feature = "database")]
use database::Database;
#[cfg(feature = "firestore")]
use firestore::FirebaseFirestore;
#[cfg(feature = "storage")]
use storage::FirebaseStorage;

/// Firebase project configuration, matching the web-app config object plus
/// an optional service account key for privileged access.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirebaseConfig {
    pub api_key: String,
    pub auth_domain: String,
    #[serde(rename = "databaseURL")]
    pub database_url: String,
    pub storage_bucket: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub service_account: Option<ServiceAccountKey>,
}

/// Initializes and returns a new Firebase instance.
pub fn initialize_app(config: FirebaseConfig) -> FirebaseApp {
    FirebaseApp::new(config)
}

/// Entry point to the Firebase services.
pub struct FirebaseApp {
    config: FirebaseConfig,
    client: ClientWithMiddleware,
}

impl FirebaseApp {
    pub fn new(config: FirebaseConfig) -> Self {
        let client = core::http_client(config.service_account.clone());
        Self { config, client }
    }

    /// Returns a Firebase Authentication client.
    #[cfg(feature = "auth")]
    pub fn auth(&self) -> FirebaseAuth {
        FirebaseAuth::new(self.client.clone(), self.config.api_key.clone())
    }

    /// Returns a Realtime Database client.
    #[cfg(feature = "database")]
    pub fn database(&self) -> Database {
        Database::new(self.client.clone(), &self.config.database_url)
    }

    /// Returns a Cloud Storage client for the configured bucket.
    #[cfg(feature = "storage")]
    pub fn storage(&self) -> FirebaseStorage {
        FirebaseStorage::new(self.client.clone(), self.config.storage_bucket.clone())
    }

    /// Returns a Firestore document client.
    ///
    /// Requires `project_id` in the configuration.
    #[cfg(feature = "firestore")]
    pub fn firestore(&self) -> FirebaseFirestore {
        let project_id = self
            .config
            .project_id
            .clone()
            .expect("failed to create Firestore client: project_id is missing from the config");

        FirebaseFirestore::new(self.client.clone(), project_id, self.config.api_key.clone())
    }
}
