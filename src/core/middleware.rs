use std::sync::Arc;

use http::Extensions;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use reqwest::{header, Request, Response};
use reqwest_middleware::{Middleware, Next};
use tokio::sync::OnceCell;
use yup_oauth2::authenticator::Authenticator;
use yup_oauth2::{ServiceAccountAuthenticator, ServiceAccountKey};

// The type returned by ServiceAccountAuthenticator::builder(...).build().await.
type AuthType = Authenticator<HttpsConnector<HttpConnector>>;

/// OAuth2 scopes requested for service-account access.
const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/firebase.database",
    "https://www.googleapis.com/auth/datastore",
    "https://www.googleapis.com/auth/userinfo.email",
    "https://www.googleapis.com/auth/cloud-platform",
];

/// Middleware that signs requests with a service-account Bearer token.
///
/// The authenticator is built lazily on first use and shared across clones,
/// so the token cache survives `Client` clones handed to each service.
///
/// Requests that already carry user credentials are left alone: either an
/// `auth` query parameter (Realtime Database user ID tokens) or a
/// pre-existing `Authorization` header (Storage's `Firebase <token>` form).
#[derive(Clone)]
pub struct AuthMiddleware {
    key: ServiceAccountKey,
    authenticator: Arc<OnceCell<AuthType>>,
}

impl AuthMiddleware {
    pub fn new(key: ServiceAccountKey) -> Self {
        Self {
            key,
            authenticator: Arc::new(OnceCell::new()),
        }
    }

    async fn get_token(&self) -> Result<String, anyhow::Error> {
        let auth = self
            .authenticator
            .get_or_try_init(|| async {
                ServiceAccountAuthenticator::builder(self.key.clone())
                    .build()
                    .await
                    .map_err(|e| std::io::Error::other(e))
            })
            .await?;

        let token = auth.token(SCOPES).await?;

        Ok(token
            .token()
            .ok_or_else(|| anyhow::anyhow!("No token found"))?
            .to_string())
    }
}

#[async_trait::async_trait]
impl Middleware for AuthMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        let has_user_token = req.url().query_pairs().any(|(name, _)| name == "auth")
            || req.headers().contains_key(header::AUTHORIZATION);

        if !has_user_token {
            let token = self.get_token().await.map_err(|e| {
                reqwest_middleware::Error::Middleware(anyhow::anyhow!(
                    "Failed to get auth token: {}",
                    e
                ))
            })?;

            req.headers_mut().insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|e| {
                    reqwest_middleware::Error::Middleware(anyhow::anyhow!(
                        "Invalid bearer token: {}",
                        e
                    ))
                })?,
            );
        }

        next.run(req, extensions).await
    }
}
