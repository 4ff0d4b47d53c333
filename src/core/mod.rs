pub mod middleware;

use reqwest::{Client, Response};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use thiserror::Error;
use yup_oauth2::ServiceAccountKey;

use crate::core::middleware::AuthMiddleware;

/// Error for any non-2xx API response.
///
/// The raw response body is kept verbatim so callers always see the server's
/// own diagnostic text instead of a generic status line.
#[derive(Error, Debug)]
#[error("the firebase API returned {status}: {body}")]
pub struct HttpApiError {
    pub status: u16,
    pub body: String,
}

/// Passes 2xx responses through unchanged; anything else becomes an
/// [`HttpApiError`] carrying the response body text.
pub(crate) async fn raise_detailed_error(response: Response) -> Result<Response, HttpApiError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(HttpApiError { status, body })
    }
}

/// Builds the shared HTTP client every service uses.
///
/// Transient transport failures are retried up to three times with
/// exponential backoff. When a service account key is present, an
/// [`AuthMiddleware`] attaches Bearer tokens to requests that do not already
/// carry user credentials.
pub(crate) fn http_client(key: Option<ServiceAccountKey>) -> ClientWithMiddleware {
    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);

    let builder = ClientBuilder::new(Client::new())
        .with(RetryTransientMiddleware::new_with_policy(retry_policy));

    match key {
        Some(key) => builder.with(AuthMiddleware::new(key)).build(),
        None => builder.build(),
    }
}
