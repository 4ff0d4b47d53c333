//! Firebase Authentication module.
//!
//! A wrapper over the Identity Toolkit REST API, keyed by the project's Web
//! API key. Covers email/password and anonymous sign-in, custom-token
//! exchange, token refresh, account lookup and the out-of-band email flows.
//! OAuth/social sign-in is out of scope.

pub mod models;


use reqwest_middleware::ClientWithMiddleware;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::core::{raise_detailed_error, HttpApiError};
use models::{
    AnonymousSignInRequest, CustomTokenRequest, DeleteAttribute, EmailPasswordRequest,
    GetAccountInfoResponse, IdTokenRequest, OobCodeRequest, RefreshRequest, RefreshResponse,
    ResetPasswordRequest, SignInResponse, UpdateProfileRequest,
};

const IDENTITY_TOOLKIT_V1_API: &str = "https://identitytoolkit.googleapis.com/v1";
const SECURE_TOKEN_V1_API: &str = "https://securetoken.googleapis.com/v1";

/// Errors that can occur during Authentication operations.
#[derive(Error, Debug)]
pub enum AuthError {
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
}

/// Client for Firebase Authentication.
#[derive(Clone)]
pub struct FirebaseAuth {
    client: ClientWithMiddleware,
    api_key: String,
    base_url: String,
    token_url: String,
}

impl FirebaseAuth {
    /// Creates a new `FirebaseAuth` instance.
    ///
    /// This is typically called via `FirebaseApp::auth()`.
    pub fn new(client: ClientWithMiddleware, api_key: String) -> Self {
        Self {
            client,
            api_key,
            base_url: IDENTITY_TOOLKIT_V1_API.to_string(),
            token_url: SECURE_TOKEN_V1_API.to_string(),
        }
    }

    /// Creates an instance with custom endpoints, primarily for testing.
    #[allow(dead_code)]
    pub(crate) fn new_with_client(
        client: ClientWithMiddleware,
        api_key: String,
        base_url: String,
        token_url: String,
    ) -> Self {
        Self {
            client,
            api_key,
            base_url,
            token_url,
        }
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        url: String,
        body: &B,
    ) -> Result<T, AuthError> {
        let response = self.client.post(url).json(body).send().await?;
        let response = raise_detailed_error(response).await?;
        Ok(response.json().await?)
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{}/accounts:{}?key={}", self.base_url, action, self.api_key)
    }

    /// Signs a user in with their email and password.
    pub async fn sign_in_with_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SignInResponse, AuthError> {
        let body = EmailPasswordRequest {
            email,
            password,
            return_secure_token: true,
        };
        self.post(self.endpoint("signInWithPassword"), &body).await
    }

    /// Signs in as an anonymous user.
    pub async fn sign_in_anonymous(&self) -> Result<SignInResponse, AuthError> {
        let body = AnonymousSignInRequest {
            return_secure_token: true,
        };
        self.post(self.endpoint("signUp"), &body).await
    }

    /// Exchanges a custom token (minted by a trusted backend) for an ID token.
    pub async fn sign_in_with_custom_token(
        &self,
        token: &str,
    ) -> Result<SignInResponse, AuthError> {
        let body = CustomTokenRequest {
            token,
            return_secure_token: true,
        };
        self.post(self.endpoint("signInWithCustomToken"), &body)
            .await
    }

    /// Creates a new email/password user.
    pub async fn create_user_with_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SignInResponse, AuthError> {
        let body = EmailPasswordRequest {
            email,
            password,
            return_secure_token: true,
        };
        self.post(self.endpoint("signUp"), &body).await
    }

    /// Trades a refresh token for a fresh ID token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, AuthError> {
        let url = format!("{}/token?key={}", self.token_url, self.api_key);
        let body = RefreshRequest {
            grant_type: "refresh_token",
            refresh_token,
        };
        self.post(url, &body).await
    }

    /// Looks up the account information for an ID token.
    pub async fn get_account_info(
        &self,
        id_token: &str,
    ) -> Result<GetAccountInfoResponse, AuthError> {
        let body = IdTokenRequest { id_token };
        self.post(self.endpoint("lookup"), &body).await
    }

    /// Sends the verification email for the account behind `id_token`.
    pub async fn send_email_verification(
        &self,
        id_token: &str,
    ) -> Result<serde_json::Value, AuthError> {
        let body = OobCodeRequest {
            request_type: "VERIFY_EMAIL",
            id_token: Some(id_token),
            email: None,
        };
        self.post(self.endpoint("sendOobCode"), &body).await
    }

    /// Sends a password-reset email.
    pub async fn send_password_reset_email(
        &self,
        email: &str,
    ) -> Result<serde_json::Value, AuthError> {
        let body = OobCodeRequest {
            request_type: "PASSWORD_RESET",
            id_token: None,
            email: Some(email),
        };
        self.post(self.endpoint("sendOobCode"), &body).await
    }

    /// Applies a password reset using the out-of-band code from the email.
    pub async fn verify_password_reset_code(
        &self,
        reset_code: &str,
        new_password: &str,
    ) -> Result<serde_json::Value, AuthError> {
        let body = ResetPasswordRequest {
            oob_code: reset_code,
            new_password,
        };
        self.post(self.endpoint("resetPassword"), &body).await
    }

    /// Updates the display name and/or photo URL of an account, or deletes
    /// those attributes.
    pub async fn update_profile(
        &self,
        id_token: &str,
        display_name: Option<&str>,
        photo_url: Option<&str>,
        delete_attribute: Vec<DeleteAttribute>,
    ) -> Result<serde_json::Value, AuthError> {
        let body = UpdateProfileRequest {
            id_token,
            display_name,
            photo_url,
            delete_attribute,
            return_secure_token: true,
        };
        self.post(self.endpoint("update"), &body).await
    }

    /// Deletes the account behind `id_token`.
    pub async fn delete_user_account(&self, id_token: &str) -> Result<(), AuthError> {
        let body = IdTokenRequest { id_token };
        let response = self
            .client
            .post(self.endpoint("delete"))
            .json(&body)
            .send()
            .await?;
        raise_detailed_error(response).await?;
        Ok(())
    }
}
