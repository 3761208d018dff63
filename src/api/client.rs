//! HTTP gateway for the Courtbook REST API.
//!
//! Every outbound request is built through [`ApiClient::request`], which
//! reads the current bearer token from the [`CredentialStore`] at call time
//! and attaches it to that request only. Call sites never touch the store,
//! and the shared client configuration is never mutated after construction.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::auth::CredentialStore;
use crate::models::UserProfile;

use super::ApiError;

/// Production base URL for the Courtbook REST API.
pub const DEFAULT_BASE_URL: &str = "https://api.courtbook.app";

/// HTTP request timeout in seconds.
/// 30s tolerates slow mobile networks while still failing fast enough
/// for an interactive booking flow.
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    identifier: &'a str,
    secret: &'a str,
}

/// Raw login/registration response. Both fields are optional at the wire
/// level; the session layer decides whether the response is usable.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub user: Option<UserProfile>,
    pub token: Option<String>,
}

/// Authentication endpoints as the session layer consumes them.
/// `ApiClient` is the production implementation; tests supply mocks.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// `POST /users/login`
    async fn login(&self, identifier: &str, secret: &str) -> Result<LoginResponse, ApiError>;

    /// `POST /users/auth/logout`. The response body is ignored; the call
    /// exists so the server can invalidate the token on its side.
    async fn logout(&self) -> Result<(), ApiError>;
}

/// API client for the Courtbook backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    credentials: CredentialStore,
}

impl ApiClient {
    /// Create a client against the production API.
    pub fn new(credentials: CredentialStore) -> Result<Self, ApiError> {
        Self::with_base_url(credentials, DEFAULT_BASE_URL)
    }

    /// Create a client against an arbitrary base URL (staging, tests).
    pub fn with_base_url(
        credentials: CredentialStore,
        base_url: impl Into<String>,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            credentials,
        })
    }

    /// Build a request for `path`, attaching `Authorization: Bearer <token>`
    /// when a token is currently stored.
    ///
    /// No token, or a storage error while reading one, means the request
    /// goes out unauthenticated; it is never blocked or queued waiting for
    /// credentials.
    pub async fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.client.request(method, &url);
        match self.credentials.get_token().await {
            Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {}", token)),
            None => builder,
        }
    }

    /// Check if response is successful, returning a typed error with the
    /// body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// GET `path` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.request(Method::GET, path).await.send().await?;
        let response = Self::check_response(response).await?;
        response.json().await.map_err(ApiError::from)
    }

    /// POST `body` to `path` and decode the JSON response.
    pub async fn post_json<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self
            .request(Method::POST, path)
            .await
            .json(body)
            .send()
            .await?;
        let response = Self::check_response(response).await?;
        response.json().await.map_err(ApiError::from)
    }
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn login(&self, identifier: &str, secret: &str) -> Result<LoginResponse, ApiError> {
        debug!(identifier, "sending login request");
        let response = self
            .request(Method::POST, "/users/login")
            .await
            .json(&LoginRequest { identifier, secret })
            .send()
            .await?;
        let response = Self::check_response(response).await?;
        response.json().await.map_err(ApiError::from)
    }

    async fn logout(&self) -> Result<(), ApiError> {
        let response = self.request(Method::POST, "/users/auth/logout").await.send().await?;
        Self::check_response(response).await?;
        Ok(())
    }
}
