//! HTTP Basic authentication.
//!
//! [`BasicAuthLayer`] guards every route it wraps. Requests whose
//! credentials check out reach the inner service with an
//! [`AuthenticatedUser`] attached to their extensions; all others are
//! answered with 403 `{"error": "Unauthorized access"}`.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::{HeaderMap, Request};
use axum::response::{IntoResponse, Response};
use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use futures::future::BoxFuture;
use tower::{Layer, Service};

use super::error::ApiErrorResponse;
use crate::infrastructure::CredentialStore;

// =============================================================================
// BasicCredentials
// =============================================================================

/// Username and password taken from an `Authorization: Basic` header.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    /// Username as sent by the client.
    pub username: String,
    /// Plaintext password as sent by the client.
    pub password: String,
}

impl BasicCredentials {
    /// Parses the `Authorization` header of a request.
    ///
    /// Returns `None` when the header is missing, uses another scheme, is not
    /// valid base64, does not decode to UTF-8, or has no `:` separator. The
    /// password may itself contain `:`.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
        let (scheme, encoded) = value.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }
        let decoded = BASE64_STANDARD.decode(encoded.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (username, password) = decoded.split_once(':')?;
        Some(Self {
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// =============================================================================
// AuthenticatedUser
// =============================================================================

/// Name of the user whose credentials were accepted for this request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AuthenticatedUser(String);

impl AuthenticatedUser {
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self(username.into())
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AuthenticatedUser {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

impl<State> FromRequestParts<State> for AuthenticatedUser
where
    State: Send + Sync,
{
    type Rejection = ApiErrorResponse;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &State,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or_else(ApiErrorResponse::unauthorized)
    }
}

// =============================================================================
// BasicAuthLayer
// =============================================================================

/// Layer that checks HTTP Basic credentials against a [`CredentialStore`].
#[derive(Clone)]
pub struct BasicAuthLayer {
    credential_store: Arc<dyn CredentialStore + Send + Sync>,
}

impl BasicAuthLayer {
    #[must_use]
    pub fn new(credential_store: Arc<dyn CredentialStore + Send + Sync>) -> Self {
        Self { credential_store }
    }
}

impl std::fmt::Debug for BasicAuthLayer {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("BasicAuthLayer")
            .field("credential_store", &"Arc<dyn CredentialStore>")
            .finish()
    }
}

impl<Inner> Layer<Inner> for BasicAuthLayer {
    type Service = BasicAuthService<Inner>;

    fn layer(&self, inner: Inner) -> Self::Service {
        BasicAuthService {
            inner,
            credential_store: Arc::clone(&self.credential_store),
        }
    }
}

// =============================================================================
// BasicAuthService
// =============================================================================

#[derive(Clone)]
pub struct BasicAuthService<Inner> {
    inner: Inner,
    credential_store: Arc<dyn CredentialStore + Send + Sync>,
}

impl<Inner, RequestBody> Service<Request<RequestBody>> for BasicAuthService<Inner>
where
    Inner: Service<Request<RequestBody>, Response = Response> + Clone + Send + 'static,
    Inner::Future: Send,
    RequestBody: Send + 'static,
{
    type Response = Response;
    type Error = Inner::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, context: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(context)
    }

    fn call(&mut self, mut request: Request<RequestBody>) -> Self::Future {
        let credentials = BasicCredentials::from_headers(request.headers());
        let credential_store = Arc::clone(&self.credential_store);

        // The instance that was polled ready is the one that must be called.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let Some(credentials) = credentials else {
                tracing::debug!("Missing or malformed Authorization header");
                return Ok(ApiErrorResponse::unauthorized().into_response());
            };

            match credential_store
                .verify(&credentials.username, &credentials.password)
                .await
            {
                Ok(true) => {
                    request
                        .extensions_mut()
                        .insert(AuthenticatedUser::new(credentials.username));
                    inner.call(request).await
                }
                Ok(false) => {
                    tracing::warn!(username = %credentials.username, "Rejected credentials");
                    Ok(ApiErrorResponse::unauthorized().into_response())
                }
                Err(error) => {
                    tracing::error!(%error, "Credential check failed");
                    Ok(ApiErrorResponse::internal_error().into_response())
                }
            }
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
