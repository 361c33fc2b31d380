//! Request extractors: validated JSON bodies and cookie sessions.

use async_trait::async_trait;
use auth_identity::Session;
use axum::{
    extract::{FromRequest, FromRequestParts, Request},
    http::request::Parts,
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::de::DeserializeOwned;
use uuid::Uuid;
use validator::Validate;

use crate::error::ApiError;
use crate::server::IdentityServer;

/// JSON body that has passed `validator` rules before reaching a handler.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::invalid_request(rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// Session ID taken from the configured cookie. Absent, blank or malformed
/// cookies are rejected as unauthorized.
#[derive(Debug, Clone)]
pub struct SessionId(pub String);

#[async_trait]
impl FromRequestParts<IdentityServer> for SessionId {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &IdentityServer,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let value = jar
            .get(&state.config.cookie.name)
            .map(|cookie| cookie.value().trim().to_string())
            .ok_or(ApiError::Unauthorized)?;

        Uuid::parse_str(&value).map_err(|_| ApiError::Unauthorized)?;
        Ok(Self(value))
    }
}

/// A live session resolved through the session store.
#[derive(Debug, Clone, Copy)]
pub struct CurrentSession(pub Session);

#[async_trait]
impl FromRequestParts<IdentityServer> for CurrentSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &IdentityServer,
    ) -> Result<Self, Self::Rejection> {
        let SessionId(id) = SessionId::from_request_parts(parts, state).await?;
        let session = state.sessions.resolve(&id).await?;
        Ok(Self(session))
    }
}
