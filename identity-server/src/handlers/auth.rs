use auth_identity::{
    Credentials, IdentityError, NewUser, PaginationQuery, User, UserChanges, UserPage, UserWithToken,
};
use axum::{
    extract::{rejection::PathRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::error::{ApiError, ApiResult};
use crate::extractors::{CurrentSession, SessionId, ValidatedJson};
use crate::server::IdentityServer;

/// Raw pagination parameters; parsed by [`PaginationQuery::from_raw`].
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<String>,
    pub size: Option<String>,
    #[serde(rename = "orderBy")]
    pub order_by: Option<String>,
}

impl ListParams {
    fn pagination(&self) -> Result<PaginationQuery, ApiError> {
        Ok(PaginationQuery::from_raw(
            self.page.as_deref(),
            self.size.as_deref(),
            self.order_by.as_deref(),
        )?)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub username: Option<String>,
    pub page: Option<String>,
    pub size: Option<String>,
    #[serde(rename = "orderBy")]
    pub order_by: Option<String>,
}

fn session_cookie(config: &ServerConfig, session_id: String) -> Cookie<'static> {
    let max_age = i64::try_from(config.identity.session.ttl_seconds).unwrap_or(i64::MAX);
    Cookie::build((config.cookie.name.clone(), session_id))
        .path("/")
        .secure(config.cookie.secure)
        .http_only(config.cookie.http_only)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(max_age))
        .build()
}

fn user_id(path: Result<Path<Uuid>, PathRejection>) -> ApiResult<Uuid> {
    path.map(|Path(id)| id)
        .map_err(|rejection| ApiError::invalid_request(rejection.body_text()))
}

/// POST /auth/register
pub async fn register(
    State(server): State<IdentityServer>,
    jar: CookieJar,
    ValidatedJson(input): ValidatedJson<NewUser>,
) -> ApiResult<(StatusCode, CookieJar, Json<UserWithToken>)> {
    let registered = server.identity.register(input).await?;
    let session_id = server.sessions.create(registered.user.id).await?;

    info!(user_id = %registered.user.id, "user registered");
    let jar = jar.add(session_cookie(&server.config, session_id));
    Ok((StatusCode::CREATED, jar, Json(registered)))
}

/// POST /auth/login
pub async fn login(
    State(server): State<IdentityServer>,
    jar: CookieJar,
    ValidatedJson(credentials): ValidatedJson<Credentials>,
) -> ApiResult<(CookieJar, Json<UserWithToken>)> {
    let logged_in = server.identity.login(credentials).await?;
    let session_id = server.sessions.create(logged_in.user.id).await?;

    let jar = jar.add(session_cookie(&server.config, session_id));
    Ok((jar, Json(logged_in)))
}

/// POST /auth/logout
pub async fn logout(
    State(server): State<IdentityServer>,
    jar: CookieJar,
    SessionId(session_id): SessionId,
) -> ApiResult<(CookieJar, StatusCode)> {
    server.sessions.revoke(&session_id).await?;

    let jar = jar.remove(Cookie::build((server.config.cookie.name.clone(), "")).path("/"));
    Ok((jar, StatusCode::OK))
}

/// PUT /auth/:user_id
pub async fn update(
    State(server): State<IdentityServer>,
    path: Result<Path<Uuid>, PathRejection>,
    ValidatedJson(changes): ValidatedJson<UserChanges>,
) -> ApiResult<Json<User>> {
    let id = user_id(path)?;
    Ok(Json(server.identity.update(id, changes).await?))
}

/// DELETE /auth/:user_id
pub async fn delete(
    State(server): State<IdentityServer>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<StatusCode> {
    let id = user_id(path)?;
    server.identity.delete(id).await?;
    info!(user_id = %id, "user deleted");
    Ok(StatusCode::OK)
}

/// GET /auth/search?username=&page=&size=&orderBy=
///
/// Bad paging here is an ordinary invalid request, unlike `/all`.
pub async fn search(
    State(server): State<IdentityServer>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<UserPage>> {
    let username = params
        .username
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::invalid_request("query parameter `username` is required"))?;

    let paging = PaginationQuery::from_raw(
        params.page.as_deref(),
        params.size.as_deref(),
        params.order_by.as_deref(),
    )
    .map_err(|e| ApiError::invalid_request(e.to_string()))?;

    Ok(Json(server.identity.find_by_username(username, &paging).await?))
}

/// GET /auth/all?page=&size=&orderBy=
pub async fn list(
    State(server): State<IdentityServer>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<UserPage>> {
    let paging = params.pagination()?;
    Ok(Json(server.identity.list_users(&paging).await?))
}

/// GET /auth/me
///
/// A session whose user has since been deleted is treated as unauthorized.
pub async fn me(
    State(server): State<IdentityServer>,
    CurrentSession(session): CurrentSession,
) -> ApiResult<Json<User>> {
    match server.identity.get_by_id(session.user_id).await {
        Ok(user) => Ok(Json(user)),
        Err(IdentityError::NotFound) => Err(ApiError::Unauthorized),
        Err(err) => Err(err.into()),
    }
}
