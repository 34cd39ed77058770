//! Registration, login and session handlers

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::accounts::{AccountError, AccountStore, NewUser};
use crate::api::auth::{clear_session_cookie, session_cookie, CurrentSession};
use crate::api::error::{ApiError, MISSING_CREDENTIALS, USER_NOT_FOUND};
use crate::app::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub password: String,
}

/// Runs password hashing off the async workers
async fn blocking<T, F>(accounts: &Arc<AccountStore>, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&AccountStore) -> Result<T, AccountError> + Send + 'static,
    T: Send + 'static,
{
    let accounts = accounts.clone();
    tokio::task::spawn_blocking(move || f(accounts.as_ref()))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}

/// `POST /api/register`
pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<NewUser>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(new_user) = body?;
    blocking(&state.accounts, move |accounts| accounts.register(new_user)).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": "회원가입이 완료되었습니다." })),
    ))
}

/// `POST /api/login`
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = body?;
    if request.user_id.is_empty() || request.password.is_empty() {
        return Err(ApiError::BadRequest(MISSING_CREDENTIALS.to_string()));
    }

    let user = blocking(&state.accounts, move |accounts| {
        accounts.authenticate(&request.user_id, &request.password)
    })
    .await?;

    let token = state.sessions.create(user.id);
    tracing::info!("User {} logged in", user.user_id);

    Ok((
        [(header::SET_COOKIE, session_cookie(token, state.sessions.ttl()))],
        Json(json!({ "success": true, "message": "로그인 성공", "user": user })),
    ))
}

/// `POST /api/logout`
pub async fn logout(
    State(state): State<AppState>,
    session: Option<CurrentSession>,
) -> impl IntoResponse {
    if let Some(session) = session {
        state.sessions.remove(&session.token);
        tracing::info!("User {} logged out", session.user_pk);
    }
    (
        [(header::SET_COOKIE, clear_session_cookie())],
        Json(json!({ "success": true, "message": "로그아웃 되었습니다." })),
    )
}

/// `GET /api/me`
pub async fn me(
    State(state): State<AppState>,
    session: CurrentSession,
) -> Result<Json<Value>, ApiError> {
    let user = state
        .accounts
        .get(session.user_pk)
        .ok_or_else(|| ApiError::NotFound(USER_NOT_FOUND.to_string()))?;
    Ok(Json(json!({ "success": true, "user": user })))
}

/// `GET /api/check-id/:user_id`
pub async fn check_id(State(state): State<AppState>, Path(user_id): Path<String>) -> Json<Value> {
    Json(json!({ "exists": state.accounts.user_id_exists(&user_id) }))
}

/// `GET /api/check-email/:email`
pub async fn check_email(State(state): State<AppState>, Path(email): Path<String>) -> Json<Value> {
    Json(json!({ "exists": state.accounts.email_exists(&email) }))
}
