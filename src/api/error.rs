//! API errors
//!
//! Every failure leaves the router as `{success: false, message}` with a fitting status.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::accounts::AccountError;

pub const LOGIN_REQUIRED: &str = "로그인이 필요합니다.";
pub const EMPTY_MESSAGE: &str = "메시지를 입력해주세요.";
pub const MISSING_CREDENTIALS: &str = "아이디와 비밀번호를 입력해주세요.";
pub const INVALID_CREDENTIALS: &str = "아이디 또는 비밀번호가 일치하지 않습니다.";
pub const DUPLICATE_USER_ID: &str = "이미 사용 중인 아이디입니다.";
pub const DUPLICATE_EMAIL: &str = "이미 등록된 이메일입니다.";
pub const REGISTER_FAILED: &str = "회원가입 중 오류가 발생했습니다.";
pub const USER_NOT_FOUND: &str = "사용자를 찾을 수 없습니다.";
pub const INVALID_BODY: &str = "잘못된 요청 형식입니다.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn login_required() -> Self {
        Self::Unauthorized(LOGIN_REQUIRED.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(e: AccountError) -> Self {
        match e {
            AccountError::MissingField(field) => Self::BadRequest(format!("{field}를 입력해주세요.")),
            AccountError::DuplicateUserId => Self::BadRequest(DUPLICATE_USER_ID.to_string()),
            AccountError::DuplicateEmail => Self::BadRequest(DUPLICATE_EMAIL.to_string()),
            AccountError::InvalidCredentials => Self::Unauthorized(INVALID_CREDENTIALS.to_string()),
            AccountError::Storage(e) => {
                tracing::error!("Account storage error: {}", e);
                Self::Internal(REGISTER_FAILED.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!("Rejected request body: {}", rejection.body_text());
        Self::BadRequest(INVALID_BODY.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!("Request failed with {}: {}", status, self);
        }
        (status, Json(json!({ "success": false, "message": self.to_string() }))).into_response()
    }
}
