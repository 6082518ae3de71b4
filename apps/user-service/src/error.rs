//! # User Service エラー定義
//!
//! ハンドラ・ユースケースが返すエラーと、HTTP レスポンスへの変換を定義する。
//!
//! レスポンスボディは [`warble_shared::ErrorResponse`]（RFC 9457）。
//! 5xx の原因はログにだけ出し、クライアントには固定文言を返す。

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use warble_domain::DomainError;
use warble_infra::{InfraError, TokenError};
use warble_shared::{
    ErrorResponse,
    event_log::error::{category, kind},
};

/// User Service で発生するエラー
#[derive(Debug, Error)]
pub enum ApiError {
    /// 不正なリクエスト
    #[error("不正なリクエスト: {0}")]
    BadRequest(String),

    /// 入力値の検証エラー
    #[error("バリデーションエラー: {0}")]
    Validation(String),

    /// 認証が必要、またはトークンが無効
    #[error("認証エラー: {0}")]
    Unauthorized(String),

    /// 権限がない
    #[error("権限がありません: {0}")]
    Forbidden(String),

    /// リソースが見つからない
    #[error("リソースが見つかりません: {0}")]
    NotFound(String),

    /// 一意制約の競合
    #[error("競合が発生しました: {0}")]
    Conflict(String),

    /// アップロードが大きすぎる
    #[error("サイズ超過: {0}")]
    PayloadTooLarge(String),

    /// データベース・外部サービスのエラー
    #[error("インフラエラー: {0}")]
    Database(#[from] InfraError),

    /// 内部エラー
    #[error("内部エラー: {0}")]
    Internal(String),
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => Self::Validation(msg),
            DomainError::NotFound { entity_type, id } => {
                Self::NotFound(format!("{entity_type} not found: {id}"))
            }
            DomainError::Conflict(msg) => Self::Conflict(msg),
            DomainError::Forbidden(msg) => Self::Forbidden(msg),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => Self::Unauthorized("Token expired".to_string()),
            TokenError::Invalid(_) => Self::Unauthorized("Invalid token".to_string()),
            TokenError::Encode(msg) => Self::Internal(format!("トークン生成に失敗: {msg}")),
        }
    }
}

impl ApiError {
    fn to_error_response(&self) -> ErrorResponse {
        match self {
            ApiError::BadRequest(msg) => ErrorResponse::bad_request(msg),
            ApiError::Validation(msg) => ErrorResponse::validation_error(msg),
            ApiError::Unauthorized(msg) => ErrorResponse::unauthorized(msg),
            ApiError::Forbidden(msg) => ErrorResponse::forbidden(msg),
            ApiError::NotFound(msg) => ErrorResponse::not_found(msg),
            ApiError::Conflict(msg) => ErrorResponse::conflict(msg),
            ApiError::PayloadTooLarge(msg) => ErrorResponse::payload_too_large(msg),
            ApiError::Database(e) => {
                tracing::error!(
                    error.category = category::INFRASTRUCTURE,
                    error.kind = kind::DATABASE,
                    span_trace = %e.span_trace(),
                    "インフラエラー: {}",
                    e
                );
                ErrorResponse::internal_error()
            }
            ApiError::Internal(msg) => {
                tracing::error!(
                    error.category = category::INFRASTRUCTURE,
                    error.kind = kind::INTERNAL,
                    "内部エラー: {}",
                    msg
                );
                ErrorResponse::internal_error()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = self.to_error_response();
        let status = StatusCode::from_u16(body.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        (status, Json(body)).into_response()
    }
}
