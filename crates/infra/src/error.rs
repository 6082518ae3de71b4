//! # インフラ層エラー定義
//!
//! データベースや外部サービスとの通信で発生するエラー。
//!
//! `std::io::Error` と同じ struct + enum パターン:
//! - [`InfraError`]: 種別（[`InfraErrorKind`]）と [`SpanTrace`] を保持するラッパー
//! - [`InfraErrorKind`]: 具体的な種別
//!
//! `From` 実装と convenience constructor はどちらも生成時点の `SpanTrace` を捕捉する。
//! user-service は 500 を返すときにこれをログへ出す。

use std::fmt;

use derive_more::Display;
use thiserror::Error;
use tracing_error::SpanTrace;

/// PostgreSQL の一意制約違反
const UNIQUE_VIOLATION: &str = "23505";

/// インフラ層で発生するエラー
///
/// 種別ごとの処理には [`kind()`](InfraError::kind) でマッチする:
///
/// ```ignore
/// match error.kind() {
///     InfraErrorKind::Conflict { constraint, .. } => { /* 409 */ }
///     _ => { /* 500 */ }
/// }
/// ```
#[derive(Display)]
#[display("{kind}")]
pub struct InfraError {
    kind:       InfraErrorKind,
    span_trace: SpanTrace,
}

/// インフラ層エラーの種別
#[derive(Debug, Error)]
pub enum InfraErrorKind {
    /// SQL の実行失敗、接続エラーなど
    #[error("データベースエラー: {0}")]
    Database(#[source] sqlx::Error),

    /// JSON の変換失敗
    #[error("シリアライズエラー: {0}")]
    Serialization(#[source] serde_json::Error),

    /// 一意制約違反
    ///
    /// `constraint` は違反した制約名（例: `users_username_key`）。
    #[error("一意制約違反: {entity}({constraint})")]
    Conflict {
        entity:     String,
        constraint: String,
    },

    /// S3 への操作の失敗
    ///
    /// AWS SDK のエラー型はジェネリクスが深いので String にマップする。
    #[error("S3 エラー: {0}")]
    S3(String),

    /// 外部 HTTP 呼び出し（OAuth プロバイダ）の失敗
    #[error("HTTP エラー: {0}")]
    Http(#[source] reqwest::Error),

    /// インフラ層で検出したクライアント入力の不正（画像サイズ超過など）
    #[error("入力エラー: {0}")]
    InvalidInput(String),

    /// 上記に分類できないエラー
    #[error("予期しないエラー: {0}")]
    Unexpected(String),
}

impl InfraError {
    pub fn kind(&self) -> &InfraErrorKind {
        &self.kind
    }

    pub fn span_trace(&self) -> &SpanTrace {
        &self.span_trace
    }

    /// Conflict の場合は違反した制約名を返す
    pub fn conflict_constraint(&self) -> Option<&str> {
        match &self.kind {
            InfraErrorKind::Conflict { constraint, .. } => Some(constraint),
            _ => None,
        }
    }

    /// InvalidInput の場合はメッセージを返す
    pub fn invalid_input_message(&self) -> Option<&str> {
        match &self.kind {
            InfraErrorKind::InvalidInput(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn into_parts(self) -> (InfraErrorKind, SpanTrace) {
        (self.kind, self.span_trace)
    }

    fn capture(kind: InfraErrorKind) -> Self {
        Self {
            kind,
            span_trace: SpanTrace::capture(),
        }
    }

    pub fn conflict(entity: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self::capture(InfraErrorKind::Conflict {
            entity:     entity.into(),
            constraint: constraint.into(),
        })
    }

    pub fn s3(msg: impl Into<String>) -> Self {
        Self::capture(InfraErrorKind::S3(msg.into()))
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::capture(InfraErrorKind::InvalidInput(msg.into()))
    }

    pub fn unexpected(msg: impl Into<String>) -> Self {
        Self::capture(InfraErrorKind::Unexpected(msg.into()))
    }

    /// sqlx のエラーを変換する。一意制約違反は Conflict にする。
    pub fn from_sqlx(entity: &str, source: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &source {
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                let constraint = db_err.constraint().unwrap_or("unknown").to_string();
                return Self::conflict(entity, constraint);
            }
        }
        Self::from(source)
    }
}

impl fmt::Debug for InfraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfraError")
            .field("kind", &self.kind)
            .field("span_trace", &self.span_trace)
            .finish()
    }
}

impl std::error::Error for InfraError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.kind.source()
    }
}

impl From<sqlx::Error> for InfraError {
    fn from(source: sqlx::Error) -> Self {
        Self::capture(InfraErrorKind::Database(source))
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(source: serde_json::Error) -> Self {
        Self::capture(InfraErrorKind::Serialization(source))
    }
}

impl From<reqwest::Error> for InfraError {
    fn from(source: reqwest::Error) -> Self {
        Self::capture(InfraErrorKind::Http(source))
    }
}
