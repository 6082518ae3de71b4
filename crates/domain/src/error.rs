//! # ドメイン層エラー定義
//!
//! | エラー種別 | HTTP ステータス | 用途 |
//! |-----------|----------------|------|
//! | `Validation` | 400 Bad Request | 入力値の検証失敗 |
//! | `NotFound` | 404 Not Found | ユーザーが存在しない |
//! | `Conflict` | 409 Conflict | ユーザー名・メールアドレスの重複 |
//! | `Forbidden` | 403 Forbidden | 他人のアカウントへの操作 |
//!
//! HTTP ステータスへの変換は user-service の `ApiError` が行う。

use thiserror::Error;

/// ドメイン層で発生するエラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    /// 入力値がビジネスルールに違反している
    #[error("バリデーションエラー: {0}")]
    Validation(String),

    /// エンティティが見つからない
    #[error("{entity_type} が見つかりません: {id}")]
    NotFound {
        /// エンティティの種類（"User" など）
        entity_type: &'static str,
        /// 検索に使用した識別子
        id:          String,
    },

    /// 一意制約に反する
    #[error("競合が発生しました: {0}")]
    Conflict(String),

    /// 認証済みだが操作の権限がない
    #[error("権限がありません: {0}")]
    Forbidden(String),
}
