//! # 通知
//!
//! メール通知のドメインモデル。
//!
//! 通知の送信失敗はユーザー操作の結果に影響させない（fire-and-forget）。
//! テンプレートのレンダリングは user-service 側の責務。

use thiserror::Error;

use crate::user::{Email, Username};

/// 通知送信エラー
#[derive(Debug, Error)]
pub enum NotificationError {
    /// メール送信に失敗
    #[error("メール送信に失敗: {0}")]
    SendFailed(String),

    /// テンプレートレンダリングに失敗
    #[error("テンプレートレンダリングに失敗: {0}")]
    TemplateFailed(String),
}

/// 送信するメール
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to:        String,
    pub subject:   String,
    pub html_body: String,
    pub text_body: String,
}

/// サインアップ時のメールアドレス確認メール
#[derive(Debug, Clone)]
pub struct VerificationEmail {
    pub to:         Email,
    pub username:   Username,
    /// `PATCH /users/verifyEmail/{email}/{code}` を叩くための URL
    pub verify_url: String,
}
