//! # メール送信
//!
//! `NotificationSender` トレイトと 3 つの実装。
//!
//! | 実装 | 用途 |
//! |------|------|
//! | [`SmtpNotificationSender`] | 開発環境（Mailpit などのローカル SMTP） |
//! | [`SesNotificationSender`] | 本番環境（AWS SES v2） |
//! | [`NoopNotificationSender`] | 送信しない（ログのみ） |
//!
//! どれを使うかは user-service の `NOTIFICATION_BACKEND` で決める。

mod noop;
mod ses;
mod smtp;

use async_trait::async_trait;
pub use noop::NoopNotificationSender;
pub use ses::{SesNotificationSender, create_ses_client};
pub use smtp::SmtpNotificationSender;
use warble_domain::notification::{EmailMessage, NotificationError};

/// メール送信トレイト
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send_email(&self, email: &EmailMessage) -> Result<(), NotificationError>;
}
