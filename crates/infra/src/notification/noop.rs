//! 送信しない実装（ログのみ）

use async_trait::async_trait;
use warble_domain::notification::{EmailMessage, NotificationError};

use super::NotificationSender;

/// メールを送らずにログだけ出す
///
/// 本文には確認コードが含まれるので、宛先と件名だけを記録する。
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotificationSender;

#[async_trait]
impl NotificationSender for NoopNotificationSender {
    async fn send_email(&self, email: &EmailMessage) -> Result<(), NotificationError> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "Noop: メール送信をスキップ"
        );
        Ok(())
    }
}
