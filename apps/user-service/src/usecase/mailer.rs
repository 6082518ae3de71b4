//! # 確認メール送信
//!
//! サインアップ直後のメールアドレス確認メールを組み立てて送る。
//!
//! - テンプレートは `include_str!` でバイナリに埋め込み、tera でレンダリングする
//! - 送信は fire-and-forget。失敗してもサインアップの結果は変わらない

use std::sync::Arc;

use tera::{Context, Tera};
use url::Url;
use warble_domain::{
    notification::{EmailMessage, NotificationError, VerificationEmail},
    user::User,
};
use warble_infra::NotificationSender;
use warble_shared::{event_log::event, log_business_event};

const SUBJECT: &str = "[Warble] Verify your email address";

/// 確認メールの送信を担当する
pub struct VerificationMailer {
    engine:          Tera,
    sender:          Arc<dyn NotificationSender>,
    public_base_url: Url,
}

impl VerificationMailer {
    /// `public_base_url` は確認リンクの起点（このサービスの外部公開 URL）
    pub fn new(
        sender: Arc<dyn NotificationSender>,
        public_base_url: Url,
    ) -> Result<Self, NotificationError> {
        let mut engine = Tera::default();

        engine
            .add_raw_templates(vec![
                (
                    "verify_email.html",
                    include_str!("../../templates/verify_email.html"),
                ),
                (
                    "verify_email.txt",
                    include_str!("../../templates/verify_email.txt"),
                ),
            ])
            .map_err(|e| NotificationError::TemplateFailed(e.to_string()))?;

        Ok(Self {
            engine,
            sender,
            public_base_url,
        })
    }

    /// 確認待ちのユーザーに送るメール
    ///
    /// 確認済みのユーザーには `None` を返す。
    pub fn verification_for(&self, user: &User) -> Result<Option<VerificationEmail>, NotificationError> {
        let Some(code) = user.verify_code() else {
            return Ok(None);
        };

        let mut url = self.public_base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                NotificationError::TemplateFailed(format!(
                    "リンクの起点にできない URL: {}",
                    self.public_base_url
                ))
            })?
            .pop_if_empty()
            .extend(["users", "verifyEmail", user.email().as_str(), code.as_str()]);

        Ok(Some(VerificationEmail {
            to:         user.email().clone(),
            username:   user.username().clone(),
            verify_url: url.to_string(),
        }))
    }

    /// HTML と plaintext の本文を生成する
    pub fn render(&self, email: &VerificationEmail) -> Result<EmailMessage, NotificationError> {
        let mut context = Context::new();
        context.insert("username", email.username.as_str());
        context.insert("verify_url", &email.verify_url);

        let html_body = self
            .engine
            .render("verify_email.html", &context)
            .map_err(|e| NotificationError::TemplateFailed(e.to_string()))?;
        let text_body = self
            .engine
            .render("verify_email.txt", &context)
            .map_err(|e| NotificationError::TemplateFailed(e.to_string()))?;

        Ok(EmailMessage {
            to: email.to.as_str().to_string(),
            subject: SUBJECT.to_string(),
            html_body,
            text_body,
        })
    }

    /// レンダリングして送信する
    ///
    /// 失敗はログに残すだけで呼び出し元には返さない。
    pub async fn send(&self, email: VerificationEmail) {
        let message = match self.render(&email) {
            Ok(message) => message,
            Err(e) => {
                tracing::error!(error = %e, "確認メールのレンダリングに失敗");
                return;
            }
        };

        match self.sender.send_email(&message).await {
            Ok(()) => {
                log_business_event!(
                    event.category = event::category::NOTIFICATION,
                    event.action = event::action::VERIFICATION_EMAIL_SENT,
                    event.entity_type = event::entity_type::USER,
                    event.result = event::result::SUCCESS,
                    notification.recipient = %email.to,
                    "確認メール送信成功"
                );
            }
            Err(e) => {
                log_business_event!(
                    event.category = event::category::NOTIFICATION,
                    event.action = event::action::VERIFICATION_EMAIL_FAILED,
                    event.entity_type = event::entity_type::USER,
                    event.result = event::result::FAILURE,
                    notification.recipient = %email.to,
                    error = %e,
                    "確認メール送信失敗"
                );
            }
        }
    }

    /// バックグラウンドタスクで送信する
    pub fn spawn_send(self: &Arc<Self>, email: VerificationEmail) {
        let mailer = Arc::clone(self);
        tokio::spawn(async move { mailer.send(email).await });
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use pretty_assertions::assert_eq;
    use warble_domain::{
        password::PasswordHash,
        user::{Email, FullName, NewUser, UserId, Username, VerifyCode},
    };
    use warble_infra::mock::RecordingNotificationSender;

    use super::*;

    fn pending_user(email: &str) -> User {
        NewUser::signup(
            FullName::new("Alice Example").unwrap(),
            Username::new("alice").unwrap(),
            Email::new(email).unwrap(),
            PasswordHash::new("$argon2id$dummy"),
            None,
            VerifyCode::new("Code123").unwrap(),
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        )
        .into_user(UserId::new(1).unwrap())
    }

    fn mailer(sender: RecordingNotificationSender, base: &str) -> VerificationMailer {
        VerificationMailer::new(Arc::new(sender), Url::parse(base).unwrap()).unwrap()
    }

    #[test]
    fn test_確認urlにメールアドレスとコードが入る() {
        let sut = mailer(RecordingNotificationSender::new(), "https://api.warble.test/");

        let email = sut
            .verification_for(&pending_user("alice@example.com"))
            .unwrap()
            .unwrap();

        assert_eq!(
            email.verify_url,
            "https://api.warble.test/users/verifyEmail/alice@example.com/Code123"
        );
        assert_eq!(email.username.as_str(), "alice");
    }

    #[test]
    fn test_起点urlのパスを引き継ぐ() {
        let sut = mailer(RecordingNotificationSender::new(), "https://warble.test/api");

        let email = sut
            .verification_for(&pending_user("alice@example.com"))
            .unwrap()
            .unwrap();

        assert_eq!(
            email.verify_url,
            "https://warble.test/api/users/verifyEmail/alice@example.com/Code123"
        );
    }

    #[test]
    fn test_確認済みユーザーにはメールを作らない() {
        let sut = mailer(RecordingNotificationSender::new(), "https://api.warble.test");
        let user = pending_user("alice@example.com")
            .verified(DateTime::from_timestamp(1_700_000_100, 0).unwrap());

        assert!(sut.verification_for(&user).unwrap().is_none());
    }

    #[test]
    fn test_html版とテキスト版の両方にリンクが入る() {
        let sut = mailer(RecordingNotificationSender::new(), "https://api.warble.test");
        let email = sut
            .verification_for(&pending_user("alice@example.com"))
            .unwrap()
            .unwrap();

        let message = sut.render(&email).unwrap();

        assert_eq!(message.to, "alice@example.com");
        assert_eq!(message.subject, "[Warble] Verify your email address");
        assert!(message.html_body.contains("Hi alice,"));
        assert!(message.html_body.contains(&email.verify_url));
        assert!(message.text_body.contains(&email.verify_url));
    }

    #[tokio::test]
    async fn test_送信したメールが記録される() {
        let sender = RecordingNotificationSender::new();
        let sut = mailer(sender.clone(), "https://api.warble.test");
        let email = sut
            .verification_for(&pending_user("alice@example.com"))
            .unwrap()
            .unwrap();

        sut.send(email).await;

        let sent = sender.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "alice@example.com");
    }

    #[tokio::test]
    async fn test_送信失敗でもパニックしない() {
        let sut = mailer(RecordingNotificationSender::failing(), "https://api.warble.test");
        let email = sut
            .verification_for(&pending_user("alice@example.com"))
            .unwrap()
            .unwrap();

        sut.send(email).await;
    }
}
