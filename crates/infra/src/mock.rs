//! # テスト用モック
//!
//! ユースケース・ハンドラのテストで使用するインメモリ実装。
//! `test-utils` feature を有効にすることで、他クレートからも利用可能。
//!
//! ```toml
//! [dev-dependencies]
//! warble-infra = { workspace = true, features = ["test-utils"] }
//! ```

use std::sync::{
    Arc,
    Mutex,
    atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use url::Url;
use warble_domain::{
    notification::{EmailMessage, NotificationError},
    oauth::{OAuthError, OAuthIdentity, OAuthProfile, OAuthProvider},
    user::{Email, ImageUrl, NewUser, User, UserId, Username},
};

use crate::{
    error::InfraError,
    notification::NotificationSender,
    oauth::{OAuthClient, OAuthCredentials, OAuthEndpoints, build_authorize_url},
    repository::user_repository::{
        EMAIL_CONSTRAINT,
        OAUTH_CONSTRAINT,
        USERNAME_CONSTRAINT,
        UserRepository,
    },
    storage::{ImageStorage, ImageUpload},
};

// ===== MockUserRepository =====

/// 一意制約を再現するインメモリのユーザーリポジトリ
#[derive(Clone)]
pub struct MockUserRepository {
    users:          Arc<Mutex<Vec<User>>>,
    next_id:        Arc<AtomicI64>,
    unavailable:    Arc<AtomicBool>,
    username_races: Arc<AtomicU32>,
}

impl Default for MockUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MockUserRepository {
    pub fn new() -> Self {
        Self {
            users:          Arc::new(Mutex::new(Vec::new())),
            next_id:        Arc::new(AtomicI64::new(1)),
            unavailable:    Arc::new(AtomicBool::new(false)),
            username_races: Arc::new(AtomicU32::new(0)),
        }
    }

    /// ID を採番して登録済みの状態にする
    pub fn add_user(&self, new_user: NewUser) -> User {
        let id = self.allocate_id();
        let user = new_user.into_user(id);
        self.users.lock().unwrap().push(user.clone());
        user
    }

    /// 現在の全ユーザー
    pub fn users(&self) -> Vec<User> {
        self.users.lock().unwrap().clone()
    }

    /// true にすると全操作がデータベースエラー相当で失敗する
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// 次の `count` 回の INSERT をユーザー名の一意制約違反で失敗させる
    ///
    /// 事前チェックの後に別リクエストが同じユーザー名を取った状況を再現する。
    pub fn race_username_on_insert(&self, count: u32) {
        self.username_races.store(count, Ordering::SeqCst);
    }

    fn allocate_id(&self) -> UserId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        UserId::new(id).unwrap()
    }

    fn check_available(&self) -> Result<(), InfraError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(InfraError::from(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }

    fn find(&self, pred: impl Fn(&User) -> bool) -> Result<Option<User>, InfraError> {
        self.check_available()?;
        Ok(self.users.lock().unwrap().iter().find(|u| pred(u)).cloned())
    }

    fn update(&self, id: &UserId, f: impl FnOnce(User) -> User) -> Result<bool, InfraError> {
        self.check_available()?;
        let mut users = self.users.lock().unwrap();
        match users.iter().position(|u| u.id() == *id) {
            Some(pos) => {
                let current = users.remove(pos);
                users.insert(pos, f(current));
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl UserRepository for MockUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, InfraError> {
        self.find(|u| u.id() == *id)
    }

    async fn find_by_username(&self, username: &Username) -> Result<Option<User>, InfraError> {
        self.find(|u| u.username() == username)
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, InfraError> {
        self.find(|u| u.email() == email)
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<User>, InfraError> {
        self.find(|u| u.username().as_str() == login || u.email().as_str() == login)
    }

    async fn find_by_oauth(&self, identity: &OAuthIdentity) -> Result<Option<User>, InfraError> {
        self.find(|u| u.oauth() == Some(identity))
    }

    async fn find_all(&self) -> Result<Vec<User>, InfraError> {
        self.check_available()?;
        let mut users = self.users();
        users.sort_by_key(|u| u.id().as_i64());
        Ok(users)
    }

    async fn insert(&self, user: &NewUser) -> Result<User, InfraError> {
        self.check_available()?;
        if self
            .username_races
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(InfraError::conflict("User", USERNAME_CONSTRAINT));
        }
        let mut users = self.users.lock().unwrap();

        if users.iter().any(|u| u.username() == &user.username) {
            return Err(InfraError::conflict("User", USERNAME_CONSTRAINT));
        }
        if users.iter().any(|u| u.email() == &user.email) {
            return Err(InfraError::conflict("User", EMAIL_CONSTRAINT));
        }
        if user.oauth.is_some() && users.iter().any(|u| u.oauth() == user.oauth.as_ref()) {
            return Err(InfraError::conflict("User", OAUTH_CONSTRAINT));
        }

        let created = user.clone().into_user(self.allocate_id());
        users.push(created.clone());
        Ok(created)
    }

    async fn mark_verified(&self, id: &UserId, now: DateTime<Utc>) -> Result<bool, InfraError> {
        self.update(id, |u| u.verified(now))
    }

    async fn link_oauth(
        &self,
        id: &UserId,
        identity: &OAuthIdentity,
        now: DateTime<Utc>,
    ) -> Result<bool, InfraError> {
        {
            let users = self.users.lock().unwrap();
            if users
                .iter()
                .any(|u| u.id() != *id && u.oauth() == Some(identity))
            {
                return Err(InfraError::conflict("User", OAUTH_CONSTRAINT));
            }
        }
        self.update(id, |u| u.with_oauth(identity.clone(), now))
    }

    async fn delete(&self, id: &UserId) -> Result<bool, InfraError> {
        self.check_available()?;
        let mut users = self.users.lock().unwrap();
        let before = users.len();
        users.retain(|u| u.id() != *id);
        Ok(users.len() < before)
    }
}

// ===== MockImageStorage =====

/// 保存した画像の Content-Type を記録し、連番の URL を返す
#[derive(Clone, Default)]
pub struct MockImageStorage {
    stored: Arc<Mutex<Vec<String>>>,
}

impl MockImageStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// 保存された画像の Content-Type（保存順）
    pub fn stored(&self) -> Vec<String> {
        self.stored.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageStorage for MockImageStorage {
    async fn put_image(&self, image: &ImageUpload) -> Result<ImageUrl, InfraError> {
        let mut stored = self.stored.lock().unwrap();
        stored.push(image.content_type().to_string());
        Ok(ImageUrl::new(format!(
            "https://images.test/users/images/{}.{}",
            stored.len(),
            image.extension()
        )))
    }
}

// ===== RecordingNotificationSender =====

/// 送信したメールを記録する
#[derive(Clone, Default)]
pub struct RecordingNotificationSender {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
    fail: Arc<AtomicBool>,
}

impl RecordingNotificationSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// 常に送信失敗する
    pub fn failing() -> Self {
        let sender = Self::default();
        sender.fail.store(true, Ordering::SeqCst);
        sender
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSender for RecordingNotificationSender {
    async fn send_email(&self, email: &EmailMessage) -> Result<(), NotificationError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotificationError::SendFailed("recording sender: fail".to_string()));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

// ===== StubOAuthClient =====

/// 決まったプロフィールを返す OAuth クライアント
///
/// `profile` が `None` のときは交換に失敗する。受け取った認可コードを記録する。
#[derive(Clone)]
pub struct StubOAuthClient {
    provider: OAuthProvider,
    profile:  Option<OAuthProfile>,
    codes:    Arc<Mutex<Vec<String>>>,
}

impl StubOAuthClient {
    pub fn new(provider: OAuthProvider, profile: Option<OAuthProfile>) -> Self {
        Self {
            provider,
            profile,
            codes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn codes(&self) -> Vec<String> {
        self.codes.lock().unwrap().clone()
    }

    fn endpoints(&self) -> OAuthEndpoints {
        let base = format!("https://{}.oauth.test", self.provider);
        OAuthEndpoints::parse(
            &format!("{base}/authorize"),
            &format!("{base}/token"),
            &format!("{base}/me"),
        )
        .unwrap()
    }
}

#[async_trait]
impl OAuthClient for StubOAuthClient {
    fn provider(&self) -> OAuthProvider {
        self.provider
    }

    fn authorize_url(&self, state: &str) -> Url {
        let credentials = OAuthCredentials {
            client_id:     "stub-client".to_string(),
            client_secret: "stub-secret".to_string(),
            callback_url:  format!("http://localhost/auth/{}/callback", self.provider),
        };
        build_authorize_url(&self.endpoints(), &credentials, self.provider, state)
    }

    async fn exchange(&self, code: &str) -> Result<OAuthProfile, OAuthError> {
        self.codes.lock().unwrap().push(code.to_string());
        self.profile
            .clone()
            .ok_or_else(|| OAuthError::Exchange("stub: rejected".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use warble_domain::{
        password::PasswordHash,
        user::{FullName, VerifyCode},
    };

    use super::*;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser::signup(
            FullName::new("Test").unwrap(),
            Username::new(username).unwrap(),
            Email::new(email).unwrap(),
            PasswordHash::new("$argon2id$dummy"),
            None,
            VerifyCode::new("abc123").unwrap(),
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_insertは一意制約を再現する() {
        let repo = MockUserRepository::new();
        repo.insert(&new_user("alice", "alice@example.com"))
            .await
            .unwrap();

        let dup_name = repo
            .insert(&new_user("alice", "other@example.com"))
            .await
            .unwrap_err();
        let dup_email = repo
            .insert(&new_user("other", "alice@example.com"))
            .await
            .unwrap_err();

        assert_eq!(dup_name.conflict_constraint(), Some(USERNAME_CONSTRAINT));
        assert_eq!(dup_email.conflict_constraint(), Some(EMAIL_CONSTRAINT));
    }

    #[tokio::test]
    async fn test_idは1から採番される() {
        let repo = MockUserRepository::new();

        let first = repo.insert(&new_user("a", "a@example.com")).await.unwrap();
        let second = repo.insert(&new_user("b", "b@example.com")).await.unwrap();

        assert_eq!(first.id().as_i64(), 1);
        assert_eq!(second.id().as_i64(), 2);
    }

    #[tokio::test]
    async fn test_unavailableのときはエラー() {
        let repo = MockUserRepository::new();
        repo.set_unavailable(true);

        assert!(repo.find_all().await.is_err());
    }

    #[tokio::test]
    async fn test_stubは交換結果とコードを記録する() {
        let stub = StubOAuthClient::new(OAuthProvider::Google, None);

        let result = stub.exchange("code-1").await;

        assert!(matches!(result, Err(OAuthError::Exchange(_))));
        assert_eq!(stub.codes(), vec!["code-1".to_string()]);
        assert_eq!(
            stub.authorize_url("s").host_str(),
            Some("google.oauth.test")
        );
    }
}
