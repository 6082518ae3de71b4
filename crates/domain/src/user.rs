//! # ユーザー
//!
//! ユーザーエンティティとそれに関連する値オブジェクトを定義する。
//!
//! ## ドメイン用語
//!
//! | 型 | ドメイン用語 | 制約 |
//! |---|------------|------|
//! | [`UserId`] | ユーザー ID | 1 以上の整数 |
//! | [`FullName`] | 氏名 | 前後空白を除いて 1〜255 文字 |
//! | [`Username`] | ユーザー名 | ASCII 英数字のみ、1〜64 文字 |
//! | [`Email`] | メールアドレス | `local@domain` 形式、255 文字以内 |
//! | [`VerifyCode`] | 確認コード | ASCII 英数字のみ、1〜64 文字 |
//! | [`ImageUrl`] | プロフィール画像 URL | 画像ストレージが返した URL |
//!
//! ## 状態
//!
//! `verify_code` が `Some` のユーザーはメールアドレス未確認。
//! 確認が済むとコードは消去される。OAuth で作られたユーザーは最初から確認済みで、
//! パスワードを持たない。

use std::str::FromStr;

use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::{DomainError, oauth::OAuthIdentity, password::PasswordHash};

/// ユーザー ID
///
/// DB の `BIGSERIAL` 主キー。パスパラメータからの変換は [`FromStr`] で行い、
/// 数値でない・1 未満の値は `Validation` エラーになる。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[serde(transparent)]
#[display("{_0}")]
pub struct UserId(i64);

impl UserId {
    pub fn new(value: i64) -> Result<Self, DomainError> {
        if value < 1 {
            return Err(DomainError::Validation(format!(
                "ユーザー ID は 1 以上である必要があります: {value}"
            )));
        }
        Ok(Self(value))
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl FromStr for UserId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .parse::<i64>()
            .map_err(|_| DomainError::Validation(format!("ユーザー ID が数値ではありません: {s}")))?;
        Self::new(value)
    }
}

/// 氏名
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullName(String);

impl FullName {
    pub const MAX_LENGTH: usize = 255;

    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into().trim().to_string();

        if value.is_empty() {
            return Err(DomainError::Validation("氏名は必須です".to_string()));
        }
        if value.chars().count() > Self::MAX_LENGTH {
            return Err(DomainError::Validation(format!(
                "氏名は {} 文字以内である必要があります",
                Self::MAX_LENGTH
            )));
        }

        Ok(Self(value))
    }
}

impl_string_value!(FullName);

/// ユーザー名
///
/// ログイン時の識別子にもなるため、ASCII 英数字のみ許可する。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Username(String);

impl Username {
    pub const MAX_LENGTH: usize = 64;

    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();

        if value.is_empty() {
            return Err(DomainError::Validation("ユーザー名は必須です".to_string()));
        }
        if !value.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(DomainError::Validation(
                "ユーザー名は英数字のみ使用できます".to_string(),
            ));
        }
        if value.len() > Self::MAX_LENGTH {
            return Err(DomainError::Validation(format!(
                "ユーザー名は {} 文字以内である必要があります",
                Self::MAX_LENGTH
            )));
        }

        Ok(Self(value))
    }
}

impl_string_value!(Username);

/// メールアドレス
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Email(String);

impl Email {
    pub const MAX_LENGTH: usize = 255;

    /// メールアドレスを作成する
    ///
    /// - 空文字列ではない
    /// - 空白を含まない
    /// - `local@domain` の形で、ドメイン部に `.` を含む
    /// - 最大 255 文字
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        let invalid = || DomainError::Validation("メールアドレスの形式が不正です".to_string());

        if value.is_empty() {
            return Err(DomainError::Validation(
                "メールアドレスは必須です".to_string(),
            ));
        }
        if value.len() > Self::MAX_LENGTH {
            return Err(DomainError::Validation(
                "メールアドレスは255文字以内である必要があります".to_string(),
            ));
        }
        if value.chars().any(char::is_whitespace) {
            return Err(invalid());
        }

        let Some((local, domain)) = value.split_once('@') else {
            return Err(invalid());
        };
        if local.is_empty() || domain.contains('@') {
            return Err(invalid());
        }
        let has_dotted_domain = domain
            .split('.')
            .filter(|label| !label.is_empty())
            .count()
            >= 2
            && !domain.starts_with('.')
            && !domain.ends_with('.');
        if !has_dotted_domain {
            return Err(invalid());
        }

        Ok(Self(value))
    }

    /// `@` より前の部分
    pub fn local_part(&self) -> &str {
        self.0.split_once('@').map_or(self.0.as_str(), |(local, _)| local)
    }
}

impl_string_value!(Email);

/// メールアドレス確認コード
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyCode(String);

impl VerifyCode {
    pub const MAX_LENGTH: usize = 64;

    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();

        if value.is_empty()
            || value.len() > Self::MAX_LENGTH
            || !value.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(DomainError::Validation("確認コードの形式が不正です".to_string()));
        }

        Ok(Self(value))
    }
}

impl_string_value!(VerifyCode);

impl std::fmt::Debug for VerifyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("VerifyCode").field(&"[REDACTED]").finish()
    }
}

/// プロフィール画像 URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrl(String);

impl ImageUrl {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl_string_value!(ImageUrl);

/// ユーザーエンティティ
///
/// # 不変条件
///
/// - `username` と `email` はそれぞれ全ユーザーで一意
/// - `(oauth.provider, oauth.subject)` は全ユーザーで一意
/// - `password_hash` が `None` のユーザーはパスワードでログインできない
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    id: UserId,
    full_name: FullName,
    username: Username,
    email: Email,
    password_hash: Option<PasswordHash>,
    image: Option<ImageUrl>,
    verify_code: Option<VerifyCode>,
    oauth: Option<OAuthIdentity>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl User {
    /// 永続化されたデータからユーザーを復元する
    #[allow(clippy::too_many_arguments)]
    pub fn from_db(
        id: UserId,
        full_name: FullName,
        username: Username,
        email: Email,
        password_hash: Option<PasswordHash>,
        image: Option<ImageUrl>,
        verify_code: Option<VerifyCode>,
        oauth: Option<OAuthIdentity>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            full_name,
            username,
            email,
            password_hash,
            image,
            verify_code,
            oauth,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn full_name(&self) -> &FullName {
        &self.full_name
    }

    pub fn username(&self) -> &Username {
        &self.username
    }

    pub fn email(&self) -> &Email {
        &self.email
    }

    pub fn password_hash(&self) -> Option<&PasswordHash> {
        self.password_hash.as_ref()
    }

    pub fn image(&self) -> Option<&ImageUrl> {
        self.image.as_ref()
    }

    pub fn verify_code(&self) -> Option<&VerifyCode> {
        self.verify_code.as_ref()
    }

    pub fn oauth(&self) -> Option<&OAuthIdentity> {
        self.oauth.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// メールアドレス確認済みか
    pub fn is_verified(&self) -> bool {
        self.verify_code.is_none()
    }

    /// パスワードでログインできるか（OAuth 専用ユーザーは false）
    pub fn can_login_with_password(&self) -> bool {
        self.password_hash.is_some()
    }

    /// 保留中の確認コードと一致するか
    ///
    /// 確認済みユーザーは常に false。
    pub fn matches_verify_code(&self, code: &VerifyCode) -> bool {
        self.verify_code.as_ref() == Some(code)
    }

    /// 確認コードを消去した新しいインスタンスを返す
    pub fn verified(self, now: DateTime<Utc>) -> Self {
        Self {
            verify_code: None,
            updated_at: now,
            ..self
        }
    }

    /// OAuth ID を紐付けた新しいインスタンスを返す
    ///
    /// プロバイダがメールアドレスを保証しているので確認済みにする。
    pub fn with_oauth(self, identity: OAuthIdentity, now: DateTime<Utc>) -> Self {
        Self {
            oauth: Some(identity),
            verify_code: None,
            updated_at: now,
            ..self
        }
    }

    /// 公開用のプロフィールに変換する
    pub fn profile(&self) -> UserProfile {
        UserProfile::from(self)
    }
}

/// 新規ユーザーの登録内容（ID 採番前）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub full_name:     FullName,
    pub username:      Username,
    pub email:         Email,
    pub password_hash: Option<PasswordHash>,
    pub image:         Option<ImageUrl>,
    pub verify_code:   Option<VerifyCode>,
    pub oauth:         Option<OAuthIdentity>,
    pub created_at:    DateTime<Utc>,
}

impl NewUser {
    /// パスワード登録のユーザー（確認コード付き、未確認状態）
    pub fn signup(
        full_name: FullName,
        username: Username,
        email: Email,
        password_hash: PasswordHash,
        image: Option<ImageUrl>,
        verify_code: VerifyCode,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            full_name,
            username,
            email,
            password_hash: Some(password_hash),
            image,
            verify_code: Some(verify_code),
            oauth: None,
            created_at: now,
        }
    }

    /// OAuth で作成するユーザー（パスワードなし、確認済み）
    pub fn from_oauth(
        full_name: FullName,
        username: Username,
        email: Email,
        identity: OAuthIdentity,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            full_name,
            username,
            email,
            password_hash: None,
            image: None,
            verify_code: None,
            oauth: Some(identity),
            created_at: now,
        }
    }

    /// 採番済み ID を与えてエンティティにする
    pub fn into_user(self, id: UserId) -> User {
        User {
            id,
            full_name: self.full_name,
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            image: self.image,
            verify_code: self.verify_code,
            oauth: self.oauth,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

/// ユーザーの公開プロフィール
///
/// パスワードハッシュと確認コードは含まない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id:          UserId,
    pub full_name:   String,
    pub username:    String,
    pub email:       String,
    pub image:       Option<String>,
    pub is_verified: bool,
    pub created_at:  DateTime<Utc>,
    pub updated_at:  DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id:          user.id,
            full_name:   user.full_name.as_str().to_string(),
            username:    user.username.as_str().to_string(),
            email:       user.email.as_str().to_string(),
            image:       user.image.as_ref().map(|i| i.as_str().to_string()),
            is_verified: user.is_verified(),
            created_at:  user.created_at,
            updated_at:  user.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    use super::*;
    use crate::oauth::OAuthProvider;

    #[fixture]
    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[fixture]
    fn pending_user(now: DateTime<Utc>) -> User {
        NewUser::signup(
            FullName::new("Alice Smith").unwrap(),
            Username::new("alice").unwrap(),
            Email::new("alice@example.com").unwrap(),
            PasswordHash::new("$argon2id$v=19$m=65536,t=1,p=1$salt$hash"),
            None,
            VerifyCode::new("abc123XYZ").unwrap(),
            now,
        )
        .into_user(UserId::new(1).unwrap())
    }

    // UserId

    #[rstest]
    #[case("1", 1)]
    #[case("42", 42)]
    fn test_user_idは正の整数をパースできる(#[case] input: &str, #[case] expected: i64) {
        assert_eq!(input.parse::<UserId>().unwrap().as_i64(), expected);
    }

    #[rstest]
    #[case("0")]
    #[case("-1")]
    #[case("abc")]
    #[case("1.5")]
    #[case("")]
    fn test_user_idは不正な値を拒否する(#[case] input: &str) {
        assert!(matches!(
            input.parse::<UserId>(),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn test_user_idは数値としてシリアライズされる() {
        let json = serde_json::to_value(UserId::new(7).unwrap()).unwrap();
        assert_eq!(json, serde_json::json!(7));
    }

    // FullName

    #[test]
    fn test_氏名は前後の空白が除去される() {
        assert_eq!(FullName::new("  Alice  ").unwrap().as_str(), "Alice");
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    fn test_氏名は空を拒否する(#[case] input: &str) {
        assert!(FullName::new(input).is_err());
    }

    #[test]
    fn test_氏名は255文字まで受け入れる() {
        assert!(FullName::new("あ".repeat(255)).is_ok());
        assert!(FullName::new("あ".repeat(256)).is_err());
    }

    // Username

    #[rstest]
    #[case("alice")]
    #[case("Alice42")]
    #[case("123")]
    fn test_ユーザー名は英数字を受け入れる(#[case] input: &str) {
        assert!(Username::new(input).is_ok());
    }

    #[rstest]
    #[case("", "空")]
    #[case("alice smith", "空白")]
    #[case("alice_smith", "アンダースコア")]
    #[case("ありす", "非 ASCII")]
    #[case(&"a".repeat(65), "64 文字超過")]
    fn test_ユーザー名は不正な値を拒否する(#[case] input: &str, #[case] _reason: &str) {
        assert!(Username::new(input).is_err());
    }

    // Email

    #[rstest]
    #[case("user@example.com")]
    #[case("first.last+tag@mail.example.co.jp")]
    fn test_メールアドレスは正常な形式を受け入れる(#[case] input: &str) {
        assert!(Email::new(input).is_ok());
    }

    #[rstest]
    #[case("", "空文字列")]
    #[case("no-at-sign", "@記号なし")]
    #[case("@example.com", "ローカル部分が空")]
    #[case("user@", "ドメイン部分が空")]
    #[case("user@localhost", "ドメインにドットなし")]
    #[case("user@example.", "末尾ドット")]
    #[case("user@@example.com", "@が複数")]
    #[case("us er@example.com", "空白を含む")]
    #[case(&format!("{}@example.com", "a".repeat(256)), "255文字超過")]
    fn test_メールアドレスは不正な形式を拒否する(
        #[case] input: &str,
        #[case] _reason: &str,
    ) {
        assert!(Email::new(input).is_err());
    }

    #[test]
    fn test_local_partはアットマークより前を返す() {
        let email = Email::new("alice.smith@example.com").unwrap();
        assert_eq!(email.local_part(), "alice.smith");
    }

    // VerifyCode

    #[test]
    fn test_確認コードのdebug出力はマスクされる() {
        let code = VerifyCode::new("secretcode").unwrap();
        let debug = format!("{code:?}");
        assert!(!debug.contains("secretcode"));
    }

    #[rstest]
    #[case("")]
    #[case("abc-123")]
    #[case(&"a".repeat(65))]
    fn test_確認コードは不正な値を拒否する(#[case] input: &str) {
        assert!(VerifyCode::new(input).is_err());
    }

    // User

    #[rstest]
    fn test_サインアップ直後は未確認でパスワードログイン可能(pending_user: User) {
        assert!(!pending_user.is_verified());
        assert!(pending_user.can_login_with_password());
    }

    #[rstest]
    fn test_確認コードの一致判定(pending_user: User) {
        assert!(pending_user.matches_verify_code(&VerifyCode::new("abc123XYZ").unwrap()));
        assert!(!pending_user.matches_verify_code(&VerifyCode::new("abc123XYz").unwrap()));
    }

    #[rstest]
    fn test_確認後はコードが消えupdated_atが進む(pending_user: User, now: DateTime<Utc>) {
        let later = DateTime::from_timestamp(1_700_000_500, 0).unwrap();
        let code = VerifyCode::new("abc123XYZ").unwrap();

        let sut = pending_user.verified(later);

        assert!(sut.is_verified());
        assert!(!sut.matches_verify_code(&code));
        assert_eq!(sut.created_at(), now);
        assert_eq!(sut.updated_at(), later);
    }

    #[rstest]
    fn test_oauth紐付けで確認済みになる(pending_user: User) {
        let later = DateTime::from_timestamp(1_700_000_500, 0).unwrap();
        let identity = OAuthIdentity::new(OAuthProvider::Google, "1234567890");

        let sut = pending_user.with_oauth(identity.clone(), later);

        assert!(sut.is_verified());
        assert_eq!(sut.oauth(), Some(&identity));
        assert!(sut.can_login_with_password());
    }

    #[rstest]
    fn test_oauthユーザーはパスワードを持たず確認済み(now: DateTime<Utc>) {
        let sut = NewUser::from_oauth(
            FullName::new("Bob").unwrap(),
            Username::new("bob").unwrap(),
            Email::new("bob@example.com").unwrap(),
            OAuthIdentity::new(OAuthProvider::Facebook, "fb-1"),
            now,
        )
        .into_user(UserId::new(2).unwrap());

        assert!(sut.is_verified());
        assert!(!sut.can_login_with_password());
    }

    #[rstest]
    fn test_プロフィールにはパスワードと確認コードが含まれない(pending_user: User, now: DateTime<Utc>) {
        let sut = pending_user.profile();

        let expected = UserProfile {
            id:          UserId::new(1).unwrap(),
            full_name:   "Alice Smith".to_string(),
            username:    "alice".to_string(),
            email:       "alice@example.com".to_string(),
            image:       None,
            is_verified: false,
            created_at:  now,
            updated_at:  now,
        };
        assert_eq!(sut, expected);
    }
}
