//! # UserRepository
//!
//! ユーザーの永続化を担当するリポジトリ。
//!
//! - クエリは実行時に検証する `sqlx::query_as` と `FromRow` 行型で書く
//! - 行からエンティティへの変換で値オブジェクトの検証をやり直し、
//!   DB に不正な値があれば `Unexpected` として扱う
//! - INSERT 時の一意制約違反は `Conflict`（制約名付き）にする

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use warble_domain::{
    oauth::{OAuthIdentity, OAuthProvider},
    password::PasswordHash,
    user::{Email, FullName, ImageUrl, NewUser, User, UserId, Username, VerifyCode},
};

use crate::error::InfraError;

/// `users.username` の一意制約名
pub const USERNAME_CONSTRAINT: &str = "users_username_key";
/// `users.email` の一意制約名
pub const EMAIL_CONSTRAINT: &str = "users_email_key";
/// `(oauth_provider, oauth_subject)` の一意制約名
pub const OAUTH_CONSTRAINT: &str = "users_oauth_key";

const ENTITY: &str = "User";

const USER_COLUMNS: &str = "id, full_name, username, email, password_hash, image, verify_code, \
                            oauth_provider, oauth_subject, created_at, updated_at";

/// ユーザーリポジトリトレイト
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, InfraError>;

    async fn find_by_username(&self, username: &Username) -> Result<Option<User>, InfraError>;

    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, InfraError>;

    /// ログイン用の検索
    ///
    /// `login` がユーザー名またはメールアドレスのどちらかに一致するユーザーを返す。
    /// ユーザー名に `@` は含まれないので、両方に一致することはない。
    async fn find_by_login(&self, login: &str) -> Result<Option<User>, InfraError>;

    async fn find_by_oauth(&self, identity: &OAuthIdentity) -> Result<Option<User>, InfraError>;

    /// 全ユーザーを ID 昇順で返す
    async fn find_all(&self) -> Result<Vec<User>, InfraError>;

    /// ユーザーを登録し、採番済みのエンティティを返す
    ///
    /// # Errors
    ///
    /// - ユーザー名・メールアドレス・OAuth ID の重複: `Conflict`（制約名は
    ///   [`USERNAME_CONSTRAINT`] / [`EMAIL_CONSTRAINT`] / [`OAUTH_CONSTRAINT`]）
    async fn insert(&self, user: &NewUser) -> Result<User, InfraError>;

    /// 確認コードを消去する。対象行が無ければ false。
    async fn mark_verified(&self, id: &UserId, now: DateTime<Utc>) -> Result<bool, InfraError>;

    /// OAuth ID を紐付け、確認済みにする。対象行が無ければ false。
    async fn link_oauth(
        &self,
        id: &UserId,
        identity: &OAuthIdentity,
        now: DateTime<Utc>,
    ) -> Result<bool, InfraError>;

    /// 物理削除する。対象行が無ければ false。
    async fn delete(&self, id: &UserId) -> Result<bool, InfraError>;
}

/// `users` テーブルの行
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id:             i64,
    full_name:      String,
    username:       String,
    email:          String,
    password_hash:  Option<String>,
    image:          Option<String>,
    verify_code:    Option<String>,
    oauth_provider: Option<String>,
    oauth_subject:  Option<String>,
    created_at:     DateTime<Utc>,
    updated_at:     DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = InfraError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let id = row.id;
        let corrupt = |e: warble_domain::DomainError| {
            InfraError::unexpected(format!("users.id={id} の値が不正: {e}"))
        };

        let oauth = match (row.oauth_provider.as_deref(), row.oauth_subject) {
            (Some(provider), Some(subject)) => {
                let provider = provider.parse::<OAuthProvider>().map_err(|e| {
                    InfraError::unexpected(format!("不正な oauth_provider: {provider} ({e})"))
                })?;
                Some(OAuthIdentity::new(provider, subject))
            }
            _ => None,
        };

        Ok(User::from_db(
            UserId::new(id).map_err(corrupt)?,
            FullName::new(row.full_name).map_err(corrupt)?,
            Username::new(row.username).map_err(corrupt)?,
            Email::new(row.email).map_err(corrupt)?,
            row.password_hash.map(PasswordHash::new),
            row.image.map(ImageUrl::new),
            row.verify_code.map(VerifyCode::new).transpose().map_err(corrupt)?,
            oauth,
            row.created_at,
            row.updated_at,
        ))
    }
}

/// PostgreSQL 実装の UserRepository
#[derive(Debug, Clone)]
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_optional(
        &self,
        query: sqlx::query::QueryAs<'_, sqlx::Postgres, UserRow, sqlx::postgres::PgArguments>,
    ) -> Result<Option<User>, InfraError> {
        let row = query.fetch_optional(&self.pool).await?;
        row.map(User::try_from).transpose()
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    #[tracing::instrument(skip_all, level = "debug", fields(%id))]
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, InfraError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        self.fetch_optional(sqlx::query_as(&sql).bind(id.as_i64()))
            .await
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn find_by_username(&self, username: &Username) -> Result<Option<User>, InfraError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        self.fetch_optional(sqlx::query_as(&sql).bind(username.as_str()))
            .await
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn find_by_email(&self, email: &Email) -> Result<Option<User>, InfraError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        self.fetch_optional(sqlx::query_as(&sql).bind(email.as_str()))
            .await
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn find_by_login(&self, login: &str) -> Result<Option<User>, InfraError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1 OR email = $1");
        self.fetch_optional(sqlx::query_as(&sql).bind(login)).await
    }

    #[tracing::instrument(skip_all, level = "debug", fields(provider = %identity.provider))]
    async fn find_by_oauth(&self, identity: &OAuthIdentity) -> Result<Option<User>, InfraError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE oauth_provider = $1 AND oauth_subject = $2"
        );
        self.fetch_optional(
            sqlx::query_as(&sql)
                .bind(identity.provider.as_str())
                .bind(&identity.subject),
        )
        .await
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn find_all(&self) -> Result<Vec<User>, InfraError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id");
        let rows: Vec<UserRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        rows.into_iter().map(User::try_from).collect()
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn insert(&self, user: &NewUser) -> Result<User, InfraError> {
        let sql = format!(
            r#"
            INSERT INTO users (
                full_name, username, email, password_hash, image, verify_code,
                oauth_provider, oauth_subject, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            RETURNING {USER_COLUMNS}
            "#
        );
        let row: UserRow = sqlx::query_as(&sql)
            .bind(user.full_name.as_str())
            .bind(user.username.as_str())
            .bind(user.email.as_str())
            .bind(user.password_hash.as_ref().map(PasswordHash::as_str))
            .bind(user.image.as_ref().map(ImageUrl::as_str))
            .bind(user.verify_code.as_ref().map(VerifyCode::as_str))
            .bind(user.oauth.as_ref().map(|o| o.provider.as_str()))
            .bind(user.oauth.as_ref().map(|o| o.subject.as_str()))
            .bind(user.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| InfraError::from_sqlx(ENTITY, e))?;

        User::try_from(row)
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%id))]
    async fn mark_verified(&self, id: &UserId, now: DateTime<Utc>) -> Result<bool, InfraError> {
        let result = sqlx::query(
            "UPDATE users SET verify_code = NULL, updated_at = $2 WHERE id = $1",
        )
        .bind(id.as_i64())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%id, provider = %identity.provider))]
    async fn link_oauth(
        &self,
        id: &UserId,
        identity: &OAuthIdentity,
        now: DateTime<Utc>,
    ) -> Result<bool, InfraError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET oauth_provider = $2, oauth_subject = $3, verify_code = NULL, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .bind(identity.provider.as_str())
        .bind(&identity.subject)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| InfraError::from_sqlx(ENTITY, e))?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%id))]
    async fn delete(&self, id: &UserId) -> Result<bool, InfraError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
