//! # Warble インフラ層
//!
//! 外部システムとの接続・通信を担当する。
//!
//! ## 責務
//!
//! - **データベース**: PostgreSQL 接続プールとマイグレーション
//! - **リポジトリ**: ユーザーの永続化
//! - **認証部品**: Argon2 パスワードハッシュ、HS256 JWT、確認コード生成
//! - **外部サービス**: メール送信（SMTP / SES）、画像保存（S3）、OAuth プロバイダ
//!
//! ## 依存関係
//!
//! ```text
//! user-service → infra → domain
//! ```
//!
//! ## 使用例
//!
//! ```rust,ignore
//! use warble_infra::{db, repository::PostgresUserRepository};
//!
//! async fn setup() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = db::create_pool("postgres://localhost/warble").await?;
//!     db::run_migrations(&pool).await?;
//!     let users = PostgresUserRepository::new(pool);
//!     Ok(())
//! }
//! ```

pub mod db;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod notification;
pub mod oauth;
pub mod password;
pub mod repository;
pub mod storage;
pub mod token;
pub mod verify_code;

pub use error::{InfraError, InfraErrorKind};
pub use notification::NotificationSender;
pub use oauth::OAuthClient;
pub use password::{Argon2PasswordHasher, PasswordHasher};
pub use storage::{ImageStorage, ImageUpload};
pub use token::{AccessToken, Hs256TokenIssuer, TokenClaims, TokenError, TokenIssuer};
pub use verify_code::{RandomVerifyCodeGenerator, VerifyCodeGenerator};
