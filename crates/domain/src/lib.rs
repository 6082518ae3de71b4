//! # Warble ドメイン層
//!
//! ユーザーアカウントのエンティティと値オブジェクトを定義する。
//!
//! ## 依存関係の方向
//!
//! ```text
//! user-service → infra → domain
//! ```
//!
//! ドメイン層は DB・HTTP・外部サービスに依存しない。値オブジェクトは生成時に
//! 検証を行うので、ここから先の層では不正な値は存在しない前提で扱える。
//!
//! ## モジュール構成
//!
//! - [`user`] - ユーザーエンティティと値オブジェクト
//! - [`password`] - 平文パスワードとハッシュ
//! - [`oauth`] - 外部 ID プロバイダ連携の型
//! - [`notification`] - メール通知の型
//! - [`clock`] - 時刻プロバイダ
//! - [`error`] - ドメインエラー
//!
//! ```rust
//! use warble_domain::{DomainError, user::Username};
//!
//! assert!(Username::new("alice42").is_ok());
//! assert!(matches!(
//!     Username::new("alice!"),
//!     Err(DomainError::Validation(_))
//! ));
//! ```

#[macro_use]
mod macros;

pub mod clock;
pub mod error;
pub mod notification;
pub mod oauth;
pub mod password;
pub mod user;

pub use error::DomainError;
