//! # ユースケース層
//!
//! User Service のビジネスロジックを実装する。
//!
//! - 依存はすべて `Arc<dyn Trait>` で外部から注入する
//! - ハンドラは薄く保ち、判断はここに集約する
//!
//! ## モジュール構成
//!
//! - `user`: サインアップ・確認・ログイン・参照・削除
//! - `oauth`: 外部 ID プロバイダでのログイン
//! - `mailer`: 確認メールの組み立てと送信

pub mod mailer;
pub mod oauth;
pub mod user;

pub use mailer::VerificationMailer;
pub use oauth::{OAuthLoginError, OAuthUseCaseImpl};
pub use user::{AuthenticatedProfile, SignupInput, UserUseCaseImpl};
