//! # HTTP リクエストハンドラ
//!
//! axum のルートに対応するハンドラ関数を定義する。
//!
//! - 各ハンドラはサブモジュールに配置し、ここで re-export する
//! - ハンドラは薄く保ち、判断はユースケースに委譲する

pub mod extractors;
pub mod health;
pub mod oauth;
pub mod user;

pub use extractors::{AuthenticatedUser, SignupForm, UserIdPath, ValidatedJson};
pub use health::{ReadinessState, health_check, readiness_check};
pub use oauth::{OAuthState, authorize, callback};
pub use user::{UserState, delete_user, get_user, list_users, login, signup, verify_email};
