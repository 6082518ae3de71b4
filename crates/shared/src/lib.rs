//! # Warble 共有ユーティリティ
//!
//! Warble の各クレートから利用される、ビジネスロジックを含まない共通部品。
//!
//! ## 設計方針
//!
//! - domain / infra / user-service のすべてから依存される
//! - HTTP レスポンスの形（エンベロープ、Problem Details）はここで統一する
//! - axum には依存しない（`IntoResponse` 変換はサービス側の責務）
//!
//! ## モジュール構成
//!
//! - [`api_response`] - `{ "data": T }` エンベロープ
//! - [`error_response`] - RFC 9457 Problem Details
//! - [`health`] - ヘルスチェック / Readiness レスポンス
//! - [`observability`] - トレーシング初期化（`observability` feature）
//! - [`canonical_log`] - リクエストサマリログ Layer（`observability` feature）
//! - [`event_log`] - ビジネスイベントログ用マクロと定数

pub mod api_response;
#[cfg(feature = "observability")]
pub mod canonical_log;
pub mod error_response;
pub mod event_log;
pub mod health;
pub mod observability;

pub use api_response::ApiResponse;
pub use error_response::ErrorResponse;
pub use health::{CheckStatus, HealthResponse, ReadinessResponse, ReadinessStatus};
