//! # ビジネスイベントログとエラーコンテキスト
//!
//! ログフィールドの命名規約とヘルパーマクロ。
//!
//! - ビジネスイベントは [`log_business_event!`] で出力する。
//!   `event.kind = "business_event"` が自動付与され、
//!   `jq 'select(.["event.kind"] == "business_event")'` で抽出できる
//! - エラーは `tracing::error!` に `error.category` と `error.kind` を付ける。
//!   定数は [`error`] モジュールにある
//!
//! フィールド名はドット記法（`event.action`、`error.kind`）で、JSON 出力では
//! フラットなキーになる。

/// ビジネスイベントを INFO レベルで出力する
///
/// 慣例として `event.category`、`event.action`、`event.result` を必ず付け、
/// 対象がある場合は `event.entity_type` と `event.entity_id` も付ける。
///
/// ```ignore
/// log_business_event!(
///     event.category = event::category::USER,
///     event.action = event::action::USER_SIGNED_UP,
///     event.entity_type = event::entity_type::USER,
///     event.entity_id = %user.id(),
///     event.result = event::result::SUCCESS,
///     "ユーザーを登録"
/// );
/// ```
#[macro_export]
macro_rules! log_business_event {
    ($($args:tt)*) => {
        ::tracing::info!(
            event.kind = "business_event",
            $($args)*
        )
    };
}

/// イベントフィールドの定数
pub mod event {
    pub mod category {
        pub const USER: &str = "user";
        pub const AUTH: &str = "auth";
        pub const NOTIFICATION: &str = "notification";
    }

    pub mod action {
        // ユーザー
        pub const USER_SIGNED_UP: &str = "user.signed_up";
        pub const EMAIL_VERIFIED: &str = "user.email_verified";
        pub const USER_DELETED: &str = "user.deleted";

        // 認証
        pub const LOGIN_SUCCESS: &str = "auth.login_success";
        pub const LOGIN_FAILURE: &str = "auth.login_failure";
        pub const OAUTH_LOGIN: &str = "auth.oauth_login";
        pub const OAUTH_FAILURE: &str = "auth.oauth_failure";

        // 通知
        pub const VERIFICATION_EMAIL_SENT: &str = "notification.verification_sent";
        pub const VERIFICATION_EMAIL_FAILED: &str = "notification.verification_failed";
    }

    pub mod entity_type {
        pub const USER: &str = "user";
    }

    pub mod result {
        pub const SUCCESS: &str = "success";
        pub const FAILURE: &str = "failure";
    }
}

/// エラーコンテキストフィールドの定数
pub mod error {
    pub mod category {
        /// DB、オブジェクトストレージ
        pub const INFRASTRUCTURE: &str = "infrastructure";
        /// OAuth プロバイダ、メール送信
        pub const EXTERNAL_SERVICE: &str = "external_service";
    }

    pub mod kind {
        pub const DATABASE: &str = "database";
        pub const INTERNAL: &str = "internal";
        pub const PASSWORD_HASH: &str = "password_hash";
        pub const TOKEN: &str = "token";
        pub const IMAGE_UPLOAD: &str = "image_upload";
        pub const OAUTH_PROVIDER: &str = "oauth_provider";
        pub const NOTIFICATION: &str = "notification";
    }
}
