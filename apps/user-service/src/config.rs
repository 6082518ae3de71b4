//! # User Service 設定
//!
//! 環境変数から User Service サーバーの設定を読み込む。
//!
//! 必須の変数が無い・値が不正な場合は [`ConfigError`] を返す。
//! `main` はこれを受けて起動を中止する。

use std::env;

use thiserror::Error;
use warble_infra::{oauth::OAuthCredentials, token::DEFAULT_TTL_SECONDS};

/// 設定読み込みエラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} が設定されていません")]
    Missing(&'static str),

    #[error("{name} の値が不正です: {value}")]
    Invalid { name: &'static str, value: String },
}

/// User Service サーバーの設定
#[derive(Debug, Clone)]
pub struct UserServiceConfig {
    /// バインドアドレス
    pub host:            String,
    /// ポート番号
    pub port:            u16,
    /// データベース接続 URL
    pub database_url:    String,
    /// JWT 署名鍵
    pub jwt_secret:      String,
    /// JWT の有効期間（秒）
    pub jwt_ttl_seconds: i64,
    /// OAuth ログイン後のリダイレクト先
    pub frontend_url:    String,
    /// このサービスの外部公開 URL（確認メールのリンクに使う）
    pub public_base_url: String,
    /// 通知設定
    pub notification:    NotificationConfig,
    /// 画像保存設定
    pub image_storage:   ImageStorageConfig,
    /// Google OAuth（3 つの変数がすべて揃ったときだけ有効）
    pub google:          Option<OAuthCredentials>,
    /// Facebook OAuth
    pub facebook:        Option<OAuthCredentials>,
}

/// 通知機能の設定
///
/// `NOTIFICATION_BACKEND` で送信バックエンドを切り替える:
/// - `smtp`: Mailpit（開発）/ SMTP サーバー経由で送信
/// - `ses`: Amazon SES v2 経由で送信（本番）
/// - `noop`: 送信しない（ログ出力のみ）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationConfig {
    pub backend:      NotificationBackend,
    pub smtp_host:    String,
    pub smtp_port:    u16,
    pub from_address: String,
    pub aws_region:   String,
}

/// 通知の送信バックエンド
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationBackend {
    Smtp,
    Ses,
    Noop,
}

/// 画像保存の設定
///
/// `IMAGE_STORAGE_BACKEND=s3` のときだけ S3 に保存する。既定の `noop` は
/// 画像付きサインアップを拒否する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageStorageConfig {
    Noop,
    S3 {
        endpoint_url:    Option<String>,
        bucket_name:     String,
        public_base_url: String,
        region:          String,
    },
}

impl UserServiceConfig {
    /// 環境変数から設定を読み込む
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// 任意の参照関数から設定を読み込む
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars(&lookup);

        let port: u16 = vars.parse_required("USER_SERVICE_PORT")?;
        let region = vars.or("AWS_REGION", "us-east-1");

        Ok(Self {
            host: vars.or("USER_SERVICE_HOST", "0.0.0.0"),
            port,
            database_url: vars.required("DATABASE_URL")?,
            jwt_secret: vars.required("JWT_SECRET")?,
            jwt_ttl_seconds: vars.parse_or("JWT_TTL_SECONDS", DEFAULT_TTL_SECONDS)?,
            frontend_url: vars.required("FRONTEND_URL")?,
            public_base_url: vars
                .get("PUBLIC_BASE_URL")
                .unwrap_or_else(|| format!("http://localhost:{port}")),
            notification: NotificationConfig {
                backend:      vars.notification_backend()?,
                smtp_host:    vars.or("SMTP_HOST", "localhost"),
                smtp_port:    vars.parse_or("SMTP_PORT", 1025)?,
                from_address: vars.or("NOTIFICATION_FROM_ADDRESS", "noreply@warble.example.com"),
                aws_region:   region.clone(),
            },
            image_storage: match vars.or("IMAGE_STORAGE_BACKEND", "noop").as_str() {
                "noop" => ImageStorageConfig::Noop,
                "s3" => ImageStorageConfig::S3 {
                    endpoint_url:    vars.get("S3_ENDPOINT_URL"),
                    bucket_name:     vars.required("S3_BUCKET_NAME")?,
                    public_base_url: vars.required("S3_PUBLIC_BASE_URL")?,
                    region,
                },
                other => {
                    return Err(ConfigError::Invalid {
                        name:  "IMAGE_STORAGE_BACKEND",
                        value: other.to_string(),
                    });
                }
            },
            google: vars.oauth("GOOGLE"),
            facebook: vars.oauth("FACEBOOK"),
        })
    }
}

struct Vars<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Vars<'_, F> {
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|v| !v.is_empty())
    }

    fn notification_backend(&self) -> Result<NotificationBackend, ConfigError> {
        match self.or("NOTIFICATION_BACKEND", "noop").as_str() {
            "smtp" => Ok(NotificationBackend::Smtp),
            "ses" => Ok(NotificationBackend::Ses),
            "noop" => Ok(NotificationBackend::Noop),
            other => Err(ConfigError::Invalid {
                name:  "NOTIFICATION_BACKEND",
                value: other.to_string(),
            }),
        }
    }

    fn or(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.get(name).ok_or(ConfigError::Missing(name))
    }

    fn parse_required<T: std::str::FromStr>(&self, name: &'static str) -> Result<T, ConfigError> {
        let value = self.required(name)?;
        value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value })
    }

    fn parse_or<T: std::str::FromStr>(&self, name: &'static str, default: T) -> Result<T, ConfigError> {
        match self.get(name) {
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::Invalid { name, value }),
            None => Ok(default),
        }
    }

    fn oauth(&self, prefix: &str) -> Option<OAuthCredentials> {
        Some(OAuthCredentials {
            client_id:     self.get(&format!("{prefix}_CLIENT_ID"))?,
            client_secret: self.get(&format!("{prefix}_CLIENT_SECRET"))?,
            callback_url:  self.get(&format!("{prefix}_CALLBACK_URL"))?,
        })
    }
}
