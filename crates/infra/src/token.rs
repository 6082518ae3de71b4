//! # アクセストークン（JWT）
//!
//! HS256 署名の JWT を発行・検証する。
//!
//! - `sub` はユーザー ID の文字列表現
//! - `iat` / `exp` は UNIX 秒。有効期限の猶予（leeway）は設けない
//! - サーバー側にセッションは持たない

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use warble_domain::user::UserId;

/// デフォルトの有効期間（24 時間）
pub const DEFAULT_TTL_SECONDS: i64 = 86_400;

/// 発行済みアクセストークン
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token:      String,
    pub expires_at: DateTime<Utc>,
}

/// JWT のクレーム
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

impl TokenClaims {
    /// `sub` をユーザー ID として解釈する
    pub fn user_id(&self) -> Result<UserId, TokenError> {
        self.sub
            .parse::<UserId>()
            .map_err(|e| TokenError::Invalid(format!("sub が不正: {e}")))
    }
}

/// トークンのエラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("トークンの有効期限切れ")]
    Expired,

    #[error("不正なトークン: {0}")]
    Invalid(String),

    #[error("トークンの生成に失敗: {0}")]
    Encode(String),
}

/// アクセストークンの発行と検証
pub trait TokenIssuer: Send + Sync {
    fn issue(&self, user_id: &UserId) -> Result<AccessToken, TokenError>;

    fn verify(&self, token: &str) -> Result<TokenClaims, TokenError>;
}

/// HS256 実装
pub struct Hs256TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl:          Duration,
}

impl Hs256TokenIssuer {
    pub fn new(secret: &str, ttl_seconds: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl:          Duration::seconds(ttl_seconds),
        }
    }

    /// 発行時刻を指定して発行する
    pub fn issue_at(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<AccessToken, TokenError> {
        let expires_at = now + self.ttl;
        let claims = TokenClaims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encode(e.to_string()))?;

        Ok(AccessToken { token, expires_at })
    }
}

impl TokenIssuer for Hs256TokenIssuer {
    fn issue(&self, user_id: &UserId) -> Result<AccessToken, TokenError> {
        self.issue_at(user_id, Utc::now())
    }

    fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        jsonwebtoken::decode::<TokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            })
    }
}
