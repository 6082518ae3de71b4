//! # OAuth プロバイダクライアント
//!
//! 認可コードフローのうち、プロバイダとの通信部分を担当する。
//!
//! 1. [`OAuthClient::authorize_url`]: 同意画面の URL を組み立てる
//! 2. [`OAuthClient::exchange`]: コールバックで受け取った認可コードを
//!    アクセストークンに交換し、プロフィールを取得する
//!
//! state の生成と Cookie での照合は user-service 側の責務。

mod facebook;
mod google;

use async_trait::async_trait;
pub use facebook::FacebookOAuthClient;
pub use google::GoogleOAuthClient;
use serde::{Deserialize, de::DeserializeOwned};
use url::Url;
use warble_domain::oauth::{OAuthError, OAuthProfile, OAuthProvider};

/// OAuth クライアントトレイト
#[async_trait]
pub trait OAuthClient: Send + Sync {
    fn provider(&self) -> OAuthProvider;

    /// 同意画面の URL（`client_id`, `redirect_uri`, `response_type=code`, `scope`, `state` 付き）
    fn authorize_url(&self, state: &str) -> Url;

    /// 認可コードを交換し、プロフィールを返す
    ///
    /// # Errors
    ///
    /// - トークンエンドポイントの失敗: `Exchange`
    /// - プロフィール取得・解釈の失敗: `Profile`
    async fn exchange(&self, code: &str) -> Result<OAuthProfile, OAuthError>;
}

/// プロバイダに登録したクライアント情報
#[derive(Clone)]
pub struct OAuthCredentials {
    pub client_id:     String,
    pub client_secret: String,
    /// プロバイダに登録したコールバック URL
    pub callback_url:  String,
}

impl std::fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("callback_url", &self.callback_url)
            .finish()
    }
}

/// プロバイダごとのエンドポイント
#[derive(Debug, Clone)]
pub struct OAuthEndpoints {
    pub authorize: Url,
    pub token:     Url,
    pub profile:   Url,
}

impl OAuthEndpoints {
    pub fn parse(authorize: &str, token: &str, profile: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            authorize: Url::parse(authorize)?,
            token:     Url::parse(token)?,
            profile:   Url::parse(profile)?,
        })
    }
}

/// トークンエンドポイントの応答（必要なフィールドのみ）
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

pub(crate) fn build_authorize_url(
    endpoints: &OAuthEndpoints,
    credentials: &OAuthCredentials,
    provider: OAuthProvider,
    state: &str,
) -> Url {
    let mut url = endpoints.authorize.clone();
    url.query_pairs_mut()
        .append_pair("client_id", &credentials.client_id)
        .append_pair("redirect_uri", &credentials.callback_url)
        .append_pair("response_type", "code")
        .append_pair("scope", &provider.scopes().join(" "))
        .append_pair("state", state);
    url
}

/// トークン交換のパラメータ（`application/x-www-form-urlencoded`）
fn token_request_form(credentials: &OAuthCredentials, code: &str) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .append_pair("code", code)
        .append_pair("client_id", &credentials.client_id)
        .append_pair("client_secret", &credentials.client_secret)
        .append_pair("redirect_uri", &credentials.callback_url)
        .append_pair("grant_type", "authorization_code")
        .finish()
}

/// 応答ステータスを確認してから JSON として読む
async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    into_error: fn(String) -> OAuthError,
) -> Result<T, OAuthError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(into_error(format!("HTTP {status}: {body}")));
    }
    response
        .json::<T>()
        .await
        .map_err(|e| into_error(e.to_string()))
}

/// Bearer トークン付きでプロフィールを取得する
async fn fetch_profile<T: DeserializeOwned>(
    http: &reqwest::Client,
    url: Url,
    access_token: &str,
) -> Result<T, OAuthError> {
    let response = http
        .get(url)
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|e| OAuthError::Profile(e.to_string()))?;

    read_json(response, OAuthError::Profile).await
}
