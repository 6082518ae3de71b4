//! Google（OpenID Connect userinfo）

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use url::Url;
use warble_domain::oauth::{OAuthError, OAuthProfile, OAuthProvider};

use super::{
    OAuthClient,
    OAuthCredentials,
    OAuthEndpoints,
    TokenResponse,
    build_authorize_url,
    fetch_profile,
    read_json,
    token_request_form,
};

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// userinfo エンドポイントの応答
#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    sub:            String,
    email:          Option<String>,
    #[serde(default)]
    email_verified: Option<bool>,
    name:           Option<String>,
}

impl GoogleUserInfo {
    fn into_profile(self) -> OAuthProfile {
        // 未確認のメールアドレスはアカウントの紐付けに使わない
        let email = match self.email_verified {
            Some(false) => None,
            _ => self.email,
        };
        OAuthProfile {
            provider: OAuthProvider::Google,
            subject: self.sub,
            email,
            display_name: self.name,
        }
    }
}

pub struct GoogleOAuthClient {
    http:        reqwest::Client,
    credentials: OAuthCredentials,
    endpoints:   OAuthEndpoints,
}

impl GoogleOAuthClient {
    pub fn new(http: reqwest::Client, credentials: OAuthCredentials) -> Result<Self, url::ParseError> {
        let endpoints = OAuthEndpoints::parse(AUTHORIZE_URL, TOKEN_URL, USERINFO_URL)?;
        Ok(Self::with_endpoints(http, credentials, endpoints))
    }

    pub fn with_endpoints(
        http: reqwest::Client,
        credentials: OAuthCredentials,
        endpoints: OAuthEndpoints,
    ) -> Self {
        Self {
            http,
            credentials,
            endpoints,
        }
    }
}

#[async_trait]
impl OAuthClient for GoogleOAuthClient {
    fn provider(&self) -> OAuthProvider {
        OAuthProvider::Google
    }

    fn authorize_url(&self, state: &str) -> Url {
        build_authorize_url(&self.endpoints, &self.credentials, self.provider(), state)
    }

    #[tracing::instrument(skip_all, fields(provider = "google"))]
    async fn exchange(&self, code: &str) -> Result<OAuthProfile, OAuthError> {
        let response = self
            .http
            .post(self.endpoints.token.clone())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(token_request_form(&self.credentials, code))
            .send()
            .await
            .map_err(|e| OAuthError::Exchange(e.to_string()))?;
        let token: TokenResponse = read_json(response, OAuthError::Exchange).await?;

        let info: GoogleUserInfo =
            fetch_profile(&self.http, self.endpoints.profile.clone(), &token.access_token).await?;

        Ok(info.into_profile())
    }
}
