//! Facebook（Graph API `/me`）

use async_trait::async_trait;
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

const AUTHORIZE_URL: &str = "https://www.facebook.com/v19.0/dialog/oauth";
const TOKEN_URL: &str = "https://graph.facebook.com/v19.0/oauth/access_token";
const PROFILE_URL: &str = "https://graph.facebook.com/v19.0/me?fields=id,name,email";

/// `/me?fields=id,name,email` の応答
#[derive(Debug, Deserialize)]
struct FacebookMe {
    id:    String,
    name:  Option<String>,
    email: Option<String>,
}

impl From<FacebookMe> for OAuthProfile {
    fn from(me: FacebookMe) -> Self {
        Self {
            provider:     OAuthProvider::Facebook,
            subject:      me.id,
            email:        me.email,
            display_name: me.name,
        }
    }
}

pub struct FacebookOAuthClient {
    http:        reqwest::Client,
    credentials: OAuthCredentials,
    endpoints:   OAuthEndpoints,
}

impl FacebookOAuthClient {
    pub fn new(http: reqwest::Client, credentials: OAuthCredentials) -> Result<Self, url::ParseError> {
        let endpoints = OAuthEndpoints::parse(AUTHORIZE_URL, TOKEN_URL, PROFILE_URL)?;
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

    /// トークンエンドポイントはクエリパラメータで受け付ける
    fn token_url(&self, code: &str) -> Url {
        let mut url = self.endpoints.token.clone();
        url.set_query(Some(&token_request_form(&self.credentials, code)));
        url
    }
}

#[async_trait]
impl OAuthClient for FacebookOAuthClient {
    fn provider(&self) -> OAuthProvider {
        OAuthProvider::Facebook
    }

    fn authorize_url(&self, state: &str) -> Url {
        build_authorize_url(&self.endpoints, &self.credentials, self.provider(), state)
    }

    #[tracing::instrument(skip_all, fields(provider = "facebook"))]
    async fn exchange(&self, code: &str) -> Result<OAuthProfile, OAuthError> {
        let response = self
            .http
            .get(self.token_url(code))
            .send()
            .await
            .map_err(|e| OAuthError::Exchange(e.to_string()))?;
        let token: TokenResponse = read_json(response, OAuthError::Exchange).await?;

        let me: FacebookMe =
            fetch_profile(&self.http, self.endpoints.profile.clone(), &token.access_token).await?;

        Ok(me.into())
    }
}
