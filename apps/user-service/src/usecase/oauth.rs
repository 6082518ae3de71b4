//! # OAuth ログインユースケース
//!
//! プロバイダのプロフィールからローカルのユーザーを解決し、トークンを発行する。
//!
//! 解決順:
//!
//! 1. `(provider, subject)` が一致するユーザー
//! 2. 同じメールアドレスのユーザー（OAuth ID を紐付けて確認済みにする）
//! 3. 新規作成（パスワードなし・確認済み）。ユーザー名が埋まっていれば数字を付けて再試行

use std::{collections::HashMap, sync::Arc};

use rand::Rng as _;
use url::Url;
use warble_domain::{
    clock::Clock,
    oauth::{OAuthError, OAuthProfile, OAuthProvider, username_candidate},
    user::{NewUser, User},
};
use warble_infra::{
    AccessToken,
    OAuthClient,
    TokenIssuer,
    repository::{UserRepository, user_repository::USERNAME_CONSTRAINT},
};
use warble_shared::{event_log::event, log_business_event};

use crate::error::ApiError;

/// 新規ユーザーのユーザー名を探す回数
const MAX_USERNAME_ATTEMPTS: u32 = 10;

/// OAuth ログインの失敗
#[derive(Debug, thiserror::Error)]
pub enum OAuthLoginError {
    #[error(transparent)]
    Provider(#[from] OAuthError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// OAuth ユースケースの実装
pub struct OAuthUseCaseImpl {
    clients:         HashMap<OAuthProvider, Arc<dyn OAuthClient>>,
    user_repository: Arc<dyn UserRepository>,
    token_issuer:    Arc<dyn TokenIssuer>,
    clock:           Arc<dyn Clock>,
}

impl OAuthUseCaseImpl {
    /// 設定済みのプロバイダのクライアントだけを渡す
    pub fn new(
        clients: Vec<Arc<dyn OAuthClient>>,
        user_repository: Arc<dyn UserRepository>,
        token_issuer: Arc<dyn TokenIssuer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            clients: clients.into_iter().map(|c| (c.provider(), c)).collect(),
            user_repository,
            token_issuer,
            clock,
        }
    }

    pub fn is_enabled(&self, provider: OAuthProvider) -> bool {
        self.clients.contains_key(&provider)
    }

    /// 同意画面の URL
    ///
    /// # Errors
    ///
    /// プロバイダが設定されていない: `NotFound`
    pub fn authorize_url(&self, provider: OAuthProvider, state: &str) -> Result<Url, ApiError> {
        Ok(self.client(provider)?.authorize_url(state))
    }

    /// 認可コードを交換し、ユーザーを解決してトークンを発行する
    pub async fn complete(
        &self,
        provider: OAuthProvider,
        code: &str,
    ) -> Result<AccessToken, OAuthLoginError> {
        let profile = self.client(provider)?.exchange(code).await?;
        let user = self.resolve_user(&profile).await?;
        let token = self.token_issuer.issue(&user.id()).map_err(ApiError::from)?;

        log_business_event!(
            event.category = event::category::AUTH,
            event.action = event::action::OAUTH_LOGIN,
            event.entity_type = event::entity_type::USER,
            event.entity_id = %user.id(),
            event.result = event::result::SUCCESS,
            oauth.provider = provider.as_str(),
            "OAuth ログイン成功"
        );

        Ok(token)
    }

    fn client(&self, provider: OAuthProvider) -> Result<&Arc<dyn OAuthClient>, ApiError> {
        self.clients
            .get(&provider)
            .ok_or_else(|| ApiError::NotFound(format!("OAuth provider not configured: {provider}")))
    }

    async fn resolve_user(&self, profile: &OAuthProfile) -> Result<User, OAuthLoginError> {
        let identity = profile.identity();
        if let Some(user) = self
            .user_repository
            .find_by_oauth(&identity)
            .await
            .map_err(ApiError::from)?
        {
            return Ok(user);
        }

        let email = profile.email()?;
        if let Some(user) = self
            .user_repository
            .find_by_email(&email)
            .await
            .map_err(ApiError::from)?
        {
            let now = self.clock.now();
            self.user_repository
                .link_oauth(&user.id(), &identity, now)
                .await
                .map_err(ApiError::from)?;
            tracing::info!(
                user_id = %user.id(),
                provider = %identity.provider,
                "既存ユーザーに OAuth ID を紐付け"
            );
            return Ok(user.with_oauth(identity, now));
        }

        let full_name = profile.full_name(&email)?;
        let seed = profile.username_seed(&email);

        for attempt in 0..MAX_USERNAME_ATTEMPTS {
            let suffix = if attempt == 0 {
                0
            } else {
                rand::rng().random_range(1..10_000)
            };
            let Some(username) = username_candidate(&seed, suffix) else {
                continue;
            };
            if self
                .user_repository
                .find_by_username(&username)
                .await
                .map_err(ApiError::from)?
                .is_some()
            {
                continue;
            }

            let new_user = NewUser::from_oauth(
                full_name.clone(),
                username,
                email.clone(),
                identity.clone(),
                self.clock.now(),
            );
            match self.user_repository.insert(&new_user).await {
                Ok(user) => {
                    log_business_event!(
                        event.category = event::category::USER,
                        event.action = event::action::USER_SIGNED_UP,
                        event.entity_type = event::entity_type::USER,
                        event.entity_id = %user.id(),
                        event.result = event::result::SUCCESS,
                        oauth.provider = identity.provider.as_str(),
                        "OAuth でユーザーを登録"
                    );
                    return Ok(user);
                }
                Err(e) if e.conflict_constraint() == Some(USERNAME_CONSTRAINT) => continue,
                Err(e) => return Err(ApiError::from(e).into()),
            }
        }

        Err(ApiError::Conflict("Could not allocate a username".to_string()).into())
    }
}
