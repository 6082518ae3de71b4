//! # OAuth ハンドラ
//!
//! ## エンドポイント
//!
//! - `GET /auth/{provider}` - プロバイダの同意画面へリダイレクト
//! - `GET /auth/{provider}/callback` - 認可コードを受け取り、フロントエンドへ戻す
//!
//! `provider` は `google` または `facebook`。
//!
//! ## state の扱い
//!
//! 同意画面へ送る前にランダムな state を HttpOnly Cookie（`oauth_state`、10 分）に保存し、
//! コールバックの `state` クエリと定数時間で比較する。
//!
//! ## トークンの受け渡し
//!
//! 成功時は `FRONTEND_URL#token=<jwt>` へ 303 で戻す。フラグメントはサーバーに
//! 送られないのでアクセスログに残らない。失敗時は `/users/login` へ戻す。

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::Redirect,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use rand::{Rng as _, distr::Alphanumeric};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use utoipa::IntoParams;
use warble_domain::oauth::{OAuthError, OAuthProvider};
use warble_shared::{ErrorResponse, event_log::event, log_business_event};

use crate::{
    error::ApiError,
    usecase::{OAuthLoginError, OAuthUseCaseImpl},
};

/// state Cookie 名
pub const STATE_COOKIE_NAME: &str = "oauth_state";

/// state Cookie の有効期間（10 分）
const STATE_COOKIE_MAX_AGE_SECS: i64 = 600;

const STATE_LENGTH: usize = 32;

/// 失敗時のリダイレクト先
pub const LOGIN_FAILURE_REDIRECT: &str = "/users/login";

/// OAuth API の共有状態
pub struct OAuthState {
    pub usecase:        OAuthUseCaseImpl,
    /// ログイン完了後に戻すフロントエンドの URL
    pub frontend_url:   String,
    /// Cookie に Secure 属性を付けるか（HTTPS で公開している場合）
    pub secure_cookies: bool,
}

/// コールバックのクエリ
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackQuery {
    /// 認可コード
    pub code:  Option<String>,
    /// 同意画面へ送った state
    pub state: Option<String>,
    /// ユーザーが拒否した場合などにプロバイダが付けるエラー
    pub error: Option<String>,
}

#[utoipa::path(
    get,
    path = "/auth/{provider}",
    tag = "auth",
    params(("provider" = String, Path, description = "`google` または `facebook`")),
    responses(
        (status = 303, description = "プロバイダの同意画面へリダイレクト（`oauth_state` Cookie を設定）"),
        (status = 404, description = "未知または未設定のプロバイダ", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all, fields(%provider))]
pub async fn authorize(
    State(state): State<Arc<OAuthState>>,
    Path(provider): Path<String>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), ApiError> {
    let provider = parse_provider(&provider)?;
    let oauth_state = generate_state();
    let url = state.usecase.authorize_url(provider, &oauth_state)?;

    let jar = jar.add(build_state_cookie(oauth_state, state.secure_cookies));
    Ok((jar, Redirect::to(url.as_str())))
}

#[utoipa::path(
    get,
    path = "/auth/{provider}/callback",
    tag = "auth",
    params(
        ("provider" = String, Path, description = "`google` または `facebook`"),
        CallbackQuery
    ),
    responses(
        (status = 303, description = "成功: `FRONTEND_URL#token=<jwt>` へ、失敗: `/users/login` へリダイレクト"),
        (status = 404, description = "未知または未設定のプロバイダ", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all, fields(%provider))]
pub async fn callback(
    State(state): State<Arc<OAuthState>>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), ApiError> {
    let provider = parse_provider(&provider)?;
    if !state.usecase.is_enabled(provider) {
        return Err(not_configured(provider));
    }

    let expected_state = jar.get(STATE_COOKIE_NAME).map(|c| c.value().to_string());
    let jar = jar.add(build_clear_state_cookie(state.secure_cookies));

    let result = match check_callback(&query, expected_state.as_deref()) {
        Ok(code) => state.usecase.complete(provider, code).await,
        Err(e) => Err(OAuthLoginError::from(e)),
    };

    match result {
        Ok(token) => {
            let location = format!("{}#token={}", state.frontend_url, token.token);
            Ok((jar, Redirect::to(&location)))
        }
        Err(e) => {
            log_business_event!(
                event.category = event::category::AUTH,
                event.action = event::action::OAUTH_FAILURE,
                event.result = event::result::FAILURE,
                oauth.provider = provider.as_str(),
                error = %e,
                "OAuth ログイン失敗"
            );
            Ok((jar, Redirect::to(LOGIN_FAILURE_REDIRECT)))
        }
    }
}

fn parse_provider(raw: &str) -> Result<OAuthProvider, ApiError> {
    raw.parse::<OAuthProvider>()
        .map_err(|_| ApiError::NotFound(format!("Unknown OAuth provider: {raw}")))
}

fn not_configured(provider: OAuthProvider) -> ApiError {
    ApiError::NotFound(format!("OAuth provider not configured: {provider}"))
}

/// コールバックのクエリを検証し、認可コードを返す
fn check_callback<'a>(
    query: &'a CallbackQuery,
    expected_state: Option<&str>,
) -> Result<&'a str, OAuthError> {
    if let Some(error) = &query.error {
        return Err(OAuthError::Exchange(format!("provider returned error: {error}")));
    }

    let (Some(actual), Some(expected)) = (query.state.as_deref(), expected_state) else {
        return Err(OAuthError::StateMismatch);
    };
    if !bool::from(actual.as_bytes().ct_eq(expected.as_bytes())) {
        return Err(OAuthError::StateMismatch);
    }

    query
        .code
        .as_deref()
        .filter(|code| !code.is_empty())
        .ok_or_else(|| OAuthError::Exchange("code is missing".to_string()))
}

fn generate_state() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_LENGTH)
        .map(char::from)
        .collect()
}

fn build_state_cookie(value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((STATE_COOKIE_NAME, value))
        .path("/auth")
        .max_age(time::Duration::seconds(STATE_COOKIE_MAX_AGE_SECS))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

fn build_clear_state_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((STATE_COOKIE_NAME, ""))
        .path("/auth")
        .max_age(time::Duration::seconds(0))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        body::Body,
        http::{Request, Response, StatusCode, header},
        routing::get,
    };
    use chrono::DateTime;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tower::ServiceExt;
    use warble_domain::{clock::FixedClock, oauth::OAuthProfile};
    use warble_infra::{
        Hs256TokenIssuer,
        OAuthClient,
        TokenIssuer,
        mock::{MockUserRepository, StubOAuthClient},
    };

    use super::*;

    const FRONTEND: &str = "http://localhost:5173";

    fn app(profile: Option<OAuthProfile>) -> (Router, MockUserRepository) {
        let repo = MockUserRepository::new();
        let client: Arc<dyn OAuthClient> =
            Arc::new(StubOAuthClient::new(OAuthProvider::Google, profile));
        let usecase = OAuthUseCaseImpl::new(
            vec![client],
            Arc::new(repo.clone()),
            Arc::new(Hs256TokenIssuer::new("test-secret", 3600)),
            Arc::new(FixedClock::new(
                DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            )),
        );
        let state = Arc::new(OAuthState {
            usecase,
            frontend_url: FRONTEND.to_string(),
            secure_cookies: false,
        });
        let router = Router::new()
            .route("/auth/{provider}", get(authorize))
            .route("/auth/{provider}/callback", get(callback))
            .with_state(state);
        (router, repo)
    }

    fn carol() -> OAuthProfile {
        OAuthProfile {
            provider:     OAuthProvider::Google,
            subject:      "g-1".to_string(),
            email:        Some("carol@gmail.com".to_string()),
            display_name: Some("Carol".to_string()),
        }
    }

    fn location(response: &Response<Body>) -> String {
        response.headers()[header::LOCATION]
            .to_str()
            .unwrap()
            .to_string()
    }

    async fn get_with_cookie(router: Router, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        router
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_同意画面へstate付きでリダイレクトする() {
        let (router, _) = app(None);

        let response = get_with_cookie(router, "/auth/google", None).await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(set_cookie.starts_with("oauth_state="));
        assert!(set_cookie.contains("HttpOnly"));
        assert!(set_cookie.contains("SameSite=Lax"));
        assert!(set_cookie.contains("Max-Age=600"));

        let cookie_state = set_cookie
            .trim_start_matches("oauth_state=")
            .split(';')
            .next()
            .unwrap();
        assert_eq!(cookie_state.len(), 32);
        let url = url::Url::parse(&location(&response)).unwrap();
        assert!(
            url.query_pairs()
                .any(|(k, v)| k == "state" && v == cookie_state)
        );
    }

    #[rstest]
    #[case("/auth/twitter")]
    #[case("/auth/facebook")]
    #[case("/auth/facebook/callback?code=x&state=y")]
    #[tokio::test]
    async fn test_未知または未設定のプロバイダは404(#[case] uri: &str) {
        let (router, _) = app(None);

        let response = get_with_cookie(router, uri, None).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_コールバック成功でフラグメントにトークンを付けて戻す() {
        let (router, repo) = app(Some(carol()));

        let response = get_with_cookie(
            router,
            "/auth/google/callback?code=auth-code&state=abc",
            Some("oauth_state=abc"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = location(&response);
        let token = location
            .strip_prefix("http://localhost:5173#token=")
            .unwrap();
        let claims = Hs256TokenIssuer::new("test-secret", 3600)
            .verify(token)
            .unwrap();
        assert_eq!(claims.user_id().unwrap(), repo.users()[0].id());

        let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(set_cookie.contains("Max-Age=0"));
    }

    #[rstest]
    #[case("/auth/google/callback?code=auth-code&state=abc", Some("oauth_state=other"))]
    #[case("/auth/google/callback?code=auth-code&state=abc", None)]
    #[case("/auth/google/callback?code=auth-code", Some("oauth_state=abc"))]
    #[case("/auth/google/callback?state=abc", Some("oauth_state=abc"))]
    #[case("/auth/google/callback?error=access_denied&state=abc", Some("oauth_state=abc"))]
    #[tokio::test]
    async fn test_コールバックの失敗はログイン画面へ戻す(
        #[case] uri: &str,
        #[case] cookie: Option<&str>,
    ) {
        let (router, repo) = app(Some(carol()));

        let response = get_with_cookie(router, uri, cookie).await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/users/login");
        assert!(repo.users().is_empty());
    }

    #[tokio::test]
    async fn test_コード交換に失敗したらログイン画面へ戻す() {
        let (router, _) = app(None);

        let response = get_with_cookie(
            router,
            "/auth/google/callback?code=bad&state=abc",
            Some("oauth_state=abc"),
        )
        .await;

        assert_eq!(location(&response), "/users/login");
    }

    #[tokio::test]
    async fn test_ユーザー名を確保できなければログイン画面へ戻す() {
        let (router, repo) = app(Some(carol()));
        repo.race_username_on_insert(u32::MAX);

        let response = get_with_cookie(
            router,
            "/auth/google/callback?code=auth-code&state=abc",
            Some("oauth_state=abc"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/users/login");
        assert!(repo.users().is_empty());
    }
}
