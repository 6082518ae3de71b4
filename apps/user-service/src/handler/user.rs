//! # ユーザー API ハンドラ
//!
//! ## エンドポイント
//!
//! - `GET /users` - ユーザー一覧
//! - `POST /users/signup` - サインアップ
//! - `PATCH /users/verifyEmail/{email}/{verify_code}` - メールアドレス確認
//! - `POST /users/login` - ログイン
//! - `GET /users/{id}` - ユーザー取得
//! - `DELETE /users/{id}` - ユーザー削除（本人のみ）

use std::{borrow::Cow, sync::Arc};

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};
use warble_domain::user::UserProfile;
use warble_infra::TokenIssuer;
use warble_shared::{ApiResponse, ErrorResponse};

use super::extractors::{AuthenticatedUser, SignupForm, UserIdPath, ValidatedJson};
use crate::{
    error::ApiError,
    usecase::{AuthenticatedProfile, SignupInput, UserUseCaseImpl},
};

/// ユーザー API の共有状態
pub struct UserState {
    pub usecase:      UserUseCaseImpl,
    pub token_issuer: Arc<dyn TokenIssuer>,
}

// --- リクエスト型 ---

/// サインアップリクエスト
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SignupRequest {
    #[serde(alias = "fullName")]
    #[validate(length(min = 1, max = 255, message = "full_name is required"))]
    pub full_name: String,

    #[serde(alias = "userName")]
    #[validate(
        length(min = 1, max = 64, message = "username must be 1-64 characters"),
        custom(function = "validate_alphanumeric")
    )]
    pub username: String,

    #[validate(email(message = "email must be a valid email"))]
    pub email: String,

    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,

    /// 画像 URL（ファイルをアップロードした場合は無視される）
    #[validate(url(message = "image must be a valid URL"))]
    pub image: Option<String>,
}

fn validate_alphanumeric(value: &str) -> Result<(), ValidationError> {
    if value.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(ValidationError::new("alphanumeric")
            .with_message(Cow::Borrowed("username must be alphanumeric")))
    }
}

/// ログインリクエスト
///
/// `username` があればそれを、無ければ `email` を使う。どちらの値もユーザー名と
/// メールアドレスの両方に照合する。
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_login_target"))]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email:    Option<String>,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

impl LoginRequest {
    fn login(&self) -> &str {
        self.username
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.email.as_deref())
            .unwrap_or_default()
    }
}

fn validate_login_target(request: &LoginRequest) -> Result<(), ValidationError> {
    if request.login().is_empty() {
        Err(ValidationError::new("login")
            .with_message(Cow::Borrowed("username or email is required")))
    } else {
        Ok(())
    }
}

// --- レスポンス型 ---

/// ユーザーの公開プロフィール
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserData {
    pub id:          i64,
    pub full_name:   String,
    pub username:    String,
    pub email:       String,
    pub image:       Option<String>,
    pub is_verified: bool,
    pub created_at:  DateTime<Utc>,
    pub updated_at:  DateTime<Utc>,
}

impl From<UserProfile> for UserData {
    fn from(profile: UserProfile) -> Self {
        Self {
            id:          profile.id.as_i64(),
            full_name:   profile.full_name,
            username:    profile.username,
            email:       profile.email,
            image:       profile.image,
            is_verified: profile.is_verified,
            created_at:  profile.created_at,
            updated_at:  profile.updated_at,
        }
    }
}

/// プロフィールとアクセストークン
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthData {
    #[serde(flatten)]
    pub user:  UserData,
    /// HS256 署名の JWT
    pub token: String,
}

impl From<AuthenticatedProfile> for AuthData {
    fn from(result: AuthenticatedProfile) -> Self {
        Self {
            user:  result.profile.into(),
            token: result.token.token,
        }
    }
}

/// メッセージのみのレスポンス
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageData {
    pub message: String,
}

// --- ハンドラ ---

#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    responses(
        (status = 200, description = "ユーザー一覧（ID 昇順）", body = ApiResponse<Vec<UserData>>)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_users(State(state): State<Arc<UserState>>) -> Result<impl IntoResponse, ApiError> {
    let users = state.usecase.list_users().await?;
    let data: Vec<UserData> = users.into_iter().map(UserData::from).collect();
    Ok(Json(ApiResponse::new(data)))
}

#[utoipa::path(
    post,
    path = "/users/signup",
    tag = "users",
    request_body(
        content = SignupRequest,
        description = "JSON、または `body`（JSON 文字列）と `image`（画像ファイル）の multipart/form-data"
    ),
    responses(
        (status = 201, description = "登録成功", body = ApiResponse<AuthData>),
        (status = 400, description = "バリデーションエラー / 不正な画像", body = ErrorResponse),
        (status = 409, description = "ユーザー名またはメールアドレスが使用済み", body = ErrorResponse),
        (status = 413, description = "画像が大きすぎる", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn signup(
    State(state): State<Arc<UserState>>,
    form: SignupForm,
) -> Result<impl IntoResponse, ApiError> {
    let SignupForm { request, image } = form;
    let input = SignupInput {
        full_name: request.full_name,
        username: request.username,
        email: request.email,
        password: request.password,
        image_url: request.image,
        image,
    };

    let result = state.usecase.signup(input).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(AuthData::from(result))),
    ))
}

#[utoipa::path(
    patch,
    path = "/users/verifyEmail/{email}/{verify_code}",
    tag = "users",
    params(
        ("email" = String, Path, description = "登録したメールアドレス"),
        ("verify_code" = String, Path, description = "確認メールに記載されたコード")
    ),
    responses(
        (status = 200, description = "確認成功", body = ApiResponse<MessageData>),
        (status = 400, description = "コードが一致しない", body = ErrorResponse),
        (status = 404, description = "ユーザーが存在しない", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn verify_email(
    State(state): State<Arc<UserState>>,
    Path((email, verify_code)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    state.usecase.verify_email(&email, &verify_code).await?;
    Ok(Json(ApiResponse::new(MessageData {
        message: "Email verified".to_string(),
    })))
}

#[utoipa::path(
    post,
    path = "/users/login",
    tag = "users",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "ログイン成功", body = ApiResponse<AuthData>),
        (status = 400, description = "バリデーションエラー / ログイン情報が正しくない", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(
    State(state): State<Arc<UserState>>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .usecase
        .login(request.login(), &request.password)
        .await?;
    Ok(Json(ApiResponse::new(AuthData::from(result))))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    params(("id" = i64, Path, description = "ユーザー ID")),
    responses(
        (status = 200, description = "ユーザー", body = ApiResponse<UserData>),
        (status = 400, description = "ID が正の整数でない", body = ErrorResponse),
        (status = 404, description = "ユーザーが存在しない", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all, fields(%id))]
pub async fn get_user(
    State(state): State<Arc<UserState>>,
    UserIdPath(id): UserIdPath,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state.usecase.find_user(id).await?;
    Ok(Json(ApiResponse::new(UserData::from(profile))))
}

#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "ユーザー ID")),
    responses(
        (status = 204, description = "削除成功"),
        (status = 400, description = "ID が正の整数でない", body = ErrorResponse),
        (status = 401, description = "認証エラー", body = ErrorResponse),
        (status = 403, description = "他人のアカウント", body = ErrorResponse),
        (status = 404, description = "ユーザーが存在しない", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all, fields(%id))]
pub async fn delete_user(
    State(state): State<Arc<UserState>>,
    UserIdPath(id): UserIdPath,
    AuthenticatedUser(actor): AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    state.usecase.delete_user(actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
