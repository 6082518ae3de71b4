//! # リクエスト抽出器
//!
//! ハンドラの引数で使う axum の抽出器。失敗はすべて [`ApiError`] として返す。
//!
//! - [`ValidatedJson`]: JSON をデシリアライズして `validator` で検証する
//! - [`SignupForm`]: `multipart/form-data`（`body` + `image`）または JSON のサインアップ
//! - [`AuthenticatedUser`]: `Authorization: Bearer <jwt>` を検証する
//! - [`UserIdPath`]: パスの `{id}` を正の整数として解釈する

use std::sync::Arc;

use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Multipart, Path, Request},
    http::{StatusCode, header, request::Parts},
};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors};
use warble_domain::user::UserId;
use warble_infra::ImageUpload;

use super::user::{SignupRequest, UserState};
use crate::error::ApiError;

/// 検証済みの JSON ボディ
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::Validation(rejection.body_text()))?;
        validate(&value)?;
        Ok(Self(value))
    }
}

/// サインアップの入力
///
/// `multipart/form-data` の場合はテキストフィールド `body` に JSON を、
/// ファイルフィールド `image` に画像を入れる。それ以外は JSON として読む。
#[derive(Debug)]
pub struct SignupForm {
    pub request: SignupRequest,
    pub image:   Option<ImageUpload>,
}

impl<S> FromRequest<S> for SignupForm
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if !is_multipart {
            let ValidatedJson(request) = ValidatedJson::<SignupRequest>::from_request(req, state).await?;
            return Ok(Self {
                request,
                image: None,
            });
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

        let mut body: Option<String> = None;
        let mut image: Option<ImageUpload> = None;

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "body" => body = Some(field.text().await.map_err(multipart_error)?),
                "image" => {
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    let data: Bytes = field.bytes().await.map_err(multipart_error)?;
                    if data.is_empty() {
                        continue;
                    }
                    let upload = ImageUpload::new(content_type, data).map_err(|e| {
                        ApiError::BadRequest(
                            e.invalid_input_message()
                                .unwrap_or("Invalid image upload")
                                .to_string(),
                        )
                    })?;
                    image = Some(upload);
                }
                _ => {}
            }
        }

        let body = body.ok_or_else(|| ApiError::Validation("body is required".to_string()))?;
        let request: SignupRequest =
            serde_json::from_str(&body).map_err(|e| ApiError::Validation(e.to_string()))?;
        validate(&request)?;

        Ok(Self { request, image })
    }
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::BadRequest(err.body_text())
    }
}

/// Bearer トークンで認証されたユーザー
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub UserId);

impl FromRequestParts<Arc<UserState>> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<UserState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer(parts)?;
        let claims = state.token_issuer.verify(token)?;
        let user_id = claims.user_id()?;

        tracing::Span::current().record("user_id", tracing::field::display(&user_id));
        Ok(Self(user_id))
    }
}

fn extract_bearer(parts: &Parts) -> Result<&str, ApiError> {
    let unauthorized = || ApiError::Unauthorized("Authentication required".to_string());

    let value = parts
        .headers
        .get(header::AUTHORIZATION)
        .ok_or_else(unauthorized)?
        .to_str()
        .map_err(|_| unauthorized())?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or_else(unauthorized)?
        .trim();

    if token.is_empty() {
        return Err(unauthorized());
    }
    Ok(token)
}

/// パスの `{id}`（正の整数）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserIdPath(pub UserId);

impl<S> FromRequestParts<S> for UserIdPath
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

        raw.parse::<UserId>()
            .map(Self)
            .map_err(|_| ApiError::Validation("id must be a positive integer".to_string()))
    }
}

fn validate<T: Validate>(value: &T) -> Result<(), ApiError> {
    value
        .validate()
        .map_err(|errors| ApiError::Validation(describe(&errors)))
}

/// 検証エラーを 1 行の文言にまとめる（フィールド名順）
fn describe(errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(message) => message.to_string(),
                None => format!("{field} is invalid"),
            })
        })
        .collect();
    messages.sort();
    messages.join(", ")
}
