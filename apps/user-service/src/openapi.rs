//! # OpenAPI 仕様定義
//!
//! utoipa で User Service の OpenAPI 仕様を Rust の型から生成する。
//! `ApiDoc::openapi()` で OpenAPI ドキュメントを取得できる。

use utoipa::{
    Modify,
    OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::handler::{health, oauth, user};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Warble User API",
        version = "0.1.0",
        description = "Warble のユーザーアカウント API（登録・メール確認・ログイン・OAuth）"
    ),
    paths(
        // health
        health::health_check,
        health::readiness_check,
        // users
        user::list_users,
        user::signup,
        user::verify_email,
        user::login,
        user::get_user,
        user::delete_user,
        // auth
        oauth::authorize,
        oauth::callback,
    ),
    components(schemas(
        warble_shared::ErrorResponse,
    )),
    tags(
        (name = "health", description = "ヘルスチェック"),
        (name = "users", description = "ユーザーアカウント"),
        (name = "auth", description = "OAuth ログイン"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// セキュリティスキーム定義
///
/// `Authorization: Bearer <jwt>` を追加する。
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_default();
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
