//! # ルーター構築
//!
//! 各 State を受け取り、ルートとミドルウェアを組み立てる。
//! `main.rs` はインフラ初期化と DI、サーバー起動に集中する。

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
};
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use warble_infra::storage::MAX_IMAGE_BYTES;
use warble_shared::{
    canonical_log::CanonicalLogLineLayer,
    observability::{MakeRequestUuidV7, make_request_span},
};

use crate::handler::{
    OAuthState,
    ReadinessState,
    UserState,
    authorize,
    callback,
    delete_user,
    get_user,
    health_check,
    list_users,
    login,
    readiness_check,
    signup,
    verify_email,
};

/// サインアップのボディ上限（画像の上限 + JSON 部分の余裕）
///
/// 画像が 5 MiB を少し超える程度なら 400、これを超えるボディは 413 になる。
pub const SIGNUP_BODY_LIMIT: usize = MAX_IMAGE_BYTES + 1024 * 1024;

/// ルーターを構築する
pub fn build_router(
    user_state: Arc<UserState>,
    oauth_state: Arc<OAuthState>,
    readiness_state: Arc<ReadinessState>,
) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(
            Router::new()
                .route("/health/ready", get(readiness_check))
                .with_state(readiness_state),
        )
        .merge(
            Router::new()
                .route("/users", get(list_users))
                .route(
                    "/users/signup",
                    post(signup).layer(DefaultBodyLimit::max(SIGNUP_BODY_LIMIT)),
                )
                .route("/users/verifyEmail/{email}/{verify_code}", patch(verify_email))
                .route("/users/login", post(login))
                .route("/users/{id}", get(get_user).delete(delete_user))
                .with_state(user_state),
        )
        .merge(
            Router::new()
                .route("/auth/{provider}", get(authorize))
                .route("/auth/{provider}/callback", get(callback))
                .with_state(oauth_state),
        )
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(CanonicalLogLineLayer)
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
}
