//! # User Service サーバー
//!
//! ## 起動手順
//!
//! 1. 環境変数の読み込み（`.env` があれば）
//! 2. トレーシングの初期化
//! 3. 設定の読み込み
//! 4. DB 接続とマイグレーション
//! 5. 外部サービス（メール、画像保存、OAuth）の初期化
//! 6. ルーターの構築と HTTP サーバーの起動
//!
//! ## 環境変数
//!
//! | 変数名 | 必須 | 説明 |
//! |--------|------|------|
//! | `USER_SERVICE_HOST` | No | バインドアドレス（既定 `0.0.0.0`） |
//! | `USER_SERVICE_PORT` | **Yes** | ポート番号 |
//! | `DATABASE_URL` | **Yes** | PostgreSQL 接続 URL |
//! | `JWT_SECRET` | **Yes** | JWT 署名鍵 |
//! | `PUBLIC_BASE_URL` | No | 確認メールのリンクに使う外部公開 URL（既定 `http://localhost:{port}`） |
//! | `FRONTEND_URL` | **Yes** | OAuth ログイン後のリダイレクト先 |
//! | `NOTIFICATION_BACKEND` | No | `smtp` / `ses` / `noop` |
//! | `IMAGE_STORAGE_BACKEND` | No | `s3` / `noop` |

use std::{net::SocketAddr, sync::Arc};

use tokio::net::TcpListener;
use url::Url;
use warble_domain::clock::{Clock, SystemClock};
use warble_infra::{
    Argon2PasswordHasher,
    Hs256TokenIssuer,
    ImageStorage,
    NotificationSender,
    OAuthClient,
    RandomVerifyCodeGenerator,
    TokenIssuer,
    db,
    notification::{
        NoopNotificationSender,
        SesNotificationSender,
        SmtpNotificationSender,
        create_ses_client,
    },
    oauth::{FacebookOAuthClient, GoogleOAuthClient},
    repository::{PostgresUserRepository, UserRepository},
    storage::{NoopImageStorage, S3ImageStorage, create_s3_client},
};
use warble_shared::observability::TracingConfig;
use warble_user_service::{
    app,
    config::{ImageStorageConfig, NotificationBackend, NotificationConfig, UserServiceConfig},
    handler::{OAuthState, ReadinessState, UserState},
    usecase::{OAuthUseCaseImpl, UserUseCaseImpl, VerificationMailer},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env ファイルを読み込む（存在する場合）
    dotenvy::dotenv().ok();

    let tracing_config = TracingConfig::from_env("user-service");
    warble_shared::observability::init_tracing(tracing_config);
    let _tracing_guard = tracing::info_span!("app", service = "user-service").entered();

    let config = UserServiceConfig::from_env().expect("設定の読み込みに失敗しました");

    tracing::info!(
        "User Service サーバーを起動します: {}:{}",
        config.host,
        config.port
    );

    let pool = db::create_pool(&config.database_url)
        .await
        .expect("データベース接続に失敗しました");
    db::run_migrations(&pool)
        .await
        .expect("マイグレーションの適用に失敗しました");

    // 外部サービス
    let notification_sender = create_notification_sender(&config.notification).await?;
    let image_storage = create_image_storage(&config.image_storage).await;
    let oauth_clients = create_oauth_clients(&config)?;

    // 依存関係の初期化
    let user_repository: Arc<dyn UserRepository> =
        Arc::new(PostgresUserRepository::new(pool.clone()));
    let token_issuer: Arc<dyn TokenIssuer> = Arc::new(Hs256TokenIssuer::new(
        &config.jwt_secret,
        config.jwt_ttl_seconds,
    ));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let mailer = Arc::new(VerificationMailer::new(
        notification_sender,
        Url::parse(&config.public_base_url)?,
    )?);

    let user_usecase = UserUseCaseImpl::new(
        user_repository.clone(),
        Arc::new(Argon2PasswordHasher::new()),
        token_issuer.clone(),
        Arc::new(RandomVerifyCodeGenerator),
        image_storage,
        mailer,
        clock.clone(),
    );
    let oauth_usecase = OAuthUseCaseImpl::new(
        oauth_clients,
        user_repository,
        token_issuer.clone(),
        clock,
    );

    let user_state = Arc::new(UserState {
        usecase: user_usecase,
        token_issuer,
    });
    let oauth_state = Arc::new(OAuthState {
        usecase:        oauth_usecase,
        frontend_url:   config.frontend_url.clone(),
        secure_cookies: config.public_base_url.starts_with("https://"),
    });
    let readiness_state = Arc::new(ReadinessState { pool });

    let app = app::build_router(user_state, oauth_state, readiness_state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("アドレスのパースに失敗しました");
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("User Service サーバーが起動しました: {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// `NOTIFICATION_BACKEND` に応じて送信バックエンドを選ぶ
async fn create_notification_sender(
    config: &NotificationConfig,
) -> anyhow::Result<Arc<dyn NotificationSender>> {
    let sender: Arc<dyn NotificationSender> = match config.backend {
        NotificationBackend::Smtp => {
            tracing::info!(
                "通知バックエンド: SMTP ({}:{})",
                config.smtp_host,
                config.smtp_port
            );
            Arc::new(SmtpNotificationSender::new(
                &config.smtp_host,
                config.smtp_port,
                &config.from_address,
            )?)
        }
        NotificationBackend::Ses => {
            tracing::info!("通知バックエンド: SES ({})", config.aws_region);
            let client = create_ses_client(&config.aws_region).await;
            Arc::new(SesNotificationSender::new(
                client,
                config.from_address.clone(),
            ))
        }
        NotificationBackend::Noop => {
            tracing::info!("通知バックエンド: Noop");
            Arc::new(NoopNotificationSender)
        }
    };
    Ok(sender)
}

async fn create_image_storage(config: &ImageStorageConfig) -> Arc<dyn ImageStorage> {
    match config {
        ImageStorageConfig::S3 {
            endpoint_url,
            bucket_name,
            public_base_url,
            region,
        } => {
            tracing::info!("画像保存: S3 ({})", bucket_name);
            let client = create_s3_client(region, endpoint_url.as_deref()).await;
            Arc::new(S3ImageStorage::new(
                client,
                bucket_name.clone(),
                public_base_url,
            ))
        }
        ImageStorageConfig::Noop => {
            tracing::info!("画像保存: Noop（画像付きサインアップは拒否される）");
            Arc::new(NoopImageStorage)
        }
    }
}

/// 資格情報が揃っているプロバイダだけクライアントを作る
fn create_oauth_clients(config: &UserServiceConfig) -> anyhow::Result<Vec<Arc<dyn OAuthClient>>> {
    let http = reqwest::Client::new();
    let mut clients: Vec<Arc<dyn OAuthClient>> = Vec::new();

    if let Some(credentials) = &config.google {
        clients.push(Arc::new(GoogleOAuthClient::new(
            http.clone(),
            credentials.clone(),
        )?));
        tracing::info!("OAuth: Google を有効化しました");
    }
    if let Some(credentials) = &config.facebook {
        clients.push(Arc::new(FacebookOAuthClient::new(
            http.clone(),
            credentials.clone(),
        )?));
        tracing::info!("OAuth: Facebook を有効化しました");
    }

    Ok(clients)
}
