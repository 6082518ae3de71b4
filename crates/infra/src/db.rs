//! # データベース接続管理
//!
//! PostgreSQL への接続プールとマイグレーション。
//!
//! - プールは起動時に 1 度だけ作り、`Clone` で各リポジトリに共有する
//! - マイグレーションはワークスペース直下の `migrations/` をバイナリに埋め込む

use std::time::Duration;

use sqlx::{PgPool, postgres::PgPoolOptions};

/// 最大同時接続数
pub const MAX_CONNECTIONS: u32 = 10;

/// 接続取得のタイムアウト
pub const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// 接続プールを作成する
///
/// # Errors
///
/// 接続文字列が不正、または DB に到達できない場合。
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(database_url)
        .await
}

/// 未適用のマイグレーションを適用する
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(pool).await
}

/// Readiness Check 用の疎通確認（`SELECT 1`）
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
}
