//! # リポジトリ
//!
//! 永続化操作をトレイトで定義し、PostgreSQL 実装を提供する。
//! ユースケース層はトレイト経由で利用するので、テストではモックに差し替えられる。

pub mod user_repository;

pub use user_repository::{PostgresUserRepository, UserRepository};
