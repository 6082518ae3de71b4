//! # Warble User Service
//!
//! ユーザーアカウントを管理する HTTP サービス。
//!
//! サインアップ、メールアドレス確認、パスワードログイン、OAuth ログイン、
//! ユーザー参照と削除を提供する。
//!
//! 統合テストと OpenAPI 生成バイナリから参照できるよう、モジュールを公開する。

pub mod app;
pub mod config;
pub mod error;
pub mod handler;
pub mod openapi;
pub mod usecase;
