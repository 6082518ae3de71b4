//! UserRepository 統合テスト
//!
//! データベースを使用したテスト。sqlx::test マクロがテストごとに
//! データベースを作成し、マイグレーションを適用する。
//!
//! 実行方法:
//! ```bash
//! DATABASE_URL=postgres://localhost/warble cargo test -p warble-infra --test user_repository_test
//! ```

use chrono::{DateTime, Duration, Utc};
use pretty_assertions::assert_eq;
use sqlx::PgPool;
use warble_domain::{
    oauth::{OAuthIdentity, OAuthProvider},
    password::PasswordHash,
    user::{Email, FullName, ImageUrl, NewUser, UserId, Username, VerifyCode},
};
use warble_infra::repository::{
    PostgresUserRepository,
    UserRepository,
    user_repository::{EMAIL_CONSTRAINT, OAUTH_CONSTRAINT, USERNAME_CONSTRAINT},
};

fn now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

fn signup(username: &str, email: &str) -> NewUser {
    NewUser::signup(
        FullName::new("Test User").unwrap(),
        Username::new(username).unwrap(),
        Email::new(email).unwrap(),
        PasswordHash::new("$argon2id$v=19$m=65536,t=1,p=1$dGVzdA$dGVzdA"),
        Some(ImageUrl::new("https://cdn.example.com/users/images/a.png")),
        VerifyCode::new("abc123XYZ").unwrap(),
        now(),
    )
}

fn oauth_user(username: &str, email: &str, subject: &str) -> NewUser {
    NewUser::from_oauth(
        FullName::new("OAuth User").unwrap(),
        Username::new(username).unwrap(),
        Email::new(email).unwrap(),
        OAuthIdentity::new(OAuthProvider::Google, subject),
        now(),
    )
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_insertしたユーザーをidで取得できる(pool: PgPool) {
    let repo = PostgresUserRepository::new(pool);

    let created = repo
        .insert(&signup("alice", "alice@example.com"))
        .await
        .unwrap();
    let found = repo.find_by_id(&created.id()).await.unwrap();

    assert_eq!(found, Some(created.clone()));
    assert_eq!(created.username().as_str(), "alice");
    assert!(!created.is_verified());
    assert!(created.can_login_with_password());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_ユーザー名とメールアドレスで検索できる(pool: PgPool) {
    let repo = PostgresUserRepository::new(pool);
    let created = repo
        .insert(&signup("alice", "alice@example.com"))
        .await
        .unwrap();

    let by_username = repo
        .find_by_username(&Username::new("alice").unwrap())
        .await
        .unwrap();
    let by_email = repo
        .find_by_email(&Email::new("alice@example.com").unwrap())
        .await
        .unwrap();
    let missing = repo
        .find_by_email(&Email::new("nobody@example.com").unwrap())
        .await
        .unwrap();

    assert_eq!(by_username.map(|u| u.id()), Some(created.id()));
    assert_eq!(by_email.map(|u| u.id()), Some(created.id()));
    assert!(missing.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_find_by_loginはユーザー名とメールアドレスのどちらにも一致する(pool: PgPool) {
    let repo = PostgresUserRepository::new(pool);
    let created = repo
        .insert(&signup("alice", "alice@example.com"))
        .await
        .unwrap();

    for login in ["alice", "alice@example.com"] {
        let found = repo.find_by_login(login).await.unwrap();
        assert_eq!(found.map(|u| u.id()), Some(created.id()), "login={login}");
    }
    assert!(repo.find_by_login("bob").await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_重複したユーザー名は制約名付きのconflict(pool: PgPool) {
    let repo = PostgresUserRepository::new(pool);
    repo.insert(&signup("alice", "alice@example.com"))
        .await
        .unwrap();

    let err = repo
        .insert(&signup("alice", "other@example.com"))
        .await
        .unwrap_err();

    assert_eq!(err.conflict_constraint(), Some(USERNAME_CONSTRAINT));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_重複したメールアドレスは制約名付きのconflict(pool: PgPool) {
    let repo = PostgresUserRepository::new(pool);
    repo.insert(&signup("alice", "alice@example.com"))
        .await
        .unwrap();

    let err = repo
        .insert(&signup("bob", "alice@example.com"))
        .await
        .unwrap_err();

    assert_eq!(err.conflict_constraint(), Some(EMAIL_CONSTRAINT));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_find_allはid昇順で返す(pool: PgPool) {
    let repo = PostgresUserRepository::new(pool);
    repo.insert(&signup("bob", "bob@example.com")).await.unwrap();
    repo.insert(&signup("alice", "alice@example.com"))
        .await
        .unwrap();

    let users = repo.find_all().await.unwrap();
    let usernames: Vec<_> = users.iter().map(|u| u.username().as_str()).collect();

    assert_eq!(usernames, vec!["bob", "alice"]);
    assert!(users[0].id().as_i64() < users[1].id().as_i64());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_mark_verifiedで確認コードが消える(pool: PgPool) {
    let repo = PostgresUserRepository::new(pool);
    let created = repo
        .insert(&signup("alice", "alice@example.com"))
        .await
        .unwrap();
    let later = now() + Duration::minutes(5);

    let updated = repo.mark_verified(&created.id(), later).await.unwrap();
    let found = repo.find_by_id(&created.id()).await.unwrap().unwrap();

    assert!(updated);
    assert!(found.is_verified());
    assert_eq!(found.updated_at(), later);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_存在しないユーザーの更新と削除はfalse(pool: PgPool) {
    let repo = PostgresUserRepository::new(pool);
    let missing = UserId::new(9999).unwrap();

    assert!(!repo.mark_verified(&missing, now()).await.unwrap());
    assert!(!repo.delete(&missing).await.unwrap());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_oauthユーザーはパスワードなしで確認済み(pool: PgPool) {
    let repo = PostgresUserRepository::new(pool);
    let identity = OAuthIdentity::new(OAuthProvider::Google, "109876543210");

    let created = repo
        .insert(&oauth_user("carol", "carol@gmail.com", "109876543210"))
        .await
        .unwrap();
    let found = repo.find_by_oauth(&identity).await.unwrap().unwrap();

    assert_eq!(found.id(), created.id());
    assert!(found.is_verified());
    assert!(!found.can_login_with_password());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_同じoauth_idの二重登録はconflict(pool: PgPool) {
    let repo = PostgresUserRepository::new(pool);
    repo.insert(&oauth_user("carol", "carol@gmail.com", "1"))
        .await
        .unwrap();

    let err = repo
        .insert(&oauth_user("carol2", "carol2@gmail.com", "1"))
        .await
        .unwrap_err();

    assert_eq!(err.conflict_constraint(), Some(OAUTH_CONSTRAINT));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_link_oauthで既存ユーザーに紐付けて確認済みにする(pool: PgPool) {
    let repo = PostgresUserRepository::new(pool);
    let created = repo
        .insert(&signup("alice", "alice@example.com"))
        .await
        .unwrap();
    let identity = OAuthIdentity::new(OAuthProvider::Facebook, "10001");

    let linked = repo
        .link_oauth(&created.id(), &identity, now())
        .await
        .unwrap();
    let found = repo.find_by_oauth(&identity).await.unwrap().unwrap();

    assert!(linked);
    assert_eq!(found.id(), created.id());
    assert!(found.is_verified());
    assert!(found.can_login_with_password());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_削除したユーザーは取得できない(pool: PgPool) {
    let repo = PostgresUserRepository::new(pool);
    let created = repo
        .insert(&signup("alice", "alice@example.com"))
        .await
        .unwrap();

    assert!(repo.delete(&created.id()).await.unwrap());
    assert!(repo.find_by_id(&created.id()).await.unwrap().is_none());
}
