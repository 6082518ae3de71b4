//! # ユーザーユースケース
//!
//! サインアップ・メールアドレス確認・ログイン・参照・削除を実装する。
//!
//! ## タイミング攻撃対策
//!
//! ログインでは、ユーザーが存在しない場合やパスワードを持たない場合も
//! ダミーハッシュで検証を実行し、処理時間を均一化する。失敗理由はログにだけ残し、
//! クライアントには常に同じ文言を返す。

use std::sync::Arc;

use warble_domain::{
    clock::Clock,
    password::PlainPassword,
    user::{Email, FullName, ImageUrl, NewUser, UserId, UserProfile, Username, VerifyCode},
};
use warble_infra::{
    AccessToken,
    ImageStorage,
    ImageUpload,
    InfraError,
    PasswordHasher,
    TokenIssuer,
    VerifyCodeGenerator,
    repository::{
        UserRepository,
        user_repository::{EMAIL_CONSTRAINT, USERNAME_CONSTRAINT},
    },
};
use warble_shared::{event_log::event, log_business_event};

use super::VerificationMailer;
use crate::error::ApiError;

const USERNAME_IN_USE: &str = "Username in use";
const EMAIL_IN_USE: &str = "Email in use";
const USER_NOT_FOUND: &str = "User not found";
const INVALID_CODE: &str = "Invalid code";
const INCORRECT_LOGIN: &str = "Incorrect login details";

/// サインアップの入力
#[derive(Debug)]
pub struct SignupInput {
    pub full_name: String,
    pub username:  String,
    pub email:     String,
    pub password:  String,
    /// クライアントが指定した画像 URL
    pub image_url: Option<String>,
    /// アップロードされた画像（`image_url` より優先）
    pub image:     Option<ImageUpload>,
}

/// プロフィールと発行したトークン
#[derive(Debug, Clone)]
pub struct AuthenticatedProfile {
    pub profile: UserProfile,
    pub token:   AccessToken,
}

/// ユーザーユースケースの実装
pub struct UserUseCaseImpl {
    user_repository: Arc<dyn UserRepository>,
    password_hasher: Arc<dyn PasswordHasher>,
    token_issuer:    Arc<dyn TokenIssuer>,
    code_generator:  Arc<dyn VerifyCodeGenerator>,
    image_storage:   Arc<dyn ImageStorage>,
    mailer:          Arc<VerificationMailer>,
    clock:           Arc<dyn Clock>,
}

impl UserUseCaseImpl {
    pub fn new(
        user_repository: Arc<dyn UserRepository>,
        password_hasher: Arc<dyn PasswordHasher>,
        token_issuer: Arc<dyn TokenIssuer>,
        code_generator: Arc<dyn VerifyCodeGenerator>,
        image_storage: Arc<dyn ImageStorage>,
        mailer: Arc<VerificationMailer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            user_repository,
            password_hasher,
            token_issuer,
            code_generator,
            image_storage,
            mailer,
            clock,
        }
    }

    /// 全ユーザーのプロフィール（ID 昇順）
    pub async fn list_users(&self) -> Result<Vec<UserProfile>, ApiError> {
        let users = self.user_repository.find_all().await?;
        Ok(users.iter().map(|u| u.profile()).collect())
    }

    /// パスワードでユーザーを登録し、トークンを発行する
    ///
    /// 確認メールはバックグラウンドで送る。
    ///
    /// # Errors
    ///
    /// - 入力値が不正: `Validation`
    /// - ユーザー名・メールアドレスが使用済み: `Conflict`
    /// - 画像を保存できない: `BadRequest`
    pub async fn signup(&self, input: SignupInput) -> Result<AuthenticatedProfile, ApiError> {
        let full_name = FullName::new(input.full_name)?;
        let username = Username::new(input.username)?;
        let email = Email::new(input.email)?;
        let password = PlainPassword::for_signup(input.password)?;

        if self
            .user_repository
            .find_by_username(&username)
            .await?
            .is_some()
        {
            return Err(ApiError::Conflict(USERNAME_IN_USE.to_string()));
        }
        if self.user_repository.find_by_email(&email).await?.is_some() {
            return Err(ApiError::Conflict(EMAIL_IN_USE.to_string()));
        }

        let verify_code = self.code_generator.generate()?;
        let password_hash = self.password_hasher.hash(&password)?;

        // アップロードは INSERT の直前に行う
        let image = match (input.image, input.image_url) {
            (Some(upload), _) => Some(self.store_image(&upload).await?),
            (None, Some(url)) => Some(ImageUrl::new(url)),
            (None, None) => None,
        };

        let new_user = NewUser::signup(
            full_name,
            username,
            email,
            password_hash,
            image,
            verify_code,
            self.clock.now(),
        );
        let user = self
            .user_repository
            .insert(&new_user)
            .await
            .map_err(map_insert_error)?;

        let token = self.token_issuer.issue(&user.id())?;

        match self.mailer.verification_for(&user) {
            Ok(Some(email)) => self.mailer.spawn_send(email),
            Ok(None) => {}
            Err(e) => tracing::error!(error = %e, "確認メールを組み立てられません"),
        }

        log_business_event!(
            event.category = event::category::USER,
            event.action = event::action::USER_SIGNED_UP,
            event.entity_type = event::entity_type::USER,
            event.entity_id = %user.id(),
            event.result = event::result::SUCCESS,
            "ユーザーを登録"
        );

        Ok(AuthenticatedProfile {
            profile: user.profile(),
            token,
        })
    }

    /// 確認コードでメールアドレスを確認済みにする
    ///
    /// 確認済みのユーザーには保留中のコードが無いので、どのコードでも `BadRequest`。
    ///
    /// # Errors
    ///
    /// - メールアドレスのユーザーがいない: `NotFound`
    /// - コードが一致しない: `BadRequest`
    pub async fn verify_email(&self, email: &str, code: &str) -> Result<(), ApiError> {
        let user = match Email::new(email) {
            Ok(email) => self.user_repository.find_by_email(&email).await?,
            Err(_) => None,
        }
        .ok_or_else(|| ApiError::NotFound(USER_NOT_FOUND.to_string()))?;

        let matches = VerifyCode::new(code)
            .map(|code| user.matches_verify_code(&code))
            .unwrap_or(false);
        if !matches {
            return Err(ApiError::BadRequest(INVALID_CODE.to_string()));
        }

        if !self
            .user_repository
            .mark_verified(&user.id(), self.clock.now())
            .await?
        {
            return Err(ApiError::NotFound(USER_NOT_FOUND.to_string()));
        }

        log_business_event!(
            event.category = event::category::USER,
            event.action = event::action::EMAIL_VERIFIED,
            event.entity_type = event::entity_type::USER,
            event.entity_id = %user.id(),
            event.result = event::result::SUCCESS,
            "メールアドレスを確認"
        );

        Ok(())
    }

    /// ユーザー名またはメールアドレスとパスワードでログインする
    ///
    /// # Errors
    ///
    /// 失敗理由に関わらず `BadRequest("Incorrect login details")`
    pub async fn login(&self, login: &str, password: &str) -> Result<AuthenticatedProfile, ApiError> {
        let password = PlainPassword::new(password);
        let user = self.user_repository.find_by_login(login).await?;

        let Some(user) = user else {
            self.password_hasher.dummy_verify(&password);
            return Err(login_failed("user_not_found"));
        };
        let Some(hash) = user.password_hash() else {
            self.password_hasher.dummy_verify(&password);
            return Err(login_failed("no_password"));
        };
        if !self.password_hasher.verify(&password, hash)?.is_match() {
            return Err(login_failed("password_mismatch"));
        }

        let token = self.token_issuer.issue(&user.id())?;

        log_business_event!(
            event.category = event::category::AUTH,
            event.action = event::action::LOGIN_SUCCESS,
            event.entity_type = event::entity_type::USER,
            event.entity_id = %user.id(),
            event.result = event::result::SUCCESS,
            "ログイン成功"
        );

        Ok(AuthenticatedProfile {
            profile: user.profile(),
            token,
        })
    }

    /// ID でユーザーを取得する
    pub async fn find_user(&self, id: UserId) -> Result<UserProfile, ApiError> {
        self.user_repository
            .find_by_id(&id)
            .await?
            .map(|u| u.profile())
            .ok_or_else(|| ApiError::NotFound(USER_NOT_FOUND.to_string()))
    }

    /// ユーザーを削除する
    ///
    /// 削除できるのは自分のアカウントだけ。
    ///
    /// # Errors
    ///
    /// - 他人のアカウント: `Forbidden`
    /// - 存在しない: `NotFound`
    pub async fn delete_user(&self, actor: UserId, target: UserId) -> Result<(), ApiError> {
        if actor != target {
            return Err(ApiError::Forbidden(
                "You can only delete your own account".to_string(),
            ));
        }

        if !self.user_repository.delete(&target).await? {
            return Err(ApiError::NotFound(USER_NOT_FOUND.to_string()));
        }

        log_business_event!(
            event.category = event::category::USER,
            event.action = event::action::USER_DELETED,
            event.entity_type = event::entity_type::USER,
            event.entity_id = %target,
            event.actor_id = %actor,
            event.result = event::result::SUCCESS,
            "ユーザーを削除"
        );

        Ok(())
    }

    async fn store_image(&self, upload: &ImageUpload) -> Result<ImageUrl, ApiError> {
        self.image_storage.put_image(upload).await.map_err(|e| {
            match e.invalid_input_message() {
                Some(msg) => ApiError::BadRequest(msg.to_string()),
                None => ApiError::Database(e),
            }
        })
    }
}

/// 一意制約違反を利用者向けの文言に変換する
///
/// 事前チェックと INSERT の間に別リクエストが割り込んだ場合に備える。
fn map_insert_error(err: InfraError) -> ApiError {
    let constraint = err.conflict_constraint().map(str::to_owned);
    match constraint.as_deref() {
        Some(USERNAME_CONSTRAINT) => ApiError::Conflict(USERNAME_IN_USE.to_string()),
        Some(EMAIL_CONSTRAINT) => ApiError::Conflict(EMAIL_IN_USE.to_string()),
        _ => ApiError::Database(err),
    }
}

fn login_failed(reason: &'static str) -> ApiError {
    log_business_event!(
        event.category = event::category::AUTH,
        event.action = event::action::LOGIN_FAILURE,
        event.entity_type = event::entity_type::USER,
        event.result = event::result::FAILURE,
        reason = reason,
        "ログイン失敗"
    );
    ApiError::BadRequest(INCORRECT_LOGIN.to_string())
}
