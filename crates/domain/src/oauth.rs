//! # 外部 ID プロバイダ連携
//!
//! Google / Facebook の OAuth 2.0 認可コードフローで扱う型。
//! プロバイダとの通信は infra 層の `OAuthClient` が担う。

use serde::{Deserialize, Serialize};
use strum::{EnumString, IntoStaticStr};
use thiserror::Error;

use crate::user::{Email, FullName, Username};

/// OAuth プロバイダ
///
/// DB の `oauth_provider` カラムとルートのパスセグメントに小文字で現れる。
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    IntoStaticStr,
    EnumString,
    strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OAuthProvider {
    Google,
    Facebook,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    /// 認可リクエストで要求するスコープ
    pub fn scopes(&self) -> &'static [&'static str] {
        match self {
            Self::Google => &["profile", "email"],
            Self::Facebook => &["email"],
        }
    }
}

/// ユーザーに紐付いた外部 ID
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OAuthIdentity {
    pub provider: OAuthProvider,
    /// プロバイダ側のユーザー ID
    pub subject:  String,
}

impl OAuthIdentity {
    pub fn new(provider: OAuthProvider, subject: impl Into<String>) -> Self {
        Self {
            provider,
            subject: subject.into(),
        }
    }
}

/// 認可コード交換後にプロバイダから得たプロフィール
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthProfile {
    pub provider:     OAuthProvider,
    pub subject:      String,
    pub email:        Option<String>,
    pub display_name: Option<String>,
}

impl OAuthProfile {
    pub fn identity(&self) -> OAuthIdentity {
        OAuthIdentity::new(self.provider, self.subject.clone())
    }

    /// 検証済みのメールアドレス
    ///
    /// プロバイダがメールアドレスを返さなかった場合は [`OAuthError::MissingEmail`]。
    pub fn email(&self) -> Result<Email, OAuthError> {
        let raw = self.email.as_deref().ok_or(OAuthError::MissingEmail)?;
        Email::new(raw).map_err(|e| OAuthError::Profile(e.to_string()))
    }

    /// 新規ユーザーの氏名
    ///
    /// 表示名が無ければメールアドレスのローカル部を使う。
    pub fn full_name(&self, email: &Email) -> Result<FullName, OAuthError> {
        if let Some(name) = self.display_name.as_deref().and_then(|n| FullName::new(n).ok()) {
            return Ok(name);
        }
        FullName::new(email.local_part()).map_err(|e| OAuthError::Profile(e.to_string()))
    }

    /// ユーザー名の候補の元になる文字列
    ///
    /// 表示名（無ければメールのローカル部）から ASCII 英数字だけを取り出して小文字化する。
    /// 重複時の数字サフィックス分を残すため [`USERNAME_SEED_MAX`] 文字で切る。
    pub fn username_seed(&self, email: &Email) -> String {
        let pick = |s: &str| -> String {
            s.chars()
                .filter(char::is_ascii_alphanumeric)
                .map(|c| c.to_ascii_lowercase())
                .take(USERNAME_SEED_MAX)
                .collect()
        };

        let from_name = self.display_name.as_deref().map(pick).unwrap_or_default();
        if !from_name.is_empty() {
            return from_name;
        }
        let from_email = pick(email.local_part());
        if !from_email.is_empty() {
            return from_email;
        }
        "user".to_string()
    }
}

/// ユーザー名候補の最大長（サフィックス込みで [`Username::MAX_LENGTH`] に収まる）
pub const USERNAME_SEED_MAX: usize = Username::MAX_LENGTH - 16;

/// `seed` に試行番号を付けたユーザー名候補
///
/// 0 回目は `seed` そのもの。
pub fn username_candidate(seed: &str, attempt: u32) -> Option<Username> {
    let candidate = if attempt == 0 {
        seed.to_string()
    } else {
        format!("{seed}{attempt}")
    };
    Username::new(candidate).ok()
}

/// OAuth フローのエラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OAuthError {
    /// 認可コードのトークン交換に失敗
    #[error("トークン交換に失敗: {0}")]
    Exchange(String),

    /// プロフィール取得に失敗
    #[error("プロフィール取得に失敗: {0}")]
    Profile(String),

    /// プロバイダがメールアドレスを返さなかった
    #[error("メールアドレスが取得できません")]
    MissingEmail,

    /// state パラメータが Cookie と一致しない
    #[error("state が一致しません")]
    StateMismatch,
}
