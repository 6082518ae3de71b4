//! # パスワード
//!
//! | 型 | ドメイン用語 | 用途 |
//! |---|------------|------|
//! | [`PlainPassword`] | 平文パスワード | サインアップ・ログイン時の入力値 |
//! | [`PasswordHash`] | パスワードハッシュ | 永続化用の Argon2id PHC 文字列 |
//! | [`PasswordVerifyResult`] | 検証結果 | パスワード検証の成否 |

use crate::DomainError;

/// 平文パスワード
///
/// Debug 出力では値をマスクする。
#[derive(Clone)]
pub struct PlainPassword(String);

impl std::fmt::Debug for PlainPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PlainPassword").field(&"[REDACTED]").finish()
    }
}

impl PlainPassword {
    /// サインアップ時の最小文字数
    pub const MIN_SIGNUP_LENGTH: usize = 6;

    /// 検証なしで作成する（ログイン時の入力値）
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// サインアップ用に作成する
    ///
    /// [`MIN_SIGNUP_LENGTH`](Self::MIN_SIGNUP_LENGTH) 文字未満は `Validation` エラー。
    pub fn for_signup(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.chars().count() < Self::MIN_SIGNUP_LENGTH {
            return Err(DomainError::Validation(format!(
                "パスワードは {} 文字以上である必要があります",
                Self::MIN_SIGNUP_LENGTH
            )));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// パスワードハッシュ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// パスワード検証結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordVerifyResult {
    Match,
    Mismatch,
}

impl PasswordVerifyResult {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match)
    }
}

impl From<bool> for PasswordVerifyResult {
    fn from(matched: bool) -> Self {
        if matched { Self::Match } else { Self::Mismatch }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_平文パスワードのdebug出力はマスクされる() {
        let password = PlainPassword::new("hunter22");
        let debug = format!("{password:?}");

        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("hunter22"));
    }

    #[rstest]
    #[case("secret", true)]
    #[case("a-much-longer-passphrase", true)]
    #[case("12345", false)]
    #[case("", false)]
    fn test_サインアップ用パスワードは6文字以上(#[case] input: &str, #[case] ok: bool) {
        assert_eq!(PlainPassword::for_signup(input).is_ok(), ok);
    }

    #[test]
    fn test_文字数は文字単位で数える() {
        assert!(PlainPassword::for_signup("ぱすわーどだ").is_ok());
    }

    #[rstest]
    #[case(true, PasswordVerifyResult::Match)]
    #[case(false, PasswordVerifyResult::Mismatch)]
    fn test_boolから検証結果に変換できる(
        #[case] input: bool,
        #[case] expected: PasswordVerifyResult,
    ) {
        assert_eq!(PasswordVerifyResult::from(input), expected);
        assert_eq!(expected.is_match(), input);
    }
}
