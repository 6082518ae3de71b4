//! # パスワードハッシュ
//!
//! Argon2id によるハッシュ化と検証。
//!
//! パラメータは RFC 9106 / OWASP 推奨値（Memory 64 MiB、Iterations 1、Parallelism 1）。
//! ソルトは 16 バイトを CSPRNG から生成する。

use argon2::{
    Algorithm,
    Argon2,
    Params,
    PasswordHasher as _,
    PasswordVerifier as _,
    Version,
    password_hash::{PasswordHash as Argon2PasswordHash, SaltString},
};
use rand::RngCore as _;
use warble_domain::password::{PasswordHash, PasswordVerifyResult, PlainPassword};

use crate::InfraError;

/// ユーザーが存在しない場合のタイミング揃え用ハッシュ（有効な Argon2id 形式）
const DUMMY_HASH: &str = "$argon2id$v=19$m=65536,t=1,p=1$AAAAAAAAAAAAAAAAAAAAAA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// パスワードのハッシュ化と検証を担当するトレイト
pub trait PasswordHasher: Send + Sync {
    /// # Errors
    ///
    /// Argon2 の内部エラー（通常は発生しない）
    fn hash(&self, password: &PlainPassword) -> Result<PasswordHash, InfraError>;

    /// # Errors
    ///
    /// 保存されたハッシュの形式が不正な場合
    fn verify(
        &self,
        password: &PlainPassword,
        hash: &PasswordHash,
    ) -> Result<PasswordVerifyResult, InfraError>;

    /// ダミーハッシュで検証を行い、結果は捨てる
    ///
    /// ユーザーが存在しない・パスワードを持たない場合に呼び、応答時間を揃える。
    fn dummy_verify(&self, password: &PlainPassword) {
        let _ = self.verify(password, &PasswordHash::new(DUMMY_HASH));
    }
}

/// Argon2id 実装
pub struct Argon2PasswordHasher {
    argon2: Argon2<'static>,
}

impl Argon2PasswordHasher {
    pub fn new() -> Self {
        let params = Params::new(
            65536, // memory (KiB) = 64 MiB
            1,     // iterations
            1,     // parallelism
            None,
        )
        .expect("Argon2 パラメータが不正です");

        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }
}

impl Default for Argon2PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordHasher for Argon2PasswordHasher {
    fn hash(&self, password: &PlainPassword) -> Result<PasswordHash, InfraError> {
        let mut salt_bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| InfraError::unexpected(format!("ソルト生成に失敗: {e}")))?;

        let hash = self
            .argon2
            .hash_password(password.as_str().as_bytes(), &salt)
            .map_err(|e| InfraError::unexpected(format!("パスワードのハッシュ化に失敗: {e}")))?;

        Ok(PasswordHash::new(hash.to_string()))
    }

    fn verify(
        &self,
        password: &PlainPassword,
        hash: &PasswordHash,
    ) -> Result<PasswordVerifyResult, InfraError> {
        let parsed = Argon2PasswordHash::new(hash.as_str())
            .map_err(|e| InfraError::unexpected(format!("不正なハッシュ形式: {e}")))?;

        let matched = self
            .argon2
            .verify_password(password.as_str().as_bytes(), &parsed)
            .is_ok();

        Ok(PasswordVerifyResult::from(matched))
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn hasher() -> Argon2PasswordHasher {
        Argon2PasswordHasher::new()
    }

    #[rstest]
    fn test_ハッシュはargon2id形式で平文を含まない(hasher: Argon2PasswordHasher) {
        let hash = hasher.hash(&PlainPassword::new("correct horse")).unwrap();

        assert!(hash.as_str().starts_with("$argon2id$v=19$m=65536,t=1,p=1$"));
        assert!(!hash.as_str().contains("correct horse"));
    }

    #[rstest]
    fn test_同じパスワードでもソルトが異なる(hasher: Argon2PasswordHasher) {
        let password = PlainPassword::new("secret1");

        let first = hasher.hash(&password).unwrap();
        let second = hasher.hash(&password).unwrap();

        assert_ne!(first, second);
    }

    #[rstest]
    fn test_ハッシュ化したパスワードを検証できる(hasher: Argon2PasswordHasher) {
        let hash = hasher.hash(&PlainPassword::new("secret1")).unwrap();

        assert!(
            hasher
                .verify(&PlainPassword::new("secret1"), &hash)
                .unwrap()
                .is_match()
        );
        assert!(
            !hasher
                .verify(&PlainPassword::new("secret2"), &hash)
                .unwrap()
                .is_match()
        );
    }

    #[rstest]
    fn test_不正なハッシュ形式はエラー(hasher: Argon2PasswordHasher) {
        let result = hasher.verify(
            &PlainPassword::new("secret1"),
            &PasswordHash::new("not-a-valid-hash"),
        );

        assert!(result.is_err());
    }

    #[rstest]
    fn test_ダミーハッシュは有効な形式(hasher: Argon2PasswordHasher) {
        let result = hasher.verify(&PlainPassword::new("anything"), &PasswordHash::new(DUMMY_HASH));

        assert_eq!(result.unwrap(), PasswordVerifyResult::Mismatch);
    }
}
