//! # メールアドレス確認コード生成

use rand::{Rng as _, distr::Alphanumeric};
use warble_domain::user::VerifyCode;

use crate::InfraError;

/// 生成するコードの長さ
pub const VERIFY_CODE_LENGTH: usize = 32;

/// 確認コードを生成するトレイト
pub trait VerifyCodeGenerator: Send + Sync {
    fn generate(&self) -> Result<VerifyCode, InfraError>;
}

/// スレッドローカル CSPRNG から英数字 32 文字を生成する
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomVerifyCodeGenerator;

impl VerifyCodeGenerator for RandomVerifyCodeGenerator {
    fn generate(&self) -> Result<VerifyCode, InfraError> {
        let code: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(VERIFY_CODE_LENGTH)
            .map(char::from)
            .collect();

        VerifyCode::new(code).map_err(|e| InfraError::unexpected(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_英数字32文字のコードを生成する() {
        let code = RandomVerifyCodeGenerator.generate().unwrap();

        assert_eq!(code.as_str().len(), VERIFY_CODE_LENGTH);
        assert!(code.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_毎回異なるコードを生成する() {
        let first = RandomVerifyCodeGenerator.generate().unwrap();
        let second = RandomVerifyCodeGenerator.generate().unwrap();

        assert_ne!(first, second);
    }
}
