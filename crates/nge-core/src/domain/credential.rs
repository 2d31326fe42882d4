//! 계정 자격증명.
//!
//! 한 계정은 identity, 암호화된 비밀번호, API 키/시크릿으로 구성됩니다.
//! identity가 비어 있으면 API 키 전용 계정입니다.

use secrecy::{ExposeSecret, SecretString};

use crate::crypto::ShadowedPassword;

/// API 키와 시크릿.
#[derive(Debug, Clone)]
pub struct ApiKey {
    pub key: String,
    pub secret: SecretString,
}

impl ApiKey {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: SecretString::from(secret.into()),
        }
    }

    /// 키와 시크릿이 모두 채워져 있는지 확인합니다.
    pub fn is_complete(&self) -> bool {
        !self.key.is_empty() && !self.secret.expose_secret().is_empty()
    }
}

impl Default for ApiKey {
    fn default() -> Self {
        Self::new("", "")
    }
}

/// 계정 자격증명.
#[derive(Debug, Clone, Default)]
pub struct Credential {
    /// 로그인 identity (이메일 또는 휴대폰 번호), API 키 전용 계정이면 빈 문자열
    pub identity: String,
    /// 암호화된 비밀번호
    pub password: ShadowedPassword,
    /// API 키
    pub api_key: ApiKey,
}

impl Credential {
    pub fn new(identity: impl Into<String>, password: ShadowedPassword, api_key: ApiKey) -> Self {
        Self {
            identity: identity.into(),
            password,
            api_key,
        }
    }

    /// API 키 전용 자격증명.
    pub fn api_only(api_key: ApiKey) -> Self {
        Self {
            api_key,
            ..Default::default()
        }
    }

    /// 자격증명 완결성 검증.
    ///
    /// 비밀번호가 있으면 identity가 필수이고, 없으면 API 키와 시크릿이 모두 필요합니다.
    pub fn is_valid(&self) -> bool {
        if self.password.is_set() {
            !self.identity.is_empty()
        } else {
            self.api_key.is_complete()
        }
    }

    /// 익명(API 키 전용) 자격증명 여부.
    pub fn is_anonymous(&self) -> bool {
        self.identity.is_empty()
    }
}
