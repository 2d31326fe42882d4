//! identity 분류.
//!
//! 로그인 identity는 이메일 또는 휴대폰 번호여야 하며, 종류에 따라 로그인 요청의 키가 달라집니다.

use nge_core::{NgeError, NgeResult, ValidationError};
use nge_exchange::LoginPayload;
use regex::Regex;

/// identity 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKind {
    Email,
    Mobile,
}

impl IdentityKind {
    /// 로그인 요청에서 사용하는 키 이름.
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityKind::Email => "email",
            IdentityKind::Mobile => "mobile",
        }
    }
}

/// identity 정규식 모음.
#[derive(Debug, Clone)]
pub struct IdentityPatterns {
    email: Regex,
    mobile: Regex,
}

impl IdentityPatterns {
    pub fn new() -> NgeResult<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| NgeError::Config(format!("identity pattern: {}", e)))
        };

        Ok(Self {
            email: compile(r"^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9_-]+(\.[a-zA-Z0-9_-]+)*$")?,
            mobile: compile(r"^(\+?[0-9]{2,3})?[0-9-]{6,13}$")?,
        })
    }

    /// identity 종류 판별. 이메일을 먼저 검사합니다.
    pub fn classify(&self, identity: &str) -> Result<IdentityKind, ValidationError> {
        if self.email.is_match(identity) {
            Ok(IdentityKind::Email)
        } else if self.mobile.is_match(identity) {
            Ok(IdentityKind::Mobile)
        } else {
            Err(ValidationError::InvalidIdentity(format!(
                "{} (identity should either be email or mobile)",
                identity
            )))
        }
    }

    /// 비밀번호를 제외한 로그인 요청 본문 생성.
    pub fn login_payload(&self, identity: &str) -> Result<LoginPayload, ValidationError> {
        let kind = self.classify(identity)?;

        let mut payload = LoginPayload::new();
        payload.insert(kind.as_str(), identity);
        payload.insert("type", "account");
        payload.insert("verifyCode", "");

        Ok(payload)
    }
}
