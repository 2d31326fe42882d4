//! NGE 클라이언트의 에러 타입.
//!
//! 자격증명 풀, 주문 파이프라인, CLI 전반에서 공유되는 에러 분류를 정의합니다.

use thiserror::Error;

use crate::crypto::CryptoError;

/// 주문/계정 입력 검증 에러.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// 심볼 누락
    #[error("symbol can't be empty")]
    EmptySymbol,

    /// 가격이 0 이하
    #[error("order price should be positive")]
    NonPositivePrice,

    /// 수량이 0
    #[error("order quantity can't be ZERO")]
    ZeroQuantity,

    /// 절대값을 표현할 수 없는 수량
    #[error("order quantity {0} is out of range")]
    QuantityOutOfRange(i64),

    /// 주문 방향과 수량 부호 불일치
    #[error("order side {side} mismatch with quantity {quantity}")]
    SideMismatch { side: String, quantity: i64 },

    /// 이미 제출된 클라이언트 주문 ID
    #[error("duplicate client order id: {0}")]
    DuplicateOrderId(String),

    /// 알 수 없는 주문 방향
    #[error("invalid order side: {0}")]
    InvalidSide(String),

    /// identity 형식 오류 (이메일/휴대폰 번호가 아님)
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    /// 시간 형식 오류
    #[error("invalid time {0}, expected format: YYYY-MM-DD HH:MM:SS")]
    InvalidTime(String),

    /// 잘못된 범위 설정
    #[error("invalid range: {0}")]
    InvalidRange(String),
}

/// 핵심 에러.
#[derive(Debug, Error)]
pub enum NgeError {
    /// 설정 에러 (자격증명 풀 구성 실패 포함)
    #[error("설정 에러: {0}")]
    Config(String),

    /// 명령행 인자와 저장된 로그인 정보 모두 없음
    #[error("no auth info found either in cli args or saved auths for host {0}")]
    AuthMissing(String),

    /// 로그인 / API 키 조회 실패
    #[error("인증 에러: {0}")]
    Auth(String),

    /// 제출 속도 한도 초과 (타임아웃 내 토큰 획득 실패)
    #[error("order submission rate exceeded")]
    RateExceeded,

    /// 클라이언트별 미확인 주문 한도 초과
    #[error("inflight orders exceeded for client {client_id} (max {capacity})")]
    InflightExceeded { client_id: String, capacity: usize },

    /// 거래소 응답 변환 실패
    #[error("변환 에러: {0}")]
    Conversion(String),

    /// 입력 검증 실패
    #[error("검증 에러: {0}")]
    Validation(#[from] ValidationError),

    /// 암호화/복호화 실패
    #[error("암호화 에러: {0}")]
    Crypto(#[from] CryptoError),

    /// 거래 엔진 통신 실패
    #[error("전송 에러: {0}")]
    Transport(String),

    /// 파일 입출력 실패
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),

    /// 직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),
}

/// NGE 작업을 위한 Result 타입.
pub type NgeResult<T> = Result<T, NgeError>;

impl NgeError {
    /// 재시도 가능한 에러인지 확인합니다.
    ///
    /// 용량 관련 에러만 해당하며, 재시도 자체는 호출자의 몫입니다.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            NgeError::RateExceeded | NgeError::InflightExceeded { .. }
        )
    }

    /// 프로세스를 계속할 수 없는 치명적인 에러인지 확인합니다.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            NgeError::Config(_) | NgeError::AuthMissing(_) | NgeError::Auth(_)
        )
    }
}

impl From<serde_json::Error> for NgeError {
    fn from(err: serde_json::Error) -> Self {
        NgeError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for NgeError {
    fn from(err: toml::de::Error) -> Self {
        NgeError::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for NgeError {
    fn from(err: toml::ser::Error) -> Self {
        NgeError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for NgeError {
    fn from(err: config::ConfigError) -> Self {
        NgeError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retryable() {
        assert!(NgeError::RateExceeded.is_retryable());
        assert!(NgeError::InflightExceeded {
            client_id: "c1".to_string(),
            capacity: 5
        }
        .is_retryable());

        let auth_err = NgeError::Auth("login failed".to_string());
        assert!(!auth_err.is_retryable());
    }

    #[test]
    fn test_error_fatal() {
        assert!(NgeError::Config("no valid auth info in file".to_string()).is_fatal());
        assert!(NgeError::AuthMissing("trade".to_string()).is_fatal());
        assert!(!NgeError::RateExceeded.is_fatal());
        assert!(!NgeError::from(ValidationError::ZeroQuantity).is_fatal());
    }

    #[test]
    fn test_validation_messages() {
        assert_eq!(
            ValidationError::EmptySymbol.to_string(),
            "symbol can't be empty"
        );
        assert_eq!(
            ValidationError::ZeroQuantity.to_string(),
            "order quantity can't be ZERO"
        );
    }
}
