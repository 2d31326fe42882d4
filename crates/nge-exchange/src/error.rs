//! 거래 엔진 통신 에러 타입.

use nge_core::NgeError;
use thiserror::Error;

/// 거래 엔진 관련 에러.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// 네트워크/연결 에러
    #[error("Network error: {0}")]
    NetworkError(String),

    /// 인증/권한 에러
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// 엔진 측 요청 한도 초과
    #[error("Rate limit exceeded")]
    RateLimited,

    /// API 에러 코드
    #[error("API error {code}: {message}")]
    ApiError { code: i32, message: String },

    /// 파싱/역직렬화 에러
    #[error("Parse error: {0}")]
    ParseError(String),

    /// 요청 서명 실패
    #[error("Signing error: {0}")]
    SigningError(String),

    /// 타임아웃
    #[error("Request timeout: {0}")]
    Timeout(String),
}

impl ExchangeError {
    /// 재시도 가능한 에러인지 확인.
    ///
    /// 클라이언트는 재시도하지 않지만 호출자 판단을 위해 분류합니다.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExchangeError::NetworkError(_) | ExchangeError::RateLimited | ExchangeError::Timeout(_)
        )
    }

    /// 인증 에러인지 확인.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, ExchangeError::Unauthorized(_))
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExchangeError::Timeout(err.to_string())
        } else if err.is_decode() {
            ExchangeError::ParseError(err.to_string())
        } else {
            ExchangeError::NetworkError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        ExchangeError::ParseError(err.to_string())
    }
}

impl From<ExchangeError> for NgeError {
    fn from(err: ExchangeError) -> Self {
        match err {
            ExchangeError::Unauthorized(msg) => NgeError::Auth(msg),
            other => NgeError::Transport(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(ExchangeError::RateLimited.is_retryable());
        assert!(ExchangeError::Timeout("5s".to_string()).is_retryable());
        assert!(!ExchangeError::Unauthorized("bad key".to_string()).is_retryable());
        assert!(ExchangeError::Unauthorized("bad key".to_string()).is_auth_error());
    }

    #[test]
    fn test_into_core_error() {
        let err: NgeError = ExchangeError::Unauthorized("expired".to_string()).into();
        assert!(matches!(err, NgeError::Auth(_)));

        let err: NgeError = ExchangeError::ApiError {
            code: 400,
            message: "bad request".to_string(),
        }
        .into();
        assert!(matches!(err, NgeError::Transport(msg) if msg.contains("bad request")));
    }
}
