//! API 요청 서명.
//!
//! 서명 대상 문자열: `VERB + path[?query] + expires + body`
//! 서명 값: API 시크릿을 키로 한 HMAC-SHA256의 hex 문자열

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::ExchangeError;

type HmacSha256 = Hmac<Sha256>;

/// 서명 유효 시간 (초).
pub const SIGNATURE_TTL_SECS: i64 = 60;

/// 요청 서명.
pub fn sign_request(
    secret: &str,
    verb: &str,
    path_and_query: &str,
    expires: i64,
    body: &str,
) -> Result<String, ExchangeError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ExchangeError::SigningError(e.to_string()))?;

    mac.update(verb.as_bytes());
    mac.update(path_and_query.as_bytes());
    mac.update(expires.to_string().as_bytes());
    mac.update(body.as_bytes());

    Ok(hex::encode(mac.finalize().into_bytes()))
}
