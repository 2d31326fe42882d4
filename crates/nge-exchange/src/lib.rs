//! NGE 거래 엔진 연결.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - `Authenticator` / `OrderTransport` trait: 로그인과 주문 전송 인터페이스
//! - `RawOrder`: 엔진 주문 응답 (와이어 형식) 및 도메인 `Order` 변환
//! - `AuthContext`: 요청 인가 정보
//! - REST 커넥터 (HMAC-SHA256 서명)

pub mod connector;
pub mod error;
pub mod model;
pub mod traits;

pub use connector::{NgeRestClient, NgeRestConfig};
pub use error::*;
pub use model::*;
pub use traits::*;
