//! # NGE Core
//!
//! NGE 거래 엔진 클라이언트의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 워크스페이스 전반에서 사용되는 기본 타입을 제공합니다:
//! - 주문 및 주문 방향 타입, 입력 검증
//! - 계정 자격증명 (identity / 비밀번호 / API 키)
//! - 설정 관리
//! - 로깅 인프라
//! - 비밀번호 암호화 저장 (shadowing)

pub mod config;
pub mod crypto;
pub mod domain;
pub mod error;
pub mod logging;

pub use config::*;
pub use crypto::{generate_master_key, CredentialEncryptor, CryptoError, PasswordShadow, ShadowedPassword};
pub use domain::*;
pub use error::*;
pub use logging::*;
