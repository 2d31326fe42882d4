//! 계정 자격증명 관리.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - `IdentityPatterns`: identity 분류 (이메일 / 휴대폰 번호) 및 로그인 요청 생성
//! - `CredentialStore`: 호스트별 로그인 정보 저장 (비밀번호는 암호화 상태로만 저장)
//! - `load_credentials`: CSV 자격증명 파일 로드 및 행 단위 검증
//! - `CredentialPool`: 라운드 로빈 자격증명 풀 및 인가 컨텍스트 캐시

pub mod identity;
pub mod loader;
pub mod pool;
pub mod store;

pub use identity::{IdentityKind, IdentityPatterns};
pub use loader::{load_credentials, read_credentials, RejectedRow, MAX_POOL_SIZE};
pub use pool::{CredentialPool, PoolSource};
pub use store::{CredentialStore, SavedLogin};
