//! NGE 거래 엔진 CLI.
//!
//! 이 crate는 다음 기능을 제공합니다:
//! - 전역 옵션과 설정 병합
//! - 거래 엔진 세션 구성 (REST 클라이언트, 자격증명 풀, 주문 파이프라인)
//! - 로그인 / 설정 출력 / 주문 조회 / 주문 생성 명령
//! - 주문 결과 JSON 출력

pub mod commands;
pub mod output;
pub mod session;
pub mod settings;

pub use session::Session;
pub use settings::GlobalArgs;
