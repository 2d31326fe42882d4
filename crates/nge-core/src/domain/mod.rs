//! NGE 클라이언트 도메인 모델.

mod credential;
mod order;

pub use credential::*;
pub use order::*;
