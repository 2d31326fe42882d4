//! 주문 제출 파이프라인.
//!
//! 이 crate는 다음을 제공합니다:
//! - 전체 제출 속도를 제한하는 토큰 버킷
//! - 클라이언트별 미확인(inflight) 주문 한도
//! - 클라이언트별 주문 장부 (대기 / 완료)
//! - 주문 제출 및 결과 라우팅 파이프라인
//! - 일괄 주문 생성
//!
//! # 예제
//!
//! ```rust,ignore
//! use nge_execution::{OrderPipeline, PipelineLimits};
//!
//! let pipeline = OrderPipeline::new(pool, transport, PipelineLimits::default());
//! let ack = pipeline.submit("c1", order, Some(Duration::from_secs(5))).await?;
//! ```

pub mod batch;
pub mod inflight;
pub mod ledger;
pub mod pipeline;
pub mod rate_limiter;

// 주요 타입 재내보내기
pub use batch::{BatchSpec, PriceRange, VolumeRange};
pub use inflight::InflightTracker;
pub use ledger::{ClientLedger, LedgerSnapshot};
pub use pipeline::{OrderPipeline, OrderState, PipelineLimits};
pub use rate_limiter::{RateLimiter, RefillPolicy};
