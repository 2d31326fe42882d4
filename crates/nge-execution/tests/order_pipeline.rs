//! 주문 파이프라인 통합 테스트 (모의 인가 공급자 / 전송 계층 사용)

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use nge_core::{ApiKey, NgeError, NgeResult, Order, OrderSide, ValidationError};
use nge_exchange::{
    AuthContext, AuthProvider, ExchangeError, ExchangeResult, OrderQuery, OrderTransport,
    RawOrder, RequestScope,
};
use nge_execution::{OrderPipeline, OrderState, PipelineLimits, RefillPolicy};
use rust_decimal_macros::dec;

// ============================================================================
// 모의 구현
// ============================================================================

/// 계정 A, B를 번갈아 반환하는 공급자.
#[derive(Default)]
struct TwoAccounts {
    cursor: AtomicUsize,
}

#[async_trait]
impl AuthProvider for TwoAccounts {
    async fn next_auth(&self, parent: Option<&RequestScope>) -> NgeResult<AuthContext> {
        let turn = self.cursor.fetch_add(1, Ordering::SeqCst);
        let name = if turn % 2 == 0 { "A" } else { "B" };
        Ok(AuthContext::new(
            name,
            ApiKey::new(format!("key-{}", name), "secret"),
            parent.cloned().unwrap_or_default(),
        ))
    }
}

#[derive(Default)]
struct MockTransport {
    fail: AtomicBool,
    accounts: Mutex<Vec<String>>,
    counter: AtomicUsize,
}

#[async_trait]
impl OrderTransport for MockTransport {
    async fn submit_order(&self, auth: &AuthContext, order: &Order) -> ExchangeResult<RawOrder> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ExchangeError::NetworkError("connection reset".to_string()));
        }
        self.accounts.lock().unwrap().push(auth.identity.clone());

        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let mut ack = RawOrder::from(order);
        ack.order_id = Some(format!("engine-{}", n));
        ack.ord_status = Some("New".to_string());
        Ok(ack)
    }

    async fn fetch_historical_orders(
        &self,
        _auth: &AuthContext,
        _query: &OrderQuery,
    ) -> ExchangeResult<Vec<RawOrder>> {
        Ok(Vec::new())
    }
}

fn limits(max_inflight: usize, rate: u32) -> PipelineLimits {
    PipelineLimits {
        max_inflight_per_client: max_inflight,
        rate_capacity: rate,
        refill: RefillPolicy::Never,
        result_buffer: 64,
    }
}

fn pipeline(limits: PipelineLimits) -> (Arc<OrderPipeline>, Arc<MockTransport>) {
    let transport = Arc::new(MockTransport::default());
    let pipeline = Arc::new(OrderPipeline::new(
        Arc::new(TwoAccounts::default()),
        transport.clone(),
        limits,
    ));
    (pipeline, transport)
}

fn buy(qty: i64) -> Order {
    Order::limit("XBTUSD", None, qty, dec!(5050))
}

fn filled(ack: &RawOrder) -> RawOrder {
    let mut raw = ack.clone();
    raw.ord_status = Some("Filled".to_string());
    raw
}

// ============================================================================
// 제출
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_sixth_submit_blocks_until_resolved() {
    let (pipeline, transport) = pipeline(limits(5, 10));
    let timeout = Some(Duration::from_secs(5));

    let mut acks = Vec::new();
    for _ in 0..3 {
        acks.push(pipeline.submit("c1", buy(1), timeout).await.unwrap());
    }
    assert_eq!(
        *transport.accounts.lock().unwrap(),
        vec!["A".to_string(), "B".to_string(), "A".to_string()]
    );

    for _ in 0..2 {
        acks.push(pipeline.submit("c1", buy(1), timeout).await.unwrap());
    }
    assert_eq!(pipeline.in_flight("c1").await, 5);

    let sixth = {
        let pipeline = pipeline.clone();
        tokio::spawn(async move { pipeline.submit("c1", buy(1), None).await })
    };
    tokio::task::yield_now().await;
    assert!(!sixth.is_finished());

    pipeline.on_result(acks[0].clone()).await;
    let ack = sixth.await.unwrap().unwrap();
    assert!(ack.order_id.is_some());
    assert_eq!(pipeline.in_flight("c1").await, 5);
}

#[tokio::test(start_paused = true)]
async fn test_submit_times_out_when_full() {
    let (pipeline, _) = pipeline(limits(1, 10));
    pipeline.submit("c1", buy(1), None).await.unwrap();

    let err = pipeline
        .submit("c1", buy(1), Some(Duration::from_millis(100)))
        .await
        .unwrap_err();
    assert!(matches!(err, NgeError::InflightExceeded { capacity: 1, .. }));
    assert!(err.is_retryable());

    // 다른 클라이언트는 독립적
    pipeline.submit("c2", buy(1), None).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_rate_exceeded_returns_slot() {
    let (pipeline, _) = pipeline(limits(5, 1));
    pipeline.submit("c1", buy(1), None).await.unwrap();

    let err = pipeline
        .submit("c1", buy(1), Some(Duration::from_millis(100)))
        .await
        .unwrap_err();
    assert!(matches!(err, NgeError::RateExceeded));
    assert_eq!(pipeline.in_flight("c1").await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_client_order_id_keeps_capacity() {
    let (pipeline, transport) = pipeline(limits(2, 10));

    let mut first = buy(1);
    first.cl_ord_id = "dup".to_string();
    let ack = pipeline.submit("c1", first.clone(), None).await.unwrap();

    let err = pipeline.submit("c1", first, None).await.unwrap_err();
    assert!(matches!(
        err,
        NgeError::Validation(ValidationError::DuplicateOrderId(ref key)) if key == "dup"
    ));
    assert_eq!(pipeline.in_flight("c1").await, 1);
    assert_eq!(transport.counter.load(Ordering::SeqCst), 1);

    pipeline.on_result(filled(&ack)).await;
    assert_eq!(pipeline.in_flight("c1").await, 0);
    assert_eq!(
        pipeline.ledger_snapshot("c1").await.unwrap().finished,
        vec!["dup".to_string()]
    );

    // 전체 용량이 그대로 남아 있어야 함
    let timeout = Some(Duration::from_millis(100));
    pipeline.submit("c1", buy(1), timeout).await.unwrap();
    pipeline.submit("c1", buy(1), timeout).await.unwrap();
    assert_eq!(pipeline.in_flight("c1").await, 2);
}

#[tokio::test(start_paused = true)]
async fn test_key_reusable_after_capacity_failure() {
    let (pipeline, _) = pipeline(limits(1, 10));
    pipeline.submit("c1", buy(1), None).await.unwrap();

    let mut order = buy(1);
    order.cl_ord_id = "retry-me".to_string();
    let err = pipeline
        .submit("c1", order.clone(), Some(Duration::from_millis(100)))
        .await
        .unwrap_err();
    assert!(matches!(err, NgeError::InflightExceeded { .. }));

    let ack = pipeline.submit("c2", order, None).await.unwrap();
    assert_eq!(ack.cl_ord_id.as_deref(), Some("retry-me"));
}

#[tokio::test]
async fn test_invalid_order_has_no_side_effects() {
    let (pipeline, transport) = pipeline(limits(5, 10));

    let err = pipeline.submit("c1", buy(0), None).await.unwrap_err();
    assert!(matches!(err, NgeError::Validation(_)));
    assert_eq!(pipeline.in_flight("c1").await, 0);
    assert!(pipeline.ledger_snapshot("c1").await.is_none());
    assert_eq!(transport.counter.load(Ordering::SeqCst), 0);
    assert_eq!(pipeline.available_tokens().await, 10);
}

#[tokio::test]
async fn test_transport_failure_marks_unknown() {
    let (pipeline, transport) = pipeline(limits(5, 10));
    transport.fail.store(true, Ordering::SeqCst);

    let mut order = buy(2);
    order.cl_ord_id = "my-order".to_string();
    let err = pipeline.submit("c1", order, None).await.unwrap_err();

    assert!(matches!(err, NgeError::Transport(_)));
    assert_eq!(pipeline.order_state("my-order").await, Some(OrderState::Unknown));
    assert_eq!(pipeline.in_flight("c1").await, 0);
    assert!(pipeline.ledger_snapshot("c1").await.unwrap().in_queue.is_empty());
}

#[tokio::test]
async fn test_generated_correlation_key() {
    let (pipeline, _) = pipeline(limits(5, 10));

    let ack = pipeline.submit("c1", buy(-4), None).await.unwrap();
    let key = ack.cl_ord_id.clone().unwrap();
    assert_eq!(key.len(), 36);

    assert_eq!(pipeline.order_state(&key).await, Some(OrderState::Inflight));
    let order = pipeline.order(&key).await.unwrap();
    assert_eq!(order.side, Some(OrderSide::Sell));
    assert_eq!(order.order_qty, 4);
    assert_eq!(
        pipeline.ledger_snapshot("c1").await.unwrap().in_queue,
        vec![key]
    );
}

// ============================================================================
// 결과 처리
// ============================================================================

#[tokio::test]
async fn test_double_result_releases_once() {
    let (pipeline, _) = pipeline(limits(5, 10));
    let first = pipeline.submit("c1", buy(1), None).await.unwrap();
    pipeline.submit("c1", buy(1), None).await.unwrap();
    assert_eq!(pipeline.in_flight("c1").await, 2);

    pipeline.on_result(first.clone()).await;
    pipeline.on_result(first.clone()).await;
    pipeline.on_result(filled(&first)).await;

    assert_eq!(pipeline.in_flight("c1").await, 1);
}

#[tokio::test]
async fn test_terminal_result_finishes_order() {
    let (pipeline, _) = pipeline(limits(5, 10));
    let mut results = pipeline.results().await.unwrap();
    assert!(pipeline.results().await.is_none());

    let ack = pipeline.submit("c1", buy(1), None).await.unwrap();
    let key = ack.cl_ord_id.clone().unwrap();

    pipeline.on_result(ack.clone()).await;
    pipeline.on_result(filled(&ack)).await;
    pipeline.on_result(filled(&ack)).await;

    assert_eq!(pipeline.order_state(&key).await, Some(OrderState::Finished));
    let snapshot = pipeline.ledger_snapshot("c1").await.unwrap();
    assert!(snapshot.in_queue.is_empty());
    assert_eq!(snapshot.finished, vec![key.clone()]);

    pipeline.close_results().await;
    let mut published = Vec::new();
    while let Some(order) = results.recv().await {
        published.push(order);
    }
    assert_eq!(published.len(), 3);
    assert!(published[2].is_terminal());
}

#[tokio::test]
async fn test_result_routed_by_engine_order_id() {
    let (pipeline, _) = pipeline(limits(5, 10));
    let ack = pipeline.submit("c1", buy(1), None).await.unwrap();
    let key = ack.cl_ord_id.clone().unwrap();
    assert_eq!(pipeline.in_flight("c1").await, 1);

    // 엔진 주문 ID만 있는 갱신
    let mut update = filled(&ack);
    update.cl_ord_id = None;
    pipeline.on_result(update).await;

    assert_eq!(pipeline.in_flight("c1").await, 0);
    assert_eq!(pipeline.order_state(&key).await, Some(OrderState::Finished));
    assert_eq!(
        pipeline.ledger_snapshot("c1").await.unwrap().finished,
        vec![key]
    );
}

#[tokio::test]
async fn test_unknown_client_result_is_published() {
    let (pipeline, _) = pipeline(limits(5, 10));
    let mut results = pipeline.results().await.unwrap();

    let raw = RawOrder {
        order_id: Some("foreign".to_string()),
        symbol: Some("XBTUSD".to_string()),
        side: Some("Buy".to_string()),
        order_qty: Some(1.0),
        ..Default::default()
    };
    pipeline.on_result(raw).await;

    let order = results.recv().await.unwrap();
    assert_eq!(order.order_id, "foreign");
}

#[tokio::test]
async fn test_unconvertible_result_is_dropped() {
    let (pipeline, _) = pipeline(limits(5, 10));
    let mut results = pipeline.results().await.unwrap();
    let ack = pipeline.submit("c1", buy(1), None).await.unwrap();

    let mut broken = ack.clone();
    broken.side = Some("Sideways".to_string());
    pipeline.on_result(broken).await;
    assert_eq!(pipeline.in_flight("c1").await, 1);

    pipeline.close_results().await;
    assert!(results.recv().await.is_none());

    // 종료 후 발행은 폐기되지만 슬롯 반환은 수행
    pipeline.on_result(ack).await;
    assert_eq!(pipeline.in_flight("c1").await, 0);
}
