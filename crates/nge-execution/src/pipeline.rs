//! 주문 제출 파이프라인.
//!
//! 제공 기능:
//! - 클라이언트별 inflight 한도와 전체 속도 제한을 거친 주문 제출
//! - 상관 키(클라이언트 주문 ID) 부여 및 주문 상태 추적
//! - 엔진 결과를 제출한 클라이언트로 라우팅
//! - 결과 스트림 발행

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use nge_core::{order_span, NgeResult, Order, PipelineConfig, ValidationError};
use nge_exchange::{AuthProvider, OrderTransport, RawOrder, RequestScope};
use serde::Serialize;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::inflight::InflightTracker;
use crate::ledger::{ClientLedger, LedgerSnapshot};
use crate::rate_limiter::{RateLimiter, RefillPolicy};

/// 주문 추적 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OrderState {
    /// 기록되었으나 엔진 접수 전
    Queued,
    /// 엔진이 접수함
    Inflight,
    /// 최종 상태 결과 수신
    Finished,
    /// 제출 실패로 상태를 알 수 없음
    Unknown,
}

/// 파이프라인 한도 설정.
#[derive(Debug, Clone)]
pub struct PipelineLimits {
    /// 클라이언트별 최대 미확인 주문 수
    pub max_inflight_per_client: usize,
    /// 속도 제한 버킷 용량
    pub rate_capacity: u32,
    /// 속도 제한 리필 정책
    pub refill: RefillPolicy,
    /// 결과 스트림 버퍼 크기
    pub result_buffer: usize,
}

impl Default for PipelineLimits {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

impl PipelineLimits {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            max_inflight_per_client: config.max_inflight_per_client,
            rate_capacity: config.rate_capacity,
            refill: RefillPolicy::from_config(config),
            result_buffer: config.result_buffer.max(1),
        }
    }
}

/// 추적 중인 주문.
#[derive(Debug, Clone)]
struct TrackedOrder {
    order: Order,
    state: OrderState,
    /// 첫 결과(확인 응답) 수신 여부. 슬롯 반환은 한 번만 수행됩니다.
    acked: bool,
}

/// 주문 제출 파이프라인.
pub struct OrderPipeline {
    auth: Arc<dyn AuthProvider>,
    transport: Arc<dyn OrderTransport>,
    limits: PipelineLimits,

    rate: RateLimiter,
    inflight: InflightTracker,

    // ==== 전역 캐시 ====
    /// 상관 키별 주문
    orders: RwLock<HashMap<String, TrackedOrder>>,
    /// 상관 키 → 클라이언트
    owners: RwLock<HashMap<String, String>>,
    /// 엔진 주문 ID → 상관 키
    aliases: RwLock<HashMap<String, String>>,
    /// 클라이언트별 장부
    ledgers: RwLock<HashMap<String, Arc<Mutex<ClientLedger>>>>,

    // ==== 결과 스트림 ====
    results_tx: RwLock<Option<mpsc::Sender<Order>>>,
    results_rx: Mutex<Option<mpsc::Receiver<Order>>>,
}

impl OrderPipeline {
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        transport: Arc<dyn OrderTransport>,
        limits: PipelineLimits,
    ) -> Self {
        let (tx, rx) = mpsc::channel(limits.result_buffer.max(1));

        Self {
            auth,
            transport,
            rate: RateLimiter::new(limits.rate_capacity, limits.refill),
            inflight: InflightTracker::new(limits.max_inflight_per_client),
            limits,
            orders: RwLock::new(HashMap::new()),
            owners: RwLock::new(HashMap::new()),
            aliases: RwLock::new(HashMap::new()),
            ledgers: RwLock::new(HashMap::new()),
            results_tx: RwLock::new(Some(tx)),
            results_rx: Mutex::new(Some(rx)),
        }
    }

    pub fn limits(&self) -> &PipelineLimits {
        &self.limits
    }

    // ========================================================================
    // 제출
    // ========================================================================

    /// 주문 제출.
    ///
    /// `timeout`은 슬롯 대기와 토큰 대기 전체에 걸친 하나의 기한입니다.
    /// `None` 또는 0이면 무기한 대기합니다. 엔진의 접수 응답을 반환합니다.
    ///
    /// 이미 사용된 클라이언트 주문 ID는 슬롯을 잡기 전에 거부합니다.
    pub async fn submit(
        &self,
        client_id: &str,
        mut order: Order,
        timeout: Option<Duration>,
    ) -> NgeResult<RawOrder> {
        order.prepare()?;

        if order.cl_ord_id.is_empty() {
            order.cl_ord_id = Uuid::new_v4().to_string();
        }
        let key = order.cl_ord_id.clone();
        self.claim(client_id, &key).await?;

        let deadline = timeout
            .filter(|timeout| !timeout.is_zero())
            .map(|timeout| Instant::now() + timeout);

        if let Err(e) = self.inflight.reserve(client_id, deadline).await {
            self.unclaim(&key).await;
            return Err(e);
        }
        if let Err(e) = self.rate.acquire(deadline).await {
            self.inflight.release(client_id).await;
            self.unclaim(&key).await;
            return Err(e);
        }

        let span = order_span!("submit", client_id, key);
        self.dispatch(client_id, key.clone(), order)
            .instrument(span)
            .await
    }

    async fn dispatch(&self, client_id: &str, key: String, order: Order) -> NgeResult<RawOrder> {
        self.record(client_id, &key, &order).await;

        let scope = RequestScope::root().child(client_id);
        let auth = match self.auth.next_auth(Some(&scope)).await {
            Ok(auth) => auth,
            Err(e) => {
                warn!(error = %e, "인가 컨텍스트 획득 실패");
                self.abandon(client_id, &key).await;
                return Err(e);
            }
        };

        debug!(account = auth.display_name(), "주문 전송");
        match self.transport.submit_order(&auth, &order).await {
            Ok(mut ack) => {
                // 접수 응답은 제출한 키로 라우팅
                if ack.cl_ord_id.as_deref().map_or(true, str::is_empty) {
                    ack.cl_ord_id = Some(key.clone());
                }
                if let Some(order_id) = ack.order_id.as_deref().filter(|id| !id.is_empty()) {
                    self.aliases
                        .write()
                        .await
                        .entry(order_id.to_string())
                        .or_insert_with(|| key.clone());
                }
                if let Some(tracked) = self.orders.write().await.get_mut(&key) {
                    if tracked.state == OrderState::Queued {
                        tracked.state = OrderState::Inflight;
                    }
                }
                info!(order_id = ack.order_id.as_deref().unwrap_or(""), "주문 접수");
                Ok(ack)
            }
            Err(e) => {
                warn!(error = %e, "주문 전송 실패");
                self.abandon(client_id, &key).await;
                Err(e.into())
            }
        }
    }

    /// 상관 키를 클라이언트 소유로 등록. 이미 등록된 키면 거부합니다.
    async fn claim(&self, client_id: &str, key: &str) -> NgeResult<()> {
        match self.owners.write().await.entry(key.to_string()) {
            Entry::Occupied(_) => {
                warn!(client = %client_id, key = %key, "중복 클라이언트 주문 ID 거부");
                Err(ValidationError::DuplicateOrderId(key.to_string()).into())
            }
            Entry::Vacant(entry) => {
                entry.insert(client_id.to_string());
                Ok(())
            }
        }
    }

    /// 제출 전에 실패한 주문의 키 등록 해제.
    async fn unclaim(&self, key: &str) {
        self.owners.write().await.remove(key);
    }

    /// 주문을 전역 캐시와 클라이언트 장부에 기록.
    async fn record(&self, client_id: &str, key: &str, order: &Order) {
        self.orders.write().await.insert(
            key.to_string(),
            TrackedOrder {
                order: order.clone(),
                state: OrderState::Queued,
                acked: false,
            },
        );

        let ledger = self.ledger(client_id).await;
        ledger.lock().await.enqueue(key, order.clone());
    }

    /// 제출 실패 처리: 상태를 Unknown으로, 대기열에서 제거, 슬롯 반환.
    async fn abandon(&self, client_id: &str, key: &str) {
        let release = match self.orders.write().await.get_mut(key) {
            Some(tracked) => {
                tracked.state = OrderState::Unknown;
                !std::mem::replace(&mut tracked.acked, true)
            }
            None => true,
        };

        if let Some(ledger) = self.existing_ledger(client_id).await {
            ledger.lock().await.drop_queued(key);
        }

        if release {
            self.inflight.release(client_id).await;
        }
    }

    async fn ledger(&self, client_id: &str) -> Arc<Mutex<ClientLedger>> {
        if let Some(ledger) = self.existing_ledger(client_id).await {
            return ledger;
        }

        self.ledgers
            .write()
            .await
            .entry(client_id.to_string())
            .or_default()
            .clone()
    }

    async fn existing_ledger(&self, client_id: &str) -> Option<Arc<Mutex<ClientLedger>>> {
        self.ledgers.read().await.get(client_id).cloned()
    }

    // ========================================================================
    // 결과 처리
    // ========================================================================

    /// 엔진 결과 처리.
    ///
    /// 주문별 첫 결과에서만 inflight 슬롯을 반환하고, 최종 상태면 장부를 완료로 옮긴 뒤
    /// 결과 스트림에 발행합니다.
    pub async fn on_result(&self, raw: RawOrder) {
        let order = match Order::try_from(&raw) {
            Ok(order) => order,
            Err(e) => {
                let payload = serde_json::to_string(&raw).unwrap_or_default();
                warn!(error = %e, payload = %payload, "결과 변환 실패, 폐기");
                return;
            }
        };

        let Some((key, client_id)) = self.owner_of(&order).await else {
            warn!(
                cl_ord_id = %order.cl_ord_id,
                order_id = %order.order_id,
                "결과의 클라이언트를 찾을 수 없음"
            );
            self.publish(order).await;
            return;
        };

        let terminal = order.is_terminal();
        let first_result = match self.orders.write().await.get_mut(&key) {
            Some(tracked) => {
                tracked.order = order.clone();
                if terminal {
                    tracked.state = OrderState::Finished;
                } else if tracked.state == OrderState::Queued {
                    tracked.state = OrderState::Inflight;
                }
                !std::mem::replace(&mut tracked.acked, true)
            }
            None => false,
        };

        if first_result {
            self.inflight.release(&client_id).await;
        }

        if terminal {
            let ledger = self.ledger(&client_id).await;
            if ledger.lock().await.finish(&key, order.clone()) {
                debug!(client = %client_id, key = %key, "주문 완료");
            }
        }

        self.publish(order).await;
    }

    /// 결과의 상관 키와 클라이언트 조회.
    ///
    /// 클라이언트 주문 ID, 접수 응답에서 기록한 엔진 주문 ID, 엔진 주문 ID 자체 순으로 찾습니다.
    async fn owner_of(&self, order: &Order) -> Option<(String, String)> {
        let aliased = match order.order_id.as_str() {
            "" => None,
            order_id => self.aliases.read().await.get(order_id).cloned(),
        };

        let owners = self.owners.read().await;
        let owner = [Some(&order.cl_ord_id), aliased.as_ref(), Some(&order.order_id)]
            .into_iter()
            .flatten()
            .filter(|key| !key.is_empty())
            .find_map(|key| owners.get(key).map(|client| (key.clone(), client.clone())));
        owner
    }

    async fn publish(&self, order: Order) {
        let Some(tx) = self.results_tx.read().await.clone() else {
            warn!(key = order.correlation_key().unwrap_or(""), "결과 스트림 종료됨, 폐기");
            return;
        };

        if tx.send(order).await.is_err() {
            warn!("결과 수신자 없음, 폐기");
        }
    }

    /// 결과 스트림 수신자. 한 번만 반환됩니다.
    pub async fn results(&self) -> Option<mpsc::Receiver<Order>> {
        self.results_rx.lock().await.take()
    }

    /// 결과 스트림 종료. 수신자는 남은 결과를 읽은 뒤 종료됩니다.
    pub async fn close_results(&self) {
        if self.results_tx.write().await.take().is_some() {
            debug!("결과 스트림 종료");
        }
    }

    // ========================================================================
    // 조회
    // ========================================================================

    /// 상관 키로 최신 주문 조회.
    pub async fn order(&self, key: &str) -> Option<Order> {
        self.orders
            .read()
            .await
            .get(key)
            .map(|tracked| tracked.order.clone())
    }

    /// 상관 키로 주문 상태 조회.
    pub async fn order_state(&self, key: &str) -> Option<OrderState> {
        self.orders.read().await.get(key).map(|tracked| tracked.state)
    }

    /// 클라이언트 장부 요약.
    pub async fn ledger_snapshot(&self, client_id: &str) -> Option<LedgerSnapshot> {
        let ledger = self.existing_ledger(client_id).await?;
        let snapshot = ledger.lock().await.snapshot();
        Some(snapshot)
    }

    /// 클라이언트가 점유 중인 inflight 슬롯 수.
    pub async fn in_flight(&self, client_id: &str) -> usize {
        self.inflight.in_flight(client_id).await
    }

    /// 현재 사용 가능한 속도 제한 토큰 수.
    pub async fn available_tokens(&self) -> u32 {
        self.rate.available().await
    }
}

impl std::fmt::Debug for OrderPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderPipeline")
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

