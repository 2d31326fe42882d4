//! 클라이언트별 미확인(inflight) 주문 한도.
//!
//! 클라이언트마다 세마포어를 지연 생성하며, 확인 응답을 받을 때까지 슬롯을 점유합니다.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use nge_core::{NgeError, NgeResult};
use tokio::sync::{RwLock, Semaphore};
use tokio::time::Instant;
use tracing::{trace, warn};

/// 클라이언트 하나의 슬롯.
#[derive(Debug)]
struct ClientSlots {
    semaphore: Semaphore,
    held: AtomicUsize,
}

impl ClientSlots {
    fn new(capacity: usize) -> Self {
        Self {
            semaphore: Semaphore::new(capacity),
            held: AtomicUsize::new(0),
        }
    }
}

/// 클라이언트별 inflight 슬롯 관리자.
#[derive(Debug)]
pub struct InflightTracker {
    capacity: usize,
    clients: RwLock<HashMap<String, Arc<ClientSlots>>>,
}

impl InflightTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// 클라이언트별 최대 슬롯 수.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    async fn slots(&self, client_id: &str) -> Arc<ClientSlots> {
        if let Some(slots) = self.clients.read().await.get(client_id) {
            return slots.clone();
        }

        self.clients
            .write()
            .await
            .entry(client_id.to_string())
            .or_insert_with(|| Arc::new(ClientSlots::new(self.capacity)))
            .clone()
    }

    /// 슬롯 하나를 점유합니다.
    ///
    /// 빈 슬롯이 없으면 기다리며, `deadline`이 지나면 `NgeError::InflightExceeded`.
    pub async fn reserve(&self, client_id: &str, deadline: Option<Instant>) -> NgeResult<()> {
        let slots = self.slots(client_id).await;
        let exceeded = || NgeError::InflightExceeded {
            client_id: client_id.to_string(),
            capacity: self.capacity,
        };

        let permit = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, slots.semaphore.acquire())
                .await
                .map_err(|_| exceeded())?,
            None => slots.semaphore.acquire().await,
        }
        .map_err(|_| exceeded())?;

        // 슬롯은 release 호출로만 반환
        permit.forget();
        let held = slots.held.fetch_add(1, Ordering::AcqRel) + 1;
        trace!(client = client_id, held, "inflight slot reserved");

        Ok(())
    }

    /// 슬롯 하나를 반환합니다. 점유한 슬롯이 없으면 아무 일도 하지 않고 `false`.
    pub async fn release(&self, client_id: &str) -> bool {
        let Some(slots) = self.clients.read().await.get(client_id).cloned() else {
            warn!(client = client_id, "release for unknown client ignored");
            return false;
        };

        let released = slots
            .held
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |held| held.checked_sub(1))
            .is_ok();

        if released {
            slots.semaphore.add_permits(1);
            trace!(client = client_id, "inflight slot released");
        } else {
            warn!(client = client_id, "release without held slot ignored");
        }

        released
    }

    /// 클라이언트가 점유 중인 슬롯 수.
    pub async fn in_flight(&self, client_id: &str) -> usize {
        self.clients
            .read()
            .await
            .get(client_id)
            .map(|slots| slots.held.load(Ordering::Acquire))
            .unwrap_or(0)
    }
}
