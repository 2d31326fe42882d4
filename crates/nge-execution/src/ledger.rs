//! 클라이언트별 주문 장부.

use std::collections::HashMap;

use nge_core::Order;
use serde::Serialize;

/// 클라이언트 하나의 주문 장부.
///
/// 제출된 주문은 `in_queue`에 있다가 최종 상태 결과를 받으면 `finished`로 이동합니다.
#[derive(Debug, Default)]
pub struct ClientLedger {
    in_queue: HashMap<String, Order>,
    finished: HashMap<String, Order>,
}

impl ClientLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 제출된 주문 기록.
    pub fn enqueue(&mut self, key: impl Into<String>, order: Order) {
        self.in_queue.insert(key.into(), order);
    }

    /// 주문을 완료로 이동. 이미 완료된 주문이면 최신 내용만 반영하고 `false`.
    pub fn finish(&mut self, key: &str, order: Order) -> bool {
        self.in_queue.remove(key);
        self.finished.insert(key.to_string(), order).is_none()
    }

    /// 대기 중인 주문 제거 (제출 실패).
    pub fn drop_queued(&mut self, key: &str) -> Option<Order> {
        self.in_queue.remove(key)
    }

    pub fn is_queued(&self, key: &str) -> bool {
        self.in_queue.contains_key(key)
    }

    pub fn is_finished(&self, key: &str) -> bool {
        self.finished.contains_key(key)
    }

    /// 현재 장부 요약.
    pub fn snapshot(&self) -> LedgerSnapshot {
        let mut in_queue: Vec<String> = self.in_queue.keys().cloned().collect();
        let mut finished: Vec<String> = self.finished.keys().cloned().collect();
        in_queue.sort();
        finished.sort();

        LedgerSnapshot { in_queue, finished }
    }
}

/// 장부 요약 (정렬된 상관 키 목록).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LedgerSnapshot {
    pub in_queue: Vec<String>,
    pub finished: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_moves_order() {
        let mut ledger = ClientLedger::new();
        ledger.enqueue("a", Order::default());
        ledger.enqueue("b", Order::default());

        assert!(ledger.finish("a", Order::default()));
        assert!(!ledger.is_queued("a"));
        assert!(ledger.is_finished("a"));

        let snapshot = ledger.snapshot();
        assert_eq!(snapshot.in_queue, vec!["b".to_string()]);
        assert_eq!(snapshot.finished, vec!["a".to_string()]);
    }

    #[test]
    fn test_finish_is_idempotent() {
        let mut ledger = ClientLedger::new();
        ledger.enqueue("a", Order::default());

        assert!(ledger.finish("a", Order::default()));
        assert!(!ledger.finish("a", Order::default()));
        assert_eq!(ledger.snapshot().finished.len(), 1);
    }

    #[test]
    fn test_drop_queued() {
        let mut ledger = ClientLedger::new();
        ledger.enqueue("a", Order::default());

        assert!(ledger.drop_queued("a").is_some());
        assert!(ledger.drop_queued("a").is_none());
        assert_eq!(ledger.snapshot(), LedgerSnapshot::default());
    }
}
