//! 주문 제출 속도 제한.
//!
//! Token Bucket 알고리즘 기반으로 전체 제출 속도를 제한합니다.
//! 버킷은 가득 찬 상태로 시작하며, 리필은 토큰 요청 시점에 경과 시간으로 계산합니다.

use std::time::Duration;

use nge_core::{NgeError, NgeResult, PipelineConfig};
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, trace};

/// 토큰 리필 정책.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefillPolicy {
    /// 리필 없음. `release`로 반환된 토큰만 재사용됩니다.
    Never,
    /// `every` 간격마다 `tokens`개 리필 (용량 초과분은 버림)
    Interval { every: Duration, tokens: u32 },
}

impl RefillPolicy {
    /// 설정에서 리필 정책 생성. 간격이 0이면 리필하지 않습니다.
    pub fn from_config(config: &PipelineConfig) -> Self {
        if config.refill_interval_ms == 0 || config.refill_amount == 0 {
            RefillPolicy::Never
        } else {
            RefillPolicy::Interval {
                every: Duration::from_millis(config.refill_interval_ms),
                tokens: config.refill_amount,
            }
        }
    }
}

impl Default for RefillPolicy {
    fn default() -> Self {
        RefillPolicy::Interval {
            every: Duration::from_secs(1),
            tokens: 200,
        }
    }
}

/// Token Bucket 상태.
#[derive(Debug)]
struct TokenBucket {
    /// 현재 토큰 수
    tokens: u32,
    /// 최대 토큰 수 (버킷 용량)
    capacity: u32,
    /// 마지막 리필 시간
    last_refill: Instant,
    policy: RefillPolicy,
}

impl TokenBucket {
    fn new(capacity: u32, policy: RefillPolicy) -> Self {
        Self {
            tokens: capacity,
            capacity,
            last_refill: Instant::now(),
            policy,
        }
    }

    /// 토큰 리필. 경과한 간격 수만큼만 반영하고 나머지 시간은 다음 계산으로 넘깁니다.
    fn refill(&mut self, now: Instant) {
        let RefillPolicy::Interval { every, tokens } = self.policy else {
            return;
        };
        if every.is_zero() {
            return;
        }

        let elapsed = now.saturating_duration_since(self.last_refill);
        let periods = (elapsed.as_nanos() / every.as_nanos()) as u64;
        if periods == 0 {
            return;
        }

        let added = periods.saturating_mul(tokens as u64);
        self.tokens = (self.tokens as u64 + added).min(self.capacity as u64) as u32;
        self.last_refill += every * periods.min(u32::MAX as u64) as u32;
    }

    /// 토큰 소비 시도.
    fn try_acquire(&mut self, now: Instant) -> bool {
        self.refill(now);

        if self.tokens > 0 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }

    /// 다음 리필 시각. 리필하지 않는 정책이면 `None`.
    fn next_refill(&self) -> Option<Instant> {
        match self.policy {
            RefillPolicy::Interval { every, .. } if !every.is_zero() => {
                Some(self.last_refill + every)
            }
            _ => None,
        }
    }

    fn put_back(&mut self, n: u32) {
        self.tokens = self.tokens.saturating_add(n).min(self.capacity);
    }
}

/// 전체 제출 속도 제한기.
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
    released: Notify,
}

impl RateLimiter {
    /// 용량 `capacity`의 가득 찬 버킷으로 생성.
    pub fn new(capacity: u32, policy: RefillPolicy) -> Self {
        Self {
            bucket: Mutex::new(TokenBucket::new(capacity, policy)),
            released: Notify::new(),
        }
    }

    /// 설정으로 생성.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.rate_capacity, RefillPolicy::from_config(config))
    }

    /// 토큰 하나를 획득합니다.
    ///
    /// 토큰이 없으면 리필 또는 반환을 기다리며, `deadline`이 지나면
    /// `NgeError::RateExceeded`를 반환합니다. `None`이면 무기한 대기합니다.
    pub async fn acquire(&self, deadline: Option<Instant>) -> NgeResult<()> {
        loop {
            // 반환 알림을 놓치지 않도록 잠금 전에 등록
            let released = self.released.notified();
            tokio::pin!(released);
            released.as_mut().enable();

            let now = Instant::now();
            let next_refill = {
                let mut bucket = self.bucket.lock().await;
                if bucket.try_acquire(now) {
                    trace!(remaining = bucket.tokens, "rate token acquired");
                    return Ok(());
                }
                bucket.next_refill()
            };

            if deadline.is_some_and(|deadline| deadline <= now) {
                debug!("rate token wait timed out");
                return Err(NgeError::RateExceeded);
            }

            tokio::select! {
                biased;
                _ = &mut released => {}
                _ = sleep_until(next_refill) => {}
                _ = sleep_until(deadline) => {
                    if !self.try_acquire_now().await {
                        debug!("rate token wait timed out");
                        return Err(NgeError::RateExceeded);
                    }
                    return Ok(());
                }
            }
        }
    }

    async fn try_acquire_now(&self) -> bool {
        self.bucket.lock().await.try_acquire(Instant::now())
    }

    /// 토큰 반환 (용량 초과분은 버림).
    pub async fn release(&self, n: u32) {
        if n == 0 {
            return;
        }
        self.bucket.lock().await.put_back(n);
        self.released.notify_waiters();
    }

    /// 현재 사용 가능한 토큰 수 (리필 반영).
    pub async fn available(&self) -> u32 {
        let mut bucket = self.bucket.lock().await;
        bucket.refill(Instant::now());
        bucket.tokens
    }

    /// 버킷 용량.
    pub async fn capacity(&self) -> u32 {
        self.bucket.lock().await.capacity
    }
}

/// 지정 시각까지 대기. `None`이면 끝나지 않습니다.
async fn sleep_until(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_bucket_starts_full() {
        let limiter = RateLimiter::new(3, RefillPolicy::Never);
        for _ in 0..3 {
            limiter.acquire(None).await.unwrap();
        }
        assert_eq!(limiter.available().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_times_out_without_refill() {
        let limiter = RateLimiter::new(1, RefillPolicy::Never);
        limiter.acquire(None).await.unwrap();

        let deadline = Instant::now() + Duration::from_millis(50);
        let result = limiter.acquire(Some(deadline)).await;
        assert!(matches!(result, Err(NgeError::RateExceeded)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_after_interval() {
        let limiter = RateLimiter::new(
            2,
            RefillPolicy::Interval {
                every: Duration::from_secs(1),
                tokens: 1,
            },
        );
        limiter.acquire(None).await.unwrap();
        limiter.acquire(None).await.unwrap();

        let start = Instant::now();
        limiter.acquire(None).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(1));

        // 3초가 지나도 용량 이상으로 쌓이지 않음
        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(limiter.available().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_wakes_waiter() {
        let limiter = std::sync::Arc::new(RateLimiter::new(1, RefillPolicy::Never));
        limiter.acquire(None).await.unwrap();

        let waiter = {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.acquire(None).await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        limiter.release(1).await;
        waiter.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_release_is_capped() {
        let limiter = RateLimiter::new(2, RefillPolicy::Never);
        limiter.release(10).await;
        assert_eq!(limiter.available().await, 2);
    }

    #[test]
    fn test_policy_from_config() {
        let mut config = PipelineConfig::default();
        assert_eq!(
            RefillPolicy::from_config(&config),
            RefillPolicy::Interval {
                every: Duration::from_millis(1000),
                tokens: 200
            }
        );

        config.refill_interval_ms = 0;
        assert_eq!(RefillPolicy::from_config(&config), RefillPolicy::Never);
    }
}
