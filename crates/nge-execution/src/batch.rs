//! 일괄 주문 생성.
//!
//! - 고정 모드: 모든 주문이 지정한 가격/수량을 사용
//! - 랜덤 모드: 지정하지 않은 가격은 `base ± k·tick` (k ∈ [-10, 10]),
//!   지정하지 않은 수량은 `[base, max]` 구간에서 균등 추출
//! - 양방향 모드: 가격/수량 쌍마다 매수와 매도를 함께 생성

use nge_core::{NgeResult, Order, OrderSide, ValidationError};
use rand::Rng;
use rust_decimal::Decimal;

/// 랜덤 가격 이동 최대 틱 수.
const MAX_TICK_OFFSET: i64 = 10;

/// 랜덤 가격 구간.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceRange {
    pub base: Decimal,
    pub tick: Decimal,
}

impl Default for PriceRange {
    fn default() -> Self {
        Self {
            base: Decimal::new(5050, 0),
            tick: Decimal::new(1, 2),
        }
    }
}

/// 랜덤 수량 구간.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeRange {
    pub base: i64,
    pub max: i64,
}

impl Default for VolumeRange {
    fn default() -> Self {
        Self { base: 1, max: 10 }
    }
}

/// 일괄 주문 생성 설정.
#[derive(Debug, Clone)]
pub struct BatchSpec {
    pub symbol: String,
    pub price: Option<Decimal>,
    /// 부호 있는 수량 (방향 미지정 시 부호로 방향 결정)
    pub volume: Option<i64>,
    pub side: Option<OrderSide>,
    pub price_range: PriceRange,
    pub volume_range: VolumeRange,
    pub random: bool,
    pub both_side: bool,
    pub count: usize,
}

impl BatchSpec {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            price: None,
            volume: None,
            side: None,
            price_range: PriceRange::default(),
            volume_range: VolumeRange::default(),
            random: false,
            both_side: false,
            count: 1,
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.count == 0 {
            return Err(ValidationError::InvalidRange(
                "order count should be positive".to_string(),
            ));
        }
        self.total()?;

        if self.random {
            if self.price.is_none() && self.price_range.tick <= Decimal::ZERO {
                return Err(ValidationError::InvalidRange(format!(
                    "price tick should be positive: {}",
                    self.price_range.tick
                )));
            }
            if self.volume.is_none() {
                let VolumeRange { base, max } = self.volume_range;
                if base <= 0 || max < base {
                    return Err(ValidationError::InvalidRange(format!(
                        "volume range [{}, {}] is invalid",
                        base, max
                    )));
                }
            }
        }

        Ok(())
    }

    /// 생성할 전체 주문 수 (양방향이면 두 배).
    fn total(&self) -> Result<usize, ValidationError> {
        let per_pair = if self.both_side { 2 } else { 1 };
        self.count.checked_mul(per_pair).ok_or_else(|| {
            ValidationError::InvalidRange(format!("order count {} is too large", self.count))
        })
    }

    /// 주문 목록 생성. 각 주문은 제출 전 검증(`Order::prepare`)을 통과한 상태입니다.
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> NgeResult<Vec<Order>> {
        self.validate()?;

        let mut orders = Vec::with_capacity(self.total()?);

        for _ in 0..self.count {
            let price = match self.price {
                Some(price) => price,
                None if self.random => self.random_price(rng),
                None => Decimal::ZERO,
            };
            let volume = match self.volume {
                Some(volume) => volume,
                None if self.random => rng.gen_range(self.volume_range.base..=self.volume_range.max),
                None => 0,
            };

            if self.both_side {
                let volume = volume
                    .checked_abs()
                    .ok_or(ValidationError::QuantityOutOfRange(volume))?;
                for side in [OrderSide::Buy, OrderSide::Sell] {
                    orders.push(self.build(Some(side), volume, price)?);
                }
            } else {
                orders.push(self.build(self.side, volume, price)?);
            }
        }

        Ok(orders)
    }

    fn build(&self, side: Option<OrderSide>, volume: i64, price: Decimal) -> NgeResult<Order> {
        let mut order = Order::limit(self.symbol.clone(), side, volume, price);
        order.prepare()?;
        Ok(order)
    }

    /// `base ± k·tick`. 0 이하가 되면 한 틱으로 올립니다.
    fn random_price<R: Rng + ?Sized>(&self, rng: &mut R) -> Decimal {
        let PriceRange { base, tick } = self.price_range;
        let offset = rng.gen_range(-MAX_TICK_OFFSET..=MAX_TICK_OFFSET);
        let price = base + tick * Decimal::from(offset);

        if price <= Decimal::ZERO {
            tick
        } else {
            price
        }
    }
}
