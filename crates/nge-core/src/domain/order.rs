//! 주문 타입 및 검증.
//!
//! 이 모듈은 NGE 거래 엔진과 주고받는 주문 관련 타입을 정의합니다:
//! - `OrderSide` - 주문 방향 (매수/매도)
//! - `Order` - 주문 엔티티 (엔진 필드 전체)
//! - `check_symbol` / `check_price` / `check_quantity` - 입력 검증

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// 최종 상태로 취급하는 주문 상태 문자열.
pub const TERMINAL_STATUS: &str = "Filled";

/// 주문 방향 (매수 또는 매도).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    /// 매수
    Buy,
    /// 매도
    Sell,
}

impl OrderSide {
    /// 반대 방향을 반환합니다.
    pub fn opposite(&self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }

    /// 방향 부호 (매수 1, 매도 -1).
    pub fn value(&self) -> i64 {
        match self {
            OrderSide::Buy => 1,
            OrderSide::Sell => -1,
        }
    }

    /// 지정된 방향과 수량 부호로 최종 주문 방향을 결정합니다.
    ///
    /// - 수량 0은 항상 에러
    /// - 방향 미지정: 양수면 매수, 음수면 매도
    /// - 매수 + 음수 수량은 불일치 에러
    /// - 매도는 부호와 무관하게 매도
    pub fn resolve(side: Option<OrderSide>, quantity: i64) -> Result<OrderSide, ValidationError> {
        check_quantity(quantity)?;

        match side {
            None if quantity > 0 => Ok(OrderSide::Buy),
            None => Ok(OrderSide::Sell),
            Some(OrderSide::Buy) if quantity < 0 => Err(ValidationError::SideMismatch {
                side: OrderSide::Buy.to_string(),
                quantity,
            }),
            Some(side) => Ok(side),
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "Buy"),
            OrderSide::Sell => write!(f, "Sell"),
        }
    }
}

impl std::str::FromStr for OrderSide {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Buy" | "buy" => Ok(OrderSide::Buy),
            "Sell" | "sell" => Ok(OrderSide::Sell),
            other => Err(ValidationError::InvalidSide(other.to_string())),
        }
    }
}

/// 심볼 검증.
pub fn check_symbol(symbol: &str) -> Result<(), ValidationError> {
    if symbol.trim().is_empty() {
        return Err(ValidationError::EmptySymbol);
    }
    Ok(())
}

/// 가격 검증 (양수).
pub fn check_price(price: Decimal) -> Result<(), ValidationError> {
    if price <= Decimal::ZERO {
        return Err(ValidationError::NonPositivePrice);
    }
    Ok(())
}

/// 수량 검증 (0 불가, 절대값이 `i64` 범위 안이어야 함).
pub fn check_quantity(quantity: i64) -> Result<(), ValidationError> {
    if quantity == 0 {
        return Err(ValidationError::ZeroQuantity);
    }
    if quantity == i64::MIN {
        return Err(ValidationError::QuantityOutOfRange(quantity));
    }
    Ok(())
}

/// 주문 엔티티.
///
/// 엔진이 반환하는 필드를 모두 포함하며, JSON 출력 시 엔진과 같은 camelCase 키를 사용합니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Order {
    /// 엔진이 부여한 주문 ID
    #[serde(rename = "orderID")]
    pub order_id: String,
    /// 클라이언트 주문 ID (결과 라우팅 키)
    #[serde(rename = "clOrdID", skip_serializing_if = "String::is_empty", default)]
    pub cl_ord_id: String,
    #[serde(rename = "clOrdLinkID", skip_serializing_if = "String::is_empty", default)]
    pub cl_ord_link_id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub account: Option<i64>,
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub side: Option<OrderSide>,
    /// 주문 수량 (부호 없는 계약 수, 방향은 `side`)
    pub order_qty: i64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub display_qty: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub stop_px: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub peg_offset_value: Option<Decimal>,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub peg_price_type: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub currency: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub settl_currency: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub ord_type: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub time_in_force: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub exec_inst: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub contingency_type: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub ex_destination: String,
    /// 주문 상태 (자유 형식, `"Filled"`만 최종 상태)
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub ord_status: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub triggered: String,
    #[serde(default)]
    pub working_indicator: bool,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub ord_rej_reason: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub leaves_qty: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cum_qty: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub avg_px: Option<Decimal>,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub multi_leg_reporting_type: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub transact_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Order {
    /// 지정가 주문 생성.
    ///
    /// `quantity`는 부호를 가질 수 있으며, 방향 결정은 [`Order::prepare`]에서 수행합니다.
    pub fn limit(
        symbol: impl Into<String>,
        side: Option<OrderSide>,
        quantity: i64,
        price: Decimal,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            order_qty: quantity,
            price: Some(price),
            ord_type: "Limit".to_string(),
            ..Default::default()
        }
    }

    /// 제출 전 검증 및 정규화.
    ///
    /// 심볼, 가격, 수량을 검증하고 방향을 확정한 뒤 수량을 절대값으로 바꿉니다.
    pub fn prepare(&mut self) -> Result<(), ValidationError> {
        check_symbol(&self.symbol)?;
        if let Some(price) = self.price {
            check_price(price)?;
        }

        let side = OrderSide::resolve(self.side, self.order_qty)?;
        self.side = Some(side);
        self.order_qty = self
            .order_qty
            .checked_abs()
            .ok_or(ValidationError::QuantityOutOfRange(self.order_qty))?;

        Ok(())
    }

    /// 최종 상태 여부.
    pub fn is_terminal(&self) -> bool {
        self.ord_status == TERMINAL_STATUS
    }

    /// 결과 라우팅에 사용하는 키 (클라이언트 주문 ID 우선).
    pub fn correlation_key(&self) -> Option<&str> {
        if !self.cl_ord_id.is_empty() {
            Some(&self.cl_ord_id)
        } else if !self.order_id.is_empty() {
            Some(&self.order_id)
        } else {
            None
        }
    }
}
