//! 거래 엔진과 주고받는 데이터 타입.
//!
//! - `RawOrder`: 엔진 주문 응답 (와이어 형식, 모든 필드 선택)
//! - `AuthContext` / `RequestScope`: 요청 인가 정보
//! - `PublicKey` / `LoginPayload` / `LoginSession`: 로그인 흐름
//! - `OrderQuery`: 과거 주문 조회 조건

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use nge_core::{ApiKey, NgeError, Order, OrderSide};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

// ============================================================================
// 인가 컨텍스트
// ============================================================================

/// 요청 범위.
///
/// 인가 컨텍스트가 어떤 상위 요청에서 파생되었는지 나타냅니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestScope {
    pub label: String,
}

impl RequestScope {
    /// 루트 범위.
    pub fn root() -> Self {
        Self {
            label: "root".to_string(),
        }
    }

    /// 하위 범위 생성.
    pub fn child(&self, name: &str) -> Self {
        Self {
            label: format!("{}/{}", self.label, name),
        }
    }
}

impl Default for RequestScope {
    fn default() -> Self {
        Self::root()
    }
}

/// 요청 인가 정보.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// 계정 identity (API 키 전용 계정이면 빈 문자열)
    pub identity: String,
    /// 서명에 사용할 API 키
    pub api_key: ApiKey,
    /// 파생된 요청 범위
    pub scope: RequestScope,
}

impl AuthContext {
    pub fn new(identity: impl Into<String>, api_key: ApiKey, scope: RequestScope) -> Self {
        Self {
            identity: identity.into(),
            api_key,
            scope,
        }
    }

    /// 로그에 표시할 계정 이름.
    pub fn display_name(&self) -> &str {
        if self.identity.is_empty() {
            &self.api_key.key
        } else {
            &self.identity
        }
    }
}

// ============================================================================
// 로그인
// ============================================================================

/// 엔진 공개 키.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKey {
    /// PEM 또는 base64 문자열
    #[serde(alias = "keyString")]
    pub public_key: String,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    /// 유효 기간 (초)
    #[serde(default)]
    pub expired: Option<u64>,
}

/// 로그인 요청 본문.
///
/// identity 종류(`email` / `mobile`)를 키로 하며, `type`, `verifyCode`, `password`를 포함합니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LoginPayload(BTreeMap<String, String>);

impl LoginPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// 공개 키로 봉인된 비밀번호 설정.
    pub fn set_sealed_password(&mut self, sealed: String) {
        self.0.insert("password".to_string(), sealed);
    }
}

/// 로그인 세션.
#[derive(Debug, Clone)]
pub struct LoginSession {
    pub identity: String,
    pub token: SecretString,
}

// ============================================================================
// 주문 조회
// ============================================================================

/// 과거 주문 조회 조건.
#[derive(Debug, Clone, Default)]
pub struct OrderQuery {
    pub symbol: Option<String>,
    /// JSON 필터 (예: `{"ordStatus": "Filled"}`)
    pub filter: Option<String>,
    /// 조회할 컬럼 목록 (JSON 배열 또는 쉼표 구분)
    pub columns: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub count: Option<u32>,
    pub reverse: bool,
}

impl OrderQuery {
    /// 쿼리 파라미터 목록으로 변환.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();

        if let Some(symbol) = self.symbol.as_ref().filter(|s| !s.is_empty()) {
            params.push(("symbol", symbol.clone()));
        }
        if let Some(filter) = self.filter.as_ref().filter(|s| !s.is_empty()) {
            params.push(("filter", filter.clone()));
        }
        if let Some(columns) = self.columns.as_ref().filter(|s| !s.is_empty()) {
            params.push(("columns", columns.clone()));
        }
        if let Some(count) = self.count.filter(|c| *c > 0) {
            params.push(("count", count.to_string()));
        }
        if self.reverse {
            params.push(("reverse", "true".to_string()));
        }
        if let Some(start) = self.start {
            params.push(("startTime", start.to_rfc3339()));
        }
        if let Some(end) = self.end {
            params.push(("endTime", end.to_rfc3339()));
        }

        params
    }
}

// ============================================================================
// 엔진 주문 (와이어 형식)
// ============================================================================

/// 엔진 주문 응답.
///
/// 엔진은 수량과 가격을 부동소수점으로, 시각을 RFC 3339 문자열로 보냅니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawOrder {
    #[serde(rename = "orderID", skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(rename = "clOrdID", skip_serializing_if = "Option::is_none")]
    pub cl_ord_id: Option<String>,
    #[serde(rename = "clOrdLinkID", skip_serializing_if = "Option::is_none")]
    pub cl_ord_link_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_qty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_qty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_px: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peg_offset_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peg_price_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settl_currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ord_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_in_force: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exec_inst: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contingency_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ex_destination: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ord_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub triggered: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_indicator: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ord_rej_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leaves_qty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cum_qty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_px: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multi_leg_reporting_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transact_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

fn conversion(msg: String) -> NgeError {
    NgeError::Conversion(msg)
}

/// 부동소수점 수량을 계약 수로 변환합니다. 소수부가 있으면 에러입니다.
fn to_contracts(field: &str, value: Option<f64>) -> Result<Option<i64>, NgeError> {
    match value {
        None => Ok(None),
        Some(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 => {
            Ok(Some(v as i64))
        }
        Some(v) => Err(conversion(format!("{} is not a whole quantity: {}", field, v))),
    }
}

fn to_decimal(field: &str, value: Option<f64>) -> Result<Option<Decimal>, NgeError> {
    value
        .map(|v| {
            Decimal::try_from(v)
                .map_err(|e| conversion(format!("{} is not a valid decimal ({}): {}", field, v, e)))
        })
        .transpose()
}

fn to_time(field: &str, value: Option<&str>) -> Result<Option<DateTime<Utc>>, NgeError> {
    match value.filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|e| conversion(format!("{} is not RFC 3339 ({}): {}", field, s, e))),
    }
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl TryFrom<&RawOrder> for Order {
    type Error = NgeError;

    fn try_from(raw: &RawOrder) -> Result<Self, Self::Error> {
        let order_id = text(&raw.order_id);
        let cl_ord_id = text(&raw.cl_ord_id);
        if order_id.is_empty() && cl_ord_id.is_empty() {
            return Err(conversion("order has neither orderID nor clOrdID".to_string()));
        }

        let side = match raw.side.as_deref().filter(|s| !s.is_empty()) {
            Some(s) => Some(s.parse::<OrderSide>().map_err(|e| conversion(e.to_string()))?),
            None => None,
        };

        let account = to_contracts("account", raw.account)?;

        Ok(Order {
            order_id,
            cl_ord_id,
            cl_ord_link_id: text(&raw.cl_ord_link_id),
            account,
            symbol: text(&raw.symbol),
            side,
            order_qty: to_contracts("orderQty", raw.order_qty)?.unwrap_or_default(),
            price: to_decimal("price", raw.price)?,
            display_qty: to_contracts("displayQty", raw.display_qty)?,
            stop_px: to_decimal("stopPx", raw.stop_px)?,
            peg_offset_value: to_decimal("pegOffsetValue", raw.peg_offset_value)?,
            peg_price_type: text(&raw.peg_price_type),
            currency: text(&raw.currency),
            settl_currency: text(&raw.settl_currency),
            ord_type: text(&raw.ord_type),
            time_in_force: text(&raw.time_in_force),
            exec_inst: text(&raw.exec_inst),
            contingency_type: text(&raw.contingency_type),
            ex_destination: text(&raw.ex_destination),
            ord_status: text(&raw.ord_status),
            triggered: text(&raw.triggered),
            working_indicator: raw.working_indicator.unwrap_or(false),
            ord_rej_reason: text(&raw.ord_rej_reason),
            leaves_qty: to_contracts("leavesQty", raw.leaves_qty)?,
            cum_qty: to_contracts("cumQty", raw.cum_qty)?,
            avg_px: to_decimal("avgPx", raw.avg_px)?,
            multi_leg_reporting_type: text(&raw.multi_leg_reporting_type),
            text: text(&raw.text),
            transact_time: to_time("transactTime", raw.transact_time.as_deref())?,
            timestamp: to_time("timestamp", raw.timestamp.as_deref())?,
        })
    }
}

impl From<&Order> for RawOrder {
    fn from(order: &Order) -> Self {
        let decimal = |d: Option<Decimal>| d.and_then(|v| v.to_f64());

        RawOrder {
            order_id: non_empty(&order.order_id),
            cl_ord_id: non_empty(&order.cl_ord_id),
            cl_ord_link_id: non_empty(&order.cl_ord_link_id),
            account: order.account.map(|a| a as f64),
            symbol: non_empty(&order.symbol),
            side: order.side.map(|s| s.to_string()),
            order_qty: Some(order.order_qty as f64),
            price: decimal(order.price),
            display_qty: order.display_qty.map(|q| q as f64),
            stop_px: decimal(order.stop_px),
            peg_offset_value: decimal(order.peg_offset_value),
            peg_price_type: non_empty(&order.peg_price_type),
            currency: non_empty(&order.currency),
            settl_currency: non_empty(&order.settl_currency),
            ord_type: non_empty(&order.ord_type),
            time_in_force: non_empty(&order.time_in_force),
            exec_inst: non_empty(&order.exec_inst),
            contingency_type: non_empty(&order.contingency_type),
            ex_destination: non_empty(&order.ex_destination),
            ord_status: non_empty(&order.ord_status),
            triggered: non_empty(&order.triggered),
            working_indicator: Some(order.working_indicator),
            ord_rej_reason: non_empty(&order.ord_rej_reason),
            leaves_qty: order.leaves_qty.map(|q| q as f64),
            cum_qty: order.cum_qty.map(|q| q as f64),
            avg_px: decimal(order.avg_px),
            multi_leg_reporting_type: non_empty(&order.multi_leg_reporting_type),
            text: non_empty(&order.text),
            transact_time: order.transact_time.map(|t| t.to_rfc3339()),
            timestamp: order.timestamp.map(|t| t.to_rfc3339()),
        }
    }
}

impl RawOrder {
    /// 결과 라우팅 키 (clOrdID 우선, 없으면 orderID).
    pub fn correlation_key(&self) -> Option<&str> {
        self.cl_ord_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.order_id.as_deref().filter(|s| !s.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_raw() -> RawOrder {
        serde_json::from_str(
            r#"{
                "orderID": "6b1f0c2e-0000-4000-8000-000000000001",
                "clOrdID": "c-1",
                "symbol": "XBTUSD",
                "side": "Sell",
                "orderQty": 25,
                "price": 5050.5,
                "ordType": "Limit",
                "ordStatus": "New",
                "workingIndicator": true,
                "leavesQty": 25,
                "cumQty": 0,
                "transactTime": "2019-03-01T08:00:00.123Z",
                "timestamp": "2019-03-01T08:00:00.123Z"
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_convert_engine_order() {
        let order = Order::try_from(&sample_raw()).unwrap();

        assert_eq!(order.order_id, "6b1f0c2e-0000-4000-8000-000000000001");
        assert_eq!(order.side, Some(OrderSide::Sell));
        assert_eq!(order.order_qty, 25);
        assert_eq!(order.price, Some(dec!(5050.5)));
        assert_eq!(order.ord_status, "New");
        assert!(order.working_indicator);
        assert!(order.transact_time.is_some());
    }

    #[test]
    fn test_round_trip_preserves_core_fields() {
        let raw = sample_raw();
        let order = Order::try_from(&raw).unwrap();
        let back = RawOrder::from(&order);

        assert_eq!(back.order_id, raw.order_id);
        assert_eq!(back.cl_ord_id, raw.cl_ord_id);
        assert_eq!(back.symbol, raw.symbol);
        assert_eq!(back.side, raw.side);
        assert_eq!(back.order_qty, raw.order_qty);
        assert_eq!(back.price, raw.price);
        assert_eq!(back.ord_status, raw.ord_status);
        assert_eq!(Order::try_from(&back).unwrap(), order);
    }

    #[test]
    fn test_conversion_failures() {
        let mut raw = sample_raw();
        raw.side = Some("Hold".to_string());
        assert!(matches!(Order::try_from(&raw), Err(NgeError::Conversion(_))));

        let mut raw = sample_raw();
        raw.order_qty = Some(1.5);
        assert!(matches!(Order::try_from(&raw), Err(NgeError::Conversion(_))));

        let mut raw = sample_raw();
        raw.timestamp = Some("yesterday".to_string());
        assert!(matches!(Order::try_from(&raw), Err(NgeError::Conversion(_))));

        let anonymous = RawOrder::default();
        assert!(matches!(
            Order::try_from(&anonymous),
            Err(NgeError::Conversion(_))
        ));
    }

    #[test]
    fn test_correlation_key() {
        let mut raw = sample_raw();
        assert_eq!(raw.correlation_key(), Some("c-1"));

        raw.cl_ord_id = Some(String::new());
        assert_eq!(
            raw.correlation_key(),
            Some("6b1f0c2e-0000-4000-8000-000000000001")
        );
    }

    #[test]
    fn test_order_query_params() {
        let query = OrderQuery {
            symbol: Some("XBTUSD".to_string()),
            filter: Some(String::new()),
            count: Some(200),
            reverse: true,
            ..Default::default()
        };

        let params = query.to_params();
        assert!(params.contains(&("symbol", "XBTUSD".to_string())));
        assert!(params.contains(&("count", "200".to_string())));
        assert!(params.contains(&("reverse", "true".to_string())));
        assert!(!params.iter().any(|(k, _)| *k == "filter"));
    }

    #[test]
    fn test_scope_child() {
        let scope = RequestScope::root().child("order-new");
        assert_eq!(scope.label, "root/order-new");
    }
}
