//! NGE REST 커넥터.
//!
//! 엔드포인트:
//! - `GET  /keyExchange/publicKey` - 엔진 공개 키
//! - `POST /user/login` - 로그인 (세션 토큰 발급)
//! - `GET  /user/apiKey/default` - 기본 API 키 조회 (`x-quant-token` 헤더)
//! - `POST /order` - 주문 제출 (서명 필요)
//! - `GET  /order` - 주문 조회 (서명 필요)

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use nge_core::{ApiKey, EndpointConfig, Order};
use reqwest::{Client, Method, Url};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::signer::{sign_request, SIGNATURE_TTL_SECS};
use crate::model::{AuthContext, LoginPayload, LoginSession, OrderQuery, PublicKey, RawOrder};
use crate::traits::{Authenticator, ExchangeResult, OrderTransport};
use crate::ExchangeError;

/// 세션 토큰 헤더.
const QUANT_TOKEN_HEADER: &str = "x-quant-token";

// ============================================================================
// 설정
// ============================================================================

/// REST 클라이언트 설정.
#[derive(Debug, Clone)]
pub struct NgeRestConfig {
    /// `scheme://host[:port]/base-uri`
    pub base_path: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
}

impl NgeRestConfig {
    pub fn new(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            timeout_secs: 10,
        }
    }

    /// 접속 설정에서 생성.
    pub fn from_endpoint(endpoint: &EndpointConfig) -> Self {
        Self {
            base_path: endpoint.base_path(),
            timeout_secs: endpoint.timeout_secs,
        }
    }
}

// ============================================================================
// API 응답 / 요청 타입
// ============================================================================

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(alias = "accessToken")]
    token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DefaultKeyResponse {
    api_key: String,
    api_secret: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewOrderBody<'a> {
    symbol: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    side: Option<String>,
    order_qty: i64,
    #[serde(skip_serializing_if = "Option::is_none", with = "rust_decimal::serde::float_option")]
    price: Option<Decimal>,
    #[serde(rename = "clOrdID", skip_serializing_if = "str::is_empty")]
    cl_ord_id: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    ord_type: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    time_in_force: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    text: &'a str,
}

impl<'a> From<&'a Order> for NewOrderBody<'a> {
    fn from(order: &'a Order) -> Self {
        Self {
            symbol: &order.symbol,
            side: order.side.map(|s| s.to_string()),
            order_qty: order.order_qty,
            price: order.price,
            cl_ord_id: &order.cl_ord_id,
            ord_type: &order.ord_type,
            time_in_force: &order.time_in_force,
            text: &order.text,
        }
    }
}

// ============================================================================
// 클라이언트
// ============================================================================

/// NGE REST 클라이언트.
pub struct NgeRestClient {
    config: NgeRestConfig,
    client: Client,
}

impl NgeRestClient {
    /// 새 REST 클라이언트 생성.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 `ExchangeError::NetworkError`를 반환합니다.
    pub fn new(config: NgeRestConfig) -> Result<Self, ExchangeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExchangeError::NetworkError(format!("HTTP client 생성 실패: {}", e)))?;

        info!(base_path = %config.base_path, "NGE REST 클라이언트 생성");

        Ok(Self { config, client })
    }

    /// 기본 경로.
    pub fn base_path(&self) -> &str {
        &self.config.base_path
    }

    /// 엔드포인트 URL 생성.
    fn url(&self, endpoint: &str, params: &[(&str, String)]) -> ExchangeResult<Url> {
        let mut url = Url::parse(&format!("{}{}", self.config.base_path, endpoint))
            .map_err(|e| ExchangeError::NetworkError(format!("잘못된 URL {}: {}", endpoint, e)))?;

        if !params.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
        }

        Ok(url)
    }

    /// 서명 대상 경로 (`/api/v1/order?symbol=...`).
    fn path_and_query(url: &Url) -> String {
        match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        }
    }

    /// 공개 GET 요청 (인증 불필요).
    async fn public_get<T: for<'de> Deserialize<'de>>(&self, endpoint: &str) -> ExchangeResult<T> {
        let url = self.url(endpoint, &[])?;
        debug!("GET {}", url);

        let response = self.client.get(url).send().await?;
        self.handle_response(response).await
    }

    /// 서명된 요청 (API 키 필요).
    async fn signed_request<T: for<'de> Deserialize<'de>>(
        &self,
        auth: &AuthContext,
        method: Method,
        endpoint: &str,
        params: &[(&str, String)],
        body: Option<String>,
    ) -> ExchangeResult<T> {
        let url = self.url(endpoint, params)?;
        let expires = Utc::now().timestamp() + SIGNATURE_TTL_SECS;
        let body = body.unwrap_or_default();

        let signature = sign_request(
            auth.api_key.secret.expose_secret(),
            method.as_str(),
            &Self::path_and_query(&url),
            expires,
            &body,
        )?;

        debug!(account = %auth.display_name(), "{} (signed) {}", method, endpoint);

        let mut request = self
            .client
            .request(method, url)
            .header("api-key", &auth.api_key.key)
            .header("api-expires", expires.to_string())
            .header("api-signature", signature);

        if !body.is_empty() {
            request = request
                .header("Content-Type", "application/json")
                .body(body);
        }

        let response = request.send().await?;
        self.handle_response(response).await
    }

    /// 응답 처리 및 에러 매핑.
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> ExchangeResult<T> {
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return serde_json::from_str(&body).map_err(|e| {
                error!("Failed to parse response: {} - Body: {}", e, body);
                ExchangeError::ParseError(e.to_string())
            });
        }

        let message = match serde_json::from_str::<ErrorBody>(&body) {
            Ok(err) => match err.error.name {
                Some(name) => format!("{}: {}", name, err.error.message),
                None => err.error.message,
            },
            Err(_) => body,
        };

        Err(match status.as_u16() {
            401 | 403 => ExchangeError::Unauthorized(message),
            429 => ExchangeError::RateLimited,
            code => ExchangeError::ApiError {
                code: i32::from(code),
                message,
            },
        })
    }
}

#[async_trait]
impl Authenticator for NgeRestClient {
    async fn get_public_key(&self) -> ExchangeResult<PublicKey> {
        self.public_get("/keyExchange/publicKey").await
    }

    async fn login(&self, payload: &LoginPayload) -> ExchangeResult<LoginSession> {
        let url = self.url("/user/login", &[])?;
        debug!("POST {}", url);

        let response = self.client.post(url).json(payload).send().await?;
        let login: LoginResponse = self.handle_response(response).await?;

        let identity = payload
            .get("email")
            .or_else(|| payload.get("mobile"))
            .unwrap_or_default()
            .to_string();

        Ok(LoginSession {
            identity,
            token: SecretString::from(login.token),
        })
    }

    async fn fetch_default_key(&self, session: &LoginSession) -> ExchangeResult<ApiKey> {
        let url = self.url("/user/apiKey/default", &[])?;
        debug!(identity = %session.identity, "GET {}", url);

        let response = self
            .client
            .get(url)
            .header(QUANT_TOKEN_HEADER, session.token.expose_secret())
            .send()
            .await?;
        let key: DefaultKeyResponse = self.handle_response(response).await?;

        Ok(ApiKey::new(key.api_key, key.api_secret))
    }
}

#[async_trait]
impl OrderTransport for NgeRestClient {
    async fn submit_order(&self, auth: &AuthContext, order: &Order) -> ExchangeResult<RawOrder> {
        let body = serde_json::to_string(&NewOrderBody::from(order))?;
        self.signed_request(auth, Method::POST, "/order", &[], Some(body))
            .await
    }

    async fn fetch_historical_orders(
        &self,
        auth: &AuthContext,
        query: &OrderQuery,
    ) -> ExchangeResult<Vec<RawOrder>> {
        self.signed_request(auth, Method::GET, "/order", &query.to_params(), None)
            .await
    }
}
