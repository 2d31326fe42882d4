//! 거래 엔진 기능 trait 정의.

use async_trait::async_trait;
use nge_core::{ApiKey, NgeResult, Order};
use secrecy::{ExposeSecret, SecretString};

use crate::model::{
    AuthContext, LoginPayload, LoginSession, OrderQuery, PublicKey, RawOrder, RequestScope,
};
use crate::ExchangeError;

/// 거래 엔진 작업을 위한 Result 타입.
pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// 로그인 및 API 키 발급.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// 로그인 비밀번호 암호화에 쓰이는 엔진 공개 키 조회.
    async fn get_public_key(&self) -> ExchangeResult<PublicKey>;

    /// identity / 봉인된 비밀번호로 로그인.
    async fn login(&self, payload: &LoginPayload) -> ExchangeResult<LoginSession>;

    /// 로그인 세션으로 사용자의 기본 API 키 조회.
    async fn fetch_default_key(&self, session: &LoginSession) -> ExchangeResult<ApiKey>;
}

/// 주문 전송 및 조회.
#[async_trait]
pub trait OrderTransport: Send + Sync {
    /// 주문 제출. 엔진의 접수 응답을 반환합니다.
    async fn submit_order(&self, auth: &AuthContext, order: &Order) -> ExchangeResult<RawOrder>;

    /// 과거 주문 조회.
    async fn fetch_historical_orders(
        &self,
        auth: &AuthContext,
        query: &OrderQuery,
    ) -> ExchangeResult<Vec<RawOrder>>;
}

/// 요청마다 사용할 인가 컨텍스트 공급자.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// 다음 인가 컨텍스트. `parent`가 없으면 공급자의 루트 범위를 사용합니다.
    async fn next_auth(&self, parent: Option<&RequestScope>) -> NgeResult<AuthContext>;
}

/// 로그인 비밀번호 봉인.
pub trait LoginCipher: Send + Sync {
    /// 엔진 공개 키로 비밀번호를 봉인합니다.
    fn seal(&self, password: &SecretString, key: &PublicKey) -> ExchangeResult<String>;
}

/// 비밀번호를 그대로 전달하는 봉인기.
///
/// 전송 구간 암호화는 TLS에 맡깁니다.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughCipher;

impl LoginCipher for PassthroughCipher {
    fn seal(&self, password: &SecretString, _key: &PublicKey) -> ExchangeResult<String> {
        Ok(password.expose_secret().to_string())
    }
}
