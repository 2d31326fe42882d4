//! 명령 실행에 필요한 연결 구성.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use nge_auth::{CredentialPool, CredentialStore, PoolSource};
use nge_core::{AppConfig, CredentialEncryptor, EndpointConfig};
use nge_exchange::{AuthProvider, NgeRestClient, NgeRestConfig, OrderTransport};
use nge_execution::{OrderPipeline, PipelineLimits};

/// 결과 라우팅에 사용하는 기본 클라이언트 ID.
pub const DEFAULT_CLIENT_ID: &str = "ngecli";

/// 거래 엔진 세션.
pub struct Session {
    pub config: AppConfig,
    pub rest: Arc<NgeRestClient>,
    pub pool: Arc<CredentialPool>,
    client_id: String,
}

impl Session {
    /// 설정과 풀 구성 원천으로 세션을 엽니다. 자격증명은 첫 요청 시 구성됩니다.
    pub fn open(config: AppConfig, source: PoolSource) -> Result<Self> {
        let rest = rest_client(&config.endpoint)?;
        let shadow = open_shadow(&config)?;
        let store = CredentialStore::load(config.paths.auth_store_path())?;

        let client_id = source
            .identity
            .clone()
            .filter(|identity| !identity.is_empty())
            .unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string());

        let pool = CredentialPool::new(source, rest.clone(), shadow, store)?;

        Ok(Self {
            config,
            rest,
            pool: Arc::new(pool),
            client_id,
        })
    }

    /// 주문 결과를 라우팅할 클라이언트 ID.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// 주문 제출 타임아웃. 0이면 무제한.
    pub fn submit_timeout(&self) -> Option<Duration> {
        match self.config.pipeline.submit_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// 세션 자격증명과 전송 계층을 사용하는 주문 파이프라인.
    pub fn pipeline(&self) -> OrderPipeline {
        let auth: Arc<dyn AuthProvider> = self.pool.clone();
        let transport: Arc<dyn OrderTransport> = self.rest.clone();

        OrderPipeline::new(
            auth,
            transport,
            PipelineLimits::from_config(&self.config.pipeline),
        )
    }
}

/// 접속 설정으로 REST 클라이언트 생성.
pub fn rest_client(endpoint: &EndpointConfig) -> Result<Arc<NgeRestClient>> {
    let client = NgeRestClient::new(NgeRestConfig::from_endpoint(endpoint))
        .with_context(|| format!("failed to create client for {}", endpoint.base_path()))?;
    Ok(Arc::new(client))
}

/// 비밀번호 암호화기. 마스터 키 파일이 없으면 생성합니다.
pub fn open_shadow(config: &AppConfig) -> Result<Arc<CredentialEncryptor>> {
    let path = config.paths.master_key_path();
    let encryptor = CredentialEncryptor::from_key_file(&path)
        .with_context(|| format!("failed to open master key {}", path.display()))?;
    Ok(Arc::new(encryptor))
}
