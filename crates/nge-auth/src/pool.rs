//! 라운드 로빈 자격증명 풀.
//!
//! 처리 기능:
//! - 최초 사용 시 한 번만 풀 구성 (CSV 파일 또는 로그인 + 기본 API 키 조회)
//! - 락 없는 라운드 로빈 선택
//! - identity별 인가 컨텍스트 캐시 (익명 자격증명은 캐시하지 않음)
//! - 호스트별 로그인 정보 저장

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use nge_core::{ApiKey, Credential, NgeError, NgeResult, PasswordShadow, ShadowedPassword};
use nge_exchange::{
    AuthContext, AuthProvider, Authenticator, ExchangeError, LoginCipher, LoginSession,
    PassthroughCipher, RequestScope,
};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{Mutex, OnceCell, RwLock};
use tracing::{debug, info};

use crate::identity::IdentityPatterns;
use crate::loader::load_credentials;
use crate::store::CredentialStore;

/// 풀 구성 원천.
#[derive(Debug, Clone, Default)]
pub struct PoolSource {
    /// CSV 자격증명 파일. 지정되면 로그인 대신 사용합니다.
    pub auth_file: Option<PathBuf>,
    /// 저장된 로그인 정보를 찾을 호스트 (`host[:port]`)
    pub host: String,
    /// 명령행에서 지정한 identity
    pub identity: Option<String>,
    /// 명령행에서 지정한 비밀번호
    pub password: Option<SecretString>,
}

impl PoolSource {
    fn explicit_login(&self) -> Option<(&str, &SecretString)> {
        match (self.identity.as_deref(), self.password.as_ref()) {
            (Some(identity), Some(password))
                if !identity.is_empty() && !password.expose_secret().is_empty() =>
            {
                Some((identity, password))
            }
            _ => None,
        }
    }
}

/// 라운드 로빈 자격증명 풀.
pub struct CredentialPool {
    source: PoolSource,
    authenticator: Arc<dyn Authenticator>,
    cipher: Arc<dyn LoginCipher>,
    shadow: Arc<dyn PasswordShadow>,
    identities: IdentityPatterns,
    store: Mutex<CredentialStore>,
    root: RequestScope,

    // ==== 풀 상태 ====
    credentials: OnceCell<Vec<Credential>>,
    cursor: AtomicU64,

    // ==== 캐시 ====
    contexts: RwLock<HashMap<String, AuthContext>>,
    api_keys: RwLock<HashMap<String, ApiKey>>,
}

impl CredentialPool {
    /// 새 자격증명 풀 생성. 풀 구성은 첫 `next_auth` 호출 시 수행됩니다.
    pub fn new(
        source: PoolSource,
        authenticator: Arc<dyn Authenticator>,
        shadow: Arc<dyn PasswordShadow>,
        store: CredentialStore,
    ) -> NgeResult<Self> {
        Ok(Self {
            source,
            authenticator,
            cipher: Arc::new(PassthroughCipher),
            shadow,
            identities: IdentityPatterns::new()?,
            store: Mutex::new(store),
            root: RequestScope::root(),
            credentials: OnceCell::new(),
            cursor: AtomicU64::new(0),
            contexts: RwLock::new(HashMap::new()),
            api_keys: RwLock::new(HashMap::new()),
        })
    }

    /// 로그인 비밀번호 봉인기 설정.
    pub fn with_cipher(mut self, cipher: Arc<dyn LoginCipher>) -> Self {
        self.cipher = cipher;
        self
    }

    /// 미리 구성된 자격증명으로 풀을 채웁니다. 이후 파일 로드나 로그인은 수행되지 않습니다.
    pub fn with_credentials(mut self, credentials: Vec<Credential>) -> Self {
        if !credentials.is_empty() {
            self.credentials = OnceCell::new_with(Some(credentials));
        }
        self
    }

    /// 루트 요청 범위 설정.
    pub fn with_root_scope(mut self, root: RequestScope) -> Self {
        self.root = root;
        self
    }

    /// 구성된 풀의 크기. 아직 구성되지 않았으면 `None`.
    pub fn len(&self) -> Option<usize> {
        self.credentials.get().map(Vec::len)
    }

    /// 풀이 구성되었고 비어 있는지 여부.
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// identity의 API 키 캐시 조회.
    pub async fn api_key(&self, identity: &str) -> Option<ApiKey> {
        self.api_keys.read().await.get(identity).cloned()
    }

    /// 캐시된 인가 컨텍스트 수.
    pub async fn cached_contexts(&self) -> usize {
        self.contexts.read().await.len()
    }

    // ========================================================================
    // 풀 구성
    // ========================================================================

    /// 풀 자격증명. 최초 호출 시 한 번만 구성합니다.
    pub async fn credentials(&self) -> NgeResult<&[Credential]> {
        self.credentials
            .get_or_try_init(|| self.populate())
            .await
            .map(Vec::as_slice)
    }

    async fn populate(&self) -> NgeResult<Vec<Credential>> {
        match &self.source.auth_file {
            Some(path) => {
                info!(path = %path.display(), "자격증명 파일에서 풀 구성");
                load_credentials(path, self.shadow.as_ref())
            }
            None => self.retrieve_from_login().await.map(|credential| vec![credential]),
        }
    }

    /// 명령행 또는 저장된 로그인 정보로 로그인해 기본 API 키를 가져옵니다.
    async fn retrieve_from_login(&self) -> NgeResult<Credential> {
        let host = &self.source.host;

        let (identity, shadowed, password) = match self.source.explicit_login() {
            Some((identity, password)) => (
                identity.to_string(),
                self.shadow.shadow(password)?,
                password.clone(),
            ),
            None => {
                let store = self.store.lock().await;
                let saved = store
                    .saved_login(host)
                    .ok_or_else(|| NgeError::AuthMissing(host.clone()))?;
                let password = self.shadow.reveal(&saved.password)?;
                (saved.identity.clone(), saved.password.clone(), password)
            }
        };

        info!("Login with identity: {}", identity);
        let session = self.login(&identity, &password).await?;

        let key = self
            .authenticator
            .fetch_default_key(&session)
            .await
            .map_err(|e| {
                NgeError::Auth(format!(
                    "retrieve {}'s api key from {} failed: {}",
                    identity, host, e
                ))
            })?;

        if !key.is_complete() {
            return Err(NgeError::Auth(format!(
                "retrieve {}'s api key from {} failed: incomplete key",
                identity, host
            )));
        }

        self.api_keys
            .write()
            .await
            .insert(identity.clone(), key.clone());

        Ok(Credential::new(identity, shadowed, key))
    }

    // ========================================================================
    // 로그인 / 저장
    // ========================================================================

    /// identity와 비밀번호로 로그인합니다.
    ///
    /// identity 형식 오류는 `NgeError::Validation`, 엔진 오류는 `NgeError::Auth`입니다.
    pub async fn login(&self, identity: &str, password: &SecretString) -> NgeResult<LoginSession> {
        let mut payload = self.identities.login_payload(identity)?;

        let public_key = self
            .authenticator
            .get_public_key()
            .await
            .map_err(|e| login_failed(identity, e))?;
        let sealed = self
            .cipher
            .seal(password, &public_key)
            .map_err(|e| login_failed(identity, e))?;
        payload.set_sealed_password(sealed);

        self.authenticator
            .login(&payload)
            .await
            .map_err(|e| login_failed(identity, e))
    }

    /// 호스트의 로그인 정보를 저장소에 반영합니다 (파일 기록은 `write_config`).
    pub async fn set_login_info(
        &self,
        host: &str,
        identity: &str,
        password: &SecretString,
    ) -> NgeResult<ShadowedPassword> {
        let shadowed = self.shadow.shadow(password)?;
        self.store
            .lock()
            .await
            .set_login_info(host, identity, shadowed.clone());
        Ok(shadowed)
    }

    /// 로그인 정보를 파일에 기록합니다.
    pub async fn write_config(&self) -> NgeResult<()> {
        self.store.lock().await.write()
    }

    /// 풀을 해체하고 로그인 정보 저장소를 돌려받습니다.
    pub fn into_store(self) -> CredentialStore {
        self.store.into_inner()
    }

    // ========================================================================
    // 선택
    // ========================================================================

    /// 다음 자격증명의 인가 컨텍스트.
    pub async fn next_auth(&self, parent: Option<&RequestScope>) -> NgeResult<AuthContext> {
        let credentials = self.credentials().await?;
        if credentials.is_empty() {
            return Err(NgeError::Config("credential pool is empty".to_string()));
        }

        let turn = self.cursor.fetch_add(1, Ordering::Relaxed);
        let credential = &credentials[(turn % credentials.len() as u64) as usize];
        let scope = parent.cloned().unwrap_or_else(|| self.root.clone());

        if credential.is_anonymous() {
            return Ok(AuthContext::new("", credential.api_key.clone(), scope));
        }

        let identity = &credential.identity;
        if let Some(ctx) = self.contexts.read().await.get(identity) {
            return Ok(ctx.clone());
        }

        let ctx = {
            let mut contexts = self.contexts.write().await;
            contexts
                .entry(identity.clone())
                .or_insert_with(|| {
                    debug!(identity = %identity, scope = %scope.label, "인가 컨텍스트 생성");
                    AuthContext::new(identity.clone(), credential.api_key.clone(), scope)
                })
                .clone()
        };

        self.api_keys
            .write()
            .await
            .entry(identity.clone())
            .or_insert_with(|| credential.api_key.clone());

        Ok(ctx)
    }
}

fn login_failed(identity: &str, e: ExchangeError) -> NgeError {
    NgeError::Auth(format!("login failed with identity: {}: {}", identity, e))
}

#[async_trait]
impl AuthProvider for CredentialPool {
    async fn next_auth(&self, parent: Option<&RequestScope>) -> NgeResult<AuthContext> {
        CredentialPool::next_auth(self, parent).await
    }
}
