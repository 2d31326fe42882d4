//! 호스트별 로그인 정보 저장소.
//!
//! TOML 파일 형식:
//!
//! ```toml
//! ["trade:8080"]
//! identity = "trader@example.com"
//! password = "<base64(nonce || ciphertext)>"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use nge_core::{NgeResult, ShadowedPassword};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// 저장된 로그인 정보.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedLogin {
    pub identity: String,
    pub password: ShadowedPassword,
}

/// 호스트별 로그인 정보 저장소.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
    hosts: BTreeMap<String, SavedLogin>,
}

impl CredentialStore {
    /// 비어 있는 저장소.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            hosts: BTreeMap::new(),
        }
    }

    /// 파일에서 로드합니다. 파일이 없으면 빈 저장소를 반환합니다.
    pub fn load(path: impl Into<PathBuf>) -> NgeResult<Self> {
        let path = path.into();
        if !path.exists() {
            debug!(path = %path.display(), "로그인 정보 파일 없음");
            return Ok(Self::empty(path));
        }

        let content = std::fs::read_to_string(&path)?;
        let hosts: BTreeMap<String, SavedLogin> = toml::from_str(&content)?;
        debug!(path = %path.display(), hosts = hosts.len(), "로그인 정보 로드");

        Ok(Self { path, hosts })
    }

    /// 파일 경로.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 호스트의 로그인 정보 설정 (메모리에만 반영).
    pub fn set_login_info(&mut self, host: &str, identity: &str, password: ShadowedPassword) {
        self.hosts.insert(
            host.to_string(),
            SavedLogin {
                identity: identity.to_string(),
                password,
            },
        );
    }

    /// 호스트의 저장된 로그인 정보.
    pub fn saved_login(&self, host: &str) -> Option<&SavedLogin> {
        self.hosts.get(host)
    }

    /// 호스트의 로그인 정보 존재 여부.
    pub fn has_saved(&self, host: &str) -> bool {
        self.hosts.contains_key(host)
    }

    /// 저장된 호스트 목록.
    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.hosts.keys().map(String::as_str)
    }

    /// 파일에 기록합니다.
    pub fn write(&self) -> NgeResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(&self.path, toml::to_string_pretty(&self.hosts)?)?;
        info!(path = %self.path.display(), hosts = self.hosts.len(), "로그인 정보 저장");

        Ok(())
    }
}
