//! 설정 관리.
//!
//! 설정 우선순위 (높은 순):
//! 1. 명령행 인자 (CLI에서 덮어씀)
//! 2. 환경 변수 (`NGECLI__ENDPOINT__HOST` 형식)
//! 3. 설정 파일 (`~/.ngecli/config.toml`)
//! 4. 기본값

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::NgeResult;

/// 설정 파일 및 자격증명 파일이 위치하는 기본 디렉토리 이름.
pub const DEFAULT_HOME_DIR: &str = ".ngecli";

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// 거래 엔진 접속 설정
    pub endpoint: EndpointConfig,
    /// 주문 파이프라인 설정
    pub pipeline: PipelineConfig,
    /// 로깅 설정
    pub logging: LoggingConfig,
    /// 파일 경로 설정
    pub paths: PathsConfig,
}

/// 거래 엔진 접속 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// 프로토콜 (http / https)
    pub scheme: String,
    /// 호스트 이름
    pub host: String,
    /// 포트 (80이면 base host에서 생략)
    pub port: u16,
    /// API 기본 경로
    pub base_uri: String,
    /// 기본 거래 심볼
    pub symbol: String,
    /// HTTP 요청 타임아웃 (초)
    pub timeout_secs: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            scheme: "https".to_string(),
            host: "trade".to_string(),
            port: 80,
            base_uri: "/api/v1".to_string(),
            symbol: "XBTUSD".to_string(),
            timeout_secs: 10,
        }
    }
}

impl EndpointConfig {
    /// `host[:port]` 문자열. 포트가 80이면 생략합니다.
    pub fn base_host(&self) -> String {
        if self.port != 80 {
            format!("{}:{}", self.host, self.port)
        } else {
            self.host.clone()
        }
    }

    /// `scheme://host[:port]`
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.base_host())
    }

    /// `scheme://host[:port]/base-uri`
    pub fn base_path(&self) -> String {
        format!("{}{}", self.base_url(), self.base_uri)
    }
}

/// 주문 파이프라인 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// 클라이언트별 최대 미확인(inflight) 주문 수
    pub max_inflight_per_client: usize,
    /// 전체 제출 속도 토큰 버킷 용량
    pub rate_capacity: u32,
    /// 토큰 리필 간격 (밀리초, 0이면 리필 없음)
    pub refill_interval_ms: u64,
    /// 리필 간격마다 추가되는 토큰 수
    pub refill_amount: u32,
    /// 결과 스트림 버퍼 크기
    pub result_buffer: usize,
    /// 주문 제출 기본 타임아웃 (밀리초, 0이면 무제한)
    pub submit_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_inflight_per_client: 5,
            rate_capacity: 200,
            refill_interval_ms: 1000,
            refill_amount: 200,
            result_buffer: 1024,
            submit_timeout_ms: 5000,
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// 파일 경로 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    /// 설정 디렉토리
    pub home: PathBuf,
    /// 호스트별 로그인 정보 파일 (home 기준 상대 경로 허용)
    pub auth_store: PathBuf,
    /// 비밀번호 암호화 마스터 키 파일
    pub master_key: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            home: default_home(),
            auth_store: PathBuf::from("auths.toml"),
            master_key: PathBuf::from("master.key"),
        }
    }
}

impl PathsConfig {
    /// 로그인 정보 파일 경로.
    pub fn auth_store_path(&self) -> PathBuf {
        self.home.join(&self.auth_store)
    }

    /// 마스터 키 파일 경로.
    pub fn master_key_path(&self) -> PathBuf {
        self.home.join(&self.master_key)
    }

    /// 기본 설정 파일 경로.
    pub fn config_file_path(&self) -> PathBuf {
        self.home.join("config.toml")
    }
}

/// `$HOME/.ngecli`, HOME이 없으면 현재 디렉토리 기준.
pub fn default_home() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_HOME_DIR)
}

impl AppConfig {
    /// 기본값, 파일, 환경 변수를 순서대로 적용해 설정을 로드합니다.
    ///
    /// 파일이 없어도 에러가 아닙니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let defaults = config::Config::try_from(&AppConfig::default())?;

        let builder = config::Config::builder()
            // 기본값으로 시작
            .add_source(defaults)
            // 파일에서 로드
            .add_source(config::File::from(path.as_ref()).required(false))
            // 환경 변수로 오버라이드
            .add_source(
                config::Environment::with_prefix("NGECLI")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// 기본 경로(`~/.ngecli/config.toml`)에서 설정을 로드합니다.
    pub fn load_default() -> Result<Self, config::ConfigError> {
        Self::load(PathsConfig::default().config_file_path())
    }

    /// 설정 파일이 없으면 현재 설정을 TOML로 기록합니다.
    ///
    /// 파일을 새로 만들었으면 `true`를 반환합니다.
    pub fn write_if_missing<P: AsRef<Path>>(&self, path: P) -> NgeResult<bool> {
        let path = path.as_ref();
        if path.exists() {
            return Ok(false);
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        info!(path = %path.display(), "기본 설정 파일 생성");

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_host_omits_default_port() {
        let mut endpoint = EndpointConfig::default();
        assert_eq!(endpoint.base_host(), "trade");
        assert_eq!(endpoint.base_path(), "https://trade/api/v1");

        endpoint.port = 8080;
        endpoint.scheme = "http".to_string();
        assert_eq!(endpoint.base_host(), "trade:8080");
        assert_eq!(endpoint.base_path(), "http://trade:8080/api/v1");
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(dir.path().join("absent.toml")).unwrap();

        assert_eq!(config.pipeline.max_inflight_per_client, 5);
        assert_eq!(config.endpoint.symbol, "XBTUSD");
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[endpoint]\nhost = \"nge.example.com\"\nport = 9443\n\n[pipeline]\nrate_capacity = 10\n",
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.endpoint.base_host(), "nge.example.com:9443");
        assert_eq!(config.endpoint.scheme, "https");
        assert_eq!(config.pipeline.rate_capacity, 10);
        assert_eq!(config.pipeline.max_inflight_per_client, 5);
    }

    #[test]
    fn test_write_if_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");

        let config = AppConfig::default();
        assert!(config.write_if_missing(&path).unwrap());
        assert!(!config.write_if_missing(&path).unwrap());

        let reloaded = AppConfig::load(&path).unwrap();
        assert_eq!(reloaded.endpoint.base_uri, "/api/v1");
    }
}
