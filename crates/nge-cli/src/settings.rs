//! 전역 명령행 옵션과 설정 병합.
//!
//! 설정 파일과 환경 변수로 로드한 `AppConfig` 위에 명령행 옵션을 덮어씁니다.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use clap::Args;
use nge_auth::PoolSource;
use nge_core::{AppConfig, EndpointConfig, PathsConfig, ValidationError};
use secrecy::SecretString;
use tracing::info;

/// 명령행 시간 형식.
pub const FLAG_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 모든 명령에 공통인 옵션. 하위 명령보다 앞에 지정합니다.
#[derive(Debug, Clone, Default, Args)]
pub struct GlobalArgs {
    /// 설정 파일 (기본: ~/.ngecli/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// 거래 엔진 프로토콜 (http, https)
    #[arg(long)]
    pub scheme: Option<String>,

    /// 거래 엔진 호스트
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// 거래 엔진 포트
    #[arg(short = 'P', long)]
    pub port: Option<u16>,

    /// API 기본 경로
    #[arg(long)]
    pub uri: Option<String>,

    /// 로그인 identity (이메일 또는 휴대폰 번호)
    #[arg(short = 'u', long = "id")]
    pub identity: Option<String>,

    /// 로그인 비밀번호
    #[arg(short = 'p', long = "pass")]
    pub password: Option<String>,

    /// 자격증명 CSV 파일 (identity,password,api_key,api_secret)
    #[arg(long = "auth")]
    pub auth_file: Option<PathBuf>,

    /// 거래 심볼
    #[arg(long)]
    pub symbol: Option<String>,

    /// 주문 제출 타임아웃 (밀리초, 0이면 무제한)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// 로그 레벨 (예: info, nge_execution=debug)
    #[arg(long)]
    pub log_level: Option<String>,

    /// 로그 형식 (pretty, json, compact)
    #[arg(long)]
    pub log_format: Option<String>,
}

impl GlobalArgs {
    /// 사용할 설정 파일 경로.
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| PathsConfig::default().config_file_path())
    }

    /// 설정 로드. 설정 파일이 없으면 현재 값으로 생성한 뒤 명령행 옵션을 덮어씁니다.
    pub fn load_config(&self) -> Result<AppConfig> {
        let path = self.config_path();
        let mut config = AppConfig::load(&path)
            .with_context(|| format!("failed to load config {}", path.display()))?;

        if config.write_if_missing(&path)? {
            info!(path = %path.display(), "No config file found, created one");
        } else {
            info!(path = %path.display(), "Using config file");
        }

        self.apply(&mut config);
        Ok(config)
    }

    /// 명령행 옵션을 설정에 덮어씁니다.
    pub fn apply(&self, config: &mut AppConfig) {
        let endpoint = &mut config.endpoint;
        if let Some(scheme) = &self.scheme {
            endpoint.scheme = scheme.clone();
        }
        if let Some(host) = &self.host {
            endpoint.host = host.clone();
        }
        if let Some(port) = self.port {
            endpoint.port = port;
        }
        if let Some(uri) = &self.uri {
            endpoint.base_uri = uri.clone();
        }
        if let Some(symbol) = &self.symbol {
            endpoint.symbol = symbol.clone();
        }

        if let Some(timeout) = self.timeout {
            config.pipeline.submit_timeout_ms = timeout;
        }

        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.logging.format = format.clone();
        }
    }

    /// 명령행 비밀번호.
    pub fn password(&self) -> Option<SecretString> {
        self.password.as_deref().map(SecretString::from)
    }

    /// 자격증명 풀 구성 원천.
    pub fn pool_source(&self, endpoint: &EndpointConfig) -> PoolSource {
        PoolSource {
            auth_file: self.auth_file.clone(),
            host: endpoint.base_host(),
            identity: self.identity.clone(),
            password: self.password(),
        }
    }
}

/// `host[:port]` 파싱.
pub fn parse_host(value: &str) -> Result<(String, Option<u16>)> {
    let mut parts = value.splitn(2, ':');
    let host = parts.next().unwrap_or_default().trim();
    if host.is_empty() {
        bail!("Invalid host: {}", value);
    }

    let port = match parts.next() {
        Some(port) => Some(
            port.trim()
                .parse::<u16>()
                .with_context(|| format!("Invalid host: {}", value))?,
        ),
        None => None,
    };

    Ok((host.to_string(), port))
}

/// 호스트 인자를 반영한 접속 설정.
pub fn endpoint_for_host(base: &EndpointConfig, value: &str) -> Result<EndpointConfig> {
    let (host, port) = parse_host(value)?;

    let mut endpoint = base.clone();
    endpoint.host = host;
    if let Some(port) = port {
        endpoint.port = port;
    }

    Ok(endpoint)
}

/// `YYYY-MM-DD HH:MM:SS` 형식의 시간 파싱 (UTC).
pub fn parse_flag_time(value: &str) -> Result<DateTime<Utc>, ValidationError> {
    NaiveDateTime::parse_from_str(value.trim(), FLAG_TIME_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| ValidationError::InvalidTime(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_host() {
        assert_eq!(parse_host("trade").unwrap(), ("trade".to_string(), None));
        assert_eq!(
            parse_host("trade:8080").unwrap(),
            ("trade".to_string(), Some(8080))
        );
        assert!(parse_host("trade:abc").is_err());
        assert!(parse_host(":8080").is_err());
    }

    #[test]
    fn test_endpoint_for_host_keeps_other_fields() {
        let base = EndpointConfig::default();
        let endpoint = endpoint_for_host(&base, "10.0.0.1:9090").unwrap();

        assert_eq!(endpoint.base_host(), "10.0.0.1:9090");
        assert_eq!(endpoint.scheme, base.scheme);
        assert_eq!(endpoint.base_uri, base.base_uri);

        let endpoint = endpoint_for_host(&base, "other").unwrap();
        assert_eq!(endpoint.base_host(), "other");
    }

    #[test]
    fn test_parse_flag_time() {
        let time = parse_flag_time("2019-03-01 08:30:15").unwrap();
        assert_eq!((time.year(), time.month(), time.day()), (2019, 3, 1));
        assert_eq!((time.hour(), time.minute(), time.second()), (8, 30, 15));

        assert!(matches!(
            parse_flag_time("2019-03-01"),
            Err(ValidationError::InvalidTime(_))
        ));
    }

    #[test]
    fn test_apply_overrides() {
        let args = GlobalArgs {
            host: Some("engine".to_string()),
            port: Some(8443),
            symbol: Some("ETHUSD".to_string()),
            timeout: Some(0),
            ..Default::default()
        };

        let mut config = AppConfig::default();
        args.apply(&mut config);

        assert_eq!(config.endpoint.base_host(), "engine:8443");
        assert_eq!(config.endpoint.symbol, "ETHUSD");
        assert_eq!(config.pipeline.submit_timeout_ms, 0);
        assert_eq!(config.endpoint.scheme, "https");
    }

    #[test]
    fn test_pool_source() {
        let args = GlobalArgs {
            identity: Some("trader@example.com".to_string()),
            password: Some("pass".to_string()),
            ..Default::default()
        };

        let source = args.pool_source(&EndpointConfig::default());
        assert_eq!(source.host, "trade");
        assert_eq!(source.identity.as_deref(), Some("trader@example.com"));
        assert!(source.password.is_some());
        assert!(source.auth_file.is_none());
    }
}
