//! 로그인 및 로그인 정보 저장 명령어.
//!
//! 호스트마다 identity와 비밀번호를 입력받아 로그인하고, 성공하면 호스트별로
//! 암호화된 로그인 정보를 저장합니다.

use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use nge_auth::{CredentialPool, CredentialStore, PoolSource};
use nge_core::{AppConfig, EndpointConfig, PasswordShadow};
use secrecy::SecretString;
use tracing::{info, warn};

use crate::session::rest_client;
use crate::settings::endpoint_for_host;

/// 로그인 대상 호스트 목록. 비어 있으면 설정의 호스트를 사용합니다.
#[derive(Debug, Clone, Default)]
pub struct LoginConfig {
    pub hosts: Vec<String>,
}

/// 프롬프트를 출력하고 한 줄을 읽습니다 (줄바꿈 제거).
pub fn read_line<R, W>(prompt: &str, input: &mut R, prompt_out: &mut W) -> Result<String>
where
    R: BufRead,
    W: Write,
{
    write!(prompt_out, "{}", prompt)?;
    prompt_out.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;

    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// 로그인 대상 접속 설정 목록. 잘못된 호스트는 경고 후 건너뜁니다.
fn targets(config: &AppConfig, hosts: &[String]) -> Vec<EndpointConfig> {
    if hosts.is_empty() {
        return vec![config.endpoint.clone()];
    }

    hosts
        .iter()
        .filter_map(|host| match endpoint_for_host(&config.endpoint, host) {
            Ok(endpoint) => Some(endpoint),
            Err(e) => {
                warn!(error = %e, "호스트 건너뜀");
                None
            }
        })
        .collect()
}

/// 각 호스트에 로그인하고 로그인 정보를 저장합니다. 저장한 호스트 수를 반환합니다.
pub async fn login_hosts<R, W>(
    config: &AppConfig,
    login: LoginConfig,
    shadow: Arc<dyn PasswordShadow>,
    input: &mut R,
    prompt_out: &mut W,
) -> Result<usize>
where
    R: BufRead,
    W: Write,
{
    let targets = targets(config, &login.hosts);
    if targets.is_empty() {
        bail!("no valid host to login");
    }

    let mut store = CredentialStore::load(config.paths.auth_store_path())?;
    let mut saved = 0;

    for endpoint in targets {
        let host = endpoint.base_host();
        let rest = rest_client(&endpoint)?;
        info!(base_path = %endpoint.base_path(), "Change host");

        let pool = CredentialPool::new(
            PoolSource {
                host: host.clone(),
                ..Default::default()
            },
            rest,
            shadow.clone(),
            store,
        )?;

        let identity = read_line("Identity: ", input, prompt_out)?;
        let password = SecretString::from(read_line("Password: ", input, prompt_out)?);

        pool.login(&identity, &password)
            .await
            .context("Login failed.")?;
        pool.set_login_info(&host, &identity, &password).await?;
        info!(host = %host, identity = %identity, "로그인 성공");

        store = pool.into_store();
        saved += 1;
    }

    store.write()?;
    Ok(saved)
}
