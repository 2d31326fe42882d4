//! CSV 자격증명 파일 로더.
//!
//! 헤더: `identity,password,api_key,api_secret`
//!
//! - `password`는 암호화된(shadowed) 값이어야 합니다
//! - 검증에 실패한 행은 레코드 번호와 파일 줄 번호를 로그로 남기고 건너뜁니다
//! - 유효한 행이 하나도 없으면 에러

use std::path::Path;

use nge_core::{ApiKey, Credential, NgeError, NgeResult, PasswordShadow, ShadowedPassword};
use serde::Deserialize;
use tracing::{info, warn};

/// 풀에 담을 수 있는 최대 자격증명 수.
pub const MAX_POOL_SIZE: usize = u32::MAX as usize;

#[derive(Debug, Default, Deserialize)]
struct CredentialRecord {
    #[serde(default)]
    identity: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    api_key: String,
    #[serde(default)]
    api_secret: String,
}

/// 레코드를 자격증명으로 변환. 실패 사유를 반환합니다.
fn to_credential(
    record: CredentialRecord,
    shadow: &dyn PasswordShadow,
) -> Result<Credential, String> {
    let password = ShadowedPassword::from_shadowed(record.password);

    if password.is_set() {
        shadow
            .reveal(&password)
            .map_err(|e| format!("password can't be revealed: {}", e))?;
    }

    let credential = Credential::new(
        record.identity,
        password,
        ApiKey::new(record.api_key, record.api_secret),
    );

    if !credential.is_valid() {
        return Err(if credential.password.is_set() {
            "identity is required with password".to_string()
        } else {
            "api_key and api_secret are both required".to_string()
        });
    }

    Ok(credential)
}

/// 검증에 실패한 행. 레코드 번호와 줄 번호는 1부터 셉니다 (줄 번호는 헤더 포함).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    pub record_no: usize,
    pub line: u64,
    pub reason: String,
}

/// 레코드 하나를 검증해 자격증명으로 변환합니다.
fn check_row(
    record_no: usize,
    result: Result<csv::StringRecord, csv::Error>,
    headers: &csv::StringRecord,
    shadow: &dyn PasswordShadow,
) -> Result<Credential, RejectedRow> {
    // 위치를 알 수 없으면 헤더 다음 줄부터 한 줄씩으로 가정
    let fallback_line = record_no as u64 + 1;

    let row = result.map_err(|e| RejectedRow {
        record_no,
        line: e.position().map(|p| p.line()).unwrap_or(fallback_line),
        reason: e.to_string(),
    })?;
    let line = row.position().map(|p| p.line()).unwrap_or(fallback_line);

    row.deserialize::<CredentialRecord>(Some(headers))
        .map_err(|e| e.to_string())
        .and_then(|record| to_credential(record, shadow))
        .map_err(|reason| RejectedRow {
            record_no,
            line,
            reason,
        })
}

/// CSV 입력에서 자격증명과 거부된 행 목록을 읽습니다.
pub fn read_credentials<R: std::io::Read>(
    input: R,
    shadow: &dyn PasswordShadow,
) -> NgeResult<(Vec<Credential>, Vec<RejectedRow>)> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| NgeError::Config(e.to_string()))?
        .clone();

    let mut credentials = Vec::new();
    let mut rejected = Vec::new();

    for (idx, result) in reader.records().enumerate() {
        if credentials.len() >= MAX_POOL_SIZE {
            warn!(
                max = MAX_POOL_SIZE,
                "auth info length can't be longer than max pool size, rest records dropped"
            );
            break;
        }

        match check_row(idx + 1, result, &headers, shadow) {
            Ok(credential) => credentials.push(credential),
            Err(row) => rejected.push(row),
        }
    }

    Ok((credentials, rejected))
}

/// CSV 파일에서 자격증명을 로드합니다.
pub fn load_credentials(
    path: impl AsRef<Path>,
    shadow: &dyn PasswordShadow,
) -> NgeResult<Vec<Credential>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;

    let (credentials, rejected) = read_credentials(file, shadow).map_err(|e| match e {
        NgeError::Config(msg) => NgeError::Config(format!("{}: {}", path.display(), msg)),
        other => other,
    })?;

    for row in &rejected {
        warn!(
            "Record[{}]@line[{}] is invalid: {}",
            row.record_no, row.line, row.reason
        );
    }

    if credentials.is_empty() {
        return Err(NgeError::Config(format!(
            "no valid auth info in file {}",
            path.display()
        )));
    }

    info!(
        path = %path.display(),
        count = credentials.len(),
        skipped = rejected.len(),
        "자격증명 파일 로드 완료"
    );

    Ok(credentials)
}
