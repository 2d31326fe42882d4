//! # 암호화 모듈
//!
//! AES-256-GCM을 사용한 비밀번호 shadowing 기능을 제공합니다.
//!
//! ## 보안 고려사항
//! - 평문 비밀번호는 디스크에 저장하지 않음 (`ShadowedPassword`만 저장)
//! - 마스터 키는 환경변수 또는 키 파일에서 로드
//! - 각 암호화마다 고유한 nonce (12바이트) 사용
//! - 저장 형식: `base64(nonce || ciphertext)`

use std::path::Path;

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::Engine;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// 암호화 에러
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Invalid master key length: expected 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Invalid nonce length: expected 12 bytes, got {0}")]
    InvalidNonceLength(usize),

    #[error("Shadowed password too short: {0} bytes")]
    TruncatedCiphertext(usize),

    #[error("Base64 decode error: {0}")]
    Base64DecodeError(#[from] base64::DecodeError),

    #[error("UTF-8 decode error: {0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),

    #[error("Master key file error: {0}")]
    KeyFile(String),
}

/// AES-256-GCM nonce 크기 (바이트)
pub const NONCE_SIZE: usize = 12;

/// AES-256 키 크기 (바이트)
pub const KEY_SIZE: usize = 32;

/// 암호화된 비밀번호.
///
/// 불투명한 암호문만 보관하며, 평문은 [`PasswordShadow::reveal`]로만 얻을 수 있습니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShadowedPassword(String);

impl ShadowedPassword {
    /// 이미 shadowing된 문자열을 감쌉니다.
    pub fn from_shadowed(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// 비밀번호 설정 여부.
    pub fn is_set(&self) -> bool {
        !self.0.is_empty()
    }

    /// 저장용 문자열.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// 비밀번호 shadow/reveal 기능.
pub trait PasswordShadow: Send + Sync {
    /// 평문 비밀번호를 암호화합니다.
    fn shadow(&self, plain: &SecretString) -> Result<ShadowedPassword, CryptoError>;

    /// 암호화된 비밀번호를 평문으로 되돌립니다.
    fn reveal(&self, shadowed: &ShadowedPassword) -> Result<SecretString, CryptoError>;
}

/// 자격증명 암호화 관리자
pub struct CredentialEncryptor {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for CredentialEncryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialEncryptor").finish_non_exhaustive()
    }
}

impl CredentialEncryptor {
    /// Base64 마스터 키로 암호화 관리자 생성
    ///
    /// # Example
    /// ```ignore
    /// let key = std::env::var("NGECLI_MASTER_KEY")?;
    /// let encryptor = CredentialEncryptor::new(&key)?;
    /// ```
    pub fn new(master_key: &str) -> Result<Self, CryptoError> {
        let key_bytes = Self::decode_key(master_key)?;
        let cipher = Aes256Gcm::new_from_slice(&key_bytes)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        Ok(Self { cipher })
    }

    /// 키 파일에서 마스터 키를 로드합니다. 파일이 없으면 새 키를 생성해 저장합니다.
    pub fn from_key_file(path: impl AsRef<Path>) -> Result<Self, CryptoError> {
        let path = path.as_ref();

        if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| CryptoError::KeyFile(format!("{}: {}", path.display(), e)))?;
            return Self::new(content.trim());
        }

        let key = generate_master_key();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CryptoError::KeyFile(format!("{}: {}", parent.display(), e)))?;
        }
        std::fs::write(path, &key)
            .map_err(|e| CryptoError::KeyFile(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), "새 마스터 키 생성");

        Self::new(&key)
    }

    /// Base64로 인코딩된 마스터 키 디코드
    fn decode_key(master_key: &str) -> Result<Vec<u8>, CryptoError> {
        let key_bytes = base64::engine::general_purpose::STANDARD.decode(master_key)?;

        if key_bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength(key_bytes.len()));
        }

        Ok(key_bytes)
    }

    /// 랜덤 nonce 생성
    pub fn generate_nonce() -> [u8; NONCE_SIZE] {
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);
        nonce
    }

    /// 문자열 암호화
    ///
    /// # Returns
    /// * `(encrypted_data, nonce)` - 암호화된 데이터와 사용된 nonce
    pub fn encrypt(&self, plaintext: &str) -> Result<(Vec<u8>, [u8; NONCE_SIZE]), CryptoError> {
        let nonce_bytes = Self::generate_nonce();
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        Ok((ciphertext, nonce_bytes))
    }

    /// 암호화된 데이터 복호화
    pub fn decrypt(&self, ciphertext: &[u8], nonce: &[u8]) -> Result<String, CryptoError> {
        if nonce.len() != NONCE_SIZE {
            return Err(CryptoError::InvalidNonceLength(nonce.len()));
        }

        let nonce = Nonce::from_slice(nonce);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;

        String::from_utf8(plaintext).map_err(CryptoError::from)
    }
}

impl PasswordShadow for CredentialEncryptor {
    fn shadow(&self, plain: &SecretString) -> Result<ShadowedPassword, CryptoError> {
        let (ciphertext, nonce) = self.encrypt(plain.expose_secret())?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);

        Ok(ShadowedPassword(
            base64::engine::general_purpose::STANDARD.encode(sealed),
        ))
    }

    fn reveal(&self, shadowed: &ShadowedPassword) -> Result<SecretString, CryptoError> {
        let sealed = base64::engine::general_purpose::STANDARD.decode(shadowed.as_str())?;
        if sealed.len() <= NONCE_SIZE {
            return Err(CryptoError::TruncatedCiphertext(sealed.len()));
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
        let plain = self.decrypt(ciphertext, nonce)?;

        Ok(SecretString::from(plain))
    }
}

/// 새로운 마스터 키 생성 (초기 설정용)
///
/// # Example
/// ```
/// let key = nge_core::crypto::generate_master_key();
/// println!("NGECLI_MASTER_KEY={}", key);
/// ```
pub fn generate_master_key() -> String {
    let mut key = [0u8; KEY_SIZE];
    OsRng.fill_bytes(&mut key);
    base64::engine::general_purpose::STANDARD.encode(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_encryptor() -> CredentialEncryptor {
        let key = generate_master_key();
        CredentialEncryptor::new(&key).unwrap()
    }

    #[test]
    fn test_shadow_reveal_password() {
        let encryptor = test_encryptor();
        let plain = SecretString::from("p@ssw0rd!");

        let shadowed = encryptor.shadow(&plain).unwrap();
        assert!(shadowed.is_set());
        assert!(!shadowed.as_str().contains("p@ssw0rd"));

        let revealed = encryptor.reveal(&shadowed).unwrap();
        assert_eq!(revealed.expose_secret(), "p@ssw0rd!");
    }

    #[test]
    fn test_shadow_uses_fresh_nonce() {
        let encryptor = test_encryptor();
        let plain = SecretString::from("same");

        let a = encryptor.shadow(&plain).unwrap();
        let b = encryptor.shadow(&plain).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_reveal_with_other_key_fails() {
        let shadowed = test_encryptor()
            .shadow(&SecretString::from("secret"))
            .unwrap();

        let result = test_encryptor().reveal(&shadowed);
        assert!(matches!(result, Err(CryptoError::DecryptionFailed(_))));
    }

    #[test]
    fn test_reveal_garbage_fails() {
        let encryptor = test_encryptor();

        let not_base64 = ShadowedPassword::from_shadowed("%%%not-base64%%%");
        assert!(matches!(
            encryptor.reveal(&not_base64),
            Err(CryptoError::Base64DecodeError(_))
        ));

        let short = ShadowedPassword::from_shadowed("AAAA");
        assert!(matches!(
            encryptor.reveal(&short),
            Err(CryptoError::TruncatedCiphertext(3))
        ));
    }

    #[test]
    fn test_invalid_key_length() {
        let short_key = base64::engine::general_purpose::STANDARD.encode([0u8; 16]);
        let result = CredentialEncryptor::new(&short_key);
        assert!(matches!(result, Err(CryptoError::InvalidKeyLength(16))));
    }

    #[test]
    fn test_key_file_created_then_reused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("master.key");

        let first = CredentialEncryptor::from_key_file(&path).unwrap();
        assert!(path.exists());

        let shadowed = first.shadow(&SecretString::from("hello")).unwrap();

        // 같은 키 파일에서 다시 로드하면 복호화 가능
        let second = CredentialEncryptor::from_key_file(&path).unwrap();
        assert_eq!(second.reveal(&shadowed).unwrap().expose_secret(), "hello");
    }
}
