//! kubeconfig 加密存储
//! ChaCha20-Poly1305，密钥为配置密钥的 SHA-256，存储格式 base64(nonce ‖ ciphertext)

use crate::error::AppError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    ChaCha20Poly1305, Key, Nonce,
};
use secrecy::{ExposeSecret, Secret};
use sha2::{Digest, Sha256};

const NONCE_LEN: usize = 12;

pub struct KubeconfigCipher {
    cipher: ChaCha20Poly1305,
}

impl KubeconfigCipher {
    pub fn new(key: &Secret<String>) -> Self {
        let digest = Sha256::digest(key.expose_secret().as_bytes());
        Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(digest.as_slice())),
        }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, AppError> {
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| AppError::Internal(format!("kubeconfig encryption failed: {}", e)))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(blob))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String, AppError> {
        let blob = BASE64
            .decode(encoded.trim())
            .map_err(|e| AppError::Internal(format!("kubeconfig is not valid base64: {}", e)))?;

        if blob.len() <= NONCE_LEN {
            return Err(AppError::internal_error("kubeconfig ciphertext too short"));
        }

        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| AppError::internal_error("kubeconfig decryption failed"))?;

        String::from_utf8(plaintext)
            .map_err(|_| AppError::internal_error("kubeconfig is not valid UTF-8"))
    }
}
