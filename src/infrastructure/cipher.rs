//! 刷新令牌加密
//!
//! 刷新令牌以密文形式存储，并按密文相等进行查找，因此加密必须是确定性的：
//! 同一密钥下相同明文总是得到相同密文。

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD as BASE64};
use sha2::{Digest, Sha256};

use crate::error::{DbError, DbResult};

const NONCE_SIZE: usize = 12;

/// 可逆的令牌变换
pub trait TokenCipher: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> DbResult<String>;
    fn decrypt(&self, ciphertext: &str) -> DbResult<String>;
}

/// AES-256-GCM，nonce 由 SHA-256(密钥 ‖ 明文) 派生
#[derive(Clone)]
pub struct AesTokenCipher {
    key: [u8; 32],
    cipher: Aes256Gcm,
}

impl AesTokenCipher {
    /// 任意长度的密钥字符串经 SHA-256 得到 256 位密钥
    pub fn new(secret: &str) -> DbResult<Self> {
        let key: [u8; 32] = Sha256::digest(secret.as_bytes()).into();
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| DbError::Cipher(format!("Failed to create cipher: {}", e)))?;
        Ok(Self { key, cipher })
    }

    fn derive_nonce(&self, plaintext: &str) -> [u8; NONCE_SIZE] {
        let digest = Sha256::new()
            .chain_update(b"refresh-token-nonce")
            .chain_update(self.key)
            .chain_update(plaintext.as_bytes())
            .finalize();
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&digest[..NONCE_SIZE]);
        nonce
    }
}

impl TokenCipher for AesTokenCipher {
    fn encrypt(&self, plaintext: &str) -> DbResult<String> {
        let nonce_bytes = self.derive_nonce(plaintext);
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|e| DbError::Cipher(format!("Encryption failed: {}", e)))?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(out))
    }

    fn decrypt(&self, ciphertext: &str) -> DbResult<String> {
        let data = BASE64
            .decode(ciphertext)
            .map_err(|e| DbError::Cipher(format!("Invalid base64 ciphertext: {}", e)))?;
        if data.len() < NONCE_SIZE {
            return Err(DbError::Cipher("Ciphertext too short".into()));
        }

        let (nonce, body) = data.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), body)
            .map_err(|e| DbError::Cipher(format!("Decryption failed: {}", e)))?;
        String::from_utf8(plaintext)
            .map_err(|e| DbError::Cipher(format!("Invalid UTF-8 in plaintext: {}", e)))
    }
}
