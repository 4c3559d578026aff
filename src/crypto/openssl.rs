//! OpenSSL `enc` compatible password-based encryption
//!
//! Tokens are produced with the equivalent of
//! `openssl enc -aes-256-cbc -pbkdf2 -iter 10000 -base64`, so the layout is:
//!
//! base64( "Salted__" | 8 bytes salt | AES-256-CBC ciphertext )
//!
//! Key and IV are the first 32 and next 16 bytes of
//! PBKDF2-HMAC-SHA256(password, salt, iterations, 48).

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroize;

use super::SecureBytes;
use crate::error::{AccessError, Result};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Magic prefix OpenSSL writes before the salt
pub const SALT_MAGIC: &[u8; 8] = b"Salted__";

pub const SALT_LEN: usize = 8;

/// PBKDF2 iteration count shared with the token producer
pub const DEFAULT_ITERATIONS: u32 = 10_000;

const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;

/// The black-box decrypt service the credential decoder depends on
pub trait Decryptor {
    /// Turn a base64 token into plaintext bytes using `key` as the secret
    fn decrypt(&self, token: &str, key: &str) -> Result<SecureBytes>;
}

/// AES-256-CBC with PBKDF2-HMAC-SHA256 key derivation, OpenSSL framing
#[derive(Debug, Clone, Copy)]
pub struct OpensslAes256Cbc {
    iterations: u32,
}

impl Default for OpensslAes256Cbc {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl OpensslAes256Cbc {
    pub fn with_iterations(iterations: u32) -> Self {
        Self { iterations }
    }

    /// Encrypt `plaintext` into a single-line base64 token
    pub fn encrypt(&self, plaintext: &[u8], key: &str) -> Result<String> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        self.encrypt_with_salt(plaintext, key, &salt)
    }

    fn encrypt_with_salt(&self, plaintext: &[u8], key: &str, salt: &[u8; SALT_LEN]) -> Result<String> {
        let mut material = self.derive(key, salt);
        let cipher = Aes256CbcEnc::new_from_slices(&material[..KEY_LEN], &material[KEY_LEN..])
            .map_err(|e| AccessError::InvalidConfig(format!("cipher setup failed: {}", e)));
        material.zeroize();

        let ciphertext = cipher?.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        let mut blob = Vec::with_capacity(SALT_MAGIC.len() + SALT_LEN + ciphertext.len());
        blob.extend_from_slice(SALT_MAGIC);
        blob.extend_from_slice(salt);
        blob.extend_from_slice(&ciphertext);

        Ok(STANDARD.encode(&blob))
    }

    fn derive(&self, key: &str, salt: &[u8]) -> [u8; KEY_LEN + IV_LEN] {
        let mut out = [0u8; KEY_LEN + IV_LEN];
        pbkdf2::pbkdf2_hmac::<Sha256>(key.as_bytes(), salt, self.iterations, &mut out);
        out
    }
}

impl Decryptor for OpensslAes256Cbc {
    fn decrypt(&self, token: &str, key: &str) -> Result<SecureBytes> {
        // openssl wraps base64 output at 64 columns; accept either form
        let compact: String = token.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let blob = STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| AccessError::DecryptionFailed(format!("invalid base64: {}", e)))?;

        let header_len = SALT_MAGIC.len() + SALT_LEN;
        if blob.len() <= header_len || &blob[..SALT_MAGIC.len()] != SALT_MAGIC {
            return Err(AccessError::DecryptionFailed(
                "missing OpenSSL salt header".to_string(),
            ));
        }

        let salt = &blob[SALT_MAGIC.len()..header_len];
        let mut material = self.derive(key, salt);
        let cipher = Aes256CbcDec::new_from_slices(&material[..KEY_LEN], &material[KEY_LEN..])
            .map_err(|e| AccessError::DecryptionFailed(e.to_string()));
        material.zeroize();

        let plaintext = cipher?
            .decrypt_padded_vec_mut::<Pkcs7>(&blob[header_len..])
            .map_err(|_| AccessError::DecryptionFailed("bad padding".to_string()))?;

        Ok(SecureBytes::new(plaintext))
    }
}
