//! Token cryptography
//!
//! - PBKDF2-HMAC-SHA256 + AES-256-CBC in OpenSSL `enc` framing
//! - Zeroizing storage for decrypted plaintext

mod openssl;
mod secure_bytes;

pub use openssl::{Decryptor, OpensslAes256Cbc, DEFAULT_ITERATIONS};
pub use secure_bytes::SecureBytes;
