//! Token → credential record, and the inverse for token issuers

use serde_json::error::Category;
use tracing::debug;

use super::record::{CredentialRecord, WireRecord};
use crate::crypto::{Decryptor, OpensslAes256Cbc, SecureBytes};
use crate::error::{AccessError, Result};

/// Decrypt `token` with `key` and parse the credential record inside
///
/// Fails closed: either every field is present and valid, or an error is
/// returned.
pub fn decode<D: Decryptor + ?Sized>(decryptor: &D, token: &str, key: &str) -> Result<CredentialRecord> {
    let plaintext = decryptor.decrypt(token, key)?;
    debug!("token decrypted ({} bytes of plaintext)", plaintext.len());

    // a wrong key slips past the padding check now and then; what comes out
    // is not JSON text
    let text = plaintext
        .as_str()
        .map_err(|_| AccessError::DecryptionFailed("plaintext is not UTF-8 (wrong key?)".into()))?;
    let wire: WireRecord = serde_json::from_str(text).map_err(|e| match e.classify() {
        Category::Data => AccessError::MalformedRecord(e.to_string()),
        Category::Syntax | Category::Eof | Category::Io => {
            AccessError::DecryptionFailed(format!("plaintext is not JSON (wrong key?): {}", e))
        }
    })?;
    CredentialRecord::try_from(wire)
}

/// Serialize and encrypt `record` into a token that `decode` accepts
pub fn encode(cipher: &OpensslAes256Cbc, record: &CredentialRecord, key: &str) -> Result<String> {
    let plaintext = SecureBytes::new(serde_json::to_vec(&record.to_wire())?);
    cipher.encrypt(&plaintext, key)
}
