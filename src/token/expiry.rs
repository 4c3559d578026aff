//! Token validity window

use chrono::{Local, NaiveDateTime};

use super::CredentialRecord;
use crate::error::{AccessError, Result};

/// `expires` format, interpreted in local time
pub const EXPIRY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn parse_expiry(value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, EXPIRY_FORMAT).map_err(|e| AccessError::MalformedExpiry {
        value: value.to_string(),
        detail: e.to_string(),
    })
}

/// Check `record` against `now`, returning the parsed expiry on success
///
/// The boundary is inclusive: a token whose expiry equals `now` is valid.
pub fn validate(record: &CredentialRecord, now: NaiveDateTime) -> Result<NaiveDateTime> {
    let expires = parse_expiry(record.expires())?;

    if now > expires {
        return Err(AccessError::Expired(record.expires().to_string()));
    }

    Ok(expires)
}

/// `validate` against the local wall clock
pub fn validate_now(record: &CredentialRecord) -> Result<NaiveDateTime> {
    validate(record, Local::now().naive_local())
}
