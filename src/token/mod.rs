//! Access tokens: decoding, validity checks, and issuing

mod decode;
mod expiry;
mod record;

pub use decode::{decode, encode};
pub use expiry::{parse_expiry, validate, validate_now, EXPIRY_FORMAT};
pub use record::CredentialRecord;
