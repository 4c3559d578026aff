//! Credential record carried inside an access token

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::{AccessError, Result};

/// Decrypted access credentials
///
/// Fields are private; once decoded a record cannot be modified. The
/// password is zeroized when the record is dropped and is redacted from
/// `Debug` output.
#[derive(Debug)]
pub struct CredentialRecord {
    host: String,
    port: u16,
    username: String,
    password: SecretString,
    expires: String,
}

impl CredentialRecord {
    /// Build a record, enforcing the same constraints as decoding
    pub fn new(
        host: impl Into<String>,
        port: u32,
        username: impl Into<String>,
        password: impl Into<String>,
        expires: impl Into<String>,
    ) -> Result<Self> {
        let host = host.into();
        let username = username.into();

        if host.trim().is_empty() {
            return Err(AccessError::MalformedRecord("host is empty".into()));
        }
        if username.is_empty() {
            return Err(AccessError::MalformedRecord("username is empty".into()));
        }
        let port = u16::try_from(port)
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| AccessError::MalformedRecord(format!("port {} is outside 1-65535", port)))?;

        Ok(Self {
            host,
            port,
            username,
            password: SecretString::new(password.into()),
            expires: expires.into(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &SecretString {
        &self.password
    }

    /// Raw expiry string, `YYYY-MM-DD HH:MM:SS` local time
    pub fn expires(&self) -> &str {
        &self.expires
    }

    /// user@host or user@host:port
    pub fn connection_string(&self) -> String {
        if self.port == 22 {
            format!("{}@{}", self.username, self.host)
        } else {
            format!("{}@{}:{}", self.username, self.host, self.port)
        }
    }

    pub(super) fn to_wire(&self) -> WireRecordRef<'_> {
        WireRecordRef {
            host: &self.host,
            port: self.port,
            username: &self.username,
            password: self.password.expose_secret(),
            expires: &self.expires,
        }
    }
}

/// JSON shape of a decrypted token
#[derive(Deserialize)]
pub(super) struct WireRecord {
    host: String,
    port: WirePort,
    username: String,
    password: String,
    expires: String,
}

/// Token producers write the port either as a number or as a string
#[derive(Deserialize)]
#[serde(untagged)]
enum WirePort {
    Number(i64),
    Text(String),
}

impl WirePort {
    fn resolve(self) -> Result<u32> {
        let value = match self {
            WirePort::Number(n) => n,
            WirePort::Text(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| AccessError::MalformedRecord(format!("port '{}' is not a number", s)))?,
        };
        u32::try_from(value)
            .map_err(|_| AccessError::MalformedRecord(format!("port {} is outside 1-65535", value)))
    }
}

impl TryFrom<WireRecord> for CredentialRecord {
    type Error = AccessError;

    fn try_from(wire: WireRecord) -> Result<Self> {
        let port = wire.port.resolve()?;
        Self::new(wire.host, port, wire.username, wire.password, wire.expires)
    }
}

#[derive(Serialize)]
pub(super) struct WireRecordRef<'a> {
    host: &'a str,
    port: u16,
    username: &'a str,
    password: &'a str,
    expires: &'a str,
}
