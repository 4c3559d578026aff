use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AccessError>;

/// Pipeline stage an error was raised in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Setup,
    Decode,
    Validate,
    Connect,
    Session,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Setup => "setup",
            Phase::Decode => "decode",
            Phase::Validate => "validate",
            Phase::Connect => "connect",
            Phase::Session => "session",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("token decryption failed (wrong key or corrupted token): {0}")]
    DecryptionFailed(String),

    #[error("malformed credential record: {0}")]
    MalformedRecord(String),

    #[error("malformed expiry timestamp '{value}': {detail}")]
    MalformedExpiry { value: String, detail: String },

    #[error("access token expired at {0}")]
    Expired(String),

    #[error("SSH connection error: {0}")]
    Connection(String),

    #[error("SSH authentication rejected for user '{0}'")]
    AuthenticationRejected(String),

    #[error("host key for {host} is not in {known_hosts} (fingerprint {fingerprint})")]
    UnknownHostKey {
        host: String,
        known_hosts: String,
        fingerprint: String,
    },

    #[error("host key for {host} does not match {known_hosts} line {line}; possible man-in-the-middle")]
    HostKeyMismatch {
        host: String,
        known_hosts: String,
        line: usize,
    },

    #[error("failed to open shell channel: {0}")]
    ChannelFailed(String),

    #[error("session I/O error: {0}")]
    Relay(String),

    #[error("interrupted, session closed")]
    Interrupted,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AccessError {
    pub fn phase(&self) -> Phase {
        match self {
            AccessError::DecryptionFailed(_) | AccessError::MalformedRecord(_) => Phase::Decode,
            AccessError::MalformedExpiry { .. } | AccessError::Expired(_) => Phase::Validate,
            AccessError::Connection(_)
            | AccessError::AuthenticationRejected(_)
            | AccessError::UnknownHostKey { .. }
            | AccessError::HostKeyMismatch { .. }
            | AccessError::ChannelFailed(_) => Phase::Connect,
            AccessError::Relay(_) | AccessError::Interrupted => Phase::Session,
            AccessError::InvalidConfig(_) | AccessError::Io(_) => Phase::Setup,
        }
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            AccessError::Interrupted => 130,
            _ => 1,
        }
    }
}

// russh reports every transport-level failure through its own error type;
// the handler's error type must absorb it.
impl From<russh::Error> for AccessError {
    fn from(e: russh::Error) -> Self {
        AccessError::Connection(e.to_string())
    }
}

impl From<serde_json::Error> for AccessError {
    fn from(e: serde_json::Error) -> Self {
        AccessError::MalformedRecord(e.to_string())
    }
}
