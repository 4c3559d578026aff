//! Server host key verification

use std::path::{Path, PathBuf};

use russh_keys::key::PublicKey;
use tracing::{debug, info, warn};

use crate::error::{AccessError, Result};

/// How the client decides whether to trust a server's host key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostKeyPolicy {
    /// Trust every key offered. Leaves the session open to
    /// man-in-the-middle attacks; kept for hosts whose keys rotate with
    /// every token.
    AcceptAny,
    /// Trust on first use: unknown hosts are appended to the file, changed
    /// keys are rejected
    AcceptNew(PathBuf),
    /// Only hosts already present in the file are trusted
    Strict(PathBuf),
}

impl HostKeyPolicy {
    pub fn verify(&self, host: &str, port: u16, key: &PublicKey) -> Result<()> {
        let fingerprint = key.fingerprint();

        let known_hosts = match self {
            HostKeyPolicy::AcceptAny => {
                warn!(
                    "Host key checking disabled; accepting {}:{} with fingerprint SHA256:{}",
                    host, port, fingerprint
                );
                return Ok(());
            }
            HostKeyPolicy::AcceptNew(path) | HostKeyPolicy::Strict(path) => path,
        };

        match russh_keys::check_known_hosts_path(host, port, key, known_hosts) {
            Ok(true) => {
                debug!("Host key for {}:{} matches {}", host, port, known_hosts.display());
                Ok(())
            }
            Ok(false) => match self {
                HostKeyPolicy::AcceptNew(_) => learn(host, port, key, known_hosts, &fingerprint),
                _ => Err(AccessError::UnknownHostKey {
                    host: display_host(host, port),
                    known_hosts: known_hosts.display().to_string(),
                    fingerprint: format!("SHA256:{}", fingerprint),
                }),
            },
            Err(russh_keys::Error::KeyChanged { line }) => Err(AccessError::HostKeyMismatch {
                host: display_host(host, port),
                known_hosts: known_hosts.display().to_string(),
                line,
            }),
            Err(e) => Err(AccessError::Connection(format!(
                "cannot read {}: {}",
                known_hosts.display(),
                e
            ))),
        }
    }
}

fn learn(host: &str, port: u16, key: &PublicKey, known_hosts: &Path, fingerprint: &str) -> Result<()> {
    russh_keys::learn_known_hosts_path(host, port, key, known_hosts).map_err(|e| {
        AccessError::Connection(format!(
            "cannot record host key in {}: {}",
            known_hosts.display(),
            e
        ))
    })?;
    info!(
        "Permanently added {} (SHA256:{}) to {}",
        display_host(host, port),
        fingerprint,
        known_hosts.display()
    );
    Ok(())
}

fn display_host(host: &str, port: u16) -> String {
    format!("{}:{}", host, port)
}
