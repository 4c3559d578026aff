//! Command-line arguments and resolved client configuration

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser, ValueEnum};
use secrecy::SecretString;

use crate::cli;
use crate::error::{AccessError, Result};
use crate::ssh::HostKeyPolicy;

/// Terminal type requested when $TERM is unset
pub const DEFAULT_TERM: &str = "xterm-256color";

/// Passing this as the key makes the client prompt for it instead
pub const PROMPT_KEY: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HostKeyCheck {
    /// Trust any host key (insecure)
    AcceptAny,
    /// Record unknown hosts, reject changed keys
    AcceptNew,
    /// Reject hosts missing from known_hosts
    Strict,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "temp-ssh-access-client")]
#[command(version)]
#[command(about = "Open a time-limited SSH shell from an encrypted access token", long_about = None)]
pub struct Args {
    /// Base64 encrypted access token
    #[arg(value_name = "ENCRYPTED_TOKEN")]
    pub token: String,

    /// Key that decrypts the token ("-" to prompt for it)
    #[arg(value_name = "DECRYPT_KEY")]
    pub key: String,

    /// Host key verification policy
    #[arg(
        long,
        value_enum,
        default_value_t = HostKeyCheck::AcceptNew,
        env = "TEMP_SSH_HOST_KEY_CHECK"
    )]
    pub host_key_check: HostKeyCheck,

    /// known_hosts file (default: ~/.ssh/known_hosts)
    #[arg(long, env = "TEMP_SSH_KNOWN_HOSTS")]
    pub known_hosts: Option<PathBuf>,

    /// Give up connecting after this many seconds (0 = wait indefinitely)
    #[arg(long, value_name = "SECS", env = "TEMP_SSH_CONNECT_TIMEOUT")]
    pub connect_timeout: Option<u64>,

    /// Terminal type for the remote pty
    #[arg(long, env = "TERM", default_value = DEFAULT_TERM)]
    pub term: String,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

/// Validated configuration for one client run
#[derive(Debug)]
pub struct ClientConfig {
    pub token: String,
    pub key: SecretString,
    pub host_keys: HostKeyPolicy,
    pub connect_timeout: Option<Duration>,
    pub term: String,
}

impl ClientConfig {
    pub fn from_args(args: Args) -> Result<Self> {
        let key = if args.key == PROMPT_KEY {
            cli::prompt_secret("Decryption key: ")?
        } else {
            args.key
        };

        Self::resolve(args.token, key, args.host_key_check, args.known_hosts, args.connect_timeout, args.term)
    }

    fn resolve(
        token: String,
        key: String,
        check: HostKeyCheck,
        known_hosts: Option<PathBuf>,
        connect_timeout: Option<u64>,
        term: String,
    ) -> Result<Self> {
        let mut errors = Vec::new();

        if token.trim().is_empty() {
            errors.push("encrypted token is empty".to_string());
        }
        if key.is_empty() {
            errors.push("decryption key is empty".to_string());
        }

        let host_keys = match check {
            HostKeyCheck::AcceptAny => Ok(HostKeyPolicy::AcceptAny),
            HostKeyCheck::AcceptNew | HostKeyCheck::Strict => known_hosts
                .or_else(default_known_hosts)
                .map(|path| match check {
                    HostKeyCheck::Strict => HostKeyPolicy::Strict(path),
                    _ => HostKeyPolicy::AcceptNew(path),
                })
                .ok_or_else(|| "cannot locate home directory; pass --known-hosts".to_string()),
        };
        if let Err(ref e) = host_keys {
            errors.push(e.clone());
        }

        if !errors.is_empty() {
            return Err(AccessError::InvalidConfig(errors.join("; ")));
        }

        Ok(Self {
            token,
            key: SecretString::new(key),
            host_keys: host_keys.map_err(AccessError::InvalidConfig)?,
            connect_timeout: connect_timeout.filter(|s| *s > 0).map(Duration::from_secs),
            term: if term.trim().is_empty() {
                DEFAULT_TERM.to_string()
            } else {
                term
            },
        })
    }
}

fn default_known_hosts() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".ssh").join("known_hosts"))
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    fn resolve(check: HostKeyCheck, known_hosts: Option<&str>) -> Result<ClientConfig> {
        ClientConfig::resolve(
            "U2FsdGVkX1+abc".into(),
            "key".into(),
            check,
            known_hosts.map(PathBuf::from),
            None,
            "vt100".into(),
        )
    }

    #[test]
    fn test_two_positionals_required() {
        assert!(Args::try_parse_from(["temp-ssh-access-client"]).is_err());
        assert!(Args::try_parse_from(["temp-ssh-access-client", "token"]).is_err());
        assert!(Args::try_parse_from(["temp-ssh-access-client", "token", "key", "extra"]).is_err());

        let args = Args::try_parse_from(["temp-ssh-access-client", "token", "key"]).unwrap();
        assert_eq!(args.token, "token");
        assert_eq!(args.key, "key");
    }

    #[test]
    fn test_usage_errors_go_to_stderr() {
        let err = Args::try_parse_from(["temp-ssh-access-client", "token"]).unwrap_err();
        assert!(err.use_stderr());

        let help = Args::try_parse_from(["temp-ssh-access-client", "--help"]).unwrap_err();
        assert!(!help.use_stderr());
    }

    #[test]
    fn test_host_key_check_flag() {
        let args = Args::try_parse_from([
            "temp-ssh-access-client",
            "--host-key-check",
            "strict",
            "--known-hosts",
            "/tmp/kh",
            "token",
            "key",
        ])
        .unwrap();

        assert_eq!(args.host_key_check, HostKeyCheck::Strict);
        assert_eq!(args.known_hosts, Some(PathBuf::from("/tmp/kh")));
    }

    #[test]
    fn test_resolve_policies() {
        let config = resolve(HostKeyCheck::AcceptAny, None).unwrap();
        assert_eq!(config.host_keys, HostKeyPolicy::AcceptAny);

        let config = resolve(HostKeyCheck::Strict, Some("/tmp/kh")).unwrap();
        assert_eq!(config.host_keys, HostKeyPolicy::Strict(PathBuf::from("/tmp/kh")));

        let config = resolve(HostKeyCheck::AcceptNew, Some("/tmp/kh")).unwrap();
        assert_eq!(config.host_keys, HostKeyPolicy::AcceptNew(PathBuf::from("/tmp/kh")));
        assert_eq!(config.key.expose_secret(), "key");
        assert_eq!(config.term, "vt100");
    }

    #[test]
    fn test_connect_timeout_zero_disables() {
        let config = ClientConfig::resolve(
            "t".into(),
            "k".into(),
            HostKeyCheck::AcceptAny,
            None,
            Some(0),
            String::new(),
        )
        .unwrap();
        assert_eq!(config.connect_timeout, None);
        assert_eq!(config.term, DEFAULT_TERM);

        let config = ClientConfig::resolve(
            "t".into(),
            "k".into(),
            HostKeyCheck::AcceptAny,
            None,
            Some(15),
            "xterm".into(),
        )
        .unwrap();
        assert_eq!(config.connect_timeout, Some(Duration::from_secs(15)));
    }

    #[test]
    fn test_empty_token_and_key_reported_together() {
        let err = ClientConfig::resolve(
            "  ".into(),
            String::new(),
            HostKeyCheck::AcceptAny,
            None,
            None,
            "xterm".into(),
        )
        .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("token is empty"));
        assert!(message.contains("key is empty"));
    }
}
