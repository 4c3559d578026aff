//! Token → interactive shell

use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use colored::Colorize;
use secrecy::ExposeSecret;
use tokio::io::BufReader;
use tracing::{debug, info, warn};

use super::terminal::{self, RawModeGuard};
use crate::config::ClientConfig;
use crate::crypto::{Decryptor, OpensslAes256Cbc};
use crate::error::Result;
use crate::ssh::{self, Connection, Dialer, PtyRequest, RelayExit, RusshDialer, SessionHandle};
use crate::token;

/// Decode and check the token, then connect
///
/// Nothing touches the network unless the token decrypts to a complete,
/// unexpired record. The record does not outlive this call.
pub async fn bootstrap<D, N>(
    token: &str,
    key: &str,
    now: NaiveDateTime,
    decryptor: &D,
    dialer: &N,
    pty: &PtyRequest,
) -> Result<SessionHandle<N::Connection>>
where
    D: Decryptor + ?Sized,
    N: Dialer + ?Sized,
{
    let record = token::decode(decryptor, token, key)?;
    let expires = token::validate(&record, now)?;
    info!(
        "Token for {} valid until {}",
        record.connection_string(),
        expires
    );

    ssh::connect(dialer, &record, pty).await
}

pub fn run(config: ClientConfig) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;

    let result = runtime.block_on(connect_and_run(config));

    // the stdin reader may still be parked in a blocking read()
    runtime.shutdown_timeout(Duration::from_millis(100));

    match result? {
        RelayExit::RemoteClosed { .. } => eprintln!("{}", "Connection closed.".dimmed()),
        RelayExit::LocalEof => eprintln!("{}", "Input closed, session ended.".dimmed()),
    }
    Ok(())
}

async fn connect_and_run(config: ClientConfig) -> Result<RelayExit> {
    let size = terminal::local_size();
    let pty = PtyRequest {
        term: config.term.clone(),
        size,
    };
    let dialer = RusshDialer::new(config.host_keys.clone(), config.connect_timeout);

    let handle = bootstrap(
        &config.token,
        config.key.expose_secret(),
        Local::now().naive_local(),
        &OpensslAes256Cbc::default(),
        &dialer,
        &pty,
    )
    .await?;
    drop(config);

    let interactive = terminal::is_interactive();
    let raw_mode = if interactive {
        RawModeGuard::enable().map(Some)
    } else {
        Ok(None)
    };
    let (handle, _raw_mode) = close_on_error(handle, raw_mode).await?;
    let (resizes, watcher) = if interactive {
        let (rx, task) = terminal::watch_resizes(size);
        (Some(rx), Some(task))
    } else {
        (None, None)
    };

    let mut input = BufReader::new(tokio::io::stdin());
    let mut output = tokio::io::stdout();

    let result = ssh::run_relay(handle, &mut input, &mut output, resizes, interrupted()).await;

    if let Some(task) = watcher {
        task.abort();
    }
    result
}

/// Pass `step` through with the session, or close the session and fail
async fn close_on_error<C: Connection, T>(
    handle: SessionHandle<C>,
    step: Result<T>,
) -> Result<(SessionHandle<C>, T)> {
    match step {
        Ok(value) => Ok((handle, value)),
        Err(e) => {
            if let Err(close_err) = handle.close().await {
                debug!("closing session: {}", close_err);
            }
            Err(e)
        }
    }
}

/// Resolves on SIGINT, and on unix also on SIGTERM or SIGHUP
async fn interrupted() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("cannot listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::SignalKind;

        tokio::select! {
            _ = ctrl_c => info!("Received SIGINT, closing session"),
            _ = unix_signal(SignalKind::terminate()) => info!("Received SIGTERM, closing session"),
            _ = unix_signal(SignalKind::hangup()) => info!("Received SIGHUP, closing session"),
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
        info!("Received Ctrl+C, closing session");
    }
}

#[cfg(unix)]
async fn unix_signal(kind: tokio::signal::unix::SignalKind) {
    match tokio::signal::unix::signal(kind) {
        Ok(mut signal) => {
            signal.recv().await;
        }
        Err(e) => {
            warn!("cannot install signal handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AccessError, Phase};
    use crate::ssh::mock::{FailAt, MockDialer};
    use crate::ssh::TerminalSize;
    use crate::token::{parse_expiry, CredentialRecord};

    const KEY: &str = "operator-shared-key";

    fn cipher() -> OpensslAes256Cbc {
        OpensslAes256Cbc::with_iterations(1000)
    }

    fn pty() -> PtyRequest {
        PtyRequest {
            term: "xterm".into(),
            size: TerminalSize::default(),
        }
    }

    fn now() -> NaiveDateTime {
        parse_expiry("2030-06-01 09:00:00").unwrap()
    }

    fn issue(expires: &str) -> String {
        let record = CredentialRecord::new("10.0.0.7", 22, "contractor", "pw", expires).unwrap();
        token::encode(&cipher(), &record, KEY).unwrap()
    }

    #[tokio::test]
    async fn test_valid_token_connects_once() {
        let dialer = MockDialer::new(FailAt::Nothing);
        let token = issue("2030-06-01 10:00:00");

        let handle = bootstrap(&token, KEY, now(), &cipher(), &dialer, &pty())
            .await
            .unwrap();

        assert_eq!(dialer.probe.dials(), 1);
        handle.close().await.unwrap();
        assert_eq!(dialer.probe.connection_closes(), 1);
    }

    #[tokio::test]
    async fn test_expired_token_never_dials() {
        let dialer = MockDialer::new(FailAt::Nothing);
        let token = issue("2030-06-01 08:59:59");

        let err = bootstrap(&token, KEY, now(), &cipher(), &dialer, &pty())
            .await
            .err()
            .unwrap();

        assert!(matches!(err, AccessError::Expired(_)));
        assert_eq!(dialer.probe.dials(), 0);
    }

    #[tokio::test]
    async fn test_wrong_key_never_dials() {
        let dialer = MockDialer::new(FailAt::Nothing);
        let token = issue("2030-06-01 10:00:00");

        let err = bootstrap(&token, "not-the-key", now(), &cipher(), &dialer, &pty())
            .await
            .err()
            .unwrap();

        assert_eq!(err.phase(), Phase::Decode);
        assert_eq!(dialer.probe.dials(), 0);
    }

    #[tokio::test]
    async fn test_malformed_record_never_dials() {
        let dialer = MockDialer::new(FailAt::Nothing);
        let bodies = [
            r#"{"host":"h","port":22,"username":"u","expires":"2030-06-01 10:00:00"}"#,
            r#"{"host":"h","port":0,"username":"u","password":"p","expires":"2030-06-01 10:00:00"}"#,
            r#"{"host":"h","port":22,"username":"u","password":"p","expires":"soon"}"#,
        ];

        for body in bodies {
            let token = cipher().encrypt(body.as_bytes(), KEY).unwrap();
            let err = bootstrap(&token, KEY, now(), &cipher(), &dialer, &pty())
                .await
                .err()
                .unwrap();
            assert!(
                matches!(err.phase(), Phase::Decode | Phase::Validate),
                "{}: {}",
                body,
                err
            );
        }

        assert_eq!(dialer.probe.dials(), 0);
    }

    #[tokio::test]
    async fn test_failed_terminal_setup_closes_session() {
        let dialer = MockDialer::new(FailAt::Nothing);
        let token = issue("2030-06-01 10:00:00");
        let handle = bootstrap(&token, KEY, now(), &cipher(), &dialer, &pty())
            .await
            .unwrap();

        let setup: Result<()> = Err(AccessError::Io(std::io::Error::other("tcsetattr: EIO")));
        let err = close_on_error(handle, setup).await.err().unwrap();

        assert!(matches!(err, AccessError::Io(_)));
        assert_eq!(dialer.probe.channel_closes(), 1);
        assert_eq!(dialer.probe.connection_closes(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_a_connect_error() {
        let dialer = MockDialer::new(FailAt::Dial);
        let token = issue("2030-06-01 10:00:00");

        let err = bootstrap(&token, KEY, now(), &cipher(), &dialer, &pty())
            .await
            .err()
            .unwrap();

        assert_eq!(err.phase(), Phase::Connect);
        assert!(err.to_string().contains("10.0.0.7:22"));
    }
}
