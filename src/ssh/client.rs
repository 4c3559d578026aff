//! russh implementation of the transport traits

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Msg};
use russh::{Channel, ChannelMsg, Disconnect};
use russh_keys::key::PublicKey;
use tracing::{debug, trace};

use super::host_keys::HostKeyPolicy;
use super::transport::{ChannelEvent, Connection, Dialer, PtyRequest, ShellChannel, TerminalSize};
use crate::error::{AccessError, Result};

/// russh client handler; only host key verification is customised
pub struct SshClient {
    host: String,
    port: u16,
    host_keys: HostKeyPolicy,
}

impl SshClient {
    pub fn new(host: &str, port: u16, host_keys: HostKeyPolicy) -> Self {
        Self {
            host: host.to_string(),
            port,
            host_keys,
        }
    }
}

#[async_trait]
impl client::Handler for SshClient {
    type Error = AccessError;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        self.host_keys.verify(&self.host, self.port, server_public_key)?;
        Ok(true)
    }
}

/// Opens russh connections with a fixed client configuration
pub struct RusshDialer {
    config: Arc<client::Config>,
    host_keys: HostKeyPolicy,
    connect_timeout: Option<Duration>,
}

impl RusshDialer {
    pub fn new(host_keys: HostKeyPolicy, connect_timeout: Option<Duration>) -> Self {
        let config = client::Config {
            inactivity_timeout: Some(Duration::from_secs(3600)),
            keepalive_interval: Some(Duration::from_secs(30)),
            keepalive_max: 3,
            ..Default::default()
        };

        Self {
            config: Arc::new(config),
            host_keys,
            connect_timeout,
        }
    }
}

#[async_trait]
impl Dialer for RusshDialer {
    type Connection = RusshConnection;

    async fn dial(&self, host: &str, port: u16) -> Result<RusshConnection> {
        let handler = SshClient::new(host, port, self.host_keys.clone());
        let connecting = client::connect(self.config.clone(), (host, port), handler);

        let connected = match self.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, connecting).await.map_err(|_| {
                AccessError::Connection(format!(
                    "timed out after {}s connecting to {}:{}",
                    limit.as_secs(),
                    host,
                    port
                ))
            })?,
            None => connecting.await,
        };
        let handle = connected.map_err(|e| match e {
            AccessError::Connection(detail) => {
                AccessError::Connection(format!("{}:{}: {}", host, port, detail))
            }
            other => other,
        })?;
        debug!("SSH transport established with {}:{}", host, port);

        Ok(RusshConnection { handle })
    }
}

pub struct RusshConnection {
    handle: client::Handle<SshClient>,
}

#[async_trait]
impl Connection for RusshConnection {
    type Channel = RusshChannel;

    async fn authenticate_password(&mut self, username: &str, password: &str) -> Result<()> {
        let accepted = self.handle.authenticate_password(username, password).await?;

        if !accepted {
            return Err(AccessError::AuthenticationRejected(username.to_string()));
        }
        Ok(())
    }

    async fn open_shell(&mut self, pty: &PtyRequest) -> Result<RusshChannel> {
        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| AccessError::ChannelFailed(e.to_string()))?;

        let mut channel = RusshChannel { channel };

        channel
            .channel
            .request_pty(
                true,
                &pty.term,
                pty.size.cols as u32,
                pty.size.rows as u32,
                0,
                0,
                &[],
            )
            .await
            .map_err(|e| AccessError::ChannelFailed(format!("pty request: {}", e)))?;
        channel.await_reply("pty request").await?;

        channel
            .channel
            .request_shell(true)
            .await
            .map_err(|e| AccessError::ChannelFailed(format!("shell request: {}", e)))?;
        channel.await_reply("shell request").await?;

        Ok(channel)
    }

    async fn close(&mut self) -> Result<()> {
        self.handle
            .disconnect(Disconnect::ByApplication, "session closed", "en")
            .await?;
        Ok(())
    }
}

pub struct RusshChannel {
    channel: Channel<Msg>,
}

impl RusshChannel {
    /// Wait for the server to accept or refuse the last request
    async fn await_reply(&mut self, request: &str) -> Result<()> {
        loop {
            let msg = self.channel.wait().await;
            if let Some(outcome) = request_outcome(request, msg.as_ref()) {
                return outcome;
            }
        }
    }
}

/// `None` while the message is unrelated to a pending channel request
fn request_outcome(request: &str, msg: Option<&ChannelMsg>) -> Option<Result<()>> {
    match msg {
        Some(ChannelMsg::Success) => Some(Ok(())),
        Some(ChannelMsg::Failure) => Some(Err(AccessError::ChannelFailed(format!(
            "{} refused by server",
            request
        )))),
        Some(ChannelMsg::Close) | Some(ChannelMsg::Eof) | None => Some(Err(AccessError::ChannelFailed(
            format!("channel closed before {} was answered", request),
        ))),
        Some(_) => {
            trace!("ignoring channel message while waiting for {}", request);
            None
        }
    }
}

fn relay_error(e: russh::Error) -> AccessError {
    AccessError::Relay(e.to_string())
}

#[async_trait]
impl ShellChannel for RusshChannel {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.channel.data(data).await.map_err(relay_error)
    }

    async fn next_event(&mut self) -> ChannelEvent {
        loop {
            let event = match self.channel.wait().await {
                Some(ChannelMsg::Data { data }) => ChannelEvent::Data(data.to_vec()),
                Some(ChannelMsg::ExtendedData { data, .. }) => ChannelEvent::ExtendedData(data.to_vec()),
                Some(ChannelMsg::ExitStatus { exit_status }) => ChannelEvent::ExitStatus(exit_status),
                Some(ChannelMsg::ExitSignal { signal_name, .. }) => {
                    ChannelEvent::ExitSignal(format!("{:?}", signal_name))
                }
                Some(ChannelMsg::Eof) => ChannelEvent::Eof,
                Some(ChannelMsg::Close) | None => ChannelEvent::Closed,
                Some(_) => {
                    trace!("ignoring channel control message");
                    continue;
                }
            };
            return event;
        }
    }

    async fn send_eof(&mut self) -> Result<()> {
        self.channel.eof().await.map_err(relay_error)
    }

    async fn resize(&mut self, size: TerminalSize) -> Result<()> {
        self.channel
            .window_change(size.cols as u32, size.rows as u32, 0, 0)
            .await
            .map_err(relay_error)
    }

    async fn close(&mut self) -> Result<()> {
        self.channel.close().await.map_err(relay_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refused_request_is_a_channel_failure() {
        let outcome = request_outcome("shell request", Some(&ChannelMsg::Failure));
        assert!(matches!(outcome, Some(Err(AccessError::ChannelFailed(ref m))) if m.contains("shell request")));
    }

    #[test]
    fn test_accepted_request() {
        assert!(matches!(
            request_outcome("pty request", Some(&ChannelMsg::Success)),
            Some(Ok(()))
        ));
    }

    #[test]
    fn test_close_before_reply_is_a_channel_failure() {
        assert!(matches!(
            request_outcome("pty request", Some(&ChannelMsg::Close)),
            Some(Err(AccessError::ChannelFailed(_)))
        ));
        assert!(matches!(
            request_outcome("pty request", None),
            Some(Err(AccessError::ChannelFailed(_)))
        ));
    }

    #[test]
    fn test_unrelated_messages_keep_waiting() {
        let msg = ChannelMsg::WindowAdjusted { new_size: 4096 };
        assert!(request_outcome("shell request", Some(&msg)).is_none());
    }
}
