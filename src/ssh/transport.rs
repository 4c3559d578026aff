//! Transport traits the connector and relay are written against
//!
//! `client.rs` implements them on top of russh; tests plug in scripted
//! doubles.

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalSize {
    pub cols: u16,
    pub rows: u16,
}

impl Default for TerminalSize {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}

/// Pseudo-terminal requested together with the shell
#[derive(Debug, Clone)]
pub struct PtyRequest {
    pub term: String,
    pub size: TerminalSize,
}

/// Something that happened on the remote end of a shell channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Data(Vec<u8>),
    ExtendedData(Vec<u8>),
    ExitStatus(u32),
    ExitSignal(String),
    Eof,
    Closed,
}

#[async_trait]
pub trait ShellChannel: Send {
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Wait for the next remote event. Must be cancel safe: the relay drops
    /// this future whenever another source becomes ready first.
    async fn next_event(&mut self) -> ChannelEvent;

    async fn send_eof(&mut self) -> Result<()>;

    async fn resize(&mut self, size: TerminalSize) -> Result<()>;

    async fn close(&mut self) -> Result<()>;
}

#[async_trait]
pub trait Connection: Send {
    type Channel: ShellChannel;

    async fn authenticate_password(&mut self, username: &str, password: &str) -> Result<()>;

    /// Open a session channel with a PTY and start the login shell
    async fn open_shell(&mut self, pty: &PtyRequest) -> Result<Self::Channel>;

    async fn close(&mut self) -> Result<()>;
}

#[async_trait]
pub trait Dialer: Send + Sync {
    type Connection: Connection;

    async fn dial(&self, host: &str, port: u16) -> Result<Self::Connection>;
}

/// An authenticated connection together with its open shell channel
///
/// `close` consumes the handle, so channel and connection are released at
/// most once.
pub struct SessionHandle<C: Connection> {
    connection: C,
    channel: C::Channel,
}

impl<C: Connection> SessionHandle<C> {
    pub fn new(connection: C, channel: C::Channel) -> Self {
        Self { connection, channel }
    }

    pub fn channel_mut(&mut self) -> &mut C::Channel {
        &mut self.channel
    }

    /// Close the channel, then the connection; both are attempted even if
    /// the first fails
    pub async fn close(mut self) -> Result<()> {
        let channel = self.channel.close().await;
        if let Err(ref e) = channel {
            debug!("closing shell channel failed: {}", e);
        }
        let connection = self.connection.close().await;
        channel.and(connection)
    }
}
