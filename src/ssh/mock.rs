//! Scripted transport doubles for connector and relay tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::transport::{ChannelEvent, Connection, Dialer, PtyRequest, ShellChannel, TerminalSize};
use crate::error::{AccessError, Result};

/// Shared record of everything the doubles were asked to do
#[derive(Debug, Clone, Default)]
pub struct Probe {
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    resizes: Arc<Mutex<Vec<TerminalSize>>>,
    dials: Arc<AtomicUsize>,
    eofs: Arc<AtomicUsize>,
    channel_closes: Arc<AtomicUsize>,
    connection_closes: Arc<AtomicUsize>,
}

impl Probe {
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    pub fn resizes(&self) -> Vec<TerminalSize> {
        self.resizes.lock().unwrap().clone()
    }

    pub fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    pub fn eofs(&self) -> usize {
        self.eofs.load(Ordering::SeqCst)
    }

    pub fn channel_closes(&self) -> usize {
        self.channel_closes.load(Ordering::SeqCst)
    }

    pub fn connection_closes(&self) -> usize {
        self.connection_closes.load(Ordering::SeqCst)
    }
}

/// Channel that replays a fixed list of events, then either repeats one
/// event forever or goes quiet
pub struct ScriptedChannel {
    script: VecDeque<ChannelEvent>,
    repeat: Option<ChannelEvent>,
    failing_close: bool,
    probe: Probe,
}

impl ScriptedChannel {
    pub fn new(probe: &Probe, script: Vec<ChannelEvent>) -> Self {
        Self {
            script: script.into(),
            repeat: None,
            failing_close: false,
            probe: probe.clone(),
        }
    }

    pub fn repeating(probe: &Probe, event: ChannelEvent) -> Self {
        Self {
            script: VecDeque::new(),
            repeat: Some(event),
            failing_close: false,
            probe: probe.clone(),
        }
    }

    /// Make `close` report an error (after counting the attempt)
    pub fn with_failing_close(mut self) -> Self {
        self.failing_close = true;
        self
    }
}

#[async_trait]
impl ShellChannel for ScriptedChannel {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.probe.sent.lock().unwrap().push(data.to_vec());
        Ok(())
    }

    async fn next_event(&mut self) -> ChannelEvent {
        if let Some(event) = self.script.pop_front() {
            return event;
        }
        match &self.repeat {
            Some(event) => {
                tokio::task::yield_now().await;
                event.clone()
            }
            None => std::future::pending().await,
        }
    }

    async fn send_eof(&mut self) -> Result<()> {
        self.probe.eofs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn resize(&mut self, size: TerminalSize) -> Result<()> {
        self.probe.resizes.lock().unwrap().push(size);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.probe.channel_closes.fetch_add(1, Ordering::SeqCst);
        if self.failing_close {
            return Err(AccessError::Relay("channel already gone".into()));
        }
        Ok(())
    }
}

/// Which step of session setup should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailAt {
    #[default]
    Nothing,
    Dial,
    Auth,
    Shell,
}

pub struct MockConnection {
    fail_at: FailAt,
    script: Vec<ChannelEvent>,
    probe: Probe,
}

impl MockConnection {
    /// An already-established connection whose channel is built separately
    pub fn for_relay(probe: &Probe) -> Self {
        Self {
            fail_at: FailAt::Nothing,
            script: Vec::new(),
            probe: probe.clone(),
        }
    }
}

#[async_trait]
impl Connection for MockConnection {
    type Channel = ScriptedChannel;

    async fn authenticate_password(&mut self, username: &str, _password: &str) -> Result<()> {
        if self.fail_at == FailAt::Auth {
            return Err(AccessError::AuthenticationRejected(username.to_string()));
        }
        Ok(())
    }

    async fn open_shell(&mut self, _pty: &PtyRequest) -> Result<ScriptedChannel> {
        if self.fail_at == FailAt::Shell {
            return Err(AccessError::ChannelFailed("administratively prohibited".into()));
        }
        Ok(ScriptedChannel::new(&self.probe, std::mem::take(&mut self.script)))
    }

    async fn close(&mut self) -> Result<()> {
        self.probe.connection_closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MockDialer {
    pub fail_at: FailAt,
    pub script: Vec<ChannelEvent>,
    pub probe: Probe,
}

impl MockDialer {
    pub fn new(fail_at: FailAt) -> Self {
        Self {
            fail_at,
            script: Vec::new(),
            probe: Probe::default(),
        }
    }
}

#[async_trait]
impl Dialer for MockDialer {
    type Connection = MockConnection;

    async fn dial(&self, host: &str, port: u16) -> Result<MockConnection> {
        self.probe.dials.fetch_add(1, Ordering::SeqCst);
        if self.fail_at == FailAt::Dial {
            return Err(AccessError::Connection(format!("{}:{} unreachable", host, port)));
        }
        Ok(MockConnection {
            fail_at: self.fail_at,
            script: self.script.clone(),
            probe: self.probe.clone(),
        })
    }
}
