//! Interactive relay between the local terminal and a remote shell

use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::transport::{ChannelEvent, Connection, SessionHandle, ShellChannel, TerminalSize};
use crate::error::{AccessError, Result};

/// How long to wait for the channel close once the remote sent EOF
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Why the relay stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayExit {
    /// The remote side closed the channel, or went quiet after EOF
    RemoteClosed { exit_status: Option<u32> },
    /// Local input ran out; EOF was forwarded before closing
    LocalEof,
}

/// Copy bytes both ways until either side finishes
///
/// Remote output is written to `output` as it arrives; every byte read from
/// `input` is sent as its own channel write. `resizes` carries local window
/// size changes. When `interrupt` resolves the session is torn down and
/// `AccessError::Interrupted` returned.
///
/// The session handle is closed exactly once on every path out of this
/// function.
pub async fn run_relay<C, R, W, F>(
    mut handle: SessionHandle<C>,
    input: &mut R,
    output: &mut W,
    resizes: Option<mpsc::Receiver<TerminalSize>>,
    interrupt: F,
) -> Result<RelayExit>
where
    C: Connection,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    F: Future<Output = ()>,
{
    let result = run_event_loop(handle.channel_mut(), input, output, resizes, interrupt).await;

    if let Err(e) = output.flush().await {
        debug!("flushing local output: {}", e);
    }
    if let Err(e) = handle.close().await {
        debug!("closing session: {}", e);
    }

    match &result {
        Ok(exit) => debug!("relay finished: {:?}", exit),
        Err(e) => debug!("relay aborted: {}", e),
    }
    result
}

async fn run_event_loop<Ch, R, W, F>(
    channel: &mut Ch,
    input: &mut R,
    output: &mut W,
    mut resizes: Option<mpsc::Receiver<TerminalSize>>,
    interrupt: F,
) -> Result<RelayExit>
where
    Ch: ShellChannel + ?Sized,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    F: Future<Output = ()>,
{
    tokio::pin!(interrupt);

    let mut keystroke = [0u8; 1];
    let mut exit_status = None;
    let mut remote_eof: Option<Instant> = None;

    loop {
        tokio::select! {
            event = channel.next_event() => match event {
                ChannelEvent::Data(data) | ChannelEvent::ExtendedData(data) => {
                    if data.is_empty() {
                        continue;
                    }
                    write_out(output, &data).await?;
                }
                ChannelEvent::ExitStatus(code) => {
                    debug!("remote shell exited with status {}", code);
                    exit_status = Some(code);
                }
                ChannelEvent::ExitSignal(signal) => {
                    warn!("remote shell terminated by signal {}", signal);
                }
                ChannelEvent::Eof => {
                    // exit-status usually follows EOF; wait for the close
                    debug!("remote sent EOF");
                    if remote_eof.is_none() {
                        remote_eof = Some(Instant::now() + CLOSE_GRACE);
                    }
                }
                ChannelEvent::Closed => {
                    return Ok(RelayExit::RemoteClosed { exit_status });
                }
            },

            _ = sleep_until_opt(remote_eof) => {
                debug!("remote never closed the channel after EOF");
                return Ok(RelayExit::RemoteClosed { exit_status });
            }

            read = input.read(&mut keystroke) => match read {
                Ok(0) => {
                    debug!("local input reached EOF");
                    if let Err(e) = channel.send_eof().await {
                        debug!("forwarding EOF: {}", e);
                    }
                    return Ok(RelayExit::LocalEof);
                }
                Ok(_) => channel.send(&keystroke).await?,
                Err(e) => {
                    return Err(AccessError::Relay(format!("reading local input: {}", e)));
                }
            },

            size = next_resize(&mut resizes) => match size {
                Some(size) => {
                    if let Err(e) = channel.resize(size).await {
                        debug!("window change: {}", e);
                    }
                }
                None => resizes = None,
            },

            _ = &mut interrupt => return Err(AccessError::Interrupted),
        }
    }
}

async fn write_out<W: AsyncWrite + Unpin>(output: &mut W, data: &[u8]) -> Result<()> {
    output
        .write_all(data)
        .await
        .map_err(|e| AccessError::Relay(format!("writing to terminal: {}", e)))?;
    output
        .flush()
        .await
        .map_err(|e| AccessError::Relay(format!("flushing terminal: {}", e)))
}

/// Never resolves until the remote has sent EOF
async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Next resize notification; never resolves when there is no watcher
async fn next_resize(resizes: &mut Option<mpsc::Receiver<TerminalSize>>) -> Option<TerminalSize> {
    match resizes {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
