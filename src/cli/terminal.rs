//! Local terminal state for the interactive session

use std::io::IsTerminal;
use std::time::Duration;

use crossterm::terminal::{self, disable_raw_mode, enable_raw_mode};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::Result;
use crate::ssh::TerminalSize;

const RESIZE_POLL: Duration = Duration::from_millis(250);

/// Raw mode for as long as the guard lives
pub struct RawModeGuard(());

impl RawModeGuard {
    pub fn enable() -> Result<Self> {
        enable_raw_mode()?;
        debug!("terminal switched to raw mode");
        Ok(Self(()))
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            debug!("restoring terminal mode: {}", e);
        }
    }
}

/// Whether stdin is a terminal (as opposed to a pipe or file)
pub fn is_interactive() -> bool {
    std::io::stdin().is_terminal()
}

/// Current size of the local terminal, 80x24 when it cannot be queried
pub fn local_size() -> TerminalSize {
    match terminal::size() {
        Ok((cols, rows)) if cols > 0 && rows > 0 => TerminalSize { cols, rows },
        _ => TerminalSize::default(),
    }
}

/// Poll the terminal size and report changes until the receiver is dropped
pub fn watch_resizes(initial: TerminalSize) -> (mpsc::Receiver<TerminalSize>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(10);

    let task = tokio::spawn(async move {
        let mut current = initial;
        let mut ticker = tokio::time::interval(RESIZE_POLL);

        loop {
            ticker.tick().await;

            let size = local_size();
            if size != current {
                current = size;
                if tx.send(size).await.is_err() {
                    break;
                }
            }
        }
    });

    (rx, task)
}
