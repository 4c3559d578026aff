//! SSH session bootstrap and interactive relay using russh

mod client;
mod connector;
mod host_keys;
mod session;
mod transport;

#[cfg(test)]
pub(crate) mod mock;

pub use client::{RusshChannel, RusshConnection, RusshDialer, SshClient};
pub use connector::connect;
pub use host_keys::HostKeyPolicy;
pub use session::{run_relay, RelayExit};
pub use transport::{
    ChannelEvent, Connection, Dialer, PtyRequest, SessionHandle, ShellChannel, TerminalSize,
};
