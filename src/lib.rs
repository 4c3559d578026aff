//! Temp SSH Access - time-boxed shell access from an encrypted token
//!
//! An operator issues a token: a small JSON credential record (host, port,
//! username, password, expiry) encrypted `openssl enc` style with a shared
//! key. The client:
//! - Decrypts the token and checks the record is complete
//! - Refuses to connect once the expiry has passed
//! - Logs in with the password and opens an interactive shell
//! - Relays keystrokes and output until either side closes

pub mod cli;
pub mod config;
pub mod crypto;
pub mod error;
pub mod logging;
pub mod ssh;
pub mod token;

pub use error::{AccessError, Result};
