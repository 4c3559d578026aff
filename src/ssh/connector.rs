//! Session bootstrap: dial, authenticate, open a shell

use secrecy::ExposeSecret;
use tracing::{debug, info};

use super::transport::{Connection, Dialer, PtyRequest, SessionHandle};
use crate::error::Result;
use crate::token::CredentialRecord;

/// Connect to the host named in `record` and start an interactive shell
///
/// A single attempt is made. If the connection comes up but authentication
/// or channel setup fails, the connection is closed before the error is
/// returned.
pub async fn connect<D: Dialer + ?Sized>(
    dialer: &D,
    record: &CredentialRecord,
    pty: &PtyRequest,
) -> Result<SessionHandle<D::Connection>> {
    info!("Connecting to {}", record.connection_string());

    let mut connection = dialer.dial(record.host(), record.port()).await?;

    match establish(&mut connection, record, pty).await {
        Ok(channel) => {
            info!("Shell opened on {}", record.connection_string());
            Ok(SessionHandle::new(connection, channel))
        }
        Err(e) => {
            if let Err(close_err) = connection.close().await {
                debug!("closing failed connection: {}", close_err);
            }
            Err(e)
        }
    }
}

async fn establish<C: Connection>(
    connection: &mut C,
    record: &CredentialRecord,
    pty: &PtyRequest,
) -> Result<C::Channel> {
    connection
        .authenticate_password(record.username(), record.password().expose_secret())
        .await?;
    debug!("Password authentication accepted for '{}'", record.username());

    connection.open_shell(pty).await
}
