//! Per-connection control loop.
//!
//! Registers a session on connect, routes every inbound line through the
//! command interpreter or broadcasts it, and deregisters the session when the
//! peer disconnects, the transport fails or the session is closed by `@quit`.

use crate::commands;
use crate::names::NameGenerator;
use crate::registry::Registry;
use crate::session::{self, Session, OUTBOUND_QUEUE};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace};

pub const WELCOME: &str = "Welcome to the chat!\n";

/// Initial read buffer size
const BUFFER_SIZE: usize = 4 * 1024;

/// Longest accepted inbound line, terminator included
const MAX_LINE_LENGTH: usize = 64 * 1024;

/// How long a closing session may spend flushing its outbound queue
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a session left the `Active` state
#[derive(Debug)]
enum CloseReason {
    /// Peer closed the stream
    Disconnected,
    /// Session was closed from inside, e.g. `@quit`
    Quit,
    /// Transport failure on either half of the stream
    Failed(io::Error),
}

/// Drive a single client connection until it closes.
pub async fn handle_connection<S>(stream: S, registry: Arc<Registry>, names: Arc<dyn NameGenerator>)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    info!("new socket");

    let (reader, writer) = tokio::io::split(stream);
    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE);
    let mut writer_task = tokio::spawn(session::write_loop(writer, outbound_rx));

    let session = Arc::new(Session::new(names.generate(), outbound_tx));
    registry.add(Arc::clone(&session));
    greet(&session);

    let reason = run_session(reader, &session, &registry, &mut writer_task).await;

    if let CloseReason::Failed(ref e) = reason {
        error!(name = session.name(), error = %e, "Connection error");
    }
    registry.remove(&session);
    debug!(name = session.name(), ?reason, "Session closed");

    if matches!(reason, CloseReason::Failed(_)) {
        writer_task.abort();
        return;
    }

    // Let the writer flush what is queued (e.g. "Bye!") before shutdown
    let name = session.name().to_string();
    drop(session);
    match tokio::time::timeout(DRAIN_TIMEOUT, &mut writer_task).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => debug!(name = %name, error = %e, "Failed to flush outbound queue"),
        Ok(Err(e)) => debug!(error = %e, "Writer task ended abnormally"),
        Err(_) => {
            debug!(name = %name, "Peer stopped reading, dropping outbound queue");
            writer_task.abort();
        }
    }
}

fn greet(session: &Session) {
    let greeting = session
        .send(WELCOME)
        .and_then(|()| session.send(format!("Your name is {}.\n", session.name())));
    if let Err(e) = greeting {
        debug!(name = session.name(), error = %e, "Failed to queue greeting");
    }
}

/// The `Active` state: read lines until the connection closes.
///
/// The writer task only finishes while the session is live if a write
/// failed, so its completion is a transport failure.
async fn run_session<R>(
    reader: R,
    session: &Session,
    registry: &Registry,
    writer_task: &mut JoinHandle<io::Result<()>>,
) -> CloseReason
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, reader);
    let mut buffer = Vec::with_capacity(BUFFER_SIZE);

    loop {
        buffer.clear();
        let mut limited = (&mut reader).take(MAX_LINE_LENGTH as u64);

        let read = tokio::select! {
            biased;
            _ = session.closed() => return CloseReason::Quit,
            written = &mut *writer_task => {
                return CloseReason::Failed(match written {
                    Ok(Err(e)) => e,
                    Ok(Ok(())) => io::Error::other("outbound writer stopped"),
                    Err(e) => io::Error::other(e),
                });
            }
            read = limited.read_until(b'\n', &mut buffer) => read,
        };

        match read {
            Ok(0) => {
                trace!("Connection closed by client");
                return CloseReason::Disconnected;
            }
            Ok(n) if n == MAX_LINE_LENGTH && !buffer.ends_with(b"\n") => {
                return CloseReason::Failed(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "line too long",
                ));
            }
            Ok(_) => handle_line(&buffer, session, registry).await,
            Err(e) => return CloseReason::Failed(e),
        }
    }
}

async fn handle_line(raw: &[u8], session: &Session, registry: &Registry) {
    let line = String::from_utf8_lossy(raw);
    let message = line.trim();
    info!("Processing message: {message}");

    if commands::try_handle(message, session, registry).await {
        return;
    }

    let formatted = format!("{}: {}\n", session.name(), message);
    let delivered = registry.broadcast_except(session, formatted);
    trace!(delivered, "Broadcast message");
}
