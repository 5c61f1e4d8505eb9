//! A single connected participant.
//!
//! A `Session` pairs an immutable identity (id and display name) with the
//! outbound queue that feeds the connection's writer task. The registry and
//! the command interpreter only ever see sessions, never transport handles.

use bytes::Bytes;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Notify};
use tracing::trace;

/// Frames queued per session before delivery starts failing
pub const OUTBOUND_QUEUE: usize = 256;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque, process-unique session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    fn next() -> Self {
        SessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Failure to queue a frame for a session
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("outbound queue full")]
    Full,
    #[error("session closed")]
    Closed,
}

/// One connected participant
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    name: String,
    outbound: mpsc::Sender<Bytes>,
    closed: Notify,
}

impl Session {
    /// Create a session around an outbound queue.
    pub fn new(name: String, outbound: mpsc::Sender<Bytes>) -> Self {
        Session {
            id: SessionId::next(),
            name,
            outbound,
            closed: Notify::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a frame for this participant without waiting.
    pub fn send(&self, frame: impl Into<Bytes>) -> Result<(), DeliveryError> {
        self.outbound.try_send(frame.into()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Queue a frame, waiting up to `timeout` for room in a full queue.
    pub async fn send_within(
        &self,
        frame: impl Into<Bytes>,
        timeout: Duration,
    ) -> Result<(), DeliveryError> {
        self.outbound
            .send_timeout(frame.into(), timeout)
            .await
            .map_err(|e| match e {
                mpsc::error::SendTimeoutError::Timeout(_) => DeliveryError::Full,
                mpsc::error::SendTimeoutError::Closed(_) => DeliveryError::Closed,
            })
    }

    /// Ask the connection's control loop to end the session.
    ///
    /// Frames already queued are still written before the socket is shut down.
    pub fn close(&self) {
        self.closed.notify_one();
    }

    /// Resolves once `close` has been called.
    pub async fn closed(&self) {
        self.closed.notified().await;
    }
}

/// Drain a session's outbound queue into the write half of its socket.
///
/// Returns once every sender is gone and the queue is empty, shutting the
/// writer down so the peer sees EOF. Returns early with the error if a write
/// fails.
pub async fn write_loop<W>(mut writer: W, mut outbound: mpsc::Receiver<Bytes>) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = outbound.recv().await {
        writer.write_all(&frame).await?;
    }

    trace!("Outbound queue drained");
    writer.shutdown().await
}
