//! Errors that end a session.

use std::io;

use thiserror::Error;

use crate::sink::SinkError;

#[derive(Debug, Error)]
pub enum SessionError {
    /// Reading from or writing to the transport failed for a reason other
    /// than the peer going away.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The message sink failed; the message was not acknowledged.
    #[error("message sink failed: {0}")]
    Sink(#[from] SinkError),
}

/// Whether an I/O error only means the peer is gone.
pub fn is_disconnect(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::UnexpectedEof
    )
}
