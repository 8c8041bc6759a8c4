//! One SMTP dialog over one transport.
//!
//! Reads a frame with the terminator the session mode calls for, feeds it
//! to the dispatcher (or to the sink while in DATA), writes the reply and
//! repeats until QUIT or until the peer goes away.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, WriteHalf};
use tokio::time;
use tracing::{debug, info, warn};

use crate::dispatch::dispatch;
use crate::error::{is_disconnect, SessionError};
use crate::framer::{Frame, LineFramer, MAX_FRAME_LEN};
use crate::reply::{self, Reply};
use crate::session::{Mode, SmtpSession};
use crate::sink::{MessageSink, SinkError};
use crate::transcript::{Direction, Transcript};

/// Everything a connection needs that outlives it. Cheap to clone, one
/// clone per accepted connection.
#[derive(Clone)]
pub struct Channel {
    fqdn: Arc<str>,
    sink: Arc<dyn MessageSink>,
    transcript: Arc<Transcript>,
    banner_delay: Duration,
    max_frame_len: usize,
}

impl Channel {
    pub fn new(fqdn: impl Into<Arc<str>>, sink: Arc<dyn MessageSink>) -> Self {
        Self {
            fqdn: fqdn.into(),
            sink,
            transcript: Arc::new(Transcript::disabled()),
            banner_delay: Duration::ZERO,
            max_frame_len: MAX_FRAME_LEN,
        }
    }

    pub fn with_transcript(mut self, transcript: Arc<Transcript>) -> Self {
        self.transcript = transcript;
        self
    }

    pub fn with_banner_delay(mut self, banner_delay: Duration) -> Self {
        self.banner_delay = banner_delay;
        self
    }

    /// Caps a single command line or message body.
    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    pub fn fqdn(&self) -> &str {
        &self.fqdn
    }

    /// Runs the dialog until QUIT or disconnect, then shuts the transport
    /// down.
    ///
    /// A peer that disappears, at any point, ends the session with `Ok`.
    /// Errors are returned only for genuine I/O faults and sink failures.
    pub async fn handle_connection<T>(&self, transport: T, peer: &str) -> Result<(), SessionError>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let (reader, mut writer) = tokio::io::split(transport);
        let mut framer = LineFramer::with_limit(reader, self.max_frame_len);
        let mut session = SmtpSession::new();

        let result = self
            .converse(&mut framer, &mut writer, &mut session, peer)
            .await;
        let _ = writer.shutdown().await;

        match result {
            Err(SessionError::Io(e)) if is_disconnect(&e) => {
                debug!(peer, error = %e, "peer went away");
                Ok(())
            }
            other => other,
        }
    }

    async fn converse<R, W>(
        &self,
        framer: &mut LineFramer<R>,
        writer: &mut WriteHalf<W>,
        session: &mut SmtpSession,
        peer: &str,
    ) -> Result<(), SessionError>
    where
        R: AsyncRead + Unpin,
        W: AsyncRead + AsyncWrite + Unpin,
    {
        if !self.banner_delay.is_zero() {
            time::sleep(self.banner_delay).await;
        }
        self.push(writer, peer, &Reply::greeting(&self.fqdn).to_string())
            .await?;

        loop {
            let bytes = match framer.read_frame(session.terminator()).await? {
                Frame::Line(bytes) => bytes,
                Frame::Disconnected => {
                    if !framer.pending().is_empty() || session.mode == Mode::Data {
                        debug!(
                            peer,
                            pending = framer.pending().len(),
                            mode = ?session.mode,
                            "disconnected with unfinished input"
                        );
                    }
                    info!(peer, "connection closed by peer");
                    return Ok(());
                }
            };

            let text = String::from_utf8_lossy(&bytes).into_owned();
            self.transcript
                .log(peer, Direction::Incoming, &text)
                .await;

            let response = if session.mode == Mode::Data {
                self.deliver(session, text, peer).await?
            } else {
                dispatch(session, &self.fqdn, &text).to_string()
            };
            self.push(writer, peer, &response).await?;

            if session.is_quit() {
                info!(peer, "connection closed");
                return Ok(());
            }
        }
    }

    /// Hands a finished body to the sink and returns the reply line.
    ///
    /// The sink runs on the blocking pool so a slow sink stalls only this
    /// session.
    async fn deliver(
        &self,
        session: &mut SmtpSession,
        body: String,
        peer: &str,
    ) -> Result<String, SessionError> {
        session.body = body;
        let envelope = session.take_envelope();
        debug!(
            peer,
            sender = %envelope.sender,
            recipients = ?envelope.recipients,
            size = envelope.body.len(),
            "message complete"
        );

        let sink = Arc::clone(&self.sink);
        let outcome = tokio::task::spawn_blocking(move || sink.process(&envelope)).await;

        let offered = match outcome {
            Ok(Ok(offered)) => offered,
            Ok(Err(e)) => {
                warn!(peer, error = %e, "message sink failed, dropping connection");
                return Err(e.into());
            }
            Err(e) => {
                warn!(peer, error = %e, "message sink aborted, dropping connection");
                return Err(SinkError::Aborted(e.to_string()).into());
            }
        };

        Ok(offered.unwrap_or_else(|| reply::OK.to_string()))
    }

    async fn push<W>(&self, writer: &mut WriteHalf<W>, peer: &str, line: &str) -> io::Result<()>
    where
        W: AsyncRead + AsyncWrite + Unpin,
    {
        self.transcript
            .log(peer, Direction::Outgoing, line)
            .await;
        writer.write_all(format!("{}\r\n", line).as_bytes()).await?;
        writer.flush().await
    }
}
