//! Terminator-delimited framing over an async byte stream.
//!
//! The framer knows nothing about SMTP: the caller hands it the terminator
//! for every read, so the same reader serves command lines (`CRLF`) and
//! message bodies (`CRLF . CRLF`).

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};

/// End of a command line.
pub const LINE_END: &[u8] = b"\r\n";

/// End of a message body.
pub const DATA_END: &[u8] = b"\r\n.\r\n";

/// Bytes reserved in the buffer before each read.
const READ_CHUNK: usize = 4096;

/// Largest frame accepted by default, terminator excluded. Protects the
/// buffer from peers that never send a terminator.
pub const MAX_FRAME_LEN: usize = 32 * 1024 * 1024;

/// Outcome of a single framed read.
#[derive(Debug, PartialEq, Eq)]
pub enum Frame {
    /// Everything before the terminator, terminator stripped.
    Line(Vec<u8>),
    /// The peer closed the stream before another terminator arrived.
    Disconnected,
}

pub struct LineFramer<R> {
    reader: R,
    buffer: Vec<u8>,
    max_len: usize,
}

impl<R> LineFramer<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self::with_limit(reader, MAX_FRAME_LEN)
    }

    pub fn with_limit(reader: R, max_len: usize) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(READ_CHUNK),
            max_len,
        }
    }

    /// Reads until `terminator` has been seen in full.
    ///
    /// Bytes following the terminator stay buffered for the next call, so
    /// pipelined input is never lost. A terminator split across several
    /// reads is matched once its last byte arrives.
    ///
    /// Fails with [`io::ErrorKind::InvalidData`] once more than the frame
    /// limit has been buffered without a terminator.
    pub async fn read_frame(&mut self, terminator: &[u8]) -> io::Result<Frame> {
        debug_assert!(!terminator.is_empty());

        let mut search_from = 0;
        loop {
            if let Some(pos) = find(&self.buffer[search_from..], terminator) {
                let end = search_from + pos;
                let line = self.buffer[..end].to_vec();
                self.buffer.drain(..end + terminator.len());
                return Ok(Frame::Line(line));
            }

            if self.buffer.len() >= self.max_len + terminator.len() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("frame exceeds {} bytes", self.max_len),
                ));
            }

            // A match may still start in the last `len - 1` bytes.
            search_from = self
                .buffer
                .len()
                .saturating_sub(terminator.len() - 1);

            self.buffer.reserve(READ_CHUNK);
            if self.reader.read_buf(&mut self.buffer).await? == 0 {
                return Ok(Frame::Disconnected);
            }
        }
    }

    /// Bytes received but not yet returned as part of a frame.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    fn line(s: &str) -> Frame {
        Frame::Line(s.as_bytes().to_vec())
    }

    #[test]
    fn test_find() {
        assert_eq!(find(b"HELO x\r\n", LINE_END), Some(6));
        assert_eq!(find(b"\r\n", LINE_END), Some(0));
        assert_eq!(find(b"no terminator", LINE_END), None);
        assert_eq!(find(b"a\r\n.\r\nb", DATA_END), Some(1));
        assert_eq!(find(b".\r\n", DATA_END), None);
    }

    #[tokio::test]
    async fn test_reads_single_line() {
        let mock = Builder::new().read(b"HELO example.com\r\n").build();
        let mut framer = LineFramer::new(mock);

        let frame = framer.read_frame(LINE_END).await.unwrap();
        assert_eq!(frame, line("HELO example.com"));
    }

    #[tokio::test]
    async fn test_terminator_split_across_reads() {
        let mock = Builder::new()
            .read(b"NOOP\r")
            .read(b"\nQU")
            .read(b"IT\r")
            .read(b"\n")
            .build();
        let mut framer = LineFramer::new(mock);

        assert_eq!(framer.read_frame(LINE_END).await.unwrap(), line("NOOP"));
        assert_eq!(framer.read_frame(LINE_END).await.unwrap(), line("QUIT"));
    }

    #[tokio::test]
    async fn test_data_terminator_split_byte_by_byte() {
        let mock = Builder::new()
            .read(b"hello\r\nworld")
            .read(b"\r")
            .read(b"\n")
            .read(b".")
            .read(b"\r")
            .read(b"\n")
            .build();
        let mut framer = LineFramer::new(mock);

        let frame = framer.read_frame(DATA_END).await.unwrap();
        assert_eq!(frame, line("hello\r\nworld"));
    }

    #[tokio::test]
    async fn test_pipelined_input_is_kept() {
        let mock = Builder::new()
            .read(b"DATA\r\nbody line\r\n.\r\nQUIT\r\n")
            .build();
        let mut framer = LineFramer::new(mock);

        assert_eq!(framer.read_frame(LINE_END).await.unwrap(), line("DATA"));
        assert_eq!(
            framer.read_frame(DATA_END).await.unwrap(),
            line("body line")
        );
        assert_eq!(framer.read_frame(LINE_END).await.unwrap(), line("QUIT"));
    }

    #[tokio::test]
    async fn test_line_is_not_trimmed() {
        let mock = Builder::new().read(b"  HELO foo  \r\n").build();
        let mut framer = LineFramer::new(mock);

        assert_eq!(
            framer.read_frame(LINE_END).await.unwrap(),
            line("  HELO foo  ")
        );
    }

    #[tokio::test]
    async fn test_eof_at_line_boundary() {
        let mock = Builder::new().read(b"HELO a\r\n").build();
        let mut framer = LineFramer::new(mock);

        assert_eq!(framer.read_frame(LINE_END).await.unwrap(), line("HELO a"));
        assert_eq!(
            framer.read_frame(LINE_END).await.unwrap(),
            Frame::Disconnected
        );
        assert!(framer.pending().is_empty());
    }

    #[tokio::test]
    async fn test_eof_mid_line_keeps_partial_bytes() {
        let mock = Builder::new().read(b"MAIL FROM:").build();
        let mut framer = LineFramer::new(mock);

        assert_eq!(
            framer.read_frame(LINE_END).await.unwrap(),
            Frame::Disconnected
        );
        assert_eq!(framer.pending(), b"MAIL FROM:");
    }

    #[tokio::test]
    async fn test_frame_at_limit_is_accepted() {
        let mock = Builder::new().read(b"12345678\r\n").build();
        let mut framer = LineFramer::with_limit(mock, 8);

        assert_eq!(framer.read_frame(LINE_END).await.unwrap(), line("12345678"));
    }

    #[tokio::test]
    async fn test_unterminated_flood_is_rejected() {
        let mock = Builder::new()
            .read(b"AAAAAAAA")
            .read(b"AAAAAAAA")
            .build();
        let mut framer = LineFramer::with_limit(mock, 8);

        let err = framer.read_frame(LINE_END).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!(err.to_string(), "frame exceeds 8 bytes");
    }

    #[tokio::test]
    async fn test_read_error_is_propagated() {
        let mock = Builder::new()
            .read_error(io::Error::new(io::ErrorKind::Other, "boom"))
            .build();
        let mut framer = LineFramer::new(mock);

        let err = framer.read_frame(LINE_END).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
