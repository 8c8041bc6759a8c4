//! Consumers of finished messages.
//!
//! The channel hands every completed transaction to a [`MessageSink`] and
//! waits for it before replying. A sink may supply its own reply line;
//! otherwise the client gets `250 Ok`.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Local;
use mailparse::{parse_mail, MailHeaderMap, MailParseError, ParsedMail};
use thiserror::Error;
use tracing::{info, warn};

/// Sender, recipients and the raw, unparsed body of one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub sender: String,
    pub recipients: Vec<String>,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("sink aborted: {0}")]
    Aborted(String),
}

pub trait MessageSink: Send + Sync + 'static {
    /// Consumes one message. `Ok(Some(line))` replaces the default reply.
    fn process(&self, envelope: &Envelope) -> Result<Option<String>, SinkError>;
}

/// Logs every message through `tracing`.
#[derive(Debug, Default)]
pub struct LogSink;

/// Subject and readable text of a parsed message.
#[derive(Debug, PartialEq, Eq)]
pub struct MessageSummary {
    pub subject: Option<String>,
    pub text: String,
}

/// Parses a raw body, preferring the first `text/plain` part of a
/// multipart message.
pub fn summarize(raw: &str) -> Result<MessageSummary, MailParseError> {
    let parsed = parse_mail(raw.as_bytes())?;
    let subject = parsed.headers.get_first_value("Subject");
    let text = readable_text(&parsed)?;

    Ok(MessageSummary { subject, text })
}

fn readable_text(parsed: &ParsedMail<'_>) -> Result<String, MailParseError> {
    if parsed.subparts.is_empty() {
        return parsed.get_body();
    }

    let part = parsed
        .subparts
        .iter()
        .find(|part| part.ctype.mimetype.starts_with("text/plain"))
        .unwrap_or(&parsed.subparts[0]);
    readable_text(part)
}

impl MessageSink for LogSink {
    fn process(&self, envelope: &Envelope) -> Result<Option<String>, SinkError> {
        info!(
            "Received message from: {}, to: {}",
            envelope.sender,
            envelope.recipients.join(", ")
        );

        match summarize(&envelope.body) {
            Ok(summary) => info!(
                subject = summary.subject.as_deref().unwrap_or(""),
                "{}",
                summary.text
            ),
            Err(e) => {
                warn!(error = %e, "message does not parse, logging it raw");
                info!("{}", envelope.body);
            }
        }

        Ok(None)
    }
}

/// Stores every message as an `.eml` file with the envelope prepended as
/// `X-Smtpd-*` headers.
#[derive(Debug)]
pub struct EmlDirSink {
    dir: PathBuf,
    sequence: AtomicU64,
}

impl EmlDirSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn render(envelope: &Envelope) -> String {
        let mut content = String::with_capacity(envelope.body.len() + 256);
        content.push_str(&format!(
            "X-Smtpd-Received: {}\r\n",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        ));
        content.push_str(&format!("X-Smtpd-Mail-From: {}\r\n", envelope.sender));
        for rcpt in &envelope.recipients {
            content.push_str(&format!("X-Smtpd-Rcpt-To: {}\r\n", rcpt));
        }
        content.push_str(&envelope.body);
        content.push_str("\r\n");
        content
    }
}

impl MessageSink for EmlDirSink {
    fn process(&self, envelope: &Envelope) -> Result<Option<String>, SinkError> {
        let n = self.sequence.fetch_add(1, Ordering::Relaxed);
        let filename = format!("{}_{}.eml", Local::now().format("%Y%m%d_%H%M%S"), n);
        let filepath = self.dir.join(&filename);

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&filepath)?;
        file.write_all(Self::render(envelope).as_bytes())?;
        file.sync_all()?;

        info!(path = ?filepath, "message saved");
        Ok(Some(format!("250 Ok: queued as {}", filename)))
    }
}

/// Feeds every message to several sinks in turn.
///
/// The first sink to fail aborts the chain. The first reply line offered
/// by any sink wins.
pub struct Tee {
    sinks: Vec<Box<dyn MessageSink>>,
}

impl Tee {
    pub fn new(sinks: Vec<Box<dyn MessageSink>>) -> Self {
        Self { sinks }
    }
}

impl MessageSink for Tee {
    fn process(&self, envelope: &Envelope) -> Result<Option<String>, SinkError> {
        let mut reply = None;
        for sink in &self.sinks {
            let offered = sink.process(envelope)?;
            reply = reply.or(offered);
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn envelope(body: &str) -> Envelope {
        Envelope {
            sender: "alice@example2.com".into(),
            recipients: vec!["bob@example.com".into(), "tom@example.com".into()],
            body: body.into(),
        }
    }

    struct Fixed(Option<&'static str>);

    impl MessageSink for Fixed {
        fn process(&self, _: &Envelope) -> Result<Option<String>, SinkError> {
            Ok(self.0.map(str::to_owned))
        }
    }

    struct Failing;

    impl MessageSink for Failing {
        fn process(&self, _: &Envelope) -> Result<Option<String>, SinkError> {
            Err(SinkError::Aborted("disk full".into()))
        }
    }

    #[derive(Default)]
    struct Counting(Mutex<usize>);

    impl MessageSink for std::sync::Arc<Counting> {
        fn process(&self, _: &Envelope) -> Result<Option<String>, SinkError> {
            *self.0.lock().unwrap() += 1;
            Ok(None)
        }
    }

    #[test]
    fn test_summarize_simple_message() {
        let summary = summarize("Subject: hello\r\n\r\nsome message").unwrap();
        assert_eq!(summary.subject.as_deref(), Some("hello"));
        assert_eq!(summary.text, "some message");
    }

    #[test]
    fn test_summarize_prefers_plain_text_part() {
        let raw = concat!(
            "Subject: multi\r\n",
            "Content-Type: multipart/alternative; boundary=\"XX\"\r\n",
            "\r\n",
            "--XX\r\n",
            "Content-Type: text/html\r\n",
            "\r\n",
            "<p>html</p>\r\n",
            "--XX\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "plain\r\n",
            "--XX--\r\n",
        );
        let summary = summarize(raw).unwrap();
        assert_eq!(summary.subject.as_deref(), Some("multi"));
        assert_eq!(summary.text.trim_end(), "plain");
    }

    #[test]
    fn test_log_sink_uses_default_reply() {
        let reply = LogSink.process(&envelope("Subject: x\r\n\r\nbody")).unwrap();
        assert_eq!(reply, None);
    }

    #[test]
    fn test_eml_dir_sink_writes_envelope_headers() {
        let dir = tempfile::tempdir().unwrap();
        let sink = EmlDirSink::new(dir.path());

        let reply = sink.process(&envelope("Subject: x\r\n\r\nbody")).unwrap();
        let reply = reply.unwrap();
        assert!(reply.starts_with("250 Ok: queued as "));

        let filename = reply.trim_start_matches("250 Ok: queued as ");
        let content = std::fs::read_to_string(sink.dir().join(filename)).unwrap();
        assert!(content.starts_with("X-Smtpd-Received: "));
        assert!(content.contains("X-Smtpd-Mail-From: alice@example2.com\r\n"));
        let rcpts: Vec<_> = content
            .lines()
            .filter(|l| l.starts_with("X-Smtpd-Rcpt-To: "))
            .collect();
        assert_eq!(
            rcpts,
            vec![
                "X-Smtpd-Rcpt-To: bob@example.com",
                "X-Smtpd-Rcpt-To: tom@example.com"
            ]
        );
        assert!(content.ends_with("Subject: x\r\n\r\nbody\r\n"));
    }

    #[test]
    fn test_eml_dir_sink_uses_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let sink = EmlDirSink::new(dir.path());

        let first = sink.process(&envelope("a")).unwrap();
        let second = sink.process(&envelope("b")).unwrap();
        assert_ne!(first, second);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_eml_dir_sink_missing_dir_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let sink = EmlDirSink::new(dir.path().join("missing"));

        let err = sink.process(&envelope("a")).unwrap_err();
        assert!(matches!(err, SinkError::Io(_)));
    }

    #[test]
    fn test_tee_first_reply_wins() {
        let tee = Tee::new(vec![
            Box::new(Fixed(None)),
            Box::new(Fixed(Some("250 Ok: first"))),
            Box::new(Fixed(Some("250 Ok: second"))),
        ]);
        let reply = tee.process(&envelope("x")).unwrap();
        assert_eq!(reply.as_deref(), Some("250 Ok: first"));
    }

    #[test]
    fn test_tee_stops_at_first_failure() {
        let counter = std::sync::Arc::new(Counting::default());
        let tee = Tee::new(vec![
            Box::new(counter.clone()),
            Box::new(Failing),
            Box::new(counter.clone()),
        ]);

        let err = tee.process(&envelope("x")).unwrap_err();
        assert_eq!(err.to_string(), "sink aborted: disk full");
        assert_eq!(*counter.0.lock().unwrap(), 1);
    }
}
