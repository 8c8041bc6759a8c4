//! # smtpd
//!
//! Server side of a small store-and-forward SMTP dialog: HELO, MAIL, RCPT,
//! DATA, RSET, NOOP and QUIT. Each finished message is handed, envelope and
//! raw body, to a [`MessageSink`].
//!
//! [`Channel::handle_connection`] drives one connection over any
//! `AsyncRead + AsyncWrite` transport; [`SmtpServer`] accepts TCP
//! connections and runs one channel per connection.

pub mod address;
pub mod channel;
pub mod config;
pub mod daemon;
pub mod dispatch;
pub mod error;
pub mod framer;
pub mod logging;
pub mod reply;
pub mod server;
pub mod session;
pub mod sink;
pub mod transcript;

pub use channel::Channel;
pub use config::Opt;
pub use error::SessionError;
pub use server::SmtpServer;
pub use sink::{Envelope, MessageSink, SinkError};
