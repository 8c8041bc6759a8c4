//! Server replies, one line each, written as `<code> <text>`.

use std::borrow::Cow;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub text: Cow<'static, str>,
}

impl Reply {
    pub const fn new(code: u16, text: &'static str) -> Self {
        Self {
            code,
            text: Cow::Borrowed(text),
        }
    }

    pub fn greeting(fqdn: &str) -> Self {
        Self {
            code: 220,
            text: format!("{} SMTP", fqdn).into(),
        }
    }

    pub fn hello(fqdn: &str) -> Self {
        Self {
            code: 250,
            text: fqdn.to_owned().into(),
        }
    }

    pub fn not_implemented(verb: &str) -> Self {
        Self {
            code: 502,
            text: format!("Error: command \"{}\" not implemented", verb).into(),
        }
    }

    /// `501` with the usage line of a verb.
    pub const fn usage(usage: &'static str) -> Self {
        Self {
            code: 501,
            text: Cow::Borrowed(usage),
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.text)
    }
}

pub const OK: Reply = Reply::new(250, "Ok");
pub const START_DATA: Reply = Reply::new(354, "End data with <CR><LF>.<CR><LF>");
pub const BYE: Reply = Reply::new(221, "Bye");
pub const BAD_SYNTAX: Reply = Reply::new(500, "Error: bad syntax");
pub const SEND_HELO_FIRST: Reply = Reply::new(503, "Error: send HELO first");
pub const DUPLICATE_HELO: Reply = Reply::new(503, "Error: duplicate HELO/greeting command");
pub const DUPLICATE_MAIL: Reply = Reply::new(503, "Error: duplicate MAIL command");
pub const NEED_MAIL: Reply = Reply::new(503, "Error: need MAIL command");
pub const NEED_RCPT: Reply = Reply::new(503, "Error: need RCPT command");
