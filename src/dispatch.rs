//! Command dispatch and the sequencing rules between commands.
//!
//! Checks run in a fixed order and stop at the first failure: greeting,
//! known verb, argument syntax, command sequence.

use tracing::debug;

use crate::address;
use crate::reply::{self, Reply};
use crate::session::{Mode, SmtpSession};

/// Verbs this server understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Helo,
    Mail,
    Rcpt,
    Data,
    Rset,
    Noop,
    Quit,
}

impl Verb {
    /// Looks up an uppercased command word.
    pub fn from_word(word: &str) -> Option<Self> {
        match word {
            "HELO" => Some(Verb::Helo),
            "MAIL" => Some(Verb::Mail),
            "RCPT" => Some(Verb::Rcpt),
            "DATA" => Some(Verb::Data),
            "RSET" => Some(Verb::Rset),
            "NOOP" => Some(Verb::Noop),
            "QUIT" => Some(Verb::Quit),
            _ => None,
        }
    }
}

/// A command line split into its verb and argument.
#[derive(Debug, PartialEq, Eq)]
pub struct Command<'a> {
    pub verb: String,
    pub argument: &'a str,
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Splits a command line into its first run of word characters, uppercased,
/// and the trimmed rest after it. Returns `None` when the line holds no
/// word at all.
pub fn parse_command(line: &str) -> Option<Command<'_>> {
    let line = line.trim();
    let start = line.find(is_word_char)?;
    let end = line[start..]
        .find(|c: char| !is_word_char(c))
        .map_or(line.len(), |len| start + len);

    Some(Command {
        verb: line[start..end].to_ascii_uppercase(),
        argument: line[end..].trim(),
    })
}

/// Runs one command line against the session and returns the reply.
///
/// Only called outside of [`Mode::Data`]; bodies never reach this table.
pub fn dispatch(session: &mut SmtpSession, fqdn: &str, line: &str) -> Reply {
    let Some(command) = parse_command(line) else {
        return reply::BAD_SYNTAX;
    };

    if command.verb != "HELO" && session.greeting.is_none() {
        return reply::SEND_HELO_FIRST;
    }

    let Some(verb) = Verb::from_word(&command.verb) else {
        debug!(verb = %command.verb, "unknown command");
        return Reply::not_implemented(&command.verb);
    };

    let argument = command.argument;
    match verb {
        Verb::Helo => helo(session, fqdn, argument),
        Verb::Mail => mail(session, argument),
        Verb::Rcpt => rcpt(session, argument),
        Verb::Data => data(session, argument),
        Verb::Rset => rset(session, argument),
        Verb::Noop => noop(argument),
        Verb::Quit => quit(session, argument),
    }
}

fn helo(session: &mut SmtpSession, fqdn: &str, argument: &str) -> Reply {
    if argument.is_empty() {
        return Reply::usage("Syntax: HELO hostname");
    }
    if session.greeting.is_some() {
        return reply::DUPLICATE_HELO;
    }

    session.greeting = Some(argument.to_owned());
    session.mode = Mode::Command;
    Reply::hello(fqdn)
}

fn mail(session: &mut SmtpSession, argument: &str) -> Reply {
    let Some(address) = address::extract("FROM:", argument) else {
        return Reply::usage("Syntax: MAIL FROM:<address>");
    };
    if session.sender.is_some() {
        return reply::DUPLICATE_MAIL;
    }

    session.sender = Some(address.to_owned());
    reply::OK
}

fn rcpt(session: &mut SmtpSession, argument: &str) -> Reply {
    let Some(address) = address::extract("TO:", argument) else {
        return Reply::usage("Syntax: RCPT TO: <address>");
    };
    if session.sender.is_none() {
        return reply::NEED_MAIL;
    }

    session.recipients.push(address.to_owned());
    reply::OK
}

fn data(session: &mut SmtpSession, argument: &str) -> Reply {
    if !argument.is_empty() {
        return Reply::usage("Syntax: DATA");
    }
    if session.recipients.is_empty() {
        return reply::NEED_RCPT;
    }

    session.mode = Mode::Data;
    reply::START_DATA
}

fn rset(session: &mut SmtpSession, argument: &str) -> Reply {
    if !argument.is_empty() {
        return Reply::usage("Syntax: RSET");
    }

    session.reset();
    reply::OK
}

fn noop(argument: &str) -> Reply {
    if !argument.is_empty() {
        return Reply::usage("Syntax: NOOP");
    }
    reply::OK
}

fn quit(session: &mut SmtpSession, argument: &str) -> Reply {
    if !argument.is_empty() {
        return Reply::usage("Syntax: QUIT");
    }

    session.mode = Mode::Quit;
    reply::BYE
}
