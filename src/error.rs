/*
 * error.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Staffetta, an asynchronous HTTP client library.
 *
 * Staffetta is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Staffetta is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Staffetta.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Error taxonomy. Every failure reaches the caller as a value on
//! `HttpResult::error`; nothing escapes as a panic or a propagated Err.

use std::fmt;
use std::io;

/// Transport-level fault, mapped from the underlying io error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportErrorKind {
    ConnectionRefused,
    ConnectionReset,
    BrokenPipe,
    /// Peer closed the stream mid-message (also covers a stale keep-alive
    /// socket that yields EOF before the status line).
    UnexpectedEof,
    NotConnected,
    AddrUnreachable,
    Other(String),
}

impl TransportErrorKind {
    pub(crate) fn from_io(e: &io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::ConnectionRefused => TransportErrorKind::ConnectionRefused,
            io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
                TransportErrorKind::ConnectionReset
            }
            io::ErrorKind::BrokenPipe => TransportErrorKind::BrokenPipe,
            io::ErrorKind::UnexpectedEof => TransportErrorKind::UnexpectedEof,
            io::ErrorKind::NotConnected => TransportErrorKind::NotConnected,
            io::ErrorKind::AddrNotAvailable => TransportErrorKind::AddrUnreachable,
            _ => TransportErrorKind::Other(e.to_string()),
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::ConnectionRefused => write!(f, "connection refused"),
            TransportErrorKind::ConnectionReset => write!(f, "connection reset"),
            TransportErrorKind::BrokenPipe => write!(f, "broken pipe"),
            TransportErrorKind::UnexpectedEof => write!(f, "unexpected end of stream"),
            TransportErrorKind::NotConnected => write!(f, "not connected"),
            TransportErrorKind::AddrUnreachable => write!(f, "address unreachable"),
            TransportErrorKind::Other(msg) => write!(f, "{}", msg),
        }
    }
}

/// Response framing violation detected by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    InvalidStatusLine,
    InvalidHeader,
    InvalidChunkSize,
    InvalidEncoding,
    TrailingGarbage,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParseErrorKind::InvalidStatusLine => "invalid status line",
            ParseErrorKind::InvalidHeader => "invalid header line",
            ParseErrorKind::InvalidChunkSize => "invalid chunk size",
            ParseErrorKind::InvalidEncoding => "invalid message encoding",
            ParseErrorKind::TrailingGarbage => "data after message end",
        };
        write!(f, "{}", s)
    }
}

/// What went wrong with a request. `None` on the result means the exchange
/// completed with whatever status the server sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Cancelled by token or client shutdown.
    Cancelled,
    /// The per-request timeout expired.
    Timeout,
    /// Socket-level fault.
    Transport(TransportErrorKind),
    /// TLS setup or handshake failure.
    Tls(String),
    /// The response violated HTTP/1.1 framing.
    Parse(ParseErrorKind),
    /// Transient faults or redirects exceeded the configured attempt limit.
    TooManyRetries,
}

impl ErrorKind {
    pub(crate) fn from_io(e: &io::Error) -> Self {
        ErrorKind::Transport(TransportErrorKind::from_io(e))
    }

    /// Transient faults are retried by the manager: broken pipe, connection
    /// reset, and EOF mid-response (a reused keep-alive socket gone stale).
    pub(crate) fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorKind::Transport(
                TransportErrorKind::BrokenPipe
                    | TransportErrorKind::ConnectionReset
                    | TransportErrorKind::UnexpectedEof
            )
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Cancelled => write!(f, "request cancelled"),
            ErrorKind::Timeout => write!(f, "request timed out"),
            ErrorKind::Transport(kind) => write!(f, "transport error: {}", kind),
            ErrorKind::Tls(msg) => write!(f, "tls error: {}", msg),
            ErrorKind::Parse(kind) => write!(f, "parse error: {}", kind),
            ErrorKind::TooManyRetries => write!(f, "too many retries"),
        }
    }
}

impl std::error::Error for ErrorKind {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(ErrorKind::Transport(TransportErrorKind::BrokenPipe).is_transient());
        assert!(ErrorKind::Transport(TransportErrorKind::ConnectionReset).is_transient());
        assert!(ErrorKind::Transport(TransportErrorKind::UnexpectedEof).is_transient());
        assert!(!ErrorKind::Transport(TransportErrorKind::ConnectionRefused).is_transient());
        assert!(!ErrorKind::Timeout.is_transient());
        assert!(!ErrorKind::Cancelled.is_transient());
        assert!(!ErrorKind::Parse(ParseErrorKind::InvalidHeader).is_transient());
    }

    #[test]
    fn io_mapping() {
        let e = io::Error::new(io::ErrorKind::BrokenPipe, "pipe");
        assert_eq!(
            ErrorKind::from_io(&e),
            ErrorKind::Transport(TransportErrorKind::BrokenPipe)
        );
        let e = io::Error::new(io::ErrorKind::UnexpectedEof, "eof");
        assert!(ErrorKind::from_io(&e).is_transient());
    }
}
