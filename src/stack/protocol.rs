/*
 * protocol.rs
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

//! HTTP/1.1 framing: request-line + header serialization on the way out,
//! an incremental response push parser on the way in. The parser accepts
//! arbitrary chunkings of the input and emits typed events; body framing
//! is Content-Length, chunked, or read-until-close.

use std::collections::VecDeque;

use bytes::{Buf, Bytes, BytesMut};

use crate::error::ParseErrorKind;
use crate::request::Method;
use crate::result::header_value;
use crate::url::Url;

/// Serialize the request line and headers:
/// `METHOD SP path[?query] SP HTTP/1.1 CRLF (Name: Value CRLF)* CRLF`.
/// `Host` and `Content-Length` are the content layer's business and must
/// already be present in `headers`.
pub(crate) fn serialize_request(
    method: Method,
    url: &Url,
    headers: &[(String, String)],
) -> Vec<u8> {
    let mut out = String::new();
    out.push_str(method.as_str());
    out.push(' ');
    out.push_str(&url.path_and_query());
    out.push_str(" HTTP/1.1\r\n");
    for (name, value) in headers {
        out.push_str(name);
        out.push_str(": ");
        out.push_str(value);
        out.push_str("\r\n");
    }
    out.push_str("\r\n");
    out.into_bytes()
}

/// Structured events emitted by the parser, in order:
/// `Headers`, `Body`(×n), `Complete`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ProtocolEvent {
    Headers {
        status: u16,
        headers: Vec<(String, String)>,
    },
    Body(Bytes),
    Complete {
        keep_alive: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    StatusLine,
    Headers,
    /// Body with Content-Length or read-until-close.
    Body,
    ChunkSize,
    ChunkData,
    /// CRLF after a chunk's data.
    ChunkDataEnd,
    ChunkTrailer,
    Complete,
}

/// Push parser for one HTTP/1.1 response. Call `start` per exchange, feed
/// bytes via `receive`, and signal end-of-stream with `on_eof`. Events
/// accumulate in an internal queue drained with `next_event`.
pub(crate) struct ResponseParser {
    state: ParseState,
    head_request: bool,
    status: u16,
    http_11: bool,
    headers: Vec<(String, String)>,
    content_length: Option<u64>,
    bytes_received: u64,
    chunk_remaining: u64,
    read_until_close: bool,
    keep_alive: bool,
    trailing_garbage: bool,
    events: VecDeque<ProtocolEvent>,
}

impl ResponseParser {
    pub(crate) fn new() -> Self {
        Self {
            state: ParseState::StatusLine,
            head_request: false,
            status: 0,
            http_11: true,
            headers: Vec::new(),
            content_length: None,
            bytes_received: 0,
            chunk_remaining: 0,
            read_until_close: false,
            keep_alive: true,
            trailing_garbage: false,
            events: VecDeque::new(),
        }
    }

    /// Reset for a new exchange. `head_request` skips body parsing and
    /// synthesizes completion right after the headers.
    pub(crate) fn start(&mut self, head_request: bool) {
        self.state = ParseState::StatusLine;
        self.head_request = head_request;
        self.status = 0;
        self.http_11 = true;
        self.headers.clear();
        self.content_length = None;
        self.bytes_received = 0;
        self.chunk_remaining = 0;
        self.read_until_close = false;
        self.keep_alive = true;
        self.trailing_garbage = false;
        self.events.clear();
    }

    pub(crate) fn next_event(&mut self) -> Option<ProtocolEvent> {
        self.events.pop_front()
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.state == ParseState::Complete
    }

    /// Bytes arrived after message completion; the connection is suspect.
    pub(crate) fn has_trailing_garbage(&self) -> bool {
        self.trailing_garbage
    }

    /// End of stream. For a read-until-close body this is the normal end
    /// of the message and completion is emitted; anywhere else the caller
    /// must treat the EOF as a transport fault.
    pub(crate) fn on_eof(&mut self) -> bool {
        if self.state == ParseState::Body && self.read_until_close {
            self.keep_alive = false;
            self.finish_message();
            true
        } else {
            self.state == ParseState::Complete
        }
    }

    /// Find CRLF in the readable part of buf; return the offset of its
    /// start, or None when incomplete.
    fn find_crlf(buf: &[u8]) -> Option<usize> {
        let mut i = 0;
        while i + 1 < buf.len() {
            if buf[i] == b'\r' && buf[i + 1] == b'\n' {
                return Some(i);
            }
            i += 1;
        }
        None
    }

    fn finish_message(&mut self) {
        self.state = ParseState::Complete;
        self.events.push_back(ProtocolEvent::Complete {
            keep_alive: self.keep_alive,
        });
    }

    /// Consume and parse as much as possible from `buf`; partial tokens
    /// stay buffered for the next call.
    pub(crate) fn receive(&mut self, buf: &mut BytesMut) -> Result<(), ParseErrorKind> {
        loop {
            match self.state {
                ParseState::StatusLine => {
                    let line_end = match Self::find_crlf(buf) {
                        Some(n) => n,
                        None => return Ok(()),
                    };
                    let line = buf.split_to(line_end + 2);
                    let line_str = std::str::from_utf8(&line[..line_end])
                        .map_err(|_| ParseErrorKind::InvalidStatusLine)?;
                    self.parse_status_line(line_str)?;
                    self.state = ParseState::Headers;
                }
                ParseState::Headers => {
                    let line_end = match Self::find_crlf(buf) {
                        Some(n) => n,
                        None => return Ok(()),
                    };
                    if line_end == 0 {
                        buf.advance(2);
                        self.headers_done()?;
                        continue;
                    }
                    let line = buf.split_to(line_end + 2);
                    let line_str = std::str::from_utf8(&line[..line_end])
                        .map_err(|_| ParseErrorKind::InvalidHeader)?;
                    self.parse_header_line(line_str)?;
                }
                ParseState::Body => {
                    if buf.is_empty() {
                        return Ok(());
                    }
                    let to_read = match self.content_length {
                        Some(cl) => ((cl - self.bytes_received) as usize).min(buf.len()),
                        None => buf.len(),
                    };
                    if to_read > 0 {
                        let chunk = buf.split_to(to_read).freeze();
                        self.bytes_received += chunk.len() as u64;
                        self.events.push_back(ProtocolEvent::Body(chunk));
                    }
                    if let Some(cl) = self.content_length {
                        if self.bytes_received >= cl {
                            self.finish_message();
                        } else {
                            return Ok(());
                        }
                    } else {
                        // Read until close; EOF ends the message.
                        return Ok(());
                    }
                }
                ParseState::ChunkSize => {
                    let line_end = match Self::find_crlf(buf) {
                        Some(n) => n,
                        None => return Ok(()),
                    };
                    let line = buf.split_to(line_end + 2);
                    let line_str = std::str::from_utf8(&line[..line_end])
                        .map_err(|_| ParseErrorKind::InvalidChunkSize)?;
                    let hex_part = line_str.split(';').next().unwrap_or("").trim();
                    self.chunk_remaining = u64::from_str_radix(hex_part, 16)
                        .map_err(|_| ParseErrorKind::InvalidChunkSize)?;
                    if self.chunk_remaining == 0 {
                        self.state = ParseState::ChunkTrailer;
                    } else {
                        self.state = ParseState::ChunkData;
                    }
                }
                ParseState::ChunkData => {
                    if buf.is_empty() {
                        return Ok(());
                    }
                    let to_read = (self.chunk_remaining as usize).min(buf.len());
                    let chunk = buf.split_to(to_read).freeze();
                    self.chunk_remaining -= chunk.len() as u64;
                    self.events.push_back(ProtocolEvent::Body(chunk));
                    if self.chunk_remaining == 0 {
                        self.state = ParseState::ChunkDataEnd;
                    } else {
                        return Ok(());
                    }
                }
                ParseState::ChunkDataEnd => {
                    if buf.len() < 2 {
                        return Ok(());
                    }
                    if &buf[..2] != b"\r\n" {
                        return Err(ParseErrorKind::InvalidChunkSize);
                    }
                    buf.advance(2);
                    self.state = ParseState::ChunkSize;
                }
                ParseState::ChunkTrailer => {
                    let line_end = match Self::find_crlf(buf) {
                        Some(n) => n,
                        None => return Ok(()),
                    };
                    if line_end == 0 {
                        buf.advance(2);
                        self.finish_message();
                    } else {
                        // Trailer fields are consumed but not surfaced.
                        buf.advance(line_end + 2);
                    }
                }
                ParseState::Complete => {
                    if !buf.is_empty() {
                        self.trailing_garbage = true;
                        buf.clear();
                    }
                    return Ok(());
                }
            }
        }
    }

    fn parse_status_line(&mut self, line: &str) -> Result<(), ParseErrorKind> {
        // HTTP/1.1 200 OK (reason optional)
        let mut parts = line.splitn(3, ' ');
        let version = parts.next().unwrap_or("");
        self.http_11 = match version {
            "HTTP/1.1" => true,
            "HTTP/1.0" => false,
            _ => return Err(ParseErrorKind::InvalidStatusLine),
        };
        let code = parts
            .next()
            .and_then(|s| s.parse::<u16>().ok())
            .filter(|c| (100..1000).contains(c))
            .ok_or(ParseErrorKind::InvalidStatusLine)?;
        self.status = code;
        Ok(())
    }

    fn parse_header_line(&mut self, line: &str) -> Result<(), ParseErrorKind> {
        // Obsolete folding: continuation lines extend the previous value.
        if line.starts_with(' ') || line.starts_with('\t') {
            match self.headers.last_mut() {
                Some((_, value)) => {
                    value.push(' ');
                    value.push_str(line.trim());
                    return Ok(());
                }
                None => return Err(ParseErrorKind::InvalidHeader),
            }
        }
        let colon = line.find(':').ok_or(ParseErrorKind::InvalidHeader)?;
        let name = line[..colon].trim();
        let value = line[colon + 1..].trim();
        if name.is_empty() {
            return Err(ParseErrorKind::InvalidHeader);
        }
        self.headers.push((name.to_string(), value.to_string()));
        Ok(())
    }

    fn headers_done(&mut self) -> Result<(), ParseErrorKind> {
        let headers = std::mem::take(&mut self.headers);

        // Keep-alive: HTTP/1.1 defaults on, 1.0 defaults off, an explicit
        // Connection header overrides either way.
        self.keep_alive = match header_value(&headers, "Connection") {
            Some(v) if v.eq_ignore_ascii_case("close") => false,
            Some(v) if v.eq_ignore_ascii_case("keep-alive") => true,
            _ => self.http_11,
        };

        let chunked = header_value(&headers, "Transfer-Encoding")
            .map(|v| v.to_ascii_lowercase().contains("chunked"))
            .unwrap_or(false);
        let content_length = match header_value(&headers, "Content-Length") {
            Some(v) => Some(
                v.trim()
                    .parse::<u64>()
                    .map_err(|_| ParseErrorKind::InvalidHeader)?,
            ),
            None => None,
        };

        self.events.push_back(ProtocolEvent::Headers {
            status: self.status,
            headers,
        });

        // No body for HEAD, 1xx, 204 and 304; everything else frames by
        // chunked, Content-Length, or reads until close.
        if self.head_request
            || self.status / 100 == 1
            || self.status == 204
            || self.status == 304
        {
            self.finish_message();
        } else if chunked {
            self.state = ParseState::ChunkSize;
        } else if let Some(cl) = content_length {
            if cl == 0 {
                self.finish_message();
            } else {
                self.content_length = Some(cl);
                self.bytes_received = 0;
                self.state = ParseState::Body;
            }
        } else {
            self.read_until_close = true;
            self.keep_alive = false;
            self.state = ParseState::Body;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(parser: &mut ResponseParser, data: &[u8]) -> Vec<ProtocolEvent> {
        let mut buf = BytesMut::from(data);
        parser.receive(&mut buf).unwrap();
        let mut events = Vec::new();
        while let Some(e) = parser.next_event() {
            events.push(e);
        }
        events
    }

    fn feed_byte_by_byte(parser: &mut ResponseParser, data: &[u8]) -> Vec<ProtocolEvent> {
        let mut buf = BytesMut::new();
        let mut events = Vec::new();
        for b in data {
            buf.extend_from_slice(&[*b]);
            parser.receive(&mut buf).unwrap();
            while let Some(e) = parser.next_event() {
                events.push(e);
            }
        }
        events
    }

    fn body_of(events: &[ProtocolEvent]) -> Vec<u8> {
        let mut body = Vec::new();
        for e in events {
            if let ProtocolEvent::Body(b) = e {
                body.extend_from_slice(b);
            }
        }
        body
    }

    const SIMPLE: &[u8] =
        b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 5\r\n\r\nhello";

    #[test]
    fn content_length_body() {
        let mut p = ResponseParser::new();
        p.start(false);
        let events = feed_all(&mut p, SIMPLE);
        assert!(matches!(
            events[0],
            ProtocolEvent::Headers { status: 200, .. }
        ));
        assert_eq!(body_of(&events), b"hello");
        assert_eq!(
            events.last(),
            Some(&ProtocolEvent::Complete { keep_alive: true })
        );
        assert!(p.is_complete());
    }

    #[test]
    fn arbitrary_chunking_matches_single_shot() {
        let mut p = ResponseParser::new();
        p.start(false);
        let events = feed_byte_by_byte(&mut p, SIMPLE);
        assert_eq!(body_of(&events), b"hello");
        assert!(p.is_complete());
    }

    #[test]
    fn header_values_trimmed() {
        let mut p = ResponseParser::new();
        p.start(false);
        let events = feed_all(
            &mut p,
            b"HTTP/1.1 200 OK\r\nX-Padded:   spaced value  \r\nContent-Length: 0\r\n\r\n",
        );
        match &events[0] {
            ProtocolEvent::Headers { headers, .. } => {
                assert_eq!(headers[0], ("X-Padded".to_string(), "spaced value".to_string()));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn chunked_body() {
        let mut p = ResponseParser::new();
        p.start(false);
        let data = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n";
        let events = feed_all(&mut p, data);
        assert_eq!(body_of(&events), b"hello world");
        assert_eq!(
            events.last(),
            Some(&ProtocolEvent::Complete { keep_alive: true })
        );
    }

    #[test]
    fn chunked_with_extension_and_trailer() {
        let mut p = ResponseParser::new();
        p.start(false);
        let data =
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5;ext=1\r\nhello\r\n0\r\nX-Trailer: 1\r\n\r\n";
        let events = feed_byte_by_byte(&mut p, data);
        assert_eq!(body_of(&events), b"hello");
        assert!(p.is_complete());
    }

    #[test]
    fn head_synthesizes_complete() {
        let mut p = ResponseParser::new();
        p.start(true);
        let events = feed_all(
            &mut p,
            b"HTTP/1.1 200 OK\r\nContent-Length: 20\r\n\r\n",
        );
        assert!(matches!(events[0], ProtocolEvent::Headers { .. }));
        assert_eq!(
            events[1],
            ProtocolEvent::Complete { keep_alive: true }
        );
    }

    #[test]
    fn connection_close_disables_keep_alive() {
        let mut p = ResponseParser::new();
        p.start(false);
        let events = feed_all(
            &mut p,
            b"HTTP/1.1 200 OK\r\nConnection: close\r\nContent-Length: 2\r\n\r\nok",
        );
        assert_eq!(
            events.last(),
            Some(&ProtocolEvent::Complete { keep_alive: false })
        );
    }

    #[test]
    fn http10_defaults_to_close() {
        let mut p = ResponseParser::new();
        p.start(false);
        let events = feed_all(
            &mut p,
            b"HTTP/1.0 200 OK\r\nContent-Length: 2\r\n\r\nok",
        );
        assert_eq!(
            events.last(),
            Some(&ProtocolEvent::Complete { keep_alive: false })
        );
    }

    #[test]
    fn no_body_for_204() {
        let mut p = ResponseParser::new();
        p.start(false);
        let events = feed_all(&mut p, b"HTTP/1.1 204 No Content\r\n\r\n");
        assert_eq!(
            events.last(),
            Some(&ProtocolEvent::Complete { keep_alive: true })
        );
    }

    #[test]
    fn read_until_close_ends_on_eof() {
        let mut p = ResponseParser::new();
        p.start(false);
        let events = feed_all(&mut p, b"HTTP/1.1 200 OK\r\n\r\npartial body");
        assert_eq!(body_of(&events), b"partial body");
        assert!(!p.is_complete());
        assert!(p.on_eof());
        assert_eq!(
            p.next_event(),
            Some(ProtocolEvent::Complete { keep_alive: false })
        );
    }

    #[test]
    fn eof_mid_message_is_not_completion() {
        let mut p = ResponseParser::new();
        p.start(false);
        feed_all(&mut p, b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nhal");
        assert!(!p.on_eof());
        let mut p = ResponseParser::new();
        p.start(false);
        feed_all(&mut p, b"HTTP/1.1 200 OK\r\nContent-Le");
        assert!(!p.on_eof());
    }

    #[test]
    fn malformed_framing_rejected() {
        let mut p = ResponseParser::new();
        p.start(false);
        let mut buf = BytesMut::from(&b"NOT-HTTP 200 OK\r\n"[..]);
        assert_eq!(p.receive(&mut buf), Err(ParseErrorKind::InvalidStatusLine));

        let mut p = ResponseParser::new();
        p.start(false);
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\nno-colon-line\r\n\r\n"[..]);
        assert_eq!(p.receive(&mut buf), Err(ParseErrorKind::InvalidHeader));

        let mut p = ResponseParser::new();
        p.start(false);
        let mut buf =
            BytesMut::from(&b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\nzz\r\n"[..]);
        assert_eq!(p.receive(&mut buf), Err(ParseErrorKind::InvalidChunkSize));
    }

    #[test]
    fn trailing_garbage_flagged() {
        let mut p = ResponseParser::new();
        p.start(false);
        let mut buf = BytesMut::from(
            &b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nokEXTRA"[..],
        );
        p.receive(&mut buf).unwrap();
        assert!(p.is_complete());
        assert!(p.has_trailing_garbage());
    }

    #[test]
    fn serializes_request_line_with_query() {
        let url = Url::parse("http://example.com/a/b?x=1").unwrap();
        let bytes = serialize_request(
            Method::Get,
            &url,
            &[("Host".to_string(), "example.com".to_string())],
        );
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, "GET /a/b?x=1 HTTP/1.1\r\nHost: example.com\r\n\r\n");
    }
}
