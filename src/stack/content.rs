/*
 * content.rs
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

//! Content layer: owns the request body source and the response sink,
//! computes the effective outbound headers, and assembles the per-request
//! outcome exactly once. Late events after completion are dropped.

use std::time::Duration;

use log::warn;

use crate::error::ErrorKind;
use crate::request::HttpRequest;

/// How much request body is written per chunk.
pub(crate) const BODY_CHUNK_SIZE: usize = 1024;

/// Rewindable request body buffer, drained chunk by chunk.
pub(crate) struct BodySource {
    data: Vec<u8>,
    pos: usize,
}

impl BodySource {
    pub(crate) fn new(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    /// Next chunk of at most `max` bytes, or None when drained.
    pub(crate) fn next_chunk(&mut self, max: usize) -> Option<&[u8]> {
        if self.pos >= self.data.len() {
            return None;
        }
        let end = (self.pos + max).min(self.data.len());
        let chunk = &self.data[self.pos..end];
        self.pos = end;
        Some(chunk)
    }
}

/// Transfer volumes and lookup timing gathered by the stack; the manager
/// folds them into the final `RequestStats`.
#[derive(Debug, Clone, Default)]
pub(crate) struct StackStats {
    pub name_lookup_time: Duration,
    pub uploaded_bytes: u64,
    pub downloaded_bytes: u64,
}

/// What one exchange produced: either a completed response (error `None`)
/// or the failure that ended it. Handed to the manager for the
/// retry/redirect/terminal decision.
#[derive(Debug, Clone, Default)]
pub(crate) struct ExchangeOutcome {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub error: Option<ErrorKind>,
    pub stats: StackStats,
}

impl ExchangeOutcome {
    pub(crate) fn failed(error: ErrorKind, stats: StackStats) -> Self {
        Self {
            error: Some(error),
            stats,
            ..Self::default()
        }
    }
}

/// Per-exchange response accumulation with an exactly-once completion slot.
pub(crate) struct ContentLayer {
    status: u16,
    headers: Vec<(String, String)>,
    sink: Vec<u8>,
    completed: bool,
}

impl ContentLayer {
    pub(crate) fn new() -> Self {
        Self {
            status: 0,
            headers: Vec::new(),
            sink: Vec::new(),
            completed: false,
        }
    }

    pub(crate) fn start(&mut self) {
        self.status = 0;
        self.headers.clear();
        self.sink.clear();
        self.completed = false;
    }

    /// Effective outbound headers: the user's, then `Host` (with the port
    /// when it is not the protocol default), then `Content-Length` for a
    /// non-empty body and `Content-Encoding: gzip` when the body was
    /// compressed.
    pub(crate) fn effective_headers(
        request: &HttpRequest,
        body_len: usize,
        compressed: bool,
    ) -> Vec<(String, String)> {
        let mut headers = request.headers.clone();
        let url = &request.url;
        let default_port = if url.is_secure() { 443 } else { 80 };
        let host = if url.port == default_port {
            url.host.clone()
        } else {
            format!("{}:{}", url.host, url.port)
        };
        headers.push(("Host".to_string(), host));
        if body_len != 0 {
            headers.push(("Content-Length".to_string(), body_len.to_string()));
        }
        if compressed {
            headers.push(("Content-Encoding".to_string(), "gzip".to_string()));
        }
        headers
    }

    pub(crate) fn on_headers(&mut self, status: u16, headers: Vec<(String, String)>) {
        if self.completed {
            warn!("dropping response headers after completion");
            return;
        }
        self.status = status;
        self.headers = headers;
    }

    pub(crate) fn on_body(&mut self, data: &[u8]) {
        if self.completed {
            warn!("dropping {} response bytes after completion", data.len());
            return;
        }
        self.sink.extend_from_slice(data);
    }

    pub(crate) fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Consume the accumulated response into a successful outcome. The
    /// completion slot is spent; any further call yields nothing.
    pub(crate) fn complete(&mut self, stats: StackStats) -> Option<ExchangeOutcome> {
        if self.completed {
            return None;
        }
        self.completed = true;
        Some(ExchangeOutcome {
            status: self.status,
            headers: std::mem::take(&mut self.headers),
            body: std::mem::take(&mut self.sink),
            error: None,
            stats,
        })
    }
}
