/*
 * mod.rs
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

//! The composed connection stack: content ↔ encoding ↔ protocol ↔
//! transport, jointly owned as one unit that handles one request at a
//! time. `run` drives a full exchange under the request timeout; `cancel`
//! (via the armed `CancelFlag`) closes the transport and yields
//! `Cancelled`, idempotently.

pub(crate) mod content;
pub(crate) mod encoding;
pub(crate) mod protocol;
pub(crate) mod transport;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tokio::sync::Notify;

use crate::error::{ErrorKind, TransportErrorKind};
use crate::request::{HttpRequest, Method};
use self::content::{BodySource, ContentLayer, ExchangeOutcome, StackStats, BODY_CHUNK_SIZE};
use self::encoding::{encode_request_body, EncodingLayer};
use self::protocol::{serialize_request, ProtocolEvent, ResponseParser};
use self::transport::{ConnectError, Transport};

pub(crate) type StackId = u64;

/// One-shot cancellation signal shared between the manager (setter) and
/// the stack driver (waiter). Cancelling after completion is a no-op.
pub(crate) struct CancelFlag {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelFlag {
    pub(crate) fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    pub(crate) fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Resolve once cancelled. Registers with the notifier before checking
    /// the flag so a concurrent `cancel` cannot be missed.
    pub(crate) async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// A connection stack bound to one `host:port`. Owned either by the pool
/// (idle) or by the driver task of the request it is serving.
pub(crate) struct HttpStack {
    id: StackId,
    host: String,
    port: u16,
    transport: Transport,
    parser: ResponseParser,
    encoding: EncodingLayer,
    content: ContentLayer,
    cancel: Arc<CancelFlag>,
    not_reusable: bool,
}

impl HttpStack {
    pub(crate) fn new(id: StackId, host: String, port: u16, secure: bool) -> Self {
        Self {
            id,
            host,
            port,
            transport: Transport::new(secure),
            parser: ResponseParser::new(),
            encoding: EncodingLayer::new(),
            content: ContentLayer::new(),
            cancel: Arc::new(CancelFlag::new()),
            not_reusable: false,
        }
    }

    pub(crate) fn id(&self) -> StackId {
        self.id
    }

    pub(crate) fn host_port(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }

    pub(crate) fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    pub(crate) fn not_reusable(&self) -> bool {
        self.not_reusable
    }

    /// Install a fresh cancellation flag for the next `run` and hand the
    /// manager its end. A stale flag from a previous exchange must never
    /// leak into the next one.
    pub(crate) fn arm_cancel(&mut self) -> Arc<CancelFlag> {
        let flag = Arc::new(CancelFlag::new());
        self.cancel = flag.clone();
        flag
    }

    fn take_stats(&self) -> StackStats {
        StackStats {
            name_lookup_time: self.transport.name_lookup_time(),
            uploaded_bytes: self.transport.bytes_written(),
            downloaded_bytes: self.transport.bytes_read(),
        }
    }

    /// Drive one request to its terminal event. Consumes and returns the
    /// stack so ownership moves driver → manager with the outcome.
    pub(crate) async fn run(mut self, request: Arc<HttpRequest>) -> (ExchangeOutcome, Self) {
        self.transport.reset_stats();
        self.content.start();
        self.encoding.start();
        self.parser.start(request.method == Method::Head);

        let deadline = Duration::from_millis(u64::from(request.timeout_msec));
        let cancel = self.cancel.clone();

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            r = tokio::time::timeout(deadline, self.exchange(&request)) => Some(r),
        };

        let outcome = match result {
            // Cancelled: close the transport, the entry completes with
            // Cancelled. Late cancellation of a finished exchange never
            // gets here (the exchange branch wins the select).
            None => {
                self.transport.close();
                self.not_reusable = true;
                ExchangeOutcome::failed(ErrorKind::Cancelled, self.take_stats())
            }
            // Timer expiry closes the transport.
            Some(Err(_elapsed)) => {
                self.transport.close();
                self.not_reusable = true;
                ExchangeOutcome::failed(ErrorKind::Timeout, self.take_stats())
            }
            Some(Ok(Ok(outcome))) => outcome,
            Some(Ok(Err(error))) => {
                self.transport.close();
                self.not_reusable = true;
                ExchangeOutcome::failed(error, self.take_stats())
            }
        };
        (outcome, self)
    }

    /// One write/read exchange over the (possibly reused) connection.
    async fn exchange(&mut self, request: &HttpRequest) -> Result<ExchangeOutcome, ErrorKind> {
        if !self.transport.is_open() {
            self.transport
                .connect(&self.host, self.port, &request.ssl)
                .await
                .map_err(|e| match e {
                    ConnectError::Io(e) => ErrorKind::from_io(&e),
                    ConnectError::Tls(e) => ErrorKind::Tls(e.to_string()),
                })?;
        }

        let (body, compressed) = encode_request_body(request.compression, &request.body);
        let headers = ContentLayer::effective_headers(request, body.len(), compressed);
        let head = serialize_request(request.method, &request.url, &headers);
        self.transport
            .write_all(&head)
            .await
            .map_err(|e| ErrorKind::from_io(&e))?;

        let mut source = BodySource::new(body);
        while let Some(chunk) = source.next_chunk(BODY_CHUNK_SIZE) {
            self.transport
                .write_all(chunk)
                .await
                .map_err(|e| ErrorKind::from_io(&e))?;
        }

        let mut buf = BytesMut::with_capacity(8192);
        let mut tmp = [0u8; 8192];
        loop {
            let n = self
                .transport
                .read_some(&mut tmp)
                .await
                .map_err(|e| ErrorKind::from_io(&e))?;
            if n == 0 {
                if !self.parser.on_eof() {
                    // Stream ended mid-message: stale keep-alive socket or
                    // a truncated response. Transient, the manager retries.
                    return Err(ErrorKind::Transport(TransportErrorKind::UnexpectedEof));
                }
            } else {
                buf.extend_from_slice(&tmp[..n]);
                self.parser.receive(&mut buf).map_err(ErrorKind::Parse)?;
            }

            while let Some(event) = self.parser.next_event() {
                match event {
                    ProtocolEvent::Headers { status, headers } => {
                        self.encoding.on_headers(&headers);
                        self.content.on_headers(status, headers);
                    }
                    ProtocolEvent::Body(data) => {
                        if let Some(decoded) = self.encoding.on_body(&data) {
                            self.content.on_body(decoded);
                        }
                    }
                    ProtocolEvent::Complete { keep_alive } => {
                        let tail = self.encoding.finish();
                        if !tail.is_empty() {
                            self.content.on_body(&tail);
                        }
                        if self.parser.has_trailing_garbage() {
                            self.not_reusable = true;
                        }
                        if !keep_alive {
                            self.not_reusable = true;
                        }
                        if self.not_reusable {
                            self.transport.close();
                        }
                        let stats = self.take_stats();
                        return self.content.complete(stats).ok_or_else(|| {
                            log::error!("completion slot already consumed");
                            ErrorKind::Transport(TransportErrorKind::Other(
                                "duplicate message completion".to_string(),
                            ))
                        });
                    }
                }
            }
        }
    }
}
