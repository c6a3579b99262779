/*
 * transport.rs
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

//! Transport layer: one TCP or TLS byte stream. Resolves the host, tries
//! each endpoint in order, performs the TLS handshake for https, and
//! counts bytes for the request statistics. Errors are reported verbatim;
//! nothing is retried here.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::{lookup_host, TcpStream};
use tokio_rustls::client::TlsStream as TokioTlsStream;
use tokio_rustls::rustls::pki_types::ServerName;

use crate::net::connector_for;
use crate::request::SslSettings;

/// Unified stream: plain TCP or TLS. Implements AsyncRead + AsyncWrite.
pub(crate) enum HttpStream {
    Plain(TcpStream),
    Tls(Box<TokioTlsStream<TcpStream>>),
}

impl AsyncRead for HttpStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for HttpStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_flush(cx),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Connect failure, keeping the TLS phase distinguishable so the error
/// surface can report `Tls` separately from plain transport faults.
#[derive(Debug)]
pub(crate) enum ConnectError {
    Io(io::Error),
    Tls(io::Error),
}

/// TCP or TLS transport for one stack. At most one stream at a time;
/// `close` drops it and a later `connect` replaces it.
pub(crate) struct Transport {
    secure: bool,
    stream: Option<HttpStream>,
    bytes_read: u64,
    bytes_written: u64,
    name_lookup_time: Duration,
}

impl Transport {
    pub(crate) fn new(secure: bool) -> Self {
        Self {
            secure,
            stream: None,
            bytes_read: 0,
            bytes_written: 0,
            name_lookup_time: Duration::ZERO,
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Drop the stream. Idempotent; the OS closes the socket on drop.
    pub(crate) fn close(&mut self) {
        self.stream = None;
    }

    /// Resolve and connect, trying each endpoint in order; the error of
    /// the last endpoint is reported only once the list is exhausted.
    /// For a secure transport the TLS handshake completes before success.
    pub(crate) async fn connect(
        &mut self,
        host: &str,
        port: u16,
        ssl: &SslSettings,
    ) -> Result<(), ConnectError> {
        let lookup_start = Instant::now();
        let addrs = lookup_host((host, port))
            .await
            .map_err(ConnectError::Io)?;
        self.name_lookup_time += lookup_start.elapsed();

        let mut last_error = io::Error::new(io::ErrorKind::NotFound, "no endpoints resolved");
        let mut tcp = None;
        for addr in addrs {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    tcp = Some(stream);
                    break;
                }
                Err(e) => last_error = e,
            }
        }
        let tcp = match tcp {
            Some(t) => t,
            None => return Err(ConnectError::Io(last_error)),
        };

        if self.secure {
            let server_name: ServerName<'static> = ServerName::try_from(host.to_string())
                .map_err(|_| {
                    ConnectError::Tls(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "invalid host name",
                    ))
                })?;
            let connector = connector_for(ssl).map_err(ConnectError::Tls)?;
            let tls = connector
                .connect(server_name, tcp)
                .await
                .map_err(ConnectError::Tls)?;
            self.stream = Some(HttpStream::Tls(Box::new(tls)));
        } else {
            self.stream = Some(HttpStream::Plain(tcp));
        }
        Ok(())
    }

    /// Read some bytes into `buf`. Returns 0 on EOF.
    pub(crate) async fn read_some(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "transport closed"))?;
        let n = stream.read(buf).await?;
        self.bytes_read += n as u64;
        Ok(n)
    }

    /// Write all of `data` and flush. On error the socket is closed so a
    /// faulted stream is never reused.
    pub(crate) async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "transport closed"))?;
        let result = async {
            stream.write_all(data).await?;
            stream.flush().await
        }
        .await;
        match result {
            Ok(()) => {
                self.bytes_written += data.len() as u64;
                Ok(())
            }
            Err(e) => {
                self.close();
                Err(e)
            }
        }
    }

    /// Clear per-request statistics. Called at the start of each exchange
    /// so a reused stack reports only its current request.
    pub(crate) fn reset_stats(&mut self) {
        self.bytes_read = 0;
        self.bytes_written = 0;
        self.name_lookup_time = Duration::ZERO;
    }

    pub(crate) fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub(crate) fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub(crate) fn name_lookup_time(&self) -> Duration {
        self.name_lookup_time
    }
}
