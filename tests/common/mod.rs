/*
 * common/mod.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Staffetta, an asynchronous HTTP client library.
 *
 * Deterministic HTTP test server for the integration suite. Fixed routes:
 *   /anything    200 with a known text body
 *   /echo        200 echoing the request body
 *   /timeout     accepts the request and never responds
 *   /redirect    301 with a Location to the configured target
 *   /compressed  200 with a gzip-coded body
 *   /close       200 with Connection: close, then closes the socket
 * HEAD requests receive the same headers with no body bytes.
 */

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub const GET_RESPONSE: &str = "This is the response";
pub const UNCOMPRESSED_TEXT: &str = "Testing compression\n";

/// gzip of UNCOMPRESSED_TEXT.
pub const COMPRESSED_TEXT: &[u8] = &[
    0x1f, 0x8b, 0x08, 0x00, 0x64, 0x71, 0xd5, 0x5d, 0x00, 0x03, 0x0b, 0x49, 0x2d, 0x2e, 0xc9,
    0xcc, 0x4b, 0x57, 0x48, 0xce, 0xcf, 0x2d, 0x28, 0x4a, 0x2d, 0x2e, 0xce, 0xcc, 0xcf, 0xe3,
    0x02, 0x00, 0x4b, 0x67, 0x20, 0xb6, 0x14, 0x00, 0x00, 0x00,
];

/// Ephemeral-port test server; serves until dropped (the accept task ends
/// when the listener does and idle client tasks die with their sockets).
pub struct TestServer {
    addr: SocketAddr,
    connections: Arc<AtomicUsize>,
}

impl TestServer {
    /// Bind on a loopback ephemeral port. `redirect_target` is the base
    /// URL (e.g. `http://127.0.0.1:10124`) the /redirect route points at.
    pub async fn start(redirect_target: Option<String>) -> TestServer {
        Self::start_inner(redirect_target, false).await
    }

    /// Server that silently drops each connection after one response,
    /// without announcing `Connection: close` — the stale keep-alive
    /// socket case a client must retry on.
    pub async fn start_single_shot() -> TestServer {
        Self::start_inner(None, true).await
    }

    async fn start_inner(redirect_target: Option<String>, single_shot: bool) -> TestServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let connections = Arc::new(AtomicUsize::new(0));
        let counter = connections.clone();
        tokio::spawn(async move {
            loop {
                let Ok((socket, _peer)) = listener.accept().await else {
                    return;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                let target = redirect_target.clone();
                tokio::spawn(serve_client(socket, target, single_shot));
            }
        });
        TestServer { addr, connections }
    }

    pub fn url(&self, resource: &str) -> String {
        format!("http://{}{}", self.addr, resource)
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Number of TCP connections accepted so far.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

struct ParsedRequest {
    method: String,
    path: String,
    body: Vec<u8>,
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

async fn read_request(socket: &mut TcpStream) -> Option<ParsedRequest> {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 1024];
    let header_end = loop {
        if let Some(pos) = find_header_end(&buf) {
            break pos;
        }
        let n = socket.read(&mut tmp).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&tmp[..n]);
    };

    let head = String::from_utf8(buf[..header_end].to_vec()).ok()?;
    let mut lines = head.split("\r\n");
    let request_line = lines.next()?;
    let mut parts = request_line.split(' ');
    let method = parts.next()?.to_string();
    let target = parts.next()?;
    let path = target.split('?').next().unwrap_or(target).to_string();

    let mut headers = HashMap::new();
    for line in lines {
        if let Some(colon) = line.find(':') {
            headers.insert(
                line[..colon].trim().to_ascii_lowercase(),
                line[colon + 1..].trim().to_string(),
            );
        }
    }
    let content_length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let mut body = buf[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = socket.read(&mut tmp).await.ok()?;
        if n == 0 {
            return None;
        }
        body.extend_from_slice(&tmp[..n]);
    }
    body.truncate(content_length);

    Some(ParsedRequest { method, path, body })
}

async fn write_response(
    socket: &mut TcpStream,
    status_line: &str,
    extra_headers: &[(&str, String)],
    body: &[u8],
    head_request: bool,
) -> std::io::Result<()> {
    let mut response = format!("{}\r\nServer: staffetta-test\r\n", status_line);
    for (name, value) in extra_headers {
        response.push_str(&format!("{}: {}\r\n", name, value));
    }
    response.push_str(&format!("Content-Length: {}\r\n\r\n", body.len()));
    socket.write_all(response.as_bytes()).await?;
    if !head_request {
        socket.write_all(body).await?;
    }
    socket.flush().await
}

async fn serve_client(mut socket: TcpStream, redirect_target: Option<String>, single_shot: bool) {
    loop {
        let Some(request) = read_request(&mut socket).await else {
            return;
        };
        let head = request.method == "HEAD";
        let result = match request.path.as_str() {
            "/anything" => {
                write_response(
                    &mut socket,
                    "HTTP/1.1 200 OK",
                    &[("Content-Type", "text/plain".to_string())],
                    GET_RESPONSE.as_bytes(),
                    head,
                )
                .await
            }
            "/echo" => {
                write_response(
                    &mut socket,
                    "HTTP/1.1 200 OK",
                    &[("Content-Type", "text/plain".to_string())],
                    &request.body,
                    head,
                )
                .await
            }
            "/timeout" => {
                // Hold the connection open and never answer.
                tokio::time::sleep(Duration::from_secs(3600)).await;
                return;
            }
            "/redirect" => {
                let target = redirect_target.clone().unwrap_or_default();
                write_response(
                    &mut socket,
                    "HTTP/1.1 301 Moved Permanently",
                    &[
                        ("Location", format!("{}/anything", target)),
                        ("Content-Type", "text/plain".to_string()),
                    ],
                    b"Moved",
                    head,
                )
                .await
            }
            "/compressed" => {
                write_response(
                    &mut socket,
                    "HTTP/1.1 200 OK",
                    &[
                        ("Content-Type", "text/plain".to_string()),
                        ("Content-Encoding", "gzip".to_string()),
                    ],
                    COMPRESSED_TEXT,
                    head,
                )
                .await
            }
            "/close" => {
                let _ = write_response(
                    &mut socket,
                    "HTTP/1.1 200 OK",
                    &[
                        ("Content-Type", "text/plain".to_string()),
                        ("Connection", "close".to_string()),
                    ],
                    GET_RESPONSE.as_bytes(),
                    head,
                )
                .await;
                return;
            }
            _ => {
                write_response(
                    &mut socket,
                    "HTTP/1.1 404 Not Found",
                    &[("Content-Type", "text/plain".to_string())],
                    b"not found",
                    head,
                )
                .await
            }
        };
        if result.is_err() || single_shot {
            return;
        }
    }
}
