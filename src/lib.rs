/*
 * lib.rs
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

//! Staffetta: asynchronous HTTP/1.1 client for tokio.
//!
//! Requests are multiplexed over a bounded pool of keep-alive connections
//! (plain TCP or rustls TLS) with transparent gzip/deflate decoding,
//! redirect following and bounded retry on transient transport faults.
//! Completions arrive through a callback or as an awaited future; requests
//! can be cancelled in batches by token.
//!
//! ```no_run
//! use staffetta::{HttpClient, HttpClientSettings};
//!
//! # async fn example() {
//! let client = HttpClient::new(HttpClientSettings::default());
//! let result = client.get("http://example.com/").await.unwrap();
//! println!("{} {}", result.status_code, result.body_as_string());
//! # }
//! ```

mod client;
mod completion;
mod error;
mod manager;
mod net;
mod pool;
mod request;
mod result;
mod stack;
mod url;

pub use client::{HttpClient, HttpClientSettings};
pub use error::{ErrorKind, ParseErrorKind, TransportErrorKind};
pub use request::{
    CompressionPolicy, HttpRequest, Method, SslSettings, DEFAULT_TIMEOUT_MSEC,
};
pub use result::{HttpResult, RequestStats};
pub use url::{Url, UrlError};
