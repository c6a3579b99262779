/*
 * request.rs
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

//! HTTP request: method, url, timeout, TLS material, headers, body and
//! body-compression policy. Immutable once admitted (held as `Arc`).

use crate::url::Url;

/// HTTP request method. Only the methods the client implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Head,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Head => "HEAD",
        }
    }
}

/// Whether to gzip the request body before sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionPolicy {
    /// Never compress.
    Never,
    /// Compress only when the compressed form is strictly smaller.
    WhenBetter,
    /// Always compress, even when not smaller.
    Always,
}

/// Paths to PEM files for client authentication and trust anchors.
/// Any field may be empty; empty settings use the platform trust store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SslSettings {
    pub client_private_key_file: String,
    pub client_certificate_file: String,
    pub certificate_authority_bundle_file: String,
}

impl SslSettings {
    pub fn is_empty(&self) -> bool {
        self.client_private_key_file.is_empty()
            && self.client_certificate_file.is_empty()
            && self.certificate_authority_bundle_file.is_empty()
    }
}

/// Default request timeout: two minutes.
pub const DEFAULT_TIMEOUT_MSEC: u32 = 120 * 1000;

/// One HTTP request. Fields are public; build with `new` and fill in what
/// differs from the defaults, or use the `HttpClient` conveniences.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    /// Milliseconds after which the request is aborted.
    pub timeout_msec: u32,
    pub ssl: SslSettings,
    /// Ordered header list; names are sent as given.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub compression: CompressionPolicy,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            timeout_msec: DEFAULT_TIMEOUT_MSEC,
            ssl: SslSettings::default(),
            headers: Vec::new(),
            body: Vec::new(),
            compression: CompressionPolicy::Never,
        }
    }

    /// New request identical to this one but aimed at `url`. Used when
    /// following a redirect: method, timeout, TLS settings, headers, body
    /// and compression policy all carry over.
    pub(crate) fn redirected_to(&self, url: Url) -> Self {
        Self {
            method: self.method,
            url,
            timeout_msec: self.timeout_msec,
            ssl: self.ssl.clone(),
            headers: self.headers.clone(),
            body: self.body.clone(),
            compression: self.compression,
        }
    }
}
