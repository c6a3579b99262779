/*
 * encoding.rs
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

//! Transparent body coding. Outbound: gzip request bodies per the
//! compression policy. Inbound: select identity/gzip/deflate from
//! `Content-Encoding`, buffer coded bytes and decode on completion.
//! Unknown encodings pass through as identity; framing is untouched.

use std::io::{Read, Write};

use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{error, warn};

use crate::request::CompressionPolicy;
use crate::result::header_value;

/// Response body coding selected from the headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentCoding {
    Identity,
    Gzip,
    Deflate,
}

/// gzip-compress at best compression (request bodies).
pub(crate) fn compress_gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data)?;
    encoder.finish()
}

fn decompress_gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}

/// `Content-Encoding: deflate` means the zlib container.
fn decompress_deflate(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    ZlibDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}

/// Apply the request's compression policy. Returns the body to send and
/// whether a `Content-Encoding: gzip` header must accompany it.
/// `WhenBetter` compresses only when the result is strictly smaller.
pub(crate) fn encode_request_body(
    policy: CompressionPolicy,
    body: &[u8],
) -> (Vec<u8>, bool) {
    if policy == CompressionPolicy::Never || body.is_empty() {
        return (body.to_vec(), false);
    }
    match compress_gzip(body) {
        Ok(compressed)
            if policy == CompressionPolicy::Always || compressed.len() < body.len() =>
        {
            (compressed, true)
        }
        Ok(_) => (body.to_vec(), false),
        Err(e) => {
            error!("gzip compression of request body failed: {}", e);
            (body.to_vec(), false)
        }
    }
}

/// Inbound coding state for one response.
pub(crate) struct EncodingLayer {
    coding: ContentCoding,
    /// Coded bytes buffered until message completion (empty for identity).
    buffer: Vec<u8>,
}

impl EncodingLayer {
    pub(crate) fn new() -> Self {
        Self {
            coding: ContentCoding::Identity,
            buffer: Vec::new(),
        }
    }

    pub(crate) fn start(&mut self) {
        self.coding = ContentCoding::Identity;
        self.buffer.clear();
    }

    /// Inspect the response headers and pick the coding.
    pub(crate) fn on_headers(&mut self, headers: &[(String, String)]) {
        self.coding = match header_value(headers, "Content-Encoding") {
            None => ContentCoding::Identity,
            Some(v) if v.eq_ignore_ascii_case("gzip") => ContentCoding::Gzip,
            Some(v) if v.eq_ignore_ascii_case("deflate") => ContentCoding::Deflate,
            Some(v) if v.eq_ignore_ascii_case("identity") => ContentCoding::Identity,
            Some(v) => {
                warn!("unknown content encoding '{}', passing through", v);
                ContentCoding::Identity
            }
        };
    }

    /// Body bytes from the parser. Identity bytes pass straight through
    /// (returned); coded bytes are buffered until `finish`.
    pub(crate) fn on_body<'a>(&mut self, data: &'a [u8]) -> Option<&'a [u8]> {
        match self.coding {
            ContentCoding::Identity => Some(data),
            _ => {
                self.buffer.extend_from_slice(data);
                None
            }
        }
    }

    /// Message complete: decode whatever was buffered. A failed decode is
    /// logged and yields an empty body.
    pub(crate) fn finish(&mut self) -> Vec<u8> {
        let coded = std::mem::take(&mut self.buffer);
        let result = match self.coding {
            ContentCoding::Identity => return Vec::new(),
            ContentCoding::Gzip => decompress_gzip(&coded),
            ContentCoding::Deflate => decompress_deflate(&coded),
        };
        match result {
            Ok(decoded) => decoded,
            Err(e) => {
                error!("failed to decode response body: {}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // gzip of "Testing compression\n", as served by the compressed route.
    const COMPRESSED_TEXT: &[u8] = &[
        0x1f, 0x8b, 0x08, 0x00, 0x64, 0x71, 0xd5, 0x5d, 0x00, 0x03, 0x0b, 0x49, 0x2d, 0x2e,
        0xc9, 0xcc, 0x4b, 0x57, 0x48, 0xce, 0xcf, 0x2d, 0x28, 0x4a, 0x2d, 0x2e, 0xce, 0xcc,
        0xcf, 0xe3, 0x02, 0x00, 0x4b, 0x67, 0x20, 0xb6, 0x14, 0x00, 0x00, 0x00,
    ];

    fn headers(encoding: &str) -> Vec<(String, String)> {
        vec![("Content-Encoding".to_string(), encoding.to_string())]
    }

    #[test]
    fn gzip_response_decoded_on_finish() {
        let mut layer = EncodingLayer::new();
        layer.start();
        layer.on_headers(&headers("gzip"));
        assert_eq!(layer.on_body(&COMPRESSED_TEXT[..10]), None);
        assert_eq!(layer.on_body(&COMPRESSED_TEXT[10..]), None);
        assert_eq!(layer.finish(), b"Testing compression\n");
    }

    #[test]
    fn identity_passes_through() {
        let mut layer = EncodingLayer::new();
        layer.start();
        layer.on_headers(&[]);
        assert_eq!(layer.on_body(b"plain"), Some(&b"plain"[..]));
        assert!(layer.finish().is_empty());
    }

    #[test]
    fn unknown_encoding_is_identity() {
        let mut layer = EncodingLayer::new();
        layer.start();
        layer.on_headers(&headers("br"));
        assert_eq!(layer.on_body(b"data"), Some(&b"data"[..]));
    }

    #[test]
    fn corrupt_gzip_yields_empty_body() {
        let mut layer = EncodingLayer::new();
        layer.start();
        layer.on_headers(&headers("gzip"));
        layer.on_body(b"definitely not gzip");
        assert!(layer.finish().is_empty());
    }

    #[test]
    fn policy_never_keeps_body() {
        let (body, compressed) = encode_request_body(CompressionPolicy::Never, b"abc");
        assert_eq!(body, b"abc");
        assert!(!compressed);
    }

    #[test]
    fn policy_always_compresses() {
        let (body, compressed) = encode_request_body(CompressionPolicy::Always, b"abc");
        assert!(compressed);
        assert_eq!(decompress_gzip(&body).unwrap(), b"abc");
    }

    #[test]
    fn policy_when_better_requires_smaller_output() {
        // Tiny incompressible input: gzip overhead makes it larger.
        let (body, compressed) = encode_request_body(CompressionPolicy::WhenBetter, b"xyz");
        assert_eq!(body, b"xyz");
        assert!(!compressed);

        let repetitive = vec![b'a'; 4096];
        let (body, compressed) =
            encode_request_body(CompressionPolicy::WhenBetter, &repetitive);
        assert!(compressed);
        assert!(body.len() < repetitive.len());
        assert_eq!(decompress_gzip(&body).unwrap(), repetitive);
    }
}
