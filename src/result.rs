/*
 * result.rs
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

//! Request outcome delivered to the completion handler: status, headers,
//! body, optional error and timing statistics.

use std::time::Duration;

use crate::error::ErrorKind;

/// Timing and volume statistics for one request (across all of its
/// transfer, from admission to terminal completion).
#[derive(Debug, Clone, Default)]
pub struct RequestStats {
    pub total_time: Duration,
    pub name_lookup_time: Duration,
    pub uploaded_bytes: u64,
    pub downloaded_bytes: u64,
    pub avg_upload_speed_bps: u64,
    pub avg_download_speed_bps: u64,
}

/// Final outcome of a request. `error == None` iff the server completed a
/// response; `status_code` is then the HTTP status it sent.
#[derive(Debug, Clone, Default)]
pub struct HttpResult {
    pub status_code: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub error: Option<ErrorKind>,
    pub stats: RequestStats,
}

impl HttpResult {
    pub(crate) fn from_error(error: ErrorKind) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    /// Response body as a (lossy) UTF-8 string.
    pub fn body_as_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// First header with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name)
    }
}

/// Case-insensitive header lookup over an ordered `(name, value)` list.
pub(crate) fn header_value<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let r = HttpResult {
            headers: vec![
                ("Content-Type".to_string(), "text/plain".to_string()),
                ("Content-Encoding".to_string(), "gzip".to_string()),
            ],
            ..HttpResult::default()
        };
        assert_eq!(r.header("content-type"), Some("text/plain"));
        assert_eq!(r.header("CONTENT-ENCODING"), Some("gzip"));
        assert_eq!(r.header("location"), None);
    }

    #[test]
    fn body_as_string() {
        let r = HttpResult {
            body: b"This is the response".to_vec(),
            ..HttpResult::default()
        };
        assert_eq!(r.body_as_string(), "This is the response");
    }
}
