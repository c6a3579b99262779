/*
 * url.rs
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

//! Request URL: `[protocol://]host[:port][/path][?query]`. Default protocol http,
//! default ports 80/443. `to_string` round-trips through `parse`.

use std::fmt;
use std::str::FromStr;

const DEFAULT_PORT_HTTP: u16 = 80;
const DEFAULT_PORT_HTTPS: u16 = 443;

pub const PROTOCOL_HTTP: &str = "http";
pub const PROTOCOL_HTTPS: &str = "https";

/// Failure to parse a URL string. The offending input is kept for the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlError {
    pub input: String,
    pub reason: &'static str,
}

impl UrlError {
    fn new(input: &str, reason: &'static str) -> Self {
        Self {
            input: input.to_string(),
            reason,
        }
    }
}

impl fmt::Display for UrlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse url '{}': {}", self.input, self.reason)
    }
}

impl std::error::Error for UrlError {}

/// Parsed request URL. Port is always concrete (the protocol default is
/// filled in when absent); query is stored without the leading '?'.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Url {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub path: String,
    pub query: String,
}

impl Url {
    /// Parse from `[protocol://]host[:port][/path][?query]`.
    /// Only http and https are accepted.
    pub fn parse(input: &str) -> Result<Url, UrlError> {
        let (protocol, rest) = match input.find("://") {
            Some(n) => (&input[..n], &input[n + 3..]),
            None => (PROTOCOL_HTTP, input),
        };
        if protocol != PROTOCOL_HTTP && protocol != PROTOCOL_HTTPS {
            return Err(UrlError::new(input, "unsupported protocol"));
        }

        // Authority ends at the first '/' or '?'.
        let authority_end = rest
            .find(|c| c == '/' || c == '?')
            .unwrap_or(rest.len());
        let authority = &rest[..authority_end];
        let rest = &rest[authority_end..];

        let (host, port_str) = match authority.find(':') {
            Some(n) => (&authority[..n], Some(&authority[n + 1..])),
            None => (authority, None),
        };
        if host.is_empty() {
            return Err(UrlError::new(input, "empty host"));
        }
        if !host
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'.')
        {
            return Err(UrlError::new(input, "invalid host"));
        }

        let port = match port_str {
            Some(p) => u16::from_str(p).map_err(|_| UrlError::new(input, "invalid port"))?,
            None => {
                if protocol == PROTOCOL_HTTPS {
                    DEFAULT_PORT_HTTPS
                } else {
                    DEFAULT_PORT_HTTP
                }
            }
        };

        let (path, query) = match rest.find('?') {
            Some(n) => (&rest[..n], &rest[n + 1..]),
            None => (rest, ""),
        };
        let path = if path.is_empty() {
            "/".to_string()
        } else {
            path.to_string()
        };

        Ok(Url {
            protocol: protocol.to_string(),
            host: host.to_string(),
            port,
            path,
            query: query.to_string(),
        })
    }

    /// True when the protocol implies TLS.
    pub fn is_secure(&self) -> bool {
        self.protocol == PROTOCOL_HTTPS
    }

    /// Default port for this URL's protocol.
    fn default_port(&self) -> u16 {
        if self.is_secure() {
            DEFAULT_PORT_HTTPS
        } else {
            DEFAULT_PORT_HTTP
        }
    }

    /// Path plus query as sent in the request line.
    pub fn path_and_query(&self) -> String {
        if self.query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.query)
        }
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.protocol, self.host)?;
        if self.port != self.default_port() {
            write!(f, ":{}", self.port)?;
        }
        write!(f, "{}", self.path)?;
        if !self.query.is_empty() {
            write!(f, "?{}", self.query)?;
        }
        Ok(())
    }
}

impl FromStr for Url {
    type Err = UrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Url::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_applied() {
        let u = Url::parse("www.example.com").unwrap();
        assert_eq!(u.protocol, "http");
        assert_eq!(u.host, "www.example.com");
        assert_eq!(u.port, 80);
        assert_eq!(u.path, "/");
        assert_eq!(u.query, "");
    }

    #[test]
    fn https_default_port() {
        let u = Url::parse("https://example.com/a/b").unwrap();
        assert_eq!(u.port, 443);
        assert_eq!(u.path, "/a/b");
    }

    #[test]
    fn explicit_port_and_query() {
        let u = Url::parse("http://127.0.0.1:10123/echo?x=1&y=2").unwrap();
        assert_eq!(u.host, "127.0.0.1");
        assert_eq!(u.port, 10123);
        assert_eq!(u.path, "/echo");
        assert_eq!(u.query, "x=1&y=2");
        assert_eq!(u.path_and_query(), "/echo?x=1&y=2");
    }

    #[test]
    fn to_string_omits_default_port() {
        let u = Url::parse("http://example.com:80/x").unwrap();
        assert_eq!(u.to_string(), "http://example.com/x");
        let u = Url::parse("https://example.com:8443/x").unwrap();
        assert_eq!(u.to_string(), "https://example.com:8443/x");
    }

    #[test]
    fn full_form_preserved() {
        let s = "https://any.host.com:1234/some/path?and_query";
        let u = Url::parse(s).unwrap();
        assert_eq!(u.protocol, "https");
        assert_eq!(u.host, "any.host.com");
        assert_eq!(u.port, 1234);
        assert_eq!(u.path, "/some/path");
        assert_eq!(u.query, "and_query");
        assert_eq!(u.to_string(), s);
    }

    #[test]
    fn equality_is_structural() {
        let a1 = Url::parse("https://oneaddress.com").unwrap();
        let a2 = Url::parse("https://oneaddress.com").unwrap();
        let b = Url::parse("https://anotheraddress.com").unwrap();
        assert_eq!(a1, a2);
        assert_ne!(a1, b);
    }

    #[test]
    fn round_trip() {
        for s in [
            "http://example.com/",
            "https://example.com/a?b=c",
            "http://127.0.0.1:10123/anything",
            "https://a.b-c.de:444/p/q?r",
        ] {
            let u = Url::parse(s).unwrap();
            assert_eq!(Url::parse(&u.to_string()).unwrap(), u);
        }
    }

    #[test]
    fn rejects_garbage() {
        assert!(Url::parse("ftp://example.com").is_err());
        assert!(Url::parse("http://").is_err());
        assert!(Url::parse("http://ex ample.com/").is_err());
        assert!(Url::parse("http://example.com:notaport/").is_err());
    }
}
