/*
 * policy.rs
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

//! Completion classification: transient transport faults become retries,
//! 3xx responses with a Location become rewritten-request retries,
//! everything else is terminal.

use crate::request::HttpRequest;
use crate::result::header_value;
use crate::stack::content::ExchangeOutcome;
use crate::url::Url;

/// What the manager does with a completed exchange.
#[derive(Debug)]
pub(crate) enum Disposition {
    /// Try again with the same request.
    Retry,
    /// Follow the redirect with the rewritten request.
    Redirect(HttpRequest),
    /// Report the outcome as-is.
    Terminal,
}

/// Rewrite the request around the response's `Location`, keeping method,
/// timeout, TLS settings, headers, body and compression policy. Empty or
/// unparseable locations yield nothing (terminal).
fn create_redirection(outcome: &ExchangeOutcome, request: &HttpRequest) -> Option<HttpRequest> {
    let location = header_value(&outcome.headers, "Location")?;
    if location.is_empty() {
        return None;
    }
    let url = Url::parse(location).ok()?;
    Some(request.redirected_to(url))
}

pub(crate) fn classify(outcome: &ExchangeOutcome, request: &HttpRequest) -> Disposition {
    if let Some(error) = &outcome.error {
        if error.is_transient() {
            return Disposition::Retry;
        }
        return Disposition::Terminal;
    }

    match outcome.status {
        301..=308 => match create_redirection(outcome, request) {
            Some(new_request) => Disposition::Redirect(new_request),
            None => Disposition::Terminal,
        },
        _ => Disposition::Terminal,
    }
}
