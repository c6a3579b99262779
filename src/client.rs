/*
 * client.rs
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

//! The HTTP client: submit requests with a completion callback or await
//! them as futures; cancel by token; shut down cleanly.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};

use crate::error::ErrorKind;
use crate::manager::{ManagerCommand, RequestManager};
use crate::request::{HttpRequest, Method, SslSettings};
use crate::result::HttpResult;
use crate::url::{Url, UrlError};

/// Client tuning knobs.
#[derive(Debug, Clone, Copy)]
pub struct HttpClientSettings {
    /// Upper bound on concurrently executing requests.
    pub max_parallel_requests: u32,
    /// Upper bound on retries (transient faults and redirects) per request.
    pub max_attempts: u32,
}

impl Default for HttpClientSettings {
    fn default() -> Self {
        Self {
            max_parallel_requests: 25,
            max_attempts: 5,
        }
    }
}

/// Asynchronous HTTP/1.1 client over a pool of keep-alive connections.
///
/// Create on a tokio runtime; every completion handler runs on the runtime
/// that submitted its request. Dropping the client cancels outstanding
/// requests without waiting for them; use `shutdown` to also await their
/// terminal events.
pub struct HttpClient {
    tx: mpsc::UnboundedSender<ManagerCommand>,
    default_executor: Handle,
}

impl HttpClient {
    /// Create a client on the current tokio runtime.
    ///
    /// Panics when called outside a runtime.
    pub fn new(settings: HttpClientSettings) -> Self {
        Self::with_runtime(settings, &Handle::current())
    }

    /// Create a client whose manager runs on the given runtime handle.
    pub fn with_runtime(settings: HttpClientSettings, handle: &Handle) -> Self {
        let tx = RequestManager::spawn(settings, handle);
        Self {
            tx,
            default_executor: handle.clone(),
        }
    }

    /// Submit a request; `handler` is invoked exactly once with the result,
    /// on the submitting runtime. The token groups requests for
    /// `cancel_requests`; an empty token only matches cancel-all.
    pub fn execute_request(
        &self,
        request: HttpRequest,
        cancellation_token: &str,
        handler: impl FnOnce(HttpResult) + Send + 'static,
    ) {
        let executor = Handle::try_current().unwrap_or_else(|_| self.default_executor.clone());
        let command = ManagerCommand::Execute {
            request: Arc::new(request),
            handler: Box::new(handler),
            executor,
            cancellation_token: cancellation_token.to_string(),
        };
        if self.tx.send(command).is_err() {
            log::error!("request submitted after client shutdown");
        }
    }

    /// Future form: submit and await the result.
    pub async fn execute(&self, request: HttpRequest, cancellation_token: &str) -> HttpResult {
        let (tx, rx) = oneshot::channel();
        self.execute_request(request, cancellation_token, move |result| {
            let _ = tx.send(result);
        });
        match rx.await {
            Ok(result) => result,
            // Manager gone before completion; treat as cancellation.
            Err(_) => HttpResult::from_error(ErrorKind::Cancelled),
        }
    }

    /// GET the URL with default settings.
    pub async fn get(&self, url: &str) -> Result<HttpResult, UrlError> {
        self.get_with(url, "", SslSettings::default()).await
    }

    /// GET with a cancellation token and TLS settings.
    pub async fn get_with(
        &self,
        url: &str,
        cancellation_token: &str,
        ssl: SslSettings,
    ) -> Result<HttpResult, UrlError> {
        let mut request = HttpRequest::new(Method::Get, Url::parse(url)?);
        request.ssl = ssl;
        Ok(self.execute(request, cancellation_token).await)
    }

    /// POST `body` with the given content type.
    pub async fn post(
        &self,
        url: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<HttpResult, UrlError> {
        self.post_with(url, body, content_type, "", SslSettings::default())
            .await
    }

    /// POST with a cancellation token and TLS settings.
    pub async fn post_with(
        &self,
        url: &str,
        body: Vec<u8>,
        content_type: &str,
        cancellation_token: &str,
        ssl: SslSettings,
    ) -> Result<HttpResult, UrlError> {
        let mut request = HttpRequest::new(Method::Post, Url::parse(url)?);
        request
            .headers
            .push(("Content-Type".to_string(), content_type.to_string()));
        request.body = body;
        request.ssl = ssl;
        Ok(self.execute(request, cancellation_token).await)
    }

    /// Cancel every request carrying `cancellation_token`; the empty token
    /// cancels all. Affected requests complete with `Cancelled`.
    pub fn cancel_requests(&self, cancellation_token: &str) {
        let _ = self
            .tx
            .send(ManagerCommand::Cancel(cancellation_token.to_string()));
    }

    /// Cancel everything and wait until every in-flight request has
    /// reached its terminal event.
    pub async fn shutdown(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(ManagerCommand::Shutdown(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }
}

impl Drop for HttpClient {
    fn drop(&mut self) {
        // Best effort: cancel in-flight work; awaiting is shutdown()'s job.
        let (ack_tx, _ack_rx) = oneshot::channel();
        let _ = self.tx.send(ManagerCommand::Shutdown(ack_tx));
    }
}
