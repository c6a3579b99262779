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

//! Request manager: one task owning the in-flight table and the pool.
//! Admission, dispatch, retry, redirect, cancellation and completion all
//! run here, serialized over a command channel; stack drivers are spawned
//! tasks that report back over the same channel.

pub(crate) mod policy;
pub(crate) mod table;

use std::sync::Arc;
use std::time::Instant;

use log::{debug, error};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};

use crate::client::HttpClientSettings;
use crate::completion::{self, CompletionHandler};
use crate::error::ErrorKind;
use crate::pool::ConnectionPool;
use crate::request::HttpRequest;
use crate::result::{HttpResult, RequestStats};
use crate::stack::content::ExchangeOutcome;
use crate::stack::HttpStack;
use self::policy::{classify, Disposition};
use self::table::{RequestEntry, RequestId, RequestState, RequestTable};

/// Commands processed by the manager task.
pub(crate) enum ManagerCommand {
    Execute {
        request: Arc<HttpRequest>,
        handler: CompletionHandler,
        executor: Handle,
        cancellation_token: String,
    },
    Cancel(String),
    Completed {
        stack: HttpStack,
        outcome: ExchangeOutcome,
    },
    Shutdown(oneshot::Sender<()>),
}

pub(crate) struct RequestManager {
    settings: HttpClientSettings,
    rx: mpsc::UnboundedReceiver<ManagerCommand>,
    /// Cloned into stack drivers for their completion reports.
    tx: mpsc::UnboundedSender<ManagerCommand>,
    table: RequestTable,
    pool: ConnectionPool,
    next_request_id: RequestId,
    next_seq: u64,
    shutting_down: bool,
    shutdown_acks: Vec<oneshot::Sender<()>>,
}

impl RequestManager {
    /// Spawn the manager task on `handle`; the returned sender is the
    /// client's half of the command channel.
    pub(crate) fn spawn(
        settings: HttpClientSettings,
        handle: &Handle,
    ) -> mpsc::UnboundedSender<ManagerCommand> {
        let (tx, rx) = mpsc::unbounded_channel();
        let manager = Self {
            settings,
            rx,
            tx: tx.clone(),
            table: RequestTable::new(),
            pool: ConnectionPool::new(),
            next_request_id: 1,
            next_seq: 1,
            shutting_down: false,
            shutdown_acks: Vec::new(),
        };
        handle.spawn(manager.run());
        tx
    }

    async fn run(mut self) {
        while let Some(command) = self.rx.recv().await {
            match command {
                ManagerCommand::Execute {
                    request,
                    handler,
                    executor,
                    cancellation_token,
                } => self.execute_request(request, handler, executor, cancellation_token),
                ManagerCommand::Cancel(token) => self.cancel_requests(&token),
                ManagerCommand::Completed { stack, outcome } => {
                    self.on_request_completed(stack, outcome)
                }
                ManagerCommand::Shutdown(ack) => {
                    self.shutting_down = true;
                    self.shutdown_acks.push(ack);
                    self.cancel_requests("");
                }
            }
            if self.shutting_down && self.table.is_empty() {
                break;
            }
        }
        for ack in self.shutdown_acks.drain(..) {
            let _ = ack.send(());
        }
    }

    fn execute_request(
        &mut self,
        request: Arc<HttpRequest>,
        handler: CompletionHandler,
        executor: Handle,
        cancellation_token: String,
    ) {
        if self.shutting_down {
            completion::dispatch(&executor, handler, HttpResult::from_error(ErrorKind::Cancelled));
            return;
        }
        let id = self.next_request_id;
        self.next_request_id += 1;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.table.insert(RequestEntry {
            id,
            seq,
            request,
            handler: Some(handler),
            executor,
            cancellation_token,
            state: RequestState::Waiting,
            stack_id: None,
            cancel: None,
            creation_time: Instant::now(),
            retry_count: 0,
        });
        debug!("new request added ({} in flight)", self.table.len());
        self.execute_waiting();
    }

    /// Cancel entries matching the token (empty token: every entry).
    /// In-progress entries get their stack's cancel signal and complete
    /// asynchronously with `Cancelled`; waiting entries complete here.
    fn cancel_requests(&mut self, token: &str) {
        for id in self.table.ids_for_token(token) {
            let Some(entry) = self.table.get(id) else { continue };
            match entry.cancel.clone() {
                Some(flag) => flag.cancel(),
                None => self.finalize(
                    id,
                    ExchangeOutcome::failed(ErrorKind::Cancelled, Default::default()),
                ),
            }
        }
        self.execute_waiting();
    }

    /// A stack driver finished. Release the stack, then retry, redirect,
    /// or finalize its entry.
    fn on_request_completed(&mut self, stack: HttpStack, outcome: ExchangeOutcome) {
        let stack_id = stack.id();
        let reusable = outcome.error.is_none() && !stack.not_reusable();
        self.pool.release(stack, reusable);

        let Some(id) = self.table.request_for_stack(stack_id) else {
            error!("completion for unknown stack {}, dropping", stack_id);
            self.execute_waiting();
            return;
        };
        let Some(entry) = self.table.get(id) else {
            self.execute_waiting();
            return;
        };

        // A cancellation that raced a queued completion must still win:
        // re-queueing a cancelled entry would revive it.
        let was_cancelled = entry
            .cancel
            .as_ref()
            .map(|flag| flag.is_cancelled())
            .unwrap_or(false);
        if was_cancelled {
            let mut outcome = outcome;
            if outcome.error.is_some() {
                outcome.error = Some(ErrorKind::Cancelled);
            }
            self.finalize(id, outcome);
            self.execute_waiting();
            return;
        }

        let disposition = if self.shutting_down {
            Disposition::Terminal
        } else {
            classify(&outcome, &entry.request)
        };
        let retries_left = entry.retry_count < self.settings.max_attempts;

        match disposition {
            Disposition::Retry if retries_left => {
                debug!("transient fault, retry {} of {}", entry.retry_count + 1, self.settings.max_attempts);
                self.table.requeue_for_retry(id, None);
            }
            Disposition::Redirect(new_request) if retries_left => {
                debug!("redirected to {}", new_request.url);
                self.table.requeue_for_retry(id, Some(Arc::new(new_request)));
            }
            Disposition::Retry | Disposition::Redirect(_) => {
                let mut outcome = outcome;
                outcome.error = Some(ErrorKind::TooManyRetries);
                self.finalize(id, outcome);
            }
            Disposition::Terminal => self.finalize(id, outcome),
        }
        self.execute_waiting();
    }

    /// Dispatch from the front of the state ordering while capacity lasts.
    fn execute_waiting(&mut self) {
        if self.shutting_down {
            return;
        }
        while self.table.in_progress_count() < self.settings.max_parallel_requests as usize {
            let Some(id) = self.table.next_dispatchable() else { break };
            let Some(entry) = self.table.get(id) else { break };
            let request = entry.request.clone();
            let mut stack = self.pool.acquire(&request.url);
            let cancel = stack.arm_cancel();
            self.table.mark_in_progress(id, stack.id(), cancel);

            let tx = self.tx.clone();
            tokio::spawn(async move {
                let (outcome, stack) = stack.run(request).await;
                let _ = tx.send(ManagerCommand::Completed { stack, outcome });
            });
        }
    }

    /// Terminal completion: remove the entry, assemble the result and
    /// post the user's handler onto its executor.
    fn finalize(&mut self, id: RequestId, outcome: ExchangeOutcome) {
        let Some(mut entry) = self.table.remove(id) else {
            error!("finalize for unknown request {}, dropping", id);
            return;
        };
        let result = make_result(&entry, outcome);
        debug!(
            "request to {} completed: {}",
            entry.request.url,
            match &result.error {
                Some(e) => e.to_string(),
                None => format!("status {}", result.status_code),
            }
        );
        debug!(
            "  {} bytes down, {} bytes up, lookup {:?}, total {:?}, {} B/s down, {} B/s up",
            result.stats.downloaded_bytes,
            result.stats.uploaded_bytes,
            result.stats.name_lookup_time,
            result.stats.total_time,
            result.stats.avg_download_speed_bps,
            result.stats.avg_upload_speed_bps,
        );
        match entry.handler.take() {
            Some(handler) => completion::dispatch(&entry.executor, handler, result),
            None => error!("request {} completed twice, dropping", id),
        }
    }
}

/// Fold the exchange outcome and entry timing into the final result.
fn make_result(entry: &RequestEntry, outcome: ExchangeOutcome) -> HttpResult {
    let total_time = entry.creation_time.elapsed();
    let secs = total_time.as_secs_f64();
    let speed = |bytes: u64| {
        if secs > 0.0 {
            (bytes as f64 / secs) as u64
        } else {
            0
        }
    };
    HttpResult {
        status_code: outcome.status,
        headers: outcome.headers,
        body: outcome.body,
        error: outcome.error,
        stats: RequestStats {
            total_time,
            name_lookup_time: outcome.stats.name_lookup_time,
            uploaded_bytes: outcome.stats.uploaded_bytes,
            downloaded_bytes: outcome.stats.downloaded_bytes,
            avg_upload_speed_bps: speed(outcome.stats.uploaded_bytes),
            avg_download_speed_bps: speed(outcome.stats.downloaded_bytes),
        },
    }
}
