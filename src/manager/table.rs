/*
 * table.rs
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

//! The manager's in-flight table, kept consistent across three indices:
//! dispatch order by `(state, admission seq)`, lookup by owning stack, and
//! lookup by cancellation token. All mutations go through this type so no
//! index can drift from the others.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;

use tokio::runtime::Handle;

use crate::completion::CompletionHandler;
use crate::request::HttpRequest;
use crate::stack::{CancelFlag, StackId};

pub(crate) type RequestId = u64;

/// Dispatch states. The derived order is the dispatch priority: retries
/// go before fresh requests, in-progress entries sort last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum RequestState {
    WaitingRetry = 0,
    Waiting = 1,
    InProgress = 2,
}

/// One admitted request and everything needed to finish it.
pub(crate) struct RequestEntry {
    pub id: RequestId,
    /// Admission counter; the creation-time tiebreak within a state.
    pub seq: u64,
    pub request: Arc<HttpRequest>,
    /// Taken on first (and only) completion dispatch.
    pub handler: Option<CompletionHandler>,
    /// Where the completion handler runs.
    pub executor: Handle,
    pub cancellation_token: String,
    pub state: RequestState,
    pub stack_id: Option<StackId>,
    /// Cancel signal of the in-flight stack, present iff `InProgress`.
    pub cancel: Option<Arc<CancelFlag>>,
    pub creation_time: Instant,
    pub retry_count: u32,
}

pub(crate) struct RequestTable {
    entries: HashMap<RequestId, RequestEntry>,
    state_index: BTreeSet<(RequestState, u64, RequestId)>,
    stack_index: HashMap<StackId, RequestId>,
    cancel_index: HashMap<String, BTreeSet<RequestId>>,
    in_progress: usize,
}

impl RequestTable {
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
            state_index: BTreeSet::new(),
            stack_index: HashMap::new(),
            cancel_index: HashMap::new(),
            in_progress: 0,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn in_progress_count(&self) -> usize {
        self.in_progress
    }

    pub(crate) fn get(&self, id: RequestId) -> Option<&RequestEntry> {
        self.entries.get(&id)
    }

    /// Insert a newly admitted entry. Must be `Waiting` with no stack.
    pub(crate) fn insert(&mut self, entry: RequestEntry) {
        debug_assert_eq!(entry.state, RequestState::Waiting);
        debug_assert!(entry.stack_id.is_none());
        self.state_index
            .insert((entry.state, entry.seq, entry.id));
        self.cancel_index
            .entry(entry.cancellation_token.clone())
            .or_default()
            .insert(entry.id);
        self.entries.insert(entry.id, entry);
    }

    /// The front of the dispatch order, when it is not already running.
    pub(crate) fn next_dispatchable(&self) -> Option<RequestId> {
        match self.state_index.iter().next() {
            Some((state, _, id)) if *state != RequestState::InProgress => Some(*id),
            _ => None,
        }
    }

    fn set_state(&mut self, id: RequestId, state: RequestState) {
        let Some(entry) = self.entries.get_mut(&id) else {
            log::error!("state change for unknown request {}", id);
            return;
        };
        self.state_index.remove(&(entry.state, entry.seq, entry.id));
        if entry.state == RequestState::InProgress {
            self.in_progress -= 1;
        }
        entry.state = state;
        if state == RequestState::InProgress {
            self.in_progress += 1;
        }
        self.state_index.insert((state, entry.seq, entry.id));
    }

    /// Transition to `InProgress` with its acquired stack and cancel
    /// signal; registers the stack index entry.
    pub(crate) fn mark_in_progress(
        &mut self,
        id: RequestId,
        stack_id: StackId,
        cancel: Arc<CancelFlag>,
    ) {
        self.set_state(id, RequestState::InProgress);
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.stack_id = Some(stack_id);
            entry.cancel = Some(cancel);
            self.stack_index.insert(stack_id, id);
        }
    }

    /// Back to `WaitingRetry` for another attempt; the stack reference is
    /// cleared and the retry counted. A redirect installs its rewritten
    /// request here.
    pub(crate) fn requeue_for_retry(
        &mut self,
        id: RequestId,
        new_request: Option<Arc<HttpRequest>>,
    ) {
        self.set_state(id, RequestState::WaitingRetry);
        if let Some(entry) = self.entries.get_mut(&id) {
            if let Some(stack_id) = entry.stack_id.take() {
                self.stack_index.remove(&stack_id);
            }
            entry.cancel = None;
            entry.retry_count += 1;
            if let Some(request) = new_request {
                entry.request = request;
            }
        }
    }

    /// Remove the entry from every index and hand it back.
    pub(crate) fn remove(&mut self, id: RequestId) -> Option<RequestEntry> {
        let entry = self.entries.remove(&id)?;
        self.state_index.remove(&(entry.state, entry.seq, entry.id));
        if entry.state == RequestState::InProgress {
            self.in_progress -= 1;
        }
        if let Some(stack_id) = entry.stack_id {
            self.stack_index.remove(&stack_id);
        }
        if let Some(ids) = self.cancel_index.get_mut(&entry.cancellation_token) {
            ids.remove(&entry.id);
            if ids.is_empty() {
                self.cancel_index.remove(&entry.cancellation_token);
            }
        }
        Some(entry)
    }

    pub(crate) fn request_for_stack(&self, stack_id: StackId) -> Option<RequestId> {
        self.stack_index.get(&stack_id).copied()
    }

    /// Entries matching a cancellation token; the empty token matches all.
    pub(crate) fn ids_for_token(&self, token: &str) -> Vec<RequestId> {
        if token.is_empty() {
            let mut ids: Vec<RequestId> = self.entries.keys().copied().collect();
            ids.sort_unstable();
            ids
        } else {
            self.cancel_index
                .get(token)
                .map(|ids| ids.iter().copied().collect())
                .unwrap_or_default()
        }
    }
}
