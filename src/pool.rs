/*
 * pool.rs
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

//! Connection pool: idle stacks per `(host, port)`, last-in first-out so
//! the hottest socket is reused first. A stack released after a fault is
//! discarded together with every idle stack for the same endpoint.

use std::collections::HashMap;

use log::debug;

use crate::stack::{HttpStack, StackId};
use crate::url::Url;

/// Idle stacks kept per host:port. Releases beyond the cap are dropped.
const MAX_IDLE_PER_HOST: usize = 8;

/// Per-endpoint LIFO of idle stacks. A stack is in the pool or in flight,
/// never both; acquisition moves it out, release moves it back in.
pub(crate) struct ConnectionPool {
    idle: HashMap<(String, u16), Vec<HttpStack>>,
    next_stack_id: StackId,
    allocations: u64,
}

impl ConnectionPool {
    pub(crate) fn new() -> Self {
        Self {
            idle: HashMap::new(),
            next_stack_id: 1,
            allocations: 0,
        }
    }

    /// Idle stack for the URL's endpoint, or a fresh one (TLS iff https).
    pub(crate) fn acquire(&mut self, url: &Url) -> HttpStack {
        let key = (url.host.clone(), url.port);
        if let Some(stack) = self.idle.get_mut(&key).and_then(Vec::pop) {
            return stack;
        }
        self.allocations += 1;
        let id = self.next_stack_id;
        self.next_stack_id += 1;
        HttpStack::new(id, url.host.clone(), url.port, url.is_secure())
    }

    /// Return a stack after its request. A non-reusable or closed stack is
    /// discarded, and the endpoint's other idle stacks are purged with it:
    /// after a transport fault they are all suspect.
    pub(crate) fn release(&mut self, stack: HttpStack, reusable: bool) {
        let key = stack.host_port();
        if !reusable || !stack.is_open() {
            if self.idle.remove(&key).is_some() {
                debug!("purged idle connections for {}:{}", key.0, key.1);
            }
            return;
        }
        let idle = self.idle.entry(key).or_default();
        if idle.len() < MAX_IDLE_PER_HOST {
            idle.push(stack);
        }
    }

    /// Number of idle stacks for an endpoint (tests and diagnostics).
    #[allow(dead_code)]
    pub(crate) fn idle_count(&self, host: &str, port: u16) -> usize {
        self.idle
            .get(&(host.to_string(), port))
            .map_or(0, Vec::len)
    }
}

impl Drop for ConnectionPool {
    fn drop(&mut self) {
        debug!("destroyed connection pool after {} allocations", self.allocations);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(port: u16) -> Url {
        Url::parse(&format!("http://example.com:{}/", port)).unwrap()
    }

    #[test]
    fn create_on_miss_assigns_fresh_ids() {
        let mut pool = ConnectionPool::new();
        let a = pool.acquire(&url(80));
        let b = pool.acquire(&url(80));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn closed_stack_is_not_pooled() {
        let mut pool = ConnectionPool::new();
        let stack = pool.acquire(&url(80));
        // Never connected, so not open: release must drop it.
        pool.release(stack, true);
        assert_eq!(pool.idle_count("example.com", 80), 0);
    }

    #[test]
    fn discard_purges_endpoint() {
        let mut pool = ConnectionPool::new();
        let a = pool.acquire(&url(80));
        let b = pool.acquire(&url(80));
        // Force both into the idle list regardless of socket state by
        // exercising the purge path only: a faulted release wipes the
        // endpoint even when the list is empty.
        pool.release(a, false);
        assert_eq!(pool.idle_count("example.com", 80), 0);
        pool.release(b, false);
        assert_eq!(pool.idle_count("example.com", 80), 0);
    }
}
