/*
 * completion.rs
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

//! Completion dispatch: the user's handler runs on the runtime handle
//! captured at admission, never on the manager task.

use tokio::runtime::Handle;

use crate::result::HttpResult;

/// The user's completion callback. Invoked exactly once per request.
pub(crate) type CompletionHandler = Box<dyn FnOnce(HttpResult) + Send + 'static>;

/// Post the handler with its result onto the entry's executor.
pub(crate) fn dispatch(executor: &Handle, handler: CompletionHandler, result: HttpResult) {
    executor.spawn(async move {
        handler(result);
    });
}
