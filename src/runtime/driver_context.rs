// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
//! Per-driver execution context handed to every evaluator and operator factory.
//!
//! It carries the collaborators the execution core depends on but does not own:
//! memory accounting, the cooperative cancellation signal and the warning sink.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::common::config;
use crate::common::error::{ExecError, ExecResult};
use crate::exec::big_array::BigArrays;
use crate::novacompute_logging::warn;
use crate::runtime::mem_tracker::{self, MemTracker};
use crate::runtime::warnings::{WarningLimit, WarningSink, Warnings};

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    reason: Mutex<Option<String>>,
}

/// Cooperative cancellation flag, checked by drivers and operators between batches.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    state: Arc<CancelState>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// First reason wins; later calls keep the flag set.
    pub fn cancel(&self, reason: impl Into<String>) {
        let mut guard = self.state.reason.lock().unwrap_or_else(|e| e.into_inner());
        if guard.is_none() {
            *guard = Some(reason.into());
        }
        self.state.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::Acquire)
    }

    pub fn reason(&self) -> Option<String> {
        self.state
            .reason
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[derive(Clone, Debug)]
pub struct DriverContext {
    mem_tracker: Arc<MemTracker>,
    cancellation: CancellationToken,
    warnings: Arc<WarningSink>,
    warning_limit: WarningLimit,
    max_page_size: usize,
    big_array_initial_capacity: usize,
}

impl DriverContext {
    /// Context for one query, limits and sizes taken from the loaded config.
    pub fn new(label: impl Into<String>) -> Self {
        let process = mem_tracker::process_mem_tracker();
        let tracker =
            MemTracker::new_child_with_limit(label, &process, config::exec_query_mem_limit_bytes());
        Self::with_mem_tracker(tracker)
    }

    pub fn with_mem_tracker(mem_tracker: Arc<MemTracker>) -> Self {
        Self {
            mem_tracker,
            cancellation: CancellationToken::new(),
            warnings: WarningSink::new(),
            warning_limit: WarningLimit::from_config(config::exec_max_warnings_per_evaluator()),
            max_page_size: config::exec_max_page_size(),
            big_array_initial_capacity: config::exec_big_array_initial_capacity(),
        }
    }

    pub fn with_max_page_size(mut self, max_page_size: usize) -> Self {
        self.max_page_size = max_page_size.max(1);
        self
    }

    pub fn with_warning_limit(mut self, limit: WarningLimit) -> Self {
        self.warning_limit = limit;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn mem_tracker(&self) -> &Arc<MemTracker> {
        &self.mem_tracker
    }

    pub fn child_tracker(&self, label: impl Into<String>) -> Arc<MemTracker> {
        MemTracker::new_child(label, &self.mem_tracker)
    }

    /// Array allocator whose accounting is a child of this context's tracker.
    pub fn big_arrays(&self, label: impl Into<String>) -> BigArrays {
        BigArrays::new(self.child_tracker(label), self.big_array_initial_capacity)
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn check_cancelled(&self) -> ExecResult<()> {
        if !self.cancellation.is_cancelled() {
            return Ok(());
        }
        let reason = self
            .cancellation
            .reason()
            .unwrap_or_else(|| "cancelled".to_string());
        warn!(target: "novacompute::runtime", reason = %reason, "driver observed cancellation");
        Err(ExecError::Cancelled(reason))
    }

    pub fn warning_sink(&self) -> &Arc<WarningSink> {
        &self.warnings
    }

    pub fn warnings_for(&self, source: impl Into<String>) -> Warnings {
        Warnings::new(source, self.warning_limit, Arc::clone(&self.warnings))
    }

    pub fn max_page_size(&self) -> usize {
        self.max_page_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_reports_first_reason() {
        let ctx = DriverContext::with_mem_tracker(MemTracker::new_root("q"));
        assert!(ctx.check_cancelled().is_ok());
        ctx.cancellation().cancel("timeout");
        ctx.cancellation().cancel("user");
        assert_eq!(
            ctx.check_cancelled(),
            Err(ExecError::Cancelled("timeout".to_string()))
        );
    }

    #[test]
    fn clones_share_warnings_and_cancellation() {
        let ctx = DriverContext::with_mem_tracker(MemTracker::new_root("q"));
        let other = ctx.clone();
        let mut w = other.warnings_for("f(x)");
        w.register(3, "boom");
        assert_eq!(ctx.warning_sink().len(), 1);
        other.cancellation().cancel("stop");
        assert!(ctx.cancellation().is_cancelled());
    }
}
