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
//! Per-row evaluation warnings.
//!
//! A warning never aborts a batch: the offending position becomes null and the
//! message is collected next to the results. Each evaluator owns a [`Warnings`]
//! recorder that applies the configured [`WarningLimit`] before forwarding to the
//! query-wide [`WarningSink`].

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const SINGLE_VALUE_VIOLATION: &str = "single-value function encountered multi-value";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvaluationWarning {
    /// Source text of the expression that failed.
    pub source: String,
    /// Position inside the page that was nulled.
    pub position: usize,
    pub message: String,
}

impl fmt::Display for EvaluationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "evaluation of [{}] failed at position {}, treating result as null: {}",
            self.source, self.position, self.message
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WarningLimit {
    Unlimited,
    PerEvaluator(usize),
}

impl WarningLimit {
    /// `0` means unlimited, matching `exec.max_warnings_per_evaluator`.
    pub fn from_config(max: usize) -> Self {
        if max == 0 {
            WarningLimit::Unlimited
        } else {
            WarningLimit::PerEvaluator(max)
        }
    }

    fn allows(&self, recorded: usize) -> bool {
        match self {
            WarningLimit::Unlimited => true,
            WarningLimit::PerEvaluator(max) => recorded < *max,
        }
    }
}

/// Query-level warning collection shared by every evaluator of one driver.
#[derive(Debug, Default)]
pub struct WarningSink {
    warnings: Mutex<Vec<EvaluationWarning>>,
    suppressed: AtomicUsize,
}

impl WarningSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, warning: EvaluationWarning) {
        self.warnings
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(warning);
    }

    fn suppress(&self) {
        self.suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn warnings(&self) -> Vec<EvaluationWarning> {
        self.warnings
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.warnings.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Warnings dropped because an evaluator hit its limit.
    pub fn suppressed(&self) -> usize {
        self.suppressed.load(Ordering::Relaxed)
    }
}

/// Warning recorder owned by a single evaluator.
#[derive(Debug)]
pub struct Warnings {
    source: String,
    limit: WarningLimit,
    recorded: usize,
    sink: Arc<WarningSink>,
}

impl Warnings {
    pub fn new(source: impl Into<String>, limit: WarningLimit, sink: Arc<WarningSink>) -> Self {
        Self {
            source: source.into(),
            limit,
            recorded: 0,
            sink,
        }
    }

    pub fn register(&mut self, position: usize, message: impl fmt::Display) {
        if !self.limit.allows(self.recorded) {
            self.sink.suppress();
            return;
        }
        self.recorded += 1;
        self.sink.push(EvaluationWarning {
            source: self.source.clone(),
            position,
            message: message.to_string(),
        });
    }

    pub fn register_multi_value(&mut self, position: usize) {
        self.register(position, SINGLE_VALUE_VIOLATION);
    }

    pub fn recorded(&self) -> usize {
        self.recorded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_caps_recorded_warnings_and_counts_the_rest() {
        let sink = WarningSink::new();
        let mut warnings = Warnings::new("abs(x)", WarningLimit::PerEvaluator(2), Arc::clone(&sink));
        for pos in 0..5 {
            warnings.register_multi_value(pos);
        }
        assert_eq!(warnings.recorded(), 2);
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.suppressed(), 3);
        assert_eq!(sink.warnings()[1].position, 1);
    }

    #[test]
    fn unlimited_keeps_one_warning_per_position() {
        let sink = WarningSink::new();
        let mut warnings = Warnings::new("x / y", WarningLimit::from_config(0), Arc::clone(&sink));
        for pos in 0..50 {
            warnings.register(pos, "division by zero");
        }
        assert_eq!(sink.len(), 50);
        assert_eq!(sink.suppressed(), 0);
        assert!(sink.warnings()[0].to_string().contains("[x / y]"));
    }
}
