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
//! Execution error taxonomy.
//!
//! Verification failures live in `analysis::verifier` and never reach execution;
//! per-row problems are recorded as warnings by `runtime::warnings` instead.

use arrow::error::ArrowError;
use thiserror::Error;

pub type ExecResult<T> = Result<T, ExecError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecError {
    /// Fatal for the query. Operators release their state before this propagates.
    #[error("resource exhausted: [{label}] would use {requested} bytes, limit is {limit} bytes")]
    ResourceExhausted {
        label: String,
        requested: i64,
        limit: i64,
    },

    /// A planner or catalog defect, never caused by user input.
    #[error("illegal aggregator mode for [{function}]: {detail}")]
    IllegalAggregatorMode { function: String, detail: String },

    #[error("query cancelled: {0}")]
    Cancelled(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Internal(String),
}

impl ExecError {
    pub fn illegal_mode(function: impl Into<String>, detail: impl Into<String>) -> Self {
        ExecError::IllegalAggregatorMode {
            function: function.into(),
            detail: detail.into(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        ExecError::InvalidInput(msg.into())
    }

    /// Whether the failure must abort the whole query rather than just this call.
    pub fn is_fatal_for_query(&self) -> bool {
        matches!(
            self,
            ExecError::ResourceExhausted { .. }
                | ExecError::IllegalAggregatorMode { .. }
                | ExecError::Cancelled(_)
        )
    }
}

impl From<String> for ExecError {
    fn from(value: String) -> Self {
        ExecError::Internal(value)
    }
}

impl From<&str> for ExecError {
    fn from(value: &str) -> Self {
        ExecError::Internal(value.to_string())
    }
}

impl From<ArrowError> for ExecError {
    fn from(value: ArrowError) -> Self {
        ExecError::Internal(format!("arrow error: {value}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_classification() {
        assert!(ExecError::Cancelled("user".into()).is_fatal_for_query());
        assert!(ExecError::illegal_mode("rate", "intermediate").is_fatal_for_query());
        assert!(!ExecError::from("bad channel").is_fatal_for_query());
    }

    #[test]
    fn messages_name_the_function() {
        let err = ExecError::illegal_mode("rate", "INTERMEDIATE is not supported");
        assert_eq!(
            err.to_string(),
            "illegal aggregator mode for [rate]: INTERMEDIATE is not supported"
        );
    }
}
