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
use std::fmt;

use crate::common::error::{ExecError, ExecResult};

/// Stage of a possibly distributed aggregation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AggregatorMode {
    /// Raw input to final value in one pass.
    Single,
    /// Raw input to partial state.
    Initial,
    /// Partial states merged into one partial state.
    Intermediate,
    /// Partial state to final value.
    Final,
}

impl AggregatorMode {
    pub fn is_input_partial(&self) -> bool {
        matches!(self, AggregatorMode::Intermediate | AggregatorMode::Final)
    }

    pub fn is_output_partial(&self) -> bool {
        matches!(self, AggregatorMode::Initial | AggregatorMode::Intermediate)
    }

    pub fn name(&self) -> &'static str {
        match self {
            AggregatorMode::Single => "SINGLE",
            AggregatorMode::Initial => "INITIAL",
            AggregatorMode::Intermediate => "INTERMEDIATE",
            AggregatorMode::Final => "FINAL",
        }
    }

    /// Accepts `[SINGLE]`, `[INITIAL, FINAL]` and, for associative functions only,
    /// `[INITIAL, INTERMEDIATE+, FINAL]`.
    pub fn validate_sequence(
        function: &str,
        modes: &[AggregatorMode],
        associative: bool,
    ) -> ExecResult<()> {
        use AggregatorMode::*;
        let valid = match modes {
            [Single] | [Initial, Final] => true,
            [Initial, middle @ .., Final] => {
                !middle.is_empty() && middle.iter().all(|m| *m == Intermediate) && associative
            }
            _ => false,
        };
        if valid {
            return Ok(());
        }
        let sequence = modes.iter().map(|m| m.name()).collect::<Vec<_>>().join(" -> ");
        let detail = if !associative && modes.contains(&Intermediate) {
            format!("[{sequence}] merges partial states of a non-associative function")
        } else {
            format!("[{sequence}] is not a valid mode sequence")
        };
        Err(ExecError::illegal_mode(function, detail))
    }
}

impl fmt::Display for AggregatorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::AggregatorMode::*;
    use super::*;

    #[test]
    fn partial_flags() {
        assert!(!Single.is_input_partial() && !Single.is_output_partial());
        assert!(!Initial.is_input_partial() && Initial.is_output_partial());
        assert!(Intermediate.is_input_partial() && Intermediate.is_output_partial());
        assert!(Final.is_input_partial() && !Final.is_output_partial());
    }

    #[test]
    fn sequences() {
        assert!(AggregatorMode::validate_sequence("sum", &[Single], true).is_ok());
        assert!(AggregatorMode::validate_sequence("sum", &[Initial, Final], true).is_ok());
        assert!(
            AggregatorMode::validate_sequence("sum", &[Initial, Intermediate, Intermediate, Final], true)
                .is_ok()
        );
        assert!(AggregatorMode::validate_sequence("rate", &[Initial, Final], false).is_ok());
        let err = AggregatorMode::validate_sequence("rate", &[Initial, Intermediate, Final], false)
            .expect_err("non-associative");
        assert!(matches!(err, ExecError::IllegalAggregatorMode { .. }));
        assert!(AggregatorMode::validate_sequence("sum", &[Final, Initial], true).is_err());
        assert!(AggregatorMode::validate_sequence("sum", &[Initial], true).is_err());
        assert!(AggregatorMode::validate_sequence("sum", &[], true).is_err());
    }
}
