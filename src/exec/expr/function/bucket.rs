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
//! `bucket(timestamp, interval)`: start of the fixed-width time bucket that
//! contains the timestamp. Both arguments are epoch milliseconds.

use std::sync::Arc;

use super::super::kernel::{BinaryEvaluatorFactory, BinaryKernel, KernelResult, LongLane, LongOut};
use super::super::EvaluatorFactory;
use super::Registry;
use crate::common::error::{ExecError, ExecResult};
use crate::exec::block::ElementType;

/// Floors toward negative infinity so pre-epoch timestamps land in the right bucket.
pub fn bucket_start(timestamp: i64, interval: i64) -> Option<i64> {
    if interval <= 0 {
        return None;
    }
    timestamp
        .checked_div_euclid(interval)?
        .checked_mul(interval)
}

#[derive(Debug)]
pub(crate) struct Bucket;

impl BinaryKernel for Bucket {
    type Lhs = LongLane;
    type Rhs = LongLane;
    type Out = LongOut;
    const INFALLIBLE: bool = false;

    fn apply(timestamp: i64, interval: i64) -> KernelResult<i64> {
        bucket_start(timestamp, interval).ok_or("bucket interval must be positive")
    }
}

fn bucket(
    args: Vec<Arc<dyn EvaluatorFactory>>,
    source: String,
) -> ExecResult<Arc<dyn EvaluatorFactory>> {
    let mut args = args.into_iter();
    match (args.next(), args.next(), args.next()) {
        (Some(ts), Some(interval), None) => Ok(Arc::new(
            BinaryEvaluatorFactory::<Bucket>::new(ts, interval, source),
        )),
        _ => Err(ExecError::invalid_input("bucket expects two arguments")),
    }
}

pub(super) fn register(registry: &mut Registry) {
    registry.register(
        "bucket",
        &[ElementType::Long, ElementType::Long],
        ElementType::Long,
        bucket,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floors_toward_negative_infinity() {
        assert_eq!(bucket_start(12_345, 1_000), Some(12_000));
        assert_eq!(bucket_start(-1, 1_000), Some(-1_000));
        assert_eq!(bucket_start(5, 0), None);
    }
}
