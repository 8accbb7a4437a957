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
use super::super::kernel::{
    DoubleLane, DoubleOut, IntLane, IntOut, KernelResult, LongLane, LongOut, UnaryKernel,
};
use super::{Registry, unary};
use crate::exec::block::ElementType;

#[derive(Debug)]
pub(crate) struct AbsInt;

impl UnaryKernel for AbsInt {
    type In = IntLane;
    type Out = IntOut;
    const INFALLIBLE: bool = false;

    fn apply(value: i32) -> KernelResult<i32> {
        value.checked_abs().ok_or("arithmetic overflow")
    }
}

#[derive(Debug)]
pub(crate) struct AbsLong;

impl UnaryKernel for AbsLong {
    type In = LongLane;
    type Out = LongOut;
    const INFALLIBLE: bool = false;

    fn apply(value: i64) -> KernelResult<i64> {
        value.checked_abs().ok_or("arithmetic overflow")
    }
}

#[derive(Debug)]
pub(crate) struct AbsDouble;

impl UnaryKernel for AbsDouble {
    type In = DoubleLane;
    type Out = DoubleOut;
    const INFALLIBLE: bool = true;

    fn apply(value: f64) -> KernelResult<f64> {
        Ok(value.abs())
    }
}

pub(super) fn register(registry: &mut Registry) {
    registry.register("abs", &[ElementType::Int], ElementType::Int, unary::<AbsInt>);
    registry.register("abs", &[ElementType::Long], ElementType::Long, unary::<AbsLong>);
    registry.register(
        "abs",
        &[ElementType::Double],
        ElementType::Double,
        unary::<AbsDouble>,
    );
}
