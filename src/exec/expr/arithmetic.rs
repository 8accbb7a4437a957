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
//! Arithmetic kernels, one per (operator, element type).

use std::sync::Arc;

use super::kernel::{
    BinaryEvaluatorFactory, BinaryKernel, DoubleLane, DoubleOut, IntLane, IntOut, KernelResult,
    Lane, LongLane, LongOut, OutLane,
};
use super::{ArithmeticOp, EvaluatorFactory};
use crate::common::error::{ExecError, ExecResult};
use crate::exec::block::ElementType;

const OVERFLOW: &str = "arithmetic overflow";
const DIVIDE_BY_ZERO: &str = "/ by zero";

macro_rules! arithmetic_kernel {
    ($kernel:ident, $lane:ty, $out:ty, $infallible:expr, |$a:ident, $b:ident| $body:expr) => {
        #[derive(Debug)]
        pub(crate) struct $kernel;

        impl BinaryKernel for $kernel {
            type Lhs = $lane;
            type Rhs = $lane;
            type Out = $out;
            const INFALLIBLE: bool = $infallible;

            fn apply(
                $a: <$lane as Lane>::Value<'_>,
                $b: <$lane as Lane>::Value<'_>,
            ) -> KernelResult<<$out as OutLane>::Native> {
                $body
            }
        }
    };
}

macro_rules! integral_kernels {
    ($lane:ty, $out:ty, $add:ident, $sub:ident, $mul:ident, $div:ident, $rem:ident) => {
        arithmetic_kernel!($add, $lane, $out, false, |a, b| a.checked_add(b).ok_or(OVERFLOW));
        arithmetic_kernel!($sub, $lane, $out, false, |a, b| a.checked_sub(b).ok_or(OVERFLOW));
        arithmetic_kernel!($mul, $lane, $out, false, |a, b| a.checked_mul(b).ok_or(OVERFLOW));
        arithmetic_kernel!($div, $lane, $out, false, |a, b| {
            if b == 0 {
                return Err(DIVIDE_BY_ZERO);
            }
            a.checked_div(b).ok_or(OVERFLOW)
        });
        arithmetic_kernel!($rem, $lane, $out, false, |a, b| {
            if b == 0 {
                return Err(DIVIDE_BY_ZERO);
            }
            a.checked_rem(b).ok_or(OVERFLOW)
        });
    };
}

integral_kernels!(IntLane, IntOut, AddInts, SubInts, MulInts, DivInts, ModInts);
integral_kernels!(LongLane, LongOut, AddLongs, SubLongs, MulLongs, DivLongs, ModLongs);

arithmetic_kernel!(AddDoubles, DoubleLane, DoubleOut, true, |a, b| Ok(a + b));
arithmetic_kernel!(SubDoubles, DoubleLane, DoubleOut, true, |a, b| Ok(a - b));
arithmetic_kernel!(MulDoubles, DoubleLane, DoubleOut, true, |a, b| Ok(a * b));
arithmetic_kernel!(DivDoubles, DoubleLane, DoubleOut, false, |a, b| {
    if b == 0.0 {
        return Err(DIVIDE_BY_ZERO);
    }
    Ok(a / b)
});
arithmetic_kernel!(ModDoubles, DoubleLane, DoubleOut, false, |a, b| {
    if b == 0.0 {
        return Err(DIVIDE_BY_ZERO);
    }
    Ok(a % b)
});

fn kernel<K: BinaryKernel>(
    lhs: Arc<dyn EvaluatorFactory>,
    rhs: Arc<dyn EvaluatorFactory>,
    source: String,
) -> Arc<dyn EvaluatorFactory> {
    Arc::new(BinaryEvaluatorFactory::<K>::new(lhs, rhs, source))
}

/// Both operands must already be widened to `element_type`.
pub(crate) fn arithmetic_factory(
    op: ArithmeticOp,
    element_type: ElementType,
    lhs: Arc<dyn EvaluatorFactory>,
    rhs: Arc<dyn EvaluatorFactory>,
    source: String,
) -> ExecResult<Arc<dyn EvaluatorFactory>> {
    use ArithmeticOp::*;
    let factory = match (op, element_type) {
        (Add, ElementType::Int) => kernel::<AddInts>(lhs, rhs, source),
        (Sub, ElementType::Int) => kernel::<SubInts>(lhs, rhs, source),
        (Mul, ElementType::Int) => kernel::<MulInts>(lhs, rhs, source),
        (Div, ElementType::Int) => kernel::<DivInts>(lhs, rhs, source),
        (Mod, ElementType::Int) => kernel::<ModInts>(lhs, rhs, source),
        (Add, ElementType::Long) => kernel::<AddLongs>(lhs, rhs, source),
        (Sub, ElementType::Long) => kernel::<SubLongs>(lhs, rhs, source),
        (Mul, ElementType::Long) => kernel::<MulLongs>(lhs, rhs, source),
        (Div, ElementType::Long) => kernel::<DivLongs>(lhs, rhs, source),
        (Mod, ElementType::Long) => kernel::<ModLongs>(lhs, rhs, source),
        (Add, ElementType::Double) => kernel::<AddDoubles>(lhs, rhs, source),
        (Sub, ElementType::Double) => kernel::<SubDoubles>(lhs, rhs, source),
        (Mul, ElementType::Double) => kernel::<MulDoubles>(lhs, rhs, source),
        (Div, ElementType::Double) => kernel::<DivDoubles>(lhs, rhs, source),
        (Mod, ElementType::Double) => kernel::<ModDoubles>(lhs, rhs, source),
        (op, other) => {
            return Err(ExecError::invalid_input(format!(
                "[{}] does not support {} operands",
                op.symbol(),
                other
            )));
        }
    };
    Ok(factory)
}
