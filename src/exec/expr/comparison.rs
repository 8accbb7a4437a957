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
//! Comparison, boolean logic and null tests.

use std::cmp::Ordering;
use std::marker::PhantomData;
use std::sync::Arc;

use super::kernel::{
    BinaryEvaluatorFactory, BinaryKernel, BooleanLane, BooleanOut, BytesLane, DoubleLane,
    IntLane, KernelResult, Lane, LongLane, UnaryKernel, lane_values,
};
use super::{ComparisonOp, Evaluator, EvaluatorFactory, LogicOp};
use crate::common::error::{ExecError, ExecResult};
use crate::exec::block::{Block, BooleanBlockBuilder, ElementType, vector_block};
use crate::exec::page::Page;
use crate::runtime::driver_context::DriverContext;
use crate::runtime::warnings::Warnings;

pub(crate) trait CmpOp: Send + Sync + 'static {
    fn test(ordering: Option<Ordering>) -> bool;
}

macro_rules! cmp_op {
    ($op:ident, |$o:ident| $body:expr) => {
        #[derive(Debug)]
        pub(crate) struct $op;

        impl CmpOp for $op {
            fn test($o: Option<Ordering>) -> bool {
                $body
            }
        }
    };
}

cmp_op!(EqOp, |o| o == Some(Ordering::Equal));
cmp_op!(NeOp, |o| o != Some(Ordering::Equal));
cmp_op!(LtOp, |o| o == Some(Ordering::Less));
cmp_op!(LeOp, |o| matches!(o, Some(Ordering::Less | Ordering::Equal)));
cmp_op!(GtOp, |o| o == Some(Ordering::Greater));
cmp_op!(GeOp, |o| matches!(o, Some(Ordering::Greater | Ordering::Equal)));

/// `lhs <op> rhs` over two operands of the same lane. NaN compares unordered.
pub(crate) struct Compare<L: Lane, O: CmpOp>(PhantomData<fn() -> (L, O)>);

impl<L: Lane, O: CmpOp> BinaryKernel for Compare<L, O> {
    type Lhs = L;
    type Rhs = L;
    type Out = BooleanOut;
    const INFALLIBLE: bool = true;

    fn apply(lhs: L::Value<'_>, rhs: L::Value<'_>) -> KernelResult<bool> {
        Ok(O::test(L::compare(lhs, rhs)))
    }
}

fn compare<L: Lane, O: CmpOp>(
    lhs: Arc<dyn EvaluatorFactory>,
    rhs: Arc<dyn EvaluatorFactory>,
    source: String,
) -> Arc<dyn EvaluatorFactory> {
    Arc::new(BinaryEvaluatorFactory::<Compare<L, O>>::new(lhs, rhs, source))
}

fn compare_lane<L: Lane>(
    op: ComparisonOp,
    lhs: Arc<dyn EvaluatorFactory>,
    rhs: Arc<dyn EvaluatorFactory>,
    source: String,
) -> Arc<dyn EvaluatorFactory> {
    match op {
        ComparisonOp::Eq => compare::<L, EqOp>(lhs, rhs, source),
        ComparisonOp::Ne => compare::<L, NeOp>(lhs, rhs, source),
        ComparisonOp::Lt => compare::<L, LtOp>(lhs, rhs, source),
        ComparisonOp::Le => compare::<L, LeOp>(lhs, rhs, source),
        ComparisonOp::Gt => compare::<L, GtOp>(lhs, rhs, source),
        ComparisonOp::Ge => compare::<L, GeOp>(lhs, rhs, source),
    }
}

/// Both operands must already share `element_type`.
pub(crate) fn comparison_factory(
    op: ComparisonOp,
    element_type: ElementType,
    lhs: Arc<dyn EvaluatorFactory>,
    rhs: Arc<dyn EvaluatorFactory>,
    source: String,
) -> ExecResult<Arc<dyn EvaluatorFactory>> {
    let factory = match element_type {
        ElementType::Int => compare_lane::<IntLane>(op, lhs, rhs, source),
        ElementType::Long => compare_lane::<LongLane>(op, lhs, rhs, source),
        ElementType::Double => compare_lane::<DoubleLane>(op, lhs, rhs, source),
        ElementType::BytesRef => compare_lane::<BytesLane>(op, lhs, rhs, source),
        ElementType::Boolean => compare_lane::<BooleanLane>(op, lhs, rhs, source),
        ElementType::Null => {
            return Err(ExecError::invalid_input(format!(
                "[{}] cannot compare untyped null operands",
                op.symbol()
            )));
        }
    };
    Ok(factory)
}

#[derive(Debug)]
pub(crate) struct NotKernel;

impl UnaryKernel for NotKernel {
    type In = BooleanLane;
    type Out = BooleanOut;
    const INFALLIBLE: bool = true;

    fn apply(value: bool) -> KernelResult<bool> {
        Ok(!value)
    }
}

/// Three-valued AND/OR: `false AND null` is false, `true OR null` is true.
struct LogicEvaluator {
    op: LogicOp,
    lhs: Box<dyn Evaluator>,
    rhs: Box<dyn Evaluator>,
    warnings: Warnings,
}

impl LogicEvaluator {
    fn operand(&mut self, block: &Block, position: usize) -> ExecResult<Option<bool>> {
        match block.value_count(position) {
            0 => Ok(None),
            1 => Ok(Some(
                lane_values::<BooleanLane>(block)?.value(block.first_value_index(position)),
            )),
            _ => {
                self.warnings.register_multi_value(position);
                Ok(None)
            }
        }
    }
}

impl Evaluator for LogicEvaluator {
    fn eval(&mut self, page: &Page) -> ExecResult<Block> {
        let lhs = self.lhs.eval(page)?;
        let rhs = self.rhs.eval(page)?;
        let positions = page.position_count();
        let mut builder = BooleanBlockBuilder::with_capacity(positions);
        for p in 0..positions {
            let l = if lhs.element_type() == ElementType::Null {
                None
            } else {
                self.operand(&lhs, p)?
            };
            let r = if rhs.element_type() == ElementType::Null {
                None
            } else {
                self.operand(&rhs, p)?
            };
            let result = match self.op {
                LogicOp::And => match (l, r) {
                    (Some(false), _) | (_, Some(false)) => Some(false),
                    (Some(true), Some(true)) => Some(true),
                    _ => None,
                },
                LogicOp::Or => match (l, r) {
                    (Some(true), _) | (_, Some(true)) => Some(true),
                    (Some(false), Some(false)) => Some(false),
                    _ => None,
                },
            };
            builder.append_option(result);
        }
        builder.build()
    }
}

#[derive(Debug)]
pub(crate) struct LogicEvaluatorFactory {
    op: LogicOp,
    lhs: Arc<dyn EvaluatorFactory>,
    rhs: Arc<dyn EvaluatorFactory>,
    source: String,
}

impl LogicEvaluatorFactory {
    pub(crate) fn new(
        op: LogicOp,
        lhs: Arc<dyn EvaluatorFactory>,
        rhs: Arc<dyn EvaluatorFactory>,
        source: String,
    ) -> Self {
        Self {
            op,
            lhs,
            rhs,
            source,
        }
    }
}

impl EvaluatorFactory for LogicEvaluatorFactory {
    fn get(&self, ctx: &DriverContext) -> ExecResult<Box<dyn Evaluator>> {
        Ok(Box::new(LogicEvaluator {
            op: self.op,
            lhs: self.lhs.get(ctx)?,
            rhs: self.rhs.get(ctx)?,
            warnings: ctx.warnings_for(self.source.clone()),
        }))
    }
}

/// IS NULL / IS NOT NULL. Null-aware, never produces null itself.
struct NullTestEvaluator {
    child: Box<dyn Evaluator>,
    negated: bool,
}

impl Evaluator for NullTestEvaluator {
    fn eval(&mut self, page: &Page) -> ExecResult<Block> {
        let input = self.child.eval(page)?;
        let values = (0..input.position_count())
            .map(|p| input.is_null(p) != self.negated)
            .collect::<Vec<_>>();
        vector_block(arrow::array::BooleanArray::from(values))
    }
}

#[derive(Debug)]
pub(crate) struct NullTestEvaluatorFactory {
    child: Arc<dyn EvaluatorFactory>,
    negated: bool,
}

impl NullTestEvaluatorFactory {
    pub(crate) fn new(child: Arc<dyn EvaluatorFactory>, negated: bool) -> Self {
        Self { child, negated }
    }
}

impl EvaluatorFactory for NullTestEvaluatorFactory {
    fn get(&self, ctx: &DriverContext) -> ExecResult<Box<dyn Evaluator>> {
        Ok(Box::new(NullTestEvaluator {
            child: self.child.get(ctx)?,
            negated: self.negated,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_is_unordered() {
        assert_eq!(Compare::<DoubleLane, EqOp>::apply(f64::NAN, f64::NAN), Ok(false));
        assert_eq!(Compare::<DoubleLane, NeOp>::apply(f64::NAN, 1.0), Ok(true));
        assert_eq!(Compare::<DoubleLane, LeOp>::apply(1.0, 1.0), Ok(true));
    }

    #[test]
    fn bytes_and_booleans_order() {
        assert_eq!(Compare::<BytesLane, LtOp>::apply(&b"abc"[..], &b"abd"[..]), Ok(true));
        assert_eq!(Compare::<BooleanLane, GtOp>::apply(true, false), Ok(true));
    }
}
