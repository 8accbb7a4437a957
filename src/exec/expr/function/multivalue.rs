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
//! Functions that look at every value of a position instead of rejecting
//! multi-valued input, plus the null-aware `coalesce`.

use std::cmp::Ordering;
use std::marker::PhantomData;
use std::sync::Arc;

use super::super::kernel::{BooleanLane, BytesLane, DoubleLane, IntLane, Lane, LongLane, lane_values};
use super::super::{Evaluator, EvaluatorFactory};
use super::{Registry, single_arg};
use crate::common::error::{ExecError, ExecResult};
use crate::exec::block::{Block, BlockBuilder, ElementType, IntBlockBuilder};
use crate::exec::page::Page;
use crate::runtime::driver_context::DriverContext;

const MAX_COALESCE_ARGS: usize = 8;

struct MvCountEvaluator {
    child: Box<dyn Evaluator>,
}

impl Evaluator for MvCountEvaluator {
    fn eval(&mut self, page: &Page) -> ExecResult<Block> {
        let input = self.child.eval(page)?;
        let mut builder = IntBlockBuilder::with_capacity(input.position_count());
        for p in 0..input.position_count() {
            match input.value_count(p) {
                0 => builder.append_null(),
                n => builder.append_value(i32::try_from(n).unwrap_or(i32::MAX)),
            };
        }
        builder.build()
    }
}

#[derive(Debug)]
struct MvCountEvaluatorFactory {
    child: Arc<dyn EvaluatorFactory>,
}

impl EvaluatorFactory for MvCountEvaluatorFactory {
    fn get(&self, ctx: &DriverContext) -> ExecResult<Box<dyn Evaluator>> {
        Ok(Box::new(MvCountEvaluator {
            child: self.child.get(ctx)?,
        }))
    }
}

/// Picks the least (`Ordering::Less`) or greatest (`Ordering::Greater`) value.
struct MvExtremeEvaluator<L: Lane> {
    child: Box<dyn Evaluator>,
    keep: Ordering,
    _lane: PhantomData<fn() -> L>,
}

impl<L: Lane> Evaluator for MvExtremeEvaluator<L> {
    fn eval(&mut self, page: &Page) -> ExecResult<Block> {
        let input = self.child.eval(page)?;
        let positions = input.position_count();
        if input.element_type() == ElementType::Null {
            return Ok(input);
        }
        let values = lane_values::<L>(&input)?;
        let mut builder = BlockBuilder::new(input.element_type(), positions);
        for p in 0..positions {
            let count = input.value_count(p);
            if count == 0 {
                builder.append_null();
                continue;
            }
            let first = input.first_value_index(p);
            let mut best = first;
            for index in first + 1..first + count {
                if L::compare(L::value(values, index), L::value(values, best)) == Some(self.keep) {
                    best = index;
                }
            }
            builder.copy_value_from(&input, best)?;
        }
        builder.build()
    }
}

struct MvExtremeEvaluatorFactory<L: Lane> {
    child: Arc<dyn EvaluatorFactory>,
    keep: Ordering,
    _lane: PhantomData<fn() -> L>,
}

impl<L: Lane> std::fmt::Debug for MvExtremeEvaluatorFactory<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MvExtremeEvaluatorFactory")
            .field("element_type", &L::ELEMENT)
            .field("keep", &self.keep)
            .finish()
    }
}

impl<L: Lane> EvaluatorFactory for MvExtremeEvaluatorFactory<L> {
    fn get(&self, ctx: &DriverContext) -> ExecResult<Box<dyn Evaluator>> {
        Ok(Box::new(MvExtremeEvaluator::<L> {
            child: self.child.get(ctx)?,
            keep: self.keep,
            _lane: PhantomData,
        }))
    }
}

/// First non-null argument per position; multi-values are copied as-is.
struct CoalesceEvaluator {
    element_type: ElementType,
    children: Vec<Box<dyn Evaluator>>,
}

impl Evaluator for CoalesceEvaluator {
    fn eval(&mut self, page: &Page) -> ExecResult<Block> {
        let inputs = self
            .children
            .iter_mut()
            .map(|c| c.eval(page))
            .collect::<ExecResult<Vec<_>>>()?;
        let positions = page.position_count();
        let mut builder = BlockBuilder::new(self.element_type, positions);
        for p in 0..positions {
            match inputs.iter().find(|b| !b.is_null(p)) {
                Some(block) => builder.copy_position_from(block, p)?,
                None => builder.append_null(),
            }
        }
        builder.build()
    }
}

#[derive(Debug)]
struct CoalesceEvaluatorFactory {
    element_type: ElementType,
    children: Vec<Arc<dyn EvaluatorFactory>>,
}

impl EvaluatorFactory for CoalesceEvaluatorFactory {
    fn get(&self, ctx: &DriverContext) -> ExecResult<Box<dyn Evaluator>> {
        let children = self
            .children
            .iter()
            .map(|c| c.get(ctx))
            .collect::<ExecResult<Vec<_>>>()?;
        Ok(Box::new(CoalesceEvaluator {
            element_type: self.element_type,
            children,
        }))
    }
}

fn mv_count(
    args: Vec<Arc<dyn EvaluatorFactory>>,
    source: String,
) -> ExecResult<Arc<dyn EvaluatorFactory>> {
    Ok(Arc::new(MvCountEvaluatorFactory {
        child: single_arg(args, &source)?,
    }))
}

fn mv_extreme<L: Lane>(
    args: Vec<Arc<dyn EvaluatorFactory>>,
    source: String,
    keep: Ordering,
) -> ExecResult<Arc<dyn EvaluatorFactory>> {
    Ok(Arc::new(MvExtremeEvaluatorFactory::<L> {
        child: single_arg(args, &source)?,
        keep,
        _lane: PhantomData,
    }))
}

fn mv_min<L: Lane>(
    args: Vec<Arc<dyn EvaluatorFactory>>,
    source: String,
) -> ExecResult<Arc<dyn EvaluatorFactory>> {
    mv_extreme::<L>(args, source, Ordering::Less)
}

fn mv_max<L: Lane>(
    args: Vec<Arc<dyn EvaluatorFactory>>,
    source: String,
) -> ExecResult<Arc<dyn EvaluatorFactory>> {
    mv_extreme::<L>(args, source, Ordering::Greater)
}

macro_rules! coalesce_for {
    ($element:expr) => {
        |args: Vec<Arc<dyn EvaluatorFactory>>, _source: String| {
            if args.is_empty() {
                return Err(ExecError::invalid_input("coalesce expects at least one argument"));
            }
            Ok(Arc::new(CoalesceEvaluatorFactory {
                element_type: $element,
                children: args,
            }) as Arc<dyn EvaluatorFactory>)
        }
    };
}

pub(super) fn register(registry: &mut Registry) {
    use ElementType::*;
    for t in [Boolean, Int, Long, Double, BytesRef] {
        registry.register("mv_count", &[t], Int, mv_count);
    }
    registry.register("mv_min", &[Int], Int, mv_min::<IntLane>);
    registry.register("mv_min", &[Long], Long, mv_min::<LongLane>);
    registry.register("mv_min", &[Double], Double, mv_min::<DoubleLane>);
    registry.register("mv_min", &[BytesRef], BytesRef, mv_min::<BytesLane>);
    registry.register("mv_min", &[Boolean], Boolean, mv_min::<BooleanLane>);
    registry.register("mv_max", &[Int], Int, mv_max::<IntLane>);
    registry.register("mv_max", &[Long], Long, mv_max::<LongLane>);
    registry.register("mv_max", &[Double], Double, mv_max::<DoubleLane>);
    registry.register("mv_max", &[BytesRef], BytesRef, mv_max::<BytesLane>);
    registry.register("mv_max", &[Boolean], Boolean, mv_max::<BooleanLane>);

    for arity in 1..=MAX_COALESCE_ARGS {
        registry.register_null_aware("coalesce", &vec![Boolean; arity], Boolean, coalesce_for!(Boolean));
        registry.register_null_aware("coalesce", &vec![Int; arity], Int, coalesce_for!(Int));
        registry.register_null_aware("coalesce", &vec![Long; arity], Long, coalesce_for!(Long));
        registry.register_null_aware("coalesce", &vec![Double; arity], Double, coalesce_for!(Double));
        registry.register_null_aware(
            "coalesce",
            &vec![BytesRef; arity],
            BytesRef,
            coalesce_for!(BytesRef),
        );
    }
}
