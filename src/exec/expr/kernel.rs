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
//! Monomorphic kernel plumbing.
//!
//! A [`Lane`] describes how to read one element type out of a block's values
//! array and an [`OutLane`] how to build a result block. Kernels are zero-sized
//! types implementing [`UnaryKernel`] or [`BinaryKernel`]; every (kernel, lane)
//! combination compiles to its own evaluator, so a page is processed by one tight
//! loop without per-value dispatch.

use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use arrow::array::{Array, BinaryArray, BooleanArray, Float64Array, Int32Array, Int64Array};

use super::{Evaluator, EvaluatorFactory};
use crate::common::error::ExecResult;
use crate::exec::block::{
    Block, BooleanBlockBuilder, BytesRefBlockBuilder, DoubleBlockBuilder, ElementType,
    IntBlockBuilder, LongBlockBuilder, vector_block,
};
use crate::exec::page::Page;
use crate::runtime::driver_context::DriverContext;
use crate::runtime::warnings::Warnings;

pub(crate) trait Lane: Send + Sync + 'static {
    type Array: Array + 'static;
    type Value<'a>: Copy
    where
        Self: 'a;
    const ELEMENT: ElementType;

    fn value(array: &Self::Array, index: usize) -> Self::Value<'_>;

    fn compare(a: Self::Value<'_>, b: Self::Value<'_>) -> Option<Ordering>;
}

macro_rules! ordered_lane {
    ($lane:ident, $array:ty, $native:ty, $element:expr) => {
        #[derive(Debug)]
        pub(crate) struct $lane;

        impl Lane for $lane {
            type Array = $array;
            type Value<'a> = $native;
            const ELEMENT: ElementType = $element;

            fn value(array: &Self::Array, index: usize) -> Self::Value<'_> {
                array.value(index)
            }

            fn compare(a: Self::Value<'_>, b: Self::Value<'_>) -> Option<Ordering> {
                a.partial_cmp(&b)
            }
        }
    };
}

ordered_lane!(IntLane, Int32Array, i32, ElementType::Int);
ordered_lane!(LongLane, Int64Array, i64, ElementType::Long);
ordered_lane!(DoubleLane, Float64Array, f64, ElementType::Double);
ordered_lane!(BooleanLane, BooleanArray, bool, ElementType::Boolean);

#[derive(Debug)]
pub(crate) struct BytesLane;

impl Lane for BytesLane {
    type Array = BinaryArray;
    type Value<'a> = &'a [u8];
    const ELEMENT: ElementType = ElementType::BytesRef;

    fn value(array: &Self::Array, index: usize) -> Self::Value<'_> {
        array.value(index)
    }

    fn compare(a: Self::Value<'_>, b: Self::Value<'_>) -> Option<Ordering> {
        Some(a.cmp(b))
    }
}

pub(crate) fn lane_values<L: Lane>(block: &Block) -> ExecResult<&L::Array> {
    block
        .values()
        .as_any()
        .downcast_ref::<L::Array>()
        .ok_or_else(|| {
            format!(
                "expected {} block, got {}",
                L::ELEMENT,
                block.element_type()
            )
            .into()
        })
}

pub(crate) trait OutLane: Send + Sync + 'static {
    type Native;
    type Builder;
    const ELEMENT: ElementType;

    fn builder(positions: usize) -> Self::Builder;

    fn push(builder: &mut Self::Builder, value: Option<Self::Native>);

    fn finish(builder: Self::Builder) -> ExecResult<Block>;

    fn vector(values: Vec<Self::Native>) -> ExecResult<Block>;
}

macro_rules! primitive_out {
    ($out:ident, $native:ty, $builder:ty, $array:ty, $element:expr) => {
        #[derive(Debug)]
        pub(crate) struct $out;

        impl OutLane for $out {
            type Native = $native;
            type Builder = $builder;
            const ELEMENT: ElementType = $element;

            fn builder(positions: usize) -> Self::Builder {
                <$builder>::with_capacity(positions)
            }

            fn push(builder: &mut Self::Builder, value: Option<Self::Native>) {
                builder.append_option(value);
            }

            fn finish(builder: Self::Builder) -> ExecResult<Block> {
                builder.build()
            }

            fn vector(values: Vec<Self::Native>) -> ExecResult<Block> {
                vector_block(<$array>::from(values))
            }
        }
    };
}

primitive_out!(IntOut, i32, IntBlockBuilder, Int32Array, ElementType::Int);
primitive_out!(LongOut, i64, LongBlockBuilder, Int64Array, ElementType::Long);
primitive_out!(DoubleOut, f64, DoubleBlockBuilder, Float64Array, ElementType::Double);
primitive_out!(BooleanOut, bool, BooleanBlockBuilder, BooleanArray, ElementType::Boolean);

#[derive(Debug)]
pub(crate) struct BytesOut;

impl OutLane for BytesOut {
    type Native = Vec<u8>;
    type Builder = BytesRefBlockBuilder;
    const ELEMENT: ElementType = ElementType::BytesRef;

    fn builder(positions: usize) -> Self::Builder {
        BytesRefBlockBuilder::with_capacity(positions)
    }

    fn push(builder: &mut Self::Builder, value: Option<Self::Native>) {
        builder.append_option(value.as_deref());
    }

    fn finish(builder: Self::Builder) -> ExecResult<Block> {
        builder.build()
    }

    fn vector(values: Vec<Self::Native>) -> ExecResult<Block> {
        vector_block(BinaryArray::from_iter_values(values))
    }
}

/// Per-value failure; the position becomes null and the message a warning.
pub(crate) type KernelResult<T> = Result<T, &'static str>;

pub(crate) trait UnaryKernel: Send + Sync + 'static {
    type In: Lane;
    type Out: OutLane;
    /// When set, a vector input takes the bookkeeping-free path.
    const INFALLIBLE: bool;

    fn apply(value: <Self::In as Lane>::Value<'_>) -> KernelResult<<Self::Out as OutLane>::Native>;
}

pub(crate) trait BinaryKernel: Send + Sync + 'static {
    type Lhs: Lane;
    type Rhs: Lane;
    type Out: OutLane;
    const INFALLIBLE: bool;

    fn apply(
        lhs: <Self::Lhs as Lane>::Value<'_>,
        rhs: <Self::Rhs as Lane>::Value<'_>,
    ) -> KernelResult<<Self::Out as OutLane>::Native>;
}

pub(crate) struct UnaryEvaluator<K: UnaryKernel> {
    child: Box<dyn Evaluator>,
    warnings: Warnings,
    _kernel: PhantomData<fn() -> K>,
}

impl<K: UnaryKernel> Evaluator for UnaryEvaluator<K> {
    fn eval(&mut self, page: &Page) -> ExecResult<Block> {
        let input = self.child.eval(page)?;
        let positions = input.position_count();
        if input.element_type() == ElementType::Null {
            return Ok(Block::constant_null(K::Out::ELEMENT, positions));
        }
        let values = lane_values::<K::In>(&input)?;
        if K::INFALLIBLE && input.as_vector().is_some() {
            let out = (0..positions)
                .map(|p| K::apply(K::In::value(values, p)))
                .collect::<KernelResult<Vec<_>>>();
            if let Ok(out) = out {
                return K::Out::vector(out);
            }
        }
        let mut builder = K::Out::builder(positions);
        for p in 0..positions {
            let result = match input.value_count(p) {
                0 => None,
                1 => match K::apply(K::In::value(values, input.first_value_index(p))) {
                    Ok(v) => Some(v),
                    Err(msg) => {
                        self.warnings.register(p, msg);
                        None
                    }
                },
                _ => {
                    self.warnings.register_multi_value(p);
                    None
                }
            };
            K::Out::push(&mut builder, result);
        }
        K::Out::finish(builder)
    }
}

pub(crate) struct UnaryEvaluatorFactory<K: UnaryKernel> {
    child: Arc<dyn EvaluatorFactory>,
    source: String,
    _kernel: PhantomData<fn() -> K>,
}

impl<K: UnaryKernel> UnaryEvaluatorFactory<K> {
    pub(crate) fn new(child: Arc<dyn EvaluatorFactory>, source: String) -> Self {
        Self {
            child,
            source,
            _kernel: PhantomData,
        }
    }
}

impl<K: UnaryKernel> fmt::Debug for UnaryEvaluatorFactory<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnaryEvaluatorFactory")
            .field("kernel", &std::any::type_name::<K>())
            .field("source", &self.source)
            .finish()
    }
}

impl<K: UnaryKernel> EvaluatorFactory for UnaryEvaluatorFactory<K> {
    fn get(&self, ctx: &DriverContext) -> ExecResult<Box<dyn Evaluator>> {
        Ok(Box::new(UnaryEvaluator::<K> {
            child: self.child.get(ctx)?,
            warnings: ctx.warnings_for(self.source.clone()),
            _kernel: PhantomData,
        }))
    }
}

pub(crate) struct BinaryEvaluator<K: BinaryKernel> {
    lhs: Box<dyn Evaluator>,
    rhs: Box<dyn Evaluator>,
    warnings: Warnings,
    _kernel: PhantomData<fn() -> K>,
}

impl<K: BinaryKernel> Evaluator for BinaryEvaluator<K> {
    fn eval(&mut self, page: &Page) -> ExecResult<Block> {
        let lhs = self.lhs.eval(page)?;
        let rhs = self.rhs.eval(page)?;
        let positions = page.position_count();
        if lhs.element_type() == ElementType::Null || rhs.element_type() == ElementType::Null {
            return Ok(Block::constant_null(K::Out::ELEMENT, positions));
        }
        let lhs_values = lane_values::<K::Lhs>(&lhs)?;
        let rhs_values = lane_values::<K::Rhs>(&rhs)?;
        if K::INFALLIBLE && lhs.as_vector().is_some() && rhs.as_vector().is_some() {
            let out = (0..positions)
                .map(|p| K::apply(K::Lhs::value(lhs_values, p), K::Rhs::value(rhs_values, p)))
                .collect::<KernelResult<Vec<_>>>();
            if let Ok(out) = out {
                return K::Out::vector(out);
            }
        }
        let mut builder = K::Out::builder(positions);
        for p in 0..positions {
            let (lc, rc) = (lhs.value_count(p), rhs.value_count(p));
            let result = if lc == 0 || rc == 0 {
                None
            } else if lc > 1 || rc > 1 {
                self.warnings.register_multi_value(p);
                None
            } else {
                let l = K::Lhs::value(lhs_values, lhs.first_value_index(p));
                let r = K::Rhs::value(rhs_values, rhs.first_value_index(p));
                match K::apply(l, r) {
                    Ok(v) => Some(v),
                    Err(msg) => {
                        self.warnings.register(p, msg);
                        None
                    }
                }
            };
            K::Out::push(&mut builder, result);
        }
        K::Out::finish(builder)
    }
}

pub(crate) struct BinaryEvaluatorFactory<K: BinaryKernel> {
    lhs: Arc<dyn EvaluatorFactory>,
    rhs: Arc<dyn EvaluatorFactory>,
    source: String,
    _kernel: PhantomData<fn() -> K>,
}

impl<K: BinaryKernel> BinaryEvaluatorFactory<K> {
    pub(crate) fn new(
        lhs: Arc<dyn EvaluatorFactory>,
        rhs: Arc<dyn EvaluatorFactory>,
        source: String,
    ) -> Self {
        Self {
            lhs,
            rhs,
            source,
            _kernel: PhantomData,
        }
    }
}

impl<K: BinaryKernel> fmt::Debug for BinaryEvaluatorFactory<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinaryEvaluatorFactory")
            .field("kernel", &std::any::type_name::<K>())
            .field("source", &self.source)
            .finish()
    }
}

impl<K: BinaryKernel> EvaluatorFactory for BinaryEvaluatorFactory<K> {
    fn get(&self, ctx: &DriverContext) -> ExecResult<Box<dyn Evaluator>> {
        Ok(Box::new(BinaryEvaluator::<K> {
            lhs: self.lhs.get(ctx)?,
            rhs: self.rhs.get(ctx)?,
            warnings: ctx.warnings_for(self.source.clone()),
            _kernel: PhantomData,
        }))
    }
}
