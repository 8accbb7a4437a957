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
use super::{NumericValue, numeric_values, position_slice};
use crate::common::error::{ExecError, ExecResult};
use crate::exec::agg::{
    AggregatorFunctionSupplier, GroupingAggregatorFunction, IntermediateStateDesc,
    for_each_group, input_block,
};
use crate::exec::big_array::{BigArray, BigArrays, BitArray};
use crate::exec::block::{Block, BooleanBlockBuilder, ElementType, PrimitiveBlockBuilder};
use crate::exec::page::Page;
use crate::runtime::driver_context::DriverContext;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Extreme {
    Min,
    Max,
}

impl Extreme {
    fn name(&self) -> &'static str {
        match self {
            Extreme::Min => "min",
            Extreme::Max => "max",
        }
    }

    fn replaces<T: PartialOrd>(&self, candidate: T, current: T) -> bool {
        match self {
            Extreme::Min => candidate < current,
            Extreme::Max => candidate > current,
        }
    }
}

#[derive(Debug)]
pub struct MinMaxSupplier {
    extreme: Extreme,
    input: ElementType,
}

impl MinMaxSupplier {
    pub fn new(extreme: Extreme, input: ElementType) -> Self {
        Self { extreme, input }
    }
}

impl AggregatorFunctionSupplier for MinMaxSupplier {
    fn name(&self) -> &str {
        self.extreme.name()
    }

    fn intermediate_state_desc(&self) -> Vec<IntermediateStateDesc> {
        vec![
            IntermediateStateDesc::new(self.extreme.name(), self.input),
            IntermediateStateDesc::new("seen", ElementType::Boolean),
        ]
    }

    fn final_type(&self) -> ElementType {
        self.input
    }

    fn create_grouping(
        &self,
        ctx: &DriverContext,
        channels: &[usize],
    ) -> ExecResult<Box<dyn GroupingAggregatorFunction>> {
        let arrays = ctx.big_arrays(self.extreme.name());
        match self.input {
            ElementType::Int => {
                MinMaxGrouping::<i32>::boxed(self.extreme, channels, &arrays, 0)
            }
            ElementType::Long => {
                MinMaxGrouping::<i64>::boxed(self.extreme, channels, &arrays, 0)
            }
            ElementType::Double => {
                MinMaxGrouping::<f64>::boxed(self.extreme, channels, &arrays, 0.0)
            }
            other => Err(ExecError::invalid_input(format!(
                "{} does not support {other}",
                self.extreme.name()
            ))),
        }
    }
}

#[derive(Debug)]
struct MinMaxGrouping<T: NumericValue> {
    extreme: Extreme,
    channels: Vec<usize>,
    values: BigArray<T>,
    seen: BitArray,
}

impl<T: NumericValue> MinMaxGrouping<T> {
    fn boxed(
        extreme: Extreme,
        channels: &[usize],
        arrays: &BigArrays,
        fill: T,
    ) -> ExecResult<Box<dyn GroupingAggregatorFunction>> {
        Ok(Box::new(Self {
            extreme,
            channels: channels.to_vec(),
            values: arrays.new_array(fill)?,
            seen: arrays.new_bit_array()?,
        }))
    }

    fn offer(&mut self, group: usize, value: T) -> ExecResult<()> {
        if !self.seen.get(group) {
            self.seen.set(group)?;
            return self.values.set(group, value);
        }
        if self.extreme.replaces(value, self.values.get(group)) {
            self.values.set(group, value)?;
        }
        Ok(())
    }

    fn build(&self, selected: &[u32]) -> ExecResult<Block> {
        let mut out = PrimitiveBlockBuilder::<T::Arrow>::with_capacity(selected.len());
        for group in selected.iter().map(|g| *g as usize) {
            if self.seen.get(group) {
                out.append_value(self.values.get(group));
            } else {
                out.append_null();
            }
        }
        out.build()
    }
}

impl<T: NumericValue> GroupingAggregatorFunction for MinMaxGrouping<T> {
    fn add_raw_input(&mut self, groups: &Block, page: &Page) -> ExecResult<()> {
        let block = input_block(page, groups, self.channels[0])?;
        let values = numeric_values::<T>(block)?;
        for_each_group(groups, |position, group| {
            for v in position_slice(block, values, position) {
                self.offer(group, *v)?;
            }
            Ok(())
        })
    }

    fn add_intermediate_input(&mut self, groups: &Block, page: &Page) -> ExecResult<()> {
        let block = input_block(page, groups, self.channels[0])?;
        let seen = input_block(page, groups, self.channels[1])?.as_booleans()?;
        let values = numeric_values::<T>(block)?;
        for_each_group(groups, |position, group| {
            if seen.is_null(position) || !seen.get(seen.first_value_index(position)) {
                return Ok(());
            }
            for v in position_slice(block, values, position) {
                self.offer(group, *v)?;
            }
            Ok(())
        })
    }

    fn evaluate_intermediate(&self, selected: &[u32]) -> ExecResult<Vec<Block>> {
        let mut seen = BooleanBlockBuilder::with_capacity(selected.len());
        for group in selected {
            seen.append_value(self.seen.get(*group as usize));
        }
        Ok(vec![self.build(selected)?, seen.build()?])
    }

    fn evaluate_final(&self, selected: &[u32], _ctx: &DriverContext) -> ExecResult<Block> {
        self.build(selected)
    }

    fn intermediate_block_count(&self) -> usize {
        2
    }

    fn close(&mut self) {
        self.values.close();
        self.seen.close();
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{groups, two_stage};
    use crate::exec::block::{ElementType, IntBlockBuilder};
    use crate::exec::page::Page;
    use crate::runtime::driver_context::DriverContext;

    fn page() -> Page {
        let mut b = IntBlockBuilder::with_capacity(4);
        b.append_value(7);
        b.begin_position_entry().append_value(-3).append_value(9).end_position_entry();
        b.append_null();
        b.append_value(4);
        Page::new(vec![b.build().expect("block")]).expect("page")
    }

    #[test]
    fn min_and_max_read_every_value() {
        let ctx = DriverContext::new("min_max");
        let input = [(groups(&[0, 0, 1, 1]), page())];
        let min = two_stage(&ctx, "min", &[ElementType::Int], &input, &[0, 1]);
        let max = two_stage(&ctx, "max", &[ElementType::Int], &input, &[0, 1]);
        let (min, max) = (min.as_ints().expect("ints"), max.as_ints().expect("ints"));
        assert_eq!((min.get(0), min.get(1)), (-3, 4));
        assert_eq!((max.get(0), max.get(1)), (9, 4));
    }

    #[test]
    fn group_without_values_is_null() {
        let ctx = DriverContext::new("min_max");
        let input = [(groups(&[0, 0, 1, 0]), page())];
        let out = two_stage(&ctx, "min", &[ElementType::Int], &input, &[1]);
        assert!(out.is_null(0));
    }
}
