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
use super::sum::KahanSums;
use super::value_as_f64;
use crate::common::error::ExecResult;
use crate::exec::agg::{
    AggregatorFunctionSupplier, GroupingAggregatorFunction, IntermediateStateDesc,
    for_each_group, input_block,
};
use crate::exec::big_array::LongArray;
use crate::exec::block::{Block, DoubleBlockBuilder, ElementType, LongBlockBuilder};
use crate::exec::page::Page;
use crate::runtime::driver_context::DriverContext;

const INTERMEDIATE: [IntermediateStateDesc; 3] = [
    IntermediateStateDesc::new("sum", ElementType::Double),
    IntermediateStateDesc::new("delta", ElementType::Double),
    IntermediateStateDesc::new("count", ElementType::Long),
];

/// Mean of numeric input as a DOUBLE; null for groups that saw no values.
#[derive(Debug)]
pub struct AvgSupplier {
    input: ElementType,
}

impl AvgSupplier {
    pub fn new(input: ElementType) -> Self {
        Self { input }
    }
}

impl AggregatorFunctionSupplier for AvgSupplier {
    fn name(&self) -> &str {
        "avg"
    }

    fn intermediate_state_desc(&self) -> Vec<IntermediateStateDesc> {
        INTERMEDIATE.to_vec()
    }

    fn final_type(&self) -> ElementType {
        ElementType::Double
    }

    fn create_grouping(
        &self,
        ctx: &DriverContext,
        channels: &[usize],
    ) -> ExecResult<Box<dyn GroupingAggregatorFunction>> {
        let arrays = ctx.big_arrays("avg");
        Ok(Box::new(AvgGrouping {
            channels: channels.to_vec(),
            input: self.input,
            sums: KahanSums::new(arrays.new_double_array(0.0)?, arrays.new_double_array(0.0)?),
            counts: arrays.new_long_array(0)?,
        }))
    }
}

#[derive(Debug)]
struct AvgGrouping {
    channels: Vec<usize>,
    input: ElementType,
    sums: KahanSums,
    counts: LongArray,
}

impl GroupingAggregatorFunction for AvgGrouping {
    fn add_raw_input(&mut self, groups: &Block, page: &Page) -> ExecResult<()> {
        let block = input_block(page, groups, self.channels[0])?;
        debug_assert_eq!(block.element_type(), self.input);
        for_each_group(groups, |position, group| {
            let first = block.first_value_index(position);
            let n = block.value_count(position);
            for index in first..first + n {
                self.sums.add(group, value_as_f64(block, index)?, 0.0)?;
            }
            self.counts.increment(group, n as i64)
        })
    }

    fn add_intermediate_input(&mut self, groups: &Block, page: &Page) -> ExecResult<()> {
        let sums = input_block(page, groups, self.channels[0])?.as_doubles()?;
        let deltas = input_block(page, groups, self.channels[1])?.as_doubles()?;
        let counts = input_block(page, groups, self.channels[2])?.as_longs()?;
        for_each_group(groups, |position, group| {
            if counts.is_null(position) {
                return Ok(());
            }
            let count = counts.get(counts.first_value_index(position));
            if count == 0 {
                return Ok(());
            }
            let sum = sums.get(sums.first_value_index(position));
            let delta = deltas.get(deltas.first_value_index(position));
            self.sums.add(group, sum, delta)?;
            self.counts.increment(group, count)
        })
    }

    fn evaluate_intermediate(&self, selected: &[u32]) -> ExecResult<Vec<Block>> {
        let mut sums = DoubleBlockBuilder::with_capacity(selected.len());
        let mut deltas = DoubleBlockBuilder::with_capacity(selected.len());
        let mut counts = LongBlockBuilder::with_capacity(selected.len());
        for group in selected.iter().map(|g| *g as usize) {
            sums.append_value(self.sums.value(group));
            deltas.append_value(self.sums.delta(group));
            counts.append_value(self.counts.get(group));
        }
        Ok(vec![sums.build()?, deltas.build()?, counts.build()?])
    }

    fn evaluate_final(&self, selected: &[u32], _ctx: &DriverContext) -> ExecResult<Block> {
        let mut out = DoubleBlockBuilder::with_capacity(selected.len());
        for group in selected.iter().map(|g| *g as usize) {
            match self.counts.get(group) {
                0 => out.append_null(),
                count => out.append_value(self.sums.value(group) / count as f64),
            };
        }
        out.build()
    }

    fn intermediate_block_count(&self) -> usize {
        INTERMEDIATE.len()
    }

    fn close(&mut self) {
        self.sums.close();
        self.counts.close();
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{groups, two_stage};
    use crate::exec::block::{ElementType, LongBlockBuilder};
    use crate::exec::page::Page;
    use crate::runtime::driver_context::DriverContext;

    #[test]
    fn averages_long_input_with_multi_values() {
        let ctx = DriverContext::new("avg");
        let mut b = LongBlockBuilder::with_capacity(3);
        b.append_value(1);
        b.begin_position_entry().append_value(2).append_value(6).end_position_entry();
        b.append_null();
        let page = Page::new(vec![b.build().expect("block")]).expect("page");
        let out = two_stage(&ctx, "avg", &[ElementType::Long], &[(groups(&[0, 0, 1]), page)], &[0, 1]);
        assert_eq!(out.as_doubles().expect("doubles").get(0), 3.0);
        assert!(out.is_null(1));
    }
}
