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
use crate::common::error::ExecResult;
use crate::exec::agg::{
    AggregatorFunctionSupplier, GroupingAggregatorFunction, IntermediateStateDesc,
    for_each_group, input_block,
};
use crate::exec::big_array::{BitArray, LongArray};
use crate::exec::block::{Block, BooleanBlockBuilder, ElementType, LongBlockBuilder};
use crate::exec::page::Page;
use crate::runtime::driver_context::DriverContext;

const INTERMEDIATE: [IntermediateStateDesc; 2] = [
    IntermediateStateDesc::new("count", ElementType::Long),
    IntermediateStateDesc::new("seen", ElementType::Boolean),
];

/// `count(*)` counts positions, `count(x)` counts non-null values, each value of
/// a multi-valued position included.
#[derive(Debug)]
pub struct CountSupplier {
    all_rows: bool,
}

impl CountSupplier {
    pub fn all_rows() -> Self {
        Self { all_rows: true }
    }

    pub fn values() -> Self {
        Self { all_rows: false }
    }
}

impl AggregatorFunctionSupplier for CountSupplier {
    fn name(&self) -> &str {
        "count"
    }

    fn raw_input_count(&self) -> usize {
        usize::from(!self.all_rows)
    }

    fn intermediate_state_desc(&self) -> Vec<IntermediateStateDesc> {
        INTERMEDIATE.to_vec()
    }

    fn final_type(&self) -> ElementType {
        ElementType::Long
    }

    fn create_grouping(
        &self,
        ctx: &DriverContext,
        channels: &[usize],
    ) -> ExecResult<Box<dyn GroupingAggregatorFunction>> {
        let arrays = ctx.big_arrays("count");
        Ok(Box::new(CountGrouping {
            channels: channels.to_vec(),
            all_rows: self.all_rows,
            counts: arrays.new_long_array(0)?,
            seen: arrays.new_bit_array()?,
        }))
    }
}

#[derive(Debug)]
struct CountGrouping {
    channels: Vec<usize>,
    all_rows: bool,
    counts: LongArray,
    seen: BitArray,
}

impl GroupingAggregatorFunction for CountGrouping {
    fn add_raw_input(&mut self, groups: &Block, page: &Page) -> ExecResult<()> {
        let values = match (self.all_rows, self.channels.first()) {
            (false, Some(channel)) => Some(input_block(page, groups, *channel)?),
            _ => None,
        };
        for_each_group(groups, |position, group| {
            let n = values.map_or(1, |block| block.value_count(position));
            self.counts.increment(group, n as i64)?;
            self.seen.set(group)
        })
    }

    fn add_intermediate_input(&mut self, groups: &Block, page: &Page) -> ExecResult<()> {
        let counts = input_block(page, groups, self.channels[0])?.as_longs()?;
        let seen = input_block(page, groups, self.channels[1])?.as_booleans()?;
        for_each_group(groups, |position, group| {
            if !seen.is_null(position) && seen.get(seen.first_value_index(position)) {
                self.seen.set(group)?;
            }
            if !counts.is_null(position) {
                self.counts
                    .increment(group, counts.get(counts.first_value_index(position)))?;
            }
            Ok(())
        })
    }

    fn evaluate_intermediate(&self, selected: &[u32]) -> ExecResult<Vec<Block>> {
        let mut counts = LongBlockBuilder::with_capacity(selected.len());
        let mut seen = BooleanBlockBuilder::with_capacity(selected.len());
        for group in selected {
            counts.append_value(self.counts.get(*group as usize));
            seen.append_value(self.seen.get(*group as usize));
        }
        Ok(vec![counts.build()?, seen.build()?])
    }

    fn evaluate_final(&self, selected: &[u32], _ctx: &DriverContext) -> ExecResult<Block> {
        let mut counts = LongBlockBuilder::with_capacity(selected.len());
        for group in selected {
            counts.append_value(self.counts.get(*group as usize));
        }
        counts.build()
    }

    fn intermediate_block_count(&self) -> usize {
        INTERMEDIATE.len()
    }

    fn close(&mut self) {
        self.counts.close();
        self.seen.close();
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{aggregator, groups, two_stage};
    use crate::exec::agg::AggregatorMode;
    use crate::exec::block::{ElementType, LongBlockBuilder};
    use crate::exec::page::Page;
    use crate::runtime::driver_context::DriverContext;

    fn values_page() -> Page {
        let mut b = LongBlockBuilder::with_capacity(4);
        b.append_value(1);
        b.append_null();
        b.begin_position_entry().append_value(2).append_value(3).end_position_entry();
        b.append_value(4);
        Page::new(vec![b.build().expect("values")]).expect("page")
    }

    #[test]
    fn counts_values_not_positions() {
        let ctx = DriverContext::new("count");
        let mut agg = aggregator(&ctx, "count", &[ElementType::Long], AggregatorMode::Single, vec![0]);
        agg.process_page(&groups(&[0, 0, 1, 1]), &values_page()).expect("input");
        let out = agg.evaluate(&[0, 1, 2], &ctx).expect("final").remove(0);
        let out = out.as_longs().expect("longs");
        assert_eq!((out.get(0), out.get(1), out.get(2)), (1, 3, 0));
    }

    #[test]
    fn count_star_counts_positions_across_stages() {
        let ctx = DriverContext::new("count");
        let page = values_page();
        let input = vec![(groups(&[0, 0, 1, 1]), page.clone()), (groups(&[1]), page.slice(0, 1))];
        let out = two_stage(&ctx, "count", &[], &input, &[1, 0]);
        let out = out.as_longs().expect("longs");
        assert_eq!((out.get(0), out.get(1)), (3, 2));
    }
}
