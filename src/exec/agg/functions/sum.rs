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
use super::{numeric_values, position_slice};
use crate::common::error::{ExecError, ExecResult};
use crate::exec::agg::{
    AggregatorFunctionSupplier, GroupingAggregatorFunction, IntermediateStateDesc,
    for_each_group, input_block,
};
use crate::exec::big_array::{BitArray, DoubleArray, LongArray};
use crate::exec::block::{
    Block, BooleanBlockBuilder, DoubleBlockBuilder, ElementType, LongBlockBuilder,
};
use crate::exec::page::Page;
use crate::runtime::driver_context::DriverContext;
use crate::runtime::warnings::Warnings;

const LONG_INTERMEDIATE: [IntermediateStateDesc; 3] = [
    IntermediateStateDesc::new("sum", ElementType::Long),
    IntermediateStateDesc::new("seen", ElementType::Boolean),
    IntermediateStateDesc::new("failed", ElementType::Boolean),
];

const DOUBLE_INTERMEDIATE: [IntermediateStateDesc; 3] = [
    IntermediateStateDesc::new("value", ElementType::Double),
    IntermediateStateDesc::new("delta", ElementType::Double),
    IntermediateStateDesc::new("seen", ElementType::Boolean),
];

fn flag(block: &Block, position: usize) -> ExecResult<bool> {
    let flags = block.as_booleans()?;
    Ok(!flags.is_null(position) && flags.get(flags.first_value_index(position)))
}

/// Exact sum of INT or LONG input into a LONG. A group whose sum overflows
/// yields null and one warning.
#[derive(Debug)]
pub struct SumLongSupplier {
    input: ElementType,
}

impl SumLongSupplier {
    pub fn new(input: ElementType) -> Self {
        Self { input }
    }
}

impl AggregatorFunctionSupplier for SumLongSupplier {
    fn name(&self) -> &str {
        "sum"
    }

    fn intermediate_state_desc(&self) -> Vec<IntermediateStateDesc> {
        LONG_INTERMEDIATE.to_vec()
    }

    fn final_type(&self) -> ElementType {
        ElementType::Long
    }

    fn create_grouping(
        &self,
        ctx: &DriverContext,
        channels: &[usize],
    ) -> ExecResult<Box<dyn GroupingAggregatorFunction>> {
        let arrays = ctx.big_arrays("sum");
        Ok(Box::new(SumLongGrouping {
            channels: channels.to_vec(),
            input: self.input,
            sums: arrays.new_long_array(0)?,
            seen: arrays.new_bit_array()?,
            failed: arrays.new_bit_array()?,
            warnings: ctx.warnings_for("sum"),
        }))
    }
}

#[derive(Debug)]
struct SumLongGrouping {
    channels: Vec<usize>,
    input: ElementType,
    sums: LongArray,
    seen: BitArray,
    failed: BitArray,
    warnings: Warnings,
}

impl SumLongGrouping {
    fn add(&mut self, position: usize, group: usize, value: i64) -> ExecResult<()> {
        self.seen.set(group)?;
        if self.failed.get(group) {
            return Ok(());
        }
        match self.sums.get(group).checked_add(value) {
            Some(sum) => self.sums.set(group, sum),
            None => {
                self.warnings.register(position, "long overflow");
                self.failed.set(group)
            }
        }
    }
}

impl GroupingAggregatorFunction for SumLongGrouping {
    fn add_raw_input(&mut self, groups: &Block, page: &Page) -> ExecResult<()> {
        let block = input_block(page, groups, self.channels[0])?;
        match self.input {
            ElementType::Int => {
                let values = numeric_values::<i32>(block)?;
                for_each_group(groups, |position, group| {
                    for v in position_slice(block, values, position) {
                        self.add(position, group, *v as i64)?;
                    }
                    Ok(())
                })
            }
            ElementType::Long => {
                let values = numeric_values::<i64>(block)?;
                for_each_group(groups, |position, group| {
                    for v in position_slice(block, values, position) {
                        self.add(position, group, *v)?;
                    }
                    Ok(())
                })
            }
            other => Err(ExecError::Internal(format!("sum cannot read {other} exactly"))),
        }
    }

    fn add_intermediate_input(&mut self, groups: &Block, page: &Page) -> ExecResult<()> {
        let sums = input_block(page, groups, self.channels[0])?;
        let seen = input_block(page, groups, self.channels[1])?;
        let failed = input_block(page, groups, self.channels[2])?;
        let values = numeric_values::<i64>(sums)?;
        for_each_group(groups, |position, group| {
            if flag(failed, position)? {
                self.seen.set(group)?;
                return self.failed.set(group);
            }
            if !flag(seen, position)? {
                return Ok(());
            }
            match position_slice(sums, values, position) {
                [v] => self.add(position, group, *v),
                _ => Ok(()),
            }
        })
    }

    fn evaluate_intermediate(&self, selected: &[u32]) -> ExecResult<Vec<Block>> {
        let mut sums = LongBlockBuilder::with_capacity(selected.len());
        let mut seen = BooleanBlockBuilder::with_capacity(selected.len());
        let mut failed = BooleanBlockBuilder::with_capacity(selected.len());
        for group in selected.iter().map(|g| *g as usize) {
            sums.append_value(self.sums.get(group));
            seen.append_value(self.seen.get(group));
            failed.append_value(self.failed.get(group));
        }
        Ok(vec![sums.build()?, seen.build()?, failed.build()?])
    }

    fn evaluate_final(&self, selected: &[u32], _ctx: &DriverContext) -> ExecResult<Block> {
        let mut out = LongBlockBuilder::with_capacity(selected.len());
        for group in selected.iter().map(|g| *g as usize) {
            if self.seen.get(group) && !self.failed.get(group) {
                out.append_value(self.sums.get(group));
            } else {
                out.append_null();
            }
        }
        out.build()
    }

    fn intermediate_block_count(&self) -> usize {
        LONG_INTERMEDIATE.len()
    }

    fn close(&mut self) {
        self.sums.close();
        self.seen.close();
        self.failed.close();
    }
}

/// Compensated (Kahan) sum of DOUBLE input.
#[derive(Debug)]
pub struct SumDoubleSupplier;

impl AggregatorFunctionSupplier for SumDoubleSupplier {
    fn name(&self) -> &str {
        "sum"
    }

    fn intermediate_state_desc(&self) -> Vec<IntermediateStateDesc> {
        DOUBLE_INTERMEDIATE.to_vec()
    }

    fn final_type(&self) -> ElementType {
        ElementType::Double
    }

    fn create_grouping(
        &self,
        ctx: &DriverContext,
        channels: &[usize],
    ) -> ExecResult<Box<dyn GroupingAggregatorFunction>> {
        let arrays = ctx.big_arrays("sum");
        Ok(Box::new(SumDoubleGrouping {
            channels: channels.to_vec(),
            sums: KahanSums::new(arrays.new_double_array(0.0)?, arrays.new_double_array(0.0)?),
            seen: arrays.new_bit_array()?,
        }))
    }
}

/// Per-group running sums with their lost low-order bits.
#[derive(Debug)]
pub(crate) struct KahanSums {
    values: DoubleArray,
    deltas: DoubleArray,
}

impl KahanSums {
    pub(crate) fn new(values: DoubleArray, deltas: DoubleArray) -> Self {
        Self { values, deltas }
    }

    /// Add a partial sum whose true value is `value - delta`.
    pub(crate) fn add(&mut self, group: usize, value: f64, delta: f64) -> ExecResult<()> {
        self.add_one(group, value)?;
        if delta != 0.0 {
            self.add_one(group, -delta)?;
        }
        Ok(())
    }

    fn add_one(&mut self, group: usize, value: f64) -> ExecResult<()> {
        let sum = self.values.get(group);
        if !value.is_finite() || !sum.is_finite() {
            return self.values.set(group, sum + value);
        }
        let corrected = value - self.deltas.get(group);
        let updated = sum + corrected;
        self.deltas.set(group, (updated - sum) - corrected)?;
        self.values.set(group, updated)
    }

    pub(crate) fn value(&self, group: usize) -> f64 {
        self.values.get(group)
    }

    pub(crate) fn delta(&self, group: usize) -> f64 {
        self.deltas.get(group)
    }

    pub(crate) fn close(&mut self) {
        self.values.close();
        self.deltas.close();
    }
}

#[derive(Debug)]
struct SumDoubleGrouping {
    channels: Vec<usize>,
    sums: KahanSums,
    seen: BitArray,
}

impl GroupingAggregatorFunction for SumDoubleGrouping {
    fn add_raw_input(&mut self, groups: &Block, page: &Page) -> ExecResult<()> {
        let block = input_block(page, groups, self.channels[0])?;
        let values = numeric_values::<f64>(block)?;
        for_each_group(groups, |position, group| {
            for v in position_slice(block, values, position) {
                self.sums.add(group, *v, 0.0)?;
                self.seen.set(group)?;
            }
            Ok(())
        })
    }

    fn add_intermediate_input(&mut self, groups: &Block, page: &Page) -> ExecResult<()> {
        let values = input_block(page, groups, self.channels[0])?;
        let deltas = input_block(page, groups, self.channels[1])?;
        let seen = input_block(page, groups, self.channels[2])?;
        let value_buf = numeric_values::<f64>(values)?;
        let delta_buf = numeric_values::<f64>(deltas)?;
        for_each_group(groups, |position, group| {
            if !flag(seen, position)? {
                return Ok(());
            }
            let value = position_slice(values, value_buf, position).first().copied();
            let delta = position_slice(deltas, delta_buf, position).first().copied();
            self.sums.add(group, value.unwrap_or(0.0), delta.unwrap_or(0.0))?;
            self.seen.set(group)
        })
    }

    fn evaluate_intermediate(&self, selected: &[u32]) -> ExecResult<Vec<Block>> {
        let mut values = DoubleBlockBuilder::with_capacity(selected.len());
        let mut deltas = DoubleBlockBuilder::with_capacity(selected.len());
        let mut seen = BooleanBlockBuilder::with_capacity(selected.len());
        for group in selected.iter().map(|g| *g as usize) {
            values.append_value(self.sums.value(group));
            deltas.append_value(self.sums.delta(group));
            seen.append_value(self.seen.get(group));
        }
        Ok(vec![values.build()?, deltas.build()?, seen.build()?])
    }

    fn evaluate_final(&self, selected: &[u32], _ctx: &DriverContext) -> ExecResult<Block> {
        let mut out = DoubleBlockBuilder::with_capacity(selected.len());
        for group in selected.iter().map(|g| *g as usize) {
            if self.seen.get(group) {
                out.append_value(self.sums.value(group));
            } else {
                out.append_null();
            }
        }
        out.build()
    }

    fn intermediate_block_count(&self) -> usize {
        DOUBLE_INTERMEDIATE.len()
    }

    fn close(&mut self) {
        self.sums.close();
        self.seen.close();
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{aggregator, groups, two_stage};
    use crate::exec::agg::AggregatorMode;
    use crate::exec::block::{DoubleBlockBuilder, ElementType, LongBlockBuilder};
    use crate::exec::page::Page;
    use crate::runtime::driver_context::DriverContext;

    #[test]
    fn long_overflow_nulls_the_group_and_warns() {
        let ctx = DriverContext::new("sum");
        let mut b = LongBlockBuilder::with_capacity(3);
        b.append_value(i64::MAX).append_value(1).append_value(5);
        let page = Page::new(vec![b.build().expect("block")]).expect("page");
        let mut agg = aggregator(&ctx, "sum", &[ElementType::Long], AggregatorMode::Single, vec![0]);
        agg.process_page(&groups(&[0, 0, 1]), &page).expect("input");
        let out = agg.evaluate(&[0, 1, 2], &ctx).expect("final").remove(0);
        assert!(out.is_null(0));
        assert_eq!(out.as_longs().expect("longs").get(1), 5);
        assert!(out.is_null(2));
        assert_eq!(ctx.warning_sink().len(), 1);
    }

    #[test]
    fn overflow_survives_the_wire() {
        let ctx = DriverContext::new("sum");
        let mut b = LongBlockBuilder::with_capacity(2);
        b.append_value(i64::MAX).append_value(i64::MAX);
        let page = Page::new(vec![b.build().expect("block")]).expect("page");
        let out = two_stage(&ctx, "sum", &[ElementType::Long], &[(groups(&[0, 0]), page)], &[0]);
        assert!(out.is_null(0));
    }

    #[test]
    fn compensated_double_sum() {
        let ctx = DriverContext::new("sum");
        let mut b = DoubleBlockBuilder::with_capacity(11);
        b.append_value(1.0e16);
        for _ in 0..10 {
            b.append_value(1.0);
        }
        let page = Page::new(vec![b.build().expect("block")]).expect("page");
        let ids = groups(&[0; 11]);
        let first = page.slice(0, 6);
        let second = page.slice(6, 5);
        let out = two_stage(
            &ctx,
            "sum",
            &[ElementType::Double],
            &[(ids.slice(0, 6), first), (ids.slice(6, 5), second)],
            &[0],
        );
        assert_eq!(out.as_doubles().expect("doubles").get(0), 1.0e16 + 10.0);
    }
}
