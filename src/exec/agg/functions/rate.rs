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
//! `rate(counter, @timestamp)`: per-second increase of a monotonic counter.
//!
//! State per group is a list of segments. A raw sample is a segment whose first
//! and last points coincide; an intermediate state is one segment summarizing a
//! contiguous run of samples by its end points and the counter resets inside it.
//! Merging sorts segments by start time and detects resets at the seams, which is
//! only sound when the segments do not interleave. That holds when every partial
//! state of a group comes from one series, and is why merging partial states into
//! another partial state is rejected.

use std::mem::size_of;

use super::value_as_f64;
use crate::common::error::ExecResult;
use crate::exec::agg::{
    AggregatorFunctionSupplier, GroupingAggregatorFunction, IntermediateStateDesc,
    for_each_group, input_block,
};
use crate::exec::big_array::ObjectArray;
use crate::exec::block::{Block, DoubleBlockBuilder, ElementType, LongBlockBuilder};
use crate::exec::page::Page;
use crate::runtime::driver_context::DriverContext;

const INTERMEDIATE: [IntermediateStateDesc; 3] = [
    IntermediateStateDesc::new("timestamps", ElementType::Long),
    IntermediateStateDesc::new("values", ElementType::Double),
    IntermediateStateDesc::new("resets", ElementType::Double),
];

const MILLIS_PER_SECOND: f64 = 1000.0;

/// Raw channels are `[counter value, timestamp millis]`.
#[derive(Debug)]
pub struct RateSupplier {
    input: ElementType,
}

impl RateSupplier {
    pub fn new(input: ElementType) -> Self {
        Self { input }
    }
}

impl AggregatorFunctionSupplier for RateSupplier {
    fn name(&self) -> &str {
        "rate"
    }

    fn is_associative(&self) -> bool {
        false
    }

    fn raw_input_count(&self) -> usize {
        2
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
        debug_assert!(matches!(self.input, ElementType::Long | ElementType::Double));
        Ok(Box::new(RateGrouping {
            channels: channels.to_vec(),
            segments: ctx.big_arrays("rate").new_object_array()?,
        }))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Point {
    timestamp: i64,
    value: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Segment {
    first: Point,
    last: Point,
    resets: f64,
}

/// Segments of one group reduced to their overall end points and total resets.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Summary {
    first: Point,
    last: Point,
    resets: f64,
    samples: usize,
}

fn summarize(segments: &[Segment]) -> Option<Summary> {
    let mut sorted = segments.to_vec();
    sorted.sort_by_key(|s| (s.first.timestamp, s.last.timestamp));
    let (head, tail) = sorted.split_first()?;
    let mut summary = Summary {
        first: head.first,
        last: head.last,
        resets: head.resets,
        samples: if head.first == head.last { 1 } else { 2 },
    };
    for segment in tail {
        if segment.first.value < summary.last.value {
            summary.resets += summary.last.value;
        }
        summary.resets += segment.resets;
        summary.samples += if segment.first == segment.last { 1 } else { 2 };
        summary.last = segment.last;
    }
    Some(summary)
}

impl Summary {
    fn rate(&self) -> Option<f64> {
        let elapsed = self.last.timestamp - self.first.timestamp;
        if self.samples < 2 || elapsed <= 0 {
            return None;
        }
        let increase = self.last.value - self.first.value + self.resets;
        Some(increase * MILLIS_PER_SECOND / elapsed as f64)
    }
}

#[derive(Debug)]
struct RateGrouping {
    channels: Vec<usize>,
    segments: ObjectArray<Vec<Segment>>,
}

impl RateGrouping {
    fn push(&mut self, group: usize, segment: Segment) -> ExecResult<()> {
        self.segments.account(size_of::<Segment>() as isize)?;
        self.segments.get_mut(group)?.push(segment);
        Ok(())
    }

    fn summary(&self, group: u32) -> Option<Summary> {
        self.segments
            .get(group as usize)
            .and_then(|segments| summarize(segments))
    }
}

impl GroupingAggregatorFunction for RateGrouping {
    fn add_raw_input(&mut self, groups: &Block, page: &Page) -> ExecResult<()> {
        let values = input_block(page, groups, self.channels[0])?;
        let timestamps = input_block(page, groups, self.channels[1])?;
        let ts = timestamps.as_longs()?;
        for_each_group(groups, |position, group| {
            if values.value_count(position) != 1 || timestamps.value_count(position) != 1 {
                return Ok(());
            }
            let point = Point {
                timestamp: ts.get(timestamps.first_value_index(position)),
                value: value_as_f64(values, values.first_value_index(position))?,
            };
            self.push(
                group,
                Segment {
                    first: point,
                    last: point,
                    resets: 0.0,
                },
            )
        })
    }

    fn add_intermediate_input(&mut self, groups: &Block, page: &Page) -> ExecResult<()> {
        let timestamps = input_block(page, groups, self.channels[0])?;
        let values = input_block(page, groups, self.channels[1])?;
        let resets = input_block(page, groups, self.channels[2])?.as_doubles()?;
        let (ts, vs) = (timestamps.as_longs()?, values.as_doubles()?);
        for_each_group(groups, |position, group| {
            let n = timestamps.value_count(position);
            if n == 0 || values.value_count(position) != n {
                return Ok(());
            }
            let (t0, v0) = (ts.first_value_index(position), vs.first_value_index(position));
            let first = Point {
                timestamp: ts.get(t0),
                value: vs.get(v0),
            };
            let last = Point {
                timestamp: ts.get(t0 + n - 1),
                value: vs.get(v0 + n - 1),
            };
            let resets = if resets.is_null(position) {
                0.0
            } else {
                resets.get(resets.first_value_index(position))
            };
            self.push(group, Segment { first, last, resets })
        })
    }

    fn evaluate_intermediate(&self, selected: &[u32]) -> ExecResult<Vec<Block>> {
        let mut timestamps = LongBlockBuilder::with_capacity(selected.len());
        let mut values = DoubleBlockBuilder::with_capacity(selected.len());
        let mut resets = DoubleBlockBuilder::with_capacity(selected.len());
        for group in selected {
            let Some(summary) = self.summary(*group) else {
                timestamps.append_null();
                values.append_null();
                resets.append_null();
                continue;
            };
            if summary.samples == 1 {
                timestamps.append_value(summary.first.timestamp);
                values.append_value(summary.first.value);
            } else {
                timestamps
                    .begin_position_entry()
                    .append_value(summary.first.timestamp)
                    .append_value(summary.last.timestamp)
                    .end_position_entry();
                values
                    .begin_position_entry()
                    .append_value(summary.first.value)
                    .append_value(summary.last.value)
                    .end_position_entry();
            }
            resets.append_value(summary.resets);
        }
        Ok(vec![timestamps.build()?, values.build()?, resets.build()?])
    }

    fn evaluate_final(&self, selected: &[u32], _ctx: &DriverContext) -> ExecResult<Block> {
        let mut out = DoubleBlockBuilder::with_capacity(selected.len());
        for group in selected {
            out.append_option(self.summary(*group).and_then(|s| s.rate()));
        }
        out.build()
    }

    fn intermediate_block_count(&self) -> usize {
        INTERMEDIATE.len()
    }

    fn close(&mut self) {
        self.segments.close();
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{aggregator, groups};
    use super::*;
    use crate::exec::agg::AggregatorMode;

    fn samples(points: &[(i64, i64)]) -> Page {
        let mut values = LongBlockBuilder::with_capacity(points.len());
        let mut ts = LongBlockBuilder::with_capacity(points.len());
        for (t, v) in points {
            values.append_value(*v);
            ts.append_value(*t);
        }
        Page::new(vec![values.build().expect("values"), ts.build().expect("ts")]).expect("page")
    }

    fn final_rate(ctx: &DriverContext, mode: AggregatorMode, channels: Vec<usize>, pages: &[Page]) -> Block {
        let types = [ElementType::Long, ElementType::Long];
        let mut agg = aggregator(ctx, "rate", &types, mode, channels);
        for page in pages {
            agg.process_page(&groups(&vec![0; page.position_count()]), page)
                .expect("input");
        }
        agg.evaluate(&[0], ctx).expect("final").remove(0)
    }

    #[test]
    fn per_second_increase_with_reset() {
        let ctx = DriverContext::new("rate");
        // 10 -> 30, reset to 5, -> 15 over 30 seconds: increase 20 + 15 = 35.
        let page = samples(&[(20_000, 5), (0, 10), (10_000, 30), (30_000, 15)]);
        let out = final_rate(&ctx, AggregatorMode::Single, vec![0, 1], &[page]);
        let rate = out.as_doubles().expect("doubles").get(0);
        assert!((rate - 35.0 / 30.0).abs() < 1e-9);
    }

    #[test]
    fn single_sample_is_null() {
        let ctx = DriverContext::new("rate");
        let out = final_rate(&ctx, AggregatorMode::Single, vec![0, 1], &[samples(&[(0, 10)])]);
        assert!(out.is_null(0));
    }

    #[test]
    fn partial_states_keep_end_points_and_resets() {
        let ctx = DriverContext::new("rate");
        let types = [ElementType::Long, ElementType::Long];
        let mut initial = aggregator(&ctx, "rate", &types, AggregatorMode::Initial, vec![0, 1]);
        let page = samples(&[(0, 10), (10_000, 2), (20_000, 8)]);
        initial.process_page(&groups(&[0, 0, 0]), &page).expect("input");
        let state = initial.evaluate(&[0], &ctx).expect("intermediate");
        assert_eq!(state[0].as_longs().expect("ts").position_values(0), vec![0, 20_000]);
        assert_eq!(state[1].as_doubles().expect("values").position_values(0), vec![10.0, 8.0]);
        assert_eq!(state[2].as_doubles().expect("resets").get(0), 10.0);

        // A later partial for the same series starts below the previous end point.
        let later = samples(&[(30_000, 3), (40_000, 6)]);
        let mut second = aggregator(&ctx, "rate", &types, AggregatorMode::Initial, vec![0, 1]);
        second.process_page(&groups(&[0, 0]), &later).expect("input");
        let later_state = second.evaluate(&[0], &ctx).expect("intermediate");

        let mut fin = aggregator(&ctx, "rate", &types, AggregatorMode::Final, vec![0, 1, 2]);
        for state in [state, later_state] {
            fin.process_page(&groups(&[0]), &Page::new(state).expect("page"))
                .expect("merge");
        }
        let out = fin.evaluate(&[0], &ctx).expect("final").remove(0);
        // 10 -> 2 (reset 10) -> 8 -> 3 (reset 8) -> 6: increase -4 + 18 = 14 over 40s.
        let rate = out.as_doubles().expect("doubles").get(0);
        assert!((rate - 14.0 / 40.0).abs() < 1e-9);
    }
}
