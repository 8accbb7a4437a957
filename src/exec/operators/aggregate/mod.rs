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
//! Hash-aggregation processor for grouped and global aggregation.
//!
//! Responsibilities:
//! - Assigns group ordinals to every input page through a `BlockHash` and feeds
//!   the ordinals and the page to each grouping aggregator.
//! - On finishing, emits the key blocks followed by every aggregator's blocks,
//!   split into pages of at most `max_page_size` positions.
//! - Releases hash and aggregator state once output is built, on close and on drop.
//!
//! Key exported interfaces:
//! - Types: `HashAggregationSpec`, `GroupingSpec`, `HashAggregationOperatorFactory`.

use std::collections::VecDeque;

use crate::common::error::{ExecError, ExecResult};
use crate::exec::agg::{GroupingAggregator, GroupingAggregatorFactory};
use crate::exec::block::ElementType;
use crate::exec::hash_table::{
    BlockHash, GroupSpec, build_block_hash, build_time_series_block_hash,
};
use crate::exec::page::Page;
use crate::exec::pipeline::operator::Operator;
use crate::exec::pipeline::operator_factory::OperatorFactory;
use crate::novacompute_logging::debug;
use crate::runtime::driver_context::DriverContext;

/// How input positions are mapped to groups.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GroupingSpec {
    /// Group by the listed key columns; no columns means one global group.
    Standard(Vec<GroupSpec>),
    /// Group by `(series id, time bucket)`.
    TimeSeries {
        tsid_channel: usize,
        bucket_channel: usize,
    },
}

impl GroupingSpec {
    fn build(&self, ctx: &DriverContext) -> ExecResult<Box<dyn BlockHash>> {
        match self {
            GroupingSpec::Standard(groups) => build_block_hash(groups, ctx),
            GroupingSpec::TimeSeries {
                tsid_channel,
                bucket_channel,
            } => build_time_series_block_hash(*tsid_channel, *bucket_channel, ctx),
        }
    }

    pub fn key_types(&self) -> Vec<ElementType> {
        match self {
            GroupingSpec::Standard(groups) => groups.iter().map(GroupSpec::output_type).collect(),
            GroupingSpec::TimeSeries { .. } => vec![ElementType::BytesRef, ElementType::Long],
        }
    }
}

#[derive(Clone, Debug)]
pub struct HashAggregationSpec {
    pub grouping: GroupingSpec,
    pub aggregators: Vec<GroupingAggregatorFactory>,
    /// Falls back to the driver context's page size when unset.
    pub max_page_size: Option<usize>,
}

impl HashAggregationSpec {
    pub fn new(grouping: GroupingSpec, aggregators: Vec<GroupingAggregatorFactory>) -> Self {
        Self {
            grouping,
            aggregators,
            max_page_size: None,
        }
    }

    pub fn with_max_page_size(mut self, max_page_size: usize) -> Self {
        self.max_page_size = Some(max_page_size.max(1));
        self
    }

    /// Element types of the output channels, keys first.
    pub fn output_types(&self) -> Vec<ElementType> {
        let mut types = self.grouping.key_types();
        for aggregator in &self.aggregators {
            types.extend(aggregator.output_types());
        }
        types
    }
}

/// Factory that constructs hash-aggregation processors.
#[derive(Clone, Debug)]
pub struct HashAggregationOperatorFactory {
    name: String,
    spec: HashAggregationSpec,
}

impl HashAggregationOperatorFactory {
    pub fn new(spec: HashAggregationSpec) -> Self {
        Self {
            name: "HashAggregation".to_string(),
            spec,
        }
    }

    pub fn spec(&self) -> &HashAggregationSpec {
        &self.spec
    }
}

impl OperatorFactory for HashAggregationOperatorFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn create(&self, ctx: &DriverContext) -> ExecResult<Box<dyn Operator>> {
        Ok(Box::new(HashAggregationOperator::new(
            self.name.clone(),
            &self.spec,
            ctx,
        )?))
    }
}

pub struct HashAggregationOperator {
    name: String,
    hash: Box<dyn BlockHash>,
    aggregators: Vec<GroupingAggregator>,
    max_page_size: usize,
    pending_output: VecDeque<Page>,
    input_pages: usize,
    finishing: bool,
    closed: bool,
}

impl HashAggregationOperator {
    pub fn new(name: String, spec: &HashAggregationSpec, ctx: &DriverContext) -> ExecResult<Self> {
        let hash = spec.grouping.build(ctx)?;
        let aggregators = spec
            .aggregators
            .iter()
            .map(|factory| factory.get(ctx))
            .collect::<ExecResult<Vec<_>>>()?;
        debug!(
            target: "novacompute::operator",
            name = %name,
            aggregators = aggregators.len(),
            "hash aggregation created"
        );
        Ok(Self {
            name,
            hash,
            aggregators,
            max_page_size: spec.max_page_size.unwrap_or_else(|| ctx.max_page_size()),
            pending_output: VecDeque::new(),
            input_pages: 0,
            finishing: false,
            closed: false,
        })
    }

    pub fn group_count(&self) -> usize {
        self.hash.group_count()
    }

    fn build_output(&mut self, ctx: &DriverContext) -> ExecResult<()> {
        let group_count = self.hash.group_count();
        if group_count == 0 {
            return Ok(());
        }
        let selected = (0..group_count as u32).collect::<Vec<_>>();
        let mut blocks = self.hash.keys()?;
        for aggregator in &self.aggregators {
            let evaluated = aggregator.evaluate(&selected, ctx)?;
            if evaluated.len() != aggregator.evaluate_block_count() {
                return Err(ExecError::Internal(format!(
                    "aggregator in {} mode produced {} blocks, expected {}",
                    aggregator.mode(),
                    evaluated.len(),
                    aggregator.evaluate_block_count()
                )));
            }
            blocks.extend(evaluated);
        }
        let page = Page::with_position_count(group_count, blocks)?;
        let mut offset = 0;
        while offset < group_count {
            let len = self.max_page_size.min(group_count - offset);
            self.pending_output.push_back(page.slice(offset, len));
            offset += len;
        }
        debug!(
            target: "novacompute::operator",
            name = %self.name,
            input_pages = self.input_pages,
            groups = group_count,
            output_pages = self.pending_output.len(),
            "hash aggregation finished"
        );
        Ok(())
    }

    fn release_state(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.hash.close();
        for aggregator in self.aggregators.iter_mut() {
            aggregator.close();
        }
        self.aggregators.clear();
    }
}

impl Operator for HashAggregationOperator {
    fn name(&self) -> &str {
        &self.name
    }

    fn need_input(&self) -> bool {
        !self.finishing
    }

    fn has_output(&self) -> bool {
        !self.pending_output.is_empty()
    }

    fn push_page(&mut self, ctx: &DriverContext, page: Page) -> ExecResult<()> {
        ctx.check_cancelled()?;
        if self.finishing {
            return Err(ExecError::Internal(format!(
                "{} received input after finishing",
                self.name
            )));
        }
        self.input_pages += 1;
        let groups = self.hash.add(&page)?;
        for aggregator in self.aggregators.iter_mut() {
            aggregator.process_page(&groups, &page)?;
        }
        Ok(())
    }

    fn pull_page(&mut self, _ctx: &DriverContext) -> ExecResult<Option<Page>> {
        Ok(self.pending_output.pop_front())
    }

    fn set_finishing(&mut self, ctx: &DriverContext) -> ExecResult<()> {
        if self.finishing {
            return Ok(());
        }
        self.finishing = true;
        ctx.check_cancelled()?;
        self.build_output(ctx)?;
        self.release_state();
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.finishing && self.pending_output.is_empty()
    }

    fn close(&mut self) {
        self.pending_output.clear();
        self.release_state();
    }
}

impl Drop for HashAggregationOperator {
    fn drop(&mut self) {
        self.release_state();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::agg::{AggregatorMode, resolve_supplier};
    use crate::exec::block::LongBlockBuilder;
    use crate::runtime::driver_context::CancellationToken;
    use crate::runtime::mem_tracker::MemTracker;

    fn sum_factory(mode: AggregatorMode, channels: Vec<usize>) -> GroupingAggregatorFactory {
        resolve_supplier("sum", &[ElementType::Long])
            .expect("sum")
            .grouping_aggregator_factory(mode, channels)
            .expect("factory")
    }

    fn page(keys: &[i64], values: &[i64]) -> Page {
        let mut k = LongBlockBuilder::with_capacity(keys.len());
        let mut v = LongBlockBuilder::with_capacity(values.len());
        for (key, value) in keys.iter().zip(values) {
            k.append_value(*key);
            v.append_value(*value);
        }
        Page::new(vec![k.build().expect("keys"), v.build().expect("values")]).expect("page")
    }

    #[test]
    fn global_aggregation_emits_one_row_without_input() {
        let ctx = DriverContext::new("agg");
        let spec = HashAggregationSpec::new(
            GroupingSpec::Standard(vec![]),
            vec![sum_factory(AggregatorMode::Single, vec![1])],
        );
        let mut op = HashAggregationOperator::new("agg".to_string(), &spec, &ctx).expect("op");
        op.set_finishing(&ctx).expect("finish");
        let out = op.pull_page(&ctx).expect("pull").expect("one page");
        assert_eq!(out.position_count(), 1);
        assert!(out.block(0).expect("sum").is_null(0));
        assert!(op.is_finished());
    }

    #[test]
    fn output_is_split_by_page_size() {
        let ctx = DriverContext::new("agg");
        let spec = HashAggregationSpec::new(
            GroupingSpec::Standard(vec![GroupSpec::new(0, ElementType::Long)]),
            vec![sum_factory(AggregatorMode::Single, vec![1])],
        )
        .with_max_page_size(2);
        let mut op = HashAggregationOperator::new("agg".to_string(), &spec, &ctx).expect("op");
        op.push_page(&ctx, page(&[1, 2, 3, 1, 4], &[10, 20, 30, 40, 50]))
            .expect("push");
        op.set_finishing(&ctx).expect("finish");
        let mut sizes = Vec::new();
        let mut sums = Vec::new();
        while let Some(out) = op.pull_page(&ctx).expect("pull") {
            sizes.push(out.position_count());
            let block = out.block(1).expect("sum");
            let view = block.as_longs().expect("longs");
            sums.extend((0..out.position_count()).map(|p| view.get(p)));
        }
        assert_eq!(sizes, vec![2, 2]);
        assert_eq!(sums, vec![50, 20, 30, 50]);
    }

    #[test]
    fn cancellation_stops_input_and_close_releases_memory() {
        let tracker = MemTracker::new_root("query");
        let token = CancellationToken::new();
        let ctx = DriverContext::with_mem_tracker(tracker.clone()).with_cancellation(token.clone());
        let spec = HashAggregationSpec::new(
            GroupingSpec::Standard(vec![GroupSpec::new(0, ElementType::Long)]),
            vec![sum_factory(AggregatorMode::Initial, vec![1])],
        );
        let mut op = HashAggregationOperator::new("agg".to_string(), &spec, &ctx).expect("op");
        op.push_page(&ctx, page(&[1, 2], &[1, 2])).expect("push");
        assert!(tracker.current() > 0);
        token.cancel("test");
        let err = op.push_page(&ctx, page(&[3], &[3])).expect_err("cancelled");
        assert!(matches!(err, ExecError::Cancelled(_)));
        op.close();
        assert_eq!(tracker.current(), 0);
    }
}
