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
//! Three-stage time-series aggregation.
//!
//! A query such as `sum(rate(requests)), avg(latency) BY host, bucket` cannot be
//! split into a plain partial/final pair: the inner per-series function must see
//! every sample of a series in one place before the outer function combines series.
//! The plan therefore runs three hash aggregations:
//!
//! 1. grouped by `(tsid, bucket)` on every shard: inner functions and plain
//!    aggregates in INITIAL mode, plus one `values` collector per dimension so the
//!    dimension values survive the `(tsid, bucket)` grouping;
//! 2. grouped by `(tsid, bucket)` after merging shards: inner functions finish
//!    (FINAL) to one value per series and bucket, plain aggregates merge
//!    (INTERMEDIATE), collectors re-collect (SINGLE);
//! 3. grouped by `(dimensions..., bucket)`: outer functions run in SINGLE mode over
//!    the per-series values and plain aggregates finish (FINAL).

use std::sync::Arc;

use crate::common::error::ExecResult;
use crate::exec::agg::{
    AggregatorFunctionSupplier, AggregatorMode, GroupingAggregatorFactory, resolve_supplier,
};
use crate::exec::block::ElementType;
use crate::exec::hash_table::GroupSpec;
use crate::exec::operators::{GroupingSpec, HashAggregationSpec, OperatorSpec};
use crate::exec::page::Page;
use crate::exec::pipeline::run_chain;
use crate::exec::serde::{decode_pages, encode_pages};
use crate::novacompute_logging::{debug, info};
use crate::runtime::driver_context::DriverContext;

/// Channel of the series id in stage 1 and 2 output.
const TSID: usize = 0;
/// Channel of the time bucket in stage 1 and 2 output.
const BUCKET: usize = 1;

/// One aggregate function applied to raw input channels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AggregateCall {
    pub function: String,
    pub input_types: Vec<ElementType>,
    pub channels: Vec<usize>,
}

impl AggregateCall {
    pub fn new(function: impl Into<String>, input_types: Vec<ElementType>, channels: Vec<usize>) -> Self {
        Self {
            function: function.into(),
            input_types,
            channels,
        }
    }

    fn supplier(&self) -> ExecResult<Arc<dyn AggregatorFunctionSupplier>> {
        resolve_supplier(&self.function, &self.input_types)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TimeSeriesAggregate {
    /// `outer(rate(...))`: `rate` is evaluated per series and bucket, `outer`
    /// combines the per-series results.
    Rate { rate: AggregateCall, outer: String },
    /// An ordinary aggregate over the raw input.
    Plain(AggregateCall),
}

/// A user-requested grouping key other than the time bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dimension {
    pub channel: usize,
    pub element_type: ElementType,
}

#[derive(Clone, Debug)]
pub struct TimeSeriesAggregationPlan {
    pub tsid_channel: usize,
    pub bucket_channel: usize,
    pub dimensions: Vec<Dimension>,
    pub aggregates: Vec<TimeSeriesAggregate>,
    pub max_page_size: Option<usize>,
}

/// Per-aggregate resolved suppliers, shared by the three stages.
struct Resolved {
    inner: Arc<dyn AggregatorFunctionSupplier>,
    outer: Option<Arc<dyn AggregatorFunctionSupplier>>,
    raw_channels: Vec<usize>,
}

impl TimeSeriesAggregationPlan {
    fn resolve(&self) -> ExecResult<Vec<Resolved>> {
        let mut resolved = Vec::with_capacity(self.aggregates.len());
        for aggregate in &self.aggregates {
            let entry = match aggregate {
                TimeSeriesAggregate::Rate { rate, outer } => {
                    let inner = rate.supplier()?;
                    AggregatorMode::validate_sequence(
                        inner.name(),
                        &[AggregatorMode::Initial, AggregatorMode::Final],
                        inner.is_associative(),
                    )?;
                    let outer = resolve_supplier(outer, &[inner.final_type()])?;
                    AggregatorMode::validate_sequence(
                        outer.name(),
                        &[AggregatorMode::Single],
                        outer.is_associative(),
                    )?;
                    Resolved {
                        inner,
                        outer: Some(outer),
                        raw_channels: rate.channels.clone(),
                    }
                }
                TimeSeriesAggregate::Plain(call) => {
                    let inner = call.supplier()?;
                    AggregatorMode::validate_sequence(
                        inner.name(),
                        &[
                            AggregatorMode::Initial,
                            AggregatorMode::Intermediate,
                            AggregatorMode::Final,
                        ],
                        inner.is_associative(),
                    )?;
                    Resolved {
                        inner,
                        outer: None,
                        raw_channels: call.channels.clone(),
                    }
                }
            };
            resolved.push(entry);
        }
        Ok(resolved)
    }

    fn collectors(&self) -> ExecResult<Vec<Arc<dyn AggregatorFunctionSupplier>>> {
        self.dimensions
            .iter()
            .map(|d| resolve_supplier("values", &[d.element_type]))
            .collect()
    }

    fn finish_spec(&self, grouping: GroupingSpec, aggregators: Vec<GroupingAggregatorFactory>) -> HashAggregationSpec {
        let spec = HashAggregationSpec::new(grouping, aggregators);
        match self.max_page_size {
            Some(size) => spec.with_max_page_size(size),
            None => spec,
        }
    }

    /// The initial, intermediate and final hash aggregations, in that order.
    pub fn stages(&self) -> ExecResult<Vec<HashAggregationSpec>> {
        let resolved = self.resolve()?;
        let collectors = self.collectors()?;

        // Stage 1 reads raw pages.
        let mut initial = Vec::new();
        for r in &resolved {
            initial.push(
                Arc::clone(&r.inner)
                    .grouping_aggregator_factory(AggregatorMode::Initial, r.raw_channels.clone())?,
            );
        }
        for (collector, dimension) in collectors.iter().zip(&self.dimensions) {
            initial.push(
                Arc::clone(collector)
                    .grouping_aggregator_factory(AggregatorMode::Initial, vec![dimension.channel])?,
            );
        }

        // Stage 2 reads [tsid, bucket, intermediates..., collected dims...].
        let mut intermediate = Vec::new();
        let mut channel = BUCKET + 1;
        for r in &resolved {
            let width = r.inner.intermediate_state_desc().len();
            let channels = (channel..channel + width).collect::<Vec<_>>();
            let mode = if r.outer.is_some() {
                AggregatorMode::Final
            } else {
                AggregatorMode::Intermediate
            };
            intermediate.push(Arc::clone(&r.inner).grouping_aggregator_factory(mode, channels)?);
            channel += width;
        }
        for collector in &collectors {
            intermediate.push(
                Arc::clone(collector).grouping_aggregator_factory(AggregatorMode::Single, vec![channel])?,
            );
            channel += 1;
        }

        // Stage 3 reads [tsid, bucket, finals | intermediates..., dims...].
        let mut channel = BUCKET + 1;
        let mut fin = Vec::new();
        for r in &resolved {
            match &r.outer {
                Some(outer) => {
                    fin.push(
                        Arc::clone(outer)
                            .grouping_aggregator_factory(AggregatorMode::Single, vec![channel])?,
                    );
                    channel += 1;
                }
                None => {
                    let width = r.inner.intermediate_state_desc().len();
                    fin.push(Arc::clone(&r.inner).grouping_aggregator_factory(
                        AggregatorMode::Final,
                        (channel..channel + width).collect(),
                    )?);
                    channel += width;
                }
            }
        }
        let mut final_keys = Vec::with_capacity(self.dimensions.len() + 1);
        for dimension in &self.dimensions {
            final_keys.push(GroupSpec::new(channel, dimension.element_type));
            channel += 1;
        }
        final_keys.push(GroupSpec::new(BUCKET, ElementType::Long));

        let series = GroupingSpec::TimeSeries {
            tsid_channel: self.tsid_channel,
            bucket_channel: self.bucket_channel,
        };
        let merged_series = GroupingSpec::TimeSeries {
            tsid_channel: TSID,
            bucket_channel: BUCKET,
        };
        Ok(vec![
            self.finish_spec(series, initial),
            self.finish_spec(merged_series, intermediate),
            self.finish_spec(GroupingSpec::Standard(final_keys), fin),
        ])
    }

    /// Run all three stages in-process. Each shard runs stage 1 on its own driver
    /// and its partial pages cross the wire format before stage 2, as do the
    /// stage 2 results before stage 3.
    pub fn execute_local(&self, ctx: &DriverContext, shards: Vec<Vec<Page>>) -> ExecResult<Vec<Page>> {
        let mut stages = self.stages()?.into_iter();
        let (Some(initial), Some(intermediate), Some(fin)) =
            (stages.next(), stages.next(), stages.next())
        else {
            return Err("time-series plan must have three stages".into());
        };

        let shard_count = shards.len();
        let mut shipped = Vec::with_capacity(shard_count);
        for (shard, pages) in shards.into_iter().enumerate() {
            let partial = run_chain(
                ctx.clone(),
                vec![
                    OperatorSpec::values(pages),
                    OperatorSpec::hash_aggregation(initial.clone()),
                ],
            )?;
            let bytes = encode_pages(&partial)?;
            debug!(
                target: "novacompute::time_series",
                shard,
                pages = partial.len(),
                bytes = bytes.len(),
                "initial stage shipped"
            );
            shipped.push(bytes);
        }

        let mut merged = Vec::new();
        for bytes in &shipped {
            merged.extend(decode_pages(bytes)?);
        }
        let per_series = run_chain(
            ctx.clone(),
            vec![
                OperatorSpec::values(merged),
                OperatorSpec::hash_aggregation(intermediate),
            ],
        )?;
        let per_series = decode_pages(&encode_pages(&per_series)?)?;

        let out = run_chain(
            ctx.clone(),
            vec![OperatorSpec::values(per_series), OperatorSpec::hash_aggregation(fin)],
        )?;
        info!(
            target: "novacompute::time_series",
            shards = shard_count,
            rows = out.iter().map(Page::position_count).sum::<usize>(),
            "time-series aggregation finished"
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::ExecError;
    use crate::exec::block::{BytesRefBlockBuilder, LongBlockBuilder};

    fn rollup_plan(function: &str) -> TimeSeriesAggregationPlan {
        TimeSeriesAggregationPlan {
            tsid_channel: 0,
            bucket_channel: 1,
            dimensions: vec![],
            aggregates: vec![TimeSeriesAggregate::Rate {
                rate: AggregateCall::new(function, vec![ElementType::Long], vec![2]),
                outer: "sum".to_string(),
            }],
            max_page_size: None,
        }
    }

    #[test]
    fn stage_layouts() {
        let plan = TimeSeriesAggregationPlan {
            tsid_channel: 0,
            bucket_channel: 1,
            dimensions: vec![Dimension {
                channel: 3,
                element_type: ElementType::BytesRef,
            }],
            aggregates: vec![
                TimeSeriesAggregate::Rate {
                    rate: AggregateCall::new(
                        "rate",
                        vec![ElementType::Double, ElementType::Long],
                        vec![2, 4],
                    ),
                    outer: "sum".to_string(),
                },
                TimeSeriesAggregate::Plain(AggregateCall::new("max", vec![ElementType::Double], vec![2])),
            ],
            max_page_size: None,
        };
        let stages = plan.stages().expect("stages");
        use ElementType::*;
        assert_eq!(
            stages[0].output_types(),
            vec![BytesRef, Long, Long, Double, Double, Double, Boolean, BytesRef]
        );
        assert_eq!(
            stages[1].output_types(),
            vec![BytesRef, Long, Double, Double, Boolean, BytesRef]
        );
        assert_eq!(stages[2].output_types(), vec![BytesRef, Long, Double, Double]);
    }

    #[test]
    fn plain_rate_is_rejected() {
        let plan = TimeSeriesAggregationPlan {
            aggregates: vec![TimeSeriesAggregate::Plain(AggregateCall::new(
                "rate",
                vec![ElementType::Long, ElementType::Long],
                vec![2, 3],
            ))],
            ..rollup_plan("sum")
        };
        let err = plan.stages().expect_err("rate cannot merge");
        assert!(matches!(err, ExecError::IllegalAggregatorMode { .. }));
    }

    #[test]
    fn rollup_sums_per_series_values() {
        let ctx = DriverContext::new("rollup");
        let mut tsid = BytesRefBlockBuilder::with_capacity(2);
        let mut bucket = LongBlockBuilder::with_capacity(2);
        let mut value = LongBlockBuilder::with_capacity(2);
        for v in [1, 3] {
            tsid.append_value(b"A");
            bucket.append_value(0);
            value.append_value(v);
        }
        let page = Page::new(vec![
            tsid.build().expect("tsid"),
            bucket.build().expect("bucket"),
            value.build().expect("value"),
        ])
        .expect("page");
        let out = rollup_plan("sum")
            .execute_local(&ctx, vec![vec![page]])
            .expect("execute");
        assert_eq!(out.len(), 1);
        let page = &out[0];
        assert_eq!(page.position_count(), 1);
        assert_eq!(page.block(0).expect("bucket").as_longs().expect("longs").get(0), 0);
        assert_eq!(page.block(1).expect("sum").as_longs().expect("longs").get(0), 4);
    }
}
