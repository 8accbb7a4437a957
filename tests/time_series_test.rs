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
//! Three-stage time-series aggregation over shards.

mod common;

use common::*;
use novacompute::exec::operators::{OperatorSpec, HashAggregationSpec};
use novacompute::exec::pipeline::run_chain;
use novacompute::exec::serde::{decode_pages, encode_pages};
use novacompute::exec::time_series::{
    AggregateCall, Dimension, TimeSeriesAggregate, TimeSeriesAggregationPlan,
};
use novacompute::{DriverContext, ElementType, ExecError, Page};

const TSID: usize = 0;
const BUCKET: usize = 1;
const VALUE: usize = 2;
const TIMESTAMP: usize = 3;
const HOST: usize = 4;

/// `(tsid, bucket, value, timestamp, host)` rows.
fn samples(rows: &[(&str, i64, f64, i64, &str)]) -> Page {
    page(vec![
        strings(&rows.iter().map(|r| Some(r.0)).collect::<Vec<_>>()),
        longs(&rows.iter().map(|r| Some(r.1)).collect::<Vec<_>>()),
        doubles(&rows.iter().map(|r| r.2).collect::<Vec<_>>()),
        longs(&rows.iter().map(|r| Some(r.3)).collect::<Vec<_>>()),
        strings(&rows.iter().map(|r| Some(r.4)).collect::<Vec<_>>()),
    ])
}

fn shards() -> Vec<Vec<Page>> {
    vec![
        vec![samples(&[
            ("a", 0, 0.0, 0, "h1"),
            ("b", 0, 100.0, 0, "h1"),
            ("a", 0, 10.0, 10_000, "h1"),
            ("b", 0, 110.0, 10_000, "h1"),
        ])],
        vec![samples(&[
            ("b", 0, 5.0, 20_000, "h1"),
            ("a", 0, 20.0, 20_000, "h1"),
            ("b", 0, 25.0, 30_000, "h1"),
            ("a", 0, 30.0, 30_000, "h1"),
            ("c", 0, 1.0, 0, "h2"),
        ])],
    ]
}

fn rate_plan(outer: &str, dimensions: Vec<Dimension>) -> TimeSeriesAggregationPlan {
    TimeSeriesAggregationPlan {
        tsid_channel: TSID,
        bucket_channel: BUCKET,
        dimensions,
        aggregates: vec![TimeSeriesAggregate::Rate {
            rate: AggregateCall::new(
                "rate",
                vec![ElementType::Double, ElementType::Long],
                vec![VALUE, TIMESTAMP],
            ),
            outer: outer.to_string(),
        }],
        max_page_size: None,
    }
}

fn run(ctx: &DriverContext, spec: HashAggregationSpec, pages: Vec<Page>) -> Vec<Page> {
    let pages = assert_ok!(decode_pages(&assert_ok!(encode_pages(&pages))));
    assert_ok!(run_chain(
        ctx.clone(),
        vec![OperatorSpec::values(pages), OperatorSpec::hash_aggregation(spec)],
    ))
}

#[test]
fn rate_is_computed_per_series_after_merging_shards() {
    let ctx = DriverContext::new("rate_per_series");
    let mut stages = assert_ok!(rate_plan("sum", vec![]).stages()).into_iter();
    let (initial, intermediate) = (stages.next().expect("initial"), stages.next().expect("merge"));

    let mut partials = Vec::new();
    for pages in shards() {
        partials.extend(run(&ctx, initial.clone(), pages));
    }
    let per_series = run(&ctx, intermediate, partials);

    let mut rates = Vec::new();
    for page in &per_series {
        for p in 0..page.position_count() {
            rates.push((
                string_at(page.block(0).expect("tsid"), p).expect("tsid"),
                long_at(page.block(1).expect("bucket"), p),
                double_at(page.block(2).expect("rate"), p),
            ));
        }
    }
    rates.sort_by(|x, y| x.0.cmp(&y.0));
    assert_eq!(rates.len(), 3);
    assert_eq!(rates[0].0, "a");
    assert_eq!(rates[0].1, Some(0));
    assert!((rates[0].2.expect("a rate") - 1.0).abs() < 1e-9);
    assert_eq!(rates[1].0, "b");
    assert!((rates[1].2.expect("b rate") - 35.0 / 30.0).abs() < 1e-9);
    // One sample has no rate.
    assert_eq!(rates[2], ("c".to_string(), Some(0), None));
}

#[test]
fn outer_function_combines_series_by_dimension() {
    let ctx = DriverContext::new("outer_by_dimension");
    let plan = rate_plan(
        "sum",
        vec![Dimension {
            channel: HOST,
            element_type: ElementType::BytesRef,
        }],
    );
    let out = assert_ok!(plan.execute_local(&ctx, shards()));
    let mut rows = Vec::new();
    for page in &out {
        for p in 0..page.position_count() {
            rows.push((
                string_at(page.block(0).expect("host"), p).expect("host"),
                long_at(page.block(1).expect("bucket"), p),
                double_at(page.block(2).expect("sum"), p),
            ));
        }
    }
    rows.sort_by(|x, y| x.0.cmp(&y.0));
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].0, "h1");
    assert!((rows[0].2.expect("h1 sum") - (1.0 + 35.0 / 30.0)).abs() < 1e-9);
    assert_eq!(rows[1], ("h2".to_string(), Some(0), None));
}

#[test]
fn rollup_of_per_series_sums() {
    let ctx = DriverContext::new("rollup");
    let plan = TimeSeriesAggregationPlan {
        tsid_channel: TSID,
        bucket_channel: BUCKET,
        dimensions: vec![],
        aggregates: vec![TimeSeriesAggregate::Rate {
            rate: AggregateCall::new("sum", vec![ElementType::Long], vec![2]),
            outer: "sum".to_string(),
        }],
        max_page_size: Some(1),
    };
    let input = page(vec![
        strings(&[Some("A"), Some("A")]),
        longs(&[Some(0), Some(0)]),
        longs(&[Some(1), Some(3)]),
    ]);
    let out = assert_ok!(plan.execute_local(&ctx, vec![vec![input]]));
    assert_eq!(total_positions(&out), 1);
    assert_eq!(long_at(out[0].block(0).expect("bucket"), 0), Some(0));
    assert_eq!(long_at(out[0].block(1).expect("sum"), 0), Some(4));
}

#[test]
fn rollup_of_per_series_value_counts() {
    let ctx = DriverContext::new("value_count_rollup");
    let plan = TimeSeriesAggregationPlan {
        tsid_channel: TSID,
        bucket_channel: BUCKET,
        dimensions: vec![],
        aggregates: vec![TimeSeriesAggregate::Rate {
            rate: AggregateCall::new("value_count", vec![ElementType::Long], vec![2]),
            outer: "sum".to_string(),
        }],
        max_page_size: None,
    };
    let input = page(vec![
        strings(&[Some("A"), Some("B"), Some("A")]),
        longs(&[Some(0), Some(0), Some(0)]),
        longs(&[Some(1), Some(2), Some(3)]),
    ]);
    let out = assert_ok!(plan.execute_local(&ctx, vec![vec![input]]));
    assert_eq!(total_positions(&out), 1);
    assert_eq!(long_at(out[0].block(1).expect("sum"), 0), Some(3));
}

#[test]
fn plain_aggregate_merges_through_intermediate() {
    let ctx = DriverContext::new("plain_through_intermediate");
    let plan = TimeSeriesAggregationPlan {
        tsid_channel: TSID,
        bucket_channel: BUCKET,
        dimensions: vec![],
        aggregates: vec![TimeSeriesAggregate::Plain(AggregateCall::new(
            "max",
            vec![ElementType::Double],
            vec![VALUE],
        ))],
        max_page_size: None,
    };
    let out = assert_ok!(plan.execute_local(&ctx, shards()));
    assert_eq!(total_positions(&out), 1);
    assert_eq!(double_at(out[0].block(1).expect("max"), 0), Some(110.0));
}

#[test]
fn rate_cannot_be_split_as_a_plain_aggregate() {
    let plan = TimeSeriesAggregationPlan {
        aggregates: vec![TimeSeriesAggregate::Plain(AggregateCall::new(
            "rate",
            vec![ElementType::Double, ElementType::Long],
            vec![VALUE, TIMESTAMP],
        ))],
        ..rate_plan("sum", vec![])
    };
    let err = assert_err!(plan.stages());
    assert!(matches!(err, ExecError::IllegalAggregatorMode { .. }), "{err:?}");
}

#[test]
fn null_series_key_is_rejected() {
    let ctx = DriverContext::new("null_series_key");
    let input = page(vec![
        strings(&[None]),
        longs(&[Some(0)]),
        doubles(&[1.0]),
        longs(&[Some(0)]),
        strings(&[Some("h1")]),
    ]);
    let err = assert_err!(rate_plan("sum", vec![]).execute_local(&ctx, vec![vec![input]]));
    assert!(matches!(err, ExecError::InvalidInput(_)), "{err:?}");
}
