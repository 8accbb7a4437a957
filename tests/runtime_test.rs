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
//! Configuration loading and the partial-state wire format.

mod common;

use common::*;
use novacompute::exec::agg::AggregatorMode;
use novacompute::exec::hash_table::GroupSpec;
use novacompute::exec::operators::{GroupingSpec, HashAggregationSpec};
use novacompute::exec::serde::{decode_pages, encode_pages};
use novacompute::novacompute_config::NovaComputeConfig;
use novacompute::{DriverContext, ElementType, Page};

#[test]
fn config_file_overrides_exec_defaults() {
    let config = TestConfig::new().expect("test config");
    config.init_logging();
    let loaded = config.load_config().expect("load");
    assert_eq!(loaded.exec.max_page_size, 2);
    assert_eq!(loaded.exec.max_warnings_per_evaluator, 3);
    assert_eq!(loaded.effective_log_filter(), "debug");
}

#[test]
fn invalid_exec_config_is_rejected() {
    assert!(NovaComputeConfig::parse("[exec]\nmax_page_size = 0\n").is_err());
    let defaults = NovaComputeConfig::parse("").expect("empty config");
    assert_eq!(defaults.exec.max_page_size, 4096);
    assert_eq!(defaults.exec.max_warnings_per_evaluator, 20);
}

#[test]
fn partial_state_survives_the_wire() {
    let ctx = DriverContext::new("partial_wire");
    let keyed = || GroupingSpec::Standard(vec![GroupSpec::new(0, ElementType::BytesRef)]);
    let initial = HashAggregationSpec::new(
        keyed(),
        vec![
            aggregator("values", &[ElementType::Long], AggregatorMode::Initial, vec![1]),
            aggregator("avg", &[ElementType::Long], AggregatorMode::Initial, vec![1]),
        ],
    );
    let input = page(vec![
        strings(&[Some("x"), Some("y"), Some("x"), None]),
        multi_longs(&[&[1, 2], &[], &[2, 5], &[7]]),
    ]);
    let partial = assert_ok!(aggregate(&ctx, initial, vec![input]));
    let shipped = assert_ok!(decode_pages(&assert_ok!(encode_pages(&partial))));
    assert_eq!(shipped.len(), partial.len());
    for (before, after) in partial.iter().zip(&shipped) {
        assert_eq!(before.position_count(), after.position_count());
        assert_eq!(before.block_count(), after.block_count());
        for (a, b) in before.blocks().iter().zip(after.blocks()) {
            assert_eq!(a.element_type(), b.element_type());
            assert_eq!(a.array().as_ref(), b.array().as_ref());
        }
    }

    let fin = HashAggregationSpec::new(
        keyed(),
        vec![
            aggregator("values", &[ElementType::Long], AggregatorMode::Final, vec![1]),
            aggregator("avg", &[ElementType::Long], AggregatorMode::Final, vec![2, 3, 4]),
        ],
    );
    let out = assert_ok!(aggregate(&ctx, fin, shipped));
    let rows = out
        .iter()
        .flat_map(|page: &Page| {
            (0..page.position_count()).map(move |p| {
                let values = page.block(1).expect("values");
                let collected = if values.is_null(p) {
                    Vec::new()
                } else {
                    values
                        .as_longs()
                        .expect("longs")
                        .position_values(p)
                };
                (
                    string_at(page.block(0).expect("key"), p),
                    collected,
                    double_at(page.block(2).expect("avg"), p),
                )
            })
        })
        .collect::<Vec<_>>();
    assert_eq!(
        rows,
        vec![
            (Some("x".to_string()), vec![1, 2, 5], Some(2.5)),
            (Some("y".to_string()), vec![], None),
            (None, vec![7], Some(7.0)),
        ]
    );
}
