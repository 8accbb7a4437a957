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
//! Common utilities and helpers for integration tests.
#![allow(dead_code)]
#![allow(unused_imports)]

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use novacompute::exec::agg::{AggregatorMode, GroupingAggregatorFactory, resolve_supplier};
use novacompute::exec::block::{
    BytesRefBlockBuilder, DoubleBlockBuilder, IntBlockBuilder, LongBlockBuilder,
};
use novacompute::exec::operators::{HashAggregationSpec, OperatorSpec};
use novacompute::exec::pipeline::run_chain;
use novacompute::{Block, DriverContext, ElementType, ExecResult, Page};
use novacompute::{novacompute_config, novacompute_logging};

/// Test configuration for integration tests.
pub struct TestConfig {
    /// Temporary directory for test artifacts
    pub temp_dir: TempDir,
    /// Test config path
    pub config_path: PathBuf,
}

impl TestConfig {
    pub fn new() -> anyhow::Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let config_path = temp_dir.path().join("test_novacompute.toml");

        let config_content = r#"
log_level = "debug"

[exec]
max_page_size = 2
max_warnings_per_evaluator = 3
query_mem_limit_bytes = -1
"#;

        std::fs::write(&config_path, config_content)?;

        Ok(Self {
            temp_dir,
            config_path,
        })
    }

    pub fn init_logging(&self) {
        novacompute_logging::init_with_level("debug");
    }

    pub fn load_config(&self) -> anyhow::Result<novacompute_config::NovaComputeConfig> {
        novacompute_config::NovaComputeConfig::load_from_file(&self.config_path)
    }
}

impl Default for TestConfig {
    fn default() -> Self {
        Self::new().expect("Failed to create test config")
    }
}

pub fn longs(values: &[Option<i64>]) -> Block {
    let mut b = LongBlockBuilder::with_capacity(values.len());
    for v in values {
        b.append_option(*v);
    }
    b.build().expect("long block")
}

pub fn ints(values: &[Option<i32>]) -> Block {
    let mut b = IntBlockBuilder::with_capacity(values.len());
    for v in values {
        b.append_option(*v);
    }
    b.build().expect("int block")
}

pub fn doubles(values: &[f64]) -> Block {
    let mut b = DoubleBlockBuilder::with_capacity(values.len());
    for v in values {
        b.append_value(*v);
    }
    b.build().expect("double block")
}

pub fn strings(values: &[Option<&str>]) -> Block {
    let mut b = BytesRefBlockBuilder::with_capacity(values.len());
    for v in values {
        b.append_option(v.map(str::as_bytes));
    }
    b.build().expect("bytes block")
}

/// One position per slice; an empty slice is null.
pub fn multi_longs(positions: &[&[i64]]) -> Block {
    let mut b = LongBlockBuilder::with_capacity(positions.len());
    for values in positions {
        b.begin_position_entry();
        for v in *values {
            b.append_value(*v);
        }
        b.end_position_entry();
    }
    b.build().expect("multi-valued long block")
}

pub fn page(blocks: Vec<Block>) -> Page {
    Page::new(blocks).expect("page")
}

pub fn long_at(block: &Block, position: usize) -> Option<i64> {
    if block.is_null(position) {
        return None;
    }
    let values = block.as_longs().expect("long block");
    Some(values.get(block.first_value_index(position)))
}

pub fn int_at(block: &Block, position: usize) -> Option<i32> {
    if block.is_null(position) {
        return None;
    }
    let values = block.as_ints().expect("int block");
    Some(values.get(block.first_value_index(position)))
}

pub fn double_at(block: &Block, position: usize) -> Option<f64> {
    if block.is_null(position) {
        return None;
    }
    let values = block.as_doubles().expect("double block");
    Some(values.get(block.first_value_index(position)))
}

pub fn string_at(block: &Block, position: usize) -> Option<String> {
    if block.is_null(position) {
        return None;
    }
    let values = block.as_bytes_refs().expect("bytes block");
    Some(String::from_utf8_lossy(values.get(block.first_value_index(position))).into_owned())
}

pub fn aggregator(
    name: &str,
    input_types: &[ElementType],
    mode: AggregatorMode,
    channels: Vec<usize>,
) -> GroupingAggregatorFactory {
    resolve_supplier(name, input_types)
        .and_then(|s| s.grouping_aggregator_factory(mode, channels))
        .expect("aggregator factory")
}

/// Feed `pages` through a single hash aggregation.
pub fn aggregate(
    ctx: &DriverContext,
    spec: HashAggregationSpec,
    pages: Vec<Page>,
) -> ExecResult<Vec<Page>> {
    run_chain(
        ctx.clone(),
        vec![OperatorSpec::values(pages), OperatorSpec::hash_aggregation(spec)],
    )
}

pub fn total_positions(pages: &[Page]) -> usize {
    pages.iter().map(Page::position_count).sum()
}

/// Assert that a result is Ok and return the value.
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($result:expr, $message:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("{}: {:?}", $message, e),
        }
    };
}

/// Assert that a result is Err.
#[macro_export]
macro_rules! assert_err {
    ($result:expr) => {
        match $result {
            Ok(value) => panic!("Expected Err, got Ok: {:?}", value),
            Err(e) => e,
        }
    };
}
