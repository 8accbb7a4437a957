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
//! Execution operator module exports.
//!
//! Responsibilities:
//! - Defines `OperatorSpec`, the closed set of operators a driver chain is built from.
//! - Provides a stable import surface for operator construction.

mod aggregate;
mod eval_processor;
mod filter_processor;
mod values_source;

use std::sync::Arc;

pub use aggregate::{
    GroupingSpec, HashAggregationOperator, HashAggregationOperatorFactory, HashAggregationSpec,
};
pub use eval_processor::EvalProcessorFactory;
pub use filter_processor::FilterProcessorFactory;
pub use values_source::ValuesSourceFactory;

use crate::common::error::ExecResult;
use crate::exec::expr::EvaluatorFactory;
use crate::exec::page::Page;
use crate::exec::pipeline::operator::Operator;
use crate::exec::pipeline::operator_factory::OperatorFactory;
use crate::runtime::driver_context::DriverContext;

/// Plan-time description of one operator.
#[derive(Clone, Debug)]
pub enum OperatorSpec {
    Values(ValuesSourceFactory),
    Eval(EvalProcessorFactory),
    Filter(FilterProcessorFactory),
    HashAggregation(HashAggregationOperatorFactory),
}

impl OperatorSpec {
    pub fn values(pages: Vec<Page>) -> Self {
        OperatorSpec::Values(ValuesSourceFactory::new(pages))
    }

    pub fn eval(expressions: Vec<Arc<dyn EvaluatorFactory>>) -> Self {
        OperatorSpec::Eval(EvalProcessorFactory::new(expressions))
    }

    pub fn filter(predicate: Arc<dyn EvaluatorFactory>) -> Self {
        OperatorSpec::Filter(FilterProcessorFactory::new(predicate))
    }

    pub fn hash_aggregation(spec: HashAggregationSpec) -> Self {
        OperatorSpec::HashAggregation(HashAggregationOperatorFactory::new(spec))
    }

    fn factory(&self) -> &dyn OperatorFactory {
        match self {
            OperatorSpec::Values(f) => f,
            OperatorSpec::Eval(f) => f,
            OperatorSpec::Filter(f) => f,
            OperatorSpec::HashAggregation(f) => f,
        }
    }
}

impl OperatorFactory for OperatorSpec {
    fn name(&self) -> &str {
        self.factory().name()
    }

    fn create(&self, ctx: &DriverContext) -> ExecResult<Box<dyn Operator>> {
        self.factory().create(ctx)
    }

    fn is_source(&self) -> bool {
        self.factory().is_source()
    }
}
