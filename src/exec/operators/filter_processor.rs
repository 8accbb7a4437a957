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
//! Expression filter processor for row-level predicate evaluation.
//!
//! Responsibilities:
//! - Keeps the positions whose predicate is true. Null, false and multi-valued
//!   predicate positions are dropped.
//!
//! Key exported interfaces:
//! - Types: `FilterProcessorFactory`.

use std::sync::Arc;

use crate::common::error::{ExecError, ExecResult};
use crate::exec::block::{Block, ElementType};
use crate::exec::expr::{Evaluator, EvaluatorFactory};
use crate::exec::page::Page;
use crate::exec::pipeline::operator::Operator;
use crate::exec::pipeline::operator_factory::OperatorFactory;
use crate::runtime::driver_context::DriverContext;

/// Factory for predicate processors that drop non-matching positions.
#[derive(Clone, Debug)]
pub struct FilterProcessorFactory {
    name: String,
    predicate: Arc<dyn EvaluatorFactory>,
}

impl FilterProcessorFactory {
    pub fn new(predicate: Arc<dyn EvaluatorFactory>) -> Self {
        Self {
            name: "FILTER".to_string(),
            predicate,
        }
    }
}

impl OperatorFactory for FilterProcessorFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn create(&self, ctx: &DriverContext) -> ExecResult<Box<dyn Operator>> {
        Ok(Box::new(FilterProcessorOperator {
            name: self.name.clone(),
            predicate: self.predicate.get(ctx)?,
            pending_output: None,
            finishing: false,
            finished: false,
        }))
    }
}

fn selected_positions(mask: &Block) -> ExecResult<Vec<u32>> {
    if mask.element_type() == ElementType::Null {
        return Ok(Vec::new());
    }
    let values = mask.as_booleans()?;
    Ok((0..mask.position_count())
        .filter(|p| values.value_count(*p) == 1 && values.get(values.first_value_index(*p)))
        .map(|p| p as u32)
        .collect())
}

struct FilterProcessorOperator {
    name: String,
    predicate: Box<dyn Evaluator>,
    pending_output: Option<Page>,
    finishing: bool,
    finished: bool,
}

impl Operator for FilterProcessorOperator {
    fn name(&self) -> &str {
        &self.name
    }

    fn need_input(&self) -> bool {
        !self.finishing && !self.finished && self.pending_output.is_none()
    }

    fn has_output(&self) -> bool {
        self.pending_output.is_some()
    }

    fn push_page(&mut self, _ctx: &DriverContext, page: Page) -> ExecResult<()> {
        if self.pending_output.is_some() {
            return Err(ExecError::Internal(
                "filter received input while output buffer is full".to_string(),
            ));
        }
        if page.is_empty() {
            return Ok(());
        }
        let mask = self.predicate.eval(&page)?;
        let positions = selected_positions(&mask)?;
        if positions.is_empty() {
            return Ok(());
        }
        self.pending_output = Some(if positions.len() == page.position_count() {
            page
        } else {
            page.filter(&positions)?
        });
        Ok(())
    }

    fn pull_page(&mut self, _ctx: &DriverContext) -> ExecResult<Option<Page>> {
        let out = self.pending_output.take();
        if self.finishing {
            self.finished = true;
        }
        Ok(out)
    }

    fn set_finishing(&mut self, _ctx: &DriverContext) -> ExecResult<()> {
        self.finishing = true;
        if self.pending_output.is_none() {
            self.finished = true;
        }
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    fn close(&mut self) {
        self.pending_output = None;
    }
}
