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
//! Eval processor: appends one computed block per expression.
//!
//! Responsibilities:
//! - Evaluates expressions over each input page and appends the results as new
//!   channels after the existing ones, in expression order.
//!
//! Key exported interfaces:
//! - Types: `EvalProcessorFactory`.

use std::sync::Arc;

use crate::common::error::{ExecError, ExecResult};
use crate::exec::expr::{Evaluator, EvaluatorFactory};
use crate::exec::page::Page;
use crate::exec::pipeline::operator::Operator;
use crate::exec::pipeline::operator_factory::OperatorFactory;
use crate::runtime::driver_context::DriverContext;

#[derive(Clone, Debug)]
pub struct EvalProcessorFactory {
    name: String,
    expressions: Vec<Arc<dyn EvaluatorFactory>>,
}

impl EvalProcessorFactory {
    pub fn new(expressions: Vec<Arc<dyn EvaluatorFactory>>) -> Self {
        Self {
            name: "EVAL".to_string(),
            expressions,
        }
    }
}

impl OperatorFactory for EvalProcessorFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn create(&self, ctx: &DriverContext) -> ExecResult<Box<dyn Operator>> {
        let evaluators = self
            .expressions
            .iter()
            .map(|factory| factory.get(ctx))
            .collect::<ExecResult<Vec<_>>>()?;
        Ok(Box::new(EvalProcessorOperator {
            name: self.name.clone(),
            evaluators,
            pending_output: None,
            finishing: false,
            finished: false,
        }))
    }
}

struct EvalProcessorOperator {
    name: String,
    evaluators: Vec<Box<dyn Evaluator>>,
    pending_output: Option<Page>,
    finishing: bool,
    finished: bool,
}

impl Operator for EvalProcessorOperator {
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
                "eval received input while output buffer is full".to_string(),
            ));
        }
        let mut blocks = Vec::with_capacity(self.evaluators.len());
        for evaluator in self.evaluators.iter_mut() {
            blocks.push(evaluator.eval(&page)?);
        }
        self.pending_output = Some(page.append_blocks(blocks)?);
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
        self.evaluators.clear();
    }
}
