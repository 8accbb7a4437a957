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
//! Single-threaded pipeline driver.
//!
//! Responsibilities:
//! - Moves pages from each operator to the next through one-page edge buffers.
//! - Propagates finishing once an upstream operator is done and its edge is drained.
//! - Checks the cancellation token between batches and closes every operator on
//!   cancellation, failure or completion.
//!
//! Key exported interfaces:
//! - Types: `Driver`, `DriverState`.

use std::sync::Arc;

use crate::common::error::{ExecError, ExecResult};
use crate::exec::page::Page;
use crate::exec::pipeline::operator::Operator;
use crate::exec::pipeline::operator_factory::OperatorFactory;
use crate::novacompute_logging::{debug, warn};
use crate::runtime::driver_context::DriverContext;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DriverState {
    Ready,
    Running,
    Finished,
    Cancelled(String),
    Failed(String),
}

pub struct Driver {
    ctx: DriverContext,
    operators: Vec<Box<dyn Operator>>,
    /// `edge_pages[i]` sits between operator `i` and operator `i + 1`.
    edge_pages: Vec<Option<Page>>,
    finishing_set: Vec<bool>,
    output: Vec<Page>,
    state: DriverState,
    closed: bool,
}

impl Driver {
    pub fn new(ctx: DriverContext, operators: Vec<Box<dyn Operator>>) -> ExecResult<Self> {
        if operators.is_empty() {
            return Err(ExecError::Internal("driver needs at least one operator".to_string()));
        }
        let edges = operators.len() - 1;
        debug!(
            target: "novacompute::pipeline",
            "driver created: {}",
            operators.iter().map(|op| op.name()).collect::<Vec<_>>().join(" -> ")
        );
        Ok(Self {
            ctx,
            finishing_set: vec![false; operators.len()],
            operators,
            edge_pages: vec![None; edges],
            output: Vec::new(),
            state: DriverState::Ready,
            closed: false,
        })
    }

    /// Instantiate one operator per factory. Operators created before a failing
    /// factory are closed before the error is returned.
    pub fn from_factories(
        ctx: DriverContext,
        factories: &[Arc<dyn OperatorFactory>],
    ) -> ExecResult<Self> {
        let mut operators: Vec<Box<dyn Operator>> = Vec::with_capacity(factories.len());
        for factory in factories {
            match factory.create(&ctx) {
                Ok(op) => operators.push(op),
                Err(err) => {
                    for op in operators.iter_mut().rev() {
                        op.close();
                    }
                    return Err(err);
                }
            }
        }
        Self::new(ctx, operators)
    }

    pub fn state(&self) -> &DriverState {
        &self.state
    }

    pub fn context(&self) -> &DriverContext {
        &self.ctx
    }

    /// Run the chain to completion and return what the last operator produced.
    pub fn run(mut self) -> ExecResult<Vec<Page>> {
        self.state = DriverState::Running;
        match self.run_inner() {
            Ok(()) => {
                self.finish(DriverState::Finished);
                debug!(
                    target: "novacompute::pipeline",
                    pages = self.output.len(),
                    "driver finished"
                );
                Ok(std::mem::take(&mut self.output))
            }
            Err(err) => {
                let state = match &err {
                    ExecError::Cancelled(reason) => DriverState::Cancelled(reason.clone()),
                    other => DriverState::Failed(other.to_string()),
                };
                if err.is_fatal_for_query() {
                    warn!(target: "novacompute::pipeline", error = %err, "driver aborted");
                }
                self.finish(state);
                Err(err)
            }
        }
    }

    fn run_inner(&mut self) -> ExecResult<()> {
        loop {
            self.ctx.check_cancelled()?;
            if self.is_finished() {
                return Ok(());
            }
            let mut made_progress = false;
            self.drive_set_finishing(&mut made_progress)?;
            self.drive_dataflow(&mut made_progress)?;
            self.drain_sink(&mut made_progress)?;
            if !made_progress && !self.is_finished() {
                let stuck = self
                    .operators
                    .iter()
                    .find(|op| !op.is_finished())
                    .map(|op| op.name().to_string())
                    .unwrap_or_default();
                return Err(ExecError::Internal(format!(
                    "driver made no progress, first unfinished operator is [{stuck}]"
                )));
            }
        }
    }

    fn is_finished(&self) -> bool {
        self.operators
            .last()
            .is_none_or(|sink| sink.is_finished() && !sink.has_output())
    }

    fn drive_set_finishing(&mut self, made_progress: &mut bool) -> ExecResult<()> {
        for idx in 1..self.operators.len() {
            if self.finishing_set[idx] {
                continue;
            }
            let in_edge = idx - 1;
            if !self.operators[in_edge].is_finished() || self.edge_pages[in_edge].is_some() {
                continue;
            }
            self.operators[idx].set_finishing(&self.ctx)?;
            debug!(
                target: "novacompute::pipeline",
                "set_finishing: op_idx={} op_name={}",
                idx,
                self.operators[idx].name()
            );
            self.finishing_set[idx] = true;
            *made_progress = true;
        }
        Ok(())
    }

    /// Downstream edges first so that pages already in flight drain before new
    /// pages are pulled from upstream.
    fn drive_dataflow(&mut self, made_progress: &mut bool) -> ExecResult<()> {
        for edge in (0..self.edge_pages.len()).rev() {
            let downstream = edge + 1;
            if self.edge_pages[edge].is_some() && self.operators[downstream].need_input() {
                if let Some(page) = self.edge_pages[edge].take() {
                    self.ctx.check_cancelled()?;
                    self.operators[downstream].push_page(&self.ctx, page)?;
                    *made_progress = true;
                }
            }
            if self.edge_pages[edge].is_none() && self.operators[edge].has_output() {
                match self.operators[edge].pull_page(&self.ctx)? {
                    Some(page) => {
                        self.edge_pages[edge] = Some(page);
                        *made_progress = true;
                    }
                    None => *made_progress |= !self.operators[edge].has_output(),
                }
            }
        }
        Ok(())
    }

    fn drain_sink(&mut self, made_progress: &mut bool) -> ExecResult<()> {
        let Some(sink) = self.operators.last_mut() else {
            return Ok(());
        };
        while sink.has_output() {
            self.ctx.check_cancelled()?;
            match sink.pull_page(&self.ctx)? {
                Some(page) => self.output.push(page),
                None if sink.has_output() => break,
                None => {}
            }
            *made_progress = true;
        }
        Ok(())
    }

    fn finish(&mut self, state: DriverState) {
        self.state = state;
        self.close_operators();
    }

    fn close_operators(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        for page in self.edge_pages.iter_mut() {
            page.take();
        }
        for op in self.operators.iter_mut().rev() {
            op.close();
        }
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        self.close_operators();
    }
}
