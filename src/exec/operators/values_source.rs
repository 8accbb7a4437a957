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
//! Values source operator.
//!
//! Responsibilities:
//! - Emits a fixed list of pages, in order, as the head of a driver chain.
//! - Slices pages larger than the context's page size limit.
//!
//! Key exported interfaces:
//! - Types: `ValuesSourceFactory`.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::common::error::{ExecError, ExecResult};
use crate::exec::page::Page;
use crate::exec::pipeline::operator::Operator;
use crate::exec::pipeline::operator_factory::OperatorFactory;
use crate::runtime::driver_context::DriverContext;

/// Factory for sources that replay in-memory pages.
#[derive(Clone, Debug)]
pub struct ValuesSourceFactory {
    name: String,
    pages: Arc<Vec<Page>>,
}

impl ValuesSourceFactory {
    pub fn new(pages: Vec<Page>) -> Self {
        Self {
            name: "ValuesSource".to_string(),
            pages: Arc::new(pages),
        }
    }
}

impl OperatorFactory for ValuesSourceFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn create(&self, ctx: &DriverContext) -> ExecResult<Box<dyn Operator>> {
        let limit = ctx.max_page_size();
        let mut pending = VecDeque::new();
        for page in self.pages.iter() {
            let mut offset = 0;
            while offset < page.position_count() {
                let len = limit.min(page.position_count() - offset);
                pending.push_back(page.slice(offset, len));
                offset += len;
            }
        }
        Ok(Box::new(ValuesSourceOperator {
            name: self.name.clone(),
            pending,
        }))
    }

    fn is_source(&self) -> bool {
        true
    }
}

struct ValuesSourceOperator {
    name: String,
    pending: VecDeque<Page>,
}

impl Operator for ValuesSourceOperator {
    fn name(&self) -> &str {
        &self.name
    }

    fn need_input(&self) -> bool {
        false
    }

    fn has_output(&self) -> bool {
        !self.pending.is_empty()
    }

    fn push_page(&mut self, _ctx: &DriverContext, _page: Page) -> ExecResult<()> {
        Err(ExecError::Internal(
            "values source operator does not accept input".to_string(),
        ))
    }

    fn pull_page(&mut self, _ctx: &DriverContext) -> ExecResult<Option<Page>> {
        Ok(self.pending.pop_front())
    }

    fn set_finishing(&mut self, _ctx: &DriverContext) -> ExecResult<()> {
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.pending.is_empty()
    }

    fn close(&mut self) {
        self.pending.clear();
    }
}
