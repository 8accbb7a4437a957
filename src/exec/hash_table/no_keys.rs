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
use arrow::array::Int32Array;

use super::{BlockHash, OrdinalsBuilder};
use crate::common::error::ExecResult;
use crate::exec::block::{Block, vector_block};
use crate::exec::page::Page;

/// Global aggregation: every position belongs to group 0, which always exists.
#[derive(Debug, Default)]
pub struct NoKeysBlockHash;

impl NoKeysBlockHash {
    pub fn new() -> Self {
        Self
    }
}

impl BlockHash for NoKeysBlockHash {
    fn add(&mut self, page: &Page) -> ExecResult<Block> {
        vector_block(Int32Array::from(vec![0; page.position_count()]))
    }

    fn lookup(&self, page: &Page) -> ExecResult<Block> {
        let mut out = OrdinalsBuilder::with_capacity(page.position_count());
        for _ in 0..page.position_count() {
            out.append(0);
        }
        out.build()
    }

    fn keys(&self) -> ExecResult<Vec<Block>> {
        Ok(Vec::new())
    }

    fn group_count(&self) -> usize {
        1
    }

    fn close(&mut self) {}
}
