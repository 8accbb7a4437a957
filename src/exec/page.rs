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
use std::sync::Arc;

use arrow::array::{RecordBatch, RecordBatchOptions};
use arrow::datatypes::{Field, Schema};

use crate::common::error::{ExecError, ExecResult};
use crate::exec::block::Block;

/// An ordered set of blocks sharing one position count. Immutable once built;
/// every transformation returns a new page that may alias the input blocks.
#[derive(Clone, Debug)]
pub struct Page {
    blocks: Vec<Block>,
    position_count: usize,
}

impl Page {
    pub fn new(blocks: Vec<Block>) -> ExecResult<Self> {
        let position_count = blocks
            .first()
            .map(|b| b.position_count())
            .ok_or_else(|| {
                ExecError::invalid_input("page needs at least one block or an explicit position count")
            })?;
        Self::with_position_count(position_count, blocks)
    }

    pub fn with_position_count(position_count: usize, blocks: Vec<Block>) -> ExecResult<Self> {
        for (idx, block) in blocks.iter().enumerate() {
            if block.position_count() != position_count {
                return Err(ExecError::invalid_input(format!(
                    "block {} has {} positions, page has {}",
                    idx,
                    block.position_count(),
                    position_count
                )));
            }
        }
        Ok(Self {
            blocks,
            position_count,
        })
    }

    pub fn position_count(&self) -> usize {
        self.position_count
    }

    pub fn is_empty(&self) -> bool {
        self.position_count == 0
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, channel: usize) -> ExecResult<&Block> {
        self.blocks.get(channel).ok_or_else(|| {
            ExecError::Internal(format!(
                "channel {} out of range (page has {} blocks)",
                channel,
                self.blocks.len()
            ))
        })
    }

    pub fn append_block(&self, block: Block) -> ExecResult<Page> {
        self.append_blocks(vec![block])
    }

    pub fn append_blocks(&self, blocks: Vec<Block>) -> ExecResult<Page> {
        let mut all = self.blocks.clone();
        all.extend(blocks);
        Self::with_position_count(self.position_count, all)
    }

    pub fn project(&self, channels: &[usize]) -> ExecResult<Page> {
        let blocks = channels
            .iter()
            .map(|c| self.block(*c).cloned())
            .collect::<ExecResult<Vec<_>>>()?;
        Self::with_position_count(self.position_count, blocks)
    }

    pub fn filter(&self, positions: &[u32]) -> ExecResult<Page> {
        let blocks = self
            .blocks
            .iter()
            .map(|b| b.filter(positions))
            .collect::<ExecResult<Vec<_>>>()?;
        Self::with_position_count(positions.len(), blocks)
    }

    pub fn slice(&self, offset: usize, length: usize) -> Page {
        Self {
            blocks: self.blocks.iter().map(|b| b.slice(offset, length)).collect(),
            position_count: length,
        }
    }

    pub fn estimated_bytes(&self) -> usize {
        self.blocks.iter().map(Block::estimated_bytes).sum()
    }

    pub fn to_record_batch(&self) -> ExecResult<RecordBatch> {
        let fields = self
            .blocks
            .iter()
            .enumerate()
            .map(|(idx, b)| Field::new(format!("c{idx}"), b.array().data_type().clone(), true))
            .collect::<Vec<_>>();
        let options = RecordBatchOptions::new().with_row_count(Some(self.position_count));
        let columns = self.blocks.iter().map(|b| Arc::clone(b.array())).collect();
        Ok(RecordBatch::try_new_with_options(
            Arc::new(Schema::new(fields)),
            columns,
            &options,
        )?)
    }

    pub fn from_record_batch(batch: &RecordBatch) -> ExecResult<Page> {
        let blocks = batch
            .columns()
            .iter()
            .map(|c| Block::from_array(Arc::clone(c)))
            .collect::<ExecResult<Vec<_>>>()?;
        Self::with_position_count(batch.num_rows(), blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::block::{IntBlockBuilder, LongBlockBuilder};

    fn longs(values: &[i64]) -> Block {
        let mut b = LongBlockBuilder::with_capacity(values.len());
        for v in values {
            b.append_value(*v);
        }
        b.build().expect("block")
    }

    #[test]
    fn rejects_mismatched_position_counts() {
        let err = Page::new(vec![longs(&[1, 2]), longs(&[1])]).expect_err("mismatch");
        assert!(err.to_string().contains("block 1 has 1 positions"), "err={err}");
    }

    #[test]
    fn append_and_project_alias_blocks() {
        let page = Page::new(vec![longs(&[1, 2, 3])]).expect("page");
        let mut ints = IntBlockBuilder::with_capacity(3);
        ints.append_value(4).append_null().append_value(6);
        let wider = page.append_block(ints.build().expect("ints")).expect("append");
        assert_eq!(wider.block_count(), 2);
        assert_eq!(page.block_count(), 1);
        let projected = wider.project(&[1]).expect("project");
        assert!(projected.block(0).expect("block").is_null(1));
    }

    #[test]
    fn zero_block_page_keeps_position_count_through_record_batch() {
        let page = Page::with_position_count(5, vec![]).expect("page");
        let batch = page.to_record_batch().expect("batch");
        assert_eq!(batch.num_rows(), 5);
        let back = Page::from_record_batch(&batch).expect("page");
        assert_eq!(back.position_count(), 5);
    }
}
