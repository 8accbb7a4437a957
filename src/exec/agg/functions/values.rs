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
use std::mem::size_of;

use crate::common::error::{ExecError, ExecResult};
use crate::exec::agg::{
    AggregatorFunctionSupplier, GroupingAggregatorFunction, IntermediateStateDesc,
    for_each_group, input_block,
};
use crate::exec::big_array::ObjectArray;
use crate::exec::block::{Block, BlockBuilder, ElementType};
use crate::exec::hash_table::bytes_ref_hash::BytesRefHash;
use crate::exec::hash_table::hash::canonical_f64_bits;
use crate::exec::page::Page;
use crate::runtime::driver_context::DriverContext;

/// Distinct values per group in first-seen order, emitted as one multi-valued
/// position. The intermediate state has the same shape as the final value.
#[derive(Debug)]
pub struct ValuesSupplier {
    element_type: ElementType,
}

impl ValuesSupplier {
    pub fn new(element_type: ElementType) -> Self {
        Self { element_type }
    }
}

impl AggregatorFunctionSupplier for ValuesSupplier {
    fn name(&self) -> &str {
        "values"
    }

    fn intermediate_state_desc(&self) -> Vec<IntermediateStateDesc> {
        vec![IntermediateStateDesc::new("values", self.element_type)]
    }

    fn final_type(&self) -> ElementType {
        self.element_type
    }

    fn create_grouping(
        &self,
        ctx: &DriverContext,
        channels: &[usize],
    ) -> ExecResult<Box<dyn GroupingAggregatorFunction>> {
        let arrays = ctx.big_arrays("values");
        Ok(Box::new(ValuesGrouping {
            channel: channels.first().copied().ok_or_else(|| {
                ExecError::Internal("values reads exactly one channel".to_string())
            })?,
            element_type: self.element_type,
            entries: BytesRefHash::new(&arrays)?,
            per_group: arrays.new_object_array()?,
            scratch: Vec::new(),
        }))
    }
}

/// Entries are `group ordinal (4 bytes LE) ++ encoded value`, so one hash holds the
/// distinct sets of every group.
#[derive(Debug)]
struct ValuesGrouping {
    channel: usize,
    element_type: ElementType,
    entries: BytesRefHash,
    per_group: ObjectArray<Vec<u32>>,
    scratch: Vec<u8>,
}

const GROUP_PREFIX: usize = 4;

impl ValuesGrouping {
    fn encode_value(&mut self, block: &Block, index: usize) -> ExecResult<()> {
        match self.element_type {
            ElementType::Boolean => self.scratch.push(block.as_booleans()?.get(index) as u8),
            ElementType::Int => self
                .scratch
                .extend_from_slice(&block.as_ints()?.get(index).to_le_bytes()),
            ElementType::Long => self
                .scratch
                .extend_from_slice(&block.as_longs()?.get(index).to_le_bytes()),
            ElementType::Double => {
                let bits = canonical_f64_bits(block.as_doubles()?.get(index));
                self.scratch.extend_from_slice(&bits.to_le_bytes());
            }
            ElementType::BytesRef => self
                .scratch
                .extend_from_slice(block.as_bytes_refs()?.get(index)),
            ElementType::Null => {}
        }
        Ok(())
    }

    fn add_values(&mut self, groups: &Block, block: &Block) -> ExecResult<()> {
        if block.element_type() != self.element_type && block.element_type() != ElementType::Null
        {
            return Err(ExecError::Internal(format!(
                "values over {} got a {} block",
                self.element_type,
                block.element_type()
            )));
        }
        for_each_group(groups, |position, group| {
            let first = block.first_value_index(position);
            for index in first..first + block.value_count(position) {
                self.scratch.clear();
                self.scratch.extend_from_slice(&(group as u32).to_le_bytes());
                self.encode_value(block, index)?;
                let (entry, inserted) = self.entries.add(&self.scratch)?;
                if inserted {
                    self.per_group.account(size_of::<u32>() as isize)?;
                    self.per_group.get_mut(group)?.push(entry);
                }
            }
            Ok(())
        })
    }

    fn append_value(&self, builder: &mut BlockBuilder, entry: u32) -> ExecResult<()> {
        let value = &self.entries.get(entry)[GROUP_PREFIX..];
        let fixed = |n: usize| -> ExecResult<[u8; 8]> {
            let mut buf = [0u8; 8];
            buf.get_mut(..n)
                .filter(|_| value.len() == n)
                .ok_or_else(|| ExecError::Internal("corrupt values entry".to_string()))?
                .copy_from_slice(value);
            Ok(buf)
        };
        match builder {
            BlockBuilder::Boolean(b) => {
                b.append_value(value.first().is_some_and(|v| *v != 0));
            }
            BlockBuilder::Int(b) => {
                let buf = fixed(4)?;
                b.append_value(i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]));
            }
            BlockBuilder::Long(b) => {
                b.append_value(i64::from_le_bytes(fixed(8)?));
            }
            BlockBuilder::Double(b) => {
                b.append_value(f64::from_bits(u64::from_le_bytes(fixed(8)?)));
            }
            BlockBuilder::BytesRef(b) => {
                b.append_value(value);
            }
            BlockBuilder::Null(_) => {}
        }
        Ok(())
    }

    fn build(&self, selected: &[u32]) -> ExecResult<Block> {
        let mut builder = BlockBuilder::new(self.element_type, selected.len());
        for group in selected {
            let entries = self
                .per_group
                .get(*group as usize)
                .map(Vec::as_slice)
                .unwrap_or_default();
            match entries {
                [] => builder.append_null(),
                [single] => self.append_value(&mut builder, *single)?,
                many => {
                    builder.begin_position_entry();
                    for entry in many {
                        self.append_value(&mut builder, *entry)?;
                    }
                    builder.end_position_entry();
                }
            }
        }
        builder.build()
    }
}

impl GroupingAggregatorFunction for ValuesGrouping {
    fn add_raw_input(&mut self, groups: &Block, page: &Page) -> ExecResult<()> {
        let block = input_block(page, groups, self.channel)?;
        self.add_values(groups, block)
    }

    fn add_intermediate_input(&mut self, groups: &Block, page: &Page) -> ExecResult<()> {
        let block = input_block(page, groups, self.channel)?;
        self.add_values(groups, block)
    }

    fn evaluate_intermediate(&self, selected: &[u32]) -> ExecResult<Vec<Block>> {
        Ok(vec![self.build(selected)?])
    }

    fn evaluate_final(&self, selected: &[u32], _ctx: &DriverContext) -> ExecResult<Block> {
        self.build(selected)
    }

    fn intermediate_block_count(&self) -> usize {
        1
    }

    fn close(&mut self) {
        self.entries.close();
        self.per_group.close();
    }
}
