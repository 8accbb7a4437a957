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
use super::hash::canonical_f64_bits;
use super::long_hash::LongHash;
use super::{BlockHash, GroupOrdinals, OrdinalsBuilder};
use crate::common::error::{ExecError, ExecResult};
use crate::exec::big_array::BigArrays;
use crate::exec::block::{
    Block, BlockBuilder, BooleanBlock, DoubleBlock, ElementType, IntBlock, LongBlock,
};
use crate::exec::page::Page;

/// Reads one fixed-width key column as `i64`.
pub(crate) enum LongKeys<'a> {
    Null,
    Boolean(BooleanBlock<'a>),
    Int(IntBlock<'a>),
    Long(LongBlock<'a>),
    Double(DoubleBlock<'a>),
}

impl<'a> LongKeys<'a> {
    pub(crate) fn new(block: &'a Block) -> ExecResult<Self> {
        Ok(match block.element_type() {
            ElementType::Null => LongKeys::Null,
            ElementType::Boolean => LongKeys::Boolean(block.as_booleans()?),
            ElementType::Int => LongKeys::Int(block.as_ints()?),
            ElementType::Long => LongKeys::Long(block.as_longs()?),
            ElementType::Double => LongKeys::Double(block.as_doubles()?),
            ElementType::BytesRef => {
                return Err(ExecError::Internal(
                    "BYTES_REF keys cannot be packed into a long".to_string(),
                ));
            }
        })
    }

    pub(crate) fn key(&self, value_index: usize) -> i64 {
        match self {
            LongKeys::Null => 0,
            LongKeys::Boolean(b) => i64::from(b.get(value_index)),
            LongKeys::Int(b) => i64::from(b.get(value_index)),
            LongKeys::Long(b) => b.get(value_index),
            LongKeys::Double(b) => canonical_f64_bits(b.get(value_index)) as i64,
        }
    }
}

/// Inverse of [`LongKeys::key`].
pub(crate) fn append_long_key(builder: &mut BlockBuilder, key: i64) {
    match builder {
        BlockBuilder::Null(n) => *n += 1,
        BlockBuilder::Boolean(b) => {
            b.append_value(key != 0);
        }
        BlockBuilder::Int(b) => {
            b.append_value(key as i32);
        }
        BlockBuilder::Long(b) => {
            b.append_value(key);
        }
        BlockBuilder::Double(b) => {
            b.append_value(f64::from_bits(key as u64));
        }
        BlockBuilder::BytesRef(b) => {
            b.append_value(&key.to_le_bytes());
        }
    }
}

/// Single fixed-width key column (boolean, int, long or double).
#[derive(Debug)]
pub struct LongBlockHash {
    channel: usize,
    element_type: ElementType,
    hash: LongHash,
    ordinals: GroupOrdinals,
}

impl LongBlockHash {
    pub fn new(channel: usize, element_type: ElementType, arrays: &BigArrays) -> ExecResult<Self> {
        if element_type == ElementType::BytesRef {
            return Err(ExecError::Internal(
                "LongBlockHash cannot group BYTES_REF keys".to_string(),
            ));
        }
        Ok(Self {
            channel,
            element_type,
            hash: LongHash::new(arrays)?,
            ordinals: GroupOrdinals::new(arrays)?,
        })
    }

    fn group_of(&mut self, key: i64) -> ExecResult<u32> {
        let (key_ordinal, inserted) = self.hash.add([key])?;
        self.ordinals.group_for_key(key_ordinal, inserted)
    }
}

impl BlockHash for LongBlockHash {
    fn add(&mut self, page: &Page) -> ExecResult<Block> {
        let block = page.block(self.channel)?;
        let keys = LongKeys::new(block)?;
        let mut out = OrdinalsBuilder::with_capacity(block.position_count());
        for p in 0..block.position_count() {
            let first = block.first_value_index(p);
            match block.value_count(p) {
                0 => out.append(self.ordinals.group_for_null()?),
                1 => out.append(self.group_of(keys.key(first))?),
                count => {
                    out.begin();
                    for i in first..first + count {
                        let group = self.group_of(keys.key(i))?;
                        out.push(group);
                    }
                    out.end();
                }
            }
        }
        out.build()
    }

    fn lookup(&self, page: &Page) -> ExecResult<Block> {
        let block = page.block(self.channel)?;
        let keys = LongKeys::new(block)?;
        let mut out = OrdinalsBuilder::with_capacity(block.position_count());
        for p in 0..block.position_count() {
            let first = block.first_value_index(p);
            out.begin();
            match block.value_count(p) {
                0 => {
                    if let Some(group) = self.ordinals.null_group() {
                        out.push(group);
                    }
                }
                count => {
                    for i in first..first + count {
                        if let Some(key_ordinal) = self.hash.find(&[keys.key(i)]) {
                            out.push(self.ordinals.find_key(key_ordinal));
                        }
                    }
                }
            }
            out.end();
        }
        out.build()
    }

    fn keys(&self) -> ExecResult<Vec<Block>> {
        let count = self.ordinals.count();
        let mut builder = BlockBuilder::new(self.element_type, count);
        for group in 0..count as u32 {
            match self.ordinals.key_of(group) {
                None => builder.append_null(),
                Some(key_ordinal) => append_long_key(&mut builder, self.hash.get(key_ordinal)[0]),
            }
        }
        Ok(vec![builder.build()?])
    }

    fn group_count(&self) -> usize {
        self.ordinals.count()
    }

    fn close(&mut self) {
        self.hash.close();
        self.ordinals.close();
    }
}
