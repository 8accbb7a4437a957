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
//! Hash grouping: map grouping-key tuples to dense group ordinals.
//!
//! Every [`BlockHash`] guarantees that ordinals are assigned in first-seen order,
//! start at 0 with no gaps, and never change for a key once assigned. Null is a
//! key of its own. A multi-valued key position maps to every distinct ordinal its
//! values (or, for several key columns, their combinations) produce.

mod bytes_ref_block_hash;
pub(crate) mod bytes_ref_hash;
mod categorize;
pub(crate) mod hash;
mod long_block_hash;
pub(crate) mod long_hash;
mod no_keys;
mod packed_block_hash;
mod table;
mod time_series;

use std::fmt;

pub use self::bytes_ref_block_hash::BytesRefBlockHash;
pub use self::categorize::{CategorizeBlockHash, Categorizer, category_pattern};
pub use self::long_block_hash::LongBlockHash;
pub use self::no_keys::NoKeysBlockHash;
pub use self::packed_block_hash::PackedValuesBlockHash;
pub use self::time_series::TimeSeriesBlockHash;

use crate::common::error::{ExecError, ExecResult};
use crate::exec::big_array::{BigArrays, IntArray};
use crate::exec::block::{Block, ElementType, IntBlockBuilder};
use crate::exec::page::Page;
use crate::novacompute_logging::debug;
use crate::runtime::driver_context::DriverContext;

pub trait BlockHash: Send + fmt::Debug {
    /// Assign ordinals to the keys of every position, inserting unseen keys.
    /// Returns an INT block of ordinals with the page's position count.
    fn add(&mut self, page: &Page) -> ExecResult<Block>;

    /// Ordinals of already-seen keys; unseen keys yield null. Never inserts.
    fn lookup(&self, page: &Page) -> ExecResult<Block>;

    /// One block per key column, position `i` holding the key of ordinal `i`.
    fn keys(&self) -> ExecResult<Vec<Block>>;

    fn group_count(&self) -> usize;

    /// Release all key storage. The hash is unusable afterwards.
    fn close(&mut self);
}

/// One grouping key column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupSpec {
    pub channel: usize,
    pub element_type: ElementType,
    /// Group text by its category pattern instead of its exact value.
    pub categorize: bool,
}

impl GroupSpec {
    pub fn new(channel: usize, element_type: ElementType) -> Self {
        Self {
            channel,
            element_type,
            categorize: false,
        }
    }

    pub fn categorize(channel: usize) -> Self {
        Self {
            channel,
            element_type: ElementType::BytesRef,
            categorize: true,
        }
    }

    /// Element type of the key block this group produces.
    pub fn output_type(&self) -> ElementType {
        self.element_type
    }
}

/// Pick the implementation suited to the key columns.
pub fn build_block_hash(groups: &[GroupSpec], ctx: &DriverContext) -> ExecResult<Box<dyn BlockHash>> {
    let arrays = ctx.big_arrays("BlockHash");
    let (kind, hash): (&str, Box<dyn BlockHash>) = match groups {
        [] => ("NoKeysBlockHash", Box::new(NoKeysBlockHash::new())),
        [group] if group.categorize => {
            if group.element_type != ElementType::BytesRef {
                return Err(ExecError::invalid_input(format!(
                    "categorize expects BYTES_REF keys, got {}",
                    group.element_type
                )));
            }
            (
                "CategorizeBlockHash",
                Box::new(CategorizeBlockHash::new(group.channel, &arrays)?),
            )
        }
        [group] => match group.element_type {
            ElementType::BytesRef => (
                "BytesRefBlockHash",
                Box::new(BytesRefBlockHash::new(group.channel, &arrays)?),
            ),
            other => (
                "LongBlockHash",
                Box::new(LongBlockHash::new(group.channel, other, &arrays)?),
            ),
        },
        groups => {
            if groups.iter().any(|g| g.categorize) {
                return Err(ExecError::invalid_input(
                    "categorize must be the only grouping key",
                ));
            }
            (
                "PackedValuesBlockHash",
                Box::new(PackedValuesBlockHash::new(groups, &arrays)?),
            )
        }
    };
    debug!(target: "novacompute::hash", kind, keys = groups.len(), "built block hash");
    Ok(hash)
}

pub fn build_time_series_block_hash(
    tsid_channel: usize,
    bucket_channel: usize,
    ctx: &DriverContext,
) -> ExecResult<Box<dyn BlockHash>> {
    let arrays = ctx.big_arrays("TimeSeriesBlockHash");
    Ok(Box::new(TimeSeriesBlockHash::new(
        tsid_channel,
        bucket_channel,
        &arrays,
    )?))
}

/// Group ordinals over a key store that has no slot for null.
///
/// Key ordinals come from the store; group ordinals interleave the null group in
/// first-seen order.
#[derive(Debug)]
pub(crate) struct GroupOrdinals {
    key_to_group: IntArray,
    /// -1 marks the null group.
    group_to_key: IntArray,
    null_group: Option<u32>,
    count: u32,
}

impl GroupOrdinals {
    pub(crate) fn new(arrays: &BigArrays) -> ExecResult<Self> {
        Ok(Self {
            key_to_group: arrays.new_int_array(-1)?,
            group_to_key: arrays.new_int_array(-1)?,
            null_group: None,
            count: 0,
        })
    }

    fn next(&mut self) -> ExecResult<u32> {
        if self.count >= i32::MAX as u32 {
            return Err(ExecError::Internal("group ordinal overflow".to_string()));
        }
        let group = self.count;
        self.count += 1;
        Ok(group)
    }

    pub(crate) fn group_for_key(&mut self, key_ordinal: u32, inserted: bool) -> ExecResult<u32> {
        if !inserted {
            return Ok(self.key_to_group.get(key_ordinal as usize) as u32);
        }
        let group = self.next()?;
        self.key_to_group.set(key_ordinal as usize, group as i32)?;
        self.group_to_key.set(group as usize, key_ordinal as i32)?;
        Ok(group)
    }

    pub(crate) fn group_for_null(&mut self) -> ExecResult<u32> {
        if let Some(group) = self.null_group {
            return Ok(group);
        }
        let group = self.next()?;
        self.null_group = Some(group);
        Ok(group)
    }

    pub(crate) fn find_key(&self, key_ordinal: u32) -> u32 {
        self.key_to_group.get(key_ordinal as usize) as u32
    }

    pub(crate) fn null_group(&self) -> Option<u32> {
        self.null_group
    }

    /// Key ordinal of `group`, `None` for the null group.
    pub(crate) fn key_of(&self, group: u32) -> Option<u32> {
        u32::try_from(self.group_to_key.get(group as usize)).ok()
    }

    pub(crate) fn count(&self) -> usize {
        self.count as usize
    }

    pub(crate) fn close(&mut self) {
        self.key_to_group.close();
        self.group_to_key.close();
    }
}

/// Ordinal output; repeated ordinals inside one position are collapsed.
pub(crate) struct OrdinalsBuilder {
    builder: IntBlockBuilder,
    scratch: Vec<u32>,
}

impl OrdinalsBuilder {
    pub(crate) fn with_capacity(positions: usize) -> Self {
        Self {
            builder: IntBlockBuilder::with_capacity(positions),
            scratch: Vec::new(),
        }
    }

    pub(crate) fn append(&mut self, ordinal: u32) {
        self.builder.append_value(ordinal as i32);
    }

    pub(crate) fn append_null(&mut self) {
        self.builder.append_null();
    }

    /// Start collecting the ordinals of one multi-valued position.
    pub(crate) fn begin(&mut self) {
        self.scratch.clear();
    }

    pub(crate) fn push(&mut self, ordinal: u32) {
        if !self.scratch.contains(&ordinal) {
            self.scratch.push(ordinal);
        }
    }

    pub(crate) fn end(&mut self) {
        match self.scratch.as_slice() {
            [] => {
                self.builder.append_null();
            }
            [single] => {
                self.builder.append_value(*single as i32);
            }
            many => {
                self.builder.begin_position_entry();
                for ordinal in many {
                    self.builder.append_value(*ordinal as i32);
                }
                self.builder.end_position_entry();
            }
        }
    }

    pub(crate) fn build(self) -> ExecResult<Block> {
        self.builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn built(groups: &[GroupSpec]) -> String {
        let ctx = DriverContext::new("build_block_hash");
        let mut hash = build_block_hash(groups, &ctx).expect("block hash");
        let rendered = format!("{hash:?}");
        hash.close();
        rendered
    }

    #[test]
    fn implementation_follows_key_layout() {
        assert!(built(&[]).starts_with("NoKeysBlockHash"));
        assert!(built(&[GroupSpec::new(0, ElementType::Long)]).starts_with("LongBlockHash"));
        assert!(built(&[GroupSpec::new(0, ElementType::BytesRef)]).starts_with("BytesRefBlockHash"));
        assert!(built(&[GroupSpec::categorize(0)]).starts_with("CategorizeBlockHash"));
        assert!(
            built(&[
                GroupSpec::new(0, ElementType::Long),
                GroupSpec::new(1, ElementType::BytesRef),
            ])
            .starts_with("PackedValuesBlockHash")
        );
    }

    #[test]
    fn categorize_must_stand_alone() {
        let ctx = DriverContext::new("categorize_alone");
        let err = build_block_hash(
            &[GroupSpec::categorize(0), GroupSpec::new(1, ElementType::Long)],
            &ctx,
        )
        .expect_err("categorize with another key");
        assert!(matches!(err, ExecError::InvalidInput(_)), "{err:?}");
    }
}
