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
//! Grouping aggregation functions and the protocol that stages them.
//!
//! A function is described by an [`AggregatorFunctionSupplier`]. Each instance
//! created from it keeps per-group state in memory-accounted arrays and speaks two
//! input shapes (raw values or intermediate state blocks) and two output shapes
//! (intermediate blocks or one final block). [`AggregatorMode`] picks which pair a
//! [`GroupingAggregator`] uses, so the same function can run in one pass or split
//! across stages with a wire hop in between.

pub mod functions;
mod mode;

use std::fmt;
use std::sync::Arc;

pub use self::functions::resolve_supplier;
pub use self::mode::AggregatorMode;

use crate::common::error::{ExecError, ExecResult};
use crate::exec::block::{Block, ElementType};
use crate::exec::page::Page;
use crate::novacompute_logging::debug;
use crate::runtime::driver_context::DriverContext;

/// Name and type of one intermediate state block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntermediateStateDesc {
    pub name: &'static str,
    pub element_type: ElementType,
}

impl IntermediateStateDesc {
    pub const fn new(name: &'static str, element_type: ElementType) -> Self {
        Self { name, element_type }
    }
}

pub trait AggregatorFunctionSupplier: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Whether partial states may be merged into another partial state.
    fn is_associative(&self) -> bool {
        true
    }

    /// Raw input channels read in SINGLE and INITIAL mode.
    fn raw_input_count(&self) -> usize {
        1
    }

    fn intermediate_state_desc(&self) -> Vec<IntermediateStateDesc>;

    fn final_type(&self) -> ElementType;

    /// Channels are raw input channels for SINGLE and INITIAL, and one channel per
    /// intermediate state block for INTERMEDIATE and FINAL.
    fn create_grouping(
        &self,
        ctx: &DriverContext,
        channels: &[usize],
    ) -> ExecResult<Box<dyn GroupingAggregatorFunction>>;
}

impl dyn AggregatorFunctionSupplier {
    pub fn grouping_aggregator_factory(
        self: Arc<Self>,
        mode: AggregatorMode,
        channels: Vec<usize>,
    ) -> ExecResult<GroupingAggregatorFactory> {
        GroupingAggregatorFactory::new(self, mode, channels)
    }
}

/// Per-group aggregation state.
///
/// `groups` is an INT block aligned with the page. A null group position is
/// skipped and a multi-valued one feeds the position into every listed group.
pub trait GroupingAggregatorFunction: Send + fmt::Debug {
    fn add_raw_input(&mut self, groups: &Block, page: &Page) -> ExecResult<()>;

    fn add_intermediate_input(&mut self, groups: &Block, page: &Page) -> ExecResult<()>;

    /// One block per intermediate state, position `i` for group `selected[i]`.
    fn evaluate_intermediate(&self, selected: &[u32]) -> ExecResult<Vec<Block>>;

    fn evaluate_final(&self, selected: &[u32], ctx: &DriverContext) -> ExecResult<Block>;

    fn intermediate_block_count(&self) -> usize;

    /// Release state. Idempotent.
    fn close(&mut self);
}

/// A supplier bound to a mode and its input channels.
#[derive(Clone, Debug)]
pub struct GroupingAggregatorFactory {
    supplier: Arc<dyn AggregatorFunctionSupplier>,
    mode: AggregatorMode,
    channels: Vec<usize>,
}

impl GroupingAggregatorFactory {
    pub fn new(
        supplier: Arc<dyn AggregatorFunctionSupplier>,
        mode: AggregatorMode,
        channels: Vec<usize>,
    ) -> ExecResult<Self> {
        if mode == AggregatorMode::Intermediate && !supplier.is_associative() {
            return Err(ExecError::illegal_mode(
                supplier.name(),
                "partial states cannot be merged into another partial state",
            ));
        }
        let (expected, what) = if mode.is_input_partial() {
            (supplier.intermediate_state_desc().len(), "intermediate blocks")
        } else {
            (supplier.raw_input_count(), "raw channels")
        };
        if channels.len() != expected {
            return Err(ExecError::Internal(format!(
                "[{}] in {} mode reads {} {}, got {} channels",
                supplier.name(),
                mode,
                expected,
                what,
                channels.len()
            )));
        }
        Ok(Self {
            supplier,
            mode,
            channels,
        })
    }

    pub fn mode(&self) -> AggregatorMode {
        self.mode
    }

    pub fn supplier(&self) -> &Arc<dyn AggregatorFunctionSupplier> {
        &self.supplier
    }

    /// Types of the blocks the aggregator emits in this mode.
    pub fn output_types(&self) -> Vec<ElementType> {
        if self.mode.is_output_partial() {
            self.supplier
                .intermediate_state_desc()
                .iter()
                .map(|d| d.element_type)
                .collect()
        } else {
            vec![self.supplier.final_type()]
        }
    }

    pub fn get(&self, ctx: &DriverContext) -> ExecResult<GroupingAggregator> {
        let function = self.supplier.create_grouping(ctx, &self.channels)?;
        debug!(
            target: "novacompute::agg",
            function = self.supplier.name(),
            mode = %self.mode,
            "created grouping aggregator"
        );
        Ok(GroupingAggregator {
            function,
            mode: self.mode,
        })
    }
}

/// A function instance driven in one mode.
#[derive(Debug)]
pub struct GroupingAggregator {
    function: Box<dyn GroupingAggregatorFunction>,
    mode: AggregatorMode,
}

impl GroupingAggregator {
    pub fn mode(&self) -> AggregatorMode {
        self.mode
    }

    pub fn process_page(&mut self, groups: &Block, page: &Page) -> ExecResult<()> {
        if self.mode.is_input_partial() {
            self.function.add_intermediate_input(groups, page)
        } else {
            self.function.add_raw_input(groups, page)
        }
    }

    pub fn evaluate(&self, selected: &[u32], ctx: &DriverContext) -> ExecResult<Vec<Block>> {
        if self.mode.is_output_partial() {
            self.function.evaluate_intermediate(selected)
        } else {
            Ok(vec![self.function.evaluate_final(selected, ctx)?])
        }
    }

    pub fn evaluate_block_count(&self) -> usize {
        if self.mode.is_output_partial() {
            self.function.intermediate_block_count()
        } else {
            1
        }
    }

    pub fn close(&mut self) {
        self.function.close();
    }
}

impl Drop for GroupingAggregator {
    fn drop(&mut self) {
        self.function.close();
    }
}

/// Visit every (position, group) pair of a group-id block.
pub(crate) fn for_each_group(
    groups: &Block,
    mut visit: impl FnMut(usize, usize) -> ExecResult<()>,
) -> ExecResult<()> {
    let ids = groups.as_ints()?;
    for position in 0..ids.position_count() {
        let first = ids.first_value_index(position);
        for index in first..first + ids.value_count(position) {
            let group = ids.get(index);
            if group < 0 {
                return Err(ExecError::Internal(format!("negative group id {group}")));
            }
            visit(position, group as usize)?;
        }
    }
    Ok(())
}

/// Block at `channel` of `page`, checked against the position count of `groups`.
pub(crate) fn input_block<'a>(
    page: &'a Page,
    groups: &Block,
    channel: usize,
) -> ExecResult<&'a Block> {
    let block = page.block(channel)?;
    if block.position_count() != groups.position_count() {
        return Err(ExecError::Internal(format!(
            "group ids cover {} positions but channel {} has {}",
            groups.position_count(),
            channel,
            block.position_count()
        )));
    }
    Ok(block)
}
