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
//! Block builders. Values and nulls are appended in position order and `build`
//! consumes the builder, so a block is finalized exactly once.

use std::marker::PhantomData;
use std::sync::Arc;

use arrow::array::{ArrayRef, BinaryBuilder, BooleanArray, ListArray, PrimitiveArray, UInt32Array};
use arrow::buffer::{NullBuffer, OffsetBuffer};
use arrow::datatypes::{ArrowPrimitiveType, DataType, Field, Float64Type, Int32Type, Int64Type};

use super::{Block, ElementType};
use crate::common::error::{ExecError, ExecResult};

/// Per-position value counts shared by all typed builders.
#[derive(Debug, Default)]
struct PositionLayout {
    lengths: Vec<usize>,
    entry_open: bool,
    multi_valued: bool,
}

impl PositionLayout {
    fn with_capacity(positions: usize) -> Self {
        Self {
            lengths: Vec::with_capacity(positions),
            entry_open: false,
            multi_valued: false,
        }
    }

    fn on_value(&mut self) {
        if self.entry_open {
            if let Some(last) = self.lengths.last_mut() {
                *last += 1;
                if *last > 1 {
                    self.multi_valued = true;
                }
            }
        } else {
            self.lengths.push(1);
        }
    }

    fn on_null(&mut self) {
        self.lengths.push(0);
    }

    fn begin(&mut self) {
        self.lengths.push(0);
        self.entry_open = true;
    }

    fn end(&mut self) {
        self.entry_open = false;
    }

    fn has_nulls(&self) -> bool {
        self.lengths.iter().any(|l| *l == 0)
    }

    /// Scatter the appended non-null `values` into their final position layout.
    fn assemble(self, values: ArrayRef, element_type: ElementType) -> ExecResult<Block> {
        if self.entry_open {
            return Err(ExecError::Internal(
                "block built while a position entry is still open".to_string(),
            ));
        }
        if self.multi_valued {
            let nulls = self
                .has_nulls()
                .then(|| NullBuffer::from(self.lengths.iter().map(|l| *l > 0).collect::<Vec<_>>()));
            let offsets = OffsetBuffer::<i32>::from_lengths(self.lengths.iter().copied());
            let field = Arc::new(Field::new("item", element_type.data_type(), false));
            let list = ListArray::try_new(field, offsets, values, nulls)?;
            return Block::from_array(Arc::new(list));
        }
        if !self.has_nulls() {
            return Block::from_array(values);
        }
        let mut cursor = 0u32;
        let indices = self
            .lengths
            .iter()
            .map(|len| {
                if *len == 0 {
                    None
                } else {
                    cursor += 1;
                    Some(cursor - 1)
                }
            })
            .collect::<UInt32Array>();
        let scattered = arrow::compute::take(values.as_ref(), &indices, None)?;
        Block::from_array(scattered)
    }
}

macro_rules! layout_methods {
    () => {
        pub fn append_null(&mut self) -> &mut Self {
            self.layout.on_null();
            self
        }

        /// Start a position that may hold several values. A position closed with no
        /// values is null.
        pub fn begin_position_entry(&mut self) -> &mut Self {
            self.layout.begin();
            self
        }

        pub fn end_position_entry(&mut self) -> &mut Self {
            self.layout.end();
            self
        }

        pub fn position_count(&self) -> usize {
            self.layout.lengths.len()
        }
    };
}

#[derive(Debug)]
pub struct PrimitiveBlockBuilder<T: ArrowPrimitiveType> {
    layout: PositionLayout,
    values: Vec<T::Native>,
    element_type: ElementType,
    _marker: PhantomData<T>,
}

pub type IntBlockBuilder = PrimitiveBlockBuilder<Int32Type>;
pub type LongBlockBuilder = PrimitiveBlockBuilder<Int64Type>;
pub type DoubleBlockBuilder = PrimitiveBlockBuilder<Float64Type>;

impl<T: ArrowPrimitiveType> PrimitiveBlockBuilder<T> {
    pub fn with_capacity(positions: usize) -> Self {
        let element_type = ElementType::from_data_type(&T::DATA_TYPE).unwrap_or(ElementType::Null);
        Self {
            layout: PositionLayout::with_capacity(positions),
            values: Vec::with_capacity(positions),
            element_type,
            _marker: PhantomData,
        }
    }

    pub fn append_value(&mut self, value: T::Native) -> &mut Self {
        self.values.push(value);
        self.layout.on_value();
        self
    }

    pub fn append_option(&mut self, value: Option<T::Native>) -> &mut Self {
        match value {
            Some(v) => self.append_value(v),
            None => self.append_null(),
        }
    }

    layout_methods!();

    pub fn build(self) -> ExecResult<Block> {
        if self.element_type == ElementType::Null {
            return Err(ExecError::Internal(format!(
                "no block element type for {:?}",
                T::DATA_TYPE
            )));
        }
        let values = Arc::new(PrimitiveArray::<T>::from_iter_values(self.values)) as ArrayRef;
        self.layout.assemble(values, self.element_type)
    }
}

#[derive(Debug)]
pub struct BooleanBlockBuilder {
    layout: PositionLayout,
    values: Vec<bool>,
}

impl BooleanBlockBuilder {
    pub fn with_capacity(positions: usize) -> Self {
        Self {
            layout: PositionLayout::with_capacity(positions),
            values: Vec::with_capacity(positions),
        }
    }

    pub fn append_value(&mut self, value: bool) -> &mut Self {
        self.values.push(value);
        self.layout.on_value();
        self
    }

    pub fn append_option(&mut self, value: Option<bool>) -> &mut Self {
        match value {
            Some(v) => self.append_value(v),
            None => self.append_null(),
        }
    }

    layout_methods!();

    pub fn build(self) -> ExecResult<Block> {
        let values = Arc::new(BooleanArray::from(self.values)) as ArrayRef;
        self.layout.assemble(values, ElementType::Boolean)
    }
}

#[derive(Debug)]
pub struct BytesRefBlockBuilder {
    layout: PositionLayout,
    values: BinaryBuilder,
}

impl BytesRefBlockBuilder {
    pub fn with_capacity(positions: usize) -> Self {
        Self {
            layout: PositionLayout::with_capacity(positions),
            values: BinaryBuilder::with_capacity(positions, positions * 16),
        }
    }

    pub fn append_value(&mut self, value: &[u8]) -> &mut Self {
        self.values.append_value(value);
        self.layout.on_value();
        self
    }

    pub fn append_option(&mut self, value: Option<&[u8]>) -> &mut Self {
        match value {
            Some(v) => self.append_value(v),
            None => self.append_null(),
        }
    }

    layout_methods!();

    pub fn build(mut self) -> ExecResult<Block> {
        let values = Arc::new(self.values.finish()) as ArrayRef;
        self.layout.assemble(values, ElementType::BytesRef)
    }
}

/// Builder for a block whose element type is only known at runtime.
#[derive(Debug)]
pub enum BlockBuilder {
    Null(usize),
    Boolean(BooleanBlockBuilder),
    Int(IntBlockBuilder),
    Long(LongBlockBuilder),
    Double(DoubleBlockBuilder),
    BytesRef(BytesRefBlockBuilder),
}

impl BlockBuilder {
    pub fn new(element_type: ElementType, positions: usize) -> Self {
        match element_type {
            ElementType::Null => BlockBuilder::Null(0),
            ElementType::Boolean => {
                BlockBuilder::Boolean(BooleanBlockBuilder::with_capacity(positions))
            }
            ElementType::Int => BlockBuilder::Int(IntBlockBuilder::with_capacity(positions)),
            ElementType::Long => BlockBuilder::Long(LongBlockBuilder::with_capacity(positions)),
            ElementType::Double => {
                BlockBuilder::Double(DoubleBlockBuilder::with_capacity(positions))
            }
            ElementType::BytesRef => {
                BlockBuilder::BytesRef(BytesRefBlockBuilder::with_capacity(positions))
            }
        }
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            BlockBuilder::Null(_) => ElementType::Null,
            BlockBuilder::Boolean(_) => ElementType::Boolean,
            BlockBuilder::Int(_) => ElementType::Int,
            BlockBuilder::Long(_) => ElementType::Long,
            BlockBuilder::Double(_) => ElementType::Double,
            BlockBuilder::BytesRef(_) => ElementType::BytesRef,
        }
    }

    pub fn append_null(&mut self) {
        match self {
            BlockBuilder::Null(n) => *n += 1,
            BlockBuilder::Boolean(b) => {
                b.append_null();
            }
            BlockBuilder::Int(b) => {
                b.append_null();
            }
            BlockBuilder::Long(b) => {
                b.append_null();
            }
            BlockBuilder::Double(b) => {
                b.append_null();
            }
            BlockBuilder::BytesRef(b) => {
                b.append_null();
            }
        }
    }

    pub fn begin_position_entry(&mut self) {
        match self {
            BlockBuilder::Null(n) => *n += 1,
            BlockBuilder::Boolean(b) => {
                b.begin_position_entry();
            }
            BlockBuilder::Int(b) => {
                b.begin_position_entry();
            }
            BlockBuilder::Long(b) => {
                b.begin_position_entry();
            }
            BlockBuilder::Double(b) => {
                b.begin_position_entry();
            }
            BlockBuilder::BytesRef(b) => {
                b.begin_position_entry();
            }
        }
    }

    pub fn end_position_entry(&mut self) {
        match self {
            BlockBuilder::Null(_) => {}
            BlockBuilder::Boolean(b) => {
                b.end_position_entry();
            }
            BlockBuilder::Int(b) => {
                b.end_position_entry();
            }
            BlockBuilder::Long(b) => {
                b.end_position_entry();
            }
            BlockBuilder::Double(b) => {
                b.end_position_entry();
            }
            BlockBuilder::BytesRef(b) => {
                b.end_position_entry();
            }
        }
    }

    /// Append the value at `value_index` of `source` to the current position.
    pub fn copy_value_from(&mut self, source: &Block, value_index: usize) -> ExecResult<()> {
        match self {
            BlockBuilder::Null(_) => {}
            BlockBuilder::Boolean(b) => {
                b.append_value(source.as_booleans()?.get(value_index));
            }
            BlockBuilder::Int(b) => {
                b.append_value(source.as_ints()?.get(value_index));
            }
            BlockBuilder::Long(b) => {
                b.append_value(source.as_longs()?.get(value_index));
            }
            BlockBuilder::Double(b) => {
                b.append_value(source.as_doubles()?.get(value_index));
            }
            BlockBuilder::BytesRef(b) => {
                b.append_value(source.as_bytes_refs()?.get(value_index));
            }
        }
        Ok(())
    }

    /// Append every value of `position` of `source` as one position.
    pub fn copy_position_from(&mut self, source: &Block, position: usize) -> ExecResult<()> {
        let count = source.value_count(position);
        if count == 0 {
            self.append_null();
            return Ok(());
        }
        let first = source.first_value_index(position);
        if count == 1 {
            return self.copy_value_from(source, first);
        }
        self.begin_position_entry();
        for index in first..first + count {
            self.copy_value_from(source, index)?;
        }
        self.end_position_entry();
        Ok(())
    }

    pub fn build(self) -> ExecResult<Block> {
        match self {
            BlockBuilder::Null(n) => Ok(Block::constant_null(ElementType::Null, n)),
            BlockBuilder::Boolean(b) => b.build(),
            BlockBuilder::Int(b) => b.build(),
            BlockBuilder::Long(b) => b.build(),
            BlockBuilder::Double(b) => b.build(),
            BlockBuilder::BytesRef(b) => b.build(),
        }
    }
}

pub(crate) fn list_field(element_type: ElementType) -> DataType {
    DataType::List(Arc::new(Field::new("item", element_type.data_type(), false)))
}
