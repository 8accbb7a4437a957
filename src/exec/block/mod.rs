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
//! Immutable columnar blocks.
//!
//! A [`Block`] wraps one Arrow array. Single-valued columns are flat arrays of the
//! element type; a column with at least one multi-valued position is a `List` array
//! whose child holds the values. Value indexes always address that flat values array,
//! so `first_value_index(p) .. first_value_index(p) + value_count(p)` are the values
//! of position `p`.

mod builder;

pub use builder::{
    BlockBuilder, BooleanBlockBuilder, BytesRefBlockBuilder, DoubleBlockBuilder,
    IntBlockBuilder, LongBlockBuilder, PrimitiveBlockBuilder,
};

use std::fmt;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BinaryArray, BooleanArray, Float64Array, Int32Array, Int64Array,
    PrimitiveArray, UInt32Array, new_null_array,
};
use arrow::datatypes::{ArrowPrimitiveType, DataType, Float64Type, Int32Type, Int64Type};

use crate::common::error::{ExecError, ExecResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementType {
    Null,
    Boolean,
    Int,
    Long,
    Double,
    BytesRef,
}

impl ElementType {
    pub fn data_type(&self) -> DataType {
        match self {
            ElementType::Null => DataType::Null,
            ElementType::Boolean => DataType::Boolean,
            ElementType::Int => DataType::Int32,
            ElementType::Long => DataType::Int64,
            ElementType::Double => DataType::Float64,
            ElementType::BytesRef => DataType::Binary,
        }
    }

    pub fn from_data_type(data_type: &DataType) -> Option<Self> {
        match data_type {
            DataType::Null => Some(ElementType::Null),
            DataType::Boolean => Some(ElementType::Boolean),
            DataType::Int32 => Some(ElementType::Int),
            DataType::Int64 => Some(ElementType::Long),
            DataType::Float64 => Some(ElementType::Double),
            DataType::Binary => Some(ElementType::BytesRef),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ElementType::Int | ElementType::Long | ElementType::Double
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            ElementType::Null => "NULL",
            ElementType::Boolean => "BOOLEAN",
            ElementType::Int => "INT",
            ElementType::Long => "LONG",
            ElementType::Double => "DOUBLE",
            ElementType::BytesRef => "BYTES_REF",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Columnar container for one logical column. Never mutated once built.
#[derive(Clone, Debug)]
pub struct Block {
    array: ArrayRef,
    element_type: ElementType,
    multi_valued: bool,
}

impl Block {
    /// Wrap an Arrow array, rejecting types outside the supported element types.
    pub fn from_array(array: ArrayRef) -> ExecResult<Self> {
        if let Some(element_type) = ElementType::from_data_type(array.data_type()) {
            return Ok(Self {
                array,
                element_type,
                multi_valued: false,
            });
        }
        if let DataType::List(field) = array.data_type() {
            let element_type = ElementType::from_data_type(field.data_type())
                .filter(|t| *t != ElementType::Null)
                .ok_or_else(|| {
                    ExecError::invalid_input(format!(
                        "unsupported multi-value element type {:?}",
                        field.data_type()
                    ))
                })?;
            return Ok(Self {
                array,
                element_type,
                multi_valued: true,
            });
        }
        Err(ExecError::invalid_input(format!(
            "unsupported block data type {:?}",
            array.data_type()
        )))
    }

    pub fn constant_null(element_type: ElementType, positions: usize) -> Self {
        Self {
            array: new_null_array(&element_type.data_type(), positions),
            element_type,
            multi_valued: false,
        }
    }

    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    pub fn array(&self) -> &ArrayRef {
        &self.array
    }

    pub fn into_array(self) -> ArrayRef {
        self.array
    }

    /// Number of positions (rows).
    pub fn position_count(&self) -> usize {
        self.array.len()
    }

    /// True when the backing storage can hold more than one value per position.
    /// A multi-valued block may still have only single-valued positions.
    pub fn may_have_multivalues(&self) -> bool {
        self.multi_valued
    }

    pub fn is_null(&self, position: usize) -> bool {
        self.value_count(position) == 0
    }

    pub fn value_count(&self, position: usize) -> usize {
        if self.element_type == ElementType::Null || self.array.is_null(position) {
            return 0;
        }
        if self.multi_valued {
            self.array.as_list::<i32>().value_length(position) as usize
        } else {
            1
        }
    }

    pub fn first_value_index(&self, position: usize) -> usize {
        if self.multi_valued {
            self.array.as_list::<i32>().value_offsets()[position] as usize
        } else {
            position
        }
    }

    pub fn total_value_count(&self) -> usize {
        (0..self.position_count())
            .map(|p| self.value_count(p))
            .sum()
    }

    pub fn null_count(&self) -> usize {
        (0..self.position_count())
            .filter(|p| self.is_null(*p))
            .count()
    }

    /// The flat array addressed by value indexes.
    pub fn values(&self) -> &ArrayRef {
        if self.multi_valued {
            self.array.as_list::<i32>().values()
        } else {
            &self.array
        }
    }

    /// Returns the null-free, single-valued view of this block, if it qualifies.
    pub fn as_vector(&self) -> Option<Vector<'_>> {
        if self.multi_valued || self.array.null_count() > 0 {
            return None;
        }
        match self.element_type {
            ElementType::Null => None,
            ElementType::Boolean => Some(Vector::Boolean(self.array.as_boolean())),
            ElementType::Int => Some(Vector::Int(self.array.as_primitive::<Int32Type>())),
            ElementType::Long => Some(Vector::Long(self.array.as_primitive::<Int64Type>())),
            ElementType::Double => Some(Vector::Double(self.array.as_primitive::<Float64Type>())),
            ElementType::BytesRef => Some(Vector::BytesRef(self.array.as_binary::<i32>())),
        }
    }

    /// Typed vector access for monomorphic kernels.
    pub fn as_primitive_vector<T: ArrowPrimitiveType>(&self) -> Option<&PrimitiveArray<T>> {
        if self.multi_valued || self.array.null_count() > 0 {
            return None;
        }
        self.array.as_primitive_opt::<T>()
    }

    fn typed<'a, V: 'static>(&'a self, expected: ElementType) -> ExecResult<TypedBlock<'a, V>> {
        if self.element_type != expected {
            return Err(ExecError::Internal(format!(
                "expected {} block, got {}",
                expected, self.element_type
            )));
        }
        let values = self
            .values()
            .as_any()
            .downcast_ref::<V>()
            .ok_or_else(|| format!("failed to downcast {} block values", expected))?;
        Ok(TypedBlock {
            block: self,
            values,
        })
    }

    pub fn as_ints(&self) -> ExecResult<IntBlock<'_>> {
        self.typed::<Int32Array>(ElementType::Int)
    }

    pub fn as_longs(&self) -> ExecResult<LongBlock<'_>> {
        self.typed::<Int64Array>(ElementType::Long)
    }

    pub fn as_doubles(&self) -> ExecResult<DoubleBlock<'_>> {
        self.typed::<Float64Array>(ElementType::Double)
    }

    pub fn as_booleans(&self) -> ExecResult<BooleanBlock<'_>> {
        self.typed::<BooleanArray>(ElementType::Boolean)
    }

    pub fn as_bytes_refs(&self) -> ExecResult<BytesRefBlock<'_>> {
        self.typed::<BinaryArray>(ElementType::BytesRef)
    }

    /// New block holding `positions` in the given order. Positions may repeat.
    pub fn filter(&self, positions: &[u32]) -> ExecResult<Block> {
        let indices = UInt32Array::from(positions.to_vec());
        let array = arrow::compute::take(self.array.as_ref(), &indices, None)?;
        Ok(Self {
            array,
            element_type: self.element_type,
            multi_valued: self.multi_valued,
        })
    }

    pub fn slice(&self, offset: usize, length: usize) -> Block {
        Self {
            array: self.array.slice(offset, length),
            element_type: self.element_type,
            multi_valued: self.multi_valued,
        }
    }

    pub fn estimated_bytes(&self) -> usize {
        self.array.get_array_memory_size()
    }
}

/// Null-free, single-valued view of a block.
#[derive(Clone, Copy, Debug)]
pub enum Vector<'a> {
    Boolean(&'a BooleanArray),
    Int(&'a Int32Array),
    Long(&'a Int64Array),
    Double(&'a Float64Array),
    BytesRef(&'a BinaryArray),
}

impl Vector<'_> {
    pub fn len(&self) -> usize {
        match self {
            Vector::Boolean(a) => a.len(),
            Vector::Int(a) => a.len(),
            Vector::Long(a) => a.len(),
            Vector::Double(a) => a.len(),
            Vector::BytesRef(a) => a.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            Vector::Boolean(_) => ElementType::Boolean,
            Vector::Int(_) => ElementType::Int,
            Vector::Long(_) => ElementType::Long,
            Vector::Double(_) => ElementType::Double,
            Vector::BytesRef(_) => ElementType::BytesRef,
        }
    }
}

/// Block plus a downcast handle on its values array.
#[derive(Clone, Copy, Debug)]
pub struct TypedBlock<'a, V> {
    block: &'a Block,
    values: &'a V,
}

pub type IntBlock<'a> = TypedBlock<'a, Int32Array>;
pub type LongBlock<'a> = TypedBlock<'a, Int64Array>;
pub type DoubleBlock<'a> = TypedBlock<'a, Float64Array>;
pub type BooleanBlock<'a> = TypedBlock<'a, BooleanArray>;
pub type BytesRefBlock<'a> = TypedBlock<'a, BinaryArray>;

impl<'a, V> TypedBlock<'a, V> {
    pub fn block(&self) -> &'a Block {
        self.block
    }

    pub fn position_count(&self) -> usize {
        self.block.position_count()
    }

    pub fn is_null(&self, position: usize) -> bool {
        self.block.is_null(position)
    }

    pub fn value_count(&self, position: usize) -> usize {
        self.block.value_count(position)
    }

    pub fn first_value_index(&self, position: usize) -> usize {
        self.block.first_value_index(position)
    }
}

impl<'a, T: ArrowPrimitiveType> TypedBlock<'a, PrimitiveArray<T>> {
    pub fn get(&self, value_index: usize) -> T::Native {
        self.values.value(value_index)
    }

    pub fn position_values(&self, position: usize) -> Vec<T::Native> {
        let first = self.first_value_index(position);
        (first..first + self.value_count(position))
            .map(|i| self.get(i))
            .collect()
    }
}

impl<'a> TypedBlock<'a, BooleanArray> {
    pub fn get(&self, value_index: usize) -> bool {
        self.values.value(value_index)
    }

    pub fn position_values(&self, position: usize) -> Vec<bool> {
        let first = self.first_value_index(position);
        (first..first + self.value_count(position))
            .map(|i| self.get(i))
            .collect()
    }
}

impl<'a> TypedBlock<'a, BinaryArray> {
    pub fn get(&self, value_index: usize) -> &'a [u8] {
        self.values.value(value_index)
    }

    pub fn position_values(&self, position: usize) -> Vec<&'a [u8]> {
        let first = self.first_value_index(position);
        (first..first + self.value_count(position))
            .map(|i| self.get(i))
            .collect()
    }
}

pub(crate) fn vector_block<A: Array + 'static>(array: A) -> ExecResult<Block> {
    Block::from_array(Arc::new(array))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_block_positions() {
        let mut b = LongBlockBuilder::with_capacity(3);
        b.append_value(7).append_null().append_value(9);
        let block = b.build().expect("build");
        assert!(!block.may_have_multivalues());
        assert_eq!(block.position_count(), 3);
        assert_eq!(block.value_count(1), 0);
        assert!(block.is_null(1));
        assert!(block.as_vector().is_none());
        let longs = block.as_longs().expect("longs");
        assert_eq!(longs.get(longs.first_value_index(2)), 9);
    }

    #[test]
    fn multi_value_block_offsets() {
        let mut b = IntBlockBuilder::with_capacity(3);
        b.append_value(1);
        b.begin_position_entry().append_value(2).append_value(3).end_position_entry();
        b.append_null();
        let block = b.build().expect("build");
        assert!(block.may_have_multivalues());
        assert_eq!(block.value_count(0), 1);
        assert_eq!(block.value_count(1), 2);
        assert_eq!(block.first_value_index(1), 1);
        assert_eq!(block.value_count(2), 0);
        assert_eq!(block.total_value_count(), 3);
        assert_eq!(block.as_ints().expect("ints").position_values(1), vec![2, 3]);
    }

    #[test]
    fn vector_only_without_nulls_or_multivalues() {
        let block = vector_block(Float64Array::from(vec![1.0, 2.5])).expect("block");
        match block.as_vector() {
            Some(Vector::Double(v)) => assert_eq!(v.value(1), 2.5),
            other => panic!("expected double vector, got {other:?}"),
        }
    }

    #[test]
    fn filter_produces_new_block_and_keeps_source() {
        let mut b = BytesRefBlockBuilder::with_capacity(3);
        b.append_value(b"a").append_value(b"b");
        b.begin_position_entry().append_value(b"c").append_value(b"d").end_position_entry();
        let block = b.build().expect("build");
        let picked = block.filter(&[2, 0]).expect("filter");
        assert_eq!(picked.position_count(), 2);
        let bytes = picked.as_bytes_refs().expect("bytes");
        assert_eq!(bytes.position_values(0), vec![b"c".as_slice(), b"d".as_slice()]);
        assert_eq!(bytes.position_values(1), vec![b"a".as_slice()]);
        assert_eq!(block.position_count(), 3);
    }

    #[test]
    fn unsupported_types_are_rejected() {
        let array = Arc::new(arrow::array::Int8Array::from(vec![1i8])) as ArrayRef;
        assert!(Block::from_array(array).is_err());
    }
}
