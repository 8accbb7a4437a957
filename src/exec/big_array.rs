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
//! Growable, memory-accounted arrays indexed by group ordinal.
//!
//! Aggregation state lives in these arrays instead of plain `Vec`s so that every
//! byte is charged to the owning [`MemTracker`] before it is allocated. Growth
//! that would exceed a tracker limit fails with `ResourceExhausted` and leaves the
//! array untouched. Bytes are released on `close` or drop, whichever comes first.

use std::mem::size_of;
use std::sync::Arc;

use crate::common::error::ExecResult;
use crate::runtime::mem_tracker::MemTracker;

/// Allocator handed to grouping state. Cheap to clone; clones share the tracker.
#[derive(Clone, Debug)]
pub struct BigArrays {
    tracker: Arc<MemTracker>,
    initial_capacity: usize,
}

impl BigArrays {
    pub fn new(tracker: Arc<MemTracker>, initial_capacity: usize) -> Self {
        Self {
            tracker,
            initial_capacity: initial_capacity.max(1),
        }
    }

    pub fn tracker(&self) -> &Arc<MemTracker> {
        &self.tracker
    }

    pub fn new_array<T: Copy>(&self, fill: T) -> ExecResult<BigArray<T>> {
        BigArray::with_capacity(Arc::clone(&self.tracker), self.initial_capacity, fill)
    }

    pub fn new_long_array(&self, fill: i64) -> ExecResult<LongArray> {
        BigArray::with_capacity(Arc::clone(&self.tracker), self.initial_capacity, fill)
    }

    pub fn new_double_array(&self, fill: f64) -> ExecResult<DoubleArray> {
        BigArray::with_capacity(Arc::clone(&self.tracker), self.initial_capacity, fill)
    }

    pub fn new_int_array(&self, fill: i32) -> ExecResult<IntArray> {
        BigArray::with_capacity(Arc::clone(&self.tracker), self.initial_capacity, fill)
    }

    pub fn new_byte_array(&self) -> ExecResult<ByteArray> {
        BigArray::with_capacity(Arc::clone(&self.tracker), self.initial_capacity, 0)
    }

    pub fn new_reservation(&self) -> MemoryReservation {
        MemoryReservation::new(Arc::clone(&self.tracker))
    }

    pub fn new_bit_array(&self) -> ExecResult<BitArray> {
        BitArray::with_capacity(Arc::clone(&self.tracker), self.initial_capacity)
    }

    pub fn new_object_array<T: Default>(&self) -> ExecResult<ObjectArray<T>> {
        ObjectArray::with_capacity(Arc::clone(&self.tracker), self.initial_capacity)
    }
}

/// Bytes charged to a tracker on behalf of one owner, refunded on drop.
#[derive(Debug)]
pub struct MemoryReservation {
    tracker: Arc<MemTracker>,
    bytes: i64,
}

impl MemoryReservation {
    pub fn new(tracker: Arc<MemTracker>) -> Self {
        Self { tracker, bytes: 0 }
    }

    pub fn bytes(&self) -> i64 {
        self.bytes
    }

    pub fn grow(&mut self, bytes: usize) -> ExecResult<()> {
        let bytes = bytes as i64;
        self.tracker.try_consume(bytes)?;
        self.bytes += bytes;
        Ok(())
    }

    pub fn shrink(&mut self, bytes: usize) {
        let bytes = (bytes as i64).min(self.bytes);
        self.tracker.release(bytes);
        self.bytes -= bytes;
    }

    pub fn release_all(&mut self) {
        if self.bytes > 0 {
            self.tracker.release(self.bytes);
            self.bytes = 0;
        }
    }
}

impl Drop for MemoryReservation {
    fn drop(&mut self) {
        self.release_all();
    }
}

fn next_capacity(current: usize, min_size: usize) -> usize {
    let mut capacity = current.max(1);
    while capacity < min_size {
        capacity = capacity.saturating_add(capacity / 2 + 1);
    }
    capacity
}

/// Dense array of `Copy` values; unset slots read as the fill value.
#[derive(Debug)]
pub struct BigArray<T: Copy> {
    values: Vec<T>,
    fill: T,
    reservation: MemoryReservation,
}

pub type LongArray = BigArray<i64>;
pub type DoubleArray = BigArray<f64>;
pub type IntArray = BigArray<i32>;
pub type ByteArray = BigArray<u8>;

impl<T: Copy> BigArray<T> {
    fn with_capacity(tracker: Arc<MemTracker>, capacity: usize, fill: T) -> ExecResult<Self> {
        let mut reservation = MemoryReservation::new(tracker);
        reservation.grow(capacity * size_of::<T>())?;
        Ok(Self {
            values: vec![fill; capacity],
            fill,
            reservation,
        })
    }

    pub fn size(&self) -> usize {
        self.values.len()
    }

    /// Make `index` addressable. New slots hold the fill value.
    pub fn ensure_capacity(&mut self, index: usize) -> ExecResult<()> {
        let min_size = index + 1;
        if min_size <= self.values.len() {
            return Ok(());
        }
        let new_len = next_capacity(self.values.len(), min_size);
        self.reservation
            .grow((new_len - self.values.len()) * size_of::<T>())?;
        self.values.resize(new_len, self.fill);
        Ok(())
    }

    pub fn get(&self, index: usize) -> T {
        self.values.get(index).copied().unwrap_or(self.fill)
    }

    pub fn set(&mut self, index: usize, value: T) -> ExecResult<()> {
        self.ensure_capacity(index)?;
        self.values[index] = value;
        Ok(())
    }

    /// Copy `values` into `offset..offset + values.len()`, growing as needed.
    pub fn write_slice(&mut self, offset: usize, values: &[T]) -> ExecResult<()> {
        if values.is_empty() {
            return Ok(());
        }
        self.ensure_capacity(offset + values.len() - 1)?;
        self.values[offset..offset + values.len()].copy_from_slice(values);
        Ok(())
    }

    /// Addressable slots only; callers stay within what they wrote.
    pub fn slice(&self, start: usize, end: usize) -> &[T] {
        let end = end.min(self.values.len());
        &self.values[start.min(end)..end]
    }

    pub fn accounted_bytes(&self) -> i64 {
        self.reservation.bytes
    }

    pub fn close(&mut self) {
        self.values = Vec::new();
        self.reservation.release_all();
    }
}

impl BigArray<i64> {
    pub fn increment(&mut self, index: usize, delta: i64) -> ExecResult<()> {
        self.ensure_capacity(index)?;
        self.values[index] += delta;
        Ok(())
    }
}

impl BigArray<f64> {
    pub fn increment(&mut self, index: usize, delta: f64) -> ExecResult<()> {
        self.ensure_capacity(index)?;
        self.values[index] += delta;
        Ok(())
    }
}

/// One bit per group; used to track which groups have seen a value.
#[derive(Debug)]
pub struct BitArray {
    words: Vec<u64>,
    reservation: MemoryReservation,
}

impl BitArray {
    fn with_capacity(tracker: Arc<MemTracker>, bits: usize) -> ExecResult<Self> {
        let words = bits.div_ceil(64).max(1);
        let mut reservation = MemoryReservation::new(tracker);
        reservation.grow(words * size_of::<u64>())?;
        Ok(Self {
            words: vec![0; words],
            reservation,
        })
    }

    pub fn get(&self, index: usize) -> bool {
        self.words
            .get(index / 64)
            .is_some_and(|w| w & (1u64 << (index % 64)) != 0)
    }

    pub fn set(&mut self, index: usize) -> ExecResult<()> {
        let word = index / 64;
        if word >= self.words.len() {
            let new_len = next_capacity(self.words.len(), word + 1);
            self.reservation
                .grow((new_len - self.words.len()) * size_of::<u64>())?;
            self.words.resize(new_len, 0);
        }
        self.words[word] |= 1u64 << (index % 64);
        Ok(())
    }

    pub fn clear(&mut self, index: usize) {
        if let Some(w) = self.words.get_mut(index / 64) {
            *w &= !(1u64 << (index % 64));
        }
    }

    pub fn close(&mut self) {
        self.words = Vec::new();
        self.reservation.release_all();
    }
}

/// Per-group owned state such as collected value lists.
///
/// Slot overhead is accounted automatically; payload held inside a slot is
/// charged explicitly through [`ObjectArray::account`].
#[derive(Debug)]
pub struct ObjectArray<T: Default> {
    values: Vec<T>,
    reservation: MemoryReservation,
}

impl<T: Default> ObjectArray<T> {
    fn with_capacity(tracker: Arc<MemTracker>, capacity: usize) -> ExecResult<Self> {
        let mut reservation = MemoryReservation::new(tracker);
        reservation.grow(capacity * size_of::<T>())?;
        let mut values = Vec::with_capacity(capacity);
        values.resize_with(capacity, T::default);
        Ok(Self {
            values,
            reservation,
        })
    }

    pub fn size(&self) -> usize {
        self.values.len()
    }

    pub fn ensure_capacity(&mut self, index: usize) -> ExecResult<()> {
        let min_size = index + 1;
        if min_size <= self.values.len() {
            return Ok(());
        }
        let new_len = next_capacity(self.values.len(), min_size);
        self.reservation
            .grow((new_len - self.values.len()) * size_of::<T>())?;
        self.values.resize_with(new_len, T::default);
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.values.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> ExecResult<&mut T> {
        self.ensure_capacity(index)?;
        Ok(&mut self.values[index])
    }

    /// Charge (positive) or refund (negative) payload bytes.
    pub fn account(&mut self, delta_bytes: isize) -> ExecResult<()> {
        if delta_bytes >= 0 {
            self.reservation.grow(delta_bytes as usize)
        } else {
            self.reservation.shrink(delta_bytes.unsigned_abs());
            Ok(())
        }
    }

    pub fn close(&mut self) {
        self.values = Vec::new();
        self.reservation.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::ExecError;

    #[test]
    fn growth_is_accounted_and_released_on_drop() {
        let tracker = MemTracker::new_root("agg");
        {
            let arrays = BigArrays::new(Arc::clone(&tracker), 4);
            let mut longs = arrays.new_long_array(0).expect("alloc");
            longs.increment(100, 7).expect("grow");
            assert_eq!(longs.get(100), 7);
            assert_eq!(longs.get(99), 0);
            assert!(longs.size() > 100);
            assert_eq!(tracker.current(), longs.accounted_bytes());
        }
        assert_eq!(tracker.current(), 0);
    }

    #[test]
    fn growth_past_limit_fails_without_mutation() {
        let tracker = MemTracker::new_root_with_limit("agg", 256);
        let arrays = BigArrays::new(Arc::clone(&tracker), 4);
        let mut doubles = arrays.new_double_array(f64::NAN).expect("alloc");
        let before = doubles.size();
        let err = doubles.set(1_000, 1.0).expect_err("limit");
        assert!(matches!(err, ExecError::ResourceExhausted { .. }));
        assert_eq!(doubles.size(), before);
        doubles.close();
        assert_eq!(tracker.current(), 0);
    }

    #[test]
    fn bits_and_objects() {
        let tracker = MemTracker::new_root("agg");
        let arrays = BigArrays::new(Arc::clone(&tracker), 1);
        let mut bits = arrays.new_bit_array().expect("alloc");
        bits.set(130).expect("set");
        assert!(bits.get(130));
        assert!(!bits.get(129));
        bits.clear(130);
        assert!(!bits.get(130));

        let mut objects = arrays.new_object_array::<Vec<i64>>().expect("alloc");
        objects.get_mut(5).expect("slot").push(3);
        objects.account(8).expect("account");
        assert_eq!(objects.get(5).map(Vec::len), Some(1));
        objects.close();
        bits.close();
        assert_eq!(tracker.current(), 0);
    }
}
