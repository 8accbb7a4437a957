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
//! Open-addressing index from key hash to dense key ordinal.
//!
//! Entries carry their own hash so rehashing never needs to touch key storage.
//! Table growth is charged to the owner's tracker before it happens.

use std::mem::size_of;

use hashbrown::HashTable;

use crate::common::error::ExecResult;
use crate::exec::big_array::{BigArrays, MemoryReservation};

type Entry = (u64, u32);

#[derive(Debug)]
pub(crate) struct OrdinalTable {
    table: HashTable<Entry>,
    reservation: MemoryReservation,
}

impl OrdinalTable {
    pub(crate) fn new(arrays: &BigArrays) -> Self {
        Self {
            table: HashTable::new(),
            reservation: arrays.new_reservation(),
        }
    }

    pub(crate) fn find(&self, hash: u64, mut eq: impl FnMut(u32) -> bool) -> Option<u32> {
        self.table
            .find(hash, |(h, ord)| *h == hash && eq(*ord))
            .map(|(_, ord)| *ord)
    }

    /// Insert an ordinal known to be absent.
    pub(crate) fn insert(&mut self, hash: u64, ordinal: u32) -> ExecResult<()> {
        if self.table.len() == self.table.capacity() {
            let before = self.table.capacity();
            self.table.reserve(before.max(16), |(h, _)| *h);
            let grown = self.table.capacity().saturating_sub(before);
            self.reservation.grow(grown * size_of::<Entry>())?;
        }
        self.table.insert_unique(hash, (hash, ordinal), |(h, _)| *h);
        Ok(())
    }

    pub(crate) fn close(&mut self) {
        self.table = HashTable::new();
        self.reservation.release_all();
    }
}
