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
//! BlockHash contracts: dense first-seen ordinals, stable across pages, and keys
//! that map back to the inputs that produced them.

mod common;

use std::collections::HashMap;

use proptest::prelude::*;

use common::*;
use novacompute::exec::hash_table::{GroupSpec, build_block_hash, category_pattern};
use novacompute::{Block, DriverContext, ElementType};

type Key = (Option<i64>, Option<String>);

fn ordinals(block: &Block) -> Vec<u32> {
    (0..block.position_count())
        .map(|p| int_at(block, p).expect("single-valued ordinal") as u32)
        .collect()
}

fn check_bijection(keys: &[Key], split: usize) {
    let ctx = DriverContext::new("block_hash_bijection");
    let groups = [
        GroupSpec::new(0, ElementType::Long),
        GroupSpec::new(1, ElementType::BytesRef),
    ];
    let mut hash = assert_ok!(build_block_hash(&groups, &ctx));

    let split = split.min(keys.len());
    let mut seen: HashMap<Key, u32> = HashMap::new();
    for part in [&keys[..split], &keys[split..]] {
        if part.is_empty() {
            continue;
        }
        let input = page(vec![
            longs(&part.iter().map(|k| k.0).collect::<Vec<_>>()),
            strings(&part.iter().map(|k| k.1.as_deref()).collect::<Vec<_>>()),
        ]);
        let assigned = ordinals(&assert_ok!(hash.add(&input)));
        for (key, ordinal) in part.iter().zip(assigned) {
            let next = seen.len() as u32;
            let expected = *seen.entry(key.clone()).or_insert(next);
            assert_eq!(ordinal, expected, "key {key:?}");
        }
        let looked_up = ordinals(&assert_ok!(hash.lookup(&input)));
        assert_eq!(
            looked_up,
            part.iter().map(|k| seen[k]).collect::<Vec<_>>()
        );
    }

    assert_eq!(hash.group_count(), seen.len());
    let key_blocks = assert_ok!(hash.keys());
    assert_eq!(key_blocks.len(), 2);
    for (key, ordinal) in &seen {
        let o = *ordinal as usize;
        assert_eq!(long_at(&key_blocks[0], o), key.0);
        assert_eq!(string_at(&key_blocks[1], o), key.1);
    }
    hash.close();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn packed_hash_is_a_bijection(
        keys in prop::collection::vec(
            (
                prop::option::of(-3i64..3),
                prop::option::of(prop::sample::select(vec!["a", "b", "", "longer value"])),
            ),
            0..80,
        ),
        split in 0usize..80,
    ) {
        let keys = keys
            .into_iter()
            .map(|(l, s)| (l, s.map(str::to_string)))
            .collect::<Vec<_>>();
        check_bijection(&keys, split);
    }

    #[test]
    fn long_hash_ordinals_are_dense(values in prop::collection::vec(prop::option::of(any::<i64>()), 1..100)) {
        let ctx = DriverContext::new("long_hash_dense");
        let mut hash = build_block_hash(&[GroupSpec::new(0, ElementType::Long)], &ctx).expect("hash");
        let out = ordinals(&hash.add(&page(vec![longs(&values)])).expect("add"));
        let mut max_seen = None::<u32>;
        for o in &out {
            match max_seen {
                None => prop_assert_eq!(*o, 0),
                Some(m) => prop_assert!(*o <= m + 1),
            }
            max_seen = Some(max_seen.map_or(*o, |m| m.max(*o)));
        }
        prop_assert_eq!(max_seen.map_or(0, |m| m as usize + 1), hash.group_count());
    }
}

#[test]
fn multi_valued_keys_map_to_every_ordinal() {
    let ctx = DriverContext::new("multi_valued_keys");
    let mut hash = assert_ok!(build_block_hash(&[GroupSpec::new(0, ElementType::Long)], &ctx));
    let out = assert_ok!(hash.add(&page(vec![multi_longs(&[&[7], &[8, 7, 8], &[]])])));
    assert_eq!(out.value_count(0), 1);
    assert_eq!(out.value_count(1), 2);
    let ints = assert_ok!(out.as_ints());
    assert_eq!(ints.position_values(1), vec![1, 0]);
    assert_eq!(int_at(&out, 2), Some(2));
    let keys = assert_ok!(hash.keys());
    assert_eq!(long_at(&keys[0], 2), None);
}

#[test]
fn lookup_never_inserts() {
    let ctx = DriverContext::new("lookup_never_inserts");
    let mut hash = assert_ok!(build_block_hash(&[GroupSpec::new(0, ElementType::BytesRef)], &ctx));
    assert_ok!(hash.add(&page(vec![strings(&[Some("x")])])));
    let out = assert_ok!(hash.lookup(&page(vec![strings(&[Some("y"), Some("x")])])));
    assert!(out.is_null(0));
    assert_eq!(int_at(&out, 1), Some(0));
    assert_eq!(hash.group_count(), 1);
}

#[test]
fn categorize_groups_by_stable_tokens() {
    let ctx = DriverContext::new("categorize");
    let mut hash = assert_ok!(build_block_hash(&[GroupSpec::categorize(0)], &ctx));
    let messages = [
        Some("Connected to 10.1.0.1"),
        Some("Disconnected"),
        Some("Connected to 10.1.0.2"),
        Some("404"),
        None,
    ];
    let out = ordinals(&assert_ok!(hash.add(&page(vec![strings(&messages)]))));
    assert_eq!(out, vec![0, 1, 0, 2, 2]);
    let keys = assert_ok!(hash.keys());
    assert_eq!(string_at(&keys[0], 0).as_deref(), Some(".*?Connected.+?to.*?"));
    assert_eq!(string_at(&keys[0], 1).as_deref(), Some(".*?Disconnected.*?"));
    assert_eq!(string_at(&keys[0], 2), None);
    assert_eq!(
        assert_ok!(category_pattern("error code 12")),
        assert_ok!(category_pattern("error code 99"))
    );
}

#[test]
fn no_keys_puts_every_position_in_group_zero() {
    let ctx = DriverContext::new("no_keys");
    let mut hash = assert_ok!(build_block_hash(&[], &ctx));
    let out = ordinals(&assert_ok!(hash.add(&page(vec![longs(&[Some(1), None, Some(3)])]))));
    assert_eq!(out, vec![0, 0, 0]);
    assert_eq!(hash.group_count(), 1);
}
