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
//! Text categorization as a grouping key.
//!
//! A message is reduced to its word tokens; tokens containing a digit are
//! treated as variable parts and dropped. The remaining tokens form the category
//! pattern `.*?tok1.+?tok2.*?`, so `"error code 12"` and `"error code 99"` share
//! the category `.*?error.+?code.*?`. Messages with no stable token fall into the
//! null category.

use regex::Regex;

use super::bytes_ref_hash::BytesRefHash;
use super::{BlockHash, GroupOrdinals, OrdinalsBuilder};
use crate::common::error::{ExecError, ExecResult};
use crate::exec::big_array::BigArrays;
use crate::exec::block::{Block, BytesRefBlockBuilder, ElementType};
use crate::exec::page::Page;

const TOKEN_PATTERN: &str = r"[\p{L}\p{N}_]+(?:['.\-][\p{L}\p{N}_]+)*";

#[derive(Clone, Debug)]
pub struct Categorizer {
    token: Regex,
}

impl Categorizer {
    pub fn new() -> ExecResult<Self> {
        let token = Regex::new(TOKEN_PATTERN)
            .map_err(|e| ExecError::Internal(format!("categorize: invalid token pattern: {e}")))?;
        Ok(Self { token })
    }

    pub fn category(&self, text: &str) -> Option<String> {
        let tokens = self
            .token
            .find_iter(text)
            .map(|m| m.as_str())
            .filter(|t| !t.chars().any(|c| c.is_ascii_digit()))
            .map(regex::escape)
            .collect::<Vec<_>>();
        if tokens.is_empty() {
            return None;
        }
        Some(format!(".*?{}.*?", tokens.join(".+?")))
    }
}

/// Category pattern of one message, `None` when nothing stable remains.
pub fn category_pattern(text: &str) -> ExecResult<Option<String>> {
    Ok(Categorizer::new()?.category(text))
}

#[derive(Debug)]
pub struct CategorizeBlockHash {
    channel: usize,
    categorizer: Categorizer,
    hash: BytesRefHash,
    ordinals: GroupOrdinals,
}

impl CategorizeBlockHash {
    pub fn new(channel: usize, arrays: &BigArrays) -> ExecResult<Self> {
        Ok(Self {
            channel,
            categorizer: Categorizer::new()?,
            hash: BytesRefHash::new(arrays)?,
            ordinals: GroupOrdinals::new(arrays)?,
        })
    }

    fn category_of(&self, value: &[u8]) -> Option<String> {
        self.categorizer.category(&String::from_utf8_lossy(value))
    }

    fn group_of(&mut self, value: &[u8]) -> ExecResult<u32> {
        match self.category_of(value) {
            None => self.ordinals.group_for_null(),
            Some(pattern) => {
                let (key_ordinal, inserted) = self.hash.add(pattern.as_bytes())?;
                self.ordinals.group_for_key(key_ordinal, inserted)
            }
        }
    }
}

impl BlockHash for CategorizeBlockHash {
    fn add(&mut self, page: &Page) -> ExecResult<Block> {
        let block = page.block(self.channel)?;
        let mut out = OrdinalsBuilder::with_capacity(block.position_count());
        if block.element_type() == ElementType::Null {
            for _ in 0..block.position_count() {
                out.append(self.ordinals.group_for_null()?);
            }
            return out.build();
        }
        let text = block.as_bytes_refs()?;
        for p in 0..block.position_count() {
            let first = block.first_value_index(p);
            match block.value_count(p) {
                0 => out.append(self.ordinals.group_for_null()?),
                1 => out.append(self.group_of(text.get(first))?),
                count => {
                    out.begin();
                    for i in first..first + count {
                        let group = self.group_of(text.get(i))?;
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
        let mut out = OrdinalsBuilder::with_capacity(block.position_count());
        let text = if block.element_type() == ElementType::Null {
            None
        } else {
            Some(block.as_bytes_refs()?)
        };
        for p in 0..block.position_count() {
            out.begin();
            let first = block.first_value_index(p);
            let count = if text.is_some() { block.value_count(p) } else { 0 };
            let categories = match &text {
                Some(text) if count > 0 => (first..first + count)
                    .map(|i| self.category_of(text.get(i)))
                    .collect::<Vec<_>>(),
                _ => vec![None],
            };
            for category in categories {
                let group = match category {
                    None => self.ordinals.null_group(),
                    Some(pattern) => self
                        .hash
                        .find(pattern.as_bytes())
                        .map(|k| self.ordinals.find_key(k)),
                };
                if let Some(group) = group {
                    out.push(group);
                }
            }
            out.end();
        }
        out.build()
    }

    fn keys(&self) -> ExecResult<Vec<Block>> {
        let count = self.ordinals.count();
        let mut builder = BytesRefBlockBuilder::with_capacity(count);
        for group in 0..count as u32 {
            match self.ordinals.key_of(group) {
                None => builder.append_null(),
                Some(key_ordinal) => builder.append_value(self.hash.get(key_ordinal)),
            };
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_do_not_split_categories() {
        let c = Categorizer::new().expect("categorizer");
        assert_eq!(c.category("error code 12").as_deref(), Some(".*?error.+?code.*?"));
        assert_eq!(c.category("error code 12"), c.category("error code 99"));
        assert_ne!(c.category("error code 12"), c.category("warning code 12"));
        assert_eq!(c.category("12 34"), None);
    }

    #[test]
    fn tokens_are_regex_escaped() {
        let c = Categorizer::new().expect("categorizer");
        assert_eq!(c.category("disk a.b full").as_deref(), Some(r".*?disk.+?a\.b.+?full.*?"));
    }
}
