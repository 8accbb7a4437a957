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
//! UTF-8 string functions over BytesRef values.

use super::super::kernel::{BytesLane, BytesOut, IntOut, KernelResult, UnaryKernel};
use super::{Registry, unary};
use crate::exec::block::ElementType;

const INVALID_UTF8: &str = "invalid utf-8";

#[derive(Debug)]
pub(crate) struct Length;

impl UnaryKernel for Length {
    type In = BytesLane;
    type Out = IntOut;
    const INFALLIBLE: bool = false;

    fn apply(value: &[u8]) -> KernelResult<i32> {
        let chars = std::str::from_utf8(value)
            .map_err(|_| INVALID_UTF8)?
            .chars()
            .count();
        i32::try_from(chars).map_err(|_| "string too long")
    }
}

#[derive(Debug)]
pub(crate) struct ToUpper;

impl UnaryKernel for ToUpper {
    type In = BytesLane;
    type Out = BytesOut;
    const INFALLIBLE: bool = false;

    fn apply(value: &[u8]) -> KernelResult<Vec<u8>> {
        let s = std::str::from_utf8(value).map_err(|_| INVALID_UTF8)?;
        Ok(s.to_uppercase().into_bytes())
    }
}

#[derive(Debug)]
pub(crate) struct ToLower;

impl UnaryKernel for ToLower {
    type In = BytesLane;
    type Out = BytesOut;
    const INFALLIBLE: bool = false;

    fn apply(value: &[u8]) -> KernelResult<Vec<u8>> {
        let s = std::str::from_utf8(value).map_err(|_| INVALID_UTF8)?;
        Ok(s.to_lowercase().into_bytes())
    }
}

pub(super) fn register(registry: &mut Registry) {
    let text = [ElementType::BytesRef];
    registry.register("length", &text, ElementType::Int, unary::<Length>);
    registry.register("to_upper", &text, ElementType::BytesRef, unary::<ToUpper>);
    registry.register("to_lower", &text, ElementType::BytesRef, unary::<ToLower>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_characters_not_bytes() {
        assert_eq!(Length::apply("héllo".as_bytes()), Ok(5));
        assert_eq!(Length::apply(&[0xff, 0xfe][..]), Err(INVALID_UTF8));
        assert_eq!(ToUpper::apply(b"abc".as_slice()), Ok(b"ABC".to_vec()));
        assert_eq!(ToLower::apply(b"ABC".as_slice()), Ok(b"abc".to_vec()));
    }
}
