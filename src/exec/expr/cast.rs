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
//! Type conversion kernels.
//!
//! Lowering inserts widening casts (int -> long -> double) so arithmetic and
//! comparison kernels only ever see operands of one element type. Narrowing and
//! parsing casts can fail per value; those positions become null with a warning.

use std::sync::Arc;

use super::EvaluatorFactory;
use super::kernel::{
    BooleanLane, BooleanOut, BytesLane, BytesOut, DoubleLane, DoubleOut, IntLane, IntOut,
    KernelResult, Lane, LongLane, LongOut, OutLane, UnaryEvaluatorFactory, UnaryKernel,
};
use crate::common::error::{ExecError, ExecResult};
use crate::exec::block::ElementType;

const OUT_OF_RANGE: &str = "value out of range";
const NOT_A_NUMBER: &str = "cannot parse number";
const NOT_A_BOOLEAN: &str = "cannot parse boolean";

macro_rules! cast_kernel {
    ($kernel:ident, $in:ty, $out:ty, $infallible:expr, |$v:ident| $body:expr) => {
        #[derive(Debug)]
        pub(crate) struct $kernel;

        impl UnaryKernel for $kernel {
            type In = $in;
            type Out = $out;
            const INFALLIBLE: bool = $infallible;

            fn apply($v: <$in as Lane>::Value<'_>) -> KernelResult<<$out as OutLane>::Native> {
                $body
            }
        }
    };
}

cast_kernel!(IntToLong, IntLane, LongOut, true, |v| Ok(i64::from(v)));
cast_kernel!(IntToDouble, IntLane, DoubleOut, true, |v| Ok(f64::from(v)));
cast_kernel!(LongToDouble, LongLane, DoubleOut, true, |v| Ok(v as f64));
cast_kernel!(LongToInt, LongLane, IntOut, false, |v| {
    i32::try_from(v).map_err(|_| OUT_OF_RANGE)
});
cast_kernel!(DoubleToLong, DoubleLane, LongOut, false, |v| {
    if v.is_finite() && v >= i64::MIN as f64 && v < i64::MAX as f64 {
        Ok(v.trunc() as i64)
    } else {
        Err(OUT_OF_RANGE)
    }
});
cast_kernel!(DoubleToInt, DoubleLane, IntOut, false, |v| {
    if v.is_finite() && v >= f64::from(i32::MIN) && v <= f64::from(i32::MAX) {
        Ok(v.trunc() as i32)
    } else {
        Err(OUT_OF_RANGE)
    }
});
cast_kernel!(BooleanToInt, BooleanLane, IntOut, true, |v| Ok(i32::from(v)));
cast_kernel!(BooleanToLong, BooleanLane, LongOut, true, |v| Ok(i64::from(v)));
cast_kernel!(BooleanToDouble, BooleanLane, DoubleOut, true, |v| Ok(f64::from(u8::from(v))));
cast_kernel!(IntToBytes, IntLane, BytesOut, true, |v| Ok(v.to_string().into_bytes()));
cast_kernel!(LongToBytes, LongLane, BytesOut, true, |v| Ok(v.to_string().into_bytes()));
cast_kernel!(DoubleToBytes, DoubleLane, BytesOut, true, |v| Ok(v.to_string().into_bytes()));
cast_kernel!(BooleanToBytes, BooleanLane, BytesOut, true, |v| Ok(v.to_string().into_bytes()));
cast_kernel!(BytesToInt, BytesLane, IntOut, false, |v| parse_number(v));
cast_kernel!(BytesToLong, BytesLane, LongOut, false, |v| parse_number(v));
cast_kernel!(BytesToDouble, BytesLane, DoubleOut, false, |v| parse_number(v));
cast_kernel!(BytesToBoolean, BytesLane, BooleanOut, false, |v| {
    match std::str::from_utf8(v).map(str::trim) {
        Ok(s) if s.eq_ignore_ascii_case("true") => Ok(true),
        Ok(s) if s.eq_ignore_ascii_case("false") => Ok(false),
        _ => Err(NOT_A_BOOLEAN),
    }
});

fn parse_number<T: std::str::FromStr>(bytes: &[u8]) -> KernelResult<T> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.trim().parse::<T>().ok())
        .ok_or(NOT_A_NUMBER)
}

fn cast<K: UnaryKernel>(
    child: Arc<dyn EvaluatorFactory>,
    source: String,
) -> Arc<dyn EvaluatorFactory> {
    Arc::new(UnaryEvaluatorFactory::<K>::new(child, source))
}

/// Wider of two numeric types, used to align binary operands.
pub(crate) fn widest_numeric(a: ElementType, b: ElementType) -> Option<ElementType> {
    fn rank(t: ElementType) -> Option<u8> {
        match t {
            ElementType::Int => Some(0),
            ElementType::Long => Some(1),
            ElementType::Double => Some(2),
            _ => None,
        }
    }
    let (ra, rb) = (rank(a)?, rank(b)?);
    Some(if ra >= rb { a } else { b })
}

pub(crate) fn cast_factory(
    from: ElementType,
    to: ElementType,
    child: Arc<dyn EvaluatorFactory>,
    source: String,
) -> ExecResult<Arc<dyn EvaluatorFactory>> {
    use ElementType::*;
    let factory = match (from, to) {
        (from, to) if from == to || from == Null => child,
        (Int, Long) => cast::<IntToLong>(child, source),
        (Int, Double) => cast::<IntToDouble>(child, source),
        (Long, Double) => cast::<LongToDouble>(child, source),
        (Long, Int) => cast::<LongToInt>(child, source),
        (Double, Long) => cast::<DoubleToLong>(child, source),
        (Double, Int) => cast::<DoubleToInt>(child, source),
        (Boolean, Int) => cast::<BooleanToInt>(child, source),
        (Boolean, Long) => cast::<BooleanToLong>(child, source),
        (Boolean, Double) => cast::<BooleanToDouble>(child, source),
        (Int, BytesRef) => cast::<IntToBytes>(child, source),
        (Long, BytesRef) => cast::<LongToBytes>(child, source),
        (Double, BytesRef) => cast::<DoubleToBytes>(child, source),
        (Boolean, BytesRef) => cast::<BooleanToBytes>(child, source),
        (BytesRef, Int) => cast::<BytesToInt>(child, source),
        (BytesRef, Long) => cast::<BytesToLong>(child, source),
        (BytesRef, Double) => cast::<BytesToDouble>(child, source),
        (BytesRef, Boolean) => cast::<BytesToBoolean>(child, source),
        (from, to) => {
            return Err(ExecError::invalid_input(format!(
                "cannot cast {from} to {to}"
            )));
        }
    };
    Ok(factory)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrowing_and_parsing_fail_per_value() {
        assert_eq!(LongToInt::apply(i64::MAX), Err(OUT_OF_RANGE));
        assert_eq!(DoubleToLong::apply(f64::NAN), Err(OUT_OF_RANGE));
        assert_eq!(DoubleToInt::apply(-2.7), Ok(-2));
        assert_eq!(BytesToLong::apply(&b" 42 "[..]), Ok(42));
        assert_eq!(BytesToDouble::apply(&b"x"[..]), Err(NOT_A_NUMBER));
        assert_eq!(BytesToBoolean::apply(&b"TRUE"[..]), Ok(true));
    }

    #[test]
    fn widening_order() {
        use ElementType::*;
        assert_eq!(widest_numeric(Int, Long), Some(Long));
        assert_eq!(widest_numeric(Double, Int), Some(Double));
        assert_eq!(widest_numeric(Int, BytesRef), None);
    }
}
