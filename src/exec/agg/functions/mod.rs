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
mod avg;
mod count;
mod min_max;
mod rate;
mod sum;
mod values;

use std::fmt;
use std::sync::Arc;

use arrow::array::AsArray;
use arrow::datatypes::{ArrowNativeType, ArrowPrimitiveType, Float64Type, Int32Type, Int64Type};

pub use self::avg::AvgSupplier;
pub use self::count::CountSupplier;
pub use self::min_max::{Extreme, MinMaxSupplier};
pub use self::rate::RateSupplier;
pub use self::sum::{SumDoubleSupplier, SumLongSupplier};
pub use self::values::ValuesSupplier;

use super::AggregatorFunctionSupplier;
use crate::common::error::{ExecError, ExecResult};
use crate::exec::block::{Block, ElementType};

/// Look up an aggregate function by name and raw input types.
pub fn resolve_supplier(
    name: &str,
    input_types: &[ElementType],
) -> ExecResult<Arc<dyn AggregatorFunctionSupplier>> {
    use ElementType::*;
    let supplier: Arc<dyn AggregatorFunctionSupplier> =
        match (name.to_ascii_lowercase().as_str(), input_types) {
            ("count", []) => Arc::new(CountSupplier::all_rows()),
            ("count" | "value_count", [_]) => Arc::new(CountSupplier::values()),
            ("sum", [t @ (Int | Long)]) => Arc::new(SumLongSupplier::new(*t)),
            ("sum", [Double]) => Arc::new(SumDoubleSupplier),
            ("min", [t @ (Int | Long | Double)]) => Arc::new(MinMaxSupplier::new(Extreme::Min, *t)),
            ("max", [t @ (Int | Long | Double)]) => Arc::new(MinMaxSupplier::new(Extreme::Max, *t)),
            ("avg", [t @ (Int | Long | Double)]) => Arc::new(AvgSupplier::new(*t)),
            ("values", [t]) if *t != Null => Arc::new(ValuesSupplier::new(*t)),
            ("rate", [t @ (Long | Double), Long]) => Arc::new(RateSupplier::new(*t)),
            (other, types) => {
                let types = types.iter().map(|t| t.name()).collect::<Vec<_>>().join(", ");
                return Err(ExecError::invalid_input(format!(
                    "no aggregate function [{other}] accepting [{types}]"
                )));
            }
        };
    Ok(supplier)
}

/// Numeric element types aggregated without conversion.
pub(crate) trait NumericValue:
    ArrowNativeType + Copy + PartialOrd + Send + Sync + fmt::Debug + 'static
{
    type Arrow: ArrowPrimitiveType<Native = Self>;
    const ELEMENT: ElementType;

    fn to_f64(self) -> f64;
}

impl NumericValue for i32 {
    type Arrow = Int32Type;
    const ELEMENT: ElementType = ElementType::Int;

    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl NumericValue for i64 {
    type Arrow = Int64Type;
    const ELEMENT: ElementType = ElementType::Long;

    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl NumericValue for f64 {
    type Arrow = Float64Type;
    const ELEMENT: ElementType = ElementType::Double;

    fn to_f64(self) -> f64 {
        self
    }
}

/// Value buffer of a numeric block, addressed by value index.
pub(crate) fn numeric_values<T: NumericValue>(block: &Block) -> ExecResult<&[T]> {
    if block.element_type() != T::ELEMENT {
        return Err(ExecError::Internal(format!(
            "expected a {} block, got {}",
            T::ELEMENT,
            block.element_type()
        )));
    }
    block
        .values()
        .as_primitive_opt::<T::Arrow>()
        .map(|values| values.values().as_ref())
        .ok_or_else(|| ExecError::Internal(format!("{} block is not primitive", T::ELEMENT)))
}

/// The values of `position` within a buffer from [`numeric_values`].
pub(crate) fn position_slice<'a, T: Copy>(block: &Block, values: &'a [T], position: usize) -> &'a [T] {
    let first = block.first_value_index(position);
    &values[first..first + block.value_count(position)]
}

/// Numeric value at `index` of any numeric block, widened to double.
pub(crate) fn value_as_f64(block: &Block, index: usize) -> ExecResult<f64> {
    Ok(match block.element_type() {
        ElementType::Int => block.as_ints()?.get(index) as f64,
        ElementType::Long => block.as_longs()?.get(index) as f64,
        ElementType::Double => block.as_doubles()?.get(index),
        other => {
            return Err(ExecError::Internal(format!("{other} block is not numeric")));
        }
    })
}
