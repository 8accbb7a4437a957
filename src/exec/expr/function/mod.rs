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
//! Scalar function catalog.
//!
//! Functions are resolved by `(name, argument element types)` to a descriptor
//! whose builder wires the already-lowered argument factories into a specialized
//! evaluator. Every entry names one concrete type signature, so resolution never
//! dispatches per value.

mod bucket;
mod math;
mod multivalue;
mod string;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;

use super::EvaluatorFactory;
use super::kernel::{UnaryEvaluatorFactory, UnaryKernel};
use crate::common::error::{ExecError, ExecResult};
use crate::exec::block::ElementType;

pub use bucket::bucket_start;

pub(crate) type FunctionBuilder =
    fn(Vec<Arc<dyn EvaluatorFactory>>, String) -> ExecResult<Arc<dyn EvaluatorFactory>>;

#[derive(Clone, Copy)]
pub struct FunctionDescriptor {
    pub name: &'static str,
    pub return_type: ElementType,
    /// Null-aware functions see null arguments instead of short-circuiting to null.
    pub null_aware: bool,
    build: FunctionBuilder,
}

impl fmt::Debug for FunctionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDescriptor")
            .field("name", &self.name)
            .field("return_type", &self.return_type)
            .field("null_aware", &self.null_aware)
            .finish()
    }
}

impl FunctionDescriptor {
    pub(crate) fn build(
        &self,
        args: Vec<Arc<dyn EvaluatorFactory>>,
        source: String,
    ) -> ExecResult<Arc<dyn EvaluatorFactory>> {
        (self.build)(args, source)
    }
}

type FunctionKey = (String, Vec<ElementType>);

#[derive(Default)]
pub(crate) struct Registry {
    entries: HashMap<FunctionKey, FunctionDescriptor>,
}

impl Registry {
    pub(crate) fn register(
        &mut self,
        name: &'static str,
        args: &[ElementType],
        return_type: ElementType,
        build: FunctionBuilder,
    ) {
        self.insert(name, args, return_type, false, build);
    }

    pub(crate) fn register_null_aware(
        &mut self,
        name: &'static str,
        args: &[ElementType],
        return_type: ElementType,
        build: FunctionBuilder,
    ) {
        self.insert(name, args, return_type, true, build);
    }

    fn insert(
        &mut self,
        name: &'static str,
        args: &[ElementType],
        return_type: ElementType,
        null_aware: bool,
        build: FunctionBuilder,
    ) {
        self.entries.insert(
            (name.to_string(), args.to_vec()),
            FunctionDescriptor {
                name,
                return_type,
                null_aware,
                build,
            },
        );
    }
}

static FUNCTION_REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let mut registry = Registry::default();
    math::register(&mut registry);
    string::register(&mut registry);
    multivalue::register(&mut registry);
    bucket::register(&mut registry);
    registry
});

/// Case-insensitive lookup of an exact type signature.
pub fn resolve_function(name: &str, args: &[ElementType]) -> Option<&'static FunctionDescriptor> {
    FUNCTION_REGISTRY
        .entries
        .get(&(name.to_ascii_lowercase(), args.to_vec()))
}

pub fn is_known_function(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    FUNCTION_REGISTRY.entries.keys().any(|(n, _)| *n == name)
}

pub(crate) fn single_arg(
    args: Vec<Arc<dyn EvaluatorFactory>>,
    name: &str,
) -> ExecResult<Arc<dyn EvaluatorFactory>> {
    let mut args = args.into_iter();
    match (args.next(), args.next()) {
        (Some(arg), None) => Ok(arg),
        _ => Err(ExecError::invalid_input(format!(
            "{name} expects exactly one argument"
        ))),
    }
}

pub(crate) fn unary<K: UnaryKernel>(
    args: Vec<Arc<dyn EvaluatorFactory>>,
    source: String,
) -> ExecResult<Arc<dyn EvaluatorFactory>> {
    let child = single_arg(args, &source)?;
    Ok(Arc::new(UnaryEvaluatorFactory::<K>::new(child, source)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_exact_on_types_and_lenient_on_case() {
        let abs = resolve_function("ABS", &[ElementType::Long]).expect("abs(long)");
        assert_eq!(abs.return_type, ElementType::Long);
        assert!(resolve_function("abs", &[ElementType::BytesRef]).is_none());
        assert!(resolve_function("coalesce", &[ElementType::Int, ElementType::Int]).is_some());
        assert!(resolve_function("coalesce", &[ElementType::Int, ElementType::Int])
            .expect("coalesce")
            .null_aware);
        assert!(is_known_function("mv_count"));
        assert!(!is_known_function("nope"));
    }
}
