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
//! Pipeline runtime module exports.
//!
//! Responsibilities:
//! - Exposes the operator contract, operator factories and the driver that runs a chain.

pub mod driver;
pub mod operator;
pub mod operator_factory;

use std::sync::Arc;

use crate::common::error::ExecResult;
use crate::exec::operators::OperatorSpec;
use crate::exec::page::Page;
use crate::runtime::driver_context::DriverContext;

use self::driver::Driver;
use self::operator_factory::OperatorFactory;

/// Build a driver over `specs` and run it to completion.
pub fn run_chain(ctx: DriverContext, specs: Vec<OperatorSpec>) -> ExecResult<Vec<Page>> {
    let factories = specs
        .into_iter()
        .map(|spec| Arc::new(spec) as Arc<dyn OperatorFactory>)
        .collect::<Vec<_>>();
    Driver::from_factories(ctx, &factories)?.run()
}
