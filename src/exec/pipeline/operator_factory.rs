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
//! Plan-time operator descriptions. One factory is shared by every driver that
//! runs the same chain; each driver asks it for a fresh operator bound to its own
//! context, so operator state never crosses drivers.

use super::operator::Operator;
use crate::common::error::ExecResult;
use crate::runtime::driver_context::DriverContext;

pub trait OperatorFactory: Send + Sync {
    fn name(&self) -> &str;

    /// Fails when the operator cannot reserve its initial memory.
    fn create(&self, ctx: &DriverContext) -> ExecResult<Box<dyn Operator>>;

    fn is_source(&self) -> bool {
        false
    }
}
