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
//! Core operator contract.
//!
//! Responsibilities:
//! - Defines the push/pull contract a driver uses to move pages through a chain.
//! - Sources never accept input; every other operator consumes pages from upstream.
//!
//! Key exported interfaces:
//! - Types: `Operator`.

use crate::common::error::ExecResult;
use crate::exec::page::Page;
use crate::runtime::driver_context::DriverContext;

/// One stage of a driver's operator chain.
///
/// A driver only calls `push_page` while `need_input` is true and only calls
/// `pull_page` while `has_output` is true. After `set_finishing` no more input
/// arrives; the operator flushes whatever it buffered and eventually reports
/// `is_finished`.
pub trait Operator: Send {
    fn name(&self) -> &str;

    fn need_input(&self) -> bool;

    fn has_output(&self) -> bool;

    fn push_page(&mut self, ctx: &DriverContext, page: Page) -> ExecResult<()>;

    fn pull_page(&mut self, ctx: &DriverContext) -> ExecResult<Option<Page>>;

    fn set_finishing(&mut self, ctx: &DriverContext) -> ExecResult<()>;

    fn is_finished(&self) -> bool;

    /// Release owned state. Called exactly once by the driver, also on failure.
    fn close(&mut self) {}
}
