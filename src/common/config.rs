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
use crate::novacompute_config::config as novacompute_app_config;

pub(crate) fn exec_max_page_size() -> usize {
    novacompute_app_config()
        .ok()
        .map(|c| c.exec.max_page_size)
        .unwrap_or(4096)
}

pub(crate) fn exec_max_warnings_per_evaluator() -> usize {
    novacompute_app_config()
        .ok()
        .map(|c| c.exec.max_warnings_per_evaluator)
        .unwrap_or(20)
}

pub(crate) fn exec_query_mem_limit_bytes() -> i64 {
    novacompute_app_config()
        .ok()
        .map(|c| c.exec.query_mem_limit_bytes)
        .unwrap_or(-1)
}

pub(crate) fn exec_big_array_initial_capacity() -> usize {
    novacompute_app_config()
        .ok()
        .map(|c| c.exec.big_array_initial_capacity)
        .unwrap_or(16)
}
