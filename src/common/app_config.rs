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
use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static CONFIG: OnceLock<NovaComputeConfig> = OnceLock::new();

fn default_log_level() -> String {
    "info".to_string()
}

pub fn init_from_path(path: impl AsRef<Path>) -> Result<&'static NovaComputeConfig> {
    if let Some(cfg) = CONFIG.get() {
        return Ok(cfg);
    }
    let path = path.as_ref().to_path_buf();
    let cfg = NovaComputeConfig::load_from_file(&path)?;
    install(cfg)
}

pub fn init_from_env_or_default() -> Result<&'static NovaComputeConfig> {
    if let Some(cfg) = CONFIG.get() {
        return Ok(cfg);
    }
    let path = config_path_from_env_or_default()?;
    let cfg = NovaComputeConfig::load_from_file(&path)?;
    install(cfg)
}

pub fn config() -> Result<&'static NovaComputeConfig> {
    init_from_env_or_default()
}

fn install(cfg: NovaComputeConfig) -> Result<&'static NovaComputeConfig> {
    let _ = CONFIG.set(cfg);
    CONFIG
        .get()
        .ok_or_else(|| anyhow!("novacompute config was not installed"))
}

fn config_path_from_env_or_default() -> Result<PathBuf> {
    if let Ok(p) = std::env::var("NOVACOMPUTE_CONFIG") {
        if !p.trim().is_empty() {
            return Ok(PathBuf::from(p));
        }
    }

    let candidates = [PathBuf::from("novacompute.toml")];
    for p in candidates {
        if p.exists() {
            return Ok(p);
        }
    }

    Err(anyhow!(
        "missing config file: set $NOVACOMPUTE_CONFIG or create ./novacompute.toml"
    ))
}

#[derive(Clone, Debug, Deserialize)]
pub struct NovaComputeConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Optional full tracing EnvFilter expression.
    /// If set, this takes precedence over `log_level`.
    /// Example: "novacompute=debug,novacompute::exec::expr=trace"
    #[serde(default)]
    pub log_filter: Option<String>,

    #[serde(default)]
    pub exec: ExecConfig,
}

impl NovaComputeConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read config file: {}", path.display()))?;
        Self::parse(&s).with_context(|| format!("parse toml: {}", path.display()))
    }

    pub fn parse(s: &str) -> Result<Self> {
        let cfg: NovaComputeConfig = toml::from_str(s)?;
        cfg.exec.validate()?;
        Ok(cfg)
    }

    /// The filter handed to `logging::init_with_level`.
    pub fn effective_log_filter(&self) -> &str {
        self.log_filter
            .as_deref()
            .filter(|f| !f.trim().is_empty())
            .unwrap_or(&self.log_level)
    }
}

impl Default for NovaComputeConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_filter: None,
            exec: ExecConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ExecConfig {
    /// Upper bound on rows per page emitted by aggregation operators.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
    /// Warnings kept per evaluator before further ones are only counted. 0 keeps all.
    #[serde(default = "default_max_warnings_per_evaluator")]
    pub max_warnings_per_evaluator: usize,
    /// Logical memory limit for one query; negative means unlimited.
    #[serde(default = "default_query_mem_limit_bytes")]
    pub query_mem_limit_bytes: i64,
    #[serde(default = "default_big_array_initial_capacity")]
    pub big_array_initial_capacity: usize,
}

fn default_max_page_size() -> usize {
    4096
}
fn default_max_warnings_per_evaluator() -> usize {
    20
}
fn default_query_mem_limit_bytes() -> i64 {
    -1
}
fn default_big_array_initial_capacity() -> usize {
    16
}

impl ExecConfig {
    fn validate(&self) -> Result<()> {
        if self.max_page_size == 0 {
            return Err(anyhow!("exec.max_page_size must be positive"));
        }
        Ok(())
    }
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            max_page_size: default_max_page_size(),
            max_warnings_per_evaluator: default_max_warnings_per_evaluator(),
            query_mem_limit_bytes: default_query_mem_limit_bytes(),
            big_array_initial_capacity: default_big_array_initial_capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::NovaComputeConfig;

    #[test]
    fn test_exec_defaults_apply_to_empty_section() {
        let cfg = NovaComputeConfig::parse(
            r#"
[exec]
"#,
        )
        .expect("parse config");
        assert_eq!(cfg.exec.max_page_size, 4096);
        assert_eq!(cfg.exec.max_warnings_per_evaluator, 20);
        assert_eq!(cfg.exec.query_mem_limit_bytes, -1);
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn test_exec_values_can_be_overridden() {
        let cfg = NovaComputeConfig::parse(
            r#"
log_level = "debug"
log_filter = "novacompute=trace"

[exec]
max_page_size = 128
max_warnings_per_evaluator = 0
query_mem_limit_bytes = 1048576
"#,
        )
        .expect("parse config");
        assert_eq!(cfg.exec.max_page_size, 128);
        assert_eq!(cfg.exec.max_warnings_per_evaluator, 0);
        assert_eq!(cfg.exec.query_mem_limit_bytes, 1_048_576);
        assert_eq!(cfg.effective_log_filter(), "novacompute=trace");
    }

    #[test]
    fn test_zero_page_size_is_rejected() {
        let err = NovaComputeConfig::parse("[exec]\nmax_page_size = 0\n").expect_err("invalid");
        assert!(err.to_string().contains("max_page_size"), "err={err}");
    }
}
