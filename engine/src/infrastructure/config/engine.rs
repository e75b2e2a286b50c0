//! Batch engine configuration for docflux.
//!
//! This module defines worker pool, admission and retention settings.

use serde::Deserialize;

/// Batch engine settings.
#[derive(Debug, Deserialize, Clone)]
pub struct EngineSettings {
    /// Maximum number of tasks executing concurrently (default: 10)
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,

    /// Maximum number of items per batch (default: 50)
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Maximum sum of item sizes per batch in bytes (default: 1 GiB)
    #[serde(default = "default_max_total_size_bytes")]
    pub max_total_size_bytes: u64,

    /// Per-item execution timeout in seconds (default: 300)
    #[serde(default = "default_item_timeout_secs")]
    pub item_timeout_secs: u64,

    /// Maximum retries per task (default: 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Retention window for terminal tasks in hours (default: 24)
    #[serde(default = "default_retention_hours")]
    pub retention_hours: i64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: default_max_concurrent_tasks(),
            max_batch_size: default_max_batch_size(),
            max_total_size_bytes: default_max_total_size_bytes(),
            item_timeout_secs: default_item_timeout_secs(),
            max_retries: default_max_retries(),
            retention_hours: default_retention_hours(),
        }
    }
}

fn default_max_concurrent_tasks() -> usize {
    10
}

fn default_max_batch_size() -> usize {
    50
}

fn default_max_total_size_bytes() -> u64 {
    1024 * 1024 * 1024
}

fn default_item_timeout_secs() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    3
}

fn default_retention_hours() -> i64 {
    24
}
