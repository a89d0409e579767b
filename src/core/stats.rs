use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Collection-level statistics for monitoring, returned by
/// `Collection::stats`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionStats {
    pub uptime_secs: u64,
    pub start_time: SystemTime,

    pub total_documents: usize,
    pub deleted_documents: usize,
    pub index_size_bytes: u64,
    pub store_size_bytes: u64,

    pub queries_per_second: f64,
    pub writes_per_second: f64,
    pub last_flush_time: Option<SystemTime>,
    pub last_commit_time: Option<SystemTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum HealthStatus {
    Healthy,
    Degraded(String),
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
    pub message: Option<String>,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub status: HealthStatus,
    pub checks: Vec<HealthCheck>,
    pub timestamp: SystemTime,
}
