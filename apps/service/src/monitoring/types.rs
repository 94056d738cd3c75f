use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Status of a monitoring check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorStatus {
    Up,
    Down,
    Unknown,
}

impl std::fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorStatus::Up => write!(f, "up"),
            MonitorStatus::Down => write!(f, "down"),
            MonitorStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Result of a single health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    /// Service that was checked
    pub service_id: i64,

    /// When the check started
    pub timestamp: DateTime<Utc>,

    pub status: MonitorStatus,

    /// Time until the target answered (or until the check gave up)
    pub latency: Duration,

    /// HTTP status code (if applicable)
    pub status_code: Option<u16>,

    /// Response body, possibly truncated
    pub body: String,

    /// Error message (if check failed)
    pub error_message: Option<String>,
}

impl CheckResult {
    pub fn new(service_id: i64, timestamp: DateTime<Utc>) -> Self {
        Self {
            service_id,
            timestamp,
            status: MonitorStatus::Unknown,
            latency: Duration::ZERO,
            status_code: None,
            body: String::new(),
            error_message: None,
        }
    }

    /// Mark the check as successful
    pub fn success(mut self, latency: Duration, status_code: Option<u16>, body: String) -> Self {
        self.status = MonitorStatus::Up;
        self.latency = latency;
        self.status_code = status_code;
        self.body = body;
        self
    }

    /// Mark the check as failed with error
    pub fn failure(mut self, latency: Duration, error: String, status_code: Option<u16>) -> Self {
        self.status = MonitorStatus::Down;
        self.latency = latency;
        self.error_message = Some(error);
        self.status_code = status_code;
        self
    }

    pub fn is_up(&self) -> bool {
        self.status == MonitorStatus::Up
    }
}
