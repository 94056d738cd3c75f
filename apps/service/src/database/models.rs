use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::monitoring::checker::CheckType;
use crate::monitoring::types::CheckResult;

/// Service model - a monitored target and its check cadence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: i64,
    pub name: String,
    pub check_type: CheckType,
    pub target: String,
    pub interval_seconds: u64,
    pub timeout_seconds: u64,
    pub expected_status: Option<u16>,
    pub order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Service {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Payload used to create a service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewService {
    pub name: String,
    #[serde(default = "default_check_type")]
    pub check_type: CheckType,
    pub target: String,
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub expected_status: Option<u16>,
    #[serde(default)]
    pub order: i32,
}

fn default_check_type() -> CheckType {
    CheckType::Http
}

fn default_interval() -> u64 {
    60
}

fn default_timeout() -> u64 {
    30
}

impl NewService {
    pub fn new(name: impl Into<String>, check_type: CheckType, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            check_type,
            target: target.into(),
            interval_seconds: default_interval(),
            timeout_seconds: default_timeout(),
            expected_status: None,
            order: 0,
        }
    }
}

/// Partial update of a service's configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceUpdate {
    pub name: Option<String>,
    pub target: Option<String>,
    pub interval_seconds: Option<u64>,
    pub timeout_seconds: Option<u64>,
    pub expected_status: Option<u16>,
    pub order: Option<i32>,
}

impl ServiceUpdate {
    pub fn apply(self, service: &mut Service) {
        if let Some(name) = self.name {
            service.name = name;
        }
        if let Some(target) = self.target {
            service.target = target;
        }
        if let Some(interval) = self.interval_seconds {
            service.interval_seconds = interval;
        }
        if let Some(timeout) = self.timeout_seconds {
            service.timeout_seconds = timeout;
        }
        if self.expected_status.is_some() {
            service.expected_status = self.expected_status;
        }
        if let Some(order) = self.order {
            service.order = order;
        }
    }
}

/// Derived health of a service. Lives in memory only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub online: bool,
    pub failing: bool,
    /// Microseconds
    pub latency: i64,
    /// Microseconds
    pub ping_time: i64,
    pub last_response: String,
    pub last_status_code: Option<u16>,
    pub last_check: Option<DateTime<Utc>>,
}

impl Default for ServiceHealth {
    fn default() -> Self {
        Self {
            online: true,
            failing: false,
            latency: 0,
            ping_time: 0,
            last_response: String::new(),
            last_status_code: None,
            last_check: None,
        }
    }
}

impl ServiceHealth {
    /// Fold a completed check into the health fields
    pub fn apply_check(&mut self, result: &CheckResult) {
        let micros = result.latency.as_micros().min(i64::MAX as u128) as i64;
        self.online = result.is_up();
        self.failing = !self.online;
        self.latency = micros;
        self.ping_time = micros;
        self.last_response = result.body.clone();
        self.last_status_code = result.status_code;
        self.last_check = Some(result.timestamp);
    }

    /// Fold a checkin hit into the health fields
    pub fn apply_hit(&mut self, latency: i64, at: DateTime<Utc>) {
        self.online = true;
        self.failing = false;
        self.latency = latency;
        self.ping_time = latency;
        self.last_response = String::new();
        self.last_check = Some(at);
    }
}

/// A service together with its live health, as exposed to readers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSnapshot {
    #[serde(flatten)]
    pub service: Service,
    #[serde(flatten)]
    pub health: ServiceHealth,
}

/// Checkin model - a dead-man's switch attached to a service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkin {
    pub id: i64,
    pub service_id: i64,
    pub name: String,
    pub api_key: String,
    pub interval_seconds: u64,
    #[serde(default)]
    pub failing: bool,
    #[serde(default)]
    pub last_hit_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Checkin {
    /// Expected time between two hits
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    /// Period in whole minutes, rounded up
    pub fn period_minutes(&self) -> u64 {
        self.interval_seconds.div_ceil(60)
    }
}

/// Payload used to create a checkin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCheckin {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub service_id: i64,
    #[serde(default, alias = "interval")]
    pub interval_seconds: u64,
}

/// CheckinHit model - one heartbeat received from an external agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckinHit {
    pub id: i64,
    pub checkin_id: i64,
    pub from: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCheckinHit {
    pub checkin_id: i64,
    pub from: String,
    pub created_at: DateTime<Utc>,
}

/// Failure model - immutable record of a detected problem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub id: i64,
    pub issue: String,
    pub method: String,
    pub service_id: Option<i64>,
    pub checkin_id: Option<i64>,
    /// Milliseconds
    pub ping_time: i64,
    pub error_code: Option<u16>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewFailure {
    pub issue: String,
    pub method: String,
    pub service_id: Option<i64>,
    pub checkin_id: Option<i64>,
    pub ping_time: i64,
    pub error_code: Option<u16>,
    pub created_at: DateTime<Utc>,
}

impl NewFailure {
    /// Failure detected by a service's own health check
    pub fn from_check(service: &Service, result: &CheckResult) -> Self {
        Self {
            issue: result.error_message.clone().unwrap_or_else(|| "Check failed".to_string()),
            method: service.check_type.to_string(),
            service_id: Some(service.id),
            checkin_id: None,
            ping_time: result.latency.as_millis().min(i64::MAX as u128) as i64,
            error_code: result.status_code,
            created_at: result.timestamp,
        }
    }

    /// Failure detected by a checkin watchdog
    pub fn from_checkin(checkin: &Checkin, elapsed: Duration, at: DateTime<Utc>) -> Self {
        Self {
            issue: format!("Checkin expects a request every {} minutes", checkin.period_minutes()),
            method: "checkin".to_string(),
            service_id: Some(checkin.service_id),
            checkin_id: Some(checkin.id),
            ping_time: elapsed.as_millis().min(i64::MAX as u128) as i64,
            error_code: None,
            created_at: at,
        }
    }

    pub fn into_failure(self, id: i64) -> Failure {
        Failure {
            id,
            issue: self.issue,
            method: self.method,
            service_id: self.service_id,
            checkin_id: self.checkin_id,
            ping_time: self.ping_time,
            error_code: self.error_code,
            created_at: self.created_at,
        }
    }
}

/// Persisted settings of one notifier method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifierConfig {
    pub method: String,
    pub enabled: bool,
    #[serde(default)]
    pub settings: serde_json::Value,
}

/// Convert a timestamp to unix milliseconds for storage
pub fn to_millis(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

/// Convert stored unix milliseconds back to a timestamp
pub fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}
