use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::database::models::Service;

/// Upper bound on the response body kept as `last_response`
const MAX_BODY_BYTES: usize = 4096;

/// Type of monitoring check to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckType {
    Http,
    Tcp,
}

impl std::fmt::Display for CheckType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckType::Http => write!(f, "http"),
            CheckType::Tcp => write!(f, "tcp"),
        }
    }
}

impl std::str::FromStr for CheckType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" | "https" => Ok(CheckType::Http),
            "tcp" => Ok(CheckType::Tcp),
            other => Err(format!("unknown check type '{other}'")),
        }
    }
}

/// What a passing check observed
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub latency: Duration,
    pub status_code: Option<u16>,
    pub body: String,
}

/// A response arrived but its status was not acceptable
#[derive(Debug, thiserror::Error)]
#[error("HTTP check failed with status code: {status}")]
pub struct UnexpectedStatus {
    pub status: u16,
}

/// Checker trait for the different kinds of health checks
///
/// Implementations do not enforce the service timeout themselves; the
/// executor bounds every call.
#[async_trait::async_trait]
pub trait Checker: Send + Sync {
    async fn check(&self, service: &Service) -> Result<CheckOutcome>;
}

/// HTTP/HTTPS checker
pub struct HttpChecker {
    client: reqwest::Client,
}

impl HttpChecker {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;

        Ok(Self { client })
    }
}

fn truncate_body(mut body: String) -> String {
    if body.len() > MAX_BODY_BYTES {
        let mut cut = MAX_BODY_BYTES;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}

#[async_trait::async_trait]
impl Checker for HttpChecker {
    async fn check(&self, service: &Service) -> Result<CheckOutcome> {
        let start = Instant::now();

        let response = self
            .client
            .get(&service.target)
            .send()
            .await
            .map_err(|e| anyhow!("HTTP request failed: {}", e))?;

        let latency = start.elapsed();
        let status = response.status();

        let accepted = match service.expected_status {
            Some(expected) => status.as_u16() == expected,
            // Consider 2xx and 3xx as success
            None => status.is_success() || status.is_redirection(),
        };
        if !accepted {
            return Err(UnexpectedStatus { status: status.as_u16() }.into());
        }

        let body = response.text().await.unwrap_or_default();

        Ok(CheckOutcome { latency, status_code: Some(status.as_u16()), body: truncate_body(body) })
    }
}

/// TCP port checker
pub struct TcpChecker;

#[async_trait::async_trait]
impl Checker for TcpChecker {
    async fn check(&self, service: &Service) -> Result<CheckOutcome> {
        let start = Instant::now();

        tokio::net::TcpStream::connect(service.target.as_str())
            .await
            .map_err(|e| anyhow!("TCP connection failed: {}", e))?;

        Ok(CheckOutcome { latency: start.elapsed(), status_code: None, body: String::new() })
    }
}
