use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type TargetId = u64;
pub type CheckId = u64;
pub type ResultId = u64;

/// Kind of endpoint a target addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TargetKind {
    WebApp,
    Host,
}

/// The closed set of probe types. Adding a variant forces every dispatch
/// site to handle it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckType {
    HttpGet,
    Ping,
    TcpPort,
}

impl fmt::Display for CheckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CheckType::HttpGet => "HTTP_GET",
            CheckType::Ping => "PING",
            CheckType::TcpPort => "TCP_PORT",
        };
        f.write_str(name)
    }
}

/// A monitored endpoint. The enabled flag gates whether its checks get
/// scheduled; it has no effect on checks that are already running.
#[derive(Clone, Debug, Serialize)]
pub struct Target {
    pub id: TargetId,
    pub name: String,
    pub address: String,
    pub kind: TargetKind,
    pub enabled: bool,
}

/// A configured probe against a target. The owning target is carried fully
/// resolved so a firing never needs another lookup.
#[derive(Clone, Debug)]
pub struct CheckDefinition {
    pub id: CheckId,
    pub target: Arc<Target>,
    pub check_type: CheckType,
    pub parameters: Option<String>,
    pub interval_seconds: u64,
}

/// Outcome of one probe, not yet persisted. The sink assigns the id.
#[derive(Clone, Debug)]
pub struct NewCheckResult {
    pub check_id: CheckId,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub response_time_ms: u64,
    pub status_code: Option<u16>,
    pub error_message: Option<String>,
}

/// The immutable record of one probe outcome.
#[derive(Clone, Debug, Serialize)]
pub struct CheckResult {
    pub id: ResultId,
    pub check_id: CheckId,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub response_time_ms: u64,
    pub status_code: Option<u16>,
    pub error_message: Option<String>,
}
