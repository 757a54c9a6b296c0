use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::monitor::MonitorRules;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default)]
    pub rules: MonitorRules,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_block: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct AddressRequest {
    pub address: String,
}

#[derive(Debug, Serialize)]
pub struct AddressResponse {
    pub address: String,
    pub changed: bool,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub tx_hash: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub min_risk_level: Option<u8>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatsParams {
    /// Statistics window in seconds, default 24 hours.
    pub window_secs: Option<u64>,
}
