use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::detectors::Severity;

/// Score buckets plus the blocking cut-off, all on the 0-100 scale.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub low: u8,
    pub medium: u8,
    pub high: u8,
    /// At or above this, the composite verdict is blocked.
    pub block: u8,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            low: 20,
            medium: 50,
            high: 80,
            block: 90,
        }
    }
}

impl RiskThresholds {
    /// Coarse bucket label: below `low` is low, at or above `high` is high,
    /// everything in between is medium.
    pub fn bucket(&self, risk_level: u8) -> &'static str {
        if risk_level >= self.high {
            "high"
        } else if risk_level >= self.low {
            "medium"
        } else {
            "low"
        }
    }
}

/// The composite scoring outcome for one transaction. Created exactly once,
/// immutable afterwards, persisted verbatim.
///
/// Invariant: `risk_level` is the clamped 0-100 score (the numeric level,
/// not the bucket name).
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub transaction_hash: String,
    pub from_address: String,
    pub to_address: Option<String>,
    pub risk_level: u8,
    pub risk_factors: Vec<String>,
    pub anomalies: Vec<String>,
    pub malicious_patterns: Vec<String>,
    pub recommendations: Vec<String>,
    pub blocked: bool,
    pub block_reason: Option<String>,
    pub analyzed_at: DateTime<Utc>,
}

/// Raised and persisted only when the composite score reaches the high
/// threshold. Triage (`status` → resolved) happens outside the engine.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityAlert {
    pub transaction_hash: String,
    pub severity: Severity,
    pub description: String,
    pub anomalies: Vec<String>,
    pub malicious_patterns: Vec<String>,
    pub blocked: bool,
    pub block_reason: Option<String>,
    pub status: String,
    pub raised_at: DateTime<Utc>,
}
