use serde::Serialize;
use serde_json::Value as JsonValue;

/// The anomaly dimensions the bank scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorKind {
    TransactionValue,
    GasPrice,
    TimePattern,
    AddressBehavior,
    ContractInteraction,
    HighFrequency,
    CircularTransfer,
}

impl DetectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TransactionValue => "transaction_value",
            Self::GasPrice => "gas_price",
            Self::TimePattern => "time_pattern",
            Self::AddressBehavior => "address_behavior",
            Self::ContractInteraction => "contract_interaction",
            Self::HighFrequency => "high_frequency",
            Self::CircularTransfer => "circular_transfer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// One detector's view of one transaction. Transient: folded into the
/// composite `AnalysisResult`, never persisted on its own.
#[derive(Debug, Clone)]
pub struct DetectorVerdict {
    pub kind: DetectorKind,
    pub score: u8,
    pub is_anomalous: bool,
    pub severity: Severity,
    pub description: String,
    /// Named malicious pattern, set only by the windowed detectors.
    pub pattern: Option<&'static str>,
    pub evidence: JsonValue,
}

impl DetectorVerdict {
    /// A verdict that contributes nothing to the composite score. Used when
    /// a rule does not fire and as the firewall for a failing detector: the
    /// error lands in evidence instead of aborting the other detectors.
    pub fn quiet(kind: DetectorKind) -> Self {
        Self {
            kind,
            score: 0,
            is_anomalous: false,
            severity: Severity::Low,
            description: String::new(),
            pattern: None,
            evidence: JsonValue::Null,
        }
    }

    pub fn failed(kind: DetectorKind, error: &str) -> Self {
        Self {
            evidence: serde_json::json!({ "error": error }),
            ..Self::quiet(kind)
        }
    }
}
