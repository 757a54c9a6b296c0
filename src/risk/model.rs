use chrono::{DateTime, Utc};

use crate::chain::RawTransaction;
use crate::detectors::{DetectorKind, DetectorVerdict, Severity};

use super::types::{AnalysisResult, RiskThresholds, SecurityAlert};

/// Added to the composite score when two or more distinct malicious patterns
/// accumulate. Folded into the persisted risk level before the block check.
const MULTI_PATTERN_ESCALATION: u32 = 30;

/// Alert severity splits at this risk level.
const CRITICAL_ALERT_LEVEL: u8 = 75;

/// Fold all detector verdicts into one `AnalysisResult`.
///
/// Pure function of the transaction and its verdicts: detector scores are
/// summed without re-weighting (each detector is an independently sufficient
/// signal), the multi-pattern escalation is applied, the total is clamped to
/// [0, 100], and the blocked verdict is decided. The circular-transfer
/// pattern forces `blocked` regardless of the numeric score.
pub fn compose(
    tx: &RawTransaction,
    verdicts: &[DetectorVerdict],
    thresholds: &RiskThresholds,
    now: DateTime<Utc>,
) -> AnalysisResult {
    let mut total: u32 = 0;
    let mut risk_factors = Vec::new();
    let mut anomalies = Vec::new();
    let mut malicious_patterns: Vec<String> = Vec::new();
    let mut value_anomaly = false;
    let mut circular = false;

    for verdict in verdicts {
        total += verdict.score as u32;

        match verdict.kind {
            // These two contribute contextual risk factors, not anomalies.
            DetectorKind::AddressBehavior | DetectorKind::ContractInteraction => {
                if verdict.score > 0 {
                    risk_factors.extend(verdict.description.split("; ").map(str::to_string));
                }
            }
            _ => {
                if verdict.is_anomalous {
                    anomalies.push(verdict.description.clone());
                }
            }
        }

        if verdict.is_anomalous {
            if let Some(pattern) = verdict.pattern {
                if !malicious_patterns.iter().any(|p| p == pattern) {
                    malicious_patterns.push(pattern.to_string());
                }
            }
            if verdict.kind == DetectorKind::TransactionValue {
                value_anomaly = true;
            }
            if verdict.kind == DetectorKind::CircularTransfer {
                circular = true;
            }
        }
    }

    let mut block_reason = None;
    if malicious_patterns.len() >= 2 {
        total += MULTI_PATTERN_ESCALATION;
        block_reason = Some(format!(
            "multiple malicious patterns: {}",
            malicious_patterns.join(", ")
        ));
    }

    let risk_level = total.min(100) as u8;

    let mut blocked = false;
    if risk_level >= thresholds.block {
        blocked = true;
        if block_reason.is_none() {
            block_reason = Some(format!(
                "risk level {risk_level}/100 at or above block threshold"
            ));
        }
    }
    if circular {
        blocked = true;
        block_reason = Some("circular transfer laundering detected".to_string());
    }
    if !blocked {
        block_reason = None;
    }

    let mut recommendations: Vec<String> = if risk_level >= thresholds.high {
        vec![
            "halt related operations and investigate immediately".to_string(),
            "escalate to the security team for manual review".to_string(),
        ]
    } else if risk_level >= thresholds.medium {
        vec![
            "handle with caution and require additional verification".to_string(),
            "watch follow-up activity from the involved addresses".to_string(),
        ]
    } else {
        vec!["risk is low, safe to process normally".to_string()]
    };
    if value_anomaly {
        recommendations.push("verify the legitimacy of the large transfer".to_string());
    }

    AnalysisResult {
        transaction_hash: format!("{:#x}", tx.hash),
        from_address: format!("{:#x}", tx.from),
        to_address: tx.to.map(|to| format!("{to:#x}")),
        risk_level,
        risk_factors,
        anomalies,
        malicious_patterns,
        recommendations,
        blocked,
        block_reason,
        analyzed_at: now,
    }
}

/// Derive the alert record for an analysis that crossed the high threshold.
pub fn build_alert(analysis: &AnalysisResult) -> SecurityAlert {
    let severity = if analysis.risk_level >= CRITICAL_ALERT_LEVEL {
        Severity::Critical
    } else {
        Severity::High
    };

    SecurityAlert {
        transaction_hash: analysis.transaction_hash.clone(),
        severity,
        description: format!(
            "high-risk transaction detected (risk level {})",
            analysis.risk_level
        ),
        anomalies: analysis.anomalies.clone(),
        malicious_patterns: analysis.malicious_patterns.clone(),
        blocked: analysis.blocked,
        block_reason: analysis.block_reason.clone(),
        status: "active".to_string(),
        raised_at: analysis.analyzed_at,
    }
}

#[cfg(test)]
mod tests {
    use crate::chain::testutil::{addr, benign_tx};
    use crate::detectors::{CIRCULAR_TRANSFER_PATTERN, HIGH_FREQUENCY_PATTERN};

    use super::*;

    fn verdict(kind: DetectorKind, score: u8, anomalous: bool) -> DetectorVerdict {
        DetectorVerdict {
            score,
            is_anomalous: anomalous,
            description: format!("{} fired", kind.as_str()),
            ..DetectorVerdict::quiet(kind)
        }
    }

    fn pattern_verdict(kind: DetectorKind, score: u8, pattern: &'static str) -> DetectorVerdict {
        DetectorVerdict {
            pattern: Some(pattern),
            severity: Severity::Critical,
            ..verdict(kind, score, true)
        }
    }

    #[test]
    fn lone_value_anomaly_lands_in_medium_bucket() {
        let tx = benign_tx(1, addr(1), addr(2));
        let verdicts = vec![verdict(DetectorKind::TransactionValue, 40, true)];

        let thresholds = RiskThresholds::default();
        let result = compose(&tx, &verdicts, &thresholds, Utc::now());
        assert_eq!(result.risk_level, 40);
        assert_eq!(thresholds.bucket(result.risk_level), "medium");
        assert!(!result.blocked);
        assert!(result.block_reason.is_none());
        assert_eq!(result.anomalies.len(), 1);
        assert!(result
            .recommendations
            .iter()
            .any(|r| r.contains("verify the legitimacy")));
    }

    #[test]
    fn risk_level_is_clamped_to_100() {
        let tx = benign_tx(1, addr(1), addr(2));
        let verdicts = vec![
            verdict(DetectorKind::TransactionValue, 40, true),
            verdict(DetectorKind::GasPrice, 35, true),
            pattern_verdict(DetectorKind::HighFrequency, 45, HIGH_FREQUENCY_PATTERN),
            pattern_verdict(DetectorKind::CircularTransfer, 50, CIRCULAR_TRANSFER_PATTERN),
        ];

        let result = compose(&tx, &verdicts, &RiskThresholds::default(), Utc::now());
        assert_eq!(result.risk_level, 100);
        assert!(result.blocked);
    }

    #[test]
    fn multi_pattern_escalation_is_folded_into_the_score() {
        let tx = benign_tx(1, addr(1), addr(2));
        let verdicts = vec![
            pattern_verdict(DetectorKind::HighFrequency, 25, "frequent transfers"),
            pattern_verdict(DetectorKind::GasPrice, 25, "fee spike"),
        ];

        let result = compose(&tx, &verdicts, &RiskThresholds::default(), Utc::now());
        // 25 + 25 + 30 escalation, persisted, not discarded.
        assert_eq!(result.risk_level, 80);
        assert!(!result.blocked);
        // Not blocked, so the escalation reason is not surfaced.
        assert!(result.block_reason.is_none());
    }

    #[test]
    fn escalation_reason_survives_when_it_tips_the_block_threshold() {
        let tx = benign_tx(1, addr(1), addr(2));
        let verdicts = vec![
            pattern_verdict(DetectorKind::HighFrequency, 45, HIGH_FREQUENCY_PATTERN),
            pattern_verdict(DetectorKind::GasPrice, 35, "fee spike"),
        ];

        // 45 + 35 + 30 = 110 -> clamped 100 >= 90.
        let result = compose(&tx, &verdicts, &RiskThresholds::default(), Utc::now());
        assert_eq!(result.risk_level, 100);
        assert!(result.blocked);
        assert!(result
            .block_reason
            .as_deref()
            .unwrap()
            .starts_with("multiple malicious patterns"));
    }

    #[test]
    fn circular_transfer_blocks_regardless_of_score() {
        let tx = benign_tx(1, addr(1), addr(2));
        let verdicts = vec![pattern_verdict(
            DetectorKind::CircularTransfer,
            50,
            CIRCULAR_TRANSFER_PATTERN,
        )];

        let result = compose(&tx, &verdicts, &RiskThresholds::default(), Utc::now());
        assert_eq!(result.risk_level, 50);
        assert!(result.blocked);
        assert_eq!(
            result.block_reason.as_deref(),
            Some("circular transfer laundering detected")
        );
    }

    #[test]
    fn blocked_at_block_threshold_for_any_verdict_mix() {
        let tx = benign_tx(1, addr(1), addr(2));
        let verdicts = vec![
            verdict(DetectorKind::TransactionValue, 40, true),
            verdict(DetectorKind::GasPrice, 35, true),
            verdict(DetectorKind::AddressBehavior, 15, false),
        ];

        let result = compose(&tx, &verdicts, &RiskThresholds::default(), Utc::now());
        assert_eq!(result.risk_level, 90);
        assert!(result.blocked);
        assert!(result.block_reason.is_some());
    }

    #[test]
    fn factor_detectors_feed_risk_factors_not_anomalies() {
        let tx = benign_tx(1, addr(1), addr(2));
        let verdicts = vec![DetectorVerdict {
            description: "new sender address; new receiver address".to_string(),
            ..verdict(DetectorKind::AddressBehavior, 25, false)
        }];

        let result = compose(&tx, &verdicts, &RiskThresholds::default(), Utc::now());
        assert_eq!(result.risk_factors.len(), 2);
        assert!(result.anomalies.is_empty());
        assert_eq!(result.risk_level, 25);
    }

    #[test]
    fn alert_severity_splits_at_75() {
        let tx = benign_tx(1, addr(1), addr(2));
        let thresholds = RiskThresholds::default();

        let mid = compose(
            &tx,
            &[verdict(DetectorKind::TransactionValue, 70, true)],
            &thresholds,
            Utc::now(),
        );
        assert_eq!(build_alert(&mid).severity, Severity::High);

        let hot = compose(
            &tx,
            &[
                verdict(DetectorKind::TransactionValue, 40, true),
                verdict(DetectorKind::GasPrice, 35, true),
            ],
            &thresholds,
            Utc::now(),
        );
        assert_eq!(build_alert(&hot).severity, Severity::Critical);
        assert_eq!(build_alert(&hot).status, "active");
    }
}
