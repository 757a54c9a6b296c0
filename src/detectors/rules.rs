use alloy::primitives::{utils::format_ether, U256};
use chrono::{DateTime, Timelike};

use crate::chain::{ChainReader, RawTransaction};
use crate::error::EngineResult;

use super::types::{DetectorKind, DetectorVerdict, Severity};

/// Baseline gas price the ratio checks are anchored to: 20 Gwei.
const NORMAL_GAS_PRICE_WEI: u128 = 20_000_000_000;

/// Night hours (UTC, inclusive) treated as a weak anomaly signal.
const NIGHT_HOURS: std::ops::RangeInclusive<u32> = 2..=5;

pub(crate) fn wei_to_eth(value: U256) -> f64 {
    format_ether(value).parse().unwrap_or(0.0)
}

/// Score the transferred value. Anything above 50 ETH is treated as a
/// possible theft; smaller amounts contribute progressively less.
pub fn check_transaction_value(tx: &RawTransaction) -> DetectorVerdict {
    let kind = DetectorKind::TransactionValue;
    let eth = wei_to_eth(tx.value);

    let (score, is_anomalous, severity, description) = if eth > 50.0 {
        (
            40,
            true,
            Severity::High,
            format!("abnormally large transfer: {eth} ETH (possible theft)"),
        )
    } else if eth > 10.0 {
        (
            25,
            true,
            Severity::Medium,
            format!("large transfer: {eth} ETH"),
        )
    } else if eth > 1.0 {
        (
            10,
            false,
            Severity::Low,
            format!("moderate transfer: {eth} ETH"),
        )
    } else {
        return DetectorVerdict::quiet(kind);
    };

    DetectorVerdict {
        kind,
        score,
        is_anomalous,
        severity,
        description,
        pattern: None,
        evidence: serde_json::json!({ "value_eth": eth }),
    }
}

/// Score the gas price against the 20 Gwei baseline. A >10x ratio reads as
/// fee-bidding typical of MEV; a <0.1x ratio is suspicious in its own right.
pub fn check_gas_price(tx: &RawTransaction) -> DetectorVerdict {
    let kind = DetectorKind::GasPrice;
    let ratio = tx.gas_price as f64 / NORMAL_GAS_PRICE_WEI as f64;
    let gwei = tx.gas_price as f64 / 1e9;

    let (score, severity, description) = if ratio > 10.0 {
        (
            35,
            Severity::High,
            format!("extreme gas price: {gwei} Gwei (possible MEV attack)"),
        )
    } else if ratio > 5.0 {
        (
            25,
            Severity::Medium,
            format!("unusually high gas price: {gwei} Gwei"),
        )
    } else if ratio < 0.1 {
        (
            15,
            Severity::Low,
            format!("unusually low gas price: {gwei} Gwei"),
        )
    } else {
        return DetectorVerdict::quiet(kind);
    };

    DetectorVerdict {
        kind,
        score,
        is_anomalous: true,
        severity,
        description,
        pattern: None,
        evidence: serde_json::json!({ "gas_price_gwei": gwei, "baseline_ratio": ratio }),
    }
}

/// Flag transactions landing in the night-hour window of the block's UTC
/// timestamp. A weak signal on its own; corroborates stronger detectors.
pub fn check_time_pattern(tx: &RawTransaction) -> DetectorVerdict {
    let kind = DetectorKind::TimePattern;
    let hour = DateTime::from_timestamp(tx.block_timestamp as i64, 0)
        .map(|dt| dt.hour())
        .unwrap_or(12);

    if !NIGHT_HOURS.contains(&hour) {
        return DetectorVerdict::quiet(kind);
    }

    DetectorVerdict {
        kind,
        score: 10,
        is_anomalous: true,
        severity: Severity::Low,
        description: format!("night-time transaction (hour {hour} UTC)"),
        pattern: None,
        evidence: serde_json::json!({ "hour_utc": hour }),
    }
}

/// Flag low-history counterparties. An account with fewer than 5 sent
/// transactions is treated as new; contributes risk factors, not anomalies.
pub async fn check_address_behavior(
    chain: &dyn ChainReader,
    tx: &RawTransaction,
) -> EngineResult<DetectorVerdict> {
    let kind = DetectorKind::AddressBehavior;
    let mut score = 0u8;
    let mut factors = Vec::new();

    let from_count = chain.get_transaction_count(tx.from).await?;
    if from_count < 5 {
        score += 15;
        factors.push("new sender address");
    }

    let mut to_count = None;
    if let Some(to) = tx.to {
        let count = chain.get_transaction_count(to).await?;
        if count < 5 {
            score += 10;
            factors.push("new receiver address");
        }
        to_count = Some(count);
    }

    if score == 0 {
        return Ok(DetectorVerdict::quiet(kind));
    }

    Ok(DetectorVerdict {
        kind,
        score,
        is_anomalous: false,
        severity: Severity::Low,
        description: factors.join("; "),
        pattern: None,
        evidence: serde_json::json!({
            "from_tx_count": from_count,
            "to_tx_count": to_count,
        }),
    })
}

/// Score contract calls. Any interaction with deployed code contributes a
/// base amount; oversized calldata (>1000 hex chars) reads as a complex call.
pub async fn check_contract_interaction(
    chain: &dyn ChainReader,
    tx: &RawTransaction,
) -> EngineResult<DetectorVerdict> {
    let kind = DetectorKind::ContractInteraction;
    let Some(to) = tx.to else {
        return Ok(DetectorVerdict::quiet(kind));
    };
    if !chain.is_contract(to).await? {
        return Ok(DetectorVerdict::quiet(kind));
    }

    // Length of the 0x-prefixed calldata string, the unit the 1000-char
    // threshold is defined in.
    let calldata_chars = 2 + tx.input.len() * 2;
    let mut score = 10u8;
    let mut factors = vec!["contract interaction"];
    let mut severity = Severity::Low;

    if calldata_chars > 1000 {
        score += 15;
        factors.push("complex contract call");
        severity = Severity::Medium;
    }

    Ok(DetectorVerdict {
        kind,
        score,
        is_anomalous: false,
        severity,
        description: factors.join("; "),
        pattern: None,
        evidence: serde_json::json!({
            "calldata_chars": calldata_chars,
            "selector": tx.input.get(..4).map(hex::encode),
        }),
    })
}

#[cfg(test)]
mod tests {
    use alloy::primitives::Bytes;

    use crate::chain::testutil::{addr, benign_tx, eth, MockChainReader, NIGHT_TS};

    use super::*;

    #[test]
    fn value_tiers() {
        let mut tx = benign_tx(1, addr(1), addr(2));

        tx.value = eth(60);
        let v = check_transaction_value(&tx);
        assert_eq!(v.score, 40);
        assert!(v.is_anomalous);
        assert_eq!(v.severity, Severity::High);

        tx.value = eth(20);
        let v = check_transaction_value(&tx);
        assert_eq!(v.score, 25);
        assert!(v.is_anomalous);

        tx.value = eth(2);
        let v = check_transaction_value(&tx);
        assert_eq!(v.score, 10);
        assert!(!v.is_anomalous);

        tx.value = eth(1) / U256::from(2);
        assert_eq!(check_transaction_value(&tx).score, 0);
    }

    #[test]
    fn gas_price_tiers() {
        let mut tx = benign_tx(1, addr(1), addr(2));

        tx.gas_price = 250_000_000_000; // 250 Gwei, >10x baseline
        let v = check_gas_price(&tx);
        assert_eq!(v.score, 35);
        assert!(v.is_anomalous);

        tx.gas_price = 150_000_000_000; // 7.5x
        assert_eq!(check_gas_price(&tx).score, 25);

        tx.gas_price = 1_000_000_000; // 0.05x
        let v = check_gas_price(&tx);
        assert_eq!(v.score, 15);
        assert_eq!(v.severity, Severity::Low);

        tx.gas_price = 20_000_000_000; // baseline
        assert_eq!(check_gas_price(&tx).score, 0);
    }

    #[test]
    fn night_hours_flagged() {
        let mut tx = benign_tx(1, addr(1), addr(2));
        assert_eq!(check_time_pattern(&tx).score, 0);

        tx.block_timestamp = NIGHT_TS;
        let v = check_time_pattern(&tx);
        assert_eq!(v.score, 10);
        assert!(v.is_anomalous);
    }

    #[tokio::test]
    async fn new_counterparties_add_factors() {
        let chain = MockChainReader::default();
        let tx = benign_tx(1, addr(1), addr(2));

        // Both counterparties unscripted: seasoned, no factors.
        let v = check_address_behavior(&chain, &tx).await.unwrap();
        assert_eq!(v.score, 0);

        chain.set_tx_count(addr(1), 2);
        chain.set_tx_count(addr(2), 0);
        let v = check_address_behavior(&chain, &tx).await.unwrap();
        assert_eq!(v.score, 25);
        assert!(!v.is_anomalous);
        assert!(v.description.contains("new sender address"));
        assert!(v.description.contains("new receiver address"));
    }

    #[tokio::test]
    async fn contract_calls_scored_by_calldata_size() {
        let chain = MockChainReader::default();
        let mut tx = benign_tx(1, addr(1), addr(2));

        // Plain EOA transfer: quiet.
        assert_eq!(
            check_contract_interaction(&chain, &tx).await.unwrap().score,
            0
        );

        chain.mark_contract(addr(2));
        assert_eq!(
            check_contract_interaction(&chain, &tx).await.unwrap().score,
            10
        );

        tx.input = Bytes::from(vec![0xabu8; 600]); // "0x" + 1200 chars
        let v = check_contract_interaction(&chain, &tx).await.unwrap();
        assert_eq!(v.score, 25);
        assert!(v.description.contains("complex contract call"));
    }

    #[tokio::test]
    async fn calldata_threshold_counts_the_prefixed_string() {
        let chain = MockChainReader::default();
        let mut tx = benign_tx(1, addr(1), addr(2));
        chain.mark_contract(addr(2));

        // 500 bytes -> "0x" + 1000 chars = 1002: over the threshold.
        tx.input = Bytes::from(vec![0u8; 500]);
        let v = check_contract_interaction(&chain, &tx).await.unwrap();
        assert_eq!(v.score, 25);

        // 499 bytes -> exactly 1000 chars: not over.
        tx.input = Bytes::from(vec![0u8; 499]);
        let v = check_contract_interaction(&chain, &tx).await.unwrap();
        assert_eq!(v.score, 10);
    }
}
