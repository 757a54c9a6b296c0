pub mod rules;
pub mod types;
pub mod windows;

pub use types::{DetectorKind, DetectorVerdict, Severity};
pub use windows::{
    CIRCULAR_TRANSFER_PATTERN, FREQUENT_TRANSFERS_PATTERN, HIGH_FREQUENCY_PATTERN,
};

use crate::chain::{ChainReader, RawTransaction};

use windows::{CircularTransferDetector, HighFrequencyDetector};

/// The fixed set of anomaly detectors, run per transaction.
///
/// The stateless rules are pure; the two windowed detectors own their
/// sliding-window state and serialize mutation internally. The bank itself
/// carries no other state, so one instance serves both the live pipeline and
/// the one-off analysis path.
#[derive(Default)]
pub struct DetectorBank {
    high_frequency: HighFrequencyDetector,
    circular_transfer: CircularTransferDetector,
}

impl DetectorBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every detector against one transaction. Detector failures (the
    /// two chain-lookup rules are the only fallible ones) are converted into
    /// quiet verdicts carrying the error as evidence; one failing detector
    /// never suppresses the others.
    ///
    /// The chain-lookup rules run concurrently; the windowed detectors run
    /// last, in arrival order, so their windows see transactions in the same
    /// order the queue drained them.
    pub async fn run_all(
        &self,
        chain: &dyn ChainReader,
        tx: &RawTransaction,
        now_ms: i64,
    ) -> Vec<DetectorVerdict> {
        let mut verdicts = vec![
            rules::check_transaction_value(tx),
            rules::check_gas_price(tx),
            rules::check_time_pattern(tx),
        ];

        let (address_verdict, contract_verdict) = tokio::join!(
            rules::check_address_behavior(chain, tx),
            rules::check_contract_interaction(chain, tx),
        );
        verdicts.push(address_verdict.unwrap_or_else(|e| {
            tracing::warn!(tx = %tx.hash, error = %e, "address behavior detector failed");
            DetectorVerdict::failed(DetectorKind::AddressBehavior, &e.to_string())
        }));
        verdicts.push(contract_verdict.unwrap_or_else(|e| {
            tracing::warn!(tx = %tx.hash, error = %e, "contract interaction detector failed");
            DetectorVerdict::failed(DetectorKind::ContractInteraction, &e.to_string())
        }));

        verdicts.push(self.high_frequency.observe(tx, now_ms));
        verdicts.push(self.circular_transfer.observe(tx, now_ms));

        verdicts
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use crate::chain::testutil::{addr, benign_tx, MockChainReader};

    use super::*;

    #[tokio::test]
    async fn benign_transaction_yields_all_quiet_verdicts() {
        let bank = DetectorBank::new();
        let chain = MockChainReader::default();
        let tx = benign_tx(1, addr(1), addr(2));

        let verdicts = bank.run_all(&chain, &tx, 0).await;
        assert_eq!(verdicts.len(), 7);
        assert!(verdicts.iter().all(|v| v.score == 0 && !v.is_anomalous));
    }

    #[tokio::test]
    async fn chain_failure_is_contained_to_the_failing_detectors() {
        let bank = DetectorBank::new();
        let chain = MockChainReader::default();
        chain.unavailable.store(true, Ordering::SeqCst);

        let mut tx = benign_tx(1, addr(1), addr(2));
        tx.value = crate::chain::testutil::eth(60);

        let verdicts = bank.run_all(&chain, &tx, 0).await;
        let value = verdicts
            .iter()
            .find(|v| v.kind == DetectorKind::TransactionValue)
            .unwrap();
        assert_eq!(value.score, 40);

        let address = verdicts
            .iter()
            .find(|v| v.kind == DetectorKind::AddressBehavior)
            .unwrap();
        assert_eq!(address.score, 0);
        assert!(address.evidence["error"].is_string());
    }
}
