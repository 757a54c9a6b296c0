use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use alloy::primitives::{Address, U256};

use crate::chain::RawTransaction;

use super::types::{DetectorKind, DetectorVerdict, Severity};

pub const HIGH_FREQUENCY_PATTERN: &str = "high-frequency attack";
pub const FREQUENT_TRANSFERS_PATTERN: &str = "frequent transfers";
pub const CIRCULAR_TRANSFER_PATTERN: &str = "circular transfer laundering";

const HIGH_FREQUENCY_WINDOW_MS: i64 = 60_000;
const CIRCULAR_WINDOW_MS: i64 = 300_000;
/// The cycle search only ever looks at this many recent hops, so the ring
/// is capped at the same size.
const CIRCULAR_PATH_CAP: usize = 10;

/// Per-sender sliding window of arrival timestamps (1 minute).
///
/// Entries older than the window are purged on every access, so memory stays
/// bounded by the number of active senders. The caller supplies `now_ms`;
/// production passes wall-clock time, tests pass synthetic clocks.
#[derive(Debug, Default)]
pub struct HighFrequencyDetector {
    windows: Mutex<HashMap<Address, VecDeque<i64>>>,
}

impl HighFrequencyDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&self, tx: &RawTransaction, now_ms: i64) -> DetectorVerdict {
        let kind = DetectorKind::HighFrequency;
        let mut windows = self.windows.lock().expect("frequency window lock poisoned");

        // Drop senders whose entire window has aged out, so one-shot senders
        // do not accumulate map entries.
        windows.retain(|_, window| {
            window
                .back()
                .is_some_and(|&last| now_ms - last < HIGH_FREQUENCY_WINDOW_MS)
        });

        let window = windows.entry(tx.from).or_default();

        while let Some(&oldest) = window.front() {
            if now_ms - oldest >= HIGH_FREQUENCY_WINDOW_MS {
                window.pop_front();
            } else {
                break;
            }
        }
        window.push_back(now_ms);
        let count = window.len();
        drop(windows);

        let (score, severity, pattern, description) = if count >= 5 {
            (
                45,
                Severity::Critical,
                HIGH_FREQUENCY_PATTERN,
                format!("high-frequency transfers: {count} within one minute (DDoS-like)"),
            )
        } else if count >= 3 {
            (
                25,
                Severity::Medium,
                FREQUENT_TRANSFERS_PATTERN,
                format!("frequent transfers: {count} within one minute"),
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
            pattern: Some(pattern),
            evidence: serde_json::json!({
                "count": count,
                "window_secs": HIGH_FREQUENCY_WINDOW_MS / 1000,
            }),
        }
    }

    #[cfg(test)]
    fn window_len(&self, address: &Address) -> usize {
        self.windows
            .lock()
            .unwrap()
            .get(address)
            .map_or(0, |w| w.len())
    }

    #[cfg(test)]
    fn sender_count(&self) -> usize {
        self.windows.lock().unwrap().len()
    }
}

#[derive(Debug, Clone)]
struct TransferHop {
    from: Address,
    to: Option<Address>,
    #[allow(dead_code)]
    value: U256,
    at_ms: i64,
}

/// Global sliding window (5 minutes, capped ring) of recent transfer hops,
/// searched for cycles: ≥3 distinct addresses where some address appears as
/// both a sender and a receiver. This pattern unconditionally forces the
/// blocked verdict downstream.
#[derive(Debug, Default)]
pub struct CircularTransferDetector {
    hops: Mutex<VecDeque<TransferHop>>,
}

impl CircularTransferDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&self, tx: &RawTransaction, now_ms: i64) -> DetectorVerdict {
        let kind = DetectorKind::CircularTransfer;
        let mut hops = self.hops.lock().expect("transfer path lock poisoned");

        while let Some(oldest) = hops.front() {
            if now_ms - oldest.at_ms >= CIRCULAR_WINDOW_MS {
                hops.pop_front();
            } else {
                break;
            }
        }
        if hops.len() == CIRCULAR_PATH_CAP {
            hops.pop_front();
        }
        hops.push_back(TransferHop {
            from: tx.from,
            to: tx.to,
            value: tx.value,
            at_ms: now_ms,
        });

        let mut senders = HashSet::new();
        let mut receivers = HashSet::new();
        let mut addresses = HashSet::new();
        for hop in hops.iter() {
            senders.insert(hop.from);
            addresses.insert(hop.from);
            if let Some(to) = hop.to {
                receivers.insert(to);
                addresses.insert(to);
            }
        }
        let hop_count = hops.len();
        drop(hops);

        let cycle = addresses.len() >= 3
            && hop_count >= 3
            && senders.intersection(&receivers).next().is_some();

        if !cycle {
            return DetectorVerdict::quiet(kind);
        }

        DetectorVerdict {
            kind,
            score: 50,
            is_anomalous: true,
            severity: Severity::Critical,
            description: format!(
                "circular transfer pattern across {} addresses (possible money laundering)",
                addresses.len()
            ),
            pattern: Some(CIRCULAR_TRANSFER_PATTERN),
            evidence: serde_json::json!({
                "addresses": addresses.len(),
                "hops": hop_count,
                "window_secs": CIRCULAR_WINDOW_MS / 1000,
            }),
        }
    }

    #[cfg(test)]
    fn hop_count(&self) -> usize {
        self.hops.lock().unwrap().len()
    }
}
