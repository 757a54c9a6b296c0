use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::chain::RawTransaction;
use crate::risk::AnalysisResult;

/// Engine lifecycle and analysis events, delivered over a bounded broadcast
/// channel. Slow subscribers observe `Lagged` and skip ahead; the engine
/// never blocks on them.
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    MonitoringStarted {
        timestamp: DateTime<Utc>,
        addresses: Vec<Address>,
    },
    MonitoringStopped {
        timestamp: DateTime<Utc>,
    },
    /// Emitted for every scored transaction.
    TransactionAnalyzed {
        transaction: RawTransaction,
        analysis: AnalysisResult,
    },
    /// Emitted when the composite score reaches the medium threshold.
    RiskDetected {
        transaction: RawTransaction,
        analysis: AnalysisResult,
    },
}

pub struct EventBus {
    sender: broadcast::Sender<MonitorEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: MonitorEvent) {
        // A send error just means nobody is listening right now.
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
