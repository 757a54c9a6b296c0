use std::collections::VecDeque;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use alloy::primitives::{Address, B256};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::chain::{ChainReader, RawTransaction};
use crate::detectors::DetectorBank;
use crate::error::{EngineError, EngineResult};
use crate::risk::{self, AnalysisResult, RiskThresholds};
use crate::store::{AnalysisPage, AnalysisStore, HistoryFilters, RiskStatistics};
use crate::watchlist::AddressWatchlist;

use super::events::{EventBus, MonitorEvent};
use super::poller;

/// Pipeline cadences and capacities, taken from configuration.
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub poll_interval: Duration,
    pub analysis_interval: Duration,
    /// Transactions scored per drain tick.
    pub batch_size: usize,
    /// Buffer level that forces an early drain into the queue.
    pub transaction_buffer_size: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(2000),
            analysis_interval: Duration::from_millis(2000),
            batch_size: 10,
            transaction_buffer_size: 100,
        }
    }
}

/// Per-start threshold overrides. Absent fields keep their current value.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct MonitorRules {
    pub low_threshold: Option<u8>,
    pub medium_threshold: Option<u8>,
    pub high_threshold: Option<u8>,
    pub block_threshold: Option<u8>,
}

impl MonitorRules {
    fn apply(&self, thresholds: &mut RiskThresholds) {
        if let Some(low) = self.low_threshold {
            thresholds.low = low;
        }
        if let Some(medium) = self.medium_threshold {
            thresholds.medium = medium;
        }
        if let Some(high) = self.high_threshold {
            thresholds.high = high;
        }
        if let Some(block) = self.block_threshold {
            thresholds.block = block;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started { from_block: u64 },
    AlreadyMonitoring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    AlreadyStopped,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub is_monitoring: bool,
    pub monitored_addresses: Vec<String>,
    pub buffer_size: usize,
    pub queue_size: usize,
    pub thresholds: RiskThresholds,
}

struct RunningMonitor {
    cancel: CancellationToken,
    poller: JoinHandle<()>,
    drainer: JoinHandle<()>,
}

/// The monitoring engine: owns the watchlist, the detector bank, the
/// buffer/queue pair between ingestion and analysis, and the lifecycle of
/// the two background tasks.
pub struct MonitorEngine {
    settings: EngineSettings,
    thresholds: RwLock<RiskThresholds>,
    chain: Arc<dyn ChainReader>,
    store: Arc<dyn AnalysisStore>,
    watchlist: AddressWatchlist,
    detectors: DetectorBank,
    events: EventBus,
    buffer: Mutex<VecDeque<RawTransaction>>,
    queue: Mutex<VecDeque<RawTransaction>>,
    lifecycle: tokio::sync::Mutex<Option<RunningMonitor>>,
}

impl MonitorEngine {
    pub fn new(
        settings: EngineSettings,
        thresholds: RiskThresholds,
        chain: Arc<dyn ChainReader>,
        store: Arc<dyn AnalysisStore>,
    ) -> Self {
        Self {
            settings,
            thresholds: RwLock::new(thresholds),
            chain,
            store,
            watchlist: AddressWatchlist::new(),
            detectors: DetectorBank::new(),
            events: EventBus::default(),
            buffer: Mutex::new(VecDeque::new()),
            queue: Mutex::new(VecDeque::new()),
            lifecycle: tokio::sync::Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    pub fn thresholds(&self) -> RiskThresholds {
        *self.thresholds.read().expect("thresholds lock poisoned")
    }

    /// Start the ingestion and analysis tasks. Idempotent: a second start
    /// while running changes nothing. Address parsing and the initial height
    /// snapshot both happen before any state mutation, so a rejected start
    /// leaves the engine exactly as it was.
    pub async fn start_monitoring(
        self: &Arc<Self>,
        addresses: &[String],
        rules: MonitorRules,
    ) -> EngineResult<StartOutcome> {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.is_some() {
            return Ok(StartOutcome::AlreadyMonitoring);
        }

        let parsed: Vec<Address> = addresses
            .iter()
            .map(|raw| AddressWatchlist::parse_address(raw))
            .collect::<EngineResult<_>>()?;

        // The cursor starts at the current tip: only activity from this
        // moment on is monitored.
        let from_block = self.chain.get_height().await?;

        rules.apply(&mut self.thresholds.write().expect("thresholds lock poisoned"));
        for address in parsed {
            self.watchlist.add(address);
        }

        let cancel = CancellationToken::new();
        let poller = tokio::spawn(poller::run_poller(
            Arc::clone(self),
            cancel.clone(),
            from_block,
        ));
        let drainer = tokio::spawn(poller::run_drainer(Arc::clone(self), cancel.clone()));
        *lifecycle = Some(RunningMonitor {
            cancel,
            poller,
            drainer,
        });

        let watched = self.watchlist.snapshot();
        info!(
            from_block,
            addresses = watched.len(),
            "transaction monitoring started"
        );
        self.events.emit(MonitorEvent::MonitoringStarted {
            timestamp: Utc::now(),
            addresses: watched,
        });

        Ok(StartOutcome::Started { from_block })
    }

    /// Stop both tasks and wait for them to wind down. The drainer finishes
    /// its in-flight batch before exiting. Idempotent.
    pub async fn stop_monitoring(&self) -> StopOutcome {
        let mut lifecycle = self.lifecycle.lock().await;
        let Some(running) = lifecycle.take() else {
            return StopOutcome::AlreadyStopped;
        };

        running.cancel.cancel();
        if let Err(error) = running.poller.await {
            warn!(%error, "ingestion poller panicked");
        }
        if let Err(error) = running.drainer.await {
            warn!(%error, "analysis drainer panicked");
        }

        info!("transaction monitoring stopped");
        self.events.emit(MonitorEvent::MonitoringStopped {
            timestamp: Utc::now(),
        });
        StopOutcome::Stopped
    }

    pub async fn status(&self) -> EngineStatus {
        EngineStatus {
            is_monitoring: self.lifecycle.lock().await.is_some(),
            monitored_addresses: self
                .watchlist
                .snapshot()
                .into_iter()
                .map(|a| format!("{a:#x}"))
                .collect(),
            buffer_size: self.buffer.lock().expect("buffer lock poisoned").len(),
            queue_size: self.queue.lock().expect("queue lock poisoned").len(),
            thresholds: self.thresholds(),
        }
    }

    /// Add an address to the watchlist. Takes effect on the next poll tick.
    pub fn add_watched_address(&self, raw: &str) -> EngineResult<bool> {
        let address = AddressWatchlist::parse_address(raw)?;
        let added = self.watchlist.add(address);
        if added {
            info!(%address, "address added to watchlist");
        }
        Ok(added)
    }

    pub fn remove_watched_address(&self, raw: &str) -> EngineResult<bool> {
        let address = AddressWatchlist::parse_address(raw)?;
        let removed = self.watchlist.remove(address);
        if removed {
            info!(%address, "address removed from watchlist");
        }
        Ok(removed)
    }

    /// Score a single transaction on demand, with the same persistence and
    /// event side effects as the live pipeline.
    pub async fn analyze_transaction(&self, tx: &RawTransaction) -> AnalysisResult {
        self.score_transaction(tx).await
    }

    /// Fetch a transaction by hash and score it.
    pub async fn analyze_transaction_by_hash(&self, raw: &str) -> EngineResult<AnalysisResult> {
        let hash: B256 = raw
            .trim()
            .parse()
            .map_err(|_| EngineError::InvalidHash(raw.to_string()))?;
        let tx = self
            .chain
            .get_transaction(hash)
            .await?
            .ok_or_else(|| EngineError::TransactionNotFound(format!("{hash:#x}")))?;
        Ok(self.score_transaction(&tx).await)
    }

    pub async fn analysis_history(
        &self,
        page: u64,
        limit: u64,
        filters: &HistoryFilters,
    ) -> EngineResult<AnalysisPage> {
        self.store
            .analysis_history(page, limit, filters)
            .await
            .map_err(|e| EngineError::Storage(e.to_string()))
    }

    pub async fn risk_statistics(&self, window: Duration) -> EngineResult<RiskStatistics> {
        let since = Utc::now()
            - chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::hours(24));
        self.store
            .risk_statistics(since, self.thresholds().high)
            .await
            .map_err(|e| EngineError::Storage(e.to_string()))
    }

    /// Run the detector bank, compose the verdict, persist, and emit events.
    /// Store failures are logged and never interrupt the pipeline.
    pub(crate) async fn score_transaction(&self, tx: &RawTransaction) -> AnalysisResult {
        let now = Utc::now();
        let verdicts = self
            .detectors
            .run_all(self.chain.as_ref(), tx, now.timestamp_millis())
            .await;
        let thresholds = self.thresholds();
        let analysis = risk::compose(tx, &verdicts, &thresholds, now);

        if let Err(error) = self.store.insert_analysis(&analysis).await {
            error!(tx = %tx.hash, %error, "failed to persist analysis");
        }

        if analysis.risk_level >= thresholds.high {
            warn!(
                tx = %tx.hash,
                risk_level = analysis.risk_level,
                blocked = analysis.blocked,
                patterns = ?analysis.malicious_patterns,
                "high-risk transaction detected"
            );
            let alert = risk::build_alert(&analysis);
            if let Err(error) = self.store.insert_alert(&alert).await {
                error!(tx = %tx.hash, %error, "failed to persist alert");
            }
        }

        self.events.emit(MonitorEvent::TransactionAnalyzed {
            transaction: tx.clone(),
            analysis: analysis.clone(),
        });
        if analysis.risk_level >= thresholds.medium {
            self.events.emit(MonitorEvent::RiskDetected {
                transaction: tx.clone(),
                analysis: analysis.clone(),
            });
        }

        analysis
    }

    pub(crate) fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub(crate) fn chain(&self) -> &dyn ChainReader {
        self.chain.as_ref()
    }

    pub(crate) fn watchlist(&self) -> &AddressWatchlist {
        &self.watchlist
    }

    /// Buffer a transaction, returning the new buffer depth.
    pub(crate) fn buffer_push(&self, tx: RawTransaction) -> usize {
        let mut buffer = self.buffer.lock().expect("buffer lock poisoned");
        buffer.push_back(tx);
        buffer.len()
    }

    /// Move everything buffered into the analysis queue, preserving order.
    pub(crate) fn drain_buffer_into_queue(&self) {
        let mut buffer = self.buffer.lock().expect("buffer lock poisoned");
        if buffer.is_empty() {
            return;
        }
        let mut queue = self.queue.lock().expect("queue lock poisoned");
        queue.extend(buffer.drain(..));
    }

    /// Pop the next batch from the analysis queue.
    pub(crate) fn next_batch(&self) -> Vec<RawTransaction> {
        let mut queue = self.queue.lock().expect("queue lock poisoned");
        let take = self.settings.batch_size.min(queue.len());
        queue.drain(..take).collect()
    }
}
