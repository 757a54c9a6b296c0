pub mod memory;
pub mod postgres;

pub use memory::MemoryAnalysisStore;
pub use postgres::PgAnalysisStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::risk::{AnalysisResult, SecurityAlert};

/// Optional filters for the analysis history query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryFilters {
    pub min_risk_level: Option<u8>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    /// Matches either side of the transaction (0x-prefixed hex).
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub pages: u64,
}

#[derive(Debug, Serialize)]
pub struct AnalysisPage {
    pub results: Vec<AnalysisResult>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RiskStatistics {
    pub total_transactions: i64,
    pub high_risk_transactions: i64,
    pub blocked_transactions: i64,
    pub average_risk_level: f64,
    pub malicious_pattern_count: i64,
}

/// Durable record of every analysis and every high-risk alert.
///
/// Writes are append-only. The engine treats write failures as isolated
/// per-item events: they are logged and the pipeline moves on.
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    async fn insert_analysis(&self, analysis: &AnalysisResult) -> eyre::Result<()>;

    async fn insert_alert(&self, alert: &SecurityAlert) -> eyre::Result<()>;

    /// Newest-first page of analyses matching the filters. Pages are
    /// 1-based, matching the query surface.
    async fn analysis_history(
        &self,
        page: u64,
        limit: u64,
        filters: &HistoryFilters,
    ) -> eyre::Result<AnalysisPage>;

    /// Aggregate statistics over analyses at or after `since`. The caller
    /// supplies its high threshold so "high risk" means the same thing here
    /// as it does in the alerting path.
    async fn risk_statistics(
        &self,
        since: DateTime<Utc>,
        high_threshold: u8,
    ) -> eyre::Result<RiskStatistics>;
}

pub(crate) fn page_count(total: u64, limit: u64) -> u64 {
    if limit == 0 {
        return 0;
    }
    total.div_ceil(limit)
}
