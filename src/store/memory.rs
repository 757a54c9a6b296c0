use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::risk::{AnalysisResult, SecurityAlert};

use super::{
    page_count, AnalysisPage, AnalysisStore, HistoryFilters, Pagination, RiskStatistics,
};

/// In-memory `AnalysisStore`. Backs tests and storeless runs; everything is
/// lost on restart.
#[derive(Debug, Default)]
pub struct MemoryAnalysisStore {
    analyses: Mutex<Vec<AnalysisResult>>,
    alerts: Mutex<Vec<SecurityAlert>>,
}

impl MemoryAnalysisStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn analyses(&self) -> Vec<AnalysisResult> {
        self.analyses.lock().expect("store lock poisoned").clone()
    }

    pub fn alerts(&self) -> Vec<SecurityAlert> {
        self.alerts.lock().expect("store lock poisoned").clone()
    }

    fn matches(analysis: &AnalysisResult, filters: &HistoryFilters) -> bool {
        if let Some(min) = filters.min_risk_level {
            if analysis.risk_level < min {
                return false;
            }
        }
        if let Some(since) = filters.since {
            if analysis.analyzed_at < since {
                return false;
            }
        }
        if let Some(until) = filters.until {
            if analysis.analyzed_at > until {
                return false;
            }
        }
        if let Some(address) = &filters.address {
            let address = address.to_lowercase();
            let hit = analysis.from_address == address
                || analysis.to_address.as_deref() == Some(address.as_str());
            if !hit {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl AnalysisStore for MemoryAnalysisStore {
    async fn insert_analysis(&self, analysis: &AnalysisResult) -> eyre::Result<()> {
        self.analyses
            .lock()
            .expect("store lock poisoned")
            .push(analysis.clone());
        Ok(())
    }

    async fn insert_alert(&self, alert: &SecurityAlert) -> eyre::Result<()> {
        self.alerts
            .lock()
            .expect("store lock poisoned")
            .push(alert.clone());
        Ok(())
    }

    async fn analysis_history(
        &self,
        page: u64,
        limit: u64,
        filters: &HistoryFilters,
    ) -> eyre::Result<AnalysisPage> {
        let page = page.max(1);
        let mut matching: Vec<AnalysisResult> = self
            .analyses
            .lock()
            .expect("store lock poisoned")
            .iter()
            .filter(|a| Self::matches(a, filters))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.analyzed_at.cmp(&a.analyzed_at));

        let total = matching.len() as u64;
        let offset = ((page - 1) * limit) as usize;
        let results: Vec<AnalysisResult> = matching
            .into_iter()
            .skip(offset)
            .take(limit as usize)
            .collect();

        Ok(AnalysisPage {
            results,
            pagination: Pagination {
                page,
                limit,
                total,
                pages: page_count(total, limit),
            },
        })
    }

    async fn risk_statistics(
        &self,
        since: DateTime<Utc>,
        high_threshold: u8,
    ) -> eyre::Result<RiskStatistics> {
        let analyses = self.analyses.lock().expect("store lock poisoned");
        let window: Vec<&AnalysisResult> = analyses
            .iter()
            .filter(|a| a.analyzed_at >= since)
            .collect();

        let total = window.len() as i64;
        let average = if window.is_empty() {
            0.0
        } else {
            window.iter().map(|a| a.risk_level as f64).sum::<f64>() / window.len() as f64
        };

        Ok(RiskStatistics {
            total_transactions: total,
            high_risk_transactions: window
                .iter()
                .filter(|a| a.risk_level >= high_threshold)
                .count() as i64,
            blocked_transactions: window.iter().filter(|a| a.blocked).count() as i64,
            average_risk_level: average,
            malicious_pattern_count: window
                .iter()
                .map(|a| a.malicious_patterns.len() as i64)
                .sum(),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn analysis(hash: &str, risk: u8, at: DateTime<Utc>) -> AnalysisResult {
        AnalysisResult {
            transaction_hash: hash.to_string(),
            from_address: "0xaaaa".to_string(),
            to_address: Some("0xbbbb".to_string()),
            risk_level: risk,
            risk_factors: vec![],
            anomalies: vec![],
            malicious_patterns: if risk >= 80 {
                vec!["high-frequency attack".to_string()]
            } else {
                vec![]
            },
            recommendations: vec![],
            blocked: risk >= 90,
            block_reason: None,
            analyzed_at: at,
        }
    }

    #[tokio::test]
    async fn history_filters_and_paginates_newest_first() {
        let store = MemoryAnalysisStore::new();
        let base = Utc::now();
        for i in 0..5u8 {
            store
                .insert_analysis(&analysis(
                    &format!("0x{i:02x}"),
                    i * 20,
                    base + Duration::seconds(i as i64),
                ))
                .await
                .unwrap();
        }

        let filters = HistoryFilters {
            min_risk_level: Some(40),
            ..Default::default()
        };
        let page = store.analysis_history(1, 2, &filters).await.unwrap();
        assert_eq!(page.pagination.total, 3);
        assert_eq!(page.pagination.pages, 2);
        assert_eq!(page.results.len(), 2);
        // Newest first.
        assert_eq!(page.results[0].transaction_hash, "0x04");

        let second = store.analysis_history(2, 2, &filters).await.unwrap();
        assert_eq!(second.results.len(), 1);
        assert_eq!(second.results[0].transaction_hash, "0x02");
    }

    #[tokio::test]
    async fn history_filters_by_address_on_either_side() {
        let store = MemoryAnalysisStore::new();
        store
            .insert_analysis(&analysis("0x01", 10, Utc::now()))
            .await
            .unwrap();

        let hit = HistoryFilters {
            address: Some("0xBBBB".to_string()),
            ..Default::default()
        };
        assert_eq!(
            store
                .analysis_history(1, 10, &hit)
                .await
                .unwrap()
                .pagination
                .total,
            1
        );

        let miss = HistoryFilters {
            address: Some("0xcccc".to_string()),
            ..Default::default()
        };
        assert_eq!(
            store
                .analysis_history(1, 10, &miss)
                .await
                .unwrap()
                .pagination
                .total,
            0
        );
    }

    #[tokio::test]
    async fn statistics_respect_the_window_and_threshold() {
        let store = MemoryAnalysisStore::new();
        let now = Utc::now();
        store
            .insert_analysis(&analysis("0x01", 100, now))
            .await
            .unwrap();
        store
            .insert_analysis(&analysis("0x02", 40, now))
            .await
            .unwrap();
        // Outside the window.
        store
            .insert_analysis(&analysis("0x03", 100, now - Duration::hours(48)))
            .await
            .unwrap();

        let stats = store
            .risk_statistics(now - Duration::hours(24), 80)
            .await
            .unwrap();
        assert_eq!(stats.total_transactions, 2);
        assert_eq!(stats.high_risk_transactions, 1);
        assert_eq!(stats.blocked_transactions, 1);
        assert_eq!(stats.malicious_pattern_count, 1);
        assert!((stats.average_risk_level - 70.0).abs() < f64::EPSILON);
    }
}
