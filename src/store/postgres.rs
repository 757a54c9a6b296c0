use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::risk::{AnalysisResult, SecurityAlert};

use super::{
    page_count, AnalysisPage, AnalysisStore, HistoryFilters, Pagination, RiskStatistics,
};

/// PostgreSQL-backed `AnalysisStore`.
pub struct PgAnalysisStore {
    pool: PgPool,
}

impl PgAnalysisStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct AnalysisRow {
    tx_hash: String,
    from_address: String,
    to_address: Option<String>,
    risk_level: i16,
    risk_factors: Vec<String>,
    anomalies: Vec<String>,
    malicious_patterns: Vec<String>,
    recommendations: Vec<String>,
    blocked: bool,
    block_reason: Option<String>,
    analyzed_at: DateTime<Utc>,
}

impl From<AnalysisRow> for AnalysisResult {
    fn from(row: AnalysisRow) -> Self {
        Self {
            transaction_hash: row.tx_hash,
            from_address: row.from_address,
            to_address: row.to_address,
            risk_level: row.risk_level.clamp(0, 100) as u8,
            risk_factors: row.risk_factors,
            anomalies: row.anomalies,
            malicious_patterns: row.malicious_patterns,
            recommendations: row.recommendations,
            blocked: row.blocked,
            block_reason: row.block_reason,
            analyzed_at: row.analyzed_at,
        }
    }
}

/// Append the shared filter conditions to a query that already has a WHERE.
fn push_filters(
    builder: &mut sqlx::QueryBuilder<'_, sqlx::Postgres>,
    filters: &HistoryFilters,
) {
    if let Some(min) = filters.min_risk_level {
        builder.push(" AND risk_level >= ").push_bind(min as i16);
    }
    if let Some(since) = filters.since {
        builder.push(" AND analyzed_at >= ").push_bind(since);
    }
    if let Some(until) = filters.until {
        builder.push(" AND analyzed_at <= ").push_bind(until);
    }
    if let Some(address) = &filters.address {
        let address = address.to_lowercase();
        builder
            .push(" AND (from_address = ")
            .push_bind(address.clone())
            .push(" OR to_address = ")
            .push_bind(address)
            .push(")");
    }
}

#[async_trait]
impl AnalysisStore for PgAnalysisStore {
    async fn insert_analysis(&self, analysis: &AnalysisResult) -> eyre::Result<()> {
        sqlx::query(
            "INSERT INTO transaction_analyses
                 (tx_hash, from_address, to_address, risk_level, risk_factors, anomalies,
                  malicious_patterns, recommendations, blocked, block_reason, analyzed_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(&analysis.transaction_hash)
        .bind(&analysis.from_address)
        .bind(&analysis.to_address)
        .bind(analysis.risk_level as i16)
        .bind(&analysis.risk_factors)
        .bind(&analysis.anomalies)
        .bind(&analysis.malicious_patterns)
        .bind(&analysis.recommendations)
        .bind(analysis.blocked)
        .bind(&analysis.block_reason)
        .bind(analysis.analyzed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_alert(&self, alert: &SecurityAlert) -> eyre::Result<()> {
        sqlx::query(
            "INSERT INTO security_alerts
                 (tx_hash, severity, description, anomalies, malicious_patterns,
                  blocked, block_reason, status, raised_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(&alert.transaction_hash)
        .bind(alert.severity.as_str())
        .bind(&alert.description)
        .bind(&alert.anomalies)
        .bind(&alert.malicious_patterns)
        .bind(alert.blocked)
        .bind(&alert.block_reason)
        .bind(&alert.status)
        .bind(alert.raised_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn analysis_history(
        &self,
        page: u64,
        limit: u64,
        filters: &HistoryFilters,
    ) -> eyre::Result<AnalysisPage> {
        let page = page.max(1);
        let offset = (page - 1) * limit;

        let mut count_query: sqlx::QueryBuilder<sqlx::Postgres> =
            sqlx::QueryBuilder::new("SELECT COUNT(*) FROM transaction_analyses WHERE TRUE");
        push_filters(&mut count_query, filters);
        let (total,): (i64,) = count_query.build_query_as().fetch_one(&self.pool).await?;

        let mut query: sqlx::QueryBuilder<sqlx::Postgres> = sqlx::QueryBuilder::new(
            "SELECT tx_hash, from_address, to_address, risk_level, risk_factors, anomalies, \
             malicious_patterns, recommendations, blocked, block_reason, analyzed_at \
             FROM transaction_analyses WHERE TRUE",
        );
        push_filters(&mut query, filters);
        query
            .push(" ORDER BY analyzed_at DESC LIMIT ")
            .push_bind(limit as i64)
            .push(" OFFSET ")
            .push_bind(offset as i64);

        let rows: Vec<AnalysisRow> = query.build_query_as().fetch_all(&self.pool).await?;

        let total = total as u64;
        Ok(AnalysisPage {
            results: rows.into_iter().map(Into::into).collect(),
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
        let row: (i64, i64, i64, f64, i64) = sqlx::query_as(
            "SELECT COUNT(*),
                    COUNT(*) FILTER (WHERE risk_level >= $2),
                    COUNT(*) FILTER (WHERE blocked),
                    COALESCE(AVG(risk_level::float8), 0::float8),
                    COALESCE(SUM(cardinality(malicious_patterns)), 0)::bigint
             FROM transaction_analyses
             WHERE analyzed_at >= $1",
        )
        .bind(since)
        .bind(high_threshold as i16)
        .fetch_one(&self.pool)
        .await?;

        Ok(RiskStatistics {
            total_transactions: row.0,
            high_risk_transactions: row.1,
            blocked_transactions: row.2,
            average_risk_level: row.3,
            malicious_pattern_count: row.4,
        })
    }
}
