//! Response DTOs for the content API
//!
//! Bodies the handlers return that are not domain types themselves.

use serde::Serialize;

use crate::cache::{CacheStats, InvalidationReport, TierStats};

/// Statistics of one tier plus its hit rate.
#[derive(Debug, Clone, Serialize)]
pub struct TierStatsResponse {
    #[serde(flatten)]
    pub stats: CacheStats,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<CacheStats> for TierStatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            stats,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub memory: TierStatsResponse,
    pub server: TierStatsResponse,
    pub client: TierStatsResponse,
}

impl From<TierStats> for StatsResponse {
    fn from(stats: TierStats) -> Self {
        Self {
            memory: stats.memory.into(),
            server: stats.server.into(),
            client: stats.client.into(),
        }
    }
}

/// Response body for the invalidation endpoints
#[derive(Debug, Clone, Serialize)]
pub struct InvalidationResponse {
    /// What was invalidated, e.g. "post 5" or "taxonomy"
    pub target: String,
    #[serde(flatten)]
    pub report: InvalidationReport,
    /// Entries removed in total
    pub removed: usize,
}

impl InvalidationResponse {
    pub fn new(target: impl Into<String>, report: InvalidationReport) -> Self {
        Self {
            target: target.into(),
            removed: report.direct + report.swept,
            report,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
    /// Whether the background cleanup task is alive
    pub cleanup_running: bool,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy(cleanup_running: bool) -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            cleanup_running,
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_stats_response_flattens_counters() {
        let mut stats = CacheStats::new(10);
        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();

        let json = serde_json::to_value(TierStatsResponse::from(stats)).unwrap();

        assert_eq!(json["hits"], 3);
        assert_eq!(json["max_size"], 10);
        assert_eq!(json["hit_rate"], 0.75);
    }

    #[test]
    fn test_invalidation_response_totals() {
        let response = InvalidationResponse::new("post 5", InvalidationReport { direct: 3, swept: 6 });

        assert_eq!(response.removed, 9);
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"direct\":3"));
    }

    #[test]
    fn test_health_response() {
        let response = HealthResponse::healthy(true);
        assert_eq!(response.status, "healthy");
        assert!(!response.timestamp.is_empty());
    }

    #[test]
    fn test_error_response() {
        let response = ErrorResponse::new("Not found");
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"error\":\"Not found\""));
    }
}
