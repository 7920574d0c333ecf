//! Latency-based health classification

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How well a pooled connection answered its last ping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Ping answered within the healthy threshold
    #[default]
    Healthy,
    /// Ping answered, but slowly
    Degraded,
    /// Ping failed or took longer than the degraded threshold
    Unhealthy,
}

impl HealthStatus {
    /// Classify a ping latency using [`HealthThresholds::default`].
    ///
    /// ```
    /// use slotpool_connection::health::HealthStatus;
    /// use std::time::Duration;
    ///
    /// assert_eq!(HealthStatus::from_latency(Duration::from_millis(20)), HealthStatus::Healthy);
    /// assert_eq!(HealthStatus::from_latency(Duration::from_millis(300)), HealthStatus::Degraded);
    /// assert_eq!(HealthStatus::from_latency(Duration::from_secs(2)), HealthStatus::Unhealthy);
    /// ```
    pub fn from_latency(latency: Duration) -> Self {
        Self::classify(latency, &HealthThresholds::default())
    }

    /// Classify a ping latency against custom thresholds. Bounds are inclusive.
    pub fn classify(latency: Duration, thresholds: &HealthThresholds) -> Self {
        if latency <= thresholds.healthy {
            HealthStatus::Healthy
        } else if latency <= thresholds.degraded {
            HealthStatus::Degraded
        } else {
            HealthStatus::Unhealthy
        }
    }

    /// Healthy and degraded connections can still serve queries
    pub fn is_usable(&self) -> bool {
        !matches!(self, HealthStatus::Unhealthy)
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

/// Latency bounds used by [`HealthStatus::classify`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthThresholds {
    /// Slowest ping still considered healthy
    pub healthy: Duration,
    /// Slowest ping still considered degraded
    pub degraded: Duration,
}

impl HealthThresholds {
    /// Build thresholds from milliseconds. `degraded_ms` is raised to
    /// `healthy_ms` if it is smaller.
    pub fn from_millis(healthy_ms: u64, degraded_ms: u64) -> Self {
        Self {
            healthy: Duration::from_millis(healthy_ms),
            degraded: Duration::from_millis(degraded_ms.max(healthy_ms)),
        }
    }
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self::from_millis(100, 500)
    }
}
