//! Rollout policy — how aggressively a canary is exposed and judged.

/// Configuration for a canary rollout.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RolloutPolicy {
    /// Percentage of traffic routed to the canary on entry (0-100).
    pub initial_weight: u8,
    /// Error rate at or above which the canary is rolled back.
    pub alarm_threshold: f64,
    /// Total observation window in milliseconds.
    pub evaluation_window_ms: u64,
    /// Interval between telemetry samples in milliseconds.
    pub tick_interval_ms: u64,
    /// Per-sample timeout in milliseconds. A timed-out sample is skipped.
    pub sample_timeout_ms: u64,
    /// Consecutive skipped samples tolerated before failing the deployment.
    pub max_consecutive_skips: u32,
}

impl Default for RolloutPolicy {
    fn default() -> Self {
        // 10% canary observed for 5 minutes, sampled once a minute.
        Self {
            initial_weight: 10,
            alarm_threshold: 1.0,
            evaluation_window_ms: 300_000,
            tick_interval_ms: 60_000,
            sample_timeout_ms: 5_000,
            max_consecutive_skips: 3,
        }
    }
}

impl RolloutPolicy {
    /// Number of clean samples required to pass the evaluation window.
    pub fn window_ticks(&self) -> u32 {
        if self.tick_interval_ms == 0 {
            return 1;
        }
        ((self.evaluation_window_ms / self.tick_interval_ms) as u32).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy() {
        let policy = RolloutPolicy::default();
        assert_eq!(policy.initial_weight, 10);
        assert_eq!(policy.window_ticks(), 5);
    }

    #[test]
    fn window_ticks_rounds_down_but_never_zero() {
        let policy = RolloutPolicy {
            evaluation_window_ms: 250,
            tick_interval_ms: 100,
            ..Default::default()
        };
        assert_eq!(policy.window_ticks(), 2);

        let tiny = RolloutPolicy {
            evaluation_window_ms: 50,
            tick_interval_ms: 100,
            ..Default::default()
        };
        assert_eq!(tiny.window_ticks(), 1);
    }

    #[test]
    fn serializes_roundtrip() {
        let policy = RolloutPolicy {
            initial_weight: 25,
            ..Default::default()
        };
        let json = serde_json::to_string(&policy).unwrap();
        let back: RolloutPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(back.initial_weight, 25);
        assert_eq!(back.alarm_threshold, policy.alarm_threshold);
    }
}
