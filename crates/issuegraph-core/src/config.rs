use serde::{Deserialize, Serialize};

/// Tunable knobs for a single analysis run.
///
/// The canonical string form feeds the result-cache fingerprint, so two
/// configs compare equal iff their canonical strings match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "AnalysisConfig::default_damping")]
    pub pagerank_damping: f64,
    #[serde(default = "AnalysisConfig::default_tolerance")]
    pub pagerank_tol: f64,
    #[serde(default = "AnalysisConfig::default_max_iter")]
    pub pagerank_max_iter: usize,
    #[serde(default = "AnalysisConfig::default_cycle_limit")]
    pub cycle_limit: usize,
    #[serde(default = "AnalysisConfig::default_stale_threshold")]
    pub stale_threshold_days: i64,
    #[serde(default = "AnalysisConfig::default_estimated_minutes")]
    pub default_estimated_minutes: i64,
}

impl AnalysisConfig {
    fn default_damping() -> f64 {
        0.85
    }

    fn default_tolerance() -> f64 {
        1e-6
    }

    fn default_max_iter() -> usize {
        100
    }

    fn default_cycle_limit() -> usize {
        16
    }

    fn default_stale_threshold() -> i64 {
        14
    }

    fn default_estimated_minutes() -> i64 {
        60
    }

    /// Cycle limit clamped to the supported enumeration range.
    pub fn effective_cycle_limit(&self) -> usize {
        self.cycle_limit.clamp(1, 64)
    }

    /// Deterministic serialization used for config fingerprinting.
    pub fn canonical_string(&self) -> String {
        format!(
            "damping={};tol={};max_iter={};cycle_limit={};stale_days={};default_minutes={}",
            self.pagerank_damping,
            self.pagerank_tol,
            self.pagerank_max_iter,
            self.cycle_limit,
            self.stale_threshold_days,
            self.default_estimated_minutes,
        )
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            pagerank_damping: Self::default_damping(),
            pagerank_tol: Self::default_tolerance(),
            pagerank_max_iter: Self::default_max_iter(),
            cycle_limit: Self::default_cycle_limit(),
            stale_threshold_days: Self::default_stale_threshold(),
            default_estimated_minutes: Self::default_estimated_minutes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_string_is_stable() {
        let a = AnalysisConfig::default();
        let b = AnalysisConfig::default();
        assert_eq!(a.canonical_string(), b.canonical_string());

        let c = AnalysisConfig {
            cycle_limit: 8,
            ..Default::default()
        };
        assert_ne!(a.canonical_string(), c.canonical_string());
    }

    #[test]
    fn cycle_limit_is_clamped() {
        let low = AnalysisConfig {
            cycle_limit: 0,
            ..Default::default()
        };
        assert_eq!(low.effective_cycle_limit(), 1);

        let high = AnalysisConfig {
            cycle_limit: 1000,
            ..Default::default()
        };
        assert_eq!(high.effective_cycle_limit(), 64);
    }

    #[test]
    fn missing_fields_deserialize_to_defaults() {
        let cfg: AnalysisConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, AnalysisConfig::default());
    }
}
