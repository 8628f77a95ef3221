use serde::{Deserialize, Serialize};

/// What to do when the advisor answers with confidence below the floor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LowConfidencePolicy {
    /// Reject the plan; the customer is left untouched until the next cycle.
    Skip,
    /// Replace the plan with the core rule table.
    Fallback,
}

/// Decision thresholds for detection, gating and follow-up.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Probability at or above which a customer becomes a candidate.
    pub churn_threshold: f64,
    /// Plans with confidence below this are rejected.
    pub confidence_floor: f64,
    /// Stored probability is only overwritten when it moves more than this.
    pub significant_change: f64,
    /// Probability at or above which outreach urgency is high.
    pub high_urgency_probability: f64,
    /// Upper bound on any discount offered.
    pub max_discount_percent: u32,
    pub low_confidence_policy: LowConfidencePolicy,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            churn_threshold: 0.75,
            confidence_floor: 0.6,
            significant_change: 0.05,
            high_urgency_probability: 0.9,
            max_discount_percent: 30,
            low_confidence_policy: LowConfidencePolicy::Skip,
        }
    }
}

/// Time windows, all measured against the agent clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// An active intervention younger than this blocks a new one.
    pub active_window_hours: i64,
    /// Follow-up picks up interventions completed between min and max hours ago.
    pub follow_up_min_hours: i64,
    pub follow_up_max_hours: i64,
    /// Outcomes older than this no longer reinforce patterns.
    pub learning_window_days: i64,
    /// `executing` records older than this are abandoned as orphans.
    pub orphaned_after_minutes: i64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            active_window_hours: 24,
            follow_up_min_hours: 24,
            follow_up_max_hours: 48,
            learning_window_days: 7,
            orphaned_after_minutes: 60,
        }
    }
}

/// Execution budgets for the notification boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Whole-plan budget; steps not started before it runs out are skipped.
    pub intervention_timeout_secs: u64,
    /// A single delivery call slower than this counts as a failure.
    pub step_timeout_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            intervention_timeout_secs: 300,
            step_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub training_seed: u64,
    pub training_samples: usize,
    pub training_epochs: usize,
    pub learning_rate: f64,
    pub l2_penalty: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            training_seed: 42,
            training_samples: 1_000,
            training_epochs: 400,
            learning_rate: 0.5,
            l2_penalty: 0.001,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub embedding_dim: usize,
    pub similar_case_limit: usize,
    pub memory_recall_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            embedding_dim: crate::types::EMBEDDING_DIM,
            similar_case_limit: 5,
            memory_recall_limit: 3,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Seconds between cycles in the runner. Not a correctness contract.
    pub cycle_interval_secs: u64,
    pub thresholds: ThresholdConfig,
    pub windows: WindowConfig,
    pub execution: ExecutionConfig,
    pub model: ModelConfig,
    pub retrieval: RetrievalConfig,
}

impl AgentConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    /// In tests, use AgentConfig::default_test().
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let mut config: AgentConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        if config.cycle_interval_secs == 0 {
            config.cycle_interval_secs = 15;
        }
        config.validate()?;
        Ok(config)
    }

    /// Reference defaults with a smaller training set so tests start fast.
    pub fn default_test() -> Self {
        let mut config = Self::reference();
        config.model.training_samples = 600;
        config.model.training_epochs = 250;
        config
    }

    /// Reference deployment values.
    pub fn reference() -> Self {
        Self {
            cycle_interval_secs: 15,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let t = &self.thresholds;
        for (name, value) in [
            ("churn_threshold", t.churn_threshold),
            ("confidence_floor", t.confidence_floor),
            ("significant_change", t.significant_change),
            ("high_urgency_probability", t.high_urgency_probability),
        ] {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("{name} must be within [0, 1], got {value}");
            }
        }
        let w = &self.windows;
        if w.follow_up_min_hours >= w.follow_up_max_hours {
            anyhow::bail!(
                "follow-up window is empty: {}h..{}h",
                w.follow_up_min_hours,
                w.follow_up_max_hours
            );
        }
        if self.retrieval.embedding_dim == 0 {
            anyhow::bail!("embedding_dim must be positive");
        }
        if self.model.training_samples == 0 {
            anyhow::bail!("training_samples must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_takes_defaults() {
        let config: AgentConfig =
            serde_json::from_str(r#"{ "thresholds": { "churn_threshold": 0.8 } }"#).unwrap();
        assert_eq!(config.thresholds.churn_threshold, 0.8);
        assert_eq!(config.thresholds.confidence_floor, 0.6);
        assert_eq!(config.windows.follow_up_max_hours, 48);
        assert_eq!(config.thresholds.low_confidence_policy, LowConfidencePolicy::Skip);
    }

    #[test]
    fn shipped_config_matches_reference() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../data/agent_config.json");
        let config = AgentConfig::load(path).unwrap();
        let reference = AgentConfig::reference();
        assert_eq!(config.thresholds.churn_threshold, reference.thresholds.churn_threshold);
        assert_eq!(config.windows.orphaned_after_minutes, reference.windows.orphaned_after_minutes);
        assert_eq!(config.execution.step_timeout_ms, reference.execution.step_timeout_ms);
        assert_eq!(config.retrieval.embedding_dim, reference.retrieval.embedding_dim);
    }

    #[test]
    fn empty_follow_up_window_is_rejected() {
        let mut config = AgentConfig::reference();
        config.windows.follow_up_min_hours = 48;
        assert!(config.validate().is_err());
    }
}
