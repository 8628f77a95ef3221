//! Churn-risk scoring: feature engineering, probability model, risk tiers.
//!
//! The scorer is built once at start-up (`RiskScorer::train`) and handed
//! to the engine by value. Training uses synthetic data generated from the
//! configured seed, so two processes with the same config score identically.
//!
//! RULES:
//!   - Scoring never fails towards the caller: any internal error yields
//!     the neutral probability 0.5.
//!   - Tier thresholds are fixed: ≥0.8 critical, ≥0.6 high, ≥0.4 medium.
//!   - More login inactivity, more tickets, more payment delays, lower NPS
//!     and lower usage never lower the probability. The logistic model
//!     enforces this by projecting those weights onto the allowed sign
//!     after every gradient step.

use crate::{
    config::ModelConfig,
    customer::CustomerSignals,
    error::{AgentError, AgentResult},
    rng::{RngStream, SeededRng},
    types::RiskLevel,
};

pub const FEATURE_COUNT: usize = 10;

pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "days_since_signup",
    "last_login_days_ago",
    "support_tickets_count",
    "feature_usage_score",
    "nps_score",
    "payment_delays",
    "monthly_revenue_log",
    "tickets_per_month",
    "usage_trend",
    "revenue_tier",
];

/// Probability returned whenever scoring fails.
pub const NEUTRAL_PROBABILITY: f64 = 0.5;

pub type FeatureVector = [f64; FEATURE_COUNT];

/// Required direction of each weight: +1 non-negative, -1 non-positive, 0 free.
const WEIGHT_SIGNS: [i8; FEATURE_COUNT] = [0, 1, 1, -1, -1, 1, 0, 1, -1, 0];

/// Build the model input from raw signals, in the fixed feature order.
pub fn extract_features(s: &CustomerSignals) -> AgentResult<FeatureVector> {
    let raw = [
        s.days_since_signup,
        s.last_login_days_ago,
        s.support_tickets_count,
        s.feature_usage_score,
        s.nps_score,
        s.payment_delays,
        s.monthly_revenue,
    ];
    if let Some(bad) = raw.iter().find(|v| !v.is_finite()) {
        return Err(AgentError::Scoring(format!("non-finite signal: {bad}")));
    }
    if s.monthly_revenue < 0.0 {
        return Err(AgentError::Scoring(format!(
            "negative monthly revenue: {}",
            s.monthly_revenue
        )));
    }

    let days_active = s.days_since_signup.max(1.0);
    let tickets_per_month = s.support_tickets_count * 30.0 / days_active;
    let usage_trend = s.feature_usage_score - 0.5;
    let revenue_tier = if s.monthly_revenue < 50.0 {
        0.0
    } else if s.monthly_revenue < 500.0 {
        1.0
    } else {
        2.0
    };

    Ok([
        s.days_since_signup,
        s.last_login_days_ago,
        s.support_tickets_count,
        s.feature_usage_score,
        s.nps_score,
        s.payment_delays,
        s.monthly_revenue.ln_1p(),
        tickets_per_month,
        usage_trend,
        revenue_tier,
    ])
}

/// The contract every churn model must fulfill.
pub trait ChurnModel: Send {
    /// Stable model name for logs.
    fn name(&self) -> &'static str;

    /// Probability of churn for one feature vector.
    fn predict(&self, features: &FeatureVector) -> AgentResult<f64>;

    /// Per-feature weight magnitudes, normalised to sum to 1.
    /// Models without a meaningful notion return an empty list.
    fn feature_importance(&self) -> Vec<(&'static str, f64)> {
        Vec::new()
    }
}

// ── Logistic model ───────────────────────────────────────────────────────────

/// Sign-constrained logistic regression over standardised features.
#[derive(Debug, Clone)]
pub struct LogisticChurnModel {
    means:   FeatureVector,
    stds:    FeatureVector,
    weights: FeatureVector,
    bias:    f64,
}

impl LogisticChurnModel {
    /// Train on synthetic customers labelled by the reference churn rule.
    pub fn train(config: &ModelConfig) -> Self {
        let mut rng = SeededRng::for_stream(config.training_seed, RngStream::Training);
        let (xs, ys) = synthetic_training_set(&mut rng, config.training_samples);
        let model = Self::fit(&xs, &ys, config);
        log::info!(
            "churn model trained: {} samples, {} epochs, positive rate {:.3}",
            xs.len(),
            config.training_epochs,
            ys.iter().sum::<f64>() / ys.len().max(1) as f64,
        );
        model
    }

    fn fit(xs: &[FeatureVector], ys: &[f64], config: &ModelConfig) -> Self {
        let n = xs.len().max(1) as f64;

        let mut means = [0.0; FEATURE_COUNT];
        for x in xs {
            for (m, v) in means.iter_mut().zip(x) {
                *m += v / n;
            }
        }
        let mut stds = [0.0; FEATURE_COUNT];
        for x in xs {
            for j in 0..FEATURE_COUNT {
                stds[j] += (x[j] - means[j]).powi(2) / n;
            }
        }
        for s in &mut stds {
            *s = if *s > 1e-12 { s.sqrt() } else { 1.0 };
        }

        let scaled: Vec<FeatureVector> = xs
            .iter()
            .map(|x| {
                let mut z = [0.0; FEATURE_COUNT];
                for j in 0..FEATURE_COUNT {
                    z[j] = (x[j] - means[j]) / stds[j];
                }
                z
            })
            .collect();

        let mut weights = [0.0; FEATURE_COUNT];
        let mut bias = 0.0;
        for _ in 0..config.training_epochs {
            let mut grad_w = [0.0; FEATURE_COUNT];
            let mut grad_b = 0.0;
            for (z, y) in scaled.iter().zip(ys) {
                let err = sigmoid(dot(&weights, z) + bias) - y;
                for j in 0..FEATURE_COUNT {
                    grad_w[j] += err * z[j] / n;
                }
                grad_b += err / n;
            }
            for j in 0..FEATURE_COUNT {
                weights[j] -= config.learning_rate * (grad_w[j] + config.l2_penalty * weights[j]);
                weights[j] = match WEIGHT_SIGNS[j] {
                    1 => weights[j].max(0.0),
                    -1 => weights[j].min(0.0),
                    _ => weights[j],
                };
            }
            bias -= config.learning_rate * grad_b;
        }

        Self { means, stds, weights, bias }
    }
}

impl ChurnModel for LogisticChurnModel {
    fn name(&self) -> &'static str {
        "logistic"
    }

    fn predict(&self, features: &FeatureVector) -> AgentResult<f64> {
        let mut logit = self.bias;
        for j in 0..FEATURE_COUNT {
            logit += self.weights[j] * (features[j] - self.means[j]) / self.stds[j];
        }
        let p = sigmoid(logit);
        if p.is_finite() {
            Ok(p)
        } else {
            Err(AgentError::Scoring(format!("model produced {p}")))
        }
    }

    fn feature_importance(&self) -> Vec<(&'static str, f64)> {
        let total: f64 = self.weights.iter().map(|w| w.abs()).sum();
        FEATURE_NAMES
            .iter()
            .zip(self.weights.iter())
            .map(|(name, w)| (*name, if total > 0.0 { w.abs() / total } else { 0.0 }))
            .collect()
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn dot(a: &FeatureVector, b: &FeatureVector) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Synthetic population: signup age ~ Exp(200), login gap ~ Exp(5),
/// tickets ~ Poisson(2), usage ~ Beta(2,2), NPS ~ N(7,2), delays ~ Poisson(0.5),
/// revenue log-normal around $250/month. A customer is labelled churned when
/// the weighted rule score plus N(0, 0.1) noise exceeds 0.4.
fn synthetic_training_set(rng: &mut SeededRng, n: usize) -> (Vec<FeatureVector>, Vec<f64>) {
    let mut xs = Vec::with_capacity(n);
    let mut ys = Vec::with_capacity(n);

    while xs.len() < n {
        let signals = CustomerSignals {
            days_since_signup:     rng.exponential(200.0),
            last_login_days_ago:   rng.exponential(5.0),
            support_tickets_count: rng.poisson(2.0) as f64,
            feature_usage_score:   rng.beta_2_2(),
            nps_score:             rng.normal(7.0, 2.0),
            payment_delays:        rng.poisson(0.5) as f64,
            monthly_revenue:       rng.normal(5.5, 1.2).exp(),
        };

        let rule_score = 0.10 * indicator(signals.last_login_days_ago > 7.0)
            + 0.20 * indicator(signals.nps_score < 6.0)
            + 0.15 * indicator(signals.feature_usage_score < 0.3)
            + 0.15 * indicator(signals.support_tickets_count > 5.0)
            + 0.10 * indicator(signals.payment_delays > 2.0);
        let label = indicator(rule_score + rng.normal(0.0, 0.1) > 0.4);

        if let Ok(features) = extract_features(&signals) {
            xs.push(features);
            ys.push(label);
        }
    }

    (xs, ys)
}

fn indicator(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

// ── Scorer ───────────────────────────────────────────────────────────────────

pub struct RiskScorer {
    model: Box<dyn ChurnModel>,
}

impl RiskScorer {
    /// Train the default logistic model.
    pub fn train(config: &ModelConfig) -> Self {
        Self::with_model(Box::new(LogisticChurnModel::train(config)))
    }

    pub fn with_model(model: Box<dyn ChurnModel>) -> Self {
        Self { model }
    }

    pub fn model_name(&self) -> &'static str {
        self.model.name()
    }

    /// Churn probability in [0, 1]. Falls back to 0.5 on any failure.
    pub fn predict_churn_probability(&self, signals: &CustomerSignals) -> f64 {
        match extract_features(signals).and_then(|f| self.model.predict(&f)) {
            Ok(p) if p.is_finite() => p.clamp(0.0, 1.0),
            Ok(p) => {
                log::error!("churn model {} returned {p}; using neutral score", self.model.name());
                NEUTRAL_PROBABILITY
            }
            Err(e) => {
                log::error!("churn scoring failed: {e}; using neutral score");
                NEUTRAL_PROBABILITY
            }
        }
    }

    pub fn risk_level(probability: f64) -> RiskLevel {
        if probability >= 0.8 {
            RiskLevel::Critical
        } else if probability >= 0.6 {
            RiskLevel::High
        } else if probability >= 0.4 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// Whether a fresh score moved far enough to be worth persisting.
    pub fn is_significant_change(old: f64, new: f64, floor: f64) -> bool {
        (old - new).abs() > floor
    }

    pub fn feature_importance(&self) -> Vec<(&'static str, f64)> {
        self.model.feature_importance()
    }
}
