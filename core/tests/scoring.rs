use retention_core::{
    config::AgentConfig,
    customer::CustomerSignals,
    risk_scorer::{RiskScorer, NEUTRAL_PROBABILITY},
    types::RiskLevel,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn scorer() -> RiskScorer {
    RiskScorer::train(&AgentConfig::default_test().model)
}

fn baseline() -> CustomerSignals {
    CustomerSignals {
        days_since_signup:     180.0,
        last_login_days_ago:   3.0,
        support_tickets_count: 2.0,
        feature_usage_score:   0.6,
        nps_score:             7.0,
        payment_delays:        0.0,
        monthly_revenue:       800.0,
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// Worse behaviour on any single signal never lowers the probability.
#[test]
fn probability_is_monotone_in_each_risk_signal() {
    let scorer = scorer();
    let score = |s: CustomerSignals| scorer.predict_churn_probability(&s);
    let base = baseline();

    let mut previous = score(base);
    for login in [5.0, 8.0, 14.0, 30.0, 90.0] {
        let p = score(CustomerSignals { last_login_days_ago: login, ..base });
        assert!(p >= previous, "login {login}: {p} < {previous}");
        previous = p;
    }

    let mut previous = score(base);
    for nps in [6.0, 5.0, 3.0, 0.0] {
        let p = score(CustomerSignals { nps_score: nps, ..base });
        assert!(p >= previous, "nps {nps}: {p} < {previous}");
        previous = p;
    }

    let mut previous = score(base);
    for usage in [0.4, 0.29, 0.1, 0.0] {
        let p = score(CustomerSignals { feature_usage_score: usage, ..base });
        assert!(p >= previous, "usage {usage}: {p} < {previous}");
        previous = p;
    }

    let mut previous = score(base);
    for tickets in [4.0, 6.0, 10.0, 25.0] {
        let p = score(CustomerSignals { support_tickets_count: tickets, ..base });
        assert!(p >= previous, "tickets {tickets}: {p} < {previous}");
        previous = p;
    }
}

/// A customer failing every signal scores above the churn threshold; a
/// thriving one scores low.
#[test]
fn extreme_customers_land_on_the_expected_side() {
    let scorer = scorer();
    let struggling = CustomerSignals {
        last_login_days_ago: 45.0,
        support_tickets_count: 15.0,
        feature_usage_score: 0.05,
        nps_score: 1.0,
        payment_delays: 5.0,
        ..baseline()
    };
    let thriving = CustomerSignals {
        last_login_days_ago: 1.0,
        support_tickets_count: 0.0,
        feature_usage_score: 0.95,
        nps_score: 10.0,
        ..baseline()
    };

    assert!(scorer.predict_churn_probability(&struggling) > 0.75);
    assert!(scorer.predict_churn_probability(&thriving) < 0.4);
}

/// Tier boundaries are inclusive at 0.4, 0.6 and 0.8.
#[test]
fn risk_tiers_at_boundaries() {
    let cases = [
        (0.79999, RiskLevel::High),
        (0.8, RiskLevel::Critical),
        (0.59999, RiskLevel::Medium),
        (0.6, RiskLevel::High),
        (0.39999, RiskLevel::Low),
        (0.4, RiskLevel::Medium),
    ];
    for (p, expected) in cases {
        assert_eq!(RiskScorer::risk_level(p), expected, "p={p}");
    }
}

/// Bad input degrades to the neutral score instead of failing.
#[test]
fn unusable_signals_score_neutral() {
    let scorer = scorer();
    let nan = CustomerSignals { nps_score: f64::NAN, ..baseline() };
    let negative = CustomerSignals { monthly_revenue: -10.0, ..baseline() };

    assert_eq!(scorer.predict_churn_probability(&nan), NEUTRAL_PROBABILITY);
    assert_eq!(scorer.predict_churn_probability(&negative), NEUTRAL_PROBABILITY);
}

/// Same seed, same scores.
#[test]
fn training_is_deterministic() {
    let a = scorer();
    let b = scorer();
    for login in [0.0, 7.0, 30.0] {
        let s = CustomerSignals { last_login_days_ago: login, ..baseline() };
        assert_eq!(a.predict_churn_probability(&s), b.predict_churn_probability(&s));
    }
}

/// Only moves larger than the floor are persisted.
#[test]
fn significant_change_is_strict() {
    assert!(!RiskScorer::is_significant_change(0.70, 0.74, 0.05));
    assert!(RiskScorer::is_significant_change(0.70, 0.80, 0.05));
    assert!(RiskScorer::is_significant_change(0.80, 0.70, 0.05));
}

/// Every feature carries an importance and they sum to one.
#[test]
fn feature_importance_is_normalised() {
    let importance = scorer().feature_importance();
    assert_eq!(importance.len(), 10);
    let total: f64 = importance.iter().map(|(_, w)| w).sum();
    assert!((total - 1.0).abs() < 1e-9);
}
