//! Closing the loop: follow-up measurement and pattern learning.
//!
//! Follow-up rescoring never touches the customer's stored probability; it
//! only sets `churn_probability_after` on the intervention.
//!
//! Each intervention reinforces its pattern at most once, guarded by
//! `pattern_feedback_at`.

use crate::{
    activity::AgentActivity,
    engine::{AgentEngine, CycleReport},
    error::AgentResult,
    intervention::{classify_improvement, ChurnIntervention, FollowUpVerdict},
    memory::{AgentMemory, MemoryContext, CHURN_INTERVENTION},
    patterns::{characteristics_from_profile, PatternLibrary, PatternUpdate},
    types::{ActivityType, ActualOutcome, Urgency},
};
use chrono::{DateTime, Duration, Utc};
use serde_json::json;

impl AgentEngine {
    // ── Phase 4: follow up ─────────────────────────────────────

    pub(crate) fn follow_up_phase(&self, report: &mut CycleReport, now: DateTime<Utc>) {
        let windows = &self.config.windows;
        let from = now - Duration::hours(windows.follow_up_max_hours);
        let to = now - Duration::hours(windows.follow_up_min_hours);
        let due = match self.store.interventions_due_for_follow_up(from, to) {
            Ok(due) => due,
            Err(e) => {
                log::error!("cycle={} follow-up: cannot load interventions: {e}", report.cycle);
                report.errors += 1;
                return;
            }
        };

        for intervention in due {
            match self.follow_up(report.cycle, &intervention, now) {
                Ok(activity) => {
                    report.follow_ups += 1;
                    report.activities.push(activity);
                }
                Err(e) => {
                    log::error!("cycle={} intervention={} follow-up failed: {e}", report.cycle, intervention.id);
                    report.errors += 1;
                }
            }
        }
    }

    fn follow_up(&self, cycle: u64, intervention: &ChurnIntervention, now: DateTime<Utc>) -> AgentResult<AgentActivity> {
        let customer = self.store.get_customer(intervention.customer_id)?;
        let probability_after = self.scorer.predict_churn_probability(&customer.signals());
        let improvement = intervention.churn_probability_before - probability_after;
        let (outcome, verdict) = classify_improvement(improvement);
        let revenue_impact = if outcome == ActualOutcome::Retained {
            intervention.revenue_at_risk
        } else {
            0.0
        };

        log::info!(
            "cycle={cycle} intervention={} follow-up: {:.3} -> {probability_after:.3} ({outcome})",
            intervention.id,
            intervention.churn_probability_before
        );

        let activity = AgentActivity::new(
            cycle,
            ActivityType::InterventionFollowUp,
            format!(
                "Follow-up for {}: churn risk {:.1}% -> {:.1}% ({outcome})",
                customer.name,
                intervention.churn_probability_before * 100.0,
                probability_after * 100.0
            ),
            if verdict == FollowUpVerdict::NeedsEscalation { Urgency::High } else { Urgency::Low },
            now,
        )
        .for_customer(customer.id)
        .for_intervention(intervention.id)
        .with_metadata(json!({
            "churn_probability_before": intervention.churn_probability_before,
            "churn_probability_after": probability_after,
            "improvement": improvement,
            "outcome": outcome,
            "verdict": verdict,
            "revenue_impact": revenue_impact,
        }));

        let context = MemoryContext {
            segment: customer.segment(),
            churn_probability: probability_after,
            intervention_type: intervention.intervention_type.clone(),
            strategy: intervention.strategy_chosen.clone(),
            improvement: Some(improvement),
        };
        let memory = AgentMemory::new(
            customer.id,
            CHURN_INTERVENTION,
            context,
            outcome.as_str(),
            self.config.retrieval.embedding_dim,
            now,
        );

        self.store.unit_of_work(|s| {
            s.record_follow_up(intervention.id, probability_after, outcome, now)?;
            s.insert_memory(&memory)?;
            s.insert_activity(&activity)
        })
    }

    // ── Phase 5: learn ─────────────────────────────────────────

    pub(crate) fn learning_phase(&self, report: &mut CycleReport, now: DateTime<Utc>) {
        let since = now - Duration::days(self.config.windows.learning_window_days);
        let pending = match self.store.interventions_awaiting_pattern_feedback(since) {
            Ok(p) => p,
            Err(e) => {
                log::error!("cycle={} learning: cannot load outcomes: {e}", report.cycle);
                report.errors += 1;
                return;
            }
        };

        for intervention in pending {
            match self.learn_from(report.cycle, &intervention, now) {
                Ok(activity) => {
                    report.patterns_updated += 1;
                    report.activities.push(activity);
                }
                Err(e) => {
                    log::error!("cycle={} intervention={} learning failed: {e}", report.cycle, intervention.id);
                    report.errors += 1;
                }
            }
        }
    }

    fn learn_from(&self, cycle: u64, intervention: &ChurnIntervention, now: DateTime<Utc>) -> AgentResult<AgentActivity> {
        let customer = self.store.get_customer(intervention.customer_id)?;
        let success = intervention.actual_outcome == Some(ActualOutcome::Retained);
        let characteristics = characteristics_from_profile(&customer.profile())?;
        let dim = self.config.retrieval.embedding_dim;

        self.store.unit_of_work(|s| {
            let update = PatternLibrary::new(s, dim).apply_update(
                customer.segment(),
                &intervention.intervention_type,
                &intervention.strategy_chosen,
                success,
                &characteristics,
                now,
            )?;
            s.mark_pattern_feedback(intervention.id, now)?;
            let description = match &update {
                PatternUpdate::Created { pattern_name, success_rate } => {
                    format!("Learned new pattern {pattern_name} (success rate {success_rate:.2})")
                }
                PatternUpdate::Updated { pattern_name, previous_rate, success_rate } => format!(
                    "Pattern {pattern_name} success rate {previous_rate:.2} -> {success_rate:.2}"
                ),
            };
            s.insert_activity(
                &AgentActivity::new(cycle, ActivityType::PatternLearning, description, Urgency::Low, now)
                    .for_customer(customer.id)
                    .for_intervention(intervention.id)
                    .with_metadata(json!({
                        "outcome": intervention.actual_outcome,
                        "success": success,
                        "update": update,
                    })),
            )
        })
    }
}
