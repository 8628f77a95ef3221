//! The agent engine: one autonomous retention cycle at a time.
//!
//! CYCLE ORDER (fixed, documented, never reordered):
//!   1. Rescore     every customer; persist scores that moved significantly
//!   2. Detect      abandon orphaned interventions, then select candidates
//!   3. Intervene   plan, gate, open, execute, record, per candidate
//!   4. Follow up   classify interventions completed 24–48h ago
//!   5. Learn       feed fresh outcomes back into the pattern library
//!
//! RULES:
//!   - `run_cycle` never fails. A failing customer or phase is logged,
//!     counted in `CycleReport::errors`, and the cycle moves on.
//!   - Every multi-row write goes through one `unit_of_work`.
//!   - All time comes from the `AgentClock`.
//!   - Every decision is recorded as an `AgentActivity`.

use crate::{
    activity::AgentActivity,
    advisor::{decide_plan, PlanDecision, PlanRequest, RuleTableAdvisor, StrategyAdvisor},
    analytics::{churn_analytics, ChurnAnalytics},
    clock::AgentClock,
    communication::CHURN_FACTOR_TERMS,
    config::AgentConfig,
    customer::Customer,
    embedding::embed_text,
    error::{AgentError, AgentResult},
    executor::InterventionExecutor,
    intervention::ChurnIntervention,
    memory::{rank_memories, AgentMemory, MemoryContext, CHURN_INTERVENTION},
    notification::{NotificationChannel, SimulatedChannel},
    patterns::PatternLibrary,
    risk_scorer::RiskScorer,
    seed::{seed_demo_data, SeedSummary},
    store::AgentStore,
    types::{ActivityType, RiskLevel, Urgency},
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Serialize;
use serde_json::json;

/// Inbound messages handed to the advisor per candidate.
const COMMUNICATION_SEARCH_LIMIT: usize = 10;

/// What one cycle did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub cycle:                 u64,
    pub customers_scored:      usize,
    pub scores_updated:        usize,
    pub orphans_abandoned:     usize,
    pub candidates:            usize,
    pub interventions_created: usize,
    pub plans_rejected:        usize,
    pub follow_ups:            usize,
    pub patterns_updated:      usize,
    pub errors:                usize,
    pub activities:            Vec<AgentActivity>,
}

pub struct AgentEngine {
    pub config: AgentConfig,
    pub clock:  AgentClock,
    pub(crate) store:   AgentStore,
    pub(crate) scorer:  RiskScorer,
    pub(crate) advisor: Box<dyn StrategyAdvisor>,
    pub(crate) channel: Box<dyn NotificationChannel>,
}

impl AgentEngine {
    pub fn new(
        config: AgentConfig,
        clock: AgentClock,
        store: AgentStore,
        scorer: RiskScorer,
        advisor: Box<dyn StrategyAdvisor>,
        channel: Box<dyn NotificationChannel>,
    ) -> Self {
        Self { config, clock, store, scorer, advisor, channel }
    }

    /// Build a fully wired engine: migrated store, trained scorer, rule-table
    /// advisor and simulated delivery.
    pub fn build(config: AgentConfig, store: AgentStore, clock: AgentClock) -> AgentResult<Self> {
        store.migrate()?;
        let scorer = RiskScorer::train(&config.model);
        log::info!("engine: scorer '{}' trained on {} samples", scorer.model_name(), config.model.training_samples);
        let advisor = Box::new(RuleTableAdvisor::new(&config.thresholds));
        Ok(Self::new(config, clock, store, scorer, advisor, Box::new(SimulatedChannel)))
    }

    /// In-memory engine on a manual clock, for tests.
    pub fn build_test() -> AgentResult<Self> {
        let start = Utc
            .with_ymd_and_hms(2026, 3, 2, 9, 0, 0)
            .single()
            .ok_or_else(|| AgentError::Other(anyhow::anyhow!("invalid test start time")))?;
        Self::build(AgentConfig::default_test(), AgentStore::in_memory()?, AgentClock::manual(start))
    }

    pub fn with_advisor(mut self, advisor: Box<dyn StrategyAdvisor>) -> Self {
        self.advisor = advisor;
        self
    }

    pub fn with_channel(mut self, channel: Box<dyn NotificationChannel>) -> Self {
        self.channel = channel;
        self
    }

    pub fn with_scorer(mut self, scorer: RiskScorer) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn store(&self) -> &AgentStore {
        &self.store
    }

    pub fn scorer(&self) -> &RiskScorer {
        &self.scorer
    }

    pub fn seed_demo_data(&self) -> AgentResult<SeedSummary> {
        seed_demo_data(&self.store, &self.scorer, self.config.retrieval.embedding_dim, self.clock.now())
    }

    pub fn analytics(&self) -> AgentResult<ChurnAnalytics> {
        let now = self.clock.now();
        let customers = self.store.all_customers()?;
        let recent = self.store.interventions_created_since(now - Duration::hours(24))?;
        Ok(churn_analytics(&customers, &recent))
    }

    /// Run one full cycle. Never fails; see `CycleReport::errors`.
    pub fn run_cycle(&mut self) -> CycleReport {
        let cycle = self.clock.next_cycle();
        let now = self.clock.now();
        let mut report = CycleReport { cycle, ..Default::default() };
        log::info!("cycle={cycle} started at {now}");

        self.rescore_phase(&mut report, now);
        let candidates = self.detection_phase(&mut report, now);
        self.intervention_phase(&mut report, candidates, now);
        self.follow_up_phase(&mut report, now);
        self.learning_phase(&mut report, now);

        log::info!(
            "cycle={cycle} done: scored={} updated={} candidates={} interventions={} rejected={} \
             follow_ups={} patterns={} orphans={} errors={}",
            report.customers_scored,
            report.scores_updated,
            report.candidates,
            report.interventions_created,
            report.plans_rejected,
            report.follow_ups,
            report.patterns_updated,
            report.orphans_abandoned,
            report.errors,
        );
        report
    }

    // ── Phase 1: rescore ───────────────────────────────────────

    fn rescore_phase(&self, report: &mut CycleReport, now: DateTime<Utc>) {
        let customers = match self.store.all_customers() {
            Ok(c) => c,
            Err(e) => {
                log::error!("cycle={} rescore: cannot load customers: {e}", report.cycle);
                report.errors += 1;
                return;
            }
        };
        let dim = self.config.retrieval.embedding_dim;

        for mut customer in customers {
            report.customers_scored += 1;
            let probability = self.scorer.predict_churn_probability(&customer.signals());
            if RiskScorer::is_significant_change(
                customer.churn_probability,
                probability,
                self.config.thresholds.significant_change,
            ) {
                let level = RiskScorer::risk_level(probability);
                match self.store.update_customer_risk(customer.id, probability, level, now) {
                    Ok(()) => {
                        log::debug!(
                            "cycle={} customer={} churn {:.3} -> {probability:.3} ({level})",
                            report.cycle,
                            customer.id,
                            customer.churn_probability
                        );
                        customer.churn_probability = probability;
                        report.scores_updated += 1;
                    }
                    Err(e) => {
                        log::error!("cycle={} customer={} score not saved: {e}", report.cycle, customer.id);
                        report.errors += 1;
                    }
                }
            }

            if customer.behavior_embedding.len() != dim {
                let embedding = embed_text(&customer.embedding_text(), dim);
                if let Err(e) = self.store.set_customer_embedding(customer.id, &embedding, now) {
                    log::error!("cycle={} customer={} embedding not saved: {e}", report.cycle, customer.id);
                    report.errors += 1;
                }
            }
        }
    }

    // ── Phase 2: detect ────────────────────────────────────────

    fn detection_phase(&self, report: &mut CycleReport, now: DateTime<Utc>) -> Vec<Customer> {
        let cycle = report.cycle;
        let cutoff = now - Duration::minutes(self.config.windows.orphaned_after_minutes);
        let abandoned = self.store.unit_of_work(|s| {
            let orphans = s.abandon_orphaned_interventions(cutoff, now)?;
            orphans
                .iter()
                .map(|o| {
                    s.insert_activity(
                        &AgentActivity::new(
                            cycle,
                            ActivityType::InterventionAbandoned,
                            format!("Intervention {} never completed and was marked timeout", o.id),
                            Urgency::Medium,
                            now,
                        )
                        .for_customer(o.customer_id)
                        .for_intervention(o.id)
                        .with_metadata(json!({
                            "intervention_type": o.intervention_type,
                            "created_at": o.created_at,
                        })),
                    )
                })
                .collect::<AgentResult<Vec<_>>>()
        });
        match abandoned {
            Ok(activities) => {
                if !activities.is_empty() {
                    log::warn!("cycle={cycle} abandoned {} orphaned intervention(s)", activities.len());
                }
                report.orphans_abandoned += activities.len();
                report.activities.extend(activities);
            }
            Err(e) => {
                log::error!("cycle={cycle} orphan sweep failed: {e}");
                report.errors += 1;
            }
        }

        let at_risk = match self.store.customers_at_or_above(self.config.thresholds.churn_threshold) {
            Ok(c) => c,
            Err(e) => {
                log::error!("cycle={cycle} detection: cannot load at-risk customers: {e}");
                report.errors += 1;
                return Vec::new();
            }
        };

        let since = now - Duration::hours(self.config.windows.active_window_hours);
        let mut candidates = Vec::new();
        for customer in at_risk {
            match self.store.has_active_intervention(customer.id, since) {
                Ok(true) => {
                    log::debug!("cycle={cycle} customer={} already has an active intervention", customer.id);
                }
                Ok(false) => {
                    let activity = AgentActivity::new(
                        cycle,
                        ActivityType::ChurnDetected,
                        format!(
                            "{} ({}) at {:.1}% churn risk",
                            customer.name,
                            customer.company,
                            customer.churn_probability * 100.0
                        ),
                        detection_urgency(customer.churn_risk_level),
                        now,
                    )
                    .for_customer(customer.id)
                    .with_metadata(json!({
                        "churn_probability": customer.churn_probability,
                        "risk_level": customer.churn_risk_level,
                        "revenue_at_risk": customer.annual_contract_value,
                        "risk_factors": customer.risk_factors(),
                    }));
                    self.record(report, activity);
                    candidates.push(customer);
                }
                Err(e) => {
                    log::error!("cycle={cycle} customer={} gating check failed: {e}", customer.id);
                    report.errors += 1;
                }
            }
        }
        report.candidates = candidates.len();
        candidates
    }

    // ── Phase 3: intervene ─────────────────────────────────────

    fn intervention_phase(&self, report: &mut CycleReport, candidates: Vec<Customer>, now: DateTime<Utc>) {
        for customer in candidates {
            match self.intervene(report.cycle, &customer, now) {
                Ok(Intervened::Created(activities)) => {
                    report.interventions_created += 1;
                    report.activities.extend(activities);
                }
                Ok(Intervened::Rejected(activity)) => {
                    report.plans_rejected += 1;
                    self.record(report, activity);
                }
                Err(e) => {
                    log::error!("cycle={} customer={} intervention failed: {e}", report.cycle, customer.id);
                    report.errors += 1;
                }
            }
        }
    }

    fn intervene(&self, cycle: u64, customer: &Customer, now: DateTime<Utc>) -> AgentResult<Intervened> {
        let dim = self.config.retrieval.embedding_dim;
        let embedding = if customer.behavior_embedding.len() == dim {
            customer.behavior_embedding.clone()
        } else {
            embed_text(&customer.embedding_text(), dim)
        };

        let similar_cases = PatternLibrary::new(&self.store, dim).find_similar_cases(
            &embedding,
            customer.segment(),
            customer.churn_probability,
            self.config.retrieval.similar_case_limit,
        );
        let memories = self
            .store
            .memories_related_to(customer.id, CHURN_INTERVENTION)
            .and_then(|m| rank_memories(&embedding, m, self.config.retrieval.memory_recall_limit))
            .unwrap_or_else(|e| {
                log::warn!("customer={} memory recall failed: {e}", customer.id);
                Vec::new()
            });
        let communications = self
            .store
            .search_communications(customer.id, &CHURN_FACTOR_TERMS, COMMUNICATION_SEARCH_LIMIT)
            .unwrap_or_else(|e| {
                log::warn!("customer={} communication search failed: {e}", customer.id);
                Vec::new()
            });

        let profile = customer.profile();
        let request = PlanRequest {
            profile: &profile,
            churn_probability: customer.churn_probability,
            similar_cases: &similar_cases,
            memories: &memories,
            communications: &communications,
        };

        let (plan, source) = match decide_plan(self.advisor.as_ref(), &request, &self.config.thresholds) {
            PlanDecision::Accepted { plan, source } => (plan, source),
            PlanDecision::Rejected { plan, reason } => {
                log::info!("cycle={cycle} customer={} plan rejected: {reason}", customer.id);
                let activity = AgentActivity::new(
                    cycle,
                    ActivityType::PlanRejected,
                    format!("Plan for {} rejected: {reason}", customer.name),
                    Urgency::Low,
                    now,
                )
                .for_customer(customer.id)
                .with_metadata(json!({
                    "intervention_type": plan.intervention_type,
                    "strategy": plan.strategy,
                    "confidence": plan.confidence,
                }));
                return Ok(Intervened::Rejected(activity));
            }
        };

        // Open the intervention. The gate is re-checked inside the same
        // transaction as the insert.
        let mut intervention = ChurnIntervention::open(customer, &plan, now);
        let since = now - Duration::hours(self.config.windows.active_window_hours);
        let context = MemoryContext {
            segment: customer.segment(),
            churn_probability: customer.churn_probability,
            intervention_type: plan.intervention_type.clone(),
            strategy: plan.strategy.clone(),
            improvement: None,
        };
        intervention.id = self.store.unit_of_work(|s| {
            if s.has_active_intervention(customer.id, since)? {
                return Err(AgentError::ActiveInterventionExists { id: customer.id });
            }
            let id = s.insert_intervention(&intervention)?;
            s.insert_memory(&AgentMemory::new(customer.id, CHURN_INTERVENTION, context, "initiated", dim, now))?;
            Ok(id)
        })?;

        let executor = InterventionExecutor::new(self.channel.as_ref(), self.advisor.as_ref(), &self.config);
        let execution = executor.execute(customer, &plan.intervention_type, &plan.execution_plan, now);
        let urgency = if customer.churn_probability >= self.config.thresholds.high_urgency_probability {
            Urgency::High
        } else {
            Urgency::Medium
        };

        let activities = self.store.unit_of_work(|s| {
            s.complete_intervention(intervention.id, execution.status, &execution.results, now)?;
            for message in &execution.messages {
                s.insert_communication(message)?;
            }
            let mut activities = Vec::with_capacity(execution.corrections.len() + 1);
            for correction in &execution.corrections {
                activities.push(s.insert_activity(
                    &AgentActivity::new(
                        cycle,
                        ActivityType::SelfCorrection,
                        format!(
                            "{} failed for {}; applied {:?}",
                            correction.failed_step.kind().as_str(),
                            customer.name,
                            correction.rule
                        ),
                        Urgency::High,
                        now,
                    )
                    .for_customer(customer.id)
                    .for_intervention(intervention.id)
                    .with_metadata(json!(correction)),
                )?);
            }
            activities.push(s.insert_activity(
                &AgentActivity::new(
                    cycle,
                    ActivityType::InterventionExecuted,
                    format!(
                        "{} for {} ({}): {}",
                        plan.intervention_type,
                        customer.name,
                        customer.company,
                        execution.status
                    ),
                    urgency,
                    now,
                )
                .for_customer(customer.id)
                .for_intervention(intervention.id)
                .with_metadata(json!({
                    "churn_probability": customer.churn_probability,
                    "revenue_at_risk": intervention.revenue_at_risk,
                    "estimated_retention_value": intervention.estimated_retention_value,
                    "intervention_type": plan.intervention_type,
                    "strategy": plan.strategy,
                    "confidence": plan.confidence,
                    "plan_source": source,
                    "status": execution.status,
                    "steps": execution.results.len(),
                    "corrections": execution.corrections.len(),
                    "timed_out": execution.timed_out,
                })),
            )?);
            Ok(activities)
        })?;

        log::info!(
            "cycle={cycle} customer={} intervention={} {} via {} -> {}",
            customer.id,
            intervention.id,
            plan.intervention_type,
            plan.strategy,
            execution.status
        );
        Ok(Intervened::Created(activities))
    }

    /// Persist one standalone activity. A failure is logged and counted;
    /// the activity is still reported.
    pub(crate) fn record(&self, report: &mut CycleReport, activity: AgentActivity) {
        match self.store.insert_activity(&activity) {
            Ok(stored) => report.activities.push(stored),
            Err(e) => {
                log::error!("cycle={} activity not saved: {e}", report.cycle);
                report.errors += 1;
                report.activities.push(activity);
            }
        }
    }
}

enum Intervened {
    Created(Vec<AgentActivity>),
    Rejected(AgentActivity),
}

fn detection_urgency(level: RiskLevel) -> Urgency {
    match level {
        RiskLevel::Critical => Urgency::Critical,
        RiskLevel::High => Urgency::High,
        RiskLevel::Medium => Urgency::Medium,
        RiskLevel::Low => Urgency::Low,
    }
}
