//! Shared doubles for the integration tests.
//!
//! Not every test file uses every helper.
#![allow(dead_code)]

use retention_core::{
    advisor::{OutreachRequest, PlanRequest, StrategyAdvisor},
    customer::Customer,
    engine::AgentEngine,
    error::{AgentError, AgentResult, NotificationError},
    notification::{DeliveryResult, NotificationChannel},
    plan::{InterventionPlan, PlanStep},
    risk_scorer::{ChurnModel, FeatureVector, RiskScorer},
    types::{ContactMethod, CustomerId, RiskLevel, SubscriptionTier, Urgency},
};
use std::{
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

// ── Engines ──────────────────────────────────────────────────────────────────

pub fn make_engine() -> AgentEngine {
    let _ = env_logger::builder().is_test(true).try_init();
    AgentEngine::build_test().expect("test engine")
}

/// Engine whose scorer answers whatever the returned handle holds.
pub fn scripted_engine(probability: f64) -> (AgentEngine, ScriptedProbability) {
    let handle = ScriptedProbability::new(probability);
    let engine = make_engine()
        .with_scorer(RiskScorer::with_model(Box::new(handle.clone())))
        .with_advisor(Box::new(ScriptedAdvisor::confident()))
        .with_channel(Box::new(ScriptedChannel::reliable()));
    (engine, handle)
}

// ── Scorer ───────────────────────────────────────────────────────────────────

/// A churn model that returns a fixed probability, adjustable mid-test.
#[derive(Clone)]
pub struct ScriptedProbability(Arc<Mutex<f64>>);

impl ScriptedProbability {
    pub fn new(p: f64) -> Self {
        Self(Arc::new(Mutex::new(p)))
    }

    pub fn set(&self, p: f64) {
        *self.0.lock().unwrap() = p;
    }
}

impl ChurnModel for ScriptedProbability {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn predict(&self, _features: &FeatureVector) -> AgentResult<f64> {
        Ok(*self.0.lock().unwrap())
    }
}

// ── Advisor ──────────────────────────────────────────────────────────────────

/// Answers every planning request with the same plan.
pub struct ScriptedAdvisor {
    pub plan: InterventionPlan,
    pub fail: bool,
}

impl ScriptedAdvisor {
    /// Confidence 0.8, three steps: email outreach, 15% discount, call.
    pub fn confident() -> Self {
        Self::with_confidence(0.8)
    }

    pub fn with_confidence(confidence: f64) -> Self {
        Self {
            plan: InterventionPlan {
                trigger_reason: "High churn probability".into(),
                intervention_type: "retention_outreach".into(),
                strategy: "satisfaction_recovery".into(),
                confidence,
                expected_success_rate: 0.7,
                execution_plan: vec![
                    PlanStep::PersonalizedOutreach { method: Some(ContactMethod::Email) },
                    PlanStep::discount(15),
                    PlanStep::ScheduleCall { urgency: Urgency::High },
                ],
                reasoning: "scripted".into(),
            },
            fail: false,
        }
    }

    pub fn unavailable() -> Self {
        Self { fail: true, ..Self::confident() }
    }
}

impl StrategyAdvisor for ScriptedAdvisor {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn propose_plan(&self, _request: &PlanRequest<'_>) -> AgentResult<InterventionPlan> {
        if self.fail {
            return Err(AgentError::AdvisorUnavailable("scripted outage".into()));
        }
        Ok(self.plan.clone())
    }

    fn compose_outreach(&self, request: &OutreachRequest<'_>) -> AgentResult<String> {
        Ok(format!("Hi {}, checking in about {}.", request.customer_name, request.company))
    }
}

// ── Channel ──────────────────────────────────────────────────────────────────

/// Every delivery attempt, in order: "email", "chat", "call", "offer", "demo".
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<&'static str>>>);

impl CallLog {
    pub fn calls(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|c| **c == kind).count()
    }

    fn push(&self, kind: &'static str) {
        self.0.lock().unwrap().push(kind);
    }
}

/// Channel whose failures are chosen per delivery kind.
pub struct ScriptedChannel {
    log:       CallLog,
    failing:   Vec<&'static str>,
    transport: Vec<&'static str>,
    reason:    String,
    slow:      Option<(&'static str, u64)>,
}

impl ScriptedChannel {
    /// Delivers everything.
    pub fn reliable() -> Self {
        Self {
            log: CallLog::default(),
            failing: Vec::new(),
            transport: Vec::new(),
            reason: "mailbox bounced".into(),
            slow: None,
        }
    }

    /// Declines every delivery of `kind`.
    pub fn failing(mut self, kind: &'static str) -> Self {
        self.failing.push(kind);
        self
    }

    /// Fails every delivery of `kind` with a transport fault.
    pub fn broken(mut self, kind: &'static str) -> Self {
        self.transport.push(kind);
        self
    }

    pub fn with_reason(mut self, reason: &str) -> Self {
        self.reason = reason.into();
        self
    }

    /// Delays every delivery of `kind` by `millis`, then delivers it.
    pub fn slow(mut self, kind: &'static str, millis: u64) -> Self {
        self.slow = Some((kind, millis));
        self
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    fn deliver(&self, kind: &'static str) -> DeliveryResult {
        self.log.push(kind);
        if let Some((slow_kind, millis)) = self.slow {
            if slow_kind == kind {
                thread::sleep(Duration::from_millis(millis));
            }
        }
        if self.transport.contains(&kind) {
            return Err(NotificationError::Transport("connection reset".into()));
        }
        if self.failing.contains(&kind) {
            return Err(NotificationError::Declined { reason: self.reason.clone() });
        }
        Ok(true)
    }
}

impl NotificationChannel for ScriptedChannel {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn send_email(&self, _to: &str, _subject: &str, _body: &str) -> DeliveryResult {
        self.deliver("email")
    }

    fn send_chat(&self, _customer_id: CustomerId, _message: &str) -> DeliveryResult {
        self.deliver("chat")
    }

    fn schedule_call(&self, _phone: &str, _timezone: &str, _urgency: Urgency) -> DeliveryResult {
        self.deliver("call")
    }

    fn send_offer(&self, _email: &str, _name: &str, _details: &str, _urgency: Urgency) -> DeliveryResult {
        self.deliver("offer")
    }

    fn schedule_demo(&self, _email: &str, _name: &str, _focus: &str, _usage_score: f64) -> DeliveryResult {
        self.deliver("demo")
    }
}

// ── Customers ────────────────────────────────────────────────────────────────

/// A mid-market customer who prefers email, struggling on every signal.
pub fn at_risk_customer(email: &str, churn_probability: f64) -> Customer {
    Customer {
        id: 0,
        name: "Dana Ortiz".into(),
        company: "Ortiz Analytics".into(),
        email: email.into(),
        phone: "+1-555-0301".into(),
        timezone: "America/Denver".into(),
        subscription_tier: SubscriptionTier::Pro,
        monthly_revenue: 1_500.0,
        annual_contract_value: 18_000.0,
        days_since_signup: 200,
        last_login_days_ago: 21,
        support_tickets_count: 9,
        feature_usage_score: 0.2,
        nps_score: 3.0,
        payment_delays: 3,
        churn_probability,
        churn_risk_level: RiskLevel::Critical,
        behavior_embedding: Vec::new(),
        preferred_contact: ContactMethod::Email,
    }
}

pub fn insert_customer(engine: &AgentEngine, customer: &Customer) -> Customer {
    let id = engine
        .store()
        .insert_customer(customer, engine.clock.now())
        .expect("insert customer");
    engine.store().get_customer(id).expect("read customer back")
}
