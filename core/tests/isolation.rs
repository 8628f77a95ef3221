mod common;

use chrono::{Duration, TimeZone, Utc};
use common::{at_risk_customer, insert_customer, ScriptedAdvisor, ScriptedChannel, ScriptedProbability};
use retention_core::{
    clock::AgentClock,
    config::AgentConfig,
    engine::AgentEngine,
    risk_scorer::RiskScorer,
    store::AgentStore,
    types::{ActualOutcome, InterventionStatus},
};
use rusqlite::Connection;
use std::{fs, path::PathBuf};

// ── Helpers ──────────────────────────────────────────────────────────────────

/// A file-backed engine plus a second connection to the same database, so a
/// test can install triggers that make the store fail for one customer.
struct FileEngine {
    engine: AgentEngine,
    _p:     ScriptedProbability,
    side:   Connection,
    path:   PathBuf,
}

impl FileEngine {
    fn new() -> Self {
        let path = std::env::temp_dir().join(format!("retention-{}.db", uuid::Uuid::new_v4()));
        let store = AgentStore::open(path.to_str().expect("utf-8 temp path")).unwrap();
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let p = ScriptedProbability::new(0.94);
        let engine = AgentEngine::build(AgentConfig::default_test(), store, AgentClock::manual(start))
            .unwrap()
            .with_scorer(RiskScorer::with_model(Box::new(p.clone())))
            .with_advisor(Box::new(ScriptedAdvisor::confident()))
            .with_channel(Box::new(ScriptedChannel::reliable()));
        let side = Connection::open(&path).unwrap();
        Self { engine, _p: p, side, path }
    }

    fn fail_when(&self, trigger: &str) {
        self.side.execute_batch(trigger).unwrap();
    }
}

impl Drop for FileEngine {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let _ = fs::remove_file(format!("{}{suffix}", self.path.display()));
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// A store failure while opening one customer's intervention is counted and
/// rolled back; the next customer in the batch is still served.
#[test]
fn failed_intervention_does_not_stop_the_batch() {
    let mut f = FileEngine::new();
    let broken = insert_customer(&f.engine, &at_risk_customer("broken@ortiz.io", 0.94));
    let healthy = insert_customer(&f.engine, &at_risk_customer("healthy@ortiz.io", 0.94));
    f.fail_when(&format!(
        "CREATE TRIGGER reject_intervention BEFORE INSERT ON churn_interventions
         WHEN NEW.customer_id = {}
         BEGIN SELECT RAISE(ABORT, 'intervention rejected'); END;",
        broken.id
    ));

    let report = f.engine.run_cycle();

    assert_eq!(report.candidates, 2);
    assert_eq!(report.errors, 1);
    assert_eq!(report.interventions_created, 1);
    assert!(f.engine.store().interventions_for_customer(broken.id).unwrap().is_empty());
    let served = f.engine.store().interventions_for_customer(healthy.id).unwrap();
    assert_eq!(served.len(), 1);
    assert_eq!(served[0].status, InterventionStatus::Successful);
}

/// A follow-up that cannot be saved is counted; the other customer's
/// follow-up and learning go through in the same cycle.
#[test]
fn failed_follow_up_does_not_stop_the_batch() {
    let mut f = FileEngine::new();
    let broken = insert_customer(&f.engine, &at_risk_customer("broken@ortiz.io", 0.94));
    let healthy = insert_customer(&f.engine, &at_risk_customer("healthy@ortiz.io", 0.94));
    assert_eq!(f.engine.run_cycle().interventions_created, 2);
    f.fail_when(&format!(
        "CREATE TRIGGER reject_outcome BEFORE UPDATE OF actual_outcome ON churn_interventions
         WHEN NEW.customer_id = {}
         BEGIN SELECT RAISE(ABORT, 'outcome rejected'); END;",
        broken.id
    ));
    f.engine.clock.advance(Duration::hours(30));

    let report = f.engine.run_cycle();

    assert_eq!(report.follow_ups, 1);
    assert_eq!(report.patterns_updated, 1);
    assert_eq!(report.errors, 1);
    let first = |id| f.engine.store().interventions_for_customer(id).unwrap().remove(0);
    assert_eq!(first(broken.id).actual_outcome, None);
    assert_eq!(first(healthy.id).actual_outcome, Some(ActualOutcome::Stable));
}
