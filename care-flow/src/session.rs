use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    entropy::Entropy,
    error::{FlowError, Result},
    fields::FieldStore,
    notify::{Notice, Notifier},
    timer::{ScopedTask, start_countdown},
    workflow::{Tick, Workflow},
};

/// Position of a session's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Collecting,
    Processing,
    Resolved,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Collecting => "collecting",
            Stage::Processing => "processing",
            Stage::Resolved => "resolved",
        };
        f.write_str(name)
    }
}

/// Opaque token assigned on the first submission and kept for the session's life.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn generate(prefix: &str) -> Self {
        let token = Uuid::new_v4().simple().to_string().to_uppercase();
        Self(format!("{prefix}-{}", &token[..12]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Engine settings shared by every session of a workflow.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// Simulated latency of the outcome evaluation.
    pub processing_delay: Duration,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            processing_delay: Duration::from_millis(2_000),
        }
    }
}

#[derive(Debug, Clone)]
enum Phase<O> {
    Collecting,
    Processing,
    Resolved(O),
}

/// The state of one session. The outcome lives inside the resolved phase, so
/// it exists exactly when the stage is [`Stage::Resolved`].
#[derive(Debug, Clone)]
pub struct WorkflowState<F, O> {
    phase: Phase<O>,
    fields: F,
    request_id: Option<RequestId>,
    last_error: Option<String>,
    submitted_at: Option<DateTime<Utc>>,
    resolved_at: Option<DateTime<Utc>>,
}

impl<F: Default, O> WorkflowState<F, O> {
    fn new() -> Self {
        Self {
            phase: Phase::Collecting,
            fields: F::default(),
            request_id: None,
            last_error: None,
            submitted_at: None,
            resolved_at: None,
        }
    }
}

impl<F, O> WorkflowState<F, O> {
    pub fn stage(&self) -> Stage {
        match self.phase {
            Phase::Collecting => Stage::Collecting,
            Phase::Processing => Stage::Processing,
            Phase::Resolved(_) => Stage::Resolved,
        }
    }

    pub fn fields(&self) -> &F {
        &self.fields
    }

    pub fn result(&self) -> Option<&O> {
        match &self.phase {
            Phase::Resolved(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

/// Read-only view of a session, as handed to the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowSnapshot<F, O> {
    pub session_id: String,
    pub workflow: &'static str,
    pub stage: Stage,
    pub request_id: Option<RequestId>,
    pub fields: F,
    pub result: Option<O>,
    pub completeness: u8,
    pub missing_sections: Vec<String>,
    pub last_error: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Tasks {
    discarded: bool,
    evaluation: Option<ScopedTask>,
    countdown: Option<ScopedTask>,
}

struct Shared<W: Workflow> {
    id: String,
    workflow: Arc<W>,
    state: Mutex<WorkflowState<W::Fields, W::Outcome>>,
    entropy: tokio::sync::Mutex<Entropy>,
    stage_tx: watch::Sender<Stage>,
    tasks: Mutex<Tasks>,
    notifier: Notifier,
    config: FlowConfig,
}

/// One user's pass through a workflow.
///
/// All mutation goes through the transition methods. Dropping the session, or
/// calling [`WorkflowSession::discard`], cancels the in-flight evaluation and
/// any running countdown.
pub struct WorkflowSession<W: Workflow> {
    shared: Arc<Shared<W>>,
}

impl<W: Workflow> WorkflowSession<W> {
    pub fn new(workflow: Arc<W>, notifier: Notifier, entropy: Entropy, config: FlowConfig) -> Self {
        let (stage_tx, _) = watch::channel(Stage::Collecting);
        let shared = Shared {
            id: Uuid::new_v4().to_string(),
            workflow,
            state: Mutex::new(WorkflowState::new()),
            entropy: tokio::sync::Mutex::new(entropy),
            stage_tx,
            tasks: Mutex::new(Tasks::default()),
            notifier,
            config,
        };
        debug!(session_id = %shared.id, workflow = shared.workflow.name(), "session opened");
        Self {
            shared: Arc::new(shared),
        }
    }

    pub fn id(&self) -> &str {
        &self.shared.id
    }

    pub fn stage(&self) -> Stage {
        self.shared.lock_state().stage()
    }

    pub fn request_id(&self) -> Option<RequestId> {
        self.shared.lock_state().request_id.clone()
    }

    pub fn fields(&self) -> W::Fields {
        self.shared.lock_state().fields.clone()
    }

    pub fn outcome(&self) -> Option<W::Outcome> {
        self.shared.lock_state().result().cloned()
    }

    pub fn state(&self) -> WorkflowState<W::Fields, W::Outcome> {
        self.shared.lock_state().clone()
    }

    pub fn snapshot(&self) -> WorkflowSnapshot<W::Fields, W::Outcome> {
        let state = self.shared.lock_state();
        WorkflowSnapshot {
            session_id: self.shared.id.clone(),
            workflow: self.shared.workflow.name(),
            stage: state.stage(),
            request_id: state.request_id.clone(),
            fields: state.fields.clone(),
            result: state.result().cloned(),
            completeness: state.fields.completeness_percent(),
            missing_sections: state
                .fields
                .missing_sections()
                .iter()
                .map(ToString::to_string)
                .collect(),
            last_error: state.last_error.clone(),
            submitted_at: state.submitted_at,
            resolved_at: state.resolved_at,
        }
    }

    /// Overwrite one field. Only legal while collecting; submitted input is frozen.
    pub fn set_field(&self, field: <W::Fields as FieldStore>::Field) -> Result<()> {
        self.shared.ensure_live()?;
        let mut state = self.shared.lock_state();
        match state.phase {
            Phase::Collecting => {
                state.fields.set(field);
                Ok(())
            }
            _ => Err(FlowError::InvalidTransition {
                stage: state.stage(),
                action: "edit fields",
            }),
        }
    }

    /// Move from collecting to processing and start the evaluation.
    ///
    /// Returns as soon as the evaluation is scheduled. Fails without changing
    /// the stage when a required section is incomplete or another evaluation
    /// is already in flight.
    pub fn submit(&self) -> Result<RequestId> {
        let shared = &self.shared;
        shared.ensure_live()?;

        let (request_id, fields) = {
            let mut state = shared.lock_state();
            if !matches!(state.phase, Phase::Collecting) {
                return Err(FlowError::InvalidTransition {
                    stage: state.stage(),
                    action: "submit",
                });
            }

            let missing = state.fields.missing_sections();
            if !missing.is_empty() {
                drop(state);
                let names: Vec<String> = missing.iter().map(ToString::to_string).collect();
                warn!(
                    session_id = %shared.id,
                    workflow = shared.workflow.name(),
                    missing = ?names,
                    "submission rejected"
                );
                shared.notifier.send(shared.workflow.validation_notice(&missing));
                return Err(FlowError::Validation { missing: names });
            }

            let prefix = shared.workflow.request_prefix();
            let request_id = state
                .request_id
                .get_or_insert_with(|| RequestId::generate(prefix))
                .clone();
            state.phase = Phase::Processing;
            state.submitted_at = Some(Utc::now());
            state.last_error = None;
            (request_id, state.fields.clone())
        };

        shared.stage_tx.send_replace(Stage::Processing);
        info!(
            session_id = %shared.id,
            workflow = shared.workflow.name(),
            request_id = %request_id,
            "submission accepted, evaluating"
        );
        if let Some(notice) = shared.workflow.submitted_notice(&request_id) {
            shared.notifier.send(notice);
        }

        let task = ScopedTask::spawn(run_evaluation(shared.clone(), fields));
        let mut tasks = shared.lock_tasks();
        if tasks.discarded {
            task.cancel();
        } else {
            tasks.evaluation = Some(task);
        }

        Ok(request_id)
    }

    /// Apply an external change to the resolved outcome, e.g. a reviewer decision.
    pub fn update_outcome<R>(&self, update: impl FnOnce(&mut W::Outcome) -> R) -> Result<R> {
        self.shared.ensure_live()?;
        let mut state = self.shared.lock_state();
        let stage = state.stage();
        match &mut state.phase {
            Phase::Resolved(outcome) => Ok(update(outcome)),
            _ => Err(FlowError::InvalidTransition {
                stage,
                action: "update the outcome",
            }),
        }
    }

    /// Forward a collaborator notice through this session's notifier.
    pub fn notify(&self, notice: Notice) {
        self.shared.notifier.send(notice);
    }

    pub fn subscribe(&self) -> watch::Receiver<Stage> {
        self.shared.stage_tx.subscribe()
    }

    /// Wait until no evaluation is in flight and return the stage reached.
    ///
    /// A discarded session counts as settled at whatever stage it was left in.
    pub async fn settled(&self) -> Stage {
        let mut rx = self.subscribe();
        let shared = &self.shared;
        let reached = rx
            .wait_for(|stage| *stage != Stage::Processing || shared.lock_tasks().discarded)
            .await
            .map(|stage| *stage);
        reached.unwrap_or_else(|_| self.stage())
    }

    pub fn is_countdown_running(&self) -> bool {
        self.shared
            .lock_tasks()
            .countdown
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    pub fn is_discarded(&self) -> bool {
        self.shared.lock_tasks().discarded
    }

    /// Cancel every pending callback and timer. Safe to call more than once.
    pub fn discard(&self) {
        {
            let mut tasks = self.shared.lock_tasks();
            if tasks.discarded {
                return;
            }
            tasks.discarded = true;
            tasks.evaluation.take();
            tasks.countdown.take();
        }
        // Wake `settled` waiters; the stage itself is unchanged.
        self.shared.stage_tx.send_modify(|_| {});
        debug!(session_id = %self.shared.id, "session discarded");
    }
}

impl<W: Workflow> Drop for WorkflowSession<W> {
    fn drop(&mut self) {
        self.discard();
    }
}

impl<W: Workflow> Shared<W> {
    fn lock_state(&self) -> MutexGuard<'_, WorkflowState<W::Fields, W::Outcome>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_tasks(&self) -> MutexGuard<'_, Tasks> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.lock_tasks().discarded {
            Err(FlowError::Discarded)
        } else {
            Ok(())
        }
    }

    fn resolve(self: &Arc<Self>, outcome: W::Outcome) {
        if self.ensure_live().is_err() {
            return;
        }
        let notice = self.workflow.resolved_notice(&outcome);
        let settled = self.workflow.is_settled(&outcome);
        {
            let mut state = self.lock_state();
            if !matches!(state.phase, Phase::Processing) {
                return;
            }
            state.phase = Phase::Resolved(outcome);
            state.resolved_at = Some(Utc::now());
        }

        self.stage_tx.send_replace(Stage::Resolved);
        info!(session_id = %self.id, workflow = self.workflow.name(), "resolved");
        if let Some(notice) = notice {
            self.notifier.send(notice);
        }

        if let (Some(period), false) = (self.workflow.countdown(), settled) {
            self.start_countdown(period);
        }
    }

    fn fail(&self, error: FlowError) {
        let reason = error.to_string();
        {
            let mut state = self.lock_state();
            if !matches!(state.phase, Phase::Processing) {
                return;
            }
            state.phase = Phase::Collecting;
            state.last_error = Some(reason.clone());
        }

        self.stage_tx.send_replace(Stage::Collecting);
        warn!(
            session_id = %self.id,
            workflow = self.workflow.name(),
            error = %reason,
            "evaluation failed, back to collecting"
        );
        self.notifier.send(self.workflow.failed_notice(&reason));
    }

    fn start_countdown(self: &Arc<Self>, period: Duration) {
        let weak = Arc::downgrade(self);
        let mut tasks = self.lock_tasks();
        if tasks.discarded {
            return;
        }
        tasks.countdown = Some(start_countdown(period, move || match weak.upgrade() {
            Some(shared) => shared.tick(),
            None => Tick::Done,
        }));
        debug!(session_id = %self.id, ?period, "countdown started");
    }

    fn tick(&self) -> Tick {
        let mut state = self.lock_state();
        match &mut state.phase {
            Phase::Resolved(outcome) => {
                if self.workflow.is_settled(outcome) {
                    return Tick::Done;
                }
                self.workflow.tick(outcome)
            }
            _ => Tick::Done,
        }
    }
}

async fn run_evaluation<W: Workflow>(shared: Arc<Shared<W>>, fields: W::Fields) {
    tokio::time::sleep(shared.config.processing_delay).await;

    let outcome = {
        let mut entropy = shared.entropy.lock().await;
        shared.workflow.evaluate(&fields, &mut entropy).await
    };

    match outcome {
        Ok(outcome) => shared.resolve(outcome),
        Err(error) => shared.fail(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::is_filled;
    use crate::locale::Catalog;
    use crate::notify::{RecordingSink, Severity};
    use async_trait::async_trait;
    use serde::Deserialize;

    #[derive(Debug, Clone, Default, Serialize)]
    struct NameForm {
        name: String,
    }

    #[derive(Debug, Deserialize)]
    #[serde(tag = "field", content = "value", rename_all = "snake_case")]
    enum NameField {
        Name(String),
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct NameSection;

    impl fmt::Display for NameSection {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("name")
        }
    }

    impl FieldStore for NameForm {
        type Field = NameField;
        type Section = NameSection;

        fn set(&mut self, field: NameField) {
            let NameField::Name(value) = field;
            self.name = value;
        }

        fn sections() -> &'static [NameSection] {
            &[NameSection]
        }

        fn is_section_complete(&self, _section: NameSection) -> bool {
            is_filled(&self.name)
        }
    }

    #[derive(Debug, Clone, Serialize)]
    struct Countdown {
        remaining: u32,
    }

    /// Resolves to a countdown of `name.len()` ticks; the name "fail" fails.
    struct CountdownFlow;

    #[async_trait]
    impl Workflow for CountdownFlow {
        type Fields = NameForm;
        type Outcome = Countdown;

        fn name(&self) -> &'static str {
            "countdown"
        }

        fn request_prefix(&self) -> &'static str {
            "CNT"
        }

        async fn evaluate(&self, fields: &NameForm, _entropy: &mut Entropy) -> Result<Countdown> {
            if fields.name == "fail" {
                return Err(FlowError::Evaluation("backend unavailable".to_string()));
            }
            Ok(Countdown {
                remaining: fields.name.len() as u32,
            })
        }

        fn submitted_notice(&self, _request_id: &RequestId) -> Option<Notice> {
            Some(Notice::new("test.submitted", "test.submitted", Severity::Info))
        }

        fn resolved_notice(&self, _outcome: &Countdown) -> Option<Notice> {
            Some(Notice::new("test.resolved", "test.resolved", Severity::Success))
        }

        fn countdown(&self) -> Option<Duration> {
            Some(Duration::from_secs(60))
        }

        fn is_settled(&self, outcome: &Countdown) -> bool {
            outcome.remaining == 0
        }

        fn tick(&self, outcome: &mut Countdown) -> Tick {
            outcome.remaining = outcome.remaining.saturating_sub(1);
            if outcome.remaining == 0 { Tick::Done } else { Tick::Continue }
        }
    }

    fn open() -> (WorkflowSession<CountdownFlow>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let notifier = Notifier::new(Arc::new(Catalog::default()), sink.clone());
        let session = WorkflowSession::new(
            Arc::new(CountdownFlow),
            notifier,
            Entropy::seeded(1),
            FlowConfig::default(),
        );
        (session, sink)
    }

    fn assert_result_matches_stage(session: &WorkflowSession<CountdownFlow>) {
        let state = session.state();
        assert_eq!(state.result().is_some(), state.stage() == Stage::Resolved);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_processes_then_resolves() {
        let (session, sink) = open();
        assert_eq!(session.stage(), Stage::Collecting);
        assert!(session.request_id().is_none());
        assert_result_matches_stage(&session);

        session.set_field(NameField::Name("abc".to_string())).unwrap();
        let request_id = session.submit().unwrap();
        assert!(request_id.as_str().starts_with("CNT-"));
        assert_eq!(session.stage(), Stage::Processing);
        assert_result_matches_stage(&session);

        assert_eq!(session.settled().await, Stage::Resolved);
        assert_result_matches_stage(&session);
        assert_eq!(session.outcome().unwrap().remaining, 3);
        assert_eq!(session.request_id(), Some(request_id));
        assert_eq!(sink.titles(), vec!["test.submitted", "test.resolved"]);

        let snapshot = session.snapshot();
        assert_eq!(snapshot.stage, Stage::Resolved);
        assert_eq!(snapshot.completeness, 100);
        assert!(snapshot.submitted_at.is_some());
        assert!(snapshot.resolved_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_incomplete_submit_is_rejected() {
        let (session, sink) = open();
        session.set_field(NameField::Name("  ".to_string())).unwrap();

        let err = session.submit().unwrap_err();
        match err {
            FlowError::Validation { missing } => assert_eq!(missing, vec!["name"]),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(session.stage(), Stage::Collecting);
        assert!(session.request_id().is_none());

        let delivered = sink.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].severity, Severity::Destructive);
        assert_eq!(delivered[0].title, "flow.missing_title");
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_one_evaluation_in_flight() {
        let (session, _sink) = open();
        session.set_field(NameField::Name("abc".to_string())).unwrap();
        session.submit().unwrap();

        let err = session.submit().unwrap_err();
        assert!(matches!(
            err,
            FlowError::InvalidTransition {
                stage: Stage::Processing,
                ..
            }
        ));

        session.settled().await;
        let err = session.submit().unwrap_err();
        assert!(matches!(
            err,
            FlowError::InvalidTransition {
                stage: Stage::Resolved,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fields_freeze_on_submit() {
        let (session, _sink) = open();
        session.set_field(NameField::Name("abc".to_string())).unwrap();
        session.submit().unwrap();

        let err = session
            .set_field(NameField::Name("changed".to_string()))
            .unwrap_err();
        assert!(matches!(err, FlowError::InvalidTransition { .. }));
        assert_eq!(session.fields().name, "abc");

        session.settled().await;
        assert!(session.set_field(NameField::Name("x".to_string())).is_err());
        assert_eq!(session.outcome().unwrap().remaining, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_evaluation_returns_to_collecting() {
        let (session, sink) = open();
        session.set_field(NameField::Name("fail".to_string())).unwrap();
        let first = session.submit().unwrap();

        assert_eq!(session.settled().await, Stage::Collecting);
        assert_result_matches_stage(&session);
        assert!(session.state().last_error().unwrap().contains("backend unavailable"));
        assert_eq!(sink.titles().last().unwrap(), "flow.failed_title");

        session.set_field(NameField::Name("ok".to_string())).unwrap();
        let second = session.submit().unwrap();
        assert_eq!(first, second);
        assert_eq!(session.settled().await, Stage::Resolved);
        assert!(session.state().last_error().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_runs_until_settled() {
        let (session, _sink) = open();
        session.set_field(NameField::Name("abc".to_string())).unwrap();
        session.submit().unwrap();
        session.settled().await;
        assert!(session.is_countdown_running());

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(session.outcome().unwrap().remaining, 2);

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(session.outcome().unwrap().remaining, 0);
        assert!(!session.is_countdown_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_discard_cancels_countdown() {
        let (session, _sink) = open();
        session.set_field(NameField::Name("abcdef".to_string())).unwrap();
        session.submit().unwrap();
        session.settled().await;

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(session.outcome().unwrap().remaining, 5);

        session.discard();
        session.discard();
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(session.outcome().unwrap().remaining, 5);
        assert!(!session.is_countdown_running());
        assert!(matches!(session.submit(), Err(FlowError::Discarded)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_discard_during_processing_never_resolves() {
        let (session, sink) = open();
        session.set_field(NameField::Name("abc".to_string())).unwrap();
        session.submit().unwrap();
        session.discard();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(session.stage(), Stage::Processing);
        assert!(session.outcome().is_none());
        assert_eq!(sink.titles(), vec!["test.submitted"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settled_returns_when_discarded_mid_evaluation() {
        let (session, _sink) = open();
        session.set_field(NameField::Name("abc".to_string())).unwrap();
        session.submit().unwrap();

        let waiter = session.settled();
        tokio::pin!(waiter);
        tokio::select! {
            _ = &mut waiter => panic!("settled before discard"),
            _ = tokio::time::sleep(Duration::from_millis(100)) => {}
        }

        session.discard();
        let stage = tokio::time::timeout(Duration::from_millis(10), waiter)
            .await
            .expect("settled should return after discard");
        assert_eq!(stage, Stage::Processing);

        assert_eq!(session.settled().await, Stage::Processing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_outcome_updates_require_resolution() {
        let (session, _sink) = open();
        let err = session.update_outcome(|o| o.remaining = 9).unwrap_err();
        assert!(matches!(
            err,
            FlowError::InvalidTransition {
                stage: Stage::Collecting,
                ..
            }
        ));

        session.set_field(NameField::Name("ab".to_string())).unwrap();
        session.submit().unwrap();
        session.settled().await;
        session.update_outcome(|o| o.remaining = 9).unwrap();
        assert_eq!(session.outcome().unwrap().remaining, 9);
    }

    #[test]
    fn test_request_ids_carry_prefix() {
        let id = RequestId::generate("AMB");
        assert!(id.as_str().starts_with("AMB-"));
        assert_eq!(id.as_str().len(), "AMB-".len() + 12);
        assert_ne!(id, RequestId::generate("AMB"));
    }
}
