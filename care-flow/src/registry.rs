use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

use crate::{
    entropy::Entropy,
    error::{FlowError, Result},
    notify::Notifier,
    session::{FlowConfig, WorkflowSession},
    workflow::Workflow,
};

/// In-memory holder of the live sessions of one workflow.
///
/// Sessions are independent; removing one cancels its pending work.
pub struct SessionRegistry<W: Workflow> {
    workflow: Arc<W>,
    notifier: Notifier,
    config: FlowConfig,
    seed: Option<u64>,
    opened: AtomicU64,
    sessions: Arc<DashMap<String, Arc<WorkflowSession<W>>>>,
}

impl<W: Workflow> SessionRegistry<W> {
    pub fn new(workflow: W, notifier: Notifier, config: FlowConfig) -> Self {
        Self {
            workflow: Arc::new(workflow),
            notifier,
            config,
            seed: None,
            opened: AtomicU64::new(0),
            sessions: Arc::new(DashMap::new()),
        }
    }

    /// Seed every session deterministically: the n-th session opened gets `seed + n`.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn open(&self) -> Arc<WorkflowSession<W>> {
        let n = self.opened.fetch_add(1, Ordering::SeqCst);
        let entropy = match self.seed {
            Some(seed) => Entropy::seeded(seed.wrapping_add(n)),
            None => Entropy::from_os(),
        };
        let session = Arc::new(WorkflowSession::new(
            self.workflow.clone(),
            self.notifier.clone(),
            entropy,
            self.config.clone(),
        ));
        self.sessions
            .insert(session.id().to_string(), session.clone());
        info!(
            session_id = %session.id(),
            workflow = self.workflow.name(),
            "session opened"
        );
        session
    }

    pub fn get(&self, id: &str) -> Result<Arc<WorkflowSession<W>>> {
        self.sessions
            .get(id)
            .map(|entry| entry.clone())
            .ok_or_else(|| FlowError::SessionNotFound(id.to_string()))
    }

    /// Remove a session and stop its evaluation and timers.
    pub fn discard(&self, id: &str) -> Result<()> {
        let (_, session) = self
            .sessions
            .remove(id)
            .ok_or_else(|| FlowError::SessionNotFound(id.to_string()))?;
        session.discard();
        info!(session_id = %id, workflow = self.workflow.name(), "session discarded");
        Ok(())
    }

    /// Replace a session with a fresh one.
    pub fn restart(&self, id: &str) -> Result<Arc<WorkflowSession<W>>> {
        self.discard(id)?;
        Ok(self.open())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
