use async_trait::async_trait;
use serde::Serialize;
use std::fmt::Debug;
use std::time::Duration;

use crate::{
    entropy::Entropy,
    error::Result,
    fields::FieldStore,
    notify::{Notice, Severity},
    session::RequestId,
};

/// What a countdown tick decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Keep ticking.
    Continue,
    /// The outcome is settled; stop the timer for good.
    Done,
}

/// Definition of one guided workflow: its input, its outcome evaluator, and
/// the messages and timers attached to its stage transitions.
#[async_trait]
pub trait Workflow: Send + Sync + 'static {
    type Fields: FieldStore;
    type Outcome: Clone + Debug + Serialize + Send + Sync + 'static;

    /// Unique name, used in logs and routes.
    fn name(&self) -> &'static str;

    /// Prefix of the request ids handed out by [`crate::WorkflowSession::submit`].
    fn request_prefix(&self) -> &'static str;

    /// Map frozen, complete input to a terminal outcome.
    ///
    /// Runs after the processing delay. An error sends the session back to
    /// collecting.
    async fn evaluate(&self, fields: &Self::Fields, entropy: &mut Entropy)
    -> Result<Self::Outcome>;

    fn validation_notice(&self, missing: &[<Self::Fields as FieldStore>::Section]) -> Notice {
        let sections = missing
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        Notice::new(
            "flow.missing_title",
            "flow.missing_description",
            Severity::Destructive,
        )
        .with_arg("sections", sections)
    }

    fn submitted_notice(&self, _request_id: &RequestId) -> Option<Notice> {
        None
    }

    fn resolved_notice(&self, _outcome: &Self::Outcome) -> Option<Notice> {
        None
    }

    fn failed_notice(&self, _reason: &str) -> Notice {
        Notice::new(
            "flow.failed_title",
            "flow.failed_description",
            Severity::Destructive,
        )
    }

    /// Period of the countdown started once resolved, if the outcome has one.
    fn countdown(&self) -> Option<Duration> {
        None
    }

    /// Whether the outcome needs no further ticks.
    fn is_settled(&self, _outcome: &Self::Outcome) -> bool {
        true
    }

    /// Advance the outcome by one countdown period.
    fn tick(&self, _outcome: &mut Self::Outcome) -> Tick {
        Tick::Done
    }
}
