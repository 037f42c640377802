use care_flow::AcquisitionFailure;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Reference to an uploaded artifact. The bytes live with the document store.
///
/// Deserializing rejects blank references.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ArtifactRef(String);

impl ArtifactRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ArtifactRef {
    type Error = AcquisitionFailure;

    fn try_from(reference: String) -> Result<Self, Self::Error> {
        if reference.trim().is_empty() {
            return Err(AcquisitionFailure::Upload(
                "empty artifact reference".to_string(),
            ));
        }
        Ok(Self(reference))
    }
}

impl From<ArtifactRef> for String {
    fn from(artifact: ArtifactRef) -> Self {
        artifact.0
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Accepts one uploaded artifact per named slot of a session.
pub trait DocumentStore: Send + Sync {
    fn accept(
        &self,
        session_id: &str,
        slot: &str,
        artifact: &ArtifactRef,
    ) -> Result<(), AcquisitionFailure>;

    /// Forget every artifact held for a session. Returns how many were dropped.
    fn release(&self, session_id: &str) -> usize;
}

/// Keeps the latest artifact reference per (session, slot).
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: DashMap<(String, String), ArtifactRef>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, session_id: &str, slot: &str) -> Option<ArtifactRef> {
        self.documents
            .get(&(session_id.to_string(), slot.to_string()))
            .map(|entry| entry.clone())
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn accept(
        &self,
        session_id: &str,
        slot: &str,
        artifact: &ArtifactRef,
    ) -> Result<(), AcquisitionFailure> {
        if artifact.as_str().trim().is_empty() {
            return Err(AcquisitionFailure::Upload(
                "empty artifact reference".to_string(),
            ));
        }
        self.documents
            .insert((session_id.to_string(), slot.to_string()), artifact.clone());
        debug!(session_id, slot, artifact = %artifact, "document accepted");
        Ok(())
    }

    fn release(&self, session_id: &str) -> usize {
        let before = self.documents.len();
        self.documents.retain(|(owner, _), _| owner != session_id);
        let released = before.saturating_sub(self.documents.len());
        if released > 0 {
            debug!(session_id, released, "documents released");
        }
        released
    }
}
