pub mod dispatch;
pub mod triage;
pub mod verification;

pub use dispatch::{DispatchField, DispatchFields, DispatchResult, DispatchWorkflow, EmergencyTier, Location};
pub use triage::{TriageField, TriageFields, TriageResult, TriageTier, TriageWorkflow};
pub use verification::{
    DocumentSlot, VerificationField, VerificationFields, VerificationResult, VerificationStatus,
    VerificationWorkflow,
};
