use async_trait::async_trait;
use care_flow::{
    Entropy, FieldStore, FlowError, Notice, Result, Severity, Stage, Workflow, WorkflowSession,
    is_filled,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use crate::documents::{ArtifactRef, DocumentStore};

/// Reference list offered by the registration form. Free text is still accepted.
pub const SPECIALIZATIONS: [&str; 13] = [
    "General Medicine",
    "Cardiology",
    "Dermatology",
    "Emergency Medicine",
    "Endocrinology",
    "Gastroenterology",
    "Neurology",
    "Oncology",
    "Pediatrics",
    "Psychiatry",
    "Radiology",
    "Surgery",
    "Other",
];

pub const EXPERIENCE_BRACKETS: [&str; 6] = ["0-2", "3-5", "6-10", "11-15", "16-20", "20+"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonalInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
}

impl PersonalInfo {
    fn is_complete(&self) -> bool {
        [&self.first_name, &self.last_name, &self.email, &self.phone]
            .into_iter()
            .all(|value| is_filled(value))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfessionalInfo {
    pub license_number: String,
    pub specialization: String,
    pub affiliation: String,
    pub experience: String,
}

impl ProfessionalInfo {
    fn is_complete(&self) -> bool {
        [
            &self.license_number,
            &self.specialization,
            &self.affiliation,
            &self.experience,
        ]
        .into_iter()
        .all(|value| is_filled(value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSlot {
    License,
    GovernmentId,
    AffiliationLetter,
}

impl DocumentSlot {
    pub const ALL: [DocumentSlot; 3] = [
        DocumentSlot::License,
        DocumentSlot::GovernmentId,
        DocumentSlot::AffiliationLetter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentSlot::License => "license",
            DocumentSlot::GovernmentId => "government_id",
            DocumentSlot::AffiliationLetter => "affiliation_letter",
        }
    }

    fn uploaded_description(&self) -> &'static str {
        match self {
            DocumentSlot::License => "doctor.license_uploaded_description",
            DocumentSlot::GovernmentId => "doctor.government_id_uploaded_description",
            DocumentSlot::AffiliationLetter => "doctor.affiliation_letter_uploaded_description",
        }
    }
}

impl fmt::Display for DocumentSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Documents {
    pub license: Option<ArtifactRef>,
    pub government_id: Option<ArtifactRef>,
    pub affiliation_letter: Option<ArtifactRef>,
}

impl Documents {
    pub fn slot(&self, slot: DocumentSlot) -> Option<&ArtifactRef> {
        match slot {
            DocumentSlot::License => self.license.as_ref(),
            DocumentSlot::GovernmentId => self.government_id.as_ref(),
            DocumentSlot::AffiliationLetter => self.affiliation_letter.as_ref(),
        }
    }

    fn slot_mut(&mut self, slot: DocumentSlot) -> &mut Option<ArtifactRef> {
        match slot {
            DocumentSlot::License => &mut self.license,
            DocumentSlot::GovernmentId => &mut self.government_id,
            DocumentSlot::AffiliationLetter => &mut self.affiliation_letter,
        }
    }

    fn is_complete(&self) -> bool {
        DocumentSlot::ALL
            .iter()
            .all(|slot| self.slot(*slot).is_some())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VerificationFields {
    pub personal: PersonalInfo,
    pub professional: ProfessionalInfo,
    pub documents: Documents,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum VerificationField {
    FirstName(String),
    LastName(String),
    Email(String),
    Phone(String),
    LicenseNumber(String),
    Specialization(String),
    Affiliation(String),
    Experience(String),
    /// Set only through [`upload_document`].
    #[serde(skip_deserializing)]
    Document {
        slot: DocumentSlot,
        artifact: Option<ArtifactRef>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationSection {
    Personal,
    Professional,
    Documents,
}

impl fmt::Display for VerificationSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VerificationSection::Personal => "personal",
            VerificationSection::Professional => "professional",
            VerificationSection::Documents => "documents",
        };
        f.write_str(name)
    }
}

impl FieldStore for VerificationFields {
    type Field = VerificationField;
    type Section = VerificationSection;

    fn set(&mut self, field: VerificationField) {
        match field {
            VerificationField::FirstName(value) => self.personal.first_name = value,
            VerificationField::LastName(value) => self.personal.last_name = value,
            VerificationField::Email(value) => self.personal.email = value,
            VerificationField::Phone(value) => self.personal.phone = value,
            VerificationField::LicenseNumber(value) => self.professional.license_number = value,
            VerificationField::Specialization(value) => self.professional.specialization = value,
            VerificationField::Affiliation(value) => self.professional.affiliation = value,
            VerificationField::Experience(value) => self.professional.experience = value,
            VerificationField::Document { slot, artifact } => {
                *self.documents.slot_mut(slot) = artifact
            }
        }
    }

    fn sections() -> &'static [VerificationSection] {
        &[
            VerificationSection::Personal,
            VerificationSection::Professional,
            VerificationSection::Documents,
        ]
    }

    fn is_section_complete(&self, section: VerificationSection) -> bool {
        match section {
            VerificationSection::Personal => self.personal.is_complete(),
            VerificationSection::Professional => self.professional.is_complete(),
            VerificationSection::Documents => self.documents.is_complete(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Approved,
    Rejected,
}

impl VerificationStatus {
    /// Catalog key of the headline shown for this status.
    pub fn headline_key(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "doctor.verification_pending",
            VerificationStatus::Approved => "doctor.verification_approved",
            VerificationStatus::Rejected => "doctor.verification_rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationResult {
    pub status: VerificationStatus,
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// Doctor credential registration. Submission parks the request for human review.
#[derive(Debug, Default, Clone, Copy)]
pub struct VerificationWorkflow;

#[async_trait]
impl Workflow for VerificationWorkflow {
    type Fields = VerificationFields;
    type Outcome = VerificationResult;

    fn name(&self) -> &'static str {
        "verification"
    }

    fn request_prefix(&self) -> &'static str {
        "REG"
    }

    async fn evaluate(
        &self,
        fields: &VerificationFields,
        _entropy: &mut Entropy,
    ) -> Result<VerificationResult> {
        info!(
            specialization = %fields.professional.specialization,
            "registration queued for review"
        );
        Ok(VerificationResult {
            status: VerificationStatus::Pending,
            reviewed_at: None,
        })
    }

    fn resolved_notice(&self, _outcome: &VerificationResult) -> Option<Notice> {
        Some(Notice::new(
            "doctor.submitted_title",
            "doctor.submitted_description",
            Severity::Success,
        ))
    }
}

/// Store a credential document and attach it to its slot.
pub fn upload_document(
    session: &WorkflowSession<VerificationWorkflow>,
    store: &dyn DocumentStore,
    slot: DocumentSlot,
    artifact: ArtifactRef,
) -> Result<()> {
    let stage = session.stage();
    if stage != Stage::Collecting {
        return Err(FlowError::InvalidTransition {
            stage,
            action: "upload a document",
        });
    }
    store.accept(session.id(), slot.as_str(), &artifact)?;
    session.set_field(VerificationField::Document {
        slot,
        artifact: Some(artifact),
    })?;
    session.notify(Notice::new(
        "doctor.document_uploaded_title",
        slot.uploaded_description(),
        Severity::Success,
    ));
    Ok(())
}

/// Apply an external reviewer's decision to a submitted registration.
pub fn record_review(
    session: &WorkflowSession<VerificationWorkflow>,
    status: VerificationStatus,
) -> Result<VerificationResult> {
    let result = session.update_outcome(|outcome| {
        outcome.status = status;
        outcome.reviewed_at = match status {
            VerificationStatus::Pending => None,
            _ => Some(Utc::now()),
        };
        outcome.clone()
    })?;
    info!(session_id = %session.id(), status = ?status, "review recorded");
    session.notify(Notice::new(
        status.headline_key(),
        "doctor.review_recorded_description",
        Severity::Info,
    ));
    Ok(result)
}
