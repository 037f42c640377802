use async_trait::async_trait;
use care_flow::{
    Entropy, FieldStore, FlowError, Notice, RequestId, Result, Severity, Stage, Workflow,
    WorkflowSession, is_filled,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use crate::documents::{ArtifactRef, DocumentStore};

/// Symptom text containing any of these is an emergency.
pub const EMERGENCY_KEYWORDS: [&str; 3] = ["chest pain", "difficulty breathing", "severe pain"];

/// Symptom text containing any of these is at least moderate.
pub const MODERATE_KEYWORDS: [&str; 1] = ["moderate"];

const CONFIDENCE_FLOOR: f64 = 80.0;
const CONFIDENCE_SPAN: f64 = 20.0;

/// Self-reported pain level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityRating {
    /// 1-3 out of 10
    Low,
    /// 4-6 out of 10
    Moderate,
    /// 7-8 out of 10
    High,
    /// 9-10 out of 10
    Extreme,
}

/// How long the symptoms have lasted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationBucket {
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TriageFields {
    pub symptoms: String,
    pub severity: Option<SeverityRating>,
    pub duration: Option<DurationBucket>,
    pub photo: Option<ArtifactRef>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum TriageField {
    Symptoms(String),
    Severity(Option<SeverityRating>),
    Duration(Option<DurationBucket>),
    /// Set only through [`attach_photo`].
    #[serde(skip_deserializing)]
    Photo(Option<ArtifactRef>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriageSection {
    Symptoms,
    Severity,
    Duration,
}

impl fmt::Display for TriageSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TriageSection::Symptoms => "symptoms",
            TriageSection::Severity => "severity",
            TriageSection::Duration => "duration",
        };
        f.write_str(name)
    }
}

impl FieldStore for TriageFields {
    type Field = TriageField;
    type Section = TriageSection;

    fn set(&mut self, field: TriageField) {
        match field {
            TriageField::Symptoms(text) => self.symptoms = text,
            TriageField::Severity(rating) => self.severity = rating,
            TriageField::Duration(bucket) => self.duration = bucket,
            TriageField::Photo(photo) => self.photo = photo,
        }
    }

    fn sections() -> &'static [TriageSection] {
        &[
            TriageSection::Symptoms,
            TriageSection::Severity,
            TriageSection::Duration,
        ]
    }

    fn is_section_complete(&self, section: TriageSection) -> bool {
        match section {
            TriageSection::Symptoms => is_filled(&self.symptoms),
            TriageSection::Severity => self.severity.is_some(),
            TriageSection::Duration => self.duration.is_some(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriageTier {
    Mild,
    Moderate,
    Severe,
    Emergency,
}

impl TriageTier {
    pub fn label(&self) -> &'static str {
        match self {
            TriageTier::Mild => "MILD",
            TriageTier::Moderate => "MODERATE",
            TriageTier::Severe => "SEVERE",
            TriageTier::Emergency => "EMERGENCY",
        }
    }
}

/// The call to action shown with the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryAction {
    CallEmergencyServices,
    BookAppointment,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriageResult {
    pub tier: TriageTier,
    pub recommendation: String,
    pub next_steps: Vec<String>,
    /// Percentage in `[80, 100]`, one decimal place. Not a verifiable signal.
    pub confidence: f64,
    pub primary_action: PrimaryAction,
}

struct Guidance {
    recommendation: &'static str,
    next_steps: [&'static str; 3],
}

const EMERGENCY_GUIDANCE: Guidance = Guidance {
    recommendation: "Seek immediate emergency care",
    next_steps: [
        "Call emergency services immediately",
        "Go to nearest emergency room",
        "Inform emergency contacts",
    ],
};

const MODERATE_GUIDANCE: Guidance = Guidance {
    recommendation: "Schedule appointment with healthcare provider within 24-48 hours",
    next_steps: [
        "Book appointment with doctor",
        "Monitor symptoms closely",
        "Take prescribed medications if any",
    ],
};

const MILD_GUIDANCE: Guidance = Guidance {
    recommendation: "Monitor symptoms and consider telehealth consultation",
    next_steps: [
        "Rest and monitor symptoms",
        "Stay hydrated",
        "Consider over-the-counter remedies",
    ],
};

fn guidance(tier: TriageTier) -> &'static Guidance {
    match tier {
        TriageTier::Emergency | TriageTier::Severe => &EMERGENCY_GUIDANCE,
        TriageTier::Moderate => &MODERATE_GUIDANCE,
        TriageTier::Mild => &MILD_GUIDANCE,
    }
}

/// Keyword classifier. Case-insensitive substring match on the symptom text.
pub fn classify(fields: &TriageFields) -> TriageTier {
    let symptoms = fields.symptoms.to_lowercase();
    if EMERGENCY_KEYWORDS.iter().any(|k| symptoms.contains(k)) {
        TriageTier::Emergency
    } else if MODERATE_KEYWORDS.iter().any(|k| symptoms.contains(k))
        || fields.severity == Some(SeverityRating::High)
    {
        TriageTier::Moderate
    } else {
        TriageTier::Mild
    }
}

pub fn assess(fields: &TriageFields, entropy: &mut Entropy) -> TriageResult {
    let tier = classify(fields);
    let guidance = guidance(tier);
    let raw = CONFIDENCE_FLOOR + entropy.fraction() * CONFIDENCE_SPAN;
    let confidence = ((raw * 10.0).round() / 10.0).clamp(CONFIDENCE_FLOOR, 100.0);

    TriageResult {
        tier,
        recommendation: guidance.recommendation.to_string(),
        next_steps: guidance.next_steps.iter().map(|s| s.to_string()).collect(),
        confidence,
        primary_action: match tier {
            TriageTier::Emergency => PrimaryAction::CallEmergencyServices,
            _ => PrimaryAction::BookAppointment,
        },
    }
}

/// Symptom self-assessment.
#[derive(Debug, Default, Clone, Copy)]
pub struct TriageWorkflow;

#[async_trait]
impl Workflow for TriageWorkflow {
    type Fields = TriageFields;
    type Outcome = TriageResult;

    fn name(&self) -> &'static str {
        "triage"
    }

    fn request_prefix(&self) -> &'static str {
        "TRI"
    }

    async fn evaluate(&self, fields: &TriageFields, entropy: &mut Entropy) -> Result<TriageResult> {
        let result = assess(fields, entropy);
        info!(tier = ?result.tier, confidence = result.confidence, "triage assessed");
        Ok(result)
    }

    fn submitted_notice(&self, _request_id: &RequestId) -> Option<Notice> {
        Some(Notice::new(
            "patient.analyzing_title",
            "patient.analyzing_description",
            Severity::Info,
        ))
    }

    fn resolved_notice(&self, outcome: &TriageResult) -> Option<Notice> {
        let severity = match outcome.tier {
            TriageTier::Emergency | TriageTier::Severe => Severity::Destructive,
            _ => Severity::Success,
        };
        Some(
            Notice::new(
                "patient.triage_complete_title",
                "patient.triage_complete_description",
                severity,
            )
            .with_arg("tier", outcome.tier.label()),
        )
    }
}

/// Store a symptom photo and attach it to the assessment.
pub fn attach_photo(
    session: &WorkflowSession<TriageWorkflow>,
    store: &dyn DocumentStore,
    artifact: ArtifactRef,
) -> Result<()> {
    let stage = session.stage();
    if stage != Stage::Collecting {
        return Err(FlowError::InvalidTransition {
            stage,
            action: "attach a photo",
        });
    }
    store.accept(session.id(), "photo", &artifact)?;
    session.set_field(TriageField::Photo(Some(artifact)))?;
    session.notify(Notice::new(
        "patient.photo_uploaded_title",
        "patient.photo_uploaded_description",
        Severity::Success,
    ));
    Ok(())
}
