use async_trait::async_trait;
use care_flow::{
    Entropy, FieldStore, FlowError, Notice, RequestId, Result, Severity, Tick, Workflow, is_filled,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::time::Duration;
use tracing::info;

use crate::geolocation::Coordinates;

/// Largest offset, in degrees per axis, between requester and simulated responder.
pub const DEFAULT_JITTER_DEGREES: f64 = 0.005;
pub const DEFAULT_ETA_MINUTES: RangeInclusive<u32> = 5..=20;
pub const DEFAULT_ETA_TICK: Duration = Duration::from_secs(60);

/// ETA at or below which the unit is reported as arriving shortly.
const ARRIVING_SHORTLY_MINUTES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyTier {
    Critical,
    Urgent,
    Moderate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    pub address: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchFields {
    pub location: Option<Location>,
    pub emergency_tier: Option<EmergencyTier>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum DispatchField {
    Location(Option<Location>),
    EmergencyTier(Option<EmergencyTier>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchSection {
    Location,
    EmergencyTier,
}

impl fmt::Display for DispatchSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DispatchSection::Location => "location",
            DispatchSection::EmergencyTier => "emergency_tier",
        };
        f.write_str(name)
    }
}

impl FieldStore for DispatchFields {
    type Field = DispatchField;
    type Section = DispatchSection;

    fn set(&mut self, field: DispatchField) {
        match field {
            DispatchField::Location(location) => self.location = location,
            DispatchField::EmergencyTier(tier) => self.emergency_tier = tier,
        }
    }

    fn sections() -> &'static [DispatchSection] {
        &[DispatchSection::Location, DispatchSection::EmergencyTier]
    }

    fn is_section_complete(&self, section: DispatchSection) -> bool {
        match section {
            DispatchSection::Location => self
                .location
                .as_ref()
                .is_some_and(|location| is_filled(&location.address)),
            DispatchSection::EmergencyTier => self.emergency_tier.is_some(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Responder {
    pub id: String,
    pub name: String,
    pub vehicle: String,
}

impl Default for Responder {
    fn default() -> Self {
        Self {
            id: "AMB001".to_string(),
            name: "Dr. Sarah Johnson".to_string(),
            vehicle: "EMT-2024-001".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrivalStatus {
    EnRoute,
    ArrivingShortly,
    Arrived,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(into = "DispatchReport")]
pub struct DispatchResult {
    pub responder: Responder,
    pub emergency_tier: EmergencyTier,
    /// Whole minutes; only ever decreases once assigned.
    pub eta_minutes: u32,
    pub responder_position: Coordinates,
}

impl DispatchResult {
    pub fn arrival(&self) -> ArrivalStatus {
        match self.eta_minutes {
            0 => ArrivalStatus::Arrived,
            eta if eta <= ARRIVING_SHORTLY_MINUTES => ArrivalStatus::ArrivingShortly,
            _ => ArrivalStatus::EnRoute,
        }
    }
}

/// Wire shape of a [`DispatchResult`], with the derived arrival status.
#[derive(Debug, Serialize)]
struct DispatchReport {
    responder: Responder,
    emergency_tier: EmergencyTier,
    eta_minutes: u32,
    responder_position: Coordinates,
    arrival: ArrivalStatus,
}

impl From<DispatchResult> for DispatchReport {
    fn from(result: DispatchResult) -> Self {
        let arrival = result.arrival();
        Self {
            responder: result.responder,
            emergency_tier: result.emergency_tier,
            eta_minutes: result.eta_minutes,
            responder_position: result.responder_position,
            arrival,
        }
    }
}

/// Ambulance request with a live ETA countdown.
#[derive(Debug, Clone)]
pub struct DispatchWorkflow {
    pub responder: Responder,
    pub eta_minutes: RangeInclusive<u32>,
    pub eta_tick: Duration,
    pub jitter_degrees: f64,
}

impl Default for DispatchWorkflow {
    fn default() -> Self {
        Self {
            responder: Responder::default(),
            eta_minutes: DEFAULT_ETA_MINUTES,
            eta_tick: DEFAULT_ETA_TICK,
            jitter_degrees: DEFAULT_JITTER_DEGREES,
        }
    }
}

impl DispatchWorkflow {
    /// Synthesize the responder assignment for a requester. Computed once per request.
    pub fn assign(
        &self,
        location: &Location,
        tier: EmergencyTier,
        entropy: &mut Entropy,
    ) -> DispatchResult {
        let eta = entropy
            .between(self.eta_minutes.clone())
            .clamp(*self.eta_minutes.start(), *self.eta_minutes.end());
        let responder_position = Coordinates {
            lat: location.lat + entropy.jitter(self.jitter_degrees),
            lng: location.lng + entropy.jitter(self.jitter_degrees),
        };
        DispatchResult {
            responder: self.responder.clone(),
            emergency_tier: tier,
            eta_minutes: eta,
            responder_position,
        }
    }
}

#[async_trait]
impl Workflow for DispatchWorkflow {
    type Fields = DispatchFields;
    type Outcome = DispatchResult;

    fn name(&self) -> &'static str {
        "dispatch"
    }

    fn request_prefix(&self) -> &'static str {
        "AMB"
    }

    async fn evaluate(&self, fields: &DispatchFields, entropy: &mut Entropy) -> Result<DispatchResult> {
        let location = fields
            .location
            .as_ref()
            .ok_or_else(|| FlowError::Evaluation("requester location missing".to_string()))?;
        let tier = fields
            .emergency_tier
            .ok_or_else(|| FlowError::Evaluation("emergency tier missing".to_string()))?;

        let result = self.assign(location, tier, entropy);
        info!(
            vehicle = %result.responder.vehicle,
            eta_minutes = result.eta_minutes,
            tier = ?tier,
            "responder assigned"
        );
        Ok(result)
    }

    fn submitted_notice(&self, request_id: &RequestId) -> Option<Notice> {
        Some(
            Notice::new(
                "ambulance.request_received_title",
                "ambulance.request_received_description",
                Severity::Info,
            )
            .with_arg("request_id", request_id.to_string()),
        )
    }

    fn resolved_notice(&self, outcome: &DispatchResult) -> Option<Notice> {
        Some(
            Notice::new(
                "ambulance.dispatched_title",
                "ambulance.dispatched_description",
                Severity::Success,
            )
            .with_arg("vehicle", outcome.responder.vehicle.clone()),
        )
    }

    fn countdown(&self) -> Option<Duration> {
        Some(self.eta_tick)
    }

    fn is_settled(&self, outcome: &DispatchResult) -> bool {
        outcome.eta_minutes == 0
    }

    fn tick(&self, outcome: &mut DispatchResult) -> Tick {
        outcome.eta_minutes = outcome.eta_minutes.saturating_sub(1);
        if outcome.eta_minutes == 0 {
            Tick::Done
        } else {
            Tick::Continue
        }
    }
}
