use async_trait::async_trait;
use care_flow::{AcquisitionFailure, FlowError, Notice, Result, Severity, Stage, WorkflowSession};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::flows::dispatch::{DispatchField, DispatchWorkflow, Location};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Source of the requester's position, e.g. the browser geolocation API.
#[async_trait]
pub trait GeolocationProvider: Send + Sync {
    async fn acquire(&self) -> std::result::Result<Coordinates, AcquisitionFailure>;
}

/// A position the client already acquired and reported to us.
#[derive(Debug, Clone)]
pub struct ReportedPosition(pub std::result::Result<Coordinates, AcquisitionFailure>);

#[async_trait]
impl GeolocationProvider for ReportedPosition {
    async fn acquire(&self) -> std::result::Result<Coordinates, AcquisitionFailure> {
        self.0.clone()
    }
}

/// Placeholder reverse geocoding: the address is the rounded coordinates.
pub fn reverse_geocode(position: Coordinates) -> String {
    format!("{:.4}, {:.4} - Current Location", position.lat, position.lng)
}

/// Acquire the requester's position and store it as the dispatch location.
///
/// On failure the location is left untouched so the user can type an address.
pub async fn locate(
    session: &WorkflowSession<DispatchWorkflow>,
    provider: &dyn GeolocationProvider,
) -> Result<Location> {
    let stage = session.stage();
    if stage != Stage::Collecting {
        return Err(FlowError::InvalidTransition {
            stage,
            action: "locate the requester",
        });
    }

    match provider.acquire().await {
        Ok(position) => {
            let location = Location {
                lat: position.lat,
                lng: position.lng,
                address: reverse_geocode(position),
            };
            session.set_field(DispatchField::Location(Some(location.clone())))?;
            info!(session_id = %session.id(), address = %location.address, "location found");
            session.notify(Notice::new(
                "ambulance.location_found_title",
                "ambulance.location_found_description",
                Severity::Success,
            ));
            Ok(location)
        }
        Err(failure) => {
            warn!(session_id = %session.id(), error = %failure, "location unavailable");
            let notice = match failure {
                AcquisitionFailure::Unsupported => Notice::new(
                    "ambulance.location_unsupported_title",
                    "ambulance.location_unsupported_description",
                    Severity::Destructive,
                ),
                _ => Notice::new(
                    "ambulance.location_denied_title",
                    "ambulance.location_denied_description",
                    Severity::Destructive,
                ),
            };
            session.notify(notice);
            Err(failure.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use care_flow::{Catalog, Entropy, FlowConfig, Notifier, RecordingSink};
    use std::sync::Arc;

    fn session() -> (WorkflowSession<DispatchWorkflow>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let notifier = Notifier::new(Arc::new(Catalog::default()), sink.clone());
        let session = WorkflowSession::new(
            Arc::new(DispatchWorkflow::default()),
            notifier,
            Entropy::seeded(3),
            FlowConfig::default(),
        );
        (session, sink)
    }

    #[test]
    fn test_reverse_geocode_rounds_to_four_places() {
        let address = reverse_geocode(Coordinates {
            lat: 6.524379,
            lng: 3.379206,
        });
        assert_eq!(address, "6.5244, 3.3792 - Current Location");
    }

    #[tokio::test]
    async fn test_located_position_fills_location_section() {
        let (session, sink) = session();
        let provider = ReportedPosition(Ok(Coordinates { lat: 1.5, lng: -2.25 }));

        let location = locate(&session, &provider).await.unwrap();
        assert_eq!(location.address, "1.5000, -2.2500 - Current Location");
        assert_eq!(session.fields().location, Some(location));
        assert_eq!(sink.titles(), vec!["ambulance.location_found_title"]);
    }

    #[tokio::test]
    async fn test_failures_leave_location_empty() {
        let (session, sink) = session();

        let err = locate(&session, &ReportedPosition(Err(AcquisitionFailure::Unsupported)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FlowError::Acquisition(AcquisitionFailure::Unsupported)
        ));

        let err = locate(&session, &ReportedPosition(Err(AcquisitionFailure::PermissionDenied)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FlowError::Acquisition(AcquisitionFailure::PermissionDenied)
        ));

        assert!(session.fields().location.is_none());
        let delivered = sink.delivered();
        assert_eq!(delivered[0].title, "ambulance.location_unsupported_title");
        assert_eq!(delivered[1].title, "ambulance.location_denied_title");
        assert!(delivered.iter().all(|n| n.severity == Severity::Destructive));
    }
}
