use care_flow::{AcquisitionFailure, RequestId, Stage};
use serde::{Deserialize, Serialize};

use crate::documents::ArtifactRef;
use crate::flows::verification::VerificationStatus;
use crate::geolocation::{Coordinates, ReportedPosition};

/// What the browser geolocation API gave the client: a fix, or why there is none.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LocateRequest {
    Position(Coordinates),
    Failure { failure: AcquisitionFailure },
}

impl From<LocateRequest> for ReportedPosition {
    fn from(request: LocateRequest) -> Self {
        match request {
            LocateRequest::Position(position) => ReportedPosition(Ok(position)),
            LocateRequest::Failure { failure } => ReportedPosition(Err(failure)),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub artifact: ArtifactRef,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub status: VerificationStatus,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub session_id: String,
    pub request_id: RequestId,
    pub stage: Stage,
}
