use axum::{
    Router,
    extract::{FromRef, Path, State},
    http::StatusCode,
    middleware::from_fn,
    response::Json,
    routing::{get, patch, post, put},
};
use care_flow::{
    FieldStore, FlowError, Localizer, NotificationSink, Notifier, SessionRegistry, Workflow,
    WorkflowSnapshot,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::{
    config::ServiceConfig,
    documents::{DocumentStore, InMemoryDocumentStore},
    flows::{
        DispatchWorkflow, DocumentSlot, Location, TriageWorkflow, VerificationResult,
        VerificationWorkflow, triage, verification,
    },
    geolocation::{self, ReportedPosition},
    models::{LocateRequest, ReviewRequest, SubmitResponse, UploadRequest},
    telemetry::correlation_id_middleware,
    workflow::{create_dispatch_registry, create_triage_registry, create_verification_registry},
};

type ApiResult<T> = Result<Json<T>, ApiError>;
type ApiError = (StatusCode, Json<Value>);
type Snapshot<W> = WorkflowSnapshot<<W as Workflow>::Fields, <W as Workflow>::Outcome>;

fn flow_error(err: FlowError) -> ApiError {
    let status = match &err {
        FlowError::Validation { .. } | FlowError::Acquisition(_) => StatusCode::UNPROCESSABLE_ENTITY,
        FlowError::InvalidTransition { .. } | FlowError::Discarded => StatusCode::CONFLICT,
        FlowError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        FlowError::Evaluation(_) | FlowError::Locale(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let mut body = json!({ "error": err.to_string() });
    match &err {
        FlowError::Validation { missing } => body["missing_sections"] = json!(missing),
        FlowError::Acquisition(failure) => body["reason"] = json!(failure),
        FlowError::SessionNotFound(id) => body["session_id"] = json!(id),
        _ => {}
    }

    if status.is_server_error() {
        error!(error = %err, "request failed");
    } else {
        warn!(error = %err, status = %status, "request rejected");
    }
    (status, Json(body))
}

#[derive(Clone)]
pub struct AppState {
    pub triage: Arc<SessionRegistry<TriageWorkflow>>,
    pub dispatch: Arc<SessionRegistry<DispatchWorkflow>>,
    pub verification: Arc<SessionRegistry<VerificationWorkflow>>,
    pub documents: Arc<dyn DocumentStore>,
}

impl AppState {
    pub fn new(config: &ServiceConfig, sink: Arc<dyn NotificationSink>) -> anyhow::Result<Self> {
        let catalog = config.locale.catalog()?;
        info!(locale = %config.locale, entries = catalog.len(), "locale catalog loaded");
        let localizer: Arc<dyn Localizer> = Arc::new(catalog);
        let notifier = Notifier::new(localizer, sink);

        Ok(Self {
            triage: Arc::new(create_triage_registry(config, notifier.clone())),
            dispatch: Arc::new(create_dispatch_registry(config, notifier.clone())),
            verification: Arc::new(create_verification_registry(config, notifier)),
            documents: Arc::new(InMemoryDocumentStore::new()),
        })
    }

    pub fn with_document_store(mut self, documents: Arc<dyn DocumentStore>) -> Self {
        self.documents = documents;
        self
    }
}

impl FromRef<AppState> for Arc<dyn DocumentStore> {
    fn from_ref(state: &AppState) -> Self {
        state.documents.clone()
    }
}

impl FromRef<AppState> for Arc<SessionRegistry<TriageWorkflow>> {
    fn from_ref(state: &AppState) -> Self {
        state.triage.clone()
    }
}

impl FromRef<AppState> for Arc<SessionRegistry<DispatchWorkflow>> {
    fn from_ref(state: &AppState) -> Self {
        state.dispatch.clone()
    }
}

impl FromRef<AppState> for Arc<SessionRegistry<VerificationWorkflow>> {
    fn from_ref(state: &AppState) -> Self {
        state.verification.clone()
    }
}

pub fn create_app(config: &ServiceConfig, sink: Arc<dyn NotificationSink>) -> anyhow::Result<Router> {
    let app_state = AppState::new(config, sink)?;
    Ok(build_router(app_state))
}

pub fn build_router(app_state: AppState) -> Router {
    let triage_routes = workflow_routes::<TriageWorkflow>().route("/{id}/photo", put(upload_photo));
    let dispatch_routes = workflow_routes::<DispatchWorkflow>().route("/{id}/locate", post(locate));
    let verification_routes = workflow_routes::<VerificationWorkflow>()
        .route("/{id}/documents/{slot}", put(upload_document))
        .route("/{id}/review", post(record_review));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .nest("/triage", triage_routes)
        .nest("/dispatch", dispatch_routes)
        .nest("/verification", verification_routes)
        .layer(
            ServiceBuilder::new()
                .layer(from_fn(correlation_id_middleware))
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(app_state)
}

/// Session lifecycle routes shared by every workflow.
fn workflow_routes<W: Workflow>() -> Router<AppState>
where
    Arc<SessionRegistry<W>>: FromRef<AppState>,
{
    Router::new()
        .route("/", post(open_session::<W>))
        .route("/{id}", get(get_session::<W>).delete(discard_session::<W>))
        .route("/{id}/fields", patch(set_field::<W>))
        .route("/{id}/submit", post(submit::<W>))
        .route("/{id}/restart", post(restart_session::<W>))
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Healthcare Intake Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Guided symptom triage, ambulance dispatch and doctor verification",
        "endpoints": {
            "POST /{flow}": "Open a session (flow: triage, dispatch, verification)",
            "GET /{flow}/{id}": "Get the session snapshot",
            "PATCH /{flow}/{id}/fields": "Set one field",
            "POST /{flow}/{id}/submit": "Submit for evaluation",
            "POST /{flow}/{id}/restart": "Replace the session with a fresh one",
            "DELETE /{flow}/{id}": "Discard the session",
            "PUT /triage/{id}/photo": "Attach a symptom photo",
            "POST /dispatch/{id}/locate": "Report the requester's position",
            "PUT /verification/{id}/documents/{slot}": "Upload a credential document",
            "POST /verification/{id}/review": "Record the reviewer's decision",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn open_session<W: Workflow>(
    State(registry): State<Arc<SessionRegistry<W>>>,
) -> (StatusCode, Json<Snapshot<W>>) {
    let session = registry.open();
    (StatusCode::CREATED, Json(session.snapshot()))
}

async fn get_session<W: Workflow>(
    State(registry): State<Arc<SessionRegistry<W>>>,
    Path(id): Path<String>,
) -> ApiResult<Snapshot<W>> {
    let session = registry.get(&id).map_err(flow_error)?;
    Ok(Json(session.snapshot()))
}

async fn set_field<W: Workflow>(
    State(registry): State<Arc<SessionRegistry<W>>>,
    Path(id): Path<String>,
    Json(field): Json<<W::Fields as FieldStore>::Field>,
) -> ApiResult<Snapshot<W>> {
    let session = registry.get(&id).map_err(flow_error)?;
    session.set_field(field).map_err(flow_error)?;
    Ok(Json(session.snapshot()))
}

async fn submit<W: Workflow>(
    State(registry): State<Arc<SessionRegistry<W>>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let session = registry.get(&id).map_err(flow_error)?;
    let request_id = session.submit().map_err(flow_error)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            session_id: id,
            request_id,
            stage: session.stage(),
        }),
    ))
}

async fn restart_session<W: Workflow>(
    State(registry): State<Arc<SessionRegistry<W>>>,
    State(documents): State<Arc<dyn DocumentStore>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<Snapshot<W>>), ApiError> {
    let session = registry.restart(&id).map_err(flow_error)?;
    documents.release(&id);
    Ok((StatusCode::CREATED, Json(session.snapshot())))
}

async fn discard_session<W: Workflow>(
    State(registry): State<Arc<SessionRegistry<W>>>,
    State(documents): State<Arc<dyn DocumentStore>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    registry.discard(&id).map_err(flow_error)?;
    documents.release(&id);
    Ok(StatusCode::NO_CONTENT)
}

async fn upload_photo(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UploadRequest>,
) -> ApiResult<Snapshot<TriageWorkflow>> {
    let session = state.triage.get(&id).map_err(flow_error)?;
    triage::attach_photo(&session, state.documents.as_ref(), request.artifact)
        .map_err(flow_error)?;
    Ok(Json(session.snapshot()))
}

async fn locate(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<LocateRequest>,
) -> ApiResult<Location> {
    let session = state.dispatch.get(&id).map_err(flow_error)?;
    let provider = ReportedPosition::from(request);
    let location = geolocation::locate(&session, &provider)
        .await
        .map_err(flow_error)?;
    Ok(Json(location))
}

async fn upload_document(
    State(state): State<AppState>,
    Path((id, slot)): Path<(String, DocumentSlot)>,
    Json(request): Json<UploadRequest>,
) -> ApiResult<Snapshot<VerificationWorkflow>> {
    let session = state.verification.get(&id).map_err(flow_error)?;
    verification::upload_document(&session, state.documents.as_ref(), slot, request.artifact)
        .map_err(flow_error)?;
    Ok(Json(session.snapshot()))
}

async fn record_review(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ReviewRequest>,
) -> ApiResult<VerificationResult> {
    let session = state.verification.get(&id).map_err(flow_error)?;
    let result = verification::record_review(&session, request.status).map_err(flow_error)?;
    Ok(Json(result))
}
