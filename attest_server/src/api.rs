use std::sync::Arc;

use attest_core::{Outcome, RegistrySnapshot, Status, Verb};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info_span};
use uuid::Uuid;

use crate::state::AppState;

/// Body of every metadata-service request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRequest {
    /// The speaker issuing the statement. Logged, not used for decisions.
    #[serde(default)]
    pub principal: String,

    /// Positional arguments for the route's verb.
    #[serde(default)]
    pub other_values: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_ref: Option<String>,
}

/// Body of every metadata-service response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
}

/// Maps a core outcome onto an HTTP response.
#[derive(Debug)]
pub struct ApiOutcome(pub Outcome);

fn status_code(status: Status) -> StatusCode {
    StatusCode::from_u16(status.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

impl IntoResponse for ApiOutcome {
    fn into_response(self) -> Response {
        let body = MessageBody {
            message: self.0.message().to_string(),
        };
        (status_code(self.0.status), Json(body)).into_response()
    }
}

fn dispatch_body(state: &AppState, verb: Verb, body: &[u8]) -> Outcome {
    let request: MetadataRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(e) => {
            error!("error decoding the body: {}", e);
            return Outcome::with_status(Status::BadRequest);
        }
    };

    debug!(
        principal = %request.principal,
        bearer = request.bearer_ref.as_deref().unwrap_or(""),
        args = ?request.other_values,
        "decoded request"
    );
    state.broker.dispatch(verb, request.other_values.as_slice())
}

/// Decode the body and run `verb` against the broker.
pub async fn handle_verb(state: Arc<AppState>, verb: Verb, body: Bytes) -> ApiOutcome {
    let request_id = Uuid::new_v4();
    let span = info_span!("request", %request_id, %verb);
    ApiOutcome(span.in_scope(|| dispatch_body(&state, verb, &body)))
}

/// Handler for the /ping endpoint
pub async fn ping_handler() -> &'static str {
    "pong"
}

/// Dump every registry mapping as JSON.
pub async fn registry_handler(State(state): State<Arc<AppState>>) -> Json<RegistrySnapshot> {
    Json(state.broker.snapshot())
}

/// Build the router: one `POST` route per verb plus diagnostics.
pub fn router(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route("/ping", get(ping_handler))
        .route("/registry", get(registry_handler));

    for verb in Verb::ALL {
        app = app.route(
            &format!("/{}", verb.route()),
            post(move |State(state): State<Arc<AppState>>, body: Bytes| {
                handle_verb(state, verb, body)
            }),
        );
    }

    app.with_state(state)
}
