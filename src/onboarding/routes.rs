//! REST endpoints for the onboarding wizard.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;

use super::model::{BankDraft, EntityDraft, IdentityDraft, RoleDraft};
use super::session::WizardSession;
use super::state::WizardStep;
use crate::error::SubmitError;

/// Shared state for wizard routes.
#[derive(Clone)]
pub struct WizardRouteState {
    pub session: Arc<WizardSession>,
}

#[derive(Debug, Deserialize)]
struct SaveStepBody {
    #[serde(default)]
    completed: bool,
}

fn error_json(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({"error": message.into()}))).into_response()
}

fn submit_error(err: SubmitError) -> Response {
    let status = match &err {
        SubmitError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SubmitError::Backend(_) => StatusCode::BAD_GATEWAY,
        SubmitError::InProgress => StatusCode::CONFLICT,
    };
    error_json(status, err.to_string())
}

fn parse_step(step: u8) -> Result<WizardStep, Response> {
    WizardStep::from_number(step)
        .ok_or_else(|| error_json(StatusCode::NOT_FOUND, format!("Unknown step {step}")))
}

/// GET /health
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// GET /api/wizard/state
async fn get_state(State(state): State<WizardRouteState>) -> impl IntoResponse {
    let wizard = state.session.snapshot().await;
    let server = state.session.server_snapshot().await;
    Json(serde_json::json!({
        "wizard": wizard,
        "server_state": server.as_ref().map(|s| s.state),
        "session_id": server.as_ref().map(|s| s.session_id.clone()),
    }))
}

/// PUT /api/wizard/steps/{step}
///
/// Replaces one step draft. Local file handles are not part of the body and
/// carry over from the current draft.
async fn put_step(
    State(state): State<WizardRouteState>,
    Path(step): Path<u8>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let step = match parse_step(step) {
        Ok(step) => step,
        Err(resp) => return resp,
    };
    if !step.has_draft() {
        return error_json(StatusCode::BAD_REQUEST, format!("Step {step} has no draft"));
    }
    if let Some(route) = state.session.guard(step).await {
        return (
            StatusCode::CONFLICT,
            Json(serde_json::json!({"error": "Step is not available", "redirect": route})),
        )
            .into_response();
    }

    let session = &state.session;
    let replaced = match step {
        WizardStep::Entity => match serde_json::from_value::<EntityDraft>(body) {
            Ok(mut draft) => {
                session
                    .update_entity(|current| {
                        for doc in &mut draft.formation_documents {
                            doc.file = current
                                .formation_documents
                                .iter()
                                .find(|d| d.doc_type == doc.doc_type)
                                .and_then(|d| d.file.clone());
                        }
                        *current = draft;
                    })
                    .await;
                Ok(())
            }
            Err(e) => Err(e),
        },
        WizardStep::Role => match serde_json::from_value::<RoleDraft>(body) {
            Ok(draft) => {
                session.update_role(|current| *current = draft).await;
                Ok(())
            }
            Err(e) => Err(e),
        },
        WizardStep::Identity => match serde_json::from_value::<IdentityDraft>(body) {
            Ok(mut draft) => {
                session
                    .update_identity(|current| {
                        draft.id_file = current.id_file.take();
                        *current = draft;
                    })
                    .await;
                Ok(())
            }
            Err(e) => Err(e),
        },
        _ => match serde_json::from_value::<BankDraft>(body) {
            Ok(draft) => {
                session.update_bank(|current| *current = draft).await;
                Ok(())
            }
            Err(e) => Err(e),
        },
    };

    if let Err(e) = replaced {
        return error_json(StatusCode::BAD_REQUEST, format!("Invalid draft: {e}"));
    }
    session.touch_step(step).await;
    Json(session.progress().await).into_response()
}

/// POST /api/wizard/steps/{step}/save
async fn save_step(
    State(state): State<WizardRouteState>,
    Path(step): Path<u8>,
    Json(body): Json<SaveStepBody>,
) -> Response {
    let step = match parse_step(step) {
        Ok(step) => step,
        Err(resp) => return resp,
    };
    match state.session.save_step(step, body.completed).await {
        Ok(()) => Json(state.session.progress().await).into_response(),
        Err(e) => submit_error(e),
    }
}

/// GET /api/wizard/guard/{step}
async fn get_guard(State(state): State<WizardRouteState>, Path(step): Path<u8>) -> Response {
    let step = match parse_step(step) {
        Ok(step) => step,
        Err(resp) => return resp,
    };
    let redirect = state.session.guard(step).await;
    Json(serde_json::json!({"redirect": redirect})).into_response()
}

/// POST /api/wizard/refresh
async fn refresh(State(state): State<WizardRouteState>) -> impl IntoResponse {
    let route = state.session.refresh_session().await;
    Json(serde_json::json!({"route": route}))
}

/// POST /api/wizard/complete
async fn complete(State(state): State<WizardRouteState>) -> Response {
    match state.session.complete().await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => submit_error(e),
    }
}

/// POST /api/wizard/reset
async fn reset(State(state): State<WizardRouteState>) -> Response {
    match state.session.restart().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => submit_error(e),
    }
}

/// Build the wizard REST routes.
pub fn wizard_routes(state: WizardRouteState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/wizard/state", get(get_state))
        .route("/api/wizard/steps/{step}", put(put_step))
        .route("/api/wizard/steps/{step}/save", post(save_step))
        .route("/api/wizard/guard/{step}", get(get_guard))
        .route("/api/wizard/refresh", post(refresh))
        .route("/api/wizard/complete", post(complete))
        .route("/api/wizard/reset", post(reset))
        .with_state(state)
}
