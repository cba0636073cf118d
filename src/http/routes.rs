use super::error::ApiError;
use super::AppState;
use crate::core::{
    ChannelId, DispatchOutcome, IncidentRecord, IncidentStatus, NewIncident, NotificationRequest,
    UnknownChannel,
};
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

/// The body of `POST /notify/`.
///
/// Channel names stay strings until [`NotificationRequest::try_from`] so an
/// unsupported name is reported as such rather than as a generic body error.
#[derive(Debug, Deserialize)]
pub struct NotifyBody {
    pub user_id: String,
    pub message: String,
    pub channels: Vec<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub telegram_id: Option<String>,
}

impl TryFrom<NotifyBody> for NotificationRequest {
    type Error = UnknownChannel;

    fn try_from(body: NotifyBody) -> Result<Self, Self::Error> {
        let channels = body
            .channels
            .iter()
            .map(|name| name.parse::<ChannelId>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(NotificationRequest {
            user_id: body.user_id,
            message: body.message,
            channels,
            email: body.email,
            phone: body.phone,
            telegram_id: body.telegram_id,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ListIncidentsQuery {
    pub status: Option<IncidentStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: IncidentStatus,
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn notify(
    State(state): State<AppState>,
    payload: Result<Json<NotifyBody>, JsonRejection>,
) -> Result<Json<DispatchOutcome>, ApiError> {
    let Json(body) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let request = NotificationRequest::try_from(body)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    debug!(
        user_id = %request.user_id,
        channels = ?request.channels,
        "Received notification request"
    );
    let outcome = state.dispatcher.dispatch(&request).await?;
    Ok(Json(outcome))
}

pub async fn create_incident(
    State(state): State<AppState>,
    payload: Result<Json<NewIncident>, JsonRejection>,
) -> Result<(StatusCode, Json<IncidentRecord>), ApiError> {
    let Json(incident) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let record = state.incidents.create(incident).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn list_incidents(
    State(state): State<AppState>,
    query: Result<Query<ListIncidentsQuery>, QueryRejection>,
) -> Result<Json<Vec<IncidentRecord>>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let incidents = state.incidents.list(query.status).await?;
    Ok(Json(incidents))
}

pub async fn get_incident(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<IncidentRecord>, ApiError> {
    let Path(id) = id.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    state
        .incidents
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("incident {} not found", id)))
}

pub async fn update_incident(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<StatusUpdate>, JsonRejection>,
) -> Result<Json<IncidentRecord>, ApiError> {
    let Path(id) = id.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let Json(update) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let record = state.incidents.update_status(id, update.status).await?;
    Ok(Json(record))
}
