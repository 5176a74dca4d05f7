use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::analytics;
use crate::analytics::report::parcel_report_csv;
use crate::error::AppError;
use crate::location::{self, LocationUpdate, ReportedPosition};
use crate::models::parcel::{Coordinate, Parcel, ParcelStatus};
use crate::models::user::Role;
use crate::state::AppState;
use crate::tracking::{derive_route, status_display, tracking_url, RouteView};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/parcels", get(list_parcels))
        .route("/parcels/book", post(book_parcel))
        .route("/parcels/analytics", get(parcel_analytics))
        .route("/parcels/report.csv", get(parcel_report))
        .route("/parcels/:id", get(get_parcel))
        .route("/parcels/:id/route", get(get_route))
        .route("/parcels/:id/status", put(update_status))
        .route("/parcels/:id/location", put(update_location))
        .route("/parcels/:id/assign", put(assign_agent))
        .route("/parcels/sender/:id", get(parcels_by_sender))
        .route("/parcels/agent/:id", get(parcels_by_agent))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookParcelRequest {
    pub recipient_name: String,
    pub recipient_email: String,
    pub parcel_type: String,
    #[serde(rename = "isCOD", default)]
    pub is_cod: bool,
    pub pickup_address: String,
    pub delivery_address: String,
    pub pickup_lat: f64,
    pub pickup_lng: f64,
    pub delivery_lat: f64,
    pub delivery_lng: f64,
    pub sender: Uuid,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub status: ParcelStatus,
    pub recipient_name: Option<String>,
    pub recipient_email: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignAgentRequest {
    pub assigned_agent_id: Uuid,
}

async fn book_parcel(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<BookParcelRequest>,
) -> Result<Json<Parcel>, AppError> {
    for (field, value) in [
        ("recipientName", &payload.recipient_name),
        ("recipientEmail", &payload.recipient_email),
        ("parcelType", &payload.parcel_type),
        ("pickupAddress", &payload.pickup_address),
        ("deliveryAddress", &payload.delivery_address),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::Validation(format!("{field} is required")));
        }
    }

    let pickup = Coordinate {
        lat: payload.pickup_lat,
        lng: payload.pickup_lng,
    };
    let delivery = Coordinate {
        lat: payload.delivery_lat,
        lng: payload.delivery_lng,
    };
    if !pickup.is_finite() || !delivery.is_finite() {
        return Err(AppError::Validation(
            "pickup and delivery locations must be selected".to_string(),
        ));
    }

    let parcel = Parcel {
        id: Uuid::new_v4(),
        sender: payload.sender,
        assigned_agent: None,
        recipient_name: payload.recipient_name,
        recipient_email: payload.recipient_email,
        parcel_type: payload.parcel_type,
        is_cod: payload.is_cod,
        status: ParcelStatus::Booked,
        pickup_address: payload.pickup_address,
        delivery_address: payload.delivery_address,
        pickup_location: Some(pickup),
        delivery_location: Some(delivery),
        current_location: None,
        created_at: Utc::now(),
        assigned_at: None,
        delivered_at: None,
    };

    state.parcels.insert(parcel.id, parcel.clone());
    state.metrics.parcels_booked_total.inc();
    info!(parcel_id = %parcel.id, sender = %parcel.sender, "parcel booked");

    Ok(Json(parcel))
}

async fn list_parcels(State(state): State<Arc<AppState>>) -> Json<Vec<Parcel>> {
    let parcels = state
        .parcels
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    Json(parcels)
}

async fn get_parcel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Parcel>, AppError> {
    let parcel = state
        .parcels
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("parcel {id} not found")))?;

    Ok(Json(parcel.value().clone()))
}

async fn parcels_by_sender(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Json<Vec<Parcel>> {
    let parcels = state
        .parcels
        .iter()
        .filter(|entry| entry.value().sender == id)
        .map(|entry| entry.value().clone())
        .collect();
    Json(parcels)
}

async fn parcels_by_agent(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Json<Vec<Parcel>> {
    let parcels = state
        .parcels
        .iter()
        .filter(|entry| entry.value().assigned_agent == Some(id))
        .map(|entry| entry.value().clone())
        .collect();
    Json(parcels)
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Parcel>, AppError> {
    let mut parcel = state
        .parcels
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("parcel {id} not found")))?;

    // no transition validation: the store of record accepts any target status
    parcel.status = payload.status;
    if payload.status == ParcelStatus::Delivered && parcel.delivered_at.is_none() {
        parcel.delivered_at = Some(Utc::now());
    }
    if let Some(name) = payload.recipient_name {
        parcel.recipient_name = name;
    }
    if let Some(email) = payload.recipient_email {
        parcel.recipient_email = email;
    }

    let label = status_display(payload.status).label;
    state
        .metrics
        .status_updates_total
        .with_label_values(&[label])
        .inc();
    info!(parcel_id = %id, status = label, "parcel status updated");

    Ok(Json(parcel.clone()))
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReportedPosition>,
) -> Result<Json<LocationUpdate>, AppError> {
    let update = location::report_location(&state, id, &payload).await?;
    Ok(Json(update))
}

async fn assign_agent(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignAgentRequest>,
) -> Result<Json<Parcel>, AppError> {
    let agent_id = payload.assigned_agent_id;
    let is_agent = state
        .users
        .get(&agent_id)
        .map(|entry| entry.value().user.role == Role::Agent)
        .unwrap_or(false);
    if !is_agent {
        return Err(AppError::Validation(format!(
            "user {agent_id} is not a registered agent"
        )));
    }

    let mut parcel = state
        .parcels
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("parcel {id} not found")))?;

    parcel.assigned_agent = Some(agent_id);
    parcel.assigned_at = Some(Utc::now());
    info!(parcel_id = %id, agent_id = %agent_id, "agent assigned");

    Ok(Json(parcel.clone()))
}

async fn parcel_analytics(State(state): State<Arc<AppState>>) -> Json<analytics::Analytics> {
    let parcels: Vec<Parcel> = state
        .parcels
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    Json(analytics::compute(&parcels))
}

async fn parcel_report(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let parcels: Vec<Parcel> = state
        .parcels
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    (
        StatusCode::OK,
        [("content-type", "text/csv; charset=utf-8")],
        parcel_report_csv(&parcels),
    )
}

async fn get_route(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let parcel = state
        .parcels
        .get(&id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("parcel {id} not found")))?;

    let display = status_display(parcel.status);
    let body = match derive_route(&parcel) {
        RouteView::Available(route) => json!({
            "parcelId": parcel.id,
            "status": display,
            "trackingUrl": tracking_url(&state.public_base_url, parcel.id),
            "available": true,
            "route": route,
        }),
        RouteView::Unavailable => json!({
            "parcelId": parcel.id,
            "status": display,
            "trackingUrl": tracking_url(&state.public_base_url, parcel.id),
            "available": false,
            "message": "Location data is missing",
        }),
    };

    Ok(Json(body))
}
