use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::parcel::Coordinate;
use crate::state::AppState;

pub const LOCATION_UPDATE_EVENT: &str = "location-update";

/// Payload broadcast to live tracking subscribers after a position has been
/// persisted. Delivery is at-most-once; the sender gets no confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdate {
    pub parcel_id: Uuid,
    pub lat: f64,
    pub lng: f64,
}

/// Where the reporting device's position comes from. Acquisition can fail
/// when positioning is unsupported, denied or timed out.
pub trait PositionSource: Sync {
    fn current_position(&self) -> Result<Coordinate, AppError>;
}

/// A position reported in a request body. Absent or non-finite components
/// count as a failed acquisition.
#[derive(Debug, Deserialize)]
pub struct ReportedPosition {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

impl PositionSource for ReportedPosition {
    fn current_position(&self) -> Result<Coordinate, AppError> {
        let (Some(lat), Some(lng)) = (self.lat, self.lng) else {
            return Err(AppError::PositionUnavailable(
                "no position reported by the device".to_string(),
            ));
        };
        let coordinate = Coordinate { lat, lng };
        if !coordinate.is_finite() {
            return Err(AppError::PositionUnavailable(
                "reported position is not a finite coordinate".to_string(),
            ));
        }
        Ok(coordinate)
    }
}

struct InFlightGuard<'a> {
    map: &'a DashMap<Uuid, ()>,
    key: Uuid,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.map.remove(&self.key);
    }
}

/// Propagates an agent's position for one parcel: acquire, persist with
/// last-write-wins semantics, then broadcast. A failed persist must not
/// broadcast, so subscribers never see a position absent from the store.
/// A second report for the same parcel while one is in flight is rejected,
/// never queued.
pub async fn report_location(
    state: &AppState,
    parcel_id: Uuid,
    source: &dyn PositionSource,
) -> Result<LocationUpdate, AppError> {
    let _guard = match state.location_in_flight.entry(parcel_id) {
        Entry::Occupied(_) => {
            state
                .metrics
                .location_updates_total
                .with_label_values(&["busy"])
                .inc();
            return Err(AppError::Busy(format!(
                "a location update for parcel {parcel_id} is already in flight"
            )));
        }
        Entry::Vacant(vacant) => {
            vacant.insert(());
            InFlightGuard {
                map: &state.location_in_flight,
                key: parcel_id,
            }
        }
    };

    let coordinate = source.current_position().inspect_err(|_| {
        state
            .metrics
            .location_updates_total
            .with_label_values(&["position_unavailable"])
            .inc();
    })?;

    {
        let mut parcel = state.parcels.get_mut(&parcel_id).ok_or_else(|| {
            state
                .metrics
                .location_updates_total
                .with_label_values(&["failed"])
                .inc();
            AppError::NotFound(format!("parcel {parcel_id} not found"))
        })?;
        parcel.current_location = Some(coordinate);
    }

    let update = LocationUpdate {
        parcel_id,
        lat: coordinate.lat,
        lng: coordinate.lng,
    };

    // persisted-then-broadcast; a send with no subscribers is not an error
    let _ = state.location_events_tx.send(update.clone());

    state
        .metrics
        .location_updates_total
        .with_label_values(&["ok"])
        .inc();
    info!(parcel_id = %parcel_id, lat = coordinate.lat, lng = coordinate.lng, "location updated");

    Ok(update)
}
