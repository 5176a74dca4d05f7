use serde::Serialize;
use uuid::Uuid;

use crate::models::parcel::{Coordinate, Parcel, ParcelStatus};

/// Renderable journey for one parcel: pickup, then the last reported
/// position when one exists, then delivery. The current position is always
/// placed between the endpoints, never reordered by geography.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    pub points: Vec<Coordinate>,
    pub center: Coordinate,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RouteView {
    Available(Route),
    Unavailable,
}

/// Pure derivation of a parcel's route. Unavailable iff either endpoint
/// coordinate is absent or non-finite; a partial or invalid current
/// position is simply skipped.
pub fn derive_route(parcel: &Parcel) -> RouteView {
    let (Some(pickup), Some(delivery)) = (parcel.pickup_location, parcel.delivery_location) else {
        return RouteView::Unavailable;
    };
    if !pickup.is_finite() || !delivery.is_finite() {
        return RouteView::Unavailable;
    }

    let current = parcel.current_location.filter(Coordinate::is_finite);

    let mut points = Vec::with_capacity(3);
    points.push(pickup);
    if let Some(current) = current {
        points.push(current);
    }
    points.push(delivery);

    // viewport tracks the most recent known position
    let center = current.unwrap_or(delivery);

    RouteView::Available(Route { points, center })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusDisplay {
    pub label: &'static str,
    pub icon: &'static str,
}

/// Display mapping only. The transition graph is not validated here; the
/// store of record accepts whatever status it is sent.
pub fn status_display(status: ParcelStatus) -> StatusDisplay {
    match status {
        ParcelStatus::Booked => StatusDisplay {
            label: "Booked",
            icon: "📦",
        },
        ParcelStatus::PickedUp => StatusDisplay {
            label: "Picked Up",
            icon: "🚚",
        },
        ParcelStatus::InTransit => StatusDisplay {
            label: "In Transit",
            icon: "📦",
        },
        ParcelStatus::Delivered => StatusDisplay {
            label: "Delivered",
            icon: "✅",
        },
        ParcelStatus::Failed => StatusDisplay {
            label: "Failed",
            icon: "❌",
        },
    }
}

/// Scan-to-track payload: `<base-url>/booking-history/<parcelId>`.
pub fn tracking_url(base_url: &str, parcel_id: Uuid) -> String {
    format!("{}/booking-history/{parcel_id}", base_url.trim_end_matches('/'))
}
