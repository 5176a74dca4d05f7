use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A geographic point. Both fields are required together: a location with
/// only one component is treated as absent and never rendered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParcelStatus {
    Booked,
    #[serde(rename = "Picked Up")]
    PickedUp,
    #[serde(rename = "In Transit")]
    InTransit,
    Delivered,
    Failed,
}

impl ParcelStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ParcelStatus::Delivered | ParcelStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parcel {
    pub id: Uuid,
    pub sender: Uuid,
    pub assigned_agent: Option<Uuid>,
    pub recipient_name: String,
    pub recipient_email: String,
    pub parcel_type: String,
    #[serde(rename = "isCOD")]
    pub is_cod: bool,
    pub status: ParcelStatus,
    pub pickup_address: String,
    pub delivery_address: String,
    pub pickup_location: Option<Coordinate>,
    pub delivery_location: Option<Coordinate>,
    pub current_location: Option<Coordinate>,
    pub created_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl Parcel {
    pub fn payment_mode(&self) -> &'static str {
        if self.is_cod { "COD" } else { "Prepaid" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_names_keep_spaces() {
        let json = serde_json::to_string(&ParcelStatus::PickedUp).unwrap();
        assert_eq!(json, "\"Picked Up\"");
        let back: ParcelStatus = serde_json::from_str("\"In Transit\"").unwrap();
        assert_eq!(back, ParcelStatus::InTransit);
    }

    #[test]
    fn terminal_statuses() {
        assert!(ParcelStatus::Delivered.is_terminal());
        assert!(ParcelStatus::Failed.is_terminal());
        assert!(!ParcelStatus::InTransit.is_terminal());
    }
}
