use serde::Serialize;

use crate::analytics::Analytics;
use crate::models::parcel::Parcel;

pub const CSV_HEADER: &str = "ID,Recipient Name,Recipient Email,Status,Type,Payment Mode";

/// Fixed-column CSV listing for the admin export. Field values containing a
/// comma or quote are quoted per RFC 4180.
pub fn parcel_report_csv(parcels: &[Parcel]) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');

    for parcel in parcels {
        let status = serde_json::to_value(parcel.status)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        let row = [
            parcel.id.to_string(),
            parcel.recipient_name.clone(),
            parcel.recipient_email.clone(),
            status,
            parcel.parcel_type.clone(),
            parcel.payment_mode().to_string(),
        ];
        let escaped: Vec<String> = row.iter().map(|field| escape_field(field)).collect();
        out.push_str(&escaped.join(","));
        out.push('\n');
    }

    out
}

fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Summary block for the paginated document report. Rendering the document
/// itself stays with the export library.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub average_delivery_time_hours: f64,
    pub delivery_completion_rate: f64,
    pub average_assign_delay_hours: f64,
    pub total_parcels: usize,
}

pub fn report_summary(analytics: &Analytics, total_parcels: usize) -> ReportSummary {
    ReportSummary {
        average_delivery_time_hours: analytics.average_delivery_time_hours,
        delivery_completion_rate: analytics.delivery_completion_rate,
        average_assign_delay_hours: analytics.average_assign_delay_hours,
        total_parcels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::parcel::{Coordinate, ParcelStatus};
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_parcel() -> Parcel {
        Parcel {
            id: Uuid::nil(),
            sender: Uuid::new_v4(),
            assigned_agent: None,
            recipient_name: "Jane".to_string(),
            recipient_email: "jane@example.com".to_string(),
            parcel_type: "Small Box".to_string(),
            is_cod: true,
            status: ParcelStatus::PickedUp,
            pickup_address: "12 Elm St".to_string(),
            delivery_address: "5 Oak Ave".to_string(),
            pickup_location: Some(Coordinate {
                lat: 23.81,
                lng: 90.41,
            }),
            delivery_location: Some(Coordinate {
                lat: 23.77,
                lng: 90.40,
            }),
            current_location: None,
            created_at: Utc::now(),
            assigned_at: None,
            delivered_at: None,
        }
    }

    #[test]
    fn csv_has_fixed_column_order() {
        let csv = parcel_report_csv(&[sample_parcel()]);
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("ID,Recipient Name,Recipient Email,Status,Type,Payment Mode")
        );
        let row = lines.next().unwrap();
        assert_eq!(
            row,
            format!("{},Jane,jane@example.com,Picked Up,Small Box,COD", Uuid::nil())
        );
    }

    #[test]
    fn csv_quotes_fields_with_commas() {
        let mut parcel = sample_parcel();
        parcel.recipient_name = "Doe, Jane".to_string();
        let csv = parcel_report_csv(&[parcel]);
        assert!(csv.contains("\"Doe, Jane\""));
    }

    #[test]
    fn empty_report_is_header_only() {
        let csv = parcel_report_csv(&[]);
        assert_eq!(csv, format!("{CSV_HEADER}\n"));
    }
}
