pub mod report;

use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use crate::models::parcel::{Parcel, ParcelStatus};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountBucket {
    pub label: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDeliveries {
    pub agent_id: Uuid,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub parcel_type_stats: Vec<CountBucket>,
    pub status_stats: Vec<CountBucket>,
    pub cod_vs_prepaid: Vec<CountBucket>,
    pub average_delivery_time_hours: f64,
    pub delivery_completion_rate: f64,
    pub average_assign_delay_hours: f64,
    pub top_agents_by_delivery: Vec<AgentDeliveries>,
}

/// Pure projection over the parcel set. Buckets are sorted by label so the
/// output is stable for charting and tests.
pub fn compute(parcels: &[Parcel]) -> Analytics {
    let parcel_type_stats = bucketize(parcels.iter().map(|p| p.parcel_type.clone()));
    let status_stats = bucketize(parcels.iter().map(|p| status_label(p.status).to_string()));
    let cod_vs_prepaid = bucketize(parcels.iter().map(|p| p.payment_mode().to_string()));

    let delivery_hours: Vec<f64> = parcels
        .iter()
        .filter_map(|p| {
            let delivered_at = p.delivered_at?;
            Some(hours_between(p.created_at, delivered_at))
        })
        .collect();
    let average_delivery_time_hours = mean(&delivery_hours);

    let assign_hours: Vec<f64> = parcels
        .iter()
        .filter_map(|p| {
            let assigned_at = p.assigned_at?;
            Some(hours_between(p.created_at, assigned_at))
        })
        .collect();
    let average_assign_delay_hours = mean(&assign_hours);

    let terminal = parcels.iter().filter(|p| p.status.is_terminal()).count();
    let delivered = parcels
        .iter()
        .filter(|p| p.status == ParcelStatus::Delivered)
        .count();
    let delivery_completion_rate = if terminal == 0 {
        0.0
    } else {
        delivered as f64 / terminal as f64
    };

    let mut by_agent: HashMap<Uuid, u64> = HashMap::new();
    for parcel in parcels {
        if parcel.status == ParcelStatus::Delivered {
            if let Some(agent) = parcel.assigned_agent {
                *by_agent.entry(agent).or_insert(0) += 1;
            }
        }
    }
    let mut top_agents_by_delivery: Vec<AgentDeliveries> = by_agent
        .into_iter()
        .map(|(agent_id, count)| AgentDeliveries { agent_id, count })
        .collect();
    top_agents_by_delivery.sort_by(|a, b| b.count.cmp(&a.count).then(a.agent_id.cmp(&b.agent_id)));

    Analytics {
        parcel_type_stats,
        status_stats,
        cod_vs_prepaid,
        average_delivery_time_hours,
        delivery_completion_rate,
        average_assign_delay_hours,
        top_agents_by_delivery,
    }
}

/// Chart-ready series: parallel label and count vectors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    pub counts: Vec<u64>,
}

impl ChartSeries {
    pub fn from_buckets(buckets: &[CountBucket]) -> Self {
        Self {
            labels: buckets.iter().map(|b| b.label.clone()).collect(),
            counts: buckets.iter().map(|b| b.count).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardCharts {
    pub parcel_types: ChartSeries,
    pub statuses: ChartSeries,
    pub cod_vs_prepaid: ChartSeries,
}

pub fn chart_series(analytics: &Analytics) -> DashboardCharts {
    DashboardCharts {
        parcel_types: ChartSeries::from_buckets(&analytics.parcel_type_stats),
        statuses: ChartSeries::from_buckets(&analytics.status_stats),
        cod_vs_prepaid: ChartSeries::from_buckets(&analytics.cod_vs_prepaid),
    }
}

fn bucketize(labels: impl Iterator<Item = String>) -> Vec<CountBucket> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for label in labels {
        *counts.entry(label).or_insert(0) += 1;
    }
    let mut buckets: Vec<CountBucket> = counts
        .into_iter()
        .map(|(label, count)| CountBucket { label, count })
        .collect();
    buckets.sort_by(|a, b| a.label.cmp(&b.label));
    buckets
}

fn status_label(status: ParcelStatus) -> &'static str {
    match status {
        ParcelStatus::Booked => "Booked",
        ParcelStatus::PickedUp => "Picked Up",
        ParcelStatus::InTransit => "In Transit",
        ParcelStatus::Delivered => "Delivered",
        ParcelStatus::Failed => "Failed",
    }
}

fn hours_between(from: chrono::DateTime<chrono::Utc>, to: chrono::DateTime<chrono::Utc>) -> f64 {
    (to - from).num_seconds() as f64 / 3600.0
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
