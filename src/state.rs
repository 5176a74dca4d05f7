use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::location::LocationUpdate;
use crate::models::parcel::Parcel;
use crate::models::user::UserAccount;
use crate::observability::metrics::Metrics;
use crate::session::storage::SessionStorage;
use crate::session::SessionStore;

pub struct AppState {
    pub users: DashMap<Uuid, UserAccount>,
    pub tokens: DashMap<String, Uuid>,
    pub parcels: DashMap<Uuid, Parcel>,
    pub session: Arc<SessionStore>,
    pub location_events_tx: broadcast::Sender<LocationUpdate>,
    pub location_in_flight: DashMap<Uuid, ()>,
    pub public_base_url: String,
    pub session_ttl_secs: i64,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        event_buffer_size: usize,
        session_ttl_secs: i64,
        public_base_url: String,
        storage: Arc<dyn SessionStorage>,
    ) -> Self {
        let (location_events_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        Self {
            users: DashMap::new(),
            tokens: DashMap::new(),
            parcels: DashMap::new(),
            session: SessionStore::new(storage),
            location_events_tx,
            location_in_flight: DashMap::new(),
            public_base_url,
            session_ttl_secs,
            metrics: Metrics::new(),
        }
    }
}
