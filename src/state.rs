use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::broadcast;

use crate::models::BookingRow;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub events: broadcast::Sender<ServerEvent>,
}

impl AppState {
    pub fn new(db: SqlitePool) -> Self {
        let (events, _) = broadcast::channel(64);
        Self { db, events }
    }
}

/// Booking lifecycle event pushed over the live event stream.
#[derive(Clone, Debug, Serialize)]
pub struct ServerEvent {
    pub kind: String,
    pub booking_id: Option<String>,
    pub status: Option<String>,
    pub customer_id: Option<String>,
    pub technician_id: Option<String>,
    pub service_type: Option<String>,
    pub customer_location: Option<String>,
    pub scheduled_date: Option<String>,
    pub price_rwf: Option<String>,
}

impl ServerEvent {
    pub fn from_row(kind: &str, row: BookingRow) -> Self {
        Self {
            kind: kind.to_string(),
            booking_id: Some(row.id),
            status: Some(row.status),
            customer_id: Some(row.customer_id),
            technician_id: row.technician_id,
            service_type: Some(row.service_type),
            customer_location: Some(row.customer_location),
            scheduled_date: row.scheduled_date,
            price_rwf: Some(row.price_rwf),
        }
    }
}
