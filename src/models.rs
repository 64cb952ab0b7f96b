use std::fmt;

use serde::Serialize;

/// Account roles, stored uppercase in the users table. `parse` accepts any
/// casing so callers sending `customer` and `CUSTOMER` land on the same
/// canonical value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Customer,
    Technician,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Customer, Role::Technician, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "CUSTOMER",
            Role::Technician => "TECHNICIAN",
            Role::Admin => "ADMIN",
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        match value.trim().to_ascii_uppercase().as_str() {
            "CUSTOMER" => Some(Role::Customer),
            "TECHNICIAN" => Some(Role::Technician),
            "ADMIN" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Booking lifecycle states, stored lowercase. Terminal states admit no
/// further transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
    Expired,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 7] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::Scheduled,
        BookingStatus::InProgress,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
        BookingStatus::Expired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Scheduled => "scheduled",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Expired => "expired",
        }
    }

    pub fn parse(value: &str) -> Option<BookingStatus> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "scheduled" => Some(BookingStatus::Scheduled),
            "in_progress" => Some(BookingStatus::InProgress),
            "completed" => Some(BookingStatus::Completed),
            "cancelled" => Some(BookingStatus::Cancelled),
            "expired" => Some(BookingStatus::Expired),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::Expired
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub phone_number: String,
    pub role: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub active: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct BookingRow {
    pub id: String,
    pub customer_id: String,
    pub technician_id: Option<String>,
    pub service_id: i64,
    pub service_type: String,
    pub problem_description: String,
    pub customer_location: String,
    pub price_rwf: String,
    pub duration_minutes: i64,
    pub scheduled_date: Option<String>,
    pub customer_notes: Option<String>,
    pub technician_notes: Option<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
    pub confirmed_at: Option<String>,
    pub scheduled_at: Option<String>,
    pub completed_at: Option<String>,
    pub cancelled_at: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct TechnicianDetailRow {
    pub user_id: String,
    pub specialization: String,
    pub hourly_rate_rwf: i64,
    pub is_available: bool,
    pub updated_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ServiceRow {
    pub id: i64,
    pub service_name: String,
    pub description: String,
    pub base_price_rwf: i64,
    pub duration_minutes: i64,
    pub active: i64,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ActivityRow {
    pub kind: String,
    pub message: String,
    pub created_at: String,
}
