//! Booking-status workflow. Pure: `transition` validates a requested status
//! change against the current row and computes the next persisted values;
//! the caller writes them. Nothing here touches the database.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{BookingRow, BookingStatus};
use crate::policy;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Invalid status '{0}'. Must be one of: pending, confirmed, scheduled, in_progress, completed, cancelled, expired")]
    InvalidStatus(String),
    #[error("Only the assigned technician may update this booking; the customer may only cancel it")]
    Unauthorized,
    #[error("Booking is already {0} and can no longer change status")]
    AlreadyFinalized(BookingStatus),
    #[error("Booking status is {actual}, not {expected}; refresh and retry")]
    StaleStatus {
        expected: BookingStatus,
        actual: BookingStatus,
    },
}

#[derive(Debug, Clone)]
pub struct TransitionRequest<'a> {
    pub requested_status: &'a str,
    pub notes: Option<&'a str>,
    /// Optimistic-concurrency token: the status the caller last observed.
    /// When supplied and no longer matching the stored row, the write is
    /// rejected instead of silently overwriting a concurrent update.
    pub expected_status: Option<&'a str>,
    pub actor_id: &'a str,
}

/// The fully computed next record for a booking. Every field the status
/// update may touch is present so the persistence step is a single UPDATE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextBookingState {
    pub status: BookingStatus,
    pub technician_notes: Option<String>,
    pub updated_at: String,
    pub confirmed_at: Option<String>,
    pub scheduled_at: Option<String>,
    pub completed_at: Option<String>,
    pub cancelled_at: Option<String>,
}

/// Validate and compute a status transition.
///
/// Checks run in order: status parse, actor authorization, terminal guard,
/// staleness. Any non-terminal status may move to any valid target; there
/// is deliberately no predecessor graph beyond the terminal guard.
/// Status timestamps are set the first time their status is reached and
/// never overwritten; technician notes are last-write-wins.
pub fn transition(
    booking: &BookingRow,
    request: &TransitionRequest<'_>,
    now: DateTime<Utc>,
) -> Result<NextBookingState, WorkflowError> {
    let target = BookingStatus::parse(request.requested_status)
        .ok_or_else(|| WorkflowError::InvalidStatus(request.requested_status.to_string()))?;

    if !policy::may_transition(
        &booking.customer_id,
        booking.technician_id.as_deref(),
        request.actor_id,
        target,
    ) {
        return Err(WorkflowError::Unauthorized);
    }

    let current = BookingStatus::parse(&booking.status)
        .ok_or_else(|| WorkflowError::InvalidStatus(booking.status.clone()))?;

    if current.is_terminal() {
        return Err(WorkflowError::AlreadyFinalized(current));
    }

    if let Some(expected) = request.expected_status {
        let expected = BookingStatus::parse(expected)
            .ok_or_else(|| WorkflowError::InvalidStatus(expected.to_string()))?;
        if expected != current {
            return Err(WorkflowError::StaleStatus {
                expected,
                actual: current,
            });
        }
    }

    let stamp = now.to_rfc3339();
    let set_once = |existing: &Option<String>, status: BookingStatus| {
        existing
            .clone()
            .or_else(|| (target == status).then(|| stamp.clone()))
    };

    Ok(NextBookingState {
        status: target,
        technician_notes: request
            .notes
            .map(str::to_string)
            .or_else(|| booking.technician_notes.clone()),
        updated_at: stamp.clone(),
        confirmed_at: set_once(&booking.confirmed_at, BookingStatus::Confirmed),
        scheduled_at: set_once(&booking.scheduled_at, BookingStatus::Scheduled),
        completed_at: set_once(&booking.completed_at, BookingStatus::Completed),
        cancelled_at: set_once(&booking.cancelled_at, BookingStatus::Cancelled),
    })
}

/// A technician may only toggle their own availability flag.
pub fn authorize_availability(technician_user_id: &str, actor_id: &str) -> Result<(), WorkflowError> {
    if technician_user_id == actor_id {
        Ok(())
    } else {
        Err(WorkflowError::Unauthorized)
    }
}
