//! The legality table for appointment status transitions.
//!
//! Authoritative state lives in the appointment store; this module only
//! answers whether an edge exists. Every engine operation consults it
//! before attempting the conditional write.

use super::types::AppointmentStatus;

use AppointmentStatus::{
    Canceled, Completed, Confirmed, InProgress, Overdue, Rescheduled, Scheduled,
};

/// Whether a direct edge `from -> to` exists in the status machine.
pub fn allowed(from: AppointmentStatus, to: AppointmentStatus) -> bool {
    match (from, to) {
        // Happy path
        (Scheduled, Confirmed) => true,
        (Scheduled | Confirmed | Rescheduled | Overdue, InProgress) => true,
        // Finalization tolerates operators skipping `start`: any
        // non-terminal status may complete.
        (Scheduled | Confirmed | InProgress | Rescheduled | Overdue, Completed) => true,
        // Time-driven
        (Scheduled | Confirmed | Rescheduled, Overdue) => true,
        // Manual reschedule
        (Scheduled | Confirmed | Overdue, Rescheduled) => true,
        // Manual cancellation, terminal
        (Scheduled | Confirmed, Canceled) => true,
        _ => false,
    }
}

/// Source statuses from which an appointment may be confirmed.
pub fn can_confirm(from: AppointmentStatus) -> bool {
    from == Scheduled
}

pub fn can_start(from: AppointmentStatus) -> bool {
    allowed(from, InProgress)
}

pub fn can_finalize(from: AppointmentStatus) -> bool {
    !from.is_terminal()
}

/// Source statuses accepted by the reschedule/cancellation workflow.
pub fn can_reschedule(from: AppointmentStatus) -> bool {
    matches!(from, Scheduled | Confirmed | Overdue)
}

pub fn can_cancel(from: AppointmentStatus) -> bool {
    allowed(from, Canceled)
}

/// Source statuses the overdue detector may act on.
pub fn overdue_sources() -> [AppointmentStatus; 3] {
    [Scheduled, Confirmed, Rescheduled]
}
