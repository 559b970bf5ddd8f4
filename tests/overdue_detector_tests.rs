//! Overdue detector scan behavior.
//!
//! The detector must be safely re-runnable and replica-safe: it carries no
//! memory of processed ids, and correctness rests on the engine's
//! conditional update.

mod fixtures;

use cadence::AppointmentStatus;
use fixtures::{at, TestHarness};

#[tokio::test]
async fn pending_appointment_past_cutoff_becomes_overdue() {
    let h = TestHarness::new().await;
    // Scheduled 2024-03-01T10:00 with no further action; detector runs at
    // 18:00 the same day.
    let appointment = h.schedule_at(at(2024, 3, 1, 10, 0)).await;

    let report = h.detector().scan(at(2024, 3, 1, 18, 0)).await;
    assert_eq!(report.marked, vec![appointment.id]);
    assert_eq!(report.failed, 0);

    let stored = h.appointments.get(appointment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, AppointmentStatus::Overdue);
}

#[tokio::test]
async fn appointment_before_cutoff_is_left_alone() {
    let h = TestHarness::new().await;
    let appointment = h.schedule_at(at(2024, 3, 1, 10, 0)).await;

    // 16:59 local: one minute before the 17:00 cutoff.
    let report = h.detector().scan(at(2024, 3, 1, 16, 59)).await;
    assert!(report.marked.is_empty());
    assert_eq!(report.skipped, 1);

    let stored = h.appointments.get(appointment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, AppointmentStatus::Scheduled);
}

#[tokio::test]
async fn confirmed_and_rescheduled_appointments_are_candidates() {
    let h = TestHarness::new().await;

    let confirmed = h.schedule_at(at(2024, 3, 1, 10, 0)).await;
    h.engine.confirm(confirmed.id).await.unwrap();

    let rescheduled = h.schedule_at(at(2024, 2, 20, 10, 0)).await;
    h.engine
        .reschedule(
            rescheduled.id,
            cadence::RescheduleRequest {
                new_when: Some(at(2024, 3, 1, 9, 0)),
                outcome: cadence::OutcomeCode::CanceledByCompanyRescheduled,
                liability: cadence::Liability::Company,
                reason: cadence::ReasonCode::CompanyConsultantUnavailable,
                note: None,
            },
        )
        .await
        .unwrap();

    let report = h.detector().scan(at(2024, 3, 1, 18, 0)).await;
    assert_eq!(report.marked.len(), 2);

    for id in [confirmed.id, rescheduled.id] {
        let stored = h.appointments.get(id).await.unwrap().unwrap();
        assert_eq!(stored.status, AppointmentStatus::Overdue);
    }
}

#[tokio::test]
async fn sessions_that_ran_are_never_marked() {
    let h = TestHarness::new().await;

    let in_progress = h.schedule_at(at(2024, 3, 1, 10, 0)).await;
    h.engine
        .start(in_progress.id, at(2024, 3, 1, 10, 0))
        .await
        .unwrap();

    let completed = h.schedule_at(at(2024, 3, 1, 11, 0)).await;
    h.engine
        .finalize(
            completed.id,
            cadence::FinalizePayload {
                notes: "done".to_string(),
                decisions: vec![],
                next_steps: None,
                ended_at: at(2024, 3, 1, 12, 0),
            },
            cadence::FinalizeOptions {
                generate_minutes: false,
                notify_client: false,
            },
        )
        .await
        .unwrap();

    let report = h.detector().scan(at(2024, 3, 1, 18, 0)).await;
    assert!(report.marked.is_empty());

    assert_eq!(
        h.appointments
            .get(in_progress.id)
            .await
            .unwrap()
            .unwrap()
            .status,
        AppointmentStatus::InProgress
    );
    assert_eq!(
        h.appointments
            .get(completed.id)
            .await
            .unwrap()
            .unwrap()
            .status,
        AppointmentStatus::Completed
    );
}

#[tokio::test]
async fn rerunning_the_scan_is_idempotent() {
    let h = TestHarness::new().await;
    let appointment = h.schedule_at(at(2024, 3, 1, 10, 0)).await;
    let detector = h.detector();

    let first = detector.scan(at(2024, 3, 1, 18, 0)).await;
    assert_eq!(first.marked.len(), 1);

    // Already-overdue appointments are not candidates on a rerun; nothing
    // to mark, nothing failed. A second detector replica scanning the same
    // rows behaves identically.
    let second = detector.scan(at(2024, 3, 1, 18, 5)).await;
    assert!(second.marked.is_empty());
    assert_eq!(second.failed, 0);

    let stored = h.appointments.get(appointment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, AppointmentStatus::Overdue);
}

#[tokio::test]
async fn scan_covers_each_appointment_independently() {
    let h = TestHarness::new().await;
    let due = h.schedule_at(at(2024, 3, 1, 10, 0)).await;
    let not_due = h.schedule_at(at(2024, 3, 2, 10, 0)).await;

    let report = h.detector().scan(at(2024, 3, 1, 18, 0)).await;
    assert_eq!(report.examined, 2);
    assert_eq!(report.marked, vec![due.id]);
    assert_eq!(report.skipped, 1);

    assert_eq!(
        h.appointments.get(not_due.id).await.unwrap().unwrap().status,
        AppointmentStatus::Scheduled
    );
}
