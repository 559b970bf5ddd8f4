//! Engine-level tests that need crate-private capabilities (the
//! `SystemAuthority` token). Full scenario coverage lives in `tests/`.

use chrono::{TimeZone, Utc};
use std::sync::Arc;
use uuid::Uuid;

use super::engine::{EngineSettings, LifecycleEngine, SystemAuthority};
use super::types::{AppointmentKind, AppointmentStatus, LifecycleError, NewAppointment};
use crate::database::Database;
use crate::finalization::{FinalizeOptions, FinalizePayload};
use crate::overdue::CutoffPolicy;
use crate::store::AppointmentStore;

struct Harness {
    _dir: tempfile::TempDir,
    engine: Arc<LifecycleEngine>,
    appointments: AppointmentStore,
}

async fn harness() -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}/engine-tests.db", dir.path().display());
    let database = Database::connect(&url, 5, true).await.expect("connect");

    let settings = EngineSettings {
        minutes_family: "MIN".to_string(),
        cutoff: CutoffPolicy {
            cutoff_hour: 17,
            utc_offset_minutes: 0,
        },
        side_effect_timeout: std::time::Duration::from_secs(5),
    };
    let engine = Arc::new(LifecycleEngine::new(database.pool().clone(), settings));
    let appointments = AppointmentStore::new(database.pool().clone());

    Harness {
        _dir: dir,
        engine,
        appointments,
    }
}

async fn schedule(harness: &Harness, year: i32, month: u32, day: u32, hour: u32) -> Uuid {
    let appointment = harness
        .engine
        .schedule(NewAppointment {
            workshop_id: Uuid::new_v4(),
            consultant_id: Uuid::new_v4(),
            kind: AppointmentKind::MonthlyFollowup,
            scheduled_at: Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap(),
            planned_minutes: 60,
            agenda: vec!["cash flow review".to_string()],
        })
        .await
        .expect("schedule");
    appointment.id
}

#[tokio::test]
async fn mark_overdue_moves_a_pending_appointment_past_cutoff() {
    let h = harness().await;
    let id = schedule(&h, 2024, 3, 1, 10).await;
    let authority = SystemAuthority::issue();

    let now = Utc.with_ymd_and_hms(2024, 3, 1, 18, 0, 0).unwrap();
    let updated = h.engine.mark_overdue(id, now, &authority).await.unwrap();
    assert_eq!(updated.status, AppointmentStatus::Overdue);

    let stored = h.appointments.get(id).await.unwrap().unwrap();
    assert_eq!(stored.status, AppointmentStatus::Overdue);
}

#[tokio::test]
async fn mark_overdue_rejects_before_cutoff() {
    let h = harness().await;
    let id = schedule(&h, 2024, 3, 1, 10).await;
    let authority = SystemAuthority::issue();

    let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let error = h.engine.mark_overdue(id, now, &authority).await.unwrap_err();
    assert!(matches!(error, LifecycleError::Validation { .. }));

    let stored = h.appointments.get(id).await.unwrap().unwrap();
    assert_eq!(stored.status, AppointmentStatus::Scheduled);
}

#[tokio::test]
async fn mark_overdue_is_a_noop_on_already_overdue() {
    let h = harness().await;
    let id = schedule(&h, 2024, 3, 1, 10).await;
    let authority = SystemAuthority::issue();
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 18, 0, 0).unwrap();

    h.engine.mark_overdue(id, now, &authority).await.unwrap();
    let second = h.engine.mark_overdue(id, now, &authority).await.unwrap();
    assert_eq!(second.status, AppointmentStatus::Overdue);
}

#[tokio::test]
async fn mark_overdue_is_a_noop_on_completed() {
    let h = harness().await;
    let id = schedule(&h, 2024, 3, 1, 10).await;
    let authority = SystemAuthority::issue();

    let payload = FinalizePayload {
        notes: "delivered".to_string(),
        decisions: vec![],
        next_steps: None,
        ended_at: Utc.with_ymd_and_hms(2024, 3, 1, 11, 0, 0).unwrap(),
    };
    h.engine
        .finalize(
            id,
            payload,
            FinalizeOptions {
                generate_minutes: false,
                notify_client: false,
            },
        )
        .await
        .unwrap();

    let now = Utc.with_ymd_and_hms(2024, 3, 1, 18, 0, 0).unwrap();
    let result = h.engine.mark_overdue(id, now, &authority).await.unwrap();
    assert_eq!(result.status, AppointmentStatus::Completed);
}

#[tokio::test]
async fn mark_overdue_rejects_an_in_progress_session() {
    let h = harness().await;
    let id = schedule(&h, 2024, 3, 1, 10).await;
    let authority = SystemAuthority::issue();

    h.engine
        .start(id, Utc.with_ymd_and_hms(2024, 3, 1, 10, 5, 0).unwrap())
        .await
        .unwrap();

    let now = Utc.with_ymd_and_hms(2024, 3, 1, 18, 0, 0).unwrap();
    let error = h.engine.mark_overdue(id, now, &authority).await.unwrap_err();
    assert!(matches!(error, LifecycleError::InvalidTransition { .. }));
}

#[tokio::test]
async fn actual_start_is_only_set_by_passing_through_in_progress() {
    let h = harness().await;

    // Skip-start finalization: completed, but never in progress.
    let skipped = schedule(&h, 2024, 3, 1, 10).await;
    h.engine
        .finalize(
            skipped,
            FinalizePayload {
                notes: "recovered by operator".to_string(),
                decisions: vec![],
                next_steps: None,
                ended_at: Utc.with_ymd_and_hms(2024, 3, 1, 11, 0, 0).unwrap(),
            },
            FinalizeOptions {
                generate_minutes: false,
                notify_client: false,
            },
        )
        .await
        .unwrap();
    let stored = h.appointments.get(skipped).await.unwrap().unwrap();
    assert_eq!(stored.status, AppointmentStatus::Completed);
    assert!(stored.actual_start.is_none());
    assert!(stored.actual_minutes.is_none());
    assert!(stored.completed_at.is_some());

    // Started session records the start instant.
    let started = schedule(&h, 2024, 3, 2, 10).await;
    let at = Utc.with_ymd_and_hms(2024, 3, 2, 10, 0, 0).unwrap();
    h.engine.start(started, at).await.unwrap();
    let stored = h.appointments.get(started).await.unwrap().unwrap();
    assert_eq!(stored.actual_start, Some(at));
}

#[tokio::test]
async fn completed_at_is_only_set_on_completion() {
    let h = harness().await;
    let id = schedule(&h, 2024, 3, 1, 10).await;

    h.engine.confirm(id).await.unwrap();
    let stored = h.appointments.get(id).await.unwrap().unwrap();
    assert!(stored.completed_at.is_none());

    let ended = Utc.with_ymd_and_hms(2024, 3, 1, 11, 0, 0).unwrap();
    h.engine
        .finalize(
            id,
            FinalizePayload {
                notes: "done".to_string(),
                decisions: vec![],
                next_steps: None,
                ended_at: ended,
            },
            FinalizeOptions {
                generate_minutes: false,
                notify_client: false,
            },
        )
        .await
        .unwrap();
    let stored = h.appointments.get(id).await.unwrap().unwrap();
    assert_eq!(stored.completed_at, Some(ended));
}
