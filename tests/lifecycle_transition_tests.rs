//! Appointment lifecycle transition tests.
//!
//! These verify that status only moves along defined edges, that
//! validation rejects without mutating, and that the full happy path
//! (confirm -> start -> finalize) produces the expected instants,
//! duration, minutes draft, and queued notifications.

mod fixtures;

use cadence::{
    AppointmentStatus, FinalizeOptions, FinalizePayload, LifecycleError, MinutesKind,
    MinutesStatus, TemplateId,
};
use fixtures::{at, TestHarness};

fn payload(notes: &str, ended_at: chrono::DateTime<chrono::Utc>) -> FinalizePayload {
    FinalizePayload {
        notes: notes.to_string(),
        decisions: vec!["hire a second mechanic".to_string()],
        next_steps: Some("send onboarding checklist".to_string()),
        ended_at,
    }
}

fn quiet() -> FinalizeOptions {
    FinalizeOptions {
        generate_minutes: false,
        notify_client: false,
    }
}

#[tokio::test]
async fn confirm_start_finalize_happy_path() {
    let h = TestHarness::new().await;
    let workshop = h.seed_workshop("Oak Street Auto").await;
    let appointment = h.schedule_for(workshop.id, at(2024, 3, 1, 10, 0)).await;

    let confirmed = h.engine.confirm(appointment.id).await.unwrap();
    assert_eq!(confirmed.status, AppointmentStatus::Confirmed);

    let started_at = at(2024, 3, 1, 10, 0);
    let started = h.engine.start(appointment.id, started_at).await.unwrap();
    assert_eq!(started.status, AppointmentStatus::InProgress);
    assert_eq!(started.actual_start, Some(started_at));

    let outcome = h
        .engine
        .finalize(
            appointment.id,
            payload("session delivered", at(2024, 3, 1, 11, 0)),
            FinalizeOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.appointment.status, AppointmentStatus::Completed);
    assert_eq!(outcome.appointment.actual_minutes, Some(60));
    assert!(outcome.warnings.is_empty());

    // A draft minutes document references the appointment...
    let minutes = outcome.minutes.expect("minutes draft");
    assert_eq!(minutes.kind, MinutesKind::Session);
    assert_eq!(minutes.status, MinutesStatus::Draft);
    assert_eq!(minutes.appointment_id, appointment.id);

    // ...and the appointment carries the back-reference.
    let stored = h.appointments.get(appointment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, AppointmentStatus::Completed);
    assert_eq!(stored.minutes_document_id, Some(minutes.id));
    assert_eq!(stored.actual_minutes, Some(60));

    // The client notification and survey are queued.
    let queued = h.outbox.all().await.unwrap();
    let templates: Vec<TemplateId> = queued.iter().map(|m| m.template).collect();
    assert!(templates.contains(&TemplateId::SessionCompleted));
    assert!(templates.contains(&TemplateId::SatisfactionSurvey));
}

#[tokio::test]
async fn confirm_is_rejected_off_the_scheduled_state() {
    let h = TestHarness::new().await;
    let appointment = h.schedule_at(at(2024, 3, 1, 10, 0)).await;

    h.engine.confirm(appointment.id).await.unwrap();
    let error = h.engine.confirm(appointment.id).await.unwrap_err();
    assert!(matches!(
        error,
        LifecycleError::InvalidTransition {
            from: AppointmentStatus::Confirmed,
            ..
        }
    ));

    // Status untouched by the rejected transition.
    let stored = h.appointments.get(appointment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, AppointmentStatus::Confirmed);
}

#[tokio::test]
async fn start_is_rejected_after_completion() {
    let h = TestHarness::new().await;
    let appointment = h.schedule_at(at(2024, 3, 1, 10, 0)).await;

    h.engine
        .finalize(
            appointment.id,
            payload("wrapped up", at(2024, 3, 1, 11, 0)),
            quiet(),
        )
        .await
        .unwrap();

    let error = h
        .engine
        .start(appointment.id, at(2024, 3, 1, 12, 0))
        .await
        .unwrap_err();
    assert!(matches!(error, LifecycleError::InvalidTransition { .. }));
}

#[tokio::test]
async fn finalize_requires_consultant_notes() {
    let h = TestHarness::new().await;
    let appointment = h.schedule_at(at(2024, 3, 1, 10, 0)).await;

    for notes in ["", "   ", "\n\t"] {
        let error = h
            .engine
            .finalize(
                appointment.id,
                FinalizePayload {
                    notes: notes.to_string(),
                    decisions: vec![],
                    next_steps: None,
                    ended_at: at(2024, 3, 1, 11, 0),
                },
                quiet(),
            )
            .await
            .unwrap_err();
        assert!(matches!(error, LifecycleError::Validation { .. }));
    }

    // Rejection left the appointment untouched.
    let stored = h.appointments.get(appointment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, AppointmentStatus::Scheduled);
    assert!(stored.completed_at.is_none());
}

#[tokio::test]
async fn finalize_tolerates_a_skipped_start() {
    let h = TestHarness::new().await;
    let appointment = h.schedule_at(at(2024, 3, 1, 10, 0)).await;
    h.engine.confirm(appointment.id).await.unwrap();

    // Operator never pressed start; completion still lands.
    let outcome = h
        .engine
        .finalize(
            appointment.id,
            payload("delivered without start", at(2024, 3, 1, 11, 30)),
            quiet(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.appointment.status, AppointmentStatus::Completed);
    assert!(outcome.appointment.actual_start.is_none());
    assert!(outcome.appointment.actual_minutes.is_none());
    assert_eq!(outcome.appointment.completed_at, Some(at(2024, 3, 1, 11, 30)));
}

#[tokio::test]
async fn finalize_is_rejected_on_terminal_statuses() {
    let h = TestHarness::new().await;
    let appointment = h.schedule_at(at(2024, 3, 1, 10, 0)).await;

    h.engine
        .finalize(
            appointment.id,
            payload("first pass", at(2024, 3, 1, 11, 0)),
            quiet(),
        )
        .await
        .unwrap();

    let error = h
        .engine
        .finalize(
            appointment.id,
            payload("second pass", at(2024, 3, 1, 12, 0)),
            quiet(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        LifecycleError::InvalidTransition {
            from: AppointmentStatus::Completed,
            ..
        }
    ));

    // The first completion's content is untouched.
    let stored = h.appointments.get(appointment.id).await.unwrap().unwrap();
    assert_eq!(stored.notes.as_deref(), Some("first pass"));
}

#[tokio::test]
async fn start_is_allowed_from_every_non_terminal_pre_session_status() {
    let h = TestHarness::new().await;

    // scheduled -> in-progress
    let a = h.schedule_at(at(2024, 3, 1, 10, 0)).await;
    assert!(h.engine.start(a.id, at(2024, 3, 1, 10, 0)).await.is_ok());

    // confirmed -> in-progress
    let b = h.schedule_at(at(2024, 3, 2, 10, 0)).await;
    h.engine.confirm(b.id).await.unwrap();
    assert!(h.engine.start(b.id, at(2024, 3, 2, 10, 0)).await.is_ok());

    // overdue -> in-progress (session happens late)
    let c = h.schedule_at(at(2024, 3, 3, 10, 0)).await;
    let detector = h.detector();
    detector.scan(at(2024, 3, 3, 18, 0)).await;
    let stored = h.appointments.get(c.id).await.unwrap().unwrap();
    assert_eq!(stored.status, AppointmentStatus::Overdue);
    assert!(h.engine.start(c.id, at(2024, 3, 3, 19, 0)).await.is_ok());
}
