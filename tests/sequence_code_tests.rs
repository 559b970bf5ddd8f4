//! Minutes code sequencing: fixed textual form, monotonicity, and
//! per-family isolation.

mod fixtures;

use fixtures::TestHarness;

#[tokio::test]
async fn codes_follow_the_prefixed_zero_padded_form() {
    let h = TestHarness::new().await;

    assert_eq!(h.sequences.next_code("MIN").await.unwrap(), "MIN.0001");
    assert_eq!(h.sequences.next_code("MIN").await.unwrap(), "MIN.0002");
    assert_eq!(h.sequences.next_code("MIN").await.unwrap(), "MIN.0003");
}

#[tokio::test]
async fn ordinals_increase_strictly_in_assignment_order() {
    let h = TestHarness::new().await;

    let mut previous = 0;
    for _ in 0..20 {
        let ordinal = h.sequences.next_ordinal("MIN").await.unwrap();
        assert!(ordinal > previous);
        previous = ordinal;
    }
}

#[tokio::test]
async fn families_count_independently() {
    let h = TestHarness::new().await;

    assert_eq!(h.sequences.next_code("MIN").await.unwrap(), "MIN.0001");
    assert_eq!(h.sequences.next_code("RPT").await.unwrap(), "RPT.0001");
    assert_eq!(h.sequences.next_code("MIN").await.unwrap(), "MIN.0002");
    assert_eq!(h.sequences.next_code("RPT").await.unwrap(), "RPT.0002");
}

#[tokio::test]
async fn codes_assigned_across_lifecycle_events_share_one_ordering() {
    let h = TestHarness::new().await;
    let first = h.schedule_at(fixtures::at(2024, 3, 1, 10, 0)).await;
    let second = h.schedule_at(fixtures::at(2024, 3, 2, 10, 0)).await;

    // A reschedule record and a session record draw from the same family.
    h.engine
        .reschedule(
            first.id,
            cadence::RescheduleRequest {
                new_when: Some(fixtures::at(2024, 3, 9, 10, 0)),
                outcome: cadence::OutcomeCode::CanceledByCompanyRescheduled,
                liability: cadence::Liability::Company,
                reason: cadence::ReasonCode::CompanyConsultantUnavailable,
                note: None,
            },
        )
        .await
        .unwrap();

    let outcome = h
        .engine
        .finalize(
            second.id,
            cadence::FinalizePayload {
                notes: "delivered".to_string(),
                decisions: vec![],
                next_steps: None,
                ended_at: fixtures::at(2024, 3, 2, 11, 0),
            },
            cadence::FinalizeOptions {
                generate_minutes: true,
                notify_client: false,
            },
        )
        .await
        .unwrap();

    let reschedule_docs = h.minutes.list_for_appointment(first.id).await.unwrap();
    assert_eq!(reschedule_docs[0].code, "MIN.0001");
    assert_eq!(outcome.minutes.unwrap().code, "MIN.0002");
}
