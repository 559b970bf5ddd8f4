//! Shared harness for integration suites: a per-test SQLite database with
//! migrations applied, an engine wired with a deterministic UTC cutoff
//! policy, and helpers for seeding appointments and workshop contacts.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

use cadence::{
    Appointment, AppointmentKind, AppointmentStore, CachedSqliteDirectory, ClientContact,
    CutoffPolicy, Database, EngineSettings, LifecycleEngine, MinutesStore, NewAppointment,
    NotificationOutbox, OverdueDetector, SequenceGenerator,
};

pub struct TestHarness {
    _dir: TempDir,
    pub database: Database,
    pub engine: Arc<LifecycleEngine>,
    pub appointments: AppointmentStore,
    pub minutes: MinutesStore,
    pub sequences: SequenceGenerator,
    pub outbox: NotificationOutbox,
    pub directory: Arc<CachedSqliteDirectory>,
}

impl TestHarness {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = format!("sqlite://{}/cadence-test.db", dir.path().display());
        let database = Database::connect(&url, 5, true).await.expect("connect");
        let pool = database.pool().clone();

        let settings = EngineSettings {
            minutes_family: "MIN".to_string(),
            cutoff: CutoffPolicy {
                cutoff_hour: 17,
                utc_offset_minutes: 0,
            },
            side_effect_timeout: std::time::Duration::from_secs(5),
        };

        TestHarness {
            _dir: dir,
            engine: Arc::new(LifecycleEngine::new(pool.clone(), settings)),
            appointments: AppointmentStore::new(pool.clone()),
            minutes: MinutesStore::new(pool.clone()),
            sequences: SequenceGenerator::new(pool.clone()),
            outbox: NotificationOutbox::new(pool.clone()),
            directory: Arc::new(CachedSqliteDirectory::new(pool)),
            database,
        }
    }

    /// Detector wired with the same UTC cutoff policy as the engine.
    pub fn detector(&self) -> OverdueDetector {
        OverdueDetector::new(
            self.engine.clone(),
            self.appointments.clone(),
            CutoffPolicy {
                cutoff_hour: 17,
                utc_offset_minutes: 0,
            },
        )
    }

    pub async fn schedule_at(&self, scheduled_at: DateTime<Utc>) -> Appointment {
        self.schedule_for(Uuid::new_v4(), scheduled_at).await
    }

    pub async fn schedule_for(
        &self,
        workshop_id: Uuid,
        scheduled_at: DateTime<Utc>,
    ) -> Appointment {
        self.engine
            .schedule(NewAppointment {
                workshop_id,
                consultant_id: Uuid::new_v4(),
                kind: AppointmentKind::MonthlyFollowup,
                scheduled_at,
                planned_minutes: 60,
                agenda: vec!["cash flow review".to_string()],
            })
            .await
            .expect("schedule appointment")
    }

    pub async fn seed_workshop(&self, name: &str) -> ClientContact {
        let contact = ClientContact {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: Some(format!("{}@example.com", name.to_lowercase().replace(' ', "."))),
            phone: Some("+1-555-0100".to_string()),
        };
        self.directory.upsert(&contact).await.expect("seed workshop");
        contact
    }
}

pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0).unwrap()
}
