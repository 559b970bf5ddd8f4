//! Overdue detection: a recurring scan that drives appointments past their
//! cutoff through the engine's `mark_overdue`.
//!
//! The detector keeps no memory of processed ids. Correctness under
//! concurrent replicas rests entirely on the engine's conditional update,
//! so any number of detector processes can scan the same rows.

use chrono::{DateTime, FixedOffset, Local, Offset, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::lifecycle::engine::{LifecycleEngine, SystemAuthority};
use crate::lifecycle::types::LifecycleError;
use crate::shutdown::ShutdownHandle;
use crate::store::AppointmentStore;

/// Where the overdue threshold falls: a fixed hour of the appointment's
/// calendar day, evaluated in a fixed local offset.
#[derive(Debug, Clone, Copy)]
pub struct CutoffPolicy {
    pub cutoff_hour: u32,
    pub utc_offset_minutes: i32,
}

impl Default for CutoffPolicy {
    fn default() -> Self {
        Self {
            cutoff_hour: 17,
            utc_offset_minutes: 0,
        }
    }
}

impl CutoffPolicy {
    /// Cutoff policy using the host's local offset.
    pub fn local(cutoff_hour: u32) -> Self {
        Self {
            cutoff_hour,
            utc_offset_minutes: Local::now().offset().fix().local_minus_utc() / 60,
        }
    }

    /// The instant after which a pending appointment scheduled at
    /// `scheduled_at` counts as overdue.
    pub fn cutoff_for(&self, scheduled_at: DateTime<Utc>) -> DateTime<Utc> {
        let offset = FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());
        let local_day = scheduled_at.with_timezone(&offset).date_naive();
        let cutoff_naive = local_day
            .and_hms_opt(self.cutoff_hour.min(23), 0, 0)
            .unwrap();
        offset
            .from_local_datetime(&cutoff_naive)
            .unwrap()
            .with_timezone(&Utc)
    }
}

#[derive(Debug, Default)]
pub struct ScanReport {
    pub examined: usize,
    pub marked: Vec<Uuid>,
    pub skipped: usize,
    pub failed: usize,
}

pub struct OverdueDetector {
    engine: Arc<LifecycleEngine>,
    appointments: AppointmentStore,
    policy: CutoffPolicy,
    authority: SystemAuthority,
}

impl OverdueDetector {
    pub fn new(
        engine: Arc<LifecycleEngine>,
        appointments: AppointmentStore,
        policy: CutoffPolicy,
    ) -> Self {
        Self {
            engine,
            appointments,
            policy,
            authority: SystemAuthority::issue(),
        }
    }

    /// One pass over the non-terminal appointments. Per-appointment errors
    /// are logged and swallowed so one malformed record cannot halt the
    /// scan.
    pub async fn scan(&self, now: DateTime<Utc>) -> ScanReport {
        let mut report = ScanReport::default();

        let candidates = match self.appointments.list_overdue_candidates().await {
            Ok(candidates) => candidates,
            Err(error) => {
                warn!(error = %error, "overdue scan could not list candidates");
                return report;
            }
        };

        for appointment in candidates {
            report.examined += 1;

            let cutoff = self.policy.cutoff_for(appointment.scheduled_at);
            if now <= cutoff {
                report.skipped += 1;
                continue;
            }

            match self
                .engine
                .mark_overdue(appointment.id, now, &self.authority)
                .await
            {
                Ok(_) => report.marked.push(appointment.id),
                Err(LifecycleError::Conflict { id }) => {
                    // Another caller moved the appointment first; nothing
                    // left to do here.
                    debug!(appointment.id = %id, "lost mark-overdue race");
                    report.skipped += 1;
                }
                Err(error) => {
                    warn!(
                        appointment.id = %appointment.id,
                        error = %error,
                        "failed to mark appointment overdue"
                    );
                    report.failed += 1;
                }
            }
        }

        info!(
            examined = report.examined,
            marked = report.marked.len(),
            skipped = report.skipped,
            failed = report.failed,
            "overdue scan complete"
        );
        report
    }

    /// Scan on a fixed interval until shutdown. The cadence is a
    /// deployment parameter, not a correctness requirement.
    pub async fn run(&self, interval: Duration, mut shutdown: ShutdownHandle) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!(interval_seconds = interval.as_secs(), "overdue detector running");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.scan(Utc::now()).await;
                }
                _ = shutdown.wait() => {
                    info!("overdue detector stopping");
                    break;
                }
            }
        }
    }
}
