// Cadence Library - Consulting Appointment Lifecycle Engine
// This exposes the core components for testing and integration

pub mod config;
pub mod database;
pub mod directory;
pub mod finalization;
pub mod lifecycle;
pub mod minutes;
pub mod notify;
pub mod overdue;
pub mod render;
pub mod reschedule;
pub mod shutdown;
pub mod store;
pub mod telemetry;

// Re-export key types for easy access
pub use config::{config, init_config, CadenceConfig};
pub use database::Database;
pub use directory::{CachedSqliteDirectory, ClientContact, ClientDirectory, DirectoryError};
pub use finalization::{
    FinalizationOrchestrator, FinalizationReport, FinalizeOptions, FinalizePayload,
    SideEffectWarning,
};
pub use lifecycle::{
    ActionItem, Appointment, AppointmentKind, AppointmentStatus, EngineSettings, FinalizeOutcome,
    LifecycleEngine, LifecycleError, NewAppointment, RescheduleOutcome,
};
pub use minutes::{Commitment, MinutesDocument, MinutesKind, MinutesStatus};
pub use notify::{
    DrainReport, NotificationChannel, NotificationOutbox, NotifyError, OutboxDispatcher,
    OutboxMessage, OutboxStatus, TemplateId, TracingChannel,
};
pub use overdue::{CutoffPolicy, OverdueDetector, ScanReport};
pub use render::{DocumentRenderer, RenderError, RenderedDocument, TextRenderer};
pub use reschedule::{audit_narrative, Liability, OutcomeCode, ReasonCode, RescheduleRequest};
pub use shutdown::{ShutdownCoordinator, ShutdownHandle};
pub use store::{AppointmentStore, MinutesStore, SequenceGenerator, StoreError};
pub use telemetry::{generate_correlation_id, init_telemetry, shutdown_telemetry};
