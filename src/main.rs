use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use cadence::{
    config::CadenceConfig, AppointmentKind, AppointmentStatus, CachedSqliteDirectory, ClientContact,
    ClientDirectory, Database, DocumentRenderer, EngineSettings, FinalizeOptions, FinalizePayload,
    Liability, LifecycleEngine, MinutesStore, NewAppointment, NotificationOutbox, OutboxDispatcher,
    OutcomeCode, OverdueDetector, ReasonCode, RescheduleRequest, ShutdownCoordinator, TextRenderer,
    TracingChannel,
};
use cadence::store::AppointmentStore;

#[derive(Parser)]
#[command(name = "cadence")]
#[command(about = "Consulting appointment lifecycle engine")]
#[command(long_about = "Cadence coordinates recurring consulting sessions between an advisory \
                       staff and client workshops: confirm, start, finalize, and reschedule \
                       appointments, with audit minutes and client notifications handled as \
                       post-commit side effects. Run 'cadence detector' to keep overdue \
                       detection and notification delivery running.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default cadence.toml and create the database
    Init {
        /// Overwrite an existing cadence.toml
        #[arg(long, help = "Overwrite existing configuration")]
        force: bool,
    },
    /// Put a new appointment on the calendar
    Schedule {
        /// Client workshop id
        #[arg(long)]
        workshop: Uuid,
        /// Consultant id
        #[arg(long)]
        consultant: Uuid,
        /// Session kind (e.g. monthly-followup, strategic-session, mentoring)
        #[arg(long, default_value = "monthly-followup")]
        kind: AppointmentKind,
        /// Scheduled instant, RFC 3339 (e.g. 2024-03-01T10:00:00Z)
        #[arg(long)]
        when: DateTime<Utc>,
        /// Planned duration in minutes
        #[arg(long, default_value = "60")]
        minutes: i64,
        /// Agenda item (repeatable)
        #[arg(long = "agenda")]
        agenda: Vec<String>,
    },
    /// Confirm a scheduled appointment
    Confirm {
        appointment: Uuid,
    },
    /// Start the session, recording the actual start instant
    Start {
        appointment: Uuid,
        /// Actual start, RFC 3339; defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Finalize the session: completes the appointment and triggers
    /// minutes generation and client notification
    Finalize {
        appointment: Uuid,
        /// Consultant notes (required; finalization is rejected without them)
        #[arg(long)]
        notes: String,
        /// Decision reached during the session (repeatable)
        #[arg(long = "decision")]
        decisions: Vec<String>,
        /// Agreed next steps
        #[arg(long)]
        next_steps: Option<String>,
        /// Actual end, RFC 3339; defaults to now
        #[arg(long)]
        ended_at: Option<DateTime<Utc>>,
        /// Skip minutes draft generation
        #[arg(long)]
        no_minutes: bool,
        /// Skip client notification and survey
        #[arg(long)]
        no_notify: bool,
    },
    /// Reschedule or cancel with liability attribution
    Reschedule {
        appointment: Uuid,
        /// Outcome code (e.g. canceled-by-client-rescheduled, no-show-client)
        #[arg(long)]
        outcome: OutcomeCode,
        /// Liability: client, company, or shared
        #[arg(long)]
        liability: Liability,
        /// Liability-scoped reason code (e.g. client-schedule-conflict)
        #[arg(long)]
        reason: ReasonCode,
        /// New occurrence instant, RFC 3339 (required for rescheduling outcomes)
        #[arg(long)]
        when: Option<DateTime<Utc>>,
        /// Free-text note for the audit record
        #[arg(long)]
        note: Option<String>,
    },
    /// Cancel without booking a new occurrence
    Cancel {
        appointment: Uuid,
        #[arg(long)]
        outcome: OutcomeCode,
        #[arg(long)]
        liability: Liability,
        #[arg(long)]
        reason: ReasonCode,
        #[arg(long)]
        note: Option<String>,
    },
    /// Display the appointment queue and status counts
    Status {
        /// Include terminal appointments
        #[arg(long, help = "Include completed and canceled appointments")]
        all: bool,
    },
    /// Run the overdue detector and notification dispatcher
    Detector {
        /// Run a single scan-and-drain pass and exit
        #[arg(long)]
        once: bool,
    },
    /// Work with minutes documents
    Minutes {
        #[command(subcommand)]
        command: MinutesCommands,
    },
    /// Manage workshop (client) contact records
    Workshop {
        #[command(subcommand)]
        command: WorkshopCommands,
    },
}

#[derive(Subcommand)]
enum MinutesCommands {
    /// List minutes documents, optionally for one appointment
    List {
        #[arg(long)]
        appointment: Option<Uuid>,
    },
    /// Render one minutes document as text
    Show {
        id: Uuid,
    },
    /// Promote a draft to final
    Finalize {
        id: Uuid,
    },
    /// Irreversibly delete a minutes document
    Delete {
        id: Uuid,
        /// Required acknowledgement that deletion is irreversible
        #[arg(long)]
        confirm: bool,
    },
}

#[derive(Subcommand)]
enum WorkshopCommands {
    /// Add or update a workshop contact record
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        /// Existing id to update; a new one is generated otherwise
        #[arg(long)]
        id: Option<Uuid>,
    },
    /// List workshop ids with appointments on file
    List,
}

struct App {
    database: Database,
    engine: Arc<LifecycleEngine>,
    appointments: AppointmentStore,
    minutes: MinutesStore,
    outbox: NotificationOutbox,
    directory: Arc<CachedSqliteDirectory>,
    config: &'static CadenceConfig,
}

async fn build_app() -> Result<App> {
    let config = cadence::init_config()?;
    let database = Database::connect(
        &config.database.url,
        config.database.max_connections,
        config.database.auto_migrate,
    )
    .await?;

    let settings = EngineSettings {
        minutes_family: config.minutes.code_prefix.clone(),
        cutoff: config.detector.cutoff_policy(),
        side_effect_timeout: Duration::from_secs(config.notifications.send_timeout_seconds),
    };
    let pool = database.pool().clone();
    let engine = Arc::new(LifecycleEngine::new(pool.clone(), settings));
    let appointments = AppointmentStore::new(pool.clone());
    let minutes = MinutesStore::new(pool.clone());
    let outbox = NotificationOutbox::new(pool.clone());
    let directory = Arc::new(CachedSqliteDirectory::new(pool));

    Ok(App {
        database,
        engine,
        appointments,
        minutes,
        outbox,
        directory,
        config,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    CadenceConfig::load_env_file()?;
    let cli = Cli::parse();

    let config = cadence::init_config()?;
    cadence::init_telemetry(&config.observability.log_level, config.observability.json_logs)?;

    let result = run(cli).await;
    cadence::shutdown_telemetry();
    result
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { force } => {
            if Path::new("cadence.toml").exists() && !force {
                println!("⚠️  cadence.toml already exists (use --force to overwrite)");
            } else {
                CadenceConfig::default().save_to_file("cadence.toml")?;
                println!("✅ Wrote cadence.toml");
            }
            let app = build_app().await?;
            println!("✅ Database ready at {}", app.config.database.url);
            app.database.close().await;
        }

        Commands::Schedule {
            workshop,
            consultant,
            kind,
            when,
            minutes,
            agenda,
        } => {
            let app = build_app().await?;
            let appointment = app
                .engine
                .schedule(NewAppointment {
                    workshop_id: workshop,
                    consultant_id: consultant,
                    kind,
                    scheduled_at: when,
                    planned_minutes: minutes,
                    agenda,
                })
                .await?;
            println!(
                "📅 Scheduled {} {} for {}",
                appointment.kind, appointment.id, appointment.scheduled_at
            );
            app.database.close().await;
        }

        Commands::Confirm { appointment } => {
            let app = build_app().await?;
            let updated = app.engine.confirm(appointment).await?;
            println!("✅ Appointment {} confirmed", updated.id);
            app.database.close().await;
        }

        Commands::Start { appointment, at } => {
            let app = build_app().await?;
            let updated = app
                .engine
                .start(appointment, at.unwrap_or_else(Utc::now))
                .await?;
            println!(
                "▶️  Session {} in progress (started {})",
                updated.id,
                updated
                    .actual_start
                    .map(|s| s.to_rfc3339())
                    .unwrap_or_default()
            );
            app.database.close().await;
        }

        Commands::Finalize {
            appointment,
            notes,
            decisions,
            next_steps,
            ended_at,
            no_minutes,
            no_notify,
        } => {
            let app = build_app().await?;
            let outcome = app
                .engine
                .finalize(
                    appointment,
                    FinalizePayload {
                        notes,
                        decisions,
                        next_steps,
                        ended_at: ended_at.unwrap_or_else(Utc::now),
                    },
                    FinalizeOptions {
                        generate_minutes: !no_minutes,
                        notify_client: !no_notify,
                    },
                )
                .await?;
            println!("✅ Appointment {} completed", outcome.appointment.id);
            if let Some(minutes) = &outcome.minutes {
                println!("📄 Minutes draft {} generated", minutes.code);
            }
            for warning in &outcome.warnings {
                println!("⚠️  {}: {}", warning.effect, warning.message);
            }
            app.database.close().await;
        }

        Commands::Reschedule {
            appointment,
            outcome,
            liability,
            reason,
            when,
            note,
        } => {
            let app = build_app().await?;
            let result = app
                .engine
                .reschedule(
                    appointment,
                    RescheduleRequest {
                        new_when: when,
                        outcome,
                        liability,
                        reason,
                        note,
                    },
                )
                .await?;
            println!(
                "🔄 Appointment {} is now {}",
                result.appointment.id, result.appointment.status
            );
            if let Some(minutes) = &result.minutes {
                println!("📄 Audit minutes {} recorded", minutes.code);
            }
            for warning in &result.warnings {
                println!("⚠️  {}: {}", warning.effect, warning.message);
            }
            app.database.close().await;
        }

        Commands::Cancel {
            appointment,
            outcome,
            liability,
            reason,
            note,
        } => {
            let app = build_app().await?;
            let result = app
                .engine
                .cancel(
                    appointment,
                    RescheduleRequest {
                        new_when: None,
                        outcome,
                        liability,
                        reason,
                        note,
                    },
                )
                .await?;
            println!(
                "🛑 Appointment {} is now {}",
                result.appointment.id, result.appointment.status
            );
            if let Some(minutes) = &result.minutes {
                println!("📄 Audit minutes {} recorded", minutes.code);
            }
            app.database.close().await;
        }

        Commands::Status { all } => {
            let app = build_app().await?;
            let appointments = app.appointments.list(None).await?;
            let mut counts: Vec<(AppointmentStatus, usize)> = Vec::new();
            for appointment in &appointments {
                match counts.iter_mut().find(|(s, _)| *s == appointment.status) {
                    Some((_, count)) => *count += 1,
                    None => counts.push((appointment.status, 1)),
                }
            }

            println!("📋 Appointment queue");
            for (status, count) in &counts {
                println!("   {status}: {count}");
            }
            println!();
            for appointment in appointments {
                if !all && appointment.status.is_terminal() {
                    continue;
                }
                println!(
                    "   {} | {} | {} | {}",
                    appointment.id, appointment.status, appointment.kind, appointment.scheduled_at
                );
            }
            app.database.close().await;
        }

        Commands::Detector { once } => {
            let app = build_app().await?;
            let detector = OverdueDetector::new(
                app.engine.clone(),
                app.appointments.clone(),
                app.config.detector.cutoff_policy(),
            );
            let dispatcher = OutboxDispatcher::new(
                app.outbox.clone(),
                app.directory.clone() as Arc<dyn ClientDirectory>,
                Arc::new(TracingChannel),
                app.config.notifications.sends_per_second,
                app.config.notifications.burst_capacity,
                Duration::from_secs(app.config.notifications.send_timeout_seconds),
                app.config.notifications.max_attempts as i64,
            );

            if once {
                let report = detector.scan(Utc::now()).await;
                println!(
                    "🔍 Scan: {} examined, {} marked overdue, {} skipped, {} failed",
                    report.examined,
                    report.marked.len(),
                    report.skipped,
                    report.failed
                );
                let drained = dispatcher.drain().await;
                println!(
                    "📨 Outbox: {} delivered, {} failed, {} deferred",
                    drained.delivered, drained.failed, drained.deferred
                );
            } else {
                let interval = Duration::from_secs(app.config.detector.scan_interval_seconds);
                let coordinator = ShutdownCoordinator::new();
                let detector_handle = coordinator.handle();
                let mut drain_handle = coordinator.handle();

                let drain_loop = async {
                    let mut ticker = tokio::time::interval(interval);
                    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                    loop {
                        tokio::select! {
                            _ = ticker.tick() => { dispatcher.drain().await; }
                            _ = drain_handle.wait() => break,
                        }
                    }
                };

                println!(
                    "🔍 Overdue detector running every {}s (ctrl-c to stop)",
                    interval.as_secs()
                );
                tokio::join!(detector.run(interval, detector_handle), drain_loop, async {
                    let _ = coordinator.listen_for_ctrl_c().await;
                });
            }
            app.database.close().await;
        }

        Commands::Minutes { command } => {
            let app = build_app().await?;
            match command {
                MinutesCommands::List { appointment } => {
                    let documents = match appointment {
                        Some(id) => app.minutes.list_for_appointment(id).await?,
                        None => app.minutes.list().await?,
                    };
                    for document in documents {
                        println!(
                            "   {} | {} | {} | appointment {}",
                            document.code, document.kind, document.status, document.appointment_id
                        );
                    }
                }
                MinutesCommands::Show { id } => match app.minutes.get(id).await? {
                    Some(document) => {
                        let contact = app.directory.lookup(document.workshop_id).await.ok().flatten();
                        let rendered = TextRenderer.render(&document, contact.as_ref())?;
                        println!("{}", rendered.content);
                    }
                    None => println!("⚠️  No minutes document {id}"),
                },
                MinutesCommands::Finalize { id } => {
                    if app.minutes.finalize(id, Utc::now()).await? {
                        println!("✅ Minutes {id} finalized");
                    } else {
                        println!("⚠️  Minutes {id} is not a draft (or does not exist)");
                    }
                }
                MinutesCommands::Delete { id, confirm } => {
                    if !confirm {
                        println!("⚠️  Deletion is irreversible; pass --confirm to proceed");
                    } else if app.minutes.delete(id).await? {
                        println!("🗑️  Minutes {id} deleted");
                    } else {
                        println!("⚠️  No minutes document {id}");
                    }
                }
            }
            app.database.close().await;
        }

        Commands::Workshop { command } => {
            let app = build_app().await?;
            match command {
                WorkshopCommands::Add {
                    name,
                    email,
                    phone,
                    id,
                } => {
                    let contact = ClientContact {
                        id: id.unwrap_or_else(Uuid::new_v4),
                        name,
                        email,
                        phone,
                    };
                    app.directory.upsert(&contact).await?;
                    println!("✅ Workshop {} ({}) on file", contact.name, contact.id);
                }
                WorkshopCommands::List => {
                    let appointments = app.appointments.list(None).await?;
                    let mut seen: Vec<Uuid> = Vec::new();
                    for appointment in appointments {
                        if !seen.contains(&appointment.workshop_id) {
                            seen.push(appointment.workshop_id);
                        }
                    }
                    for workshop_id in seen {
                        match app.directory.lookup(workshop_id).await? {
                            Some(contact) => println!("   {} | {}", contact.id, contact.name),
                            None => println!("   {workshop_id} | (no contact on file)"),
                        }
                    }
                }
            }
            app.database.close().await;
        }
    }

    Ok(())
}
