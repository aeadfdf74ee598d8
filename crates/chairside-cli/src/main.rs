//! Chairside CLI - Front-desk console for the clinic record store
//!
//! Every write goes through the sync engine: applied immediately when the
//! remote API is reachable, parked in the durable queue otherwise.

use std::env;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

use chairside_core::api::{ApiClient, RemoteApi};
use chairside_core::config::ApiConfig;
use chairside_core::services::StoreService;
use chairside_core::sync::{
    connectivity_channel, spawn_reconnect_listener, ConnectivityProbe, SyncService, WriteOutcome,
};
use chairside_core::{Patient, SyncOperation, WriteMethod};

#[derive(Parser)]
#[command(name = "chairside")]
#[command(about = "Offline-first front-desk console for a dental clinic")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Optional path to local database file
    #[arg(long, value_name = "PATH", global = true)]
    db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Patient records
    Patient {
        #[command(subcommand)]
        command: PatientCommands,
    },
    /// Appointment book
    Appointment {
        #[command(subcommand)]
        command: AppointmentCommands,
    },
    /// Pending-write queue
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },
    /// Replay pending writes against the remote API
    Sync {
        /// Keep running: probe connectivity and drain on every reconnect
        #[arg(long)]
        watch: bool,
    },
    /// Connectivity and store summary
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum PatientCommands {
    /// Register a new patient
    Add {
        /// Chart code, unique per clinic (e.g. P-0042)
        code: String,
        first_name: String,
        last_name: String,
        #[arg(long)]
        phone: Option<String>,
        /// ISO date (YYYY-MM-DD)
        #[arg(long)]
        birth_date: Option<String>,
        #[arg(long)]
        note: Option<String>,
    },
    /// List patients, most recently updated first
    List {
        /// Number of patients to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Look up one patient by chart code
    Find {
        /// Chart code
        code: String,
    },
}

#[derive(Subcommand)]
enum AppointmentCommands {
    /// Book a chair slot
    Add {
        /// Patient chart code
        code: String,
        /// Doctor identifier
        #[arg(long)]
        doctor: String,
        /// Slot start, local naive time (YYYY-MM-DD HH:MM)
        #[arg(long, value_name = "WHEN")]
        at: String,
        /// Duration in minutes
        #[arg(long, default_value = "30")]
        duration: i64,
        #[arg(long)]
        note: Option<String>,
    },
    /// List the book for one day
    Day {
        /// ISO date (YYYY-MM-DD)
        date: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum QueueCommands {
    /// Show pending writes, oldest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Discard one pending write by id
    Drop {
        /// Queue entry id (from `queue list`)
        id: i64,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Core(#[from] chairside_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("Invalid time '{0}', expected YYYY-MM-DD HH:MM")]
    InvalidDateTime(String),
    #[error("Chart code cannot be empty")]
    EmptyCode,
    #[error("Patient not found for code: {0}")]
    PatientNotFound(String),
    #[error(
        "Remote API is not configured. Set CHAIRSIDE_API_URL (and optionally CHAIRSIDE_API_TOKEN)."
    )]
    ApiNotConfigured,
}

/// Remote half of the runtime: client, sync engine, connectivity channel.
struct Remote {
    api: Arc<ApiClient>,
    sync: Arc<SyncService>,
    online_tx: tokio::sync::watch::Sender<bool>,
    probe_interval: std::time::Duration,
}

impl Remote {
    fn connect(store: StoreService) -> Result<Self, CliError> {
        let config = ApiConfig::from_env().map_err(|_| CliError::ApiNotConfigured)?;
        let api = Arc::new(ApiClient::new(&config)?);

        // Start pessimistic; the first probe flips the state if the API
        // is reachable
        let (online_tx, online_rx) = connectivity_channel(false);
        let sync = Arc::new(SyncService::new(store, api.clone() as Arc<dyn RemoteApi>, online_rx));

        Ok(Self {
            api,
            sync,
            online_tx,
            probe_interval: config.probe_interval(),
        })
    }

    fn probe(&self) -> ConnectivityProbe {
        ConnectivityProbe::new(
            self.api.clone() as Arc<dyn RemoteApi>,
            self.online_tx.clone(),
            self.probe_interval,
        )
    }
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chairside=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);
    let store = StoreService::open_path(&db_path).await?;

    match cli.command {
        Commands::Patient { command } => match command {
            PatientCommands::Add {
                code,
                first_name,
                last_name,
                phone,
                birth_date,
                note,
            } => {
                run_patient_add(&store, &code, &first_name, &last_name, phone, birth_date, note)
                    .await?;
            }
            PatientCommands::List { limit, json } => {
                run_patient_list(&store, limit, json).await?;
            }
            PatientCommands::Find { code } => run_patient_find(&store, &code).await?,
        },
        Commands::Appointment { command } => match command {
            AppointmentCommands::Add {
                code,
                doctor,
                at,
                duration,
                note,
            } => run_appointment_add(&store, &code, &doctor, &at, duration, note).await?,
            AppointmentCommands::Day { date, json } => {
                run_appointment_day(&store, &date, json).await?;
            }
        },
        Commands::Queue { command } => match command {
            QueueCommands::List { json } => run_queue_list(&store, json).await?,
            QueueCommands::Drop { id } => run_queue_drop(&store, id).await?,
        },
        Commands::Sync { watch } => {
            if watch {
                run_sync_watch(store).await?;
            } else {
                run_sync_once(store).await?;
            }
        }
        Commands::Status { json } => run_status(&store, json).await?,
    }

    Ok(())
}

async fn run_patient_add(
    store: &StoreService,
    code: &str,
    first_name: &str,
    last_name: &str,
    phone: Option<String>,
    birth_date: Option<String>,
    note: Option<String>,
) -> Result<(), CliError> {
    let code = normalize_code(code)?;
    if let Some(date) = &birth_date {
        validate_iso_date(date)?;
    }

    let mut payload = Map::new();
    payload.insert("code".to_string(), json!(code));
    payload.insert("first_name".to_string(), json!(first_name.trim()));
    payload.insert("last_name".to_string(), json!(last_name.trim()));
    if let Some(phone) = phone {
        payload.insert("phone".to_string(), json!(phone));
    }
    if let Some(date) = birth_date {
        payload.insert("birth_date".to_string(), json!(date));
    }
    if let Some(note) = note {
        payload.insert("note".to_string(), json!(note));
    }

    let remote = Remote::connect(store.clone())?;
    remote.probe().check_once().await;

    let outcome = remote
        .sync
        .submit_or_enqueue("patients", WriteMethod::Post, payload)
        .await?;
    store.record_activity("cli", "create", "patient", &code).await?;

    print_write_outcome(&outcome);
    Ok(())
}

async fn run_patient_list(store: &StoreService, limit: usize, as_json: bool) -> Result<(), CliError> {
    refresh_patients(store).await;
    let patients = store.list_patients(limit, 0).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&patients)?);
    } else if patients.is_empty() {
        println!("No patients on file");
    } else {
        for patient in &patients {
            println!("{}", format_patient_line(patient));
        }
    }

    Ok(())
}

async fn run_patient_find(store: &StoreService, code: &str) -> Result<(), CliError> {
    let code = normalize_code(code)?;
    refresh_patients(store).await;

    let patient = store
        .find_patient_by_code(&code)
        .await?
        .ok_or_else(|| CliError::PatientNotFound(code.clone()))?;

    println!("{}  {}", patient.code, patient.full_name());
    if let Some(phone) = &patient.phone {
        println!("  phone: {phone}");
    }
    if let Some(birth_date) = &patient.birth_date {
        println!("  born:  {birth_date}");
    }
    if let Some(note) = &patient.note {
        println!("  note:  {note}");
    }
    Ok(())
}

/// Refresh the local patient mirror from the remote API, falling back to
/// whatever is on disk when the API is unreachable.
async fn refresh_patients(store: &StoreService) {
    let Ok(remote) = Remote::connect(store.clone()) else {
        return;
    };

    match remote.api.cached_fetch("patients").await {
        Ok(value) => {
            let Ok(patients) = serde_json::from_value::<Vec<Patient>>(value) else {
                tracing::warn!("Unexpected patient list shape from remote; keeping local mirror");
                return;
            };
            for patient in &patients {
                if let Err(error) = store.upsert_patient(patient).await {
                    tracing::warn!(%error, "Failed to mirror patient locally");
                    return;
                }
            }
        }
        Err(error) => {
            tracing::debug!(%error, "Remote list unavailable; serving local mirror");
        }
    }
}

async fn run_appointment_add(
    store: &StoreService,
    code: &str,
    doctor: &str,
    at: &str,
    duration: i64,
    note: Option<String>,
) -> Result<(), CliError> {
    let code = normalize_code(code)?;
    let scheduled_at = parse_local_datetime(at)?;

    let patient = store
        .find_patient_by_code(&code)
        .await?
        .ok_or_else(|| CliError::PatientNotFound(code.clone()))?;

    let mut payload = Map::new();
    payload.insert("patient_id".to_string(), json!(patient.id));
    payload.insert("doctor".to_string(), json!(doctor));
    payload.insert("scheduled_at".to_string(), json!(scheduled_at));
    payload.insert("duration_min".to_string(), json!(duration));
    if let Some(note) = note {
        payload.insert("note".to_string(), json!(note));
    }

    let remote = Remote::connect(store.clone())?;
    remote.probe().check_once().await;

    let outcome = remote
        .sync
        .submit_or_enqueue("appointments", WriteMethod::Post, payload)
        .await?;
    store
        .record_activity("cli", "create", "appointment", &code)
        .await?;

    print_write_outcome(&outcome);
    Ok(())
}

async fn run_appointment_day(store: &StoreService, date: &str, as_json: bool) -> Result<(), CliError> {
    validate_iso_date(date)?;

    if let Ok(remote) = Remote::connect(store.clone()) {
        match remote.api.cached_fetch("appointments").await {
            Ok(value) => {
                if let Ok(appointments) =
                    serde_json::from_value::<Vec<chairside_core::models::Appointment>>(value)
                {
                    for appointment in &appointments {
                        if let Err(error) = store.upsert_appointment(appointment).await {
                            tracing::warn!(%error, "Failed to mirror appointment locally");
                            break;
                        }
                    }
                }
            }
            Err(error) => {
                tracing::debug!(%error, "Remote book unavailable; serving local mirror");
            }
        }
    }

    let appointments = store.appointments_for_day(date).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&appointments)?);
    } else if appointments.is_empty() {
        println!("No appointments on {date}");
    } else {
        for appointment in &appointments {
            let time = Utc
                .timestamp_millis_opt(appointment.scheduled_at)
                .single()
                .map_or_else(|| "??:??".to_string(), |when| when.format("%H:%M").to_string());
            println!(
                "{time}  {:<12}  patient #{:<6}  {}min  [{}]",
                appointment.doctor, appointment.patient_id, appointment.duration_min,
                appointment.status
            );
        }
    }

    Ok(())
}

#[derive(Debug, Serialize)]
struct QueueListItem {
    id: i64,
    method: String,
    endpoint: String,
    created_at: i64,
    waiting: String,
    payload: Value,
}

async fn run_queue_list(store: &StoreService, as_json: bool) -> Result<(), CliError> {
    let operations = store.pending_operations().await?;

    if as_json {
        let items = operations
            .iter()
            .map(operation_to_list_item)
            .collect::<Vec<QueueListItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if operations.is_empty() {
        println!("Queue empty");
    } else {
        for line in format_queue_lines(&operations) {
            println!("{line}");
        }
    }

    Ok(())
}

async fn run_queue_drop(store: &StoreService, id: i64) -> Result<(), CliError> {
    store.delete_operation(id).await?;
    store
        .record_activity("cli", "drop", "sync_operation", &id.to_string())
        .await?;
    println!("{id}");
    Ok(())
}

async fn run_sync_once(store: StoreService) -> Result<(), CliError> {
    let remote = Remote::connect(store.clone())?;

    if !remote.probe().check_once().await {
        let depth = store.queue_depth().await?;
        println!("Remote API unreachable; {depth} operation(s) still queued");
        return Ok(());
    }

    remote.sync.drain().await;

    let depth = store.queue_depth().await?;
    if depth == 0 {
        println!("Queue empty");
    } else {
        println!("{depth} operation(s) still queued");
    }
    Ok(())
}

async fn run_sync_watch(store: StoreService) -> Result<(), CliError> {
    let remote = Remote::connect(store)?;

    let listener = spawn_reconnect_listener(remote.sync.clone(), remote.online_tx.subscribe());
    let probe = remote.probe();

    println!("Watching for connectivity; press Ctrl-C to stop");
    tokio::select! {
        () = probe.run() => {}
        result = tokio::signal::ctrl_c() => result?,
    }

    listener.abort();
    Ok(())
}

#[derive(Debug, Serialize)]
struct StatusReport {
    online: bool,
    patients: usize,
    pending_operations: usize,
}

async fn run_status(store: &StoreService, as_json: bool) -> Result<(), CliError> {
    let online = match Remote::connect(store.clone()) {
        Ok(remote) => remote.api.ping().await,
        Err(_) => false,
    };
    let counts = store.entity_counts().await?;

    let report = StatusReport {
        online,
        patients: counts.patients,
        pending_operations: counts.pending_operations,
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("remote:   {}", if report.online { "online" } else { "offline" });
        println!("patients: {}", report.patients);
        println!("queued:   {}", report.pending_operations);
    }

    Ok(())
}

fn print_write_outcome(outcome: &WriteOutcome) {
    match outcome {
        WriteOutcome::Applied => println!("Applied"),
        WriteOutcome::Queued(id) => println!("Queued ({id})"),
    }
}

fn format_patient_line(patient: &Patient) -> String {
    let phone = patient.phone.as_deref().unwrap_or("-");
    format!("{:<8}  {:<30}  {phone}", patient.code, patient.full_name())
}

fn format_queue_lines(operations: &[SyncOperation]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    operations
        .iter()
        .map(|operation| {
            let waiting = format_relative_time(operation.created_at, now_ms);
            format!(
                "{:<6}  {:<6}  {:<28}  {waiting}",
                operation.id,
                operation.method.as_str(),
                operation.endpoint
            )
        })
        .collect()
}

fn operation_to_list_item(operation: &SyncOperation) -> QueueListItem {
    let now_ms = Utc::now().timestamp_millis();
    QueueListItem {
        id: operation.id,
        method: operation.method.as_str().to_string(),
        endpoint: operation.endpoint.clone(),
        created_at: operation.created_at,
        waiting: format_relative_time(operation.created_at, now_ms),
        payload: Value::Object(operation.payload.clone()),
    }
}

fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else {
        format!("{}d ago", diff / day)
    }
}

fn normalize_code(code: &str) -> Result<String, CliError> {
    let trimmed = code.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyCode)
    } else {
        Ok(trimmed.to_string())
    }
}

fn validate_iso_date(date: &str) -> Result<(), CliError> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| CliError::InvalidDate(date.to_string()))
}

/// Parse a front-desk timestamp as UTC milliseconds.
fn parse_local_datetime(input: &str) -> Result<i64, CliError> {
    let naive = NaiveDateTime::parse_from_str(input.trim(), "%Y-%m-%d %H:%M")
        .map_err(|_| CliError::InvalidDateTime(input.to_string()))?;
    Ok(naive.and_utc().timestamp_millis())
}

fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("CHAIRSIDE_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chairside")
        .join("chairside.db")
}
