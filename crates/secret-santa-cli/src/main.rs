use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use secret_santa_api::{parse_assign_document, DrawRequest, SecretSantaApi};
use secret_santa_store_sqlite::{NewParticipant, SqliteStore};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

const CLI_CONTRACT_VERSION: &str = "cli.v1";

#[derive(Debug, Parser)]
#[command(name = "santa")]
#[command(about = "Secret Santa draw CLI")]
struct Cli {
    /// SQLite database path; accepted before or after the subcommand.
    #[arg(long, global = true, default_value = "./secret_santa.sqlite3")]
    db: PathBuf,

    /// Log at debug level on stderr (`RUST_LOG` takes precedence).
    #[arg(long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Db {
        #[command(subcommand)]
        command: Box<DbCommand>,
    },
    Participant {
        #[command(subcommand)]
        command: Box<ParticipantCommand>,
    },
    Draw {
        #[command(subcommand)]
        command: Box<DrawCommand>,
    },
    /// Run the engine over a roster file without touching the database.
    Assign(AssignArgs),
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    SchemaVersion,
    Migrate(DbMigrateArgs),
    Backup(DbBackupArgs),
    Restore(DbRestoreArgs),
    IntegrityCheck,
}

#[derive(Debug, Args)]
struct DbMigrateArgs {
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[derive(Debug, Args)]
struct DbBackupArgs {
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Args)]
struct DbRestoreArgs {
    #[arg(long = "in")]
    input: PathBuf,
}

#[derive(Debug, Subcommand)]
enum ParticipantCommand {
    Add(ParticipantAddArgs),
    Remove(ParticipantRemoveArgs),
    List,
    Import(ParticipantImportArgs),
}

#[derive(Debug, Args)]
struct ParticipantAddArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    /// Registered participant who must never be paired with this one (repeatable).
    #[arg(long = "family")]
    family: Vec<String>,
    /// Receiver from an earlier draw, oldest first (repeatable).
    #[arg(long = "history")]
    history: Vec<String>,
}

#[derive(Debug, Args)]
struct ParticipantRemoveArgs {
    #[arg(long)]
    name: String,
}

#[derive(Debug, Args)]
struct ParticipantImportArgs {
    #[arg(long)]
    file: PathBuf,
}

#[derive(Debug, Subcommand)]
enum DrawCommand {
    Run(DrawRunArgs),
    Show(DrawIdArgs),
    List,
    Commit(DrawIdArgs),
    Notices(DrawIdArgs),
}

#[derive(Debug, Args)]
struct DrawRunArgs {
    #[arg(long, default_value_t = secret_santa_api::DEFAULT_HISTORY_WINDOW)]
    history_window: usize,
    #[arg(long, default_value_t = secret_santa_api::DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value_t = false)]
    commit: bool,
}

#[derive(Debug, Args)]
struct DrawIdArgs {
    #[arg(long)]
    draw_id: String,
}

#[derive(Debug, Args)]
struct AssignArgs {
    #[arg(long)]
    file: PathBuf,
    #[arg(long)]
    history_window: Option<usize>,
    #[arg(long)]
    max_attempts: Option<u32>,
    #[arg(long)]
    seed: Option<u64>,
}

fn with_contract_version(value: Value) -> Value {
    match value {
        Value::Object(mut object) => {
            object.insert(
                "contract_version".to_string(),
                Value::String(CLI_CONTRACT_VERSION.to_string()),
            );
            Value::Object(object)
        }
        other => serde_json::json!({
            "contract_version": CLI_CONTRACT_VERSION,
            "payload": other
        }),
    }
}

fn emit_json(value: Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&with_contract_version(value))?);
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    tracing::debug!(db = %cli.db.display(), "starting santa");

    match cli.command {
        Command::Db { command } => {
            let mut store = SqliteStore::open(&cli.db)?;
            run_db(*command, &cli.db, &mut store)
        }
        Command::Participant { command } => {
            run_participant(*command, &SecretSantaApi::new(cli.db))
        }
        Command::Draw { command } => run_draw(*command, &SecretSantaApi::new(cli.db)),
        Command::Assign(args) => run_assign(&args),
    }
}

fn run_db(command: DbCommand, db_path: &Path, store: &mut SqliteStore) -> Result<()> {
    match command {
        DbCommand::SchemaVersion => run_db_schema_version(store),
        DbCommand::Migrate(args) => run_db_migrate(&args, db_path),
        DbCommand::Backup(args) => run_db_backup(&args, store),
        DbCommand::Restore(args) => run_db_restore(&args, store),
        DbCommand::IntegrityCheck => run_db_integrity_check(store),
    }
}

fn run_db_schema_version(store: &SqliteStore) -> Result<()> {
    let status = store.schema_status()?;
    emit_json(serde_json::json!({
        "current_version": status.current_version,
        "target_version": status.target_version,
        "pending_versions": status.pending_versions,
        "up_to_date": status.pending_versions.is_empty()
    }))
}

fn run_db_migrate(args: &DbMigrateArgs, db_path: &Path) -> Result<()> {
    let result = SecretSantaApi::new(db_path.to_path_buf()).migrate(args.dry_run)?;
    emit_json(serde_json::to_value(result)?)
}

fn run_db_backup(args: &DbBackupArgs, store: &mut SqliteStore) -> Result<()> {
    store.migrate()?;
    store.backup_database(&args.out)?;
    tracing::info!(backup = %args.out.display(), "database backed up");
    emit_json(serde_json::json!({
        "backup_path": args.out,
        "status": "ok"
    }))
}

fn run_db_restore(args: &DbRestoreArgs, store: &mut SqliteStore) -> Result<()> {
    store.restore_database(&args.input)?;
    tracing::info!(source = %args.input.display(), "database restored");
    emit_json(serde_json::json!({
        "restored_from": args.input,
        "status": "ok"
    }))
}

fn run_db_integrity_check(store: &SqliteStore) -> Result<()> {
    let report = store.integrity_check()?;
    let ok = report.quick_check_ok && report.foreign_key_violations.is_empty();
    emit_json(serde_json::json!({
        "ok": ok,
        "report": report
    }))
}

fn run_participant(command: ParticipantCommand, api: &SecretSantaApi) -> Result<()> {
    match command {
        ParticipantCommand::Add(args) => {
            let participant = api.register_participant(&NewParticipant {
                name: args.name,
                email: args.email,
                family: args.family,
                history: args.history,
            })?;
            emit_json(serde_json::json!({ "participant": participant }))
        }
        ParticipantCommand::Remove(args) => {
            emit_json(serde_json::to_value(api.remove_participant(&args.name)?)?)
        }
        ParticipantCommand::List => {
            emit_json(serde_json::json!({ "participants": api.list_participants()? }))
        }
        ParticipantCommand::Import(args) => {
            let document = read_text_file(&args.file)?;
            emit_json(serde_json::to_value(api.import_roster(&document)?)?)
        }
    }
}

fn run_draw(command: DrawCommand, api: &SecretSantaApi) -> Result<()> {
    match command {
        DrawCommand::Run(args) => {
            let draw = api.run_draw(&DrawRequest {
                history_window: args.history_window,
                max_attempts: args.max_attempts,
                seed: args.seed,
                commit: args.commit,
            })?;
            emit_json(serde_json::json!({ "draw": draw }))
        }
        DrawCommand::Show(args) => {
            emit_json(serde_json::json!({ "draw": api.show_draw(&args.draw_id)? }))
        }
        DrawCommand::List => emit_json(serde_json::json!({ "draws": api.list_draws()? })),
        DrawCommand::Commit(args) => {
            emit_json(serde_json::json!({ "draw": api.commit_draw(&args.draw_id)? }))
        }
        DrawCommand::Notices(args) => {
            emit_json(serde_json::to_value(api.draw_notices(&args.draw_id)?)?)
        }
    }
}

fn run_assign(args: &AssignArgs) -> Result<()> {
    let document = read_text_file(&args.file)?;
    let mut request = parse_assign_document(&document)?;
    if let Some(history_window) = args.history_window {
        request.history_window = history_window;
    }
    if let Some(max_attempts) = args.max_attempts {
        request.max_attempts = max_attempts;
    }
    if args.seed.is_some() {
        request.seed = args.seed;
    }

    let response = secret_santa_api::assign_stateless(&request)?;
    emit_json(serde_json::to_value(response)?)
}

fn read_text_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
