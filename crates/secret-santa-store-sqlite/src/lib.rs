use std::fmt::{Display, Formatter};
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use rusqlite::{
    params, Connection, DatabaseName, OptionalExtension, Transaction, TransactionBehavior,
};
use secret_santa_core::{AssignmentResult, Participant};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use ulid::Ulid;

const LATEST_SCHEMA_VERSION: i64 = 1;

const CREATE_SCHEMA_MIGRATIONS_SQL: &str = r"
CREATE TABLE IF NOT EXISTS schema_migrations (
  version INTEGER PRIMARY KEY,
  applied_at TEXT NOT NULL
);
";

const MIGRATION_001_SQL: &str = r"
CREATE TABLE IF NOT EXISTS participants (
  participant_id TEXT PRIMARY KEY,
  name TEXT NOT NULL UNIQUE CHECK (length(trim(name)) > 0),
  email TEXT NOT NULL UNIQUE CHECK (length(trim(email)) > 0),
  created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS family_links (
  participant_id TEXT NOT NULL,
  member_id TEXT NOT NULL,
  created_at TEXT NOT NULL,
  PRIMARY KEY (participant_id, member_id),
  CHECK (participant_id <> member_id),
  FOREIGN KEY (participant_id) REFERENCES participants(participant_id) ON DELETE CASCADE,
  FOREIGN KEY (member_id) REFERENCES participants(participant_id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS draws (
  draw_id TEXT PRIMARY KEY,
  created_at TEXT NOT NULL,
  seed TEXT,
  history_window INTEGER NOT NULL CHECK (history_window >= 0),
  max_attempts INTEGER NOT NULL CHECK (max_attempts >= 1),
  attempts INTEGER NOT NULL CHECK (attempts >= 1),
  status TEXT NOT NULL CHECK (status IN ('complete','blocked','invalid_input')),
  roster_sha256 TEXT NOT NULL,
  result_json TEXT NOT NULL,
  committed_at TEXT
);

CREATE TABLE IF NOT EXISTS history_entries (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  giver_id TEXT NOT NULL,
  receiver_name TEXT NOT NULL,
  draw_id TEXT,
  recorded_at TEXT NOT NULL,
  FOREIGN KEY (giver_id) REFERENCES participants(participant_id) ON DELETE CASCADE,
  FOREIGN KEY (draw_id) REFERENCES draws(draw_id)
);

CREATE INDEX IF NOT EXISTS idx_family_links_member ON family_links(member_id);
CREATE INDEX IF NOT EXISTS idx_history_entries_giver ON history_entries(giver_id);
CREATE INDEX IF NOT EXISTS idx_draws_created_at ON draws(created_at);
";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ParticipantId(pub Ulid);

impl ParticipantId {
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ParticipantId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ParticipantId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DrawId(pub Ulid);

impl DrawId {
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse the textual ULID form used in CLI flags and URLs.
    ///
    /// # Errors
    /// Returns an error when `raw` is not a valid ULID.
    pub fn parse(raw: &str) -> Result<Self> {
        let parsed = Ulid::from_string(raw).with_context(|| format!("invalid ULID: {raw}"))?;
        Ok(Self(parsed))
    }
}

impl Default for DrawId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for DrawId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub struct SqliteStore {
    conn: Connection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaStatus {
    pub current_version: i64,
    pub target_version: i64,
    pub pending_versions: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForeignKeyViolation {
    pub table: String,
    pub rowid: i64,
    pub parent: String,
    pub fk_index: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IntegrityReport {
    pub quick_check_ok: bool,
    pub quick_check_message: String,
    pub foreign_key_violations: Vec<ForeignKeyViolation>,
    pub schema_status: SchemaStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewParticipant {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub family: Vec<String>,
    /// Receivers from draws held before this registry existed, most recent last.
    #[serde(default)]
    pub history: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisteredParticipant {
    pub participant_id: ParticipantId,
    pub name: String,
    pub email: String,
    pub family: Vec<String>,
    pub history: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl RegisteredParticipant {
    #[must_use]
    pub fn to_participant(&self) -> Participant {
        Participant::new(self.name.clone())
            .with_family(self.family.iter().cloned())
            .with_history(self.history.iter().cloned())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DrawRecord {
    pub draw_id: DrawId,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub seed: Option<u64>,
    pub history_window: usize,
    pub max_attempts: u32,
    pub attempts: u32,
    pub roster_sha256: String,
    pub result: AssignmentResult,
    #[serde(with = "time::serde::rfc3339::option")]
    pub committed_at: Option<OffsetDateTime>,
}

impl SqliteStore {
    /// Open a SQLite-backed registry and configure required runtime pragmas.
    ///
    /// # Errors
    /// Returns an error when the database cannot be opened or pragmas cannot be applied.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite database at {}", path.display()))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to configure sqlite pragmas")?;

        Ok(Self { conn })
    }

    /// Report current and target schema versions plus pending migrations.
    ///
    /// # Errors
    /// Returns an error when schema metadata cannot be read or initialized.
    pub fn schema_status(&self) -> Result<SchemaStatus> {
        self.conn
            .execute_batch(CREATE_SCHEMA_MIGRATIONS_SQL)
            .context("failed to apply schema_migrations table")?;
        let current_version = current_schema_version(&self.conn)?;
        let pending_versions = if current_version < LATEST_SCHEMA_VERSION {
            ((current_version + 1)..=LATEST_SCHEMA_VERSION).collect::<Vec<_>>()
        } else {
            Vec::new()
        };

        Ok(SchemaStatus {
            current_version,
            target_version: LATEST_SCHEMA_VERSION,
            pending_versions,
        })
    }

    /// Apply all forward migrations up to the latest supported schema version.
    ///
    /// # Errors
    /// Returns an error when migration bootstrapping or any migration step fails.
    pub fn migrate(&mut self) -> Result<()> {
        self.conn
            .execute_batch(CREATE_SCHEMA_MIGRATIONS_SQL)
            .context("failed to apply schema_migrations table")?;

        let mut version = current_schema_version(&self.conn)?;

        if version < 1 {
            let tx = self.conn.transaction().context("failed to start migration v1")?;
            tx.execute_batch(MIGRATION_001_SQL).context("failed to apply migration v1")?;
            record_schema_version(&tx, 1)?;
            tx.commit().context("failed to commit migration v1")?;
            version = current_schema_version(&self.conn)?;
        }

        if version != LATEST_SCHEMA_VERSION {
            return Err(anyhow!(
                "unsupported schema version {version}; expected {LATEST_SCHEMA_VERSION}"
            ));
        }

        Ok(())
    }

    /// Register one participant, linking family members in both directions.
    ///
    /// # Errors
    /// Returns an error when name or e-mail are blank or already registered, when a
    /// family member is unknown or is the participant itself, or when any write fails.
    pub fn register_participant(&mut self, input: &NewParticipant) -> Result<RegisteredParticipant> {
        let mut registered = self.register_participants(std::slice::from_ref(input))?;
        registered.pop().ok_or_else(|| anyhow!("registered participant disappeared: {}", input.name))
    }

    /// Register several participants in one transaction, in order. Family members may
    /// name participants registered earlier in the same batch. Nothing is written unless
    /// every entry is accepted.
    ///
    /// # Errors
    /// Returns the first validation or write error; the whole batch is rolled back.
    pub fn register_participants(
        &mut self,
        inputs: &[NewParticipant],
    ) -> Result<Vec<RegisteredParticipant>> {
        // Lookups precede the writes, so take the write lock up front.
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("failed to start transaction")?;

        let now = now_rfc3339()?;
        let mut names = Vec::with_capacity(inputs.len());
        for input in inputs {
            names.push(insert_participant(&tx, input, &now)?);
        }
        tx.commit().context("failed to commit participant registration")?;

        let mut registered = Vec::with_capacity(names.len());
        for name in names {
            let participant = self
                .get_participant(&name)?
                .ok_or_else(|| anyhow!("registered participant disappeared: {name}"))?;
            registered.push(participant);
        }
        Ok(registered)
    }

    /// Remove one participant with its family links and history rows.
    /// Returns `false` when no participant has that name.
    ///
    /// # Errors
    /// Returns an error when the delete fails.
    pub fn remove_participant(&mut self, name: &str) -> Result<bool> {
        let tx = self.conn.transaction().context("failed to start transaction")?;
        let removed = tx
            .execute("DELETE FROM participants WHERE name = ?1", params![name.trim()])
            .context("failed to delete participant")?;
        tx.commit().context("failed to commit participant removal")?;
        Ok(removed > 0)
    }

    /// Load one participant by name.
    ///
    /// # Errors
    /// Returns an error when rows cannot be read or decoded.
    pub fn get_participant(&self, name: &str) -> Result<Option<RegisteredParticipant>> {
        let row = self
            .conn
            .query_row(
                "SELECT participant_id, name, email, created_at FROM participants WHERE name = ?1",
                params![name],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()
            .context("failed to query participant")?;

        row.map(|(id, name, email, created_at)| self.hydrate_participant(&id, name, email, &created_at))
            .transpose()
    }

    /// Load every registered participant in registration order, with family and history.
    ///
    /// # Errors
    /// Returns an error when rows cannot be read or decoded.
    pub fn list_participants(&self) -> Result<Vec<RegisteredParticipant>> {
        let mut stmt = self.conn.prepare(
            "SELECT participant_id, name, email, created_at
             FROM participants
             ORDER BY created_at ASC, rowid ASC",
        )?;
        let mut rows = stmt.query([])?;
        let mut participants = Vec::new();

        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            let created_at: String = row.get(3)?;
            participants.push(self.hydrate_participant(&id, row.get(1)?, row.get(2)?, &created_at)?);
        }

        Ok(participants)
    }

    /// Persist one draw outcome.
    ///
    /// # Errors
    /// Returns an error when serialization or the insert fails.
    pub fn save_draw(&mut self, record: &DrawRecord) -> Result<()> {
        let tx = self.conn.transaction().context("failed to start transaction")?;
        tx.execute(
            "INSERT INTO draws(
                draw_id, created_at, seed, history_window, max_attempts, attempts,
                status, roster_sha256, result_json, committed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.draw_id.to_string(),
                rfc3339(record.created_at)?,
                record.seed.map(|seed| seed.to_string()),
                i64::try_from(record.history_window).context("history_window is too large")?,
                record.max_attempts,
                record.attempts,
                record.result.status(),
                record.roster_sha256,
                serde_json::to_string(&record.result).context("failed to serialize draw result")?,
                record.committed_at.map(rfc3339).transpose()?,
            ],
        )
        .context("failed to persist draw")?;
        tx.commit().context("failed to commit draw transaction")?;
        Ok(())
    }

    /// Retrieve a draw by its identifier.
    ///
    /// # Errors
    /// Returns an error when lookup or decoding fails.
    pub fn get_draw(&self, draw_id: DrawId) -> Result<Option<DrawRecord>> {
        load_draw(&self.conn, draw_id)
    }

    /// Load every persisted draw, newest first.
    ///
    /// # Errors
    /// Returns an error when rows cannot be read or decoded.
    pub fn list_draws(&self) -> Result<Vec<DrawRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SELECT_DRAW_SQL} ORDER BY created_at DESC, draw_id DESC"))?;
        let mut rows = stmt.query([])?;
        let mut draws = Vec::new();
        while let Some(row) = rows.next()? {
            draws.push(decode_draw(row)?);
        }
        Ok(draws)
    }

    /// Append each receiver of a complete draw to its giver's history and mark the draw
    /// committed.
    ///
    /// # Errors
    /// Returns an error when the draw is unknown, not complete, already committed, names a
    /// giver that is no longer registered, or any write fails.
    pub fn commit_draw(&mut self, draw_id: DrawId) -> Result<DrawRecord> {
        // The draw is re-read under the write lock so concurrent commits serialize.
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("failed to start transaction")?;

        let Some(mut record) = load_draw(&tx, draw_id)? else {
            return Err(anyhow!("draw not found: {draw_id}"));
        };
        if record.committed_at.is_some() {
            return Err(anyhow!("draw is already committed: {draw_id}"));
        }
        let AssignmentResult::Complete { assignments } = &record.result else {
            return Err(anyhow!(
                "only complete draws can be committed (draw {draw_id} is {})",
                record.result.status()
            ));
        };

        let now_text = now_rfc3339()?;
        let marked = tx
            .execute(
                "UPDATE draws SET committed_at = ?1 WHERE draw_id = ?2 AND committed_at IS NULL",
                params![now_text, draw_id.to_string()],
            )
            .context("failed to mark draw committed")?;
        if marked != 1 {
            return Err(anyhow!("draw is already committed: {draw_id}"));
        }

        for assignment in assignments {
            let Some(giver_id) = lookup_participant_id(&tx, "name", &assignment.giver)? else {
                return Err(anyhow!("giver is no longer registered: {}", assignment.giver));
            };
            insert_history_entry(&tx, giver_id, &assignment.receiver, Some(draw_id), &now_text)?;
        }
        tx.commit().context("failed to commit draw history")?;

        record.committed_at = Some(parse_rfc3339(&now_text)?);
        Ok(record)
    }

    /// Write a consistent copy of this database to `out_file`.
    ///
    /// # Errors
    /// Returns an error when backup directories cannot be created or backup fails.
    pub fn backup_database(&self, out_file: &Path) -> Result<()> {
        if let Some(parent) = out_file.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create parent directory for backup file {}", out_file.display())
            })?;
        }

        self.conn
            .backup(DatabaseName::Main, out_file, None)
            .with_context(|| format!("failed to create sqlite backup at {}", out_file.display()))
    }

    /// Restore this database from a `SQLite` backup file, then migrate to latest.
    ///
    /// # Errors
    /// Returns an error when the backup file is missing, restore fails, or migrations fail.
    pub fn restore_database(&mut self, in_file: &Path) -> Result<()> {
        if !in_file.exists() {
            return Err(anyhow!("backup file does not exist: {}", in_file.display()));
        }

        self.conn
            .restore(DatabaseName::Main, in_file, None::<fn(rusqlite::backup::Progress)>)
            .with_context(|| {
                format!("failed to restore sqlite backup from {}", in_file.display())
            })?;

        self.migrate()?;
        Ok(())
    }

    /// Run quick-check, foreign-key-check, and schema status health probes.
    ///
    /// # Errors
    /// Returns an error when any integrity probe query fails.
    pub fn integrity_check(&self) -> Result<IntegrityReport> {
        let quick_check_message: String = self
            .conn
            .query_row("PRAGMA quick_check", [], |row| row.get::<_, String>(0))
            .context("failed to run PRAGMA quick_check")?;

        let mut stmt = self
            .conn
            .prepare("PRAGMA foreign_key_check")
            .context("failed to prepare PRAGMA foreign_key_check")?;
        let rows = stmt.query_map([], |row| {
            Ok(ForeignKeyViolation {
                table: row.get(0)?,
                rowid: row.get(1)?,
                parent: row.get(2)?,
                fk_index: row.get(3)?,
            })
        })?;

        let mut foreign_key_violations = Vec::new();
        for row in rows {
            foreign_key_violations.push(row?);
        }

        let schema_status = self.schema_status()?;
        Ok(IntegrityReport {
            quick_check_ok: quick_check_message == "ok",
            quick_check_message,
            foreign_key_violations,
            schema_status,
        })
    }

    fn hydrate_participant(
        &self,
        participant_id_raw: &str,
        name: String,
        email: String,
        created_at: &str,
    ) -> Result<RegisteredParticipant> {
        let participant_id = parse_participant_id(participant_id_raw)?;

        let mut family_stmt = self.conn.prepare(
            "SELECT p.name
             FROM family_links f
             JOIN participants p ON p.participant_id = f.member_id
             WHERE f.participant_id = ?1
             ORDER BY p.name ASC",
        )?;
        let family = family_stmt
            .query_map(params![participant_id_raw], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to load family links")?;

        let mut history_stmt = self.conn.prepare(
            "SELECT receiver_name FROM history_entries WHERE giver_id = ?1 ORDER BY id ASC",
        )?;
        let history = history_stmt
            .query_map(params![participant_id_raw], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to load history entries")?;

        Ok(RegisteredParticipant {
            participant_id,
            name,
            email,
            family,
            history,
            created_at: parse_rfc3339(created_at)?,
        })
    }
}

const SELECT_DRAW_SQL: &str = "SELECT
    draw_id, created_at, seed, history_window, max_attempts, attempts,
    roster_sha256, result_json, committed_at
 FROM draws";

fn decode_draw(row: &rusqlite::Row<'_>) -> Result<DrawRecord> {
    let draw_id_raw: String = row.get(0)?;
    let seed_raw: Option<String> = row.get(2)?;
    let history_window: i64 = row.get(3)?;
    let result_json: String = row.get(7)?;
    let committed_at_raw: Option<String> = row.get(8)?;

    Ok(DrawRecord {
        draw_id: DrawId::parse(&draw_id_raw)?,
        created_at: parse_rfc3339(&row.get::<_, String>(1)?)?,
        seed: seed_raw
            .map(|raw| raw.parse::<u64>().with_context(|| format!("invalid stored seed: {raw}")))
            .transpose()?,
        history_window: usize::try_from(history_window)
            .with_context(|| format!("invalid stored history_window: {history_window}"))?,
        max_attempts: row.get(4)?,
        attempts: row.get(5)?,
        roster_sha256: row.get(6)?,
        result: serde_json::from_str(&result_json).context("failed to deserialize draw result")?,
        committed_at: committed_at_raw.as_deref().map(parse_rfc3339).transpose()?,
    })
}

fn load_draw(conn: &Connection, draw_id: DrawId) -> Result<Option<DrawRecord>> {
    let mut stmt = conn.prepare(&format!("{SELECT_DRAW_SQL} WHERE draw_id = ?1"))?;
    let mut rows = stmt.query(params![draw_id.to_string()])?;
    match rows.next()? {
        Some(row) => Ok(Some(decode_draw(row)?)),
        None => Ok(None),
    }
}

fn insert_participant(tx: &Transaction<'_>, input: &NewParticipant, now: &str) -> Result<String> {
    let name = input.name.trim();
    let email = input.email.trim();
    if name.is_empty() {
        return Err(anyhow!("participant name MUST be non-empty"));
    }
    if email.is_empty() {
        return Err(anyhow!("participant email MUST be non-empty"));
    }

    if lookup_participant_id(tx, "email", email)?.is_some() {
        return Err(anyhow!("participant is already registered: {email}"));
    }
    if lookup_participant_id(tx, "name", name)?.is_some() {
        return Err(anyhow!("participant name is already registered: {name}"));
    }

    let mut member_ids = Vec::with_capacity(input.family.len());
    for member in &input.family {
        let member = member.trim();
        if member == name {
            return Err(anyhow!("participant `{name}` cannot list itself as family"));
        }
        let Some(member_id) = lookup_participant_id(tx, "name", member)? else {
            return Err(anyhow!("family member is not registered: {member}"));
        };
        member_ids.push(member_id);
    }

    let participant_id = ParticipantId::new();
    tx.execute(
        "INSERT INTO participants(participant_id, name, email, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![participant_id.to_string(), name, email, now],
    )
    .context("failed to insert participant")?;

    for member_id in member_ids {
        for (from, to) in [(participant_id, member_id), (member_id, participant_id)] {
            tx.execute(
                "INSERT OR IGNORE INTO family_links(participant_id, member_id, created_at)
                 VALUES (?1, ?2, ?3)",
                params![from.to_string(), to.to_string(), now],
            )
            .context("failed to insert family link")?;
        }
    }

    for receiver in &input.history {
        insert_history_entry(tx, participant_id, receiver.trim(), None, now)?;
    }

    Ok(name.to_string())
}

fn lookup_participant_id(
    tx: &Transaction<'_>,
    column: &str,
    value: &str,
) -> Result<Option<ParticipantId>> {
    let sql = match column {
        "name" => "SELECT participant_id FROM participants WHERE name = ?1",
        "email" => "SELECT participant_id FROM participants WHERE email = ?1",
        other => return Err(anyhow!("unsupported participant lookup column: {other}")),
    };
    let raw = tx
        .query_row(sql, params![value], |row| row.get::<_, String>(0))
        .optional()
        .with_context(|| format!("failed to look up participant by {column}"))?;
    raw.as_deref().map(parse_participant_id).transpose()
}

fn insert_history_entry(
    tx: &Transaction<'_>,
    giver_id: ParticipantId,
    receiver: &str,
    draw_id: Option<DrawId>,
    recorded_at: &str,
) -> Result<()> {
    if receiver.is_empty() {
        return Err(anyhow!("history receiver MUST be non-empty"));
    }
    tx.execute(
        "INSERT INTO history_entries(giver_id, receiver_name, draw_id, recorded_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![giver_id.to_string(), receiver, draw_id.map(|id| id.to_string()), recorded_at],
    )
    .context("failed to insert history entry")?;
    Ok(())
}

fn current_schema_version(conn: &Connection) -> Result<i64> {
    let version = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_migrations", [], |row| {
            row.get::<_, i64>(0)
        })
        .context("failed to read current schema version")?;
    Ok(version)
}

fn record_schema_version(conn: &Connection, version: i64) -> Result<()> {
    let now = now_rfc3339()?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations(version, applied_at) VALUES (?1, ?2)",
        params![version, now],
    )
    .with_context(|| format!("failed to record migration version {version}"))?;
    Ok(())
}

fn now_rfc3339() -> Result<String> {
    rfc3339(OffsetDateTime::now_utc())
}

fn rfc3339(value: OffsetDateTime) -> Result<String> {
    value
        .format(&time::format_description::well_known::Rfc3339)
        .context("failed to format RFC3339 timestamp")
}

fn parse_rfc3339(value: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(value, &time::format_description::well_known::Rfc3339)
        .with_context(|| format!("invalid RFC3339 timestamp: {value}"))
}

fn parse_participant_id(raw: &str) -> Result<ParticipantId> {
    let parsed = Ulid::from_string(raw).with_context(|| format!("invalid ULID: {raw}"))?;
    Ok(ParticipantId(parsed))
}
