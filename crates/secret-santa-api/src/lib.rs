use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use secret_santa_core::{
    assign_with_retries, verify_complete_assignments, AssignmentResult, Participant,
};
use secret_santa_store_sqlite::{
    DrawId, DrawRecord, NewParticipant, RegisteredParticipant, SchemaStatus, SqliteStore,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

pub use secret_santa_core::DEFAULT_HISTORY_WINDOW;

pub const API_CONTRACT_VERSION: &str = "api.v1";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 25;
/// Largest accepted `max_attempts`; each attempt is a full pass over the roster.
pub const MAX_ATTEMPTS_LIMIT: u32 = 1000;
pub const NOTICE_SUBJECT: &str = "Secret Santa draw";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MigrateResult {
    pub dry_run: bool,
    pub current_version: i64,
    pub target_version: i64,
    pub would_apply_versions: Vec<i64>,
    pub after_version: Option<i64>,
    pub up_to_date: Option<bool>,
}

/// Bulk registration file: participants are registered in file order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RosterFile {
    pub participants: Vec<NewParticipant>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportResult {
    pub registered: Vec<RegisteredParticipant>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoveResult {
    pub name: String,
    pub removed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DrawRequest {
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub commit: bool,
}

impl Default for DrawRequest {
    fn default() -> Self {
        Self {
            history_window: DEFAULT_HISTORY_WINDOW,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            seed: None,
            commit: false,
        }
    }
}

/// Stateless engine request; also the on-disk format of `santa assign --file`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssignRequest {
    pub participants: Vec<Participant>,
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssignResponse {
    pub history_window: usize,
    pub max_attempts: u32,
    pub seed: Option<u64>,
    pub attempts: u32,
    pub roster_sha256: String,
    pub result: AssignmentResult,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notice {
    pub to: String,
    pub giver: String,
    pub receiver: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DrawNotices {
    pub draw_id: DrawId,
    pub notices: Vec<Notice>,
}

fn default_history_window() -> usize {
    DEFAULT_HISTORY_WINDOW
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

#[derive(Debug, Clone)]
pub struct SecretSantaApi {
    db_path: PathBuf,
}

impl SecretSantaApi {
    #[must_use]
    pub fn new(db_path: PathBuf) -> Self {
        Self { db_path }
    }

    fn open_store(&self) -> Result<SqliteStore> {
        SqliteStore::open(&self.db_path)
    }

    fn open_migrated_store(&self) -> Result<SqliteStore> {
        let mut store = self.open_store()?;
        store.migrate()?;
        Ok(store)
    }

    /// Inspect schema status without mutating data.
    ///
    /// # Errors
    /// Returns an error when the `SQLite` database cannot be opened or queried.
    pub fn schema_status(&self) -> Result<SchemaStatus> {
        let store = self.open_store()?;
        store.schema_status()
    }

    /// Apply pending migrations, or return planned versions for dry-run mode.
    ///
    /// # Errors
    /// Returns an error when migration planning or execution fails.
    pub fn migrate(&self, dry_run: bool) -> Result<MigrateResult> {
        let mut store = self.open_store()?;
        let before = store.schema_status()?;
        if dry_run {
            return Ok(MigrateResult {
                dry_run: true,
                current_version: before.current_version,
                target_version: before.target_version,
                would_apply_versions: before.pending_versions,
                after_version: None,
                up_to_date: None,
            });
        }

        let planned_versions = before.pending_versions;
        store.migrate()?;
        let after = store.schema_status()?;
        tracing::info!(
            from = before.current_version,
            to = after.current_version,
            "schema migrated"
        );
        Ok(MigrateResult {
            dry_run: false,
            current_version: before.current_version,
            target_version: before.target_version,
            would_apply_versions: planned_versions,
            after_version: Some(after.current_version),
            up_to_date: Some(after.pending_versions.is_empty()),
        })
    }

    /// Register one participant.
    ///
    /// # Errors
    /// Returns an error when validation or persistence fails.
    pub fn register_participant(&self, input: &NewParticipant) -> Result<RegisteredParticipant> {
        let mut store = self.open_migrated_store()?;
        let registered = store.register_participant(input)?;
        tracing::info!(
            participant = %registered.name,
            family = registered.family.len(),
            "participant registered"
        );
        Ok(registered)
    }

    /// Remove one participant by name.
    ///
    /// # Errors
    /// Returns an error when the delete fails.
    pub fn remove_participant(&self, name: &str) -> Result<RemoveResult> {
        let mut store = self.open_migrated_store()?;
        let removed = store.remove_participant(name)?;
        tracing::info!(participant = name, removed, "participant removal processed");
        Ok(RemoveResult { name: name.to_string(), removed })
    }

    /// List every registered participant with family and history.
    ///
    /// # Errors
    /// Returns an error when the registry cannot be read.
    pub fn list_participants(&self) -> Result<Vec<RegisteredParticipant>> {
        let store = self.open_migrated_store()?;
        store.list_participants()
    }

    /// Register every participant of a YAML (or JSON) roster file.
    ///
    /// The whole file is checked before anything is written: names and e-mails must be
    /// unique, and every family member must be registered already or appear earlier in
    /// the file. Entries are written in a single transaction, so a rejected entry leaves
    /// the registry untouched.
    ///
    /// # Errors
    /// Returns an error when the document cannot be parsed, fails validation, or a write
    /// fails.
    pub fn import_roster(&self, document: &str) -> Result<ImportResult> {
        let roster: RosterFile =
            serde_yaml::from_str(document).context("failed to parse roster document")?;
        let mut store = self.open_migrated_store()?;

        let existing = store.list_participants()?;
        let mut names = existing.iter().map(|p| p.name.clone()).collect::<BTreeSet<_>>();
        let mut emails = existing.iter().map(|p| p.email.clone()).collect::<BTreeSet<_>>();
        for entry in &roster.participants {
            let name = entry.name.trim().to_string();
            let email = entry.email.trim().to_string();
            for member in &entry.family {
                if !names.contains(member.trim()) {
                    return Err(anyhow!(
                        "family member `{member}` of `{name}` is not registered or listed earlier"
                    ));
                }
            }
            if !emails.insert(email.clone()) {
                return Err(anyhow!("participant is already registered: {email}"));
            }
            if !names.insert(name.clone()) {
                return Err(anyhow!("participant name is already registered: {name}"));
            }
        }

        let registered = store.register_participants(&roster.participants)?;
        tracing::info!(count = registered.len(), "roster imported");
        Ok(ImportResult { registered })
    }

    /// Run the engine over the registered roster and persist the outcome as a draw.
    ///
    /// A blocked or invalid draw is still persisted and returned. When `commit` is set and
    /// the draw is complete, receivers are appended to the givers' histories.
    ///
    /// # Errors
    /// Returns an error when the registry cannot be read, a complete result fails
    /// verification, or persistence fails.
    pub fn run_draw(&self, request: &DrawRequest) -> Result<DrawRecord> {
        let mut store = self.open_migrated_store()?;
        let roster = store
            .list_participants()?
            .iter()
            .map(RegisteredParticipant::to_participant)
            .collect::<Vec<_>>();

        let outcome =
            run_engine(&roster, request.history_window, request.max_attempts, request.seed)?;
        let record = DrawRecord {
            draw_id: DrawId::new(),
            created_at: OffsetDateTime::now_utc(),
            seed: request.seed,
            history_window: request.history_window,
            max_attempts: outcome.max_attempts,
            attempts: outcome.attempts,
            roster_sha256: outcome.roster_sha256,
            result: outcome.result,
            committed_at: None,
        };
        store.save_draw(&record)?;
        tracing::info!(
            draw_id = %record.draw_id,
            status = record.result.status(),
            attempts = record.attempts,
            "draw recorded"
        );

        if !request.commit {
            return Ok(record);
        }
        if !record.result.is_complete() {
            tracing::warn!(
                draw_id = %record.draw_id,
                status = record.result.status(),
                "draw not committed because it is not complete"
            );
            return Ok(record);
        }
        let committed = store.commit_draw(record.draw_id)?;
        tracing::info!(draw_id = %committed.draw_id, "draw committed");
        Ok(committed)
    }

    /// Load one persisted draw.
    ///
    /// # Errors
    /// Returns an error when the id is malformed or the draw does not exist.
    pub fn show_draw(&self, draw_id: &str) -> Result<DrawRecord> {
        let draw_id = DrawId::parse(draw_id)?;
        let store = self.open_migrated_store()?;
        store.get_draw(draw_id)?.ok_or_else(|| anyhow!("draw not found: {draw_id}"))
    }

    /// List persisted draws, newest first.
    ///
    /// # Errors
    /// Returns an error when the ledger cannot be read.
    pub fn list_draws(&self) -> Result<Vec<DrawRecord>> {
        let store = self.open_migrated_store()?;
        store.list_draws()
    }

    /// Commit a complete draw into participant histories.
    ///
    /// # Errors
    /// Returns an error when the id is malformed or the draw cannot be committed.
    pub fn commit_draw(&self, draw_id: &str) -> Result<DrawRecord> {
        let draw_id = DrawId::parse(draw_id)?;
        let mut store = self.open_migrated_store()?;
        let committed = store.commit_draw(draw_id)?;
        tracing::info!(%draw_id, "draw committed");
        Ok(committed)
    }

    /// Render one notice per assignment of a complete draw, addressed to the giver.
    ///
    /// # Errors
    /// Returns an error when the draw is unknown or not complete, or a giver is no
    /// longer registered.
    pub fn draw_notices(&self, draw_id: &str) -> Result<DrawNotices> {
        let draw_id = DrawId::parse(draw_id)?;
        let store = self.open_migrated_store()?;
        let record =
            store.get_draw(draw_id)?.ok_or_else(|| anyhow!("draw not found: {draw_id}"))?;
        let AssignmentResult::Complete { assignments } = &record.result else {
            return Err(anyhow!(
                "notices are only available for complete draws (draw {draw_id} is {})",
                record.result.status()
            ));
        };

        let mut notices = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            let giver = store
                .get_participant(&assignment.giver)?
                .ok_or_else(|| anyhow!("giver is no longer registered: {}", assignment.giver))?;
            notices.push(Notice {
                to: giver.email,
                giver: assignment.giver.clone(),
                receiver: assignment.receiver.clone(),
                subject: NOTICE_SUBJECT.to_string(),
                body: render_notice_body(&assignment.giver, &assignment.receiver),
            });
        }
        Ok(DrawNotices { draw_id, notices })
    }

    /// Run the engine over a caller-supplied roster without touching the database.
    ///
    /// # Errors
    /// Returns an error when a complete result fails verification.
    pub fn assign(&self, request: &AssignRequest) -> Result<AssignResponse> {
        assign_stateless(request)
    }
}

/// Stateless engine entry point shared by [`SecretSantaApi::assign`] and callers that have
/// no database at all.
///
/// # Errors
/// Returns an error when a complete result fails verification.
pub fn assign_stateless(request: &AssignRequest) -> Result<AssignResponse> {
    let outcome = run_engine(
        &request.participants,
        request.history_window,
        request.max_attempts,
        request.seed,
    )?;
    Ok(AssignResponse {
        history_window: request.history_window,
        max_attempts: outcome.max_attempts,
        seed: request.seed,
        attempts: outcome.attempts,
        roster_sha256: outcome.roster_sha256,
        result: outcome.result,
    })
}

/// Parse a stateless roster document (YAML or JSON) into an [`AssignRequest`].
///
/// # Errors
/// Returns an error when the document does not match the request shape.
pub fn parse_assign_document(document: &str) -> Result<AssignRequest> {
    serde_yaml::from_str(document).context("failed to parse roster document")
}

#[must_use]
pub fn render_notice_body(giver: &str, receiver: &str) -> String {
    format!("Hi {giver}, you will be the secret santa of {receiver}. Happy holidays!")
}

/// Stable fingerprint of a roster: participants sorted by identity, with family and
/// history included.
#[must_use]
pub fn roster_sha256(participants: &[Participant]) -> String {
    let mut sorted = participants.iter().collect::<Vec<_>>();
    sorted.sort_by(|left, right| left.identity.cmp(&right.identity));

    let mut hasher = Sha256::new();
    for participant in sorted {
        hasher.update(participant.identity.as_bytes());
        hasher.update([0x1f]);
        for member in &participant.family_exclusions {
            hasher.update(b"f:");
            hasher.update(member.as_bytes());
            hasher.update([0x1f]);
        }
        for receiver in &participant.history {
            hasher.update(b"h:");
            hasher.update(receiver.as_bytes());
            hasher.update([0x1f]);
        }
        hasher.update([0x1e]);
    }

    let digest = hasher.finalize();
    format!("sha256:{digest:x}")
}

struct EngineRun {
    max_attempts: u32,
    attempts: u32,
    roster_sha256: String,
    result: AssignmentResult,
}

fn run_engine(
    participants: &[Participant],
    history_window: usize,
    max_attempts: u32,
    seed: Option<u64>,
) -> Result<EngineRun> {
    if max_attempts > MAX_ATTEMPTS_LIMIT {
        return Err(anyhow!(
            "max_attempts must be at most {MAX_ATTEMPTS_LIMIT} (got {max_attempts})"
        ));
    }
    let max_attempts = max_attempts.max(1);
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let outcome = assign_with_retries(participants, history_window, max_attempts, &mut rng);
    tracing::debug!(
        participants = participants.len(),
        history_window,
        attempts = outcome.attempts,
        status = outcome.result.status(),
        "assignment engine finished"
    );

    match &outcome.result {
        AssignmentResult::Complete { assignments } => {
            verify_complete_assignments(participants, assignments, history_window)
                .context("engine produced an inconsistent assignment set")?;
        }
        AssignmentResult::Blocked { blocked_giver, rejections, .. } => {
            tracing::warn!(
                blocked_giver = %blocked_giver,
                rejections = rejections.len(),
                attempts = outcome.attempts,
                "no acceptable receiver left for giver"
            );
        }
        AssignmentResult::InvalidInput { reason, identity } => {
            tracing::warn!(reason = reason.as_str(), identity = ?identity, "roster rejected");
        }
    }

    Ok(EngineRun {
        max_attempts,
        attempts: outcome.attempts,
        roster_sha256: roster_sha256(participants),
        result: outcome.result,
    })
}
