use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Number of most recent receivers of a giver that may not be drawn again.
pub const DEFAULT_HISTORY_WINDOW: usize = 3;

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum SantaError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("assignment violation: {0}")]
    Violation(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Participant {
    pub identity: String,
    #[serde(default)]
    pub family_exclusions: BTreeSet<String>,
    /// Prior receivers of this participant, most recent last.
    #[serde(default)]
    pub history: Vec<String>,
}

impl Participant {
    #[must_use]
    pub fn new(identity: impl Into<String>) -> Self {
        Self { identity: identity.into(), family_exclusions: BTreeSet::new(), history: Vec::new() }
    }

    #[must_use]
    pub fn with_family<I, S>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.family_exclusions.extend(members.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_history<I, S>(mut self, receivers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.history.extend(receivers.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn recent_receivers(&self, history_window: usize) -> &[String] {
        let start = self.history.len().saturating_sub(history_window);
        &self.history[start..]
    }

    #[must_use]
    pub fn is_family_of(&self, other: &Self) -> bool {
        self.family_exclusions.contains(&other.identity)
            || other.family_exclusions.contains(&self.identity)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Assignment {
    pub giver: String,
    pub receiver: String,
}

impl Display for Assignment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.giver, self.receiver)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum BlockedReason {
    ConstraintsExhausted,
}

impl BlockedReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConstraintsExhausted => "constraints-exhausted",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum InvalidInputReason {
    EmptyParticipants,
    DuplicateIdentity,
}

impl InvalidInputReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EmptyParticipants => "empty-participants",
            Self::DuplicateIdentity => "duplicate-identity",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    SelfAssignment,
    FamilyExclusion,
    AlreadyClaimed,
    RecentHistory,
}

impl RejectionReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SelfAssignment => "self_assignment",
            Self::FamilyExclusion => "family_exclusion",
            Self::AlreadyClaimed => "already_claimed",
            Self::RecentHistory => "recent_history",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Rejection {
    pub candidate: String,
    pub reason: RejectionReason,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AssignmentResult {
    Complete {
        assignments: Vec<Assignment>,
    },
    Blocked {
        assignments: Vec<Assignment>,
        blocked_giver: String,
        reason: BlockedReason,
        /// Every candidate probed for the blocked giver, in probe order.
        rejections: Vec<Rejection>,
    },
    InvalidInput {
        reason: InvalidInputReason,
        identity: Option<String>,
    },
}

impl AssignmentResult {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }

    /// Assignments produced by the run; empty for invalid input.
    #[must_use]
    pub fn assignments(&self) -> &[Assignment] {
        match self {
            Self::Complete { assignments } | Self::Blocked { assignments, .. } => assignments,
            Self::InvalidInput { .. } => &[],
        }
    }

    #[must_use]
    pub fn status(&self) -> &'static str {
        match self {
            Self::Complete { .. } => "complete",
            Self::Blocked { .. } => "blocked",
            Self::InvalidInput { .. } => "invalid_input",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct RetryOutcome {
    pub attempts: u32,
    pub result: AssignmentResult,
}

fn check_roster(participants: &[Participant]) -> Option<AssignmentResult> {
    if participants.is_empty() {
        return Some(AssignmentResult::InvalidInput {
            reason: InvalidInputReason::EmptyParticipants,
            identity: None,
        });
    }

    let mut seen = BTreeSet::new();
    for participant in participants {
        if !seen.insert(participant.identity.as_str()) {
            return Some(AssignmentResult::InvalidInput {
                reason: InvalidInputReason::DuplicateIdentity,
                identity: Some(participant.identity.clone()),
            });
        }
    }

    None
}

fn check_candidate(
    giver: &Participant,
    candidate: &Participant,
    claimed: &BTreeSet<&str>,
    history_window: usize,
) -> Result<(), RejectionReason> {
    if candidate.identity == giver.identity {
        return Err(RejectionReason::SelfAssignment);
    }

    if giver.is_family_of(candidate) {
        return Err(RejectionReason::FamilyExclusion);
    }

    if claimed.contains(candidate.identity.as_str()) {
        return Err(RejectionReason::AlreadyClaimed);
    }

    if giver.recent_receivers(history_window).contains(&candidate.identity) {
        return Err(RejectionReason::RecentHistory);
    }

    Ok(())
}

/// Run one assignment pass with the thread-local random source.
#[must_use]
pub fn assign(participants: &[Participant], history_window: usize) -> AssignmentResult {
    assign_with_rng(participants, history_window, &mut rand::thread_rng())
}

/// Run one assignment pass with a seeded random source, for replayable draws.
#[must_use]
pub fn assign_seeded(
    participants: &[Participant],
    history_window: usize,
    seed: u64,
) -> AssignmentResult {
    assign_with_rng(participants, history_window, &mut StdRng::seed_from_u64(seed))
}

/// Shuffle the roster once, then give each giver the first acceptable candidate found by
/// probing forward from its own shuffled slot with wraparound.
///
/// The shuffle is the only use of `rng`; everything after it is deterministic.
#[must_use]
pub fn assign_with_rng<R>(
    participants: &[Participant],
    history_window: usize,
    rng: &mut R,
) -> AssignmentResult
where
    R: Rng + ?Sized,
{
    if let Some(invalid) = check_roster(participants) {
        return invalid;
    }

    let mut order = participants.iter().collect::<Vec<_>>();
    order.shuffle(rng);

    let total = order.len();
    let mut claimed = BTreeSet::new();
    let mut assignments = Vec::with_capacity(total);

    for (index, giver) in order.iter().enumerate() {
        let mut rejections = Vec::new();
        let mut receiver = None;

        for probe in 0..total {
            let candidate = order[(index + probe) % total];
            match check_candidate(giver, candidate, &claimed, history_window) {
                Ok(()) => {
                    receiver = Some(candidate);
                    break;
                }
                Err(reason) => {
                    rejections.push(Rejection { candidate: candidate.identity.clone(), reason });
                }
            }
        }

        let Some(receiver) = receiver else {
            return AssignmentResult::Blocked {
                assignments,
                blocked_giver: giver.identity.clone(),
                reason: BlockedReason::ConstraintsExhausted,
                rejections,
            };
        };

        claimed.insert(receiver.identity.as_str());
        assignments.push(Assignment {
            giver: giver.identity.clone(),
            receiver: receiver.identity.clone(),
        });
    }

    AssignmentResult::Complete { assignments }
}

/// Re-run [`assign_with_rng`] with fresh shuffles until a run completes, the input is
/// rejected, or `max_attempts` runs have been made. `max_attempts` of zero counts as one.
#[must_use]
pub fn assign_with_retries<R>(
    participants: &[Participant],
    history_window: usize,
    max_attempts: u32,
    rng: &mut R,
) -> RetryOutcome
where
    R: Rng + ?Sized,
{
    let max_attempts = max_attempts.max(1);
    let mut attempts = 0;
    loop {
        attempts += 1;
        let result = assign_with_rng(participants, history_window, rng);
        if !matches!(result, AssignmentResult::Blocked { .. }) || attempts >= max_attempts {
            return RetryOutcome { attempts, result };
        }
    }
}

/// Check an assignment set against the roster: known identities, no self or family
/// pairs, no recent-history repeats, and each giver and receiver used at most once.
///
/// # Errors
/// Returns [`SantaError::Validation`] when the roster itself is empty or has duplicate
/// identities, and [`SantaError::Violation`] for the first broken assignment invariant.
pub fn verify_assignments(
    participants: &[Participant],
    assignments: &[Assignment],
    history_window: usize,
) -> Result<(), SantaError> {
    if let Some(AssignmentResult::InvalidInput { reason, .. }) = check_roster(participants) {
        return Err(SantaError::Validation(format!("roster is invalid: {}", reason.as_str())));
    }

    let by_identity = participants
        .iter()
        .map(|participant| (participant.identity.as_str(), participant))
        .collect::<BTreeMap<_, _>>();
    let mut givers = BTreeSet::new();
    let mut receivers = BTreeSet::new();

    for assignment in assignments {
        let Some(giver) = by_identity.get(assignment.giver.as_str()) else {
            return Err(SantaError::Violation(format!(
                "giver `{}` is not a participant",
                assignment.giver
            )));
        };
        let Some(receiver) = by_identity.get(assignment.receiver.as_str()) else {
            return Err(SantaError::Violation(format!(
                "receiver `{}` is not a participant",
                assignment.receiver
            )));
        };

        if !givers.insert(giver.identity.as_str()) {
            return Err(SantaError::Violation(format!(
                "giver `{}` appears more than once",
                giver.identity
            )));
        }
        if !receivers.insert(receiver.identity.as_str()) {
            return Err(SantaError::Violation(format!(
                "receiver `{}` appears more than once",
                receiver.identity
            )));
        }

        let claimed = BTreeSet::new();
        if let Err(reason) = check_candidate(giver, receiver, &claimed, history_window) {
            return Err(SantaError::Violation(format!(
                "{assignment} breaks rule {}",
                reason.as_str()
            )));
        }
    }

    Ok(())
}

/// [`verify_assignments`] plus the requirement that every participant gives exactly once.
///
/// # Errors
/// Returns the same errors as [`verify_assignments`], or [`SantaError::Violation`] when a
/// participant has no assignment.
pub fn verify_complete_assignments(
    participants: &[Participant],
    assignments: &[Assignment],
    history_window: usize,
) -> Result<(), SantaError> {
    verify_assignments(participants, assignments, history_window)?;

    let givers =
        assignments.iter().map(|assignment| assignment.giver.as_str()).collect::<BTreeSet<_>>();
    for participant in participants {
        if !givers.contains(participant.identity.as_str()) {
            return Err(SantaError::Violation(format!(
                "participant `{}` has no receiver",
                participant.identity
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn roster(names: &[&str]) -> Vec<Participant> {
        names.iter().map(|name| Participant::new(*name)).collect()
    }

    fn receiver_of<'a>(assignments: &'a [Assignment], giver: &str) -> Option<&'a str> {
        assignments
            .iter()
            .find(|assignment| assignment.giver == giver)
            .map(|assignment| assignment.receiver.as_str())
    }

    fn build_roster(
        size: usize,
        family_pairs: &[(usize, usize)],
        histories: &[Vec<usize>],
    ) -> Vec<Participant> {
        let names = (0..size).map(|index| format!("p{index}")).collect::<Vec<_>>();
        let mut participants =
            names.iter().map(|name| Participant::new(name.clone())).collect::<Vec<_>>();
        for (lhs, rhs) in family_pairs {
            if lhs != rhs {
                participants[*lhs].family_exclusions.insert(names[*rhs].clone());
            }
        }
        for (index, history) in histories.iter().enumerate().take(size) {
            participants[index].history =
                history.iter().map(|receiver| names[*receiver].clone()).collect();
        }
        participants
    }

    fn roster_strategy() -> impl Strategy<Value = Vec<Participant>> {
        (1_usize..10)
            .prop_flat_map(|size| {
                (
                    Just(size),
                    proptest::collection::vec((0..size, 0..size), 0..size),
                    proptest::collection::vec(proptest::collection::vec(0..size, 0..5), size),
                )
            })
            .prop_map(|(size, family_pairs, histories)| {
                build_roster(size, &family_pairs, &histories)
            })
    }

    // Test IDs: TENG-001
    #[test]
    fn empty_roster_is_invalid_input() {
        let result = assign(&[], DEFAULT_HISTORY_WINDOW);
        assert_eq!(
            result,
            AssignmentResult::InvalidInput {
                reason: InvalidInputReason::EmptyParticipants,
                identity: None
            }
        );
    }

    // Test IDs: TENG-002
    #[test]
    fn duplicate_identity_is_invalid_input() {
        let result = assign(&roster(&["A", "A"]), DEFAULT_HISTORY_WINDOW);
        assert_eq!(
            result,
            AssignmentResult::InvalidInput {
                reason: InvalidInputReason::DuplicateIdentity,
                identity: Some("A".to_string())
            }
        );
    }

    // Test IDs: TENG-003
    #[test]
    fn unconstrained_four_person_roster_is_a_full_derangement() {
        let participants = roster(&["A", "B", "C", "D"]);
        for seed in 0..64 {
            let result = assign_seeded(&participants, DEFAULT_HISTORY_WINDOW, seed);
            let AssignmentResult::Complete { assignments } = &result else {
                panic!("expected complete result for seed {seed}: {result:?}");
            };
            assert_eq!(assignments.len(), 4);
            assert!(assignments.iter().all(|assignment| assignment.giver != assignment.receiver));
            if let Err(err) =
                verify_complete_assignments(&participants, assignments, DEFAULT_HISTORY_WINDOW)
            {
                panic!("seed {seed} produced invalid assignments: {err}");
            }
        }
    }

    // Test IDs: TENG-004
    #[test]
    fn single_participant_is_blocked_on_self() {
        let result = assign(&roster(&["Solo"]), DEFAULT_HISTORY_WINDOW);
        assert_eq!(
            result,
            AssignmentResult::Blocked {
                assignments: vec![],
                blocked_giver: "Solo".to_string(),
                reason: BlockedReason::ConstraintsExhausted,
                rejections: vec![Rejection {
                    candidate: "Solo".to_string(),
                    reason: RejectionReason::SelfAssignment
                }],
            }
        );
    }

    // Test IDs: TENG-005
    #[test]
    fn mutual_family_pair_is_blocked_without_assignments() {
        let participants =
            vec![Participant::new("A").with_family(["B"]), Participant::new("B").with_family(["A"])];
        for seed in 0..16 {
            let AssignmentResult::Blocked { assignments, blocked_giver, reason, rejections } =
                assign_seeded(&participants, DEFAULT_HISTORY_WINDOW, seed)
            else {
                panic!("expected blocked result for seed {seed}");
            };
            assert!(assignments.is_empty());
            assert!(blocked_giver == "A" || blocked_giver == "B");
            assert_eq!(reason, BlockedReason::ConstraintsExhausted);
            assert_eq!(rejections.len(), 2);
            assert!(rejections
                .iter()
                .any(|rejection| rejection.reason == RejectionReason::FamilyExclusion));
        }
    }

    // Test IDs: TENG-006
    #[test]
    fn exclusion_cycle_over_three_people_is_blocked() {
        let participants = vec![
            Participant::new("A").with_family(["B"]),
            Participant::new("B").with_family(["C"]),
            Participant::new("C").with_family(["A"]),
        ];
        for seed in 0..16 {
            let result = assign_seeded(&participants, DEFAULT_HISTORY_WINDOW, seed);
            let AssignmentResult::Blocked { assignments, .. } = &result else {
                panic!("expected blocked result for seed {seed}: {result:?}");
            };
            assert!(assignments.is_empty());
        }
    }

    // Test IDs: TENG-007
    #[test]
    fn family_exclusion_applies_in_both_directions() {
        let participants = vec![
            Participant::new("A").with_family(["B"]),
            Participant::new("B"),
            Participant::new("C"),
            Participant::new("D"),
        ];
        for seed in 0..64 {
            let result = assign_seeded(&participants, DEFAULT_HISTORY_WINDOW, seed);
            let assignments = result.assignments();
            assert_ne!(receiver_of(assignments, "A"), Some("B"));
            assert_ne!(receiver_of(assignments, "B"), Some("A"));
        }
    }

    // Test IDs: TENG-008
    #[test]
    fn recent_history_of_the_giver_is_excluded() {
        let participants = vec![
            Participant::new("A").with_history(["B", "C"]),
            Participant::new("B"),
            Participant::new("C"),
            Participant::new("D"),
        ];
        let mut rng = StdRng::seed_from_u64(7);
        let outcome = assign_with_retries(&participants, DEFAULT_HISTORY_WINDOW, 50, &mut rng);
        let AssignmentResult::Complete { assignments } = &outcome.result else {
            panic!("expected complete result: {outcome:?}");
        };
        assert_eq!(receiver_of(assignments, "A"), Some("D"));
    }

    // Test IDs: TENG-009
    #[test]
    fn history_window_only_covers_most_recent_entries() {
        let participants = vec![
            Participant::new("A").with_history(["B", "C", "D", "Z"]),
            Participant::new("B"),
            Participant::new("C"),
            Participant::new("D"),
        ];
        assert_eq!(participants[0].recent_receivers(3), ["C", "D", "Z"]);
        assert!(participants[0].recent_receivers(0).is_empty());

        let mut rng = StdRng::seed_from_u64(11);
        let outcome = assign_with_retries(&participants, 3, 50, &mut rng);
        assert_eq!(receiver_of(outcome.result.assignments(), "A"), Some("B"));

        let mut seen = BTreeSet::new();
        for seed in 0..128 {
            if let AssignmentResult::Complete { assignments } = assign_seeded(&participants, 1, seed)
            {
                if let Some(receiver) = receiver_of(&assignments, "A") {
                    seen.insert(receiver.to_string());
                }
            }
        }
        assert_eq!(seen.len(), 3, "window=1 should leave B, C and D drawable: {seen:?}");
    }

    // Test IDs: TENG-010
    #[test]
    fn candidates_history_is_not_consulted() {
        // B may not give to A again, so the only valid draw is A -> B -> C -> A.
        let participants = vec![
            Participant::new("A"),
            Participant::new("B").with_history(["A"]),
            Participant::new("C"),
        ];
        let mut rng = StdRng::seed_from_u64(3);
        let outcome = assign_with_retries(&participants, DEFAULT_HISTORY_WINDOW, 50, &mut rng);
        assert!(outcome.result.is_complete(), "expected complete result: {outcome:?}");
        assert_eq!(receiver_of(outcome.result.assignments(), "A"), Some("B"));
        assert_eq!(receiver_of(outcome.result.assignments(), "B"), Some("C"));
    }

    // Test IDs: TENG-011
    #[test]
    fn seeded_runs_are_deterministic() {
        let participants = roster(&["Ana", "Bruno", "Carla", "Diego", "Elena", "Fede"]);
        for seed in [0_u64, 1, 42, u64::MAX] {
            assert_eq!(
                assign_seeded(&participants, DEFAULT_HISTORY_WINDOW, seed),
                assign_seeded(&participants, DEFAULT_HISTORY_WINDOW, seed)
            );
        }
    }

    // Test IDs: TENG-012
    #[test]
    fn input_roster_is_not_mutated() {
        let participants = vec![
            Participant::new("A").with_family(["B"]).with_history(["C"]),
            Participant::new("B").with_family(["A"]),
            Participant::new("C").with_history(["D"]),
            Participant::new("D"),
        ];
        let before = participants.clone();
        for seed in 0..16 {
            let _ = assign_seeded(&participants, DEFAULT_HISTORY_WINDOW, seed);
        }
        assert_eq!(participants, before);
    }

    // Test IDs: TENG-013
    #[test]
    fn retries_recover_from_unlucky_shuffles() {
        let participants = vec![
            Participant::new("A").with_family(["B"]),
            Participant::new("B").with_family(["A"]),
            Participant::new("C").with_family(["D"]),
            Participant::new("D").with_family(["C"]),
        ];
        let mut rng = StdRng::seed_from_u64(2024);
        let outcome = assign_with_retries(&participants, DEFAULT_HISTORY_WINDOW, 100, &mut rng);
        assert!(outcome.result.is_complete(), "retries should find a valid draw: {outcome:?}");
        assert!(outcome.attempts >= 1);
        if let Err(err) = verify_complete_assignments(
            &participants,
            outcome.result.assignments(),
            DEFAULT_HISTORY_WINDOW,
        ) {
            panic!("retried draw is invalid: {err}");
        }
    }

    // Test IDs: TENG-014
    #[test]
    fn retries_stop_at_the_attempt_budget() {
        let participants =
            vec![Participant::new("A").with_family(["B"]), Participant::new("B").with_family(["A"])];
        let mut rng = StdRng::seed_from_u64(5);
        let outcome = assign_with_retries(&participants, DEFAULT_HISTORY_WINDOW, 4, &mut rng);
        assert_eq!(outcome.attempts, 4);
        assert_eq!(outcome.result.status(), "blocked");

        let outcome = assign_with_retries(&participants, DEFAULT_HISTORY_WINDOW, 0, &mut rng);
        assert_eq!(outcome.attempts, 1);

        let outcome = assign_with_retries(&[], DEFAULT_HISTORY_WINDOW, 10, &mut rng);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.result.status(), "invalid_input");
    }

    // Test IDs: TENG-015
    #[test]
    fn each_receiver_is_drawn_with_roughly_equal_frequency() {
        let participants = roster(&["A", "B", "C", "D"]);
        let mut counts = BTreeMap::new();
        let runs = 3_000_u64;
        for seed in 0..runs {
            let result = assign_seeded(&participants, DEFAULT_HISTORY_WINDOW, seed);
            let Some(receiver) = receiver_of(result.assignments(), "A") else {
                panic!("A should always give for seed {seed}");
            };
            *counts.entry(receiver.to_string()).or_insert(0_u64) += 1;
        }

        assert_eq!(counts.len(), 3);
        for (receiver, count) in counts {
            assert!(
                (850..=1_150).contains(&count),
                "receiver {receiver} drawn {count} times out of {runs}"
            );
        }
    }

    // Test IDs: TENG-016
    #[test]
    fn verify_rejects_broken_assignment_sets() {
        let participants = vec![
            Participant::new("A").with_family(["B"]),
            Participant::new("B"),
            Participant::new("C").with_history(["A"]),
        ];
        let pair = |giver: &str, receiver: &str| Assignment {
            giver: giver.to_string(),
            receiver: receiver.to_string(),
        };
        let cases = [
            (vec![pair("A", "A")], "self_assignment"),
            (vec![pair("B", "A")], "family_exclusion"),
            (vec![pair("C", "A")], "recent_history"),
            (vec![pair("A", "C"), pair("B", "C")], "appears more than once"),
            (vec![pair("A", "X")], "not a participant"),
        ];
        for (assignments, expected) in cases {
            let Err(err) = verify_assignments(&participants, &assignments, DEFAULT_HISTORY_WINDOW)
            else {
                panic!("expected violation containing `{expected}`");
            };
            assert!(err.to_string().contains(expected), "`{err}` did not contain `{expected}`");
        }

        let partial = vec![pair("A", "C")];
        assert!(verify_assignments(&participants, &partial, DEFAULT_HISTORY_WINDOW).is_ok());
        assert!(verify_complete_assignments(&participants, &partial, DEFAULT_HISTORY_WINDOW)
            .is_err());
    }

    // Test IDs: TENG-017
    #[test]
    fn result_json_uses_stable_status_and_reason_codes() {
        let blocked = AssignmentResult::Blocked {
            assignments: vec![],
            blocked_giver: "A".to_string(),
            reason: BlockedReason::ConstraintsExhausted,
            rejections: vec![Rejection {
                candidate: "B".to_string(),
                reason: RejectionReason::FamilyExclusion,
            }],
        };
        let value = serde_json::to_value(&blocked)
            .unwrap_or_else(|err| panic!("blocked result should serialize: {err}"));
        assert_eq!(value["status"], "blocked");
        assert_eq!(value["blocked_giver"], "A");
        assert_eq!(value["reason"], "constraints-exhausted");
        assert_eq!(value["rejections"][0]["reason"], "family_exclusion");

        let invalid = AssignmentResult::InvalidInput {
            reason: InvalidInputReason::DuplicateIdentity,
            identity: Some("A".to_string()),
        };
        let value = serde_json::to_value(&invalid)
            .unwrap_or_else(|err| panic!("invalid result should serialize: {err}"));
        assert_eq!(value["status"], "invalid_input");
        assert_eq!(value["reason"], "duplicate-identity");

        let participant: Participant = serde_json::from_str(r#"{"identity":"Ana"}"#)
            .unwrap_or_else(|err| panic!("participant defaults should apply: {err}"));
        assert!(participant.family_exclusions.is_empty());
        assert!(participant.history.is_empty());
    }

    // Test IDs: TPROP-001
    proptest! {
        #[test]
        fn property_results_respect_every_invariant(
            participants in roster_strategy(),
            seed in any::<u64>(),
            history_window in 0_usize..5,
        ) {
            let result = assign_seeded(&participants, history_window, seed);
            match &result {
                AssignmentResult::Complete { assignments } => {
                    prop_assert_eq!(assignments.len(), participants.len());
                    prop_assert!(
                        verify_complete_assignments(&participants, assignments, history_window)
                            .is_ok()
                    );
                }
                AssignmentResult::Blocked { assignments, blocked_giver, rejections, .. } => {
                    prop_assert!(assignments.len() < participants.len());
                    prop_assert!(
                        verify_assignments(&participants, assignments, history_window).is_ok()
                    );
                    prop_assert!(assignments.iter().all(|a| &a.giver != blocked_giver));
                    prop_assert_eq!(rejections.len(), participants.len());
                }
                AssignmentResult::InvalidInput { .. } => {
                    prop_assert!(false, "generated rosters are always valid");
                }
            }
        }
    }

    // Test IDs: TPROP-002
    proptest! {
        #[test]
        fn property_seeded_runs_replay_identically(
            participants in roster_strategy(),
            seed in any::<u64>(),
        ) {
            let first = assign_seeded(&participants, DEFAULT_HISTORY_WINDOW, seed);
            let second = assign_seeded(&participants, DEFAULT_HISTORY_WINDOW, seed);
            prop_assert_eq!(first, second);
        }
    }
}
