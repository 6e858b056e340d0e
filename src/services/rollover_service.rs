//! Rollover reconciler: settles streaks for the ending day, clears guesses and
//! promotes the staged song.

use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::{
    dao::{
        models::{DailySongEntity, GuessesEntity, SlotKey, StatisticsEntity},
        persistence::PersistenceResult,
        rotation_store::RotationStore,
    },
    error::{ServiceError, UserFailure},
    services::pipeline::{PipelineError, PipelineStep},
    state::SharedState,
};

/// Counters reported by a rollover run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Users whose streak was reset on an existing record.
    pub streaks_reset: usize,
    /// Users that got a zeroed record because they had none.
    pub statistics_created: usize,
    /// Users that completed the day; left untouched.
    pub kept: usize,
}

/// Outcome of a rollover run.
#[derive(Debug, Clone)]
pub struct RolloverSummary {
    pub run_id: Uuid,
    /// Day that is now current.
    pub heardle_day: u32,
    /// Reconciliation was skipped because an interrupted run had already
    /// settled the day.
    pub resumed: bool,
    pub report: ReconcileReport,
    pub guesses_cleared: u64,
    /// Content of the `current` slot after promotion.
    pub current: DailySongEntity,
}

/// What reconciliation does with a single user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreakDecision {
    /// Completed the day; statistics stay as they are.
    Keep,
    /// Write back the record with its streak reset.
    Reset(StatisticsEntity),
    /// No record existed; store a zeroed one.
    Create(StatisticsEntity),
}

/// Decide the statistics update for a user.
///
/// Only a last guess marked correct keeps the streak; no guesses at all, an
/// incorrect or a pending last guess reset it.
pub fn decide_streak(
    user_id: &str,
    guesses: Option<&GuessesEntity>,
    statistics: Option<StatisticsEntity>,
) -> StreakDecision {
    if guesses.is_some_and(GuessesEntity::completed_daily) {
        return StreakDecision::Keep;
    }

    match statistics {
        Some(statistics) => StreakDecision::Reset(StatisticsEntity {
            current_streak: 0,
            ..statistics
        }),
        None => StreakDecision::Create(StatisticsEntity::empty(user_id)),
    }
}

/// Validate that `next` is the day following `current` and return its number.
///
/// A `next` that is not ahead of `current` has already been promoted, which
/// makes a repeated rollover fail without side effects. A missing `current`
/// is the first rollover of a fresh deployment and is accepted as is.
pub fn check_sequence(
    current: Option<&DailySongEntity>,
    next: &DailySongEntity,
) -> Result<u32, ServiceError> {
    let next_day = next
        .heardle_day
        .ok_or_else(|| ServiceError::InvalidState("next daily song has no heardle_day".into()))?;

    let Some(current) = current else {
        return Ok(next_day);
    };
    let current_day = current.heardle_day.ok_or_else(|| {
        ServiceError::InvalidState("current daily song has no heardle_day".into())
    })?;

    if next_day <= current_day {
        return Err(ServiceError::InvalidState(format!(
            "day {next_day} was already promoted (current day is {current_day})"
        )));
    }
    if next_day != current_day + 1 {
        return Err(ServiceError::InvalidState(format!(
            "next day {next_day} does not follow current day {current_day}"
        )));
    }

    Ok(next_day)
}

/// Close the ongoing day and promote the staged song.
///
/// Slots are validated first, so a run with nothing to promote changes
/// nothing. Every user is reconciled even when some fail; failures stop the
/// run before guesses are purged. Once all users are reconciled `current` is
/// marked settled, so a retry after a later failure skips reconciliation
/// instead of judging users against an already purged guess store.
pub async fn roll_over(state: &SharedState) -> Result<RolloverSummary, PipelineError> {
    let run_id = Uuid::new_v4();
    let span = info_span!("roll_over", %run_id);

    async move {
        let _gate = state.rotation_gate().lock().await;
        let summary = run(state, run_id).await?;
        info!(
            heardle_day = summary.heardle_day,
            resumed = summary.resumed,
            streaks_reset = summary.report.streaks_reset,
            statistics_created = summary.report.statistics_created,
            kept = summary.report.kept,
            guesses_cleared = summary.guesses_cleared,
            "rollover run finished"
        );
        Ok(summary)
    }
    .instrument(span)
    .await
}

async fn run(state: &SharedState, run_id: Uuid) -> Result<RolloverSummary, PipelineError> {
    let runner = state.step_runner();

    let (store, current, next, heardle_day) = runner
        .run(PipelineStep::ReadSlots, async {
            let store = state.require_store().await?;
            let next = store
                .find_slot(SlotKey::Next)
                .await?
                .ok_or_else(|| ServiceError::NotFound("no next daily song staged".into()))?;
            let current = store.find_slot(SlotKey::Current).await?;
            if current.is_none() {
                warn!("no current daily song; promoting next as the first day");
            }
            let heardle_day = check_sequence(current.as_ref(), &next)?;
            Ok::<_, ServiceError>((store, current, next, heardle_day))
        })
        .await?;

    let resumed = current.as_ref().is_some_and(|current| current.settled);
    let report = if resumed {
        info!("streaks already settled by an earlier run; resuming at the purge");
        ReconcileReport::default()
    } else {
        let report = runner
            .run(PipelineStep::ReconcileUsers, reconcile_users(store.as_ref()))
            .await?;

        if let Some(current) = current {
            runner
                .run(PipelineStep::MarkSettled, async {
                    let settled = DailySongEntity {
                        settled: true,
                        ..current
                    };
                    store
                        .save_slot(SlotKey::Current, settled)
                        .await
                        .map_err(ServiceError::from)
                })
                .await?;
        }
        report
    };

    let guesses_cleared = runner
        .run(PipelineStep::PurgeGuesses, async {
            store.delete_all_guesses().await.map_err(ServiceError::from)
        })
        .await?;

    let promoted = DailySongEntity {
        settled: false,
        ..next
    };
    runner
        .run(PipelineStep::PromoteNext, async {
            store
                .save_slot(SlotKey::Current, promoted.clone())
                .await
                .map_err(ServiceError::from)
        })
        .await?;

    Ok(RolloverSummary {
        run_id,
        heardle_day,
        resumed,
        report,
        guesses_cleared,
        current: promoted,
    })
}

async fn reconcile_users(store: &dyn RotationStore) -> Result<ReconcileReport, ServiceError> {
    let users = store.list_users().await?;
    let mut report = ReconcileReport::default();
    let mut failures = Vec::new();

    for user in users {
        match reconcile_user(store, &user.id).await {
            Ok(StreakDecision::Keep) => report.kept += 1,
            Ok(StreakDecision::Reset(_)) => report.streaks_reset += 1,
            Ok(StreakDecision::Create(_)) => report.statistics_created += 1,
            Err(err) => {
                warn!(user_id = %user.id, error = %err, "failed to reconcile user");
                failures.push(UserFailure {
                    user_id: user.id,
                    reason: err.to_string(),
                });
            }
        }
    }

    if failures.is_empty() {
        Ok(report)
    } else {
        Err(ServiceError::Reconciliation { failures })
    }
}

async fn reconcile_user(store: &dyn RotationStore, user_id: &str) -> PersistenceResult<StreakDecision> {
    let guesses = store.find_guesses(user_id.to_owned()).await?;
    let statistics = if guesses.as_ref().is_some_and(GuessesEntity::completed_daily) {
        None
    } else {
        store.find_statistics(user_id.to_owned()).await?
    };

    let decision = decide_streak(user_id, guesses.as_ref(), statistics);
    match &decision {
        StreakDecision::Keep => {}
        StreakDecision::Reset(statistics) | StreakDecision::Create(statistics) => {
            store.save_statistics(statistics.clone()).await?;
        }
    }

    Ok(decision)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::{GuessOutcome, GuessedSongEntity, UserEntity},
            rotation_store::memory::MemoryRotationStore,
        },
        services::test_support::{
            FakeAssets, FakeMedia, FixedRandom, current_slot, failing_current_write_store,
            failing_statistics_store, state_with,
        },
    };

    fn guesses(user_id: &str, outcomes: &[GuessOutcome]) -> GuessesEntity {
        GuessesEntity {
            user_id: user_id.into(),
            songs: outcomes
                .iter()
                .map(|outcome| GuessedSongEntity {
                    name: "guess".into(),
                    outcome: *outcome,
                })
                .collect(),
        }
    }

    fn stats(user_id: &str, streak: u32) -> StatisticsEntity {
        StatisticsEntity {
            user_id: user_id.into(),
            games_played: 20,
            games_won: 15,
            current_streak: streak,
            max_streak: 9,
        }
    }

    fn user(id: &str) -> UserEntity {
        UserEntity {
            id: id.into(),
            username: None,
        }
    }

    /// Day 7 current, day 8 staged, one winner and one loser.
    async fn day_with_winner_and_loser() -> MemoryRotationStore {
        let store = MemoryRotationStore::new();
        store.insert_slot(SlotKey::Current, current_slot(7)).await;
        store.insert_slot(SlotKey::Next, current_slot(8)).await;
        for id in ["won", "lost"] {
            store.insert_user(user(id)).await;
        }
        store.insert_statistics(stats("won", 5)).await;
        store.insert_statistics(stats("lost", 3)).await;
        store
            .insert_guesses(guesses("won", &[GuessOutcome::Correct]))
            .await;
        store
            .insert_guesses(guesses("lost", &[GuessOutcome::Incorrect]))
            .await;
        store
    }

    async fn rollover_state(store: &MemoryRotationStore) -> SharedState {
        state_with(
            AppConfig::default(),
            store,
            FakeMedia::with_durations(&[]),
            FakeAssets::signing("https://cdn/signed"),
            FixedRandom::new(0, 0),
        )
        .await
    }

    #[test]
    fn correct_last_guess_keeps_statistics() {
        let record = guesses("u1", &[GuessOutcome::Incorrect, GuessOutcome::Correct]);
        assert_eq!(
            decide_streak("u1", Some(&record), Some(stats("u1", 4))),
            StreakDecision::Keep
        );
    }

    #[test]
    fn anything_else_resets_only_the_streak() {
        for outcomes in [
            vec![GuessOutcome::Correct, GuessOutcome::Incorrect],
            vec![GuessOutcome::Pending],
            vec![],
        ] {
            let record = guesses("u1", &outcomes);
            let StreakDecision::Reset(updated) =
                decide_streak("u1", Some(&record), Some(stats("u1", 4)))
            else {
                panic!("expected a reset for {outcomes:?}");
            };
            assert_eq!(updated.current_streak, 0);
            assert_eq!(updated.max_streak, 9);
            assert_eq!(updated.games_played, 20);
            assert_eq!(updated.games_won, 15);
        }
    }

    #[test]
    fn missing_statistics_get_zeroed_record() {
        assert_eq!(
            decide_streak("u9", None, None),
            StreakDecision::Create(StatisticsEntity::empty("u9"))
        );
    }

    #[test]
    fn sequence_must_advance_by_one() {
        assert_eq!(check_sequence(Some(&current_slot(4)), &current_slot(5)).unwrap(), 5);
        assert_eq!(check_sequence(None, &current_slot(1)).unwrap(), 1);

        for next in [4, 3, 7] {
            assert!(matches!(
                check_sequence(Some(&current_slot(4)), &current_slot(next)),
                Err(ServiceError::InvalidState(_))
            ));
        }

        let mut legacy = current_slot(0);
        legacy.heardle_day = None;
        assert!(check_sequence(Some(&legacy), &current_slot(5)).is_err());
        assert!(check_sequence(Some(&current_slot(4)), &legacy).is_err());
    }

    #[tokio::test]
    async fn rollover_settles_users_and_promotes_next() {
        let store = MemoryRotationStore::new();
        store.insert_slot(SlotKey::Current, current_slot(7)).await;
        let mut next = current_slot(8);
        next.name = "Tomorrow".into();
        store.insert_slot(SlotKey::Next, next.clone()).await;

        for id in ["won", "lost", "fresh"] {
            store.insert_user(user(id)).await;
        }
        store.insert_statistics(stats("won", 5)).await;
        store.insert_statistics(stats("lost", 3)).await;
        store
            .insert_guesses(guesses("won", &[GuessOutcome::Correct]))
            .await;
        store
            .insert_guesses(guesses("lost", &[GuessOutcome::Incorrect]))
            .await;

        let state = rollover_state(&store).await;
        let summary = roll_over(&state).await.unwrap();

        assert_eq!(summary.heardle_day, 8);
        assert_eq!(
            summary.report,
            ReconcileReport {
                streaks_reset: 1,
                statistics_created: 1,
                kept: 1,
            }
        );
        assert_eq!(summary.guesses_cleared, 2);
        assert_eq!(store.statistics("won").await, Some(stats("won", 5)));
        assert_eq!(store.statistics("lost").await, Some(stats("lost", 0)));
        assert_eq!(
            store.statistics("fresh").await,
            Some(StatisticsEntity::empty("fresh"))
        );
        assert_eq!(store.guess_records().await, 0);
        assert_eq!(store.slot(SlotKey::Current).await, Some(next.clone()));
        assert_eq!(store.slot(SlotKey::Next).await, Some(next));
    }

    #[tokio::test]
    async fn second_rollover_is_rejected_without_side_effects() {
        let store = MemoryRotationStore::new();
        store.insert_slot(SlotKey::Current, current_slot(1)).await;
        store.insert_slot(SlotKey::Next, current_slot(2)).await;
        store.insert_user(user("u1")).await;
        store.insert_statistics(stats("u1", 2)).await;

        let state = rollover_state(&store).await;
        roll_over(&state).await.unwrap();

        store.insert_statistics(stats("u1", 6)).await;
        store
            .insert_guesses(guesses("u1", &[GuessOutcome::Incorrect]))
            .await;

        let err = roll_over(&state).await.unwrap_err();
        assert_eq!(err.step, PipelineStep::ReadSlots);
        assert!(matches!(err.source, ServiceError::InvalidState(_)));
        assert_eq!(store.statistics("u1").await, Some(stats("u1", 6)));
        assert_eq!(store.guess_records().await, 1);
    }

    #[tokio::test]
    async fn nothing_staged_is_not_found_and_touches_nobody() {
        let store = MemoryRotationStore::new();
        store.insert_slot(SlotKey::Current, current_slot(1)).await;
        store.insert_user(user("u1")).await;
        store
            .insert_guesses(guesses("u1", &[GuessOutcome::Incorrect]))
            .await;

        let state = rollover_state(&store).await;
        let err = roll_over(&state).await.unwrap_err();

        assert!(matches!(err.source, ServiceError::NotFound(_)));
        assert!(store.statistics("u1").await.is_none());
        assert_eq!(store.guess_records().await, 1);
    }

    #[tokio::test]
    async fn per_user_failures_are_collected_before_purge() {
        let store = MemoryRotationStore::new();
        store.insert_slot(SlotKey::Current, current_slot(1)).await;
        store.insert_slot(SlotKey::Next, current_slot(2)).await;
        for id in ["a", "broken", "c"] {
            store.insert_user(user(id)).await;
        }
        store
            .insert_guesses(guesses("c", &[GuessOutcome::Pending]))
            .await;

        let state = rollover_state(&store).await;
        state
            .install_store(failing_statistics_store(&store, "broken"))
            .await;

        let err = roll_over(&state).await.unwrap_err();

        assert_eq!(err.step, PipelineStep::ReconcileUsers);
        let ServiceError::Reconciliation { failures } = err.source else {
            panic!("expected a reconciliation report");
        };
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].user_id, "broken");
        assert_eq!(
            store.statistics("a").await,
            Some(StatisticsEntity::empty("a"))
        );
        assert_eq!(
            store.statistics("c").await,
            Some(StatisticsEntity::empty("c"))
        );
        assert_eq!(store.guess_records().await, 1);
        assert_eq!(store.slot(SlotKey::Current).await, Some(current_slot(1)));
    }

    #[tokio::test]
    async fn retry_after_failed_promotion_keeps_winner_streaks() {
        let store = day_with_winner_and_loser().await;
        let state = rollover_state(&store).await;
        state
            .install_store(failing_current_write_store(&store, false))
            .await;

        let err = roll_over(&state).await.unwrap_err();
        assert_eq!(err.step, PipelineStep::PromoteNext);
        assert_eq!(store.guess_records().await, 0);
        let current = store.slot(SlotKey::Current).await.unwrap();
        assert_eq!(current.heardle_day, Some(7));
        assert!(current.settled);

        let summary = roll_over(&state).await.unwrap();
        assert!(summary.resumed);
        assert_eq!(summary.report, ReconcileReport::default());
        assert_eq!(summary.guesses_cleared, 0);
        assert_eq!(store.statistics("won").await, Some(stats("won", 5)));
        assert_eq!(store.statistics("lost").await, Some(stats("lost", 0)));
        assert_eq!(store.slot(SlotKey::Current).await, Some(current_slot(8)));
    }

    #[tokio::test]
    async fn failed_settled_marker_reconciles_again_on_retry() {
        let store = day_with_winner_and_loser().await;
        let state = rollover_state(&store).await;
        state
            .install_store(failing_current_write_store(&store, true))
            .await;

        let err = roll_over(&state).await.unwrap_err();
        assert_eq!(err.step, PipelineStep::MarkSettled);
        assert_eq!(store.guess_records().await, 2);
        assert_eq!(store.slot(SlotKey::Current).await, Some(current_slot(7)));

        let summary = roll_over(&state).await.unwrap();
        assert!(!summary.resumed);
        assert_eq!(summary.report.kept, 1);
        assert_eq!(summary.report.streaks_reset, 1);
        assert_eq!(store.statistics("won").await, Some(stats("won", 5)));
        assert_eq!(store.slot(SlotKey::Current).await, Some(current_slot(8)));
    }
}
