use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::AppError;
use crate::store::ProgressStore;

/// One solved question in a user's history. `difficulty` is a snapshot of
/// the question's label at completion time, kept for the stats tally.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompletedQuestion {
    pub question_id: String,
    pub completed_at: DateTime<Utc>,
    pub difficulty: String,
}

/// Per-user completion record. `total_solved` always equals the length of
/// `completed_questions`; `last_active_date` is absent until the first
/// completion.
#[derive(Clone, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    pub user_id: String,
    pub completed_questions: Vec<CompletedQuestion>,
    pub current_streak: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active_date: Option<DateTime<Utc>>,
    pub total_solved: u32,
}

impl UserProgress {
    pub fn empty(user_id: &str) -> Self {
        UserProgress {
            user_id: user_id.to_string(),
            completed_questions: Vec::new(),
            current_streak: 0,
            last_active_date: None,
            total_solved: 0,
        }
    }
}

/// Per-difficulty completion counts. `choice` is the catch-all bucket for
/// missing or unrecognized difficulty labels.
#[derive(Clone, Copy, Default, Serialize, Deserialize, Debug, PartialEq)]
pub struct DifficultyStats {
    pub hard: u32,
    pub medium: u32,
    pub easy: u32,
    pub choice: u32,
}

impl DifficultyStats {
    /// Tally completions by difficulty, case-insensitively. Recomputed on
    /// every read and never stored, so it cannot drift from the history.
    pub fn tally(completed: &[CompletedQuestion]) -> Self {
        let mut stats = DifficultyStats::default();
        for entry in completed {
            match entry.difficulty.to_lowercase().as_str() {
                "hard" => stats.hard += 1,
                "medium" => stats.medium += 1,
                "easy" => stats.easy += 1,
                _ => stats.choice += 1,
            }
        }
        stats
    }

    pub fn total(&self) -> u32 {
        self.hard + self.medium + self.easy + self.choice
    }
}

/// Progress as reported to the caller: the raw history plus derived views.
#[derive(Clone, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ProgressView {
    pub completed_questions: Vec<CompletedQuestion>,
    pub current_streak: u32,
    pub total_solved: u32,
    pub stats: DifficultyStats,
}

/// Outcome of recording a completion.
#[derive(Clone, Copy, Debug)]
pub struct CompletionOutcome {
    pub current_streak: u32,
    /// Set when the same question was already completed on the same calendar
    /// day and the submission was a no-op.
    pub already_completed: bool,
}

/// Owns the rules for mutating a user's completion record: streak
/// transitions, same-day idempotence and the per-difficulty tally.
pub struct ProgressService {
    store: Arc<dyn ProgressStore>,
}

impl ProgressService {
    pub fn new(store: Arc<dyn ProgressStore>) -> Self {
        ProgressService { store }
    }

    /// Record a completed question for a user.
    ///
    /// Re-submitting the same question on the same calendar day is a no-op.
    /// The whole read-modify-write runs as one transaction inside the store,
    /// so concurrent submissions by the same user cannot double-append or
    /// mis-count the streak.
    ///
    /// # Arguments
    /// * `user_id` - Identifier of the submitting user
    /// * `question_id` - Identifier of the completed question
    /// * `difficulty` - Free-text difficulty label, snapshotted for stats
    /// * `now` - Submission timestamp (calendar day derived from it)
    ///
    /// # Returns
    /// * `Result<CompletionOutcome, AppError>` - The new streak value
    ///
    /// # Errors
    /// * `InvalidArgument` when any input is empty, before any store access
    /// * `StoreUnavailable` when the persistence layer cannot be reached
    pub fn record_completion(
        &self,
        user_id: &str,
        question_id: &str,
        difficulty: &str,
        now: DateTime<Utc>,
    ) -> Result<CompletionOutcome, AppError> {
        if user_id.trim().is_empty() || question_id.trim().is_empty() || difficulty.trim().is_empty()
        {
            return Err(AppError::invalid_argument(
                "userId, questionId and difficulty are required",
            ));
        }

        let today = now.date_naive();
        let mut already_completed = false;

        let updated = self.store.update(user_id, &mut |existing| {
            let mut progress = existing.unwrap_or_else(|| UserProgress::empty(user_id));

            let duplicate = progress.completed_questions.iter().any(|entry| {
                entry.question_id == question_id && entry.completed_at.date_naive() == today
            });
            if duplicate {
                already_completed = true;
                return progress;
            }

            // Streak transition depends on the activity day before this
            // submission, so compute it before touching last_active_date.
            progress.current_streak = next_streak(
                progress.current_streak,
                progress.last_active_date.map(|t| t.date_naive()),
                today,
            );

            progress.completed_questions.push(CompletedQuestion {
                question_id: question_id.to_string(),
                completed_at: now,
                difficulty: difficulty.trim().to_string(),
            });
            progress.last_active_date = Some(now);
            progress.total_solved = progress.completed_questions.len() as u32;
            progress
        })?;

        Ok(CompletionOutcome {
            current_streak: updated.current_streak,
            already_completed,
        })
    }

    /// Read a user's progress. Users with no record get a zeroed default.
    ///
    /// # Errors
    /// * `InvalidArgument` when `user_id` is empty
    /// * `StoreUnavailable` when the persistence layer cannot be reached
    pub fn progress(&self, user_id: &str) -> Result<ProgressView, AppError> {
        if user_id.trim().is_empty() {
            return Err(AppError::invalid_argument("userId is required"));
        }

        let record = self
            .store
            .get(user_id)?
            .unwrap_or_else(|| UserProgress::empty(user_id));
        let stats = DifficultyStats::tally(&record.completed_questions);

        Ok(ProgressView {
            completed_questions: record.completed_questions,
            current_streak: record.current_streak,
            total_solved: record.total_solved,
            stats,
        })
    }
}

/// Streak transition rule. The previous activity day being yesterday extends
/// the streak; the same day leaves it alone; anything else (a gap of two or
/// more days, or no prior activity) resets it to 1.
fn next_streak(current: u32, last_active_day: Option<NaiveDate>, today: NaiveDate) -> u32 {
    match last_active_day {
        Some(day) if Some(day) == today.pred_opt() => current + 1,
        Some(day) if day == today => current,
        _ => 1,
    }
}
