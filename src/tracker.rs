// src/tracker.rs
use crate::history::{normalize_weight, LogEntry, LogStore};
use crate::plan::DailyPlan;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TrackerError {
    #[error("'{0}' is not on today's plan")]
    NotRecommended(String),
    #[error("Log entry not found: {0}")]
    LogNotFound(String),
}

/// Result of asking to mark an exercise done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Recorded(LogEntry),
    /// Already done today; nothing was logged.
    AlreadyDone,
}

/// What a rollover check found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayTransition {
    SameDay,
    RolledOver { previous: NaiveDate },
}

/// Completion state for a single calendar day plus the pending weight inputs.
#[derive(Debug, Clone)]
pub struct CompletionTracker {
    date: NaiveDate,
    completed: Vec<String>,
    pending_weights: HashMap<String, String>,
}

impl CompletionTracker {
    pub fn new(date: NaiveDate, completed: Vec<String>) -> Self {
        let mut tracker = Self {
            date,
            completed: Vec::new(),
            pending_weights: HashMap::new(),
        };
        tracker.restore_completed(completed);
        tracker
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn completed(&self) -> &[String] {
        &self.completed
    }

    pub fn is_completed(&self, name: &str) -> bool {
        self.completed.iter().any(|c| c == name)
    }

    pub fn pending_weight(&self, name: &str) -> Option<&str> {
        self.pending_weights.get(name).map(String::as_str)
    }

    pub fn set_pending_weight(&mut self, name: &str, input: &str) {
        self.pending_weights
            .insert(name.to_string(), input.trim().to_string());
    }

    /// Logs `name` as done today and adds it to the completion set. Weight comes
    /// from `weight_input`, then the pending buffer, then "N/A". Repeating the
    /// call on the same day does nothing.
    pub fn mark_complete(
        &mut self,
        logs: &mut LogStore,
        plan: &DailyPlan,
        name: &str,
        weight_input: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Completion, TrackerError> {
        if self.is_completed(name) {
            return Ok(Completion::AlreadyDone);
        }
        if !plan.contains(name) {
            return Err(TrackerError::NotRecommended(name.to_string()));
        }

        let buffered = self.pending_weights.remove(name);
        let weight = match weight_input.map(str::trim).filter(|w| !w.is_empty()) {
            Some(w) => normalize_weight(Some(w)),
            None => normalize_weight(buffered.as_deref()),
        };
        let entry = logs.append(name, weight, now).clone();
        self.completed.push(name.to_string());
        debug!(exercise = name, timestamp = %entry.timestamp, "Marked complete");
        Ok(Completion::Recorded(entry))
    }

    /// Percentage (0-100) of today's recommended exercises that are done.
    pub fn progress_percentage(&self, plan: &DailyPlan) -> u8 {
        let total = plan.recommended.len();
        if total == 0 {
            return 0;
        }
        let done = plan.names().filter(|n| self.is_completed(n)).count();
        ((done as f64 / total as f64) * 100.0).round() as u8
    }

    /// Removes today's logs for recommended exercises and clears the day's
    /// completion state. Returns how many log entries were removed.
    pub fn reset_today(&mut self, logs: &mut LogStore, plan: &DailyPlan) -> usize {
        let today = self.date;
        let removed = logs.remove_where(|e| e.is_on(today) && plan.contains(&e.exercise_name));
        self.completed.clear();
        self.pending_weights.clear();
        debug!(removed, date = %today, "Reset today's progress");
        removed
    }

    /// Deletes one log entry. If it was today's last entry for its exercise the
    /// exercise is no longer counted as done.
    pub fn delete_log(
        &mut self,
        logs: &mut LogStore,
        timestamp: &str,
    ) -> Result<LogEntry, TrackerError> {
        let removed = logs
            .remove(timestamp)
            .ok_or_else(|| TrackerError::LogNotFound(timestamp.to_string()))?;

        let today = self.date;
        if removed.is_on(today) {
            let still_logged = logs
                .on_date(today)
                .any(|e| e.exercise_name == removed.exercise_name);
            if !still_logged {
                self.completed.retain(|c| c != &removed.exercise_name);
            }
        }
        Ok(removed)
    }

    /// Compares the tracked date against `today`. On a new day the completion
    /// set and pending weights start empty.
    pub fn check_rollover(&mut self, today: NaiveDate) -> DayTransition {
        if today == self.date {
            return DayTransition::SameDay;
        }
        let previous = self.date;
        self.date = today;
        self.completed.clear();
        self.pending_weights.clear();
        DayTransition::RolledOver { previous }
    }

    /// Drops names that have no log entry dated today or are not on `plan`.
    /// Logs and completion sets are written separately, so a stored set can
    /// outlive the entries behind it. Returns how many names were dropped.
    pub fn reconcile(&mut self, logs: &LogStore, plan: &DailyPlan) -> usize {
        let today = self.date;
        let before = self.completed.len();
        self.completed.retain(|name| {
            plan.contains(name) && logs.on_date(today).any(|e| &e.exercise_name == name)
        });
        before - self.completed.len()
    }

    /// Replaces the completion set wholesale (used when loading a stored day).
    pub fn restore_completed(&mut self, completed: Vec<String>) {
        self.completed.clear();
        for name in completed {
            if !self.is_completed(&name) {
                self.completed.push(name);
            }
        }
    }
}
