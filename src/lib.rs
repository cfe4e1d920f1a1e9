// src/lib.rs
use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate, Utc};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

// --- Declare modules ---
pub mod assistant;
pub mod catalog;
mod config;
pub mod db;
pub mod history;
pub mod plan;
pub mod profile;
pub mod tracker;

// --- Expose public types ---
pub use assistant::{Assistant, ChatMessage, ChatRole, RequestSlot, TextGenerator};
pub use catalog::{CorrectionDrill, ExerciseDefinition, TargetGroup, CATALOG, CORRECTION_DRILLS};
pub use config::{
    get_config_path as get_config_path_util, load as load_config_util, parse_color,
    save as save_config_util, AssistantConfig, Config, Error as ConfigError, StandardColor, Theme,
};
pub use db::{get_db_path as get_db_path_util, Error as DbError};
pub use history::{LogEntry, LogStore, NO_WEIGHT};
pub use plan::{compute_daily_plan, compute_daily_plan_with, DailyPlan};
pub use profile::{Profile, ProfileUpdate};
pub use tracker::{Completion, CompletionTracker, DayTransition, TrackerError};

/// Owns every piece of mutable state: profile, history, today's completion
/// set, the cached coach review and the chat transcript. All mutation goes
/// through here and is written back to the key-value store right away.
pub struct AppService {
    pub config: Config,
    pub conn: Connection,
    pub db_path: PathBuf,
    pub config_path: PathBuf,
    profile: Profile,
    logs: LogStore,
    tracker: CompletionTracker,
    coach_note: Option<String>,
    chat: Vec<ChatMessage>,
    assistant: Assistant,
}

impl AppService {
    /// Initializes the application service.
    /// # Errors
    /// Returns `anyhow::Error` if config/db path determination, loading, or initialization fails.
    pub fn initialize() -> Result<Self> {
        let config_path =
            config::get_config_path().context("Failed to determine configuration file path")?;
        let config = config::load(&config_path)
            .with_context(|| format!("Failed to load config from {config_path:?}"))?;

        let db_path = db::get_db_path().context("Failed to determine database path")?;
        let conn = db::open_db(&db_path)
            .with_context(|| format!("Failed to open database at {db_path:?}"))?;

        let assistant = Assistant::from_config(&config.assistant);
        let mut service = Self::with_parts(
            config,
            conn,
            Local::now().date_naive(),
            assistant,
        )?;
        service.db_path = db_path;
        service.config_path = config_path;
        Ok(service)
    }

    /// Builds a service over an open connection, loading state for `today`.
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn with_parts(
        config: Config,
        conn: Connection,
        today: NaiveDate,
        assistant: Assistant,
    ) -> Result<Self> {
        db::init(&conn).context("Failed to initialize database schema")?;

        let profile = db::load_profile(&conn);
        let logs = db::load_logs(&conn);
        let completed = db::load_completed(&conn, today);
        if let Err(e) = db::prune_completed(&conn, today) {
            warn!(error = %e, "Failed to prune old completion sets");
        }
        debug!(entries = logs.len(), completed = completed.len(), %today, "Loaded state");

        let mut service = Self {
            config,
            conn,
            db_path: ":memory:".into(),
            config_path: PathBuf::new(),
            profile,
            logs,
            tracker: CompletionTracker::new(today, completed),
            coach_note: None,
            chat: vec![ChatMessage::model(assistant::CHAT_GREETING)],
            assistant,
        };
        service.reconcile_completed();
        Ok(service)
    }

    pub fn get_config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn get_db_path(&self) -> &Path {
        &self.db_path
    }

    /// Saves the current configuration state.
    /// # Errors
    /// Returns `ConfigError` if saving fails.
    pub fn save_config(&self) -> Result<(), ConfigError> {
        config::save(&self.config_path, &self.config)
    }

    /// # Errors
    /// `ConfigError::InvalidColor` for an unknown colour name, or a save failure.
    pub fn set_header_color(&mut self, color: &str) -> Result<(), ConfigError> {
        let parsed = config::parse_color(color)?;
        self.config.theme.header_color = format!("{parsed:?}");
        self.save_config()
    }

    // --- Profile ---

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Applies an edit; zero or invalid numbers fall back to the defaults.
    pub fn update_profile(&mut self, update: ProfileUpdate) -> &Profile {
        self.profile = self.profile.apply(update);
        self.persist_profile();
        &self.profile
    }

    // --- History ---

    pub fn logs(&self) -> &LogStore {
        &self.logs
    }

    pub fn today(&self) -> NaiveDate {
        self.tracker.date()
    }

    // --- Plan & completion ---

    /// Today's plan, computed over history recorded before today so the list
    /// stays put while it is being worked through.
    pub fn daily_plan(&self) -> DailyPlan {
        let history = self.logs.before(self.tracker.date());
        plan::compute_daily_plan(&history, &self.profile)
    }

    pub fn completed_today(&self) -> &[String] {
        self.tracker.completed()
    }

    pub fn progress_percentage(&self) -> u8 {
        self.tracker.progress_percentage(&self.daily_plan())
    }

    /// Cached coach review if one was generated today, else the plan's narrative.
    pub fn narrative(&self) -> String {
        self.coach_note
            .clone()
            .unwrap_or_else(|| self.daily_plan().narrative)
    }

    pub fn coach_note(&self) -> Option<&str> {
        self.coach_note.as_deref()
    }

    /// Buffers a weight typed for an exercise before it is marked done.
    pub fn set_pending_weight(&mut self, exercise: &str, input: &str) {
        let name = resolve_name(exercise);
        self.tracker.set_pending_weight(&name, input);
    }

    /// # Errors
    /// `TrackerError::NotRecommended` if the exercise isn't on today's plan.
    pub fn mark_complete(
        &mut self,
        exercise: &str,
        weight_input: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Completion, TrackerError> {
        let plan = self.daily_plan();
        let name = resolve_name(exercise);
        let outcome = self
            .tracker
            .mark_complete(&mut self.logs, &plan, &name, weight_input, now)?;
        if let Completion::Recorded(entry) = &outcome {
            info!(exercise = %entry.exercise_name, weight = %entry.weight, "Logged exercise");
            self.persist_logs();
            self.persist_completed();
        }
        Ok(outcome)
    }

    /// Removes today's entries for planned exercises and clears progress.
    pub fn reset_today(&mut self) -> usize {
        let plan = self.daily_plan();
        let removed = self.tracker.reset_today(&mut self.logs, &plan);
        self.persist_logs();
        self.persist_completed();
        removed
    }

    /// # Errors
    /// `TrackerError::LogNotFound` if no entry has that timestamp.
    pub fn delete_log(&mut self, timestamp: &str) -> Result<LogEntry, TrackerError> {
        let removed = self.tracker.delete_log(&mut self.logs, timestamp.trim())?;
        self.persist_logs();
        self.persist_completed();
        Ok(removed)
    }

    /// Day-boundary check, run at load and whenever the user comes back to the
    /// app. A new day starts with an empty completion set and no coach review;
    /// history is left alone.
    pub fn check_rollover(&mut self, today: NaiveDate) -> DayTransition {
        let transition = self.tracker.check_rollover(today);
        if let DayTransition::RolledOver { previous } = transition {
            info!(%previous, %today, "New day, clearing completion state");
            self.coach_note = None;
            self.tracker
                .restore_completed(db::load_completed(&self.conn, today));
            if let Err(e) = db::prune_completed(&self.conn, today) {
                warn!(error = %e, "Failed to prune old completion sets");
            }
            self.reconcile_completed();
            self.persist_completed();
        }
        transition
    }

    // --- Assistant ---

    pub fn assistant(&self) -> &Assistant {
        &self.assistant
    }

    /// Asks the coach for a review and caches it for the rest of the day.
    /// `None` if a review request is already running.
    pub async fn generate_coach_feedback(&mut self) -> Option<String> {
        let note = self
            .assistant
            .generate_coach_feedback(self.logs.entries(), &self.profile)
            .await?;
        self.coach_note = Some(note.clone());
        Some(note)
    }

    pub fn chat_transcript(&self) -> &[ChatMessage] {
        &self.chat
    }

    /// Appends the user's message and the coach's reply to the transcript.
    /// `None` for a blank message or while another chat request is running.
    pub async fn send_chat_message(&mut self, message: &str) -> Option<String> {
        if message.trim().is_empty() || self.assistant.chat_slot().is_busy() {
            return None;
        }
        let reply = self
            .assistant
            .send_chat_message(&self.chat, message, &self.profile)
            .await?;
        self.chat.push(ChatMessage::user(message.trim()));
        self.chat.push(ChatMessage::model(reply.clone()));
        Some(reply)
    }

    // --- Recovery ---

    /// Clears every persisted key and starts over with defaults.
    /// # Errors
    /// Returns an error if the store cannot be cleared.
    pub fn reset_all_data(&mut self) -> Result<()> {
        let removed = db::clear_all(&self.conn).context("Failed to clear stored data")?;
        warn!(removed, "All stored data cleared");
        self.profile = Profile::default();
        self.logs = LogStore::default();
        self.tracker = CompletionTracker::new(self.tracker.date(), Vec::new());
        self.coach_note = None;
        self.chat = vec![ChatMessage::model(assistant::CHAT_GREETING)];
        Ok(())
    }

    /// Keeps only completions backed by a log entry from today for an exercise
    /// on today's plan. A stale stored set is rewritten.
    fn reconcile_completed(&mut self) {
        let plan = self.daily_plan();
        let dropped = self.tracker.reconcile(&self.logs, &plan);
        if dropped > 0 {
            warn!(dropped, "Stored completion set had entries without a log, dropping them");
            self.persist_completed();
        }
    }

    // Writes are best-effort: failures are logged and the in-memory state wins.

    fn persist_profile(&self) {
        if let Err(e) = db::save_profile(&self.conn, &self.profile) {
            warn!(error = %e, "Failed to save profile");
        }
    }

    fn persist_logs(&self) {
        if let Err(e) = db::save_logs(&self.conn, &self.logs) {
            warn!(error = %e, "Failed to save logs");
        }
    }

    fn persist_completed(&self) {
        if let Err(e) =
            db::save_completed(&self.conn, self.tracker.date(), self.tracker.completed())
        {
            warn!(error = %e, "Failed to save completion set");
        }
    }
}

/// Maps user input onto the catalog's canonical name when it matches one.
fn resolve_name(input: &str) -> String {
    catalog::find_exercise(input)
        .map(|e| e.name.to_string())
        .unwrap_or_else(|| input.trim().to_string())
}
