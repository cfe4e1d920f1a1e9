// src/history.rs
use chrono::{DateTime, Duration, Local, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Weight recorded when the user left the input blank.
pub const NO_WEIGHT: &str = "N/A";
const UNKNOWN_TIME: &str = "unknown time";

/// One completed exercise. `timestamp` (RFC 3339, millisecond precision) is the
/// identity of the entry.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    #[serde(rename = "exercise")]
    pub exercise_name: String,
    pub weight: String,
    pub timestamp: String,
}

impl LogEntry {
    /// Lenient decode of one stored element. Non-objects and objects without an
    /// exercise name are dropped; weight may be a string or a number.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let exercise_name = obj.get("exercise")?.as_str()?.to_string();
        let weight = match obj.get("weight") {
            Some(Value::String(s)) => normalize_weight(Some(s)),
            Some(Value::Number(n)) => n.to_string(),
            _ => NO_WEIGHT.to_string(),
        };
        let timestamp = obj
            .get("timestamp")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Some(Self {
            exercise_name,
            weight,
            timestamp,
        })
    }

    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|d| d.with_timezone(&Utc))
    }

    /// Calendar date of the entry in local time.
    pub fn local_date(&self) -> Option<NaiveDate> {
        self.recorded_at()
            .map(|d| d.with_timezone(&Local).date_naive())
    }

    pub fn is_on(&self, date: NaiveDate) -> bool {
        self.local_date() == Some(date)
    }

    pub fn has_weight(&self) -> bool {
        self.weight != NO_WEIGHT
    }

    pub fn display_time(&self) -> String {
        self.recorded_at()
            .map(|d| d.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| UNKNOWN_TIME.to_string())
    }
}

/// Blank input becomes [`NO_WEIGHT`].
pub fn normalize_weight(input: Option<&str>) -> String {
    match input.map(str::trim) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => NO_WEIGHT.to_string(),
    }
}

/// Ordered (oldest first) history of completed exercises.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogStore {
    entries: Vec<LogEntry>,
}

impl LogStore {
    pub fn new(entries: Vec<LogEntry>) -> Self {
        Self { entries }
    }

    /// Decodes the stored `logs` value; anything but an array is an empty history.
    pub fn from_value(value: &Value) -> Self {
        let entries = value
            .as_array()
            .map(|items| items.iter().filter_map(LogEntry::from_value).collect())
            .unwrap_or_default();
        Self { entries }
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The last `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> &[LogEntry] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }

    pub fn find(&self, timestamp: &str) -> Option<&LogEntry> {
        self.entries.iter().find(|e| e.timestamp == timestamp)
    }

    /// Entries recorded before `date`. Entries with an unreadable timestamp are
    /// kept, since they can only be old history.
    pub fn before(&self, date: NaiveDate) -> Vec<LogEntry> {
        self.entries
            .iter()
            .filter(|e| e.local_date().map_or(true, |d| d < date))
            .cloned()
            .collect()
    }

    pub fn on_date(&self, date: NaiveDate) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(move |e| e.is_on(date))
    }

    /// Entries for one exercise, newest first.
    pub fn for_exercise(&self, name: &str) -> Vec<&LogEntry> {
        self.entries
            .iter()
            .rev()
            .filter(|e| e.exercise_name == name)
            .collect()
    }

    /// Appends a new entry stamped at `now` (millisecond precision). If that
    /// stamp is not later than the newest entry it is moved forward so that
    /// stamps stay unique and ordered.
    pub fn append(&mut self, exercise_name: &str, weight: String, now: DateTime<Utc>) -> &LogEntry {
        let mut at = DateTime::<Utc>::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now);
        if let Some(last) = self.entries.last().and_then(LogEntry::recorded_at) {
            if at <= last {
                at = last + Duration::milliseconds(1);
            }
        }
        let mut timestamp = at.to_rfc3339_opts(SecondsFormat::Millis, true);
        while self.find(&timestamp).is_some() {
            at += Duration::milliseconds(1);
            timestamp = at.to_rfc3339_opts(SecondsFormat::Millis, true);
        }

        self.entries.push(LogEntry {
            exercise_name: exercise_name.to_string(),
            weight,
            timestamp,
        });
        let idx = self.entries.len() - 1;
        &self.entries[idx]
    }

    pub fn remove(&mut self, timestamp: &str) -> Option<LogEntry> {
        let idx = self.entries.iter().position(|e| e.timestamp == timestamp)?;
        Some(self.entries.remove(idx))
    }

    /// Drops every entry matching `pred`, returning how many went.
    pub fn remove_where<F>(&mut self, mut pred: F) -> usize
    where
        F: FnMut(&LogEntry) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|e| !pred(e));
        before - self.entries.len()
    }
}
