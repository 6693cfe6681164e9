use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

pub type Timestamp = DateTime<Utc>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Personal,
    Work,
    Shopping,
    Health,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ReminderTime {
    #[serde(rename = "5min")]
    FiveMinutes,
    #[serde(rename = "15min")]
    FifteenMinutes,
    #[default]
    #[serde(rename = "30min")]
    ThirtyMinutes,
    #[serde(rename = "1hour")]
    OneHour,
    #[serde(rename = "1day")]
    OneDay,
    #[serde(rename = "custom")]
    Custom,
}

pub const DEFAULT_CUSTOM_MINUTES: u32 = 30;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub time: ReminderTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_time: Option<u32>,
    #[serde(default)]
    pub enabled: bool,
}

impl Reminder {
    /// Minutes before the due date at which the reminder fires.
    pub fn offset_minutes(&self) -> i64 {
        match self.time {
            ReminderTime::FiveMinutes => 5,
            ReminderTime::FifteenMinutes => 15,
            ReminderTime::ThirtyMinutes => 30,
            ReminderTime::OneHour => 60,
            ReminderTime::OneDay => 24 * 60,
            ReminderTime::Custom => i64::from(
                self.custom_time
                    .filter(|minutes| *minutes > 0)
                    .unwrap_or(DEFAULT_CUSTOM_MINUTES),
            ),
        }
    }

    pub fn synthetic_id(task_id: &str) -> String {
        format!("{task_id}-reminder")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, deserialize_with = "due_date::deserialize")]
    pub due_date: Option<Timestamp>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub reminder: Reminder,
    #[serde(default = "Utc::now")]
    pub created_at: Timestamp,
}

impl Task {
    /// Fills the fields older saves may lack and cleans up tag lists.
    pub fn normalize(&mut self) {
        if self.reminder.id.trim().is_empty() {
            self.reminder.id = Reminder::synthetic_id(&self.id);
        }
        self.tags = normalize_tags(std::mem::take(&mut self.tags));
    }

    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }

    pub fn is_overdue(&self, now: Timestamp) -> bool {
        !self.completed && self.due_date.is_some_and(|due| due < now)
    }
}

/// Trims tags, drops blanks and keeps the first occurrence of duplicates.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() || out.iter().any(|t| t == tag) {
            continue;
        }
        out.push(tag.to_string());
    }
    out
}

/// What the UI sends when a task is created. The store assigns id and timestamps.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub text: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, deserialize_with = "due_date::deserialize")]
    pub due_date: Option<Timestamp>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub reminder: Option<Reminder>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SoundKind {
    #[default]
    None,
    Rain,
    Forest,
    Cafe,
    Waves,
    Whitenoise,
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SoundPreferences {
    #[serde(default)]
    pub current: SoundKind,
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(default)]
    pub playing: bool,
    #[serde(default)]
    pub custom_file: Option<String>,
    /// Every imported file, in import order.
    #[serde(default)]
    pub custom_files: Vec<String>,
}

impl Default for SoundPreferences {
    fn default() -> Self {
        Self {
            current: SoundKind::None,
            volume: default_volume(),
            playing: false,
            custom_file: None,
            custom_files: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default)]
    pub dark_mode: bool,
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default)]
    pub sound: SoundPreferences,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            dark_mode: false,
            theme: default_theme(),
            sound: SoundPreferences::default(),
        }
    }
}

fn default_theme() -> String {
    "light".to_string()
}

fn default_volume() -> f32 {
    0.5
}

/// Parses a due date as written by the UI: RFC 3339, or a naive `datetime-local` value taken
/// in the local timezone.
pub fn parse_due_date(value: &str) -> Option<Timestamp> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|local| local.with_timezone(&Utc));
        }
    }
    // A bare date is midnight UTC.
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

mod due_date {
    use log::warn;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::{parse_due_date, Timestamp};

    /// Unreadable due dates load as `None` so one bad record never drops the whole list.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Timestamp>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<Value> = Option::deserialize(deserializer)?;
        Ok(match raw {
            None | Some(Value::Null) => None,
            Some(Value::String(value)) => {
                let value = value.trim();
                if value.is_empty() {
                    None
                } else {
                    let parsed = parse_due_date(value);
                    if parsed.is_none() {
                        warn!("ignoring unreadable due date {value:?}");
                    }
                    parsed
                }
            }
            Some(other) => {
                warn!("ignoring non-string due date {other}");
                None
            }
        })
    }
}
