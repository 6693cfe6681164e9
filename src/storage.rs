use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::models::{Preferences, Task};

pub const TASKS_KEY: &str = "todos";
pub const PREFERENCES_KEY: &str = "preferences";
const SOUNDS_DIR: &str = "sounds";
const EXPORTS_DIR: &str = "exports";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Key/value store on disk: each key is one JSON document, `<root>/<key>.json`.
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ensure_dirs(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    pub fn sounds_dir(&self) -> PathBuf {
        self.root.join(SOUNDS_DIR)
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.root.join(EXPORTS_DIR)
    }

    pub fn load_tasks(&self) -> Result<Vec<Task>, StorageError> {
        let tasks: Vec<Task> = self.get(TASKS_KEY)?;
        Ok(tasks.into_iter().map(Task::normalized).collect())
    }

    /// Missing, unreadable or malformed data all mean "no tasks yet".
    pub fn load_tasks_or_default(&self) -> Vec<Task> {
        match self.load_tasks() {
            Ok(tasks) => tasks,
            Err(StorageError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => {
                warn!("failed to load tasks, starting empty: {err}");
                Vec::new()
            }
        }
    }

    pub fn save_tasks(&self, tasks: &[Task]) -> Result<(), StorageError> {
        self.set(TASKS_KEY, tasks)
    }

    pub fn load_preferences(&self) -> Result<Preferences, StorageError> {
        self.get(PREFERENCES_KEY)
    }

    pub fn load_preferences_or_default(&self) -> Preferences {
        match self.load_preferences() {
            Ok(prefs) => prefs,
            Err(StorageError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                Preferences::default()
            }
            Err(err) => {
                warn!("failed to load preferences, using defaults: {err}");
                Preferences::default()
            }
        }
    }

    pub fn save_preferences(&self, prefs: &Preferences) -> Result<(), StorageError> {
        self.set(PREFERENCES_KEY, prefs)
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, StorageError> {
        load_json(&self.key_path(key))
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: &str, data: &T) -> Result<(), StorageError> {
        write_atomic(&self.key_path(key), data)
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, StorageError> {
    let mut file = File::open(path)?;
    let mut buf = String::new();
    file.read_to_string(&mut buf)?;
    Ok(serde_json::from_str(&buf)?)
}

/// Writes to `<path>.tmp` then renames, so readers never see a partial blob.
pub fn write_atomic<T: Serialize + ?Sized>(path: &Path, data: &T) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let temp_path = path.with_extension("tmp");
    let json = serde_json::to_vec_pretty(data)?;
    {
        let mut file = File::create(&temp_path)?;
        file.write_all(&json)?;
        file.sync_all()?;
    }
    fs::rename(temp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Priority, Reminder, ReminderTime, Subtask};
    use chrono::{TimeZone, Utc};

    fn make_task(id: &str) -> Task {
        Task {
            id: id.to_string(),
            text: format!("task-{id}"),
            completed: false,
            category: Category::Work,
            priority: Priority::High,
            due_date: Some(Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()),
            subtasks: vec![Subtask {
                id: "s1".into(),
                text: "sub".into(),
                completed: true,
            }],
            tags: vec!["office".into()],
            reminder: Reminder {
                id: format!("{id}-reminder"),
                time: ReminderTime::Custom,
                custom_time: Some(45),
                enabled: true,
            },
            created_at: Utc.with_ymd_and_hms(2023, 12, 31, 8, 0, 0).unwrap(),
        }
    }

    #[test]
    fn tasks_round_trip_structurally_equal() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().to_path_buf());
        let tasks = vec![make_task("a"), make_task("b")];
        storage.save_tasks(&tasks).unwrap();

        assert!(dir.path().join("todos.json").is_file());
        assert!(!dir.path().join("todos.tmp").exists());
        assert_eq!(storage.load_tasks().unwrap(), tasks);
    }

    #[test]
    fn legacy_blob_without_tags_or_reminder_is_normalized() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("todos.json"),
            r#"[{"id":"1","text":"old","completed":true,"category":"health",
                 "priority":"high","dueDate":null,"subtasks":[],
                 "createdAt":"2024-01-01T00:00:00.000Z"}]"#,
        )
        .unwrap();
        let storage = Storage::new(dir.path().to_path_buf());
        let tasks = storage.load_tasks().unwrap();
        assert_eq!(tasks.len(), 1);
        assert!(tasks[0].tags.is_empty());
        assert_eq!(tasks[0].reminder.id, "1-reminder");
        assert!(!tasks[0].reminder.enabled);
    }

    #[test]
    fn date_only_due_date_does_not_drop_the_list() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("todos.json"),
            r#"[{"id":"1","text":"a","dueDate":null},
                {"id":"2","text":"b","dueDate":"2024-01-05"},
                {"id":"3","text":"c","dueDate":"next week"}]"#,
        )
        .unwrap();
        let storage = Storage::new(dir.path().to_path_buf());
        let tasks = storage.load_tasks().unwrap();
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[0].due_date, None);
        assert_eq!(
            tasks[1].due_date,
            Some(Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap())
        );
        assert_eq!(tasks[2].due_date, None);
    }

    #[test]
    fn missing_or_corrupt_data_defaults_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().join("nested"));
        assert!(storage.load_tasks_or_default().is_empty());
        assert_eq!(storage.load_preferences_or_default(), Preferences::default());

        storage.ensure_dirs().unwrap();
        fs::write(storage.root().join("todos.json"), b"{not json").unwrap();
        fs::write(storage.root().join("preferences.json"), b"[]").unwrap();
        assert!(matches!(storage.load_tasks(), Err(StorageError::Json(_))));
        assert!(storage.load_tasks_or_default().is_empty());
        assert_eq!(storage.load_preferences_or_default(), Preferences::default());
    }

    #[test]
    fn preferences_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().to_path_buf());
        let mut prefs = Preferences::default();
        prefs.dark_mode = true;
        prefs.theme = "ocean".into();
        storage.save_preferences(&prefs).unwrap();
        assert_eq!(storage.load_preferences().unwrap(), prefs);
    }

    #[test]
    fn save_fails_when_target_is_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("todos.json")).unwrap();
        let storage = Storage::new(dir.path().to_path_buf());
        assert!(storage.save_tasks(&[make_task("a")]).is_err());
    }
}
