use std::sync::{Arc, Mutex};

use crate::actions::{reduce, ActionError, TaskAction, Transition};
use crate::models::{Preferences, SoundPreferences, Task, Timestamp};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<Mutex<AppData>>,
}

impl AppState {
    pub fn new(tasks: Vec<Task>, preferences: Preferences) -> Self {
        let tasks = tasks.into_iter().map(Task::normalized).collect();
        Self {
            inner: Arc::new(Mutex::new(AppData { tasks, preferences })),
        }
    }

    pub fn tasks(&self) -> Vec<Task> {
        let guard = self.inner.lock().expect("state poisoned");
        guard.tasks.clone()
    }

    /// Runs `action` through the reducer and swaps the result in. On error nothing changes.
    pub fn dispatch(&self, action: TaskAction, now: Timestamp) -> Result<Transition, ActionError> {
        let mut guard = self.inner.lock().expect("state poisoned");
        let transition = reduce(&guard.tasks, action, now)?;
        guard.tasks = transition.tasks.clone();
        Ok(transition)
    }

    /// Puts back a list captured earlier, e.g. after a failed save.
    pub fn restore_tasks(&self, tasks: Vec<Task>) {
        let mut guard = self.inner.lock().expect("state poisoned");
        guard.tasks = tasks;
    }

    pub fn preferences(&self) -> Preferences {
        let guard = self.inner.lock().expect("state poisoned");
        guard.preferences.clone()
    }

    pub fn update_preferences(&self, preferences: Preferences) {
        let mut guard = self.inner.lock().expect("state poisoned");
        guard.preferences = preferences;
    }

    /// Applies `change` to the sound preferences and returns the full preferences afterwards.
    pub fn update_sound(&self, change: impl FnOnce(&SoundPreferences) -> SoundPreferences) -> Preferences {
        let mut guard = self.inner.lock().expect("state poisoned");
        guard.preferences.sound = change(&guard.preferences.sound);
        guard.preferences.clone()
    }
}

#[derive(Debug)]
struct AppData {
    tasks: Vec<Task>,
    preferences: Preferences,
}
