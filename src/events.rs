use crate::models::{Preferences, Task};

pub const EVENT_STATE_UPDATED: &str = "state_updated";
pub const EVENT_WINDOW_STATE: &str = "window-state-changed";
pub const EVENT_NOTIFICATION_SHOWN: &str = "notification_shown";

#[derive(Debug, Clone, serde::Serialize)]
pub struct StatePayload {
    pub tasks: Vec<Task>,
    pub preferences: Preferences,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
}
