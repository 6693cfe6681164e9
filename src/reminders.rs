//! Due-date reminders: at most one pending notification per task, fired `offset` minutes
//! before the due date, never caught up after the fact.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use log::{debug, info};
use serde::Serialize;

use crate::actions::ReminderEffect;
use crate::models::{Reminder, Task, Timestamp};
use crate::notifications::{HostBridge, NotificationDispatcher};
use crate::timers::{TimerHandle, Timers};

pub const REMINDER_TITLE: &str = "Todo Reminder";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingReminder {
    pub notification_id: String,
    pub task_id: String,
    pub fire_at: Timestamp,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Scheduled(PendingReminder),
    Disabled,
    NoDueDate,
    DuePassed,
    FireTimePassed,
}

struct Entry {
    reminder: PendingReminder,
    // `None` when the host bridge owns the timer.
    timer: Option<TimerHandle>,
}

pub struct ReminderScheduler {
    dispatcher: Arc<NotificationDispatcher>,
    timers: Arc<dyn Timers>,
    pending: Arc<Mutex<HashMap<String, Entry>>>,
}

impl ReminderScheduler {
    pub fn new(dispatcher: Arc<NotificationDispatcher>, timers: Arc<dyn Timers>) -> Self {
        Self {
            dispatcher,
            timers,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn dispatcher(&self) -> &Arc<NotificationDispatcher> {
        &self.dispatcher
    }

    pub fn schedule_reminder(
        &self,
        task_id: &str,
        task_text: &str,
        due_date: Option<Timestamp>,
        reminder: &Reminder,
    ) -> ScheduleOutcome {
        self.schedule_reminder_at(task_id, task_text, due_date, reminder, Utc::now())
    }

    pub fn schedule_reminder_at(
        &self,
        task_id: &str,
        task_text: &str,
        due_date: Option<Timestamp>,
        reminder: &Reminder,
        now: Timestamp,
    ) -> ScheduleOutcome {
        if !reminder.enabled {
            return ScheduleOutcome::Disabled;
        }
        let Some(due) = due_date else {
            return ScheduleOutcome::NoDueDate;
        };

        self.cancel_reminder(task_id);

        if due < now {
            debug!("task {task_id} is already past due, no reminder");
            return ScheduleOutcome::DuePassed;
        }
        let offset = reminder.offset_minutes();
        let fire_at = due - chrono::Duration::minutes(offset);
        if fire_at < now {
            debug!("reminder time for task {task_id} already passed, no reminder");
            return ScheduleOutcome::FireTimePassed;
        }
        let delay = (fire_at - now).to_std().unwrap_or_default();

        let pending = PendingReminder {
            notification_id: format!("todo-{task_id}-{}", now.timestamp_millis()),
            task_id: task_id.to_string(),
            fire_at,
            body: reminder_body(task_text, offset),
        };

        let mut guard = self.pending.lock().expect("reminders poisoned");
        let timer = match self.dispatcher.host() {
            HostBridge::Available(host) => {
                // Entries for host timers are never told they fired; drop the stale ones here.
                guard.retain(|_, e| e.timer.is_some() || e.reminder.fire_at > now);
                host.schedule_notification(&pending.notification_id, REMINDER_TITLE, &pending.body, delay);
                None
            }
            HostBridge::Unavailable => {
                let dispatcher = Arc::clone(&self.dispatcher);
                let entries = Arc::clone(&self.pending);
                let key = pending.notification_id.clone();
                let body = pending.body.clone();
                Some(self.timers.start(
                    delay,
                    Box::new(move || {
                        entries.lock().expect("reminders poisoned").remove(&key);
                        dispatcher.show_notification(REMINDER_TITLE, &body);
                    }),
                ))
            }
        };
        guard.insert(
            pending.notification_id.clone(),
            Entry {
                reminder: pending.clone(),
                timer,
            },
        );
        info!(
            "scheduled reminder {} for task {task_id} at {}",
            pending.notification_id,
            fire_at.to_rfc3339()
        );
        ScheduleOutcome::Scheduled(pending)
    }

    /// Drops every pending reminder of `task_id`. Returns how many were dropped.
    pub fn cancel_reminder(&self, task_id: &str) -> usize {
        let removed: Vec<Entry> = {
            let mut guard = self.pending.lock().expect("reminders poisoned");
            let ids: Vec<String> = guard
                .iter()
                .filter(|(_, e)| e.reminder.task_id == task_id)
                .map(|(id, _)| id.clone())
                .collect();
            ids.iter().filter_map(|id| guard.remove(id)).collect()
        };

        let count = removed.len();
        for entry in removed {
            match entry.timer {
                Some(timer) => timer.cancel(),
                None => {
                    if let HostBridge::Available(host) = self.dispatcher.host() {
                        host.cancel_notification(&entry.reminder.notification_id);
                    }
                }
            }
            debug!("cancelled reminder {}", entry.reminder.notification_id);
        }
        count
    }

    /// Brings the schedule of one task in line with its current record.
    pub fn reevaluate(&self, task: &Task, now: Timestamp) -> ScheduleOutcome {
        if task.completed {
            self.cancel_reminder(&task.id);
            return ScheduleOutcome::Disabled;
        }
        let outcome =
            self.schedule_reminder_at(&task.id, &task.text, task.due_date, &task.reminder, now);
        if matches!(outcome, ScheduleOutcome::Disabled | ScheduleOutcome::NoDueDate) {
            self.cancel_reminder(&task.id);
        }
        outcome
    }

    /// Re-evaluates every task and forgets reminders of tasks that no longer exist.
    pub fn sync_all(&self, tasks: &[Task], now: Timestamp) -> usize {
        let stale: Vec<String> = {
            let guard = self.pending.lock().expect("reminders poisoned");
            guard
                .values()
                .map(|e| e.reminder.task_id.clone())
                .filter(|id| !tasks.iter().any(|t| &t.id == id))
                .collect()
        };
        for task_id in stale {
            self.cancel_reminder(&task_id);
        }
        tasks
            .iter()
            .filter(|task| matches!(self.reevaluate(task, now), ScheduleOutcome::Scheduled(_)))
            .count()
    }

    /// Carries out the reminder follow-up of a task list transition.
    pub fn apply_effect(&self, effect: &ReminderEffect, tasks: &[Task], now: Timestamp) {
        match effect {
            ReminderEffect::Reschedule(task_id) => match tasks.iter().find(|t| &t.id == task_id) {
                Some(task) => {
                    self.reevaluate(task, now);
                }
                None => {
                    self.cancel_reminder(task_id);
                }
            },
            ReminderEffect::Cancel(task_id) => {
                self.cancel_reminder(task_id);
            }
            ReminderEffect::ResyncAll => {
                self.sync_all(tasks, now);
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().expect("reminders poisoned").len()
    }

    pub fn pending_for(&self, task_id: &str) -> Vec<PendingReminder> {
        let guard = self.pending.lock().expect("reminders poisoned");
        guard
            .values()
            .filter(|e| e.reminder.task_id == task_id)
            .map(|e| e.reminder.clone())
            .collect()
    }
}

pub fn reminder_body(task_text: &str, offset_minutes: i64) -> String {
    format!(
        "Reminder: \"{task_text}\" is due in {}",
        format_time_remaining(offset_minutes)
    )
}

pub fn format_time_remaining(minutes: i64) -> String {
    let (amount, unit) = if minutes < 60 {
        (minutes, "minute")
    } else if minutes < 24 * 60 {
        (minutes / 60, "hour")
    } else {
        (minutes / (24 * 60), "day")
    };
    let plural = if amount == 1 { "" } else { "s" };
    format!("{amount} {unit}{plural}")
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::models::{Category, Priority, ReminderTime};
    use crate::notifications::testing::{RecordingHost, RecordingNotifier};
    use crate::notifications::Permission;
    use crate::timers::manual::ManualTimers;

    struct Harness {
        scheduler: ReminderScheduler,
        timers: ManualTimers,
        platform: Arc<RecordingNotifier>,
    }

    fn harness() -> Harness {
        let timers = ManualTimers::new();
        let platform = Arc::new(RecordingNotifier::new(Permission::Granted));
        let dispatcher = Arc::new(NotificationDispatcher::new(
            HostBridge::Unavailable,
            platform.clone(),
            Arc::new(timers.clone()),
        ));
        Harness {
            scheduler: ReminderScheduler::new(dispatcher, Arc::new(timers.clone())),
            timers,
            platform,
        }
    }

    fn at(hour: u32, minute: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 1, 1, hour, minute, 0).unwrap()
    }

    fn reminder(time: ReminderTime) -> Reminder {
        Reminder {
            id: "r".into(),
            time,
            custom_time: None,
            enabled: true,
        }
    }

    fn task(id: &str, due: Option<Timestamp>, reminder: Reminder) -> Task {
        Task {
            id: id.to_string(),
            text: format!("task {id}"),
            completed: false,
            category: Category::Work,
            priority: Priority::Medium,
            due_date: due,
            subtasks: Vec::new(),
            tags: Vec::new(),
            reminder,
            created_at: at(0, 0),
        }
    }

    #[test]
    fn thirty_minute_reminder_fires_half_an_hour_before_due() {
        let h = harness();
        let outcome = h.scheduler.schedule_reminder_at(
            "a",
            "Pay rent",
            Some(at(10, 0)),
            &reminder(ReminderTime::ThirtyMinutes),
            at(9, 0),
        );

        let ScheduleOutcome::Scheduled(pending) = outcome else {
            panic!("expected a scheduled reminder, got {outcome:?}");
        };
        assert_eq!(pending.fire_at, at(9, 30));
        assert!(pending.body.contains("30 minutes"));
        assert!(pending.body.contains("\"Pay rent\""));
        assert_eq!(h.timers.delays(), vec![Duration::from_secs(30 * 60)]);

        h.timers.fire_all();
        assert_eq!(
            h.platform.shown(),
            vec![(
                REMINDER_TITLE.to_string(),
                "Reminder: \"Pay rent\" is due in 30 minutes".to_string()
            )]
        );
        assert_eq!(h.scheduler.pending_count(), 0);
    }

    #[test]
    fn disabled_reminder_or_missing_due_date_registers_nothing() {
        let h = harness();
        let mut off = reminder(ReminderTime::FiveMinutes);
        off.enabled = false;
        assert_eq!(
            h.scheduler
                .schedule_reminder_at("a", "x", Some(at(10, 0)), &off, at(9, 0)),
            ScheduleOutcome::Disabled
        );
        assert_eq!(
            h.scheduler.schedule_reminder_at(
                "a",
                "x",
                None,
                &reminder(ReminderTime::FiveMinutes),
                at(9, 0)
            ),
            ScheduleOutcome::NoDueDate
        );
        assert_eq!(h.timers.started(), 0);
        assert_eq!(h.scheduler.pending_count(), 0);
    }

    #[test]
    fn past_due_and_past_fire_time_are_not_caught_up() {
        let h = harness();
        assert_eq!(
            h.scheduler.schedule_reminder_at(
                "a",
                "x",
                Some(at(8, 0)),
                &reminder(ReminderTime::FiveMinutes),
                at(9, 0)
            ),
            ScheduleOutcome::DuePassed
        );
        assert_eq!(
            h.scheduler.schedule_reminder_at(
                "a",
                "x",
                Some(at(9, 10)),
                &reminder(ReminderTime::ThirtyMinutes),
                at(9, 0)
            ),
            ScheduleOutcome::FireTimePassed
        );
        assert_eq!(h.timers.started(), 0);
    }

    #[test]
    fn rescheduling_keeps_exactly_one_pending_timer_per_task() {
        let h = harness();
        for minute in [0, 5, 10, 15] {
            h.scheduler.schedule_reminder_at(
                "a",
                "x",
                Some(at(12, 0)),
                &reminder(ReminderTime::OneHour),
                at(9, minute),
            );
        }
        h.scheduler.schedule_reminder_at(
            "b",
            "y",
            Some(at(12, 0)),
            &reminder(ReminderTime::OneHour),
            at(9, 0),
        );
        assert_eq!(h.scheduler.pending_for("a").len(), 1);
        assert_eq!(h.scheduler.pending_count(), 2);
        assert_eq!(h.timers.active(), 2);
    }

    #[test]
    fn cancel_then_schedule_leaves_one_and_unknown_cancel_is_noop() {
        let h = harness();
        assert_eq!(h.scheduler.cancel_reminder("ghost"), 0);

        let r = reminder(ReminderTime::FifteenMinutes);
        h.scheduler
            .schedule_reminder_at("a", "x", Some(at(11, 0)), &r, at(9, 0));
        assert_eq!(h.scheduler.cancel_reminder("a"), 1);
        assert_eq!(h.scheduler.cancel_reminder("a"), 0);
        h.scheduler
            .schedule_reminder_at("a", "x", Some(at(11, 0)), &r, at(9, 0));
        assert_eq!(h.scheduler.pending_count(), 1);
        assert_eq!(h.timers.active(), 1);
    }

    #[test]
    fn task_ids_sharing_a_prefix_do_not_cancel_each_other() {
        let h = harness();
        let r = reminder(ReminderTime::FiveMinutes);
        h.scheduler
            .schedule_reminder_at("1", "x", Some(at(11, 0)), &r, at(9, 0));
        h.scheduler
            .schedule_reminder_at("1-2", "y", Some(at(11, 0)), &r, at(9, 0));
        h.scheduler.cancel_reminder("1");
        assert_eq!(h.scheduler.pending_for("1-2").len(), 1);
        assert_eq!(h.scheduler.pending_count(), 1);
    }

    #[test]
    fn custom_offset_defaults_to_thirty_minutes() {
        let h = harness();
        let mut r = reminder(ReminderTime::Custom);
        let ScheduleOutcome::Scheduled(pending) =
            h.scheduler
                .schedule_reminder_at("a", "x", Some(at(10, 0)), &r, at(9, 0))
        else {
            panic!("expected scheduled");
        };
        assert_eq!(pending.fire_at, at(9, 30));

        r.custom_time = Some(45);
        let ScheduleOutcome::Scheduled(pending) =
            h.scheduler
                .schedule_reminder_at("a", "x", Some(at(10, 0)), &r, at(9, 0))
        else {
            panic!("expected scheduled");
        };
        assert_eq!(pending.fire_at, at(9, 15));
        assert!(pending.body.ends_with("45 minutes"));
    }

    #[test]
    fn host_bridge_receives_schedule_and_cancel_calls() {
        let host = Arc::new(RecordingHost::default());
        let timers = ManualTimers::new();
        let platform = Arc::new(RecordingNotifier::new(Permission::Granted));
        let dispatcher = Arc::new(NotificationDispatcher::new(
            HostBridge::Available(host.clone()),
            platform,
            Arc::new(timers.clone()),
        ));
        let scheduler = ReminderScheduler::new(dispatcher, Arc::new(timers.clone()));

        let ScheduleOutcome::Scheduled(pending) = scheduler.schedule_reminder_at(
            "a",
            "Dentist",
            Some(at(12, 0)),
            &reminder(ReminderTime::OneDay),
            Utc.with_ymd_and_hms(2023, 12, 30, 12, 0, 0).unwrap(),
        ) else {
            panic!("expected scheduled");
        };
        assert_eq!(timers.started(), 0);
        {
            let scheduled = host.scheduled.lock().unwrap();
            assert_eq!(scheduled.len(), 1);
            let (id, title, body, delay) = &scheduled[0];
            assert_eq!(id, &pending.notification_id);
            assert!(id.starts_with("todo-a-"));
            assert_eq!(title, REMINDER_TITLE);
            assert!(body.ends_with("1 day"));
            assert_eq!(*delay, Duration::from_secs(24 * 3600));
        }

        scheduler.cancel_reminder("a");
        assert_eq!(
            host.cancelled.lock().unwrap().clone(),
            vec![pending.notification_id]
        );
    }

    #[test]
    fn host_entries_are_pruned_once_their_fire_time_passes() {
        let host = Arc::new(RecordingHost::default());
        let timers = ManualTimers::new();
        let platform = Arc::new(RecordingNotifier::new(Permission::Granted));
        let dispatcher = Arc::new(NotificationDispatcher::new(
            HostBridge::Available(host.clone()),
            platform,
            Arc::new(timers.clone()),
        ));
        let scheduler = ReminderScheduler::new(dispatcher, Arc::new(timers.clone()));

        let first = task("a", Some(at(10, 0)), reminder(ReminderTime::ThirtyMinutes));
        assert!(matches!(scheduler.reevaluate(&first, at(9, 0)), ScheduleOutcome::Scheduled(_)));
        assert_eq!(scheduler.pending_count(), 1);

        // "a" fired at 9:30 inside the host.
        let second = task("b", Some(at(12, 0)), reminder(ReminderTime::ThirtyMinutes));
        assert!(matches!(scheduler.reevaluate(&second, at(10, 0)), ScheduleOutcome::Scheduled(_)));
        assert_eq!(scheduler.pending_count(), 1);
        assert!(scheduler.pending_for("a").is_empty());
        assert_eq!(scheduler.pending_for("b").len(), 1);
        assert_eq!(host.scheduled.lock().unwrap().len(), 2);
        assert_eq!(timers.started(), 0);
    }

    #[test]
    fn reevaluate_cancels_when_reminder_is_turned_off_or_task_completed() {
        let h = harness();
        let mut t = task("a", Some(at(12, 0)), reminder(ReminderTime::OneHour));
        assert!(matches!(
            h.scheduler.reevaluate(&t, at(9, 0)),
            ScheduleOutcome::Scheduled(_)
        ));

        t.reminder.enabled = false;
        h.scheduler.reevaluate(&t, at(9, 0));
        assert_eq!(h.scheduler.pending_count(), 0);

        t.reminder.enabled = true;
        h.scheduler.reevaluate(&t, at(9, 0));
        t.completed = true;
        h.scheduler.reevaluate(&t, at(9, 0));
        assert_eq!(h.scheduler.pending_count(), 0);
        assert_eq!(h.timers.active(), 0);
    }

    #[test]
    fn sync_all_schedules_open_tasks_and_drops_removed_ones() {
        let h = harness();
        let r = reminder(ReminderTime::FiveMinutes);
        let tasks = vec![
            task("a", Some(at(12, 0)), r.clone()),
            task("b", None, r.clone()),
            task("c", Some(at(8, 0)), r.clone()),
        ];
        assert_eq!(h.scheduler.sync_all(&tasks, at(9, 0)), 1);
        assert_eq!(h.scheduler.pending_count(), 1);

        assert_eq!(h.scheduler.sync_all(&tasks[1..], at(9, 0)), 0);
        assert_eq!(h.scheduler.pending_count(), 0);
    }

    #[test]
    fn effects_map_to_schedule_changes() {
        let h = harness();
        let r = reminder(ReminderTime::FiveMinutes);
        let tasks = vec![task("a", Some(at(12, 0)), r.clone()), task("b", Some(at(12, 0)), r)];

        h.scheduler
            .apply_effect(&ReminderEffect::Reschedule("a".into()), &tasks, at(9, 0));
        assert_eq!(h.scheduler.pending_for("a").len(), 1);

        h.scheduler
            .apply_effect(&ReminderEffect::Cancel("a".into()), &tasks, at(9, 0));
        assert_eq!(h.scheduler.pending_count(), 0);

        h.scheduler
            .apply_effect(&ReminderEffect::ResyncAll, &tasks, at(9, 0));
        assert_eq!(h.scheduler.pending_count(), 2);

        // A reschedule for a task that is gone only cancels.
        h.scheduler
            .apply_effect(&ReminderEffect::Reschedule("b".into()), &tasks[..1], at(9, 0));
        assert!(h.scheduler.pending_for("b").is_empty());
    }

    #[test]
    fn time_remaining_phrases() {
        assert_eq!(format_time_remaining(1), "1 minute");
        assert_eq!(format_time_remaining(5), "5 minutes");
        assert_eq!(format_time_remaining(60), "1 hour");
        assert_eq!(format_time_remaining(90), "1 hour");
        assert_eq!(format_time_remaining(180), "3 hours");
        assert_eq!(format_time_remaining(1440), "1 day");
        assert_eq!(format_time_remaining(4000), "2 days");
    }
}
