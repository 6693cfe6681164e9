//! Task list transitions. Every function here is pure: it takes the current list and returns
//! the next one, plus the reminder work the caller has to do afterwards.

use thiserror::Error;

use crate::models::{normalize_tags, Reminder, Subtask, Task, TaskDraft, Timestamp};

#[derive(Debug, Clone)]
pub enum TaskAction {
    Add(TaskDraft),
    Update(Task),
    Toggle { task_id: String },
    Delete { task_id: String },
    AddSubtask { task_id: String, text: String },
    ToggleSubtask { task_id: String, subtask_id: String },
    DeleteSubtask { task_id: String, subtask_id: String },
    SetReminder { task_id: String, reminder: Reminder },
    Replace(Vec<Task>),
}

/// Reminder follow-up for a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReminderEffect {
    Reschedule(String),
    Cancel(String),
    ResyncAll,
}

#[derive(Debug, Clone)]
pub struct Transition {
    pub tasks: Vec<Task>,
    /// The task the action touched, as it is after the action.
    pub task: Option<Task>,
    pub effect: ReminderEffect,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("task not found")]
    TaskNotFound,
    #[error("subtask not found")]
    SubtaskNotFound,
    #[error("text must not be empty")]
    EmptyText,
}

pub fn reduce(tasks: &[Task], action: TaskAction, now: Timestamp) -> Result<Transition, ActionError> {
    match action {
        TaskAction::Add(draft) => add(tasks, draft, now),
        TaskAction::Update(task) => {
            let task = task.normalized();
            let id = task.id.clone();
            replace_with(tasks, &id, |existing| *existing = task)
        }
        TaskAction::Toggle { task_id } => replace_with(tasks, &task_id, |task| {
            task.completed = !task.completed;
        }),
        TaskAction::Delete { task_id } => {
            if !tasks.iter().any(|t| t.id == task_id) {
                return Err(ActionError::TaskNotFound);
            }
            let next = tasks.iter().filter(|t| t.id != task_id).cloned().collect();
            Ok(Transition {
                tasks: next,
                task: None,
                effect: ReminderEffect::Cancel(task_id),
            })
        }
        TaskAction::AddSubtask { task_id, text } => {
            let text = text.trim().to_string();
            if text.is_empty() {
                return Err(ActionError::EmptyText);
            }
            replace_with(tasks, &task_id, |task| {
                let id = unique_id(now, |candidate| task.subtasks.iter().any(|s| s.id == candidate));
                task.subtasks.push(Subtask {
                    id,
                    text,
                    completed: false,
                });
            })
        }
        TaskAction::ToggleSubtask {
            task_id,
            subtask_id,
        } => {
            ensure_subtask(tasks, &task_id, &subtask_id)?;
            replace_with(tasks, &task_id, |task| {
                for subtask in task.subtasks.iter_mut().filter(|s| s.id == subtask_id) {
                    subtask.completed = !subtask.completed;
                }
            })
        }
        TaskAction::DeleteSubtask {
            task_id,
            subtask_id,
        } => {
            ensure_subtask(tasks, &task_id, &subtask_id)?;
            replace_with(tasks, &task_id, |task| {
                task.subtasks.retain(|s| s.id != subtask_id);
            })
        }
        TaskAction::SetReminder { task_id, reminder } => replace_with(tasks, &task_id, |task| {
            task.reminder = reminder;
            task.normalize();
        }),
        TaskAction::Replace(next) => Ok(Transition {
            tasks: next.into_iter().map(Task::normalized).collect(),
            task: None,
            effect: ReminderEffect::ResyncAll,
        }),
    }
}

fn add(tasks: &[Task], draft: TaskDraft, now: Timestamp) -> Result<Transition, ActionError> {
    let text = draft.text.trim().to_string();
    if text.is_empty() {
        return Err(ActionError::EmptyText);
    }
    let id = unique_id(now, |candidate| tasks.iter().any(|t| t.id == candidate));
    let task = Task {
        id,
        text,
        completed: false,
        category: draft.category,
        priority: draft.priority,
        due_date: draft.due_date,
        subtasks: Vec::new(),
        tags: normalize_tags(draft.tags),
        reminder: draft.reminder.unwrap_or_default(),
        created_at: now,
    }
    .normalized();

    // Newest first, the way the list renders.
    let mut next = Vec::with_capacity(tasks.len() + 1);
    next.push(task.clone());
    next.extend(tasks.iter().cloned());
    Ok(Transition {
        tasks: next,
        effect: ReminderEffect::Reschedule(task.id.clone()),
        task: Some(task),
    })
}

/// Copy-on-write update of a single record.
fn replace_with(
    tasks: &[Task],
    task_id: &str,
    update: impl FnOnce(&mut Task),
) -> Result<Transition, ActionError> {
    let index = tasks
        .iter()
        .position(|t| t.id == task_id)
        .ok_or(ActionError::TaskNotFound)?;
    let mut next = tasks.to_vec();
    update(&mut next[index]);
    let task = next[index].clone();
    let effect = if task.completed {
        ReminderEffect::Cancel(task.id.clone())
    } else {
        ReminderEffect::Reschedule(task.id.clone())
    };
    Ok(Transition {
        tasks: next,
        task: Some(task),
        effect,
    })
}

fn ensure_subtask(tasks: &[Task], task_id: &str, subtask_id: &str) -> Result<(), ActionError> {
    let task = tasks
        .iter()
        .find(|t| t.id == task_id)
        .ok_or(ActionError::TaskNotFound)?;
    if task.subtasks.iter().any(|s| s.id == subtask_id) {
        Ok(())
    } else {
        Err(ActionError::SubtaskNotFound)
    }
}

/// Millisecond ids, bumped until they no longer collide.
fn unique_id(now: Timestamp, taken: impl Fn(&str) -> bool) -> String {
    let mut millis = now.timestamp_millis();
    loop {
        let candidate = millis.to_string();
        if !taken(&candidate) {
            return candidate;
        }
        millis += 1;
    }
}
