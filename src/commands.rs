use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Local, Utc};
use log::{info, warn};

use crate::actions::TaskAction;
use crate::events::StatePayload;
#[cfg(all(feature = "app", not(test)))]
use crate::events::EVENT_STATE_UPDATED;
use crate::filter::{summarize, TaskFilter, TaskSummary};
use crate::models::{Preferences, Reminder, SoundKind, Task, TaskDraft};
use crate::notifications::{HostNotifications, NotificationDispatcher};
use crate::reminders::ReminderScheduler;
use crate::sounds;
use crate::state::AppState;
use crate::storage::{load_json, write_atomic, Storage, StorageError};
use crate::window::{toggle_maximize, WindowControl};

#[cfg(all(feature = "app", not(test)))]
use crate::notifications::ShellNotifications;
#[cfg(all(feature = "app", not(test)))]
use std::sync::Arc;
#[cfg(all(feature = "app", not(test)))]
use tauri::{AppHandle, Emitter, Manager, Runtime, State, WebviewWindow};

#[derive(Debug, serde::Serialize)]
pub struct CommandResult<T> {
    pub ok: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedState {
    pub tasks: Vec<Task>,
    pub preferences: Preferences,
}

trait CommandCtx {
    fn app_data_dir(&self) -> Result<PathBuf, StorageError>;
    fn emit_state_updated(&self, payload: StatePayload);
}

fn ok<T>(data: T) -> CommandResult<T> {
    CommandResult {
        ok: true,
        data: Some(data),
        error: None,
    }
}

fn err<T>(message: &str) -> CommandResult<T> {
    CommandResult {
        ok: false,
        data: None,
        error: Some(message.to_string()),
    }
}

fn open_storage(ctx: &impl CommandCtx) -> Result<Storage, StorageError> {
    let storage = Storage::new(ctx.app_data_dir()?);
    storage.ensure_dirs()?;
    Ok(storage)
}

fn persist(ctx: &impl CommandCtx, state: &AppState) -> Result<(), StorageError> {
    let storage = open_storage(ctx)?;
    let tasks = state.tasks();
    let preferences = state.preferences();
    storage.save_tasks(&tasks)?;
    storage.save_preferences(&preferences)?;
    ctx.emit_state_updated(StatePayload { tasks, preferences });
    Ok(())
}

/// Reduces, saves, then brings reminders in line. A failed save puts the old list back.
fn run_action(
    ctx: &impl CommandCtx,
    state: &AppState,
    reminders: &ReminderScheduler,
    action: TaskAction,
) -> Result<Option<Task>, String> {
    let now = Utc::now();
    let before = state.tasks();
    let transition = state.dispatch(action, now).map_err(|e| e.to_string())?;
    if let Err(error) = persist(ctx, state) {
        state.restore_tasks(before);
        return Err(format!("storage error: {error}"));
    }
    reminders.apply_effect(&transition.effect, &transition.tasks, now);
    Ok(transition.task)
}

fn task_command(
    ctx: &impl CommandCtx,
    state: &AppState,
    reminders: &ReminderScheduler,
    action: TaskAction,
) -> CommandResult<Task> {
    match run_action(ctx, state, reminders, action) {
        Ok(Some(task)) => ok(task),
        Ok(None) => err("task not found"),
        Err(message) => err(&message),
    }
}

#[cfg(all(feature = "app", not(test)))]
struct TauriCommandCtx<'a, R: Runtime> {
    app: &'a AppHandle<R>,
}

#[cfg(all(feature = "app", not(test)))]
impl<R: Runtime> CommandCtx for TauriCommandCtx<'_, R> {
    fn app_data_dir(&self) -> Result<PathBuf, StorageError> {
        self.app
            .path()
            .app_data_dir()
            .map_err(|err| StorageError::Io(std::io::Error::other(err.to_string())))
    }

    fn emit_state_updated(&self, payload: StatePayload) {
        let _ = self.app.emit(EVENT_STATE_UPDATED, payload);
    }
}

fn load_state_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    reminders: &ReminderScheduler,
) -> CommandResult<LoadedState> {
    let storage = match open_storage(ctx) {
        Ok(storage) => storage,
        Err(error) => return err(&format!("storage error: {error}")),
    };
    let tasks = storage.load_tasks_or_default();
    let preferences = storage.load_preferences_or_default();

    let now = Utc::now();
    let transition = match state.dispatch(TaskAction::Replace(tasks), now) {
        Ok(transition) => transition,
        Err(error) => return err(&error.to_string()),
    };
    state.update_preferences(preferences.clone());
    reminders.apply_effect(&transition.effect, &transition.tasks, now);
    ok(LoadedState {
        tasks: transition.tasks,
        preferences,
    })
}

fn add_task_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    reminders: &ReminderScheduler,
    draft: TaskDraft,
) -> CommandResult<Task> {
    task_command(ctx, state, reminders, TaskAction::Add(draft))
}

fn update_task_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    reminders: &ReminderScheduler,
    task: Task,
) -> CommandResult<Task> {
    task_command(ctx, state, reminders, TaskAction::Update(task))
}

fn toggle_task_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    reminders: &ReminderScheduler,
    task_id: String,
) -> CommandResult<Task> {
    task_command(ctx, state, reminders, TaskAction::Toggle { task_id })
}

fn delete_task_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    reminders: &ReminderScheduler,
    task_id: String,
) -> CommandResult<bool> {
    match run_action(ctx, state, reminders, TaskAction::Delete { task_id }) {
        Ok(_) => ok(true),
        Err(message) => err(&message),
    }
}

fn add_subtask_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    reminders: &ReminderScheduler,
    task_id: String,
    text: String,
) -> CommandResult<Task> {
    task_command(ctx, state, reminders, TaskAction::AddSubtask { task_id, text })
}

fn toggle_subtask_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    reminders: &ReminderScheduler,
    task_id: String,
    subtask_id: String,
) -> CommandResult<Task> {
    task_command(
        ctx,
        state,
        reminders,
        TaskAction::ToggleSubtask {
            task_id,
            subtask_id,
        },
    )
}

fn delete_subtask_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    reminders: &ReminderScheduler,
    task_id: String,
    subtask_id: String,
) -> CommandResult<Task> {
    task_command(
        ctx,
        state,
        reminders,
        TaskAction::DeleteSubtask {
            task_id,
            subtask_id,
        },
    )
}

fn set_reminder_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    reminders: &ReminderScheduler,
    task_id: String,
    reminder: Reminder,
) -> CommandResult<Task> {
    task_command(ctx, state, reminders, TaskAction::SetReminder { task_id, reminder })
}

fn filter_tasks_impl(state: &AppState, filter: TaskFilter) -> CommandResult<Vec<Task>> {
    ok(filter.apply(&state.tasks()))
}

fn task_summary_impl(state: &AppState) -> CommandResult<TaskSummary> {
    ok(summarize(&state.tasks(), Utc::now()))
}

fn update_preferences_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    preferences: Preferences,
) -> CommandResult<Preferences> {
    let previous = state.preferences();
    state.update_preferences(preferences.clone());
    if let Err(error) = persist(ctx, state) {
        state.update_preferences(previous);
        return err(&format!("storage error: {error}"));
    }
    ok(preferences)
}

fn save_sound_change(ctx: &impl CommandCtx, state: &AppState, previous: Preferences) -> CommandResult<Preferences> {
    if let Err(error) = persist(ctx, state) {
        state.update_preferences(previous);
        return err(&format!("storage error: {error}"));
    }
    ok(state.preferences())
}

fn change_sound_impl(ctx: &impl CommandCtx, state: &AppState, kind: SoundKind) -> CommandResult<Preferences> {
    let previous = state.preferences();
    state.update_sound(|sound| sounds::change_sound(sound, kind));
    save_sound_change(ctx, state, previous)
}

fn toggle_sound_impl(ctx: &impl CommandCtx, state: &AppState) -> CommandResult<Preferences> {
    let previous = state.preferences();
    state.update_sound(sounds::toggle_play);
    save_sound_change(ctx, state, previous)
}

fn set_volume_impl(ctx: &impl CommandCtx, state: &AppState, volume: f32) -> CommandResult<Preferences> {
    let previous = state.preferences();
    state.update_sound(|sound| sounds::adjust_volume(sound, volume));
    save_sound_change(ctx, state, previous)
}

/// Import problems are logged, not reported: the UI just sees `None`.
fn import_sound_impl(ctx: &impl CommandCtx, state: &AppState, path: String) -> CommandResult<Option<String>> {
    let root = match ctx.app_data_dir() {
        Ok(root) => root,
        Err(error) => {
            warn!("sound import skipped: {error}");
            return ok(None);
        }
    };
    let sounds_dir = Storage::new(root).sounds_dir();
    let Some(name) = sounds::import_sound(&sounds_dir, Path::new(&path)) else {
        return ok(None);
    };
    state.update_sound(|sound| sounds::use_custom(sound, name.clone()));
    if let Err(error) = persist(ctx, state) {
        warn!("failed to save imported sound selection: {error}");
    }
    ok(Some(name))
}

fn select_custom_sound_impl(ctx: &impl CommandCtx, state: &AppState, file_name: String) -> CommandResult<Preferences> {
    let previous = state.preferences();
    let Some(sound) = sounds::select_custom(&previous.sound, &file_name) else {
        return err(&format!("unknown custom sound: {file_name}"));
    };
    state.update_sound(|_| sound);
    save_sound_change(ctx, state, previous)
}

fn export_path(storage: &Storage) -> PathBuf {
    let stamp = Local::now().format("%Y%m%d-%H%M%S").to_string();
    storage.exports_dir().join(format!("todos-{stamp}.json"))
}

fn export_tasks_json_impl(ctx: &impl CommandCtx, state: &AppState) -> CommandResult<String> {
    let storage = match open_storage(ctx) {
        Ok(storage) => storage,
        Err(error) => return err(&format!("storage error: {error}")),
    };
    let path = export_path(&storage);
    if let Err(error) = write_atomic(&path, &state.tasks()) {
        return err(&format!("export error: {error}"));
    }
    info!("exported tasks to {}", path.display());
    ok(path.to_string_lossy().to_string())
}

fn import_tasks_json_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    reminders: &ReminderScheduler,
    path: String,
) -> CommandResult<Vec<Task>> {
    let tasks: Vec<Task> = match load_json(Path::new(&path)) {
        Ok(tasks) => tasks,
        Err(error) => return err(&format!("import error: {error}")),
    };
    if let Err(message) = run_action(ctx, state, reminders, TaskAction::Replace(tasks)) {
        return err(&message);
    }
    info!("imported tasks from {path}");
    ok(state.tasks())
}

fn show_notification_impl(dispatcher: &NotificationDispatcher, title: String, body: String) -> CommandResult<bool> {
    dispatcher.show_notification(&title, &body);
    ok(true)
}

fn schedule_notification_impl(
    host: &dyn HostNotifications,
    id: String,
    title: String,
    body: String,
    delay: u64,
) -> CommandResult<bool> {
    if id.trim().is_empty() {
        return err("notification id must not be empty");
    }
    host.schedule_notification(&id, &title, &body, Duration::from_millis(delay));
    ok(true)
}

fn cancel_notification_impl(host: &dyn HostNotifications, id: String) -> CommandResult<bool> {
    host.cancel_notification(&id);
    ok(true)
}

fn minimize_window_impl(window: &impl WindowControl) -> CommandResult<bool> {
    match window.minimize() {
        Ok(()) => ok(true),
        Err(error) => err(&error.to_string()),
    }
}

fn maximize_window_impl(window: &impl WindowControl) -> CommandResult<bool> {
    match toggle_maximize(window) {
        Ok(maximized) => ok(maximized),
        Err(error) => err(&error.to_string()),
    }
}

fn close_window_impl(window: &impl WindowControl) -> CommandResult<bool> {
    match window.close() {
        Ok(()) => ok(true),
        Err(error) => err(&error.to_string()),
    }
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn load_state(
    app: AppHandle,
    state: State<AppState>,
    reminders: State<ReminderScheduler>,
) -> CommandResult<LoadedState> {
    let ctx = TauriCommandCtx { app: &app };
    load_state_impl(&ctx, state.inner(), reminders.inner())
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn add_task(
    app: AppHandle,
    state: State<AppState>,
    reminders: State<ReminderScheduler>,
    draft: TaskDraft,
) -> CommandResult<Task> {
    let ctx = TauriCommandCtx { app: &app };
    add_task_impl(&ctx, state.inner(), reminders.inner(), draft)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn update_task(
    app: AppHandle,
    state: State<AppState>,
    reminders: State<ReminderScheduler>,
    task: Task,
) -> CommandResult<Task> {
    let ctx = TauriCommandCtx { app: &app };
    update_task_impl(&ctx, state.inner(), reminders.inner(), task)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn toggle_task(
    app: AppHandle,
    state: State<AppState>,
    reminders: State<ReminderScheduler>,
    task_id: String,
) -> CommandResult<Task> {
    let ctx = TauriCommandCtx { app: &app };
    toggle_task_impl(&ctx, state.inner(), reminders.inner(), task_id)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn delete_task(
    app: AppHandle,
    state: State<AppState>,
    reminders: State<ReminderScheduler>,
    task_id: String,
) -> CommandResult<bool> {
    let ctx = TauriCommandCtx { app: &app };
    delete_task_impl(&ctx, state.inner(), reminders.inner(), task_id)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn add_subtask(
    app: AppHandle,
    state: State<AppState>,
    reminders: State<ReminderScheduler>,
    task_id: String,
    text: String,
) -> CommandResult<Task> {
    let ctx = TauriCommandCtx { app: &app };
    add_subtask_impl(&ctx, state.inner(), reminders.inner(), task_id, text)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn toggle_subtask(
    app: AppHandle,
    state: State<AppState>,
    reminders: State<ReminderScheduler>,
    task_id: String,
    subtask_id: String,
) -> CommandResult<Task> {
    let ctx = TauriCommandCtx { app: &app };
    toggle_subtask_impl(&ctx, state.inner(), reminders.inner(), task_id, subtask_id)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn delete_subtask(
    app: AppHandle,
    state: State<AppState>,
    reminders: State<ReminderScheduler>,
    task_id: String,
    subtask_id: String,
) -> CommandResult<Task> {
    let ctx = TauriCommandCtx { app: &app };
    delete_subtask_impl(&ctx, state.inner(), reminders.inner(), task_id, subtask_id)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn set_reminder(
    app: AppHandle,
    state: State<AppState>,
    reminders: State<ReminderScheduler>,
    task_id: String,
    reminder: Reminder,
) -> CommandResult<Task> {
    let ctx = TauriCommandCtx { app: &app };
    set_reminder_impl(&ctx, state.inner(), reminders.inner(), task_id, reminder)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn filter_tasks(state: State<AppState>, filter: TaskFilter) -> CommandResult<Vec<Task>> {
    filter_tasks_impl(state.inner(), filter)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn task_summary(state: State<AppState>) -> CommandResult<TaskSummary> {
    task_summary_impl(state.inner())
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn update_preferences(
    app: AppHandle,
    state: State<AppState>,
    preferences: Preferences,
) -> CommandResult<Preferences> {
    let ctx = TauriCommandCtx { app: &app };
    update_preferences_impl(&ctx, state.inner(), preferences)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn change_sound(app: AppHandle, state: State<AppState>, kind: SoundKind) -> CommandResult<Preferences> {
    let ctx = TauriCommandCtx { app: &app };
    change_sound_impl(&ctx, state.inner(), kind)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn toggle_sound(app: AppHandle, state: State<AppState>) -> CommandResult<Preferences> {
    let ctx = TauriCommandCtx { app: &app };
    toggle_sound_impl(&ctx, state.inner())
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn set_volume(app: AppHandle, state: State<AppState>, volume: f32) -> CommandResult<Preferences> {
    let ctx = TauriCommandCtx { app: &app };
    set_volume_impl(&ctx, state.inner(), volume)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn import_sound(app: AppHandle, state: State<AppState>, path: String) -> CommandResult<Option<String>> {
    let ctx = TauriCommandCtx { app: &app };
    import_sound_impl(&ctx, state.inner(), path)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn select_custom_sound(app: AppHandle, state: State<AppState>, file_name: String) -> CommandResult<Preferences> {
    let ctx = TauriCommandCtx { app: &app };
    select_custom_sound_impl(&ctx, state.inner(), file_name)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn export_tasks_json(app: AppHandle, state: State<AppState>) -> CommandResult<String> {
    let ctx = TauriCommandCtx { app: &app };
    export_tasks_json_impl(&ctx, state.inner())
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn import_tasks_json(
    app: AppHandle,
    state: State<AppState>,
    reminders: State<ReminderScheduler>,
    path: String,
) -> CommandResult<Vec<Task>> {
    let ctx = TauriCommandCtx { app: &app };
    import_tasks_json_impl(&ctx, state.inner(), reminders.inner(), path)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn show_notification(reminders: State<ReminderScheduler>, title: String, body: String) -> CommandResult<bool> {
    show_notification_impl(reminders.dispatcher(), title, body)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn schedule_notification(
    host: State<Arc<ShellNotifications>>,
    id: String,
    title: String,
    body: String,
    delay: u64,
) -> CommandResult<bool> {
    schedule_notification_impl(host.inner().as_ref(), id, title, body, delay)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn cancel_notification(host: State<Arc<ShellNotifications>>, id: String) -> CommandResult<bool> {
    cancel_notification_impl(host.inner().as_ref(), id)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn minimize_window(window: WebviewWindow) -> CommandResult<bool> {
    minimize_window_impl(&window)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn maximize_window(window: WebviewWindow) -> CommandResult<bool> {
    maximize_window_impl(&window)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn close_window(window: WebviewWindow) -> CommandResult<bool> {
    close_window_impl(&window)
}
