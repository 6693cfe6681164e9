mod actions;
mod commands;
mod events;
mod filter;
mod logging;
mod models;
mod notifications;
mod reminders;
mod sounds;
mod state;
mod storage;
mod timers;
mod window;

#[cfg(all(feature = "app", not(test)))]
use std::sync::Arc;

#[cfg(all(feature = "app", not(test)))]
use chrono::Utc;
#[cfg(all(feature = "app", not(test)))]
use log::{info, warn};
#[cfg(all(feature = "app", not(test)))]
use tauri::{Emitter, Manager, WebviewWindowBuilder, WindowEvent};

#[cfg(all(feature = "app", not(test)))]
use crate::commands::*;
#[cfg(all(feature = "app", not(test)))]
use crate::events::EVENT_WINDOW_STATE;
#[cfg(all(feature = "app", not(test)))]
use crate::logging::init_logging;
#[cfg(all(feature = "app", not(test)))]
use crate::notifications::{
    HostBridge, NotificationDispatcher, PlatformNotifier, ShellNotifications, TauriNotifier,
};
#[cfg(all(feature = "app", not(test)))]
use crate::reminders::ReminderScheduler;
#[cfg(all(feature = "app", not(test)))]
use crate::state::AppState;
#[cfg(all(feature = "app", not(test)))]
use crate::storage::Storage;
#[cfg(all(feature = "app", not(test)))]
use crate::timers::{Timers, TokioTimers};
#[cfg(all(feature = "app", not(test)))]
use crate::window::{MaximizeTracker, MAIN_WINDOW_LABEL, MAIN_WINDOW_SIZE, MAIN_WINDOW_TITLE};

#[cfg_attr(mobile, tauri::mobile_entry_point)]
#[cfg(all(feature = "app", not(test)))]
pub fn run() {
    tauri::Builder::default()
        .plugin(tauri_plugin_notification::init())
        .plugin(tauri_plugin_dialog::init())
        .setup(|app| {
            let data_dir = app.path().app_data_dir()?;
            if let Err(err) = init_logging(&data_dir) {
                eprintln!("failed to initialize logging: {err}");
            }

            let storage = Storage::new(data_dir);
            storage.ensure_dirs()?;
            let state = AppState::new(
                storage.load_tasks_or_default(),
                storage.load_preferences_or_default(),
            );

            let runtime = tauri::async_runtime::block_on(async { tokio::runtime::Handle::current() });
            let timers: Arc<dyn Timers> = Arc::new(TokioTimers::new(runtime));
            let platform: Arc<dyn PlatformNotifier> =
                Arc::new(TauriNotifier::new(app.handle().clone()));
            let shell = Arc::new(ShellNotifications::new(
                Arc::clone(&platform),
                Arc::clone(&timers),
            ));
            let dispatcher = Arc::new(NotificationDispatcher::new(
                HostBridge::Available(shell.clone()),
                platform,
                Arc::clone(&timers),
            ));
            let reminders = ReminderScheduler::new(dispatcher, timers);

            let tasks = state.tasks();
            let scheduled = reminders.sync_all(&tasks, Utc::now());
            info!("loaded {} tasks, {scheduled} reminders pending", tasks.len());

            app.manage(state);
            app.manage(reminders);
            app.manage(shell);
            app.manage(MaximizeTracker::new());

            let (width, height) = MAIN_WINDOW_SIZE;
            WebviewWindowBuilder::new(
                app,
                MAIN_WINDOW_LABEL,
                tauri::WebviewUrl::App("index.html".into()),
            )
            .title(MAIN_WINDOW_TITLE)
            .inner_size(width, height)
            // The UI draws its own title bar.
            .decorations(false)
            .build()?;

            Ok(())
        })
        .on_window_event(|window, event| {
            if !matches!(event, WindowEvent::Resized(_)) || window.label() != MAIN_WINDOW_LABEL {
                return;
            }
            let maximized = match window.is_maximized() {
                Ok(maximized) => maximized,
                Err(err) => {
                    warn!("failed to read maximize state: {err}");
                    return;
                }
            };
            let tracker = window.app_handle().state::<MaximizeTracker>();
            if let Some(maximized) = tracker.observe(maximized) {
                let _ = window.emit(EVENT_WINDOW_STATE, maximized);
            }
        })
        .invoke_handler(tauri::generate_handler![
            load_state,
            add_task,
            update_task,
            toggle_task,
            delete_task,
            add_subtask,
            toggle_subtask,
            delete_subtask,
            set_reminder,
            filter_tasks,
            task_summary,
            update_preferences,
            change_sound,
            toggle_sound,
            set_volume,
            import_sound,
            select_custom_sound,
            export_tasks_json,
            import_tasks_json,
            show_notification,
            schedule_notification,
            cancel_notification,
            minimize_window,
            maximize_window,
            close_window,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
