use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, warn};

use crate::timers::{TimerHandle, Timers};

#[cfg(all(feature = "app", not(test)))]
use crate::events::{NotificationPayload, EVENT_NOTIFICATION_SHOWN};
#[cfg(all(feature = "app", not(test)))]
use tauri::{AppHandle, Emitter, Runtime};
#[cfg(all(feature = "app", not(test)))]
use tauri_plugin_notification::{NotificationExt, PermissionState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    Undetermined,
}

/// The operating system's notification center.
pub trait PlatformNotifier: Send + Sync {
    fn permission(&self) -> Permission;
    /// May block while the user answers a prompt.
    fn request_permission(&self) -> Permission;
    fn show(&self, title: &str, body: &str) -> Result<(), String>;
}

/// Notification capabilities a host shell offers to the UI.
pub trait HostNotifications: Send + Sync {
    fn show_notification(&self, title: &str, body: &str);
    fn schedule_notification(&self, id: &str, title: &str, body: &str, delay: Duration);
    fn cancel_notification(&self, id: &str);
}

#[derive(Clone)]
pub enum HostBridge {
    Available(Arc<dyn HostNotifications>),
    Unavailable,
}

impl std::fmt::Debug for HostBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostBridge::Available(_) => f.write_str("HostBridge::Available"),
            HostBridge::Unavailable => f.write_str("HostBridge::Unavailable"),
        }
    }
}

/// Fire-and-forget notification display. Nothing is reported back to the caller.
pub struct NotificationDispatcher {
    host: HostBridge,
    platform: Arc<dyn PlatformNotifier>,
    timers: Arc<dyn Timers>,
}

impl NotificationDispatcher {
    pub fn new(host: HostBridge, platform: Arc<dyn PlatformNotifier>, timers: Arc<dyn Timers>) -> Self {
        Self {
            host,
            platform,
            timers,
        }
    }

    pub fn host(&self) -> &HostBridge {
        &self.host
    }

    pub fn show_notification(&self, title: &str, body: &str) {
        if let HostBridge::Available(host) = &self.host {
            host.show_notification(title, body);
            return;
        }

        match self.platform.permission() {
            Permission::Granted => show_logged(self.platform.as_ref(), title, body),
            Permission::Denied => debug!("notification permission denied, dropping \"{title}\""),
            Permission::Undetermined => {
                let platform = Arc::clone(&self.platform);
                let title = title.to_string();
                let body = body.to_string();
                // The prompt runs off the caller's path; the handle is intentionally dropped.
                let _ = self.timers.start(
                    Duration::ZERO,
                    Box::new(move || match platform.request_permission() {
                        Permission::Granted => show_logged(platform.as_ref(), &title, &body),
                        other => debug!("notification permission {other:?}, dropping \"{title}\""),
                    }),
                );
            }
        }
    }
}

fn show_logged(platform: &dyn PlatformNotifier, title: &str, body: &str) {
    if let Err(err) = platform.show(title, body) {
        warn!("failed to show notification \"{title}\": {err}");
    }
}

struct ScheduledEntry {
    generation: u64,
    handle: TimerHandle,
}

/// Shell-side notification host: shows through the platform and keeps its own id-keyed
/// timers. Scheduling an id that is already pending replaces it.
pub struct ShellNotifications {
    platform: Arc<dyn PlatformNotifier>,
    timers: Arc<dyn Timers>,
    scheduled: Arc<Mutex<HashMap<String, ScheduledEntry>>>,
    generation: AtomicU64,
}

impl ShellNotifications {
    pub fn new(platform: Arc<dyn PlatformNotifier>, timers: Arc<dyn Timers>) -> Self {
        Self {
            platform,
            timers,
            scheduled: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
        }
    }

    pub fn pending_ids(&self) -> Vec<String> {
        let guard = self.scheduled.lock().expect("notifications poisoned");
        let mut ids: Vec<String> = guard.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl HostNotifications for ShellNotifications {
    fn show_notification(&self, title: &str, body: &str) {
        show_logged(self.platform.as_ref(), title, body);
    }

    fn schedule_notification(&self, id: &str, title: &str, body: &str, delay: Duration) {
        self.cancel_notification(id);

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let platform = Arc::clone(&self.platform);
        let scheduled = Arc::clone(&self.scheduled);
        let key = id.to_string();
        let title = title.to_string();
        let body = body.to_string();
        // Held across `start` so a zero-delay timer cannot fire before its entry exists.
        let mut guard = self.scheduled.lock().expect("notifications poisoned");
        let handle = self.timers.start(
            delay,
            Box::new(move || {
                {
                    let mut guard = scheduled.lock().expect("notifications poisoned");
                    if guard.get(&key).is_some_and(|e| e.generation == generation) {
                        guard.remove(&key);
                    }
                }
                show_logged(platform.as_ref(), &title, &body);
            }),
        );

        guard.insert(id.to_string(), ScheduledEntry { generation, handle });
        debug!("scheduled notification {id} in {}s", delay.as_secs());
    }

    fn cancel_notification(&self, id: &str) {
        let removed = {
            let mut guard = self.scheduled.lock().expect("notifications poisoned");
            guard.remove(id)
        };
        if let Some(entry) = removed {
            entry.handle.cancel();
            debug!("cancelled notification {id}");
        }
    }
}

#[cfg(all(feature = "app", not(test)))]
pub struct TauriNotifier<R: Runtime> {
    app: AppHandle<R>,
}

#[cfg(all(feature = "app", not(test)))]
impl<R: Runtime> TauriNotifier<R> {
    pub fn new(app: AppHandle<R>) -> Self {
        Self { app }
    }
}

#[cfg(all(feature = "app", not(test)))]
fn permission_from(state: Result<PermissionState, tauri_plugin_notification::Error>) -> Permission {
    match state {
        Ok(PermissionState::Granted) => Permission::Granted,
        Ok(PermissionState::Denied) => Permission::Denied,
        Ok(_) => Permission::Undetermined,
        Err(err) => {
            warn!("notification permission query failed: {err}");
            Permission::Undetermined
        }
    }
}

#[cfg(all(feature = "app", not(test)))]
impl<R: Runtime> PlatformNotifier for TauriNotifier<R> {
    fn permission(&self) -> Permission {
        permission_from(self.app.notification().permission_state())
    }

    fn request_permission(&self) -> Permission {
        permission_from(self.app.notification().request_permission())
    }

    fn show(&self, title: &str, body: &str) -> Result<(), String> {
        self.app
            .notification()
            .builder()
            .title(title)
            .body(body)
            .show()
            .map_err(|e| e.to_string())?;
        // Lets the UI mirror the notification as an in-app toast.
        let _ = self.app.emit(
            EVENT_NOTIFICATION_SHOWN,
            NotificationPayload {
                title: title.to_string(),
                body: body.to_string(),
            },
        );
        Ok(())
    }
}
