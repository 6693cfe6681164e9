use std::sync::atomic::{AtomicU8, Ordering};

use thiserror::Error;

pub const MAIN_WINDOW_LABEL: &str = "main";
pub const MAIN_WINDOW_TITLE: &str = "Local Todo List";
pub const MAIN_WINDOW_SIZE: (f64, f64) = (900.0, 670.0);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("window error: {0}")]
pub struct WindowError(pub String);

/// The frameless window's own title bar buttons.
pub trait WindowControl {
    fn minimize(&self) -> Result<(), WindowError>;
    fn is_maximized(&self) -> Result<bool, WindowError>;
    fn maximize(&self) -> Result<(), WindowError>;
    fn unmaximize(&self) -> Result<(), WindowError>;
    fn close(&self) -> Result<(), WindowError>;
}

/// Maximizes or restores. Returns whether the window is maximized afterwards.
pub fn toggle_maximize(window: &impl WindowControl) -> Result<bool, WindowError> {
    if window.is_maximized()? {
        window.unmaximize()?;
        Ok(false)
    } else {
        window.maximize()?;
        Ok(true)
    }
}

const UNKNOWN: u8 = 0;
const RESTORED: u8 = 1;
const MAXIMIZED: u8 = 2;

/// Turns a stream of resize observations into maximize-state changes.
#[derive(Debug, Default)]
pub struct MaximizeTracker {
    last: AtomicU8,
}

impl MaximizeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the new state when it differs from the last one seen.
    pub fn observe(&self, maximized: bool) -> Option<bool> {
        let next = if maximized { MAXIMIZED } else { RESTORED };
        let previous = self.last.swap(next, Ordering::Relaxed);
        (previous != next).then_some(maximized)
    }
}

#[cfg(all(feature = "app", not(test)))]
impl<R: tauri::Runtime> WindowControl for tauri::WebviewWindow<R> {
    fn minimize(&self) -> Result<(), WindowError> {
        tauri::WebviewWindow::minimize(self).map_err(|e| WindowError(e.to_string()))
    }

    fn is_maximized(&self) -> Result<bool, WindowError> {
        tauri::WebviewWindow::is_maximized(self).map_err(|e| WindowError(e.to_string()))
    }

    fn maximize(&self) -> Result<(), WindowError> {
        tauri::WebviewWindow::maximize(self).map_err(|e| WindowError(e.to_string()))
    }

    fn unmaximize(&self) -> Result<(), WindowError> {
        tauri::WebviewWindow::unmaximize(self).map_err(|e| WindowError(e.to_string()))
    }

    fn close(&self) -> Result<(), WindowError> {
        tauri::WebviewWindow::close(self).map_err(|e| WindowError(e.to_string()))
    }
}
