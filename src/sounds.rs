//! Ambient sound preferences. Playback itself happens in the UI; this only decides what the
//! UI should be playing.

use std::fs;
use std::path::Path;

use log::{info, warn};

use crate::models::{SoundKind, SoundPreferences};

pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["mp3", "wav", "ogg"];

/// Selecting a sound starts it; selecting `none` stops playback.
pub fn change_sound(sound: &SoundPreferences, kind: SoundKind) -> SoundPreferences {
    SoundPreferences {
        current: kind,
        playing: kind != SoundKind::None,
        ..sound.clone()
    }
}

pub fn toggle_play(sound: &SoundPreferences) -> SoundPreferences {
    if sound.current == SoundKind::None {
        return sound.clone();
    }
    SoundPreferences {
        playing: !sound.playing,
        ..sound.clone()
    }
}

pub fn adjust_volume(sound: &SoundPreferences, volume: f32) -> SoundPreferences {
    if volume.is_nan() {
        return sound.clone();
    }
    SoundPreferences {
        volume: volume.clamp(0.0, 1.0),
        ..sound.clone()
    }
}

/// Adds a freshly imported file to the library, selects it and starts it.
pub fn use_custom(sound: &SoundPreferences, file_name: String) -> SoundPreferences {
    let mut custom_files = sound.custom_files.clone();
    if !custom_files.contains(&file_name) {
        custom_files.push(file_name.clone());
    }
    SoundPreferences {
        custom_file: Some(file_name),
        custom_files,
        ..change_sound(sound, SoundKind::Custom)
    }
}

/// Re-selects an earlier import. `None` when the name is not in the library.
pub fn select_custom(sound: &SoundPreferences, file_name: &str) -> Option<SoundPreferences> {
    if !sound.custom_files.iter().any(|name| name == file_name) {
        return None;
    }
    Some(SoundPreferences {
        custom_file: Some(file_name.to_string()),
        ..change_sound(sound, SoundKind::Custom)
    })
}

/// Copies an audio file into `sounds_dir`. Returns the stored file name, or `None` after
/// logging when the file is unsupported or cannot be copied.
pub fn import_sound(sounds_dir: &Path, source: &Path) -> Option<String> {
    let supported = source
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()));
    if !supported {
        warn!("ignoring sound import, unsupported file {}", source.display());
        return None;
    }
    let Some(file_name) = source.file_name().and_then(|name| name.to_str()) else {
        warn!("ignoring sound import, bad file name {}", source.display());
        return None;
    };

    if let Err(err) = fs::create_dir_all(sounds_dir) {
        warn!("failed to create {}: {err}", sounds_dir.display());
        return None;
    }
    let target = sounds_dir.join(file_name);
    match fs::copy(source, &target) {
        Ok(_) => {
            info!("imported sound {}", target.display());
            Some(file_name.to_string())
        }
        Err(err) => {
            warn!("failed to import sound {}: {err}", source.display());
            None
        }
    }
}
