//! Persistent host settings (JSON file in the app data directory).

use std::fs;
use std::path::{Path, PathBuf};

use bargein_core::{ArbitrationConfig, SessionOptions};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    pub arbitration: ArbitrationConfig,
    pub session: SessionOptions,
    /// Timeline to replay. `None` replays the built-in demo.
    pub scenario_path: Option<PathBuf>,
}

impl AppSettings {
    pub fn normalize(&mut self) {
        self.arbitration.normalize();
        self.arbitration.soft_ignore_words = normalize_words(&self.arbitration.soft_ignore_words);
        self.arbitration.hard_interrupt_words =
            normalize_words(&self.arbitration.hard_interrupt_words);
        self.scenario_path = self
            .scenario_path
            .take()
            .filter(|p| !p.as_os_str().is_empty());
    }
}

fn normalize_words(raw: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for word in raw {
        let normalized = word.trim().to_lowercase();
        if normalized.is_empty() || out.contains(&normalized) {
            continue;
        }
        out.push(normalized);
    }
    out
}

pub fn default_settings_path() -> PathBuf {
    if let Some(path) = std::env::var_os("BARGEIN_SETTINGS") {
        return PathBuf::from(path);
    }
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Lattice Labs")
            .join("Bargein")
            .join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local")
                    .join("share")
            })
            .join("bargein")
            .join("settings.json")
    }
}

/// Load settings, falling back to defaults when the file is missing or invalid.
pub fn load_settings(path: &Path) -> AppSettings {
    let mut settings = match fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str::<AppSettings>(&raw).unwrap_or_else(|e| {
            warn!("ignoring invalid settings at {}: {e}", path.display());
            AppSettings::default()
        }),
        Err(_) => AppSettings::default(),
    };
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_settings_keep_defaults() {
        let mut settings: AppSettings = serde_json::from_str(
            r#"{"arbitration":{"pendingInterruptMinDelayMs":400,"pendingInterruptMaxDelayMs":100}}"#,
        )
        .expect("parse settings");
        settings.normalize();
        assert_eq!(settings.arbitration.pending_interrupt_min_delay_ms, 400);
        assert_eq!(settings.arbitration.pending_interrupt_max_delay_ms, 400);
        assert!(!settings.arbitration.soft_ignore_words.is_empty());
        assert!(settings.scenario_path.is_none());
    }

    #[test]
    fn word_lists_are_trimmed_and_deduplicated() {
        let words = normalize_words(&[" Yeah".into(), "yeah".into(), "".into(), "OK".into()]);
        assert_eq!(words, vec!["yeah".to_string(), "ok".to_string()]);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let settings = load_settings(Path::new("/nonexistent/bargein/settings.json"));
        assert_eq!(settings.arbitration.pending_interrupt_max_delay_ms, 1_200);
    }

    #[test]
    fn save_then_load_preserves_settings() {
        let dir = std::env::temp_dir().join(format!("bargein-settings-{}", std::process::id()));
        let path = dir.join("settings.json");
        let mut settings = AppSettings::default();
        settings.arbitration.pending_interrupt_min_delay_ms = 120;
        settings.session.min_interruption_words = 2;

        save_settings(&path, &settings).expect("save settings");
        let loaded = load_settings(&path);
        assert_eq!(loaded.arbitration.pending_interrupt_min_delay_ms, 120);
        assert_eq!(loaded.session.min_interruption_words, 2);

        let _ = fs::remove_dir_all(dir);
    }
}
