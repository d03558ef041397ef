use std::path::PathBuf;

use serde_json::Value;
use shared::settings::PreviewSettings;
use tracing::warn;

use crate::error::SettingsError;

pub trait SettingsStore: Send {
    /// Missing or unreadable documents yield defaults; only IO failures are errors.
    fn load(&self) -> Result<PreviewSettings, SettingsError>;
    fn save(&self, settings: &PreviewSettings) -> Result<(), SettingsError>;
}

/// Settings kept as pretty-printed JSON in a single file.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn display_path(&self) -> String {
        self.path.display().to_string()
    }
}

impl SettingsStore for JsonFileStore {
    fn load(&self) -> Result<PreviewSettings, SettingsError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(PreviewSettings::default())
            }
            Err(source) => {
                return Err(SettingsError::Read {
                    path: self.display_path(),
                    source,
                })
            }
        };

        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(document)) => {
                let (settings, rejected) = PreviewSettings::from_document(document);
                if !rejected.is_empty() {
                    warn!(path = %self.path.display(), ?rejected, "invalid settings replaced by defaults");
                }
                Ok(settings)
            }
            Ok(_) => {
                warn!(path = %self.path.display(), "settings file is not a JSON object; using defaults");
                Ok(PreviewSettings::default())
            }
            Err(err) => {
                warn!(path = %self.path.display(), %err, "settings file unreadable; using defaults");
                Ok(PreviewSettings::default())
            }
        }
    }

    fn save(&self, settings: &PreviewSettings) -> Result<(), SettingsError> {
        let raw = serde_json::to_string_pretty(settings)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| SettingsError::Write {
                path: self.display_path(),
                source,
            })?;
        }
        std::fs::write(&self.path, raw).map_err(|source| SettingsError::Write {
            path: self.display_path(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use shared::settings::{DefaultBackground, RenderQuality};

    use super::*;

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = JsonFileStore::new(dir.path().join("preview-settings.json"));
        assert_eq!(store.load().expect("load"), PreviewSettings::default());
    }

    #[test]
    fn save_then_load_keeps_unknown_keys() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("preview-settings.json");
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(&path, r#"{"defaultBg":"custom","sidebarWidth":320}"#).expect("seed");

        let store = JsonFileStore::new(&path);
        let mut settings = store.load().expect("load");
        assert_eq!(settings.default_bg, DefaultBackground::Custom);
        settings.debug = true;
        store.save(&settings).expect("save");

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).expect("read")).expect("json");
        assert_eq!(raw["sidebarWidth"], 320);
        assert_eq!(raw["debug"], true);
    }

    #[test]
    fn invalid_value_keeps_the_rest_of_the_document() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("preview-settings.json");
        std::fs::write(
            &path,
            r#"{"autoFit":false,"quality":"ultra","sidebarWidth":320}"#,
        )
        .expect("seed");

        let store = JsonFileStore::new(&path);
        let settings = store.load().expect("load");
        assert!(!settings.auto_fit);
        assert_eq!(settings.quality, RenderQuality::High);
        store.save(&settings).expect("save");

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).expect("read")).expect("json");
        assert_eq!(raw["autoFit"], false);
        assert_eq!(raw["quality"], "high");
        assert_eq!(raw["sidebarWidth"], 320);
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("preview-settings.json");
        std::fs::write(&path, "{not json").expect("seed");

        let store = JsonFileStore::new(&path);
        assert_eq!(store.load().expect("load"), PreviewSettings::default());
    }
}
