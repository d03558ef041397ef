use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DefaultBackground {
    #[default]
    Transparent,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RenderQuality {
    Low,
    Medium,
    #[default]
    High,
}

/// User preferences persisted between sessions as one flat JSON object.
///
/// Keys this build does not recognise are carried in `extra` so they survive a save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewSettings {
    #[serde(default = "enabled")]
    pub auto_fit: bool,
    #[serde(default = "enabled")]
    pub show_info: bool,
    #[serde(default)]
    pub default_bg: DefaultBackground,
    #[serde(default)]
    pub quality: RenderQuality,
    #[serde(default = "enabled")]
    pub antialias: bool,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "enabled")]
    pub ws_reconnect: bool,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn enabled() -> bool {
    true
}

fn default_language() -> String {
    "en".to_string()
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            auto_fit: true,
            show_info: true,
            default_bg: DefaultBackground::Transparent,
            quality: RenderQuality::High,
            antialias: true,
            debug: false,
            ws_reconnect: true,
            language: default_language(),
            extra: Map::new(),
        }
    }
}

/// Boolean settings that can be flipped from the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingToggle {
    AutoFit,
    ShowInfo,
    Antialias,
    Debug,
    WsReconnect,
}

impl SettingToggle {
    pub fn key(&self) -> &'static str {
        match self {
            SettingToggle::AutoFit => "autoFit",
            SettingToggle::ShowInfo => "showInfo",
            SettingToggle::Antialias => "antialias",
            SettingToggle::Debug => "debug",
            SettingToggle::WsReconnect => "wsReconnect",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "autoFit" => Some(SettingToggle::AutoFit),
            "showInfo" => Some(SettingToggle::ShowInfo),
            "antialias" => Some(SettingToggle::Antialias),
            "debug" => Some(SettingToggle::Debug),
            "wsReconnect" => Some(SettingToggle::WsReconnect),
            _ => None,
        }
    }
}

const KNOWN_KEYS: [&str; 8] = [
    "autoFit",
    "showInfo",
    "defaultBg",
    "quality",
    "antialias",
    "debug",
    "wsReconnect",
    "language",
];

fn accepts(key: &str, value: &Value) -> bool {
    match key {
        "defaultBg" => DefaultBackground::deserialize(value).is_ok(),
        "quality" => RenderQuality::deserialize(value).is_ok(),
        "language" => value.is_string(),
        _ => value.is_boolean(),
    }
}

impl PreviewSettings {
    /// Reads a stored document key by key. A known key holding a value of the wrong shape takes
    /// its default; every other key is kept. Returns the keys that were replaced.
    pub fn from_document(mut document: Map<String, Value>) -> (Self, Vec<String>) {
        let rejected: Vec<String> = KNOWN_KEYS
            .iter()
            .filter(|key| document.get(**key).is_some_and(|value| !accepts(**key, value)))
            .map(|key| key.to_string())
            .collect();
        for key in &rejected {
            document.remove(key);
        }
        let settings = serde_json::from_value(Value::Object(document)).unwrap_or_default();
        (settings, rejected)
    }

    pub fn toggle(&self, toggle: SettingToggle) -> bool {
        match toggle {
            SettingToggle::AutoFit => self.auto_fit,
            SettingToggle::ShowInfo => self.show_info,
            SettingToggle::Antialias => self.antialias,
            SettingToggle::Debug => self.debug,
            SettingToggle::WsReconnect => self.ws_reconnect,
        }
    }

    pub fn set_toggle(&mut self, toggle: SettingToggle, value: bool) {
        let slot = match toggle {
            SettingToggle::AutoFit => &mut self.auto_fit,
            SettingToggle::ShowInfo => &mut self.show_info,
            SettingToggle::Antialias => &mut self.antialias,
            SettingToggle::Debug => &mut self.debug,
            SettingToggle::WsReconnect => &mut self.ws_reconnect,
        };
        *slot = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_take_defaults() {
        let settings: PreviewSettings =
            serde_json::from_str(r#"{"debug":true,"quality":"low"}"#).expect("settings");
        assert!(settings.debug);
        assert_eq!(settings.quality, RenderQuality::Low);
        assert!(settings.auto_fit);
        assert!(settings.ws_reconnect);
        assert_eq!(settings.language, "en");
    }

    #[test]
    fn unknown_keys_are_preserved() {
        let settings: PreviewSettings =
            serde_json::from_str(r#"{"autoFit":false,"panelLayout":"compact"}"#).expect("settings");
        assert!(!settings.auto_fit);
        assert_eq!(settings.extra.get("panelLayout"), Some(&Value::from("compact")));

        let saved = serde_json::to_value(&settings).expect("serialize");
        assert_eq!(saved["panelLayout"], "compact");
        assert_eq!(saved["defaultBg"], "transparent");
    }

    #[test]
    fn bad_value_only_resets_its_own_key() {
        let document = serde_json::json!({
            "autoFit": false,
            "quality": "ultra",
            "debug": "yes",
            "language": "ja",
            "sidebarWidth": 320
        });
        let Value::Object(document) = document else {
            panic!("expected object");
        };

        let (settings, rejected) = PreviewSettings::from_document(document);
        assert_eq!(rejected, vec!["quality".to_string(), "debug".to_string()]);
        assert!(!settings.auto_fit);
        assert_eq!(settings.quality, RenderQuality::High);
        assert!(!settings.debug);
        assert_eq!(settings.language, "ja");
        assert_eq!(settings.extra.get("sidebarWidth"), Some(&Value::from(320)));
    }

    #[test]
    fn toggles_map_to_setting_keys() {
        let mut settings = PreviewSettings::default();
        let toggle = SettingToggle::from_key("wsReconnect").expect("known key");
        settings.set_toggle(toggle, false);
        assert!(!settings.toggle(toggle));
        assert_eq!(toggle.key(), "wsReconnect");
        assert_eq!(SettingToggle::from_key("language"), None);
    }
}
