use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::model::ModelMetadata;

/// Well-known path of the control socket, relative to the page origin.
pub const CONTROL_PATH: &str = "/ws/preview";

/// Commands pushed from the companion application to a previewer, one JSON object per text frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ControlCommand {
    #[serde(rename_all = "camelCase")]
    LoadModel {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model_url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model_path: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model_data: Option<ModelMetadata>,
    },
    SetExpression {
        expression: String,
    },
    PlayMotion {
        motion: MotionRequest,
    },
    ClearModel,
    UpdateCanvas,
    /// Any tag this build does not know. Receivers drop it.
    #[serde(other)]
    Unknown,
}

impl ControlCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ControlCommand::LoadModel { .. } => "loadModel",
            ControlCommand::SetExpression { .. } => "setExpression",
            ControlCommand::PlayMotion { .. } => "playMotion",
            ControlCommand::ClearModel => "clearModel",
            ControlCommand::UpdateCanvas => "updateCanvas",
            ControlCommand::Unknown => "unknown",
        }
    }

    pub fn load(locator: impl Into<String>) -> Self {
        ControlCommand::LoadModel {
            model_url: Some(locator.into()),
            model_path: None,
            model_data: None,
        }
    }

    /// Locator of a `loadModel` command; `modelUrl` takes precedence over `modelPath`.
    pub fn locator(&self) -> Option<&str> {
        match self {
            ControlCommand::LoadModel {
                model_url,
                model_path,
                ..
            } => model_url
                .as_deref()
                .or(model_path.as_deref())
                .filter(|locator| !locator.trim().is_empty()),
            _ => None,
        }
    }
}

/// Either a bare group name or a group with an explicit clip index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MotionRequest {
    Group(String),
    Indexed {
        motion: String,
        #[serde(
            default,
            deserialize_with = "integer_or_none",
            skip_serializing_if = "Option::is_none"
        )]
        index: Option<i64>,
    },
}

/// An index that is not a whole number (a fraction, a string, an object) counts as absent.
fn integer_or_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(|value| {
        value.as_i64().or_else(|| {
            value
                .as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        })
    }))
}

impl MotionRequest {
    pub fn group(&self) -> &str {
        match self {
            MotionRequest::Group(group) => group,
            MotionRequest::Indexed { motion, .. } => motion,
        }
    }

    /// Clip index when one was given and is non-negative.
    pub fn index(&self) -> Option<usize> {
        match self {
            MotionRequest::Group(_) => None,
            MotionRequest::Indexed { index, .. } => index.and_then(|i| usize::try_from(i).ok()),
        }
    }
}

impl From<&str> for MotionRequest {
    fn from(value: &str) -> Self {
        MotionRequest::Group(value.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastResponse {
    pub delivered: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MountRequest {
    pub dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MountResponse {
    pub base_path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_model_reads_camel_case_fields() {
        let command: ControlCommand = serde_json::from_str(
            r#"{"type":"loadModel","modelPath":"/model/ab12cd34/hiyori.model3.json"}"#,
        )
        .expect("decode");
        assert_eq!(command.locator(), Some("/model/ab12cd34/hiyori.model3.json"));

        let both: ControlCommand = serde_json::from_str(
            r#"{"type":"loadModel","modelUrl":"http://x/a.json","modelPath":"b.json"}"#,
        )
        .expect("decode");
        assert_eq!(both.locator(), Some("http://x/a.json"));
    }

    #[test]
    fn play_motion_accepts_string_or_object() {
        let bare: ControlCommand =
            serde_json::from_str(r#"{"type":"playMotion","motion":"Idle"}"#).expect("decode");
        assert_eq!(
            bare,
            ControlCommand::PlayMotion {
                motion: MotionRequest::Group("Idle".into())
            }
        );

        let indexed: ControlCommand =
            serde_json::from_str(r#"{"type":"playMotion","motion":{"motion":"Tap","index":2}}"#)
                .expect("decode");
        let ControlCommand::PlayMotion { motion } = indexed else {
            panic!("expected playMotion");
        };
        assert_eq!(motion.group(), "Tap");
        assert_eq!(motion.index(), Some(2));
    }

    #[test]
    fn negative_index_falls_back_to_host_default() {
        let request = MotionRequest::Indexed {
            motion: "Tap".into(),
            index: Some(-1),
        };
        assert_eq!(request.index(), None);
    }

    #[test]
    fn non_integer_index_keeps_the_group() {
        for raw in [
            r#"{"type":"playMotion","motion":{"motion":"Tap","index":1.5}}"#,
            r#"{"type":"playMotion","motion":{"motion":"Tap","index":"2"}}"#,
            r#"{"type":"playMotion","motion":{"motion":"Tap","index":null}}"#,
        ] {
            let command: ControlCommand = serde_json::from_str(raw).expect("decode");
            let ControlCommand::PlayMotion { motion } = command else {
                panic!("expected playMotion");
            };
            assert_eq!(motion.group(), "Tap");
            assert_eq!(motion.index(), None);
        }

        let whole: ControlCommand =
            serde_json::from_str(r#"{"type":"playMotion","motion":{"motion":"Tap","index":2.0}}"#)
                .expect("decode");
        let ControlCommand::PlayMotion { motion } = whole else {
            panic!("expected playMotion");
        };
        assert_eq!(motion.index(), Some(2));
    }

    #[test]
    fn unknown_type_decodes_to_unknown() {
        let command: ControlCommand =
            serde_json::from_str(r#"{"type":"setBackground","transparent":true}"#).expect("decode");
        assert_eq!(command, ControlCommand::Unknown);
    }

    #[test]
    fn missing_type_is_rejected() {
        assert!(serde_json::from_str::<ControlCommand>(r#"{"expression":"f01"}"#).is_err());
    }
}
