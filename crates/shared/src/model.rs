//! The small slice of a model's JSON settings file the previewer reads.
//!
//! Only the pieces needed to populate the expression and motion lists are typed; every
//! other key is kept verbatim so a metadata document can be relayed without loss.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModelMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(default)]
    pub file_references: FileReferences,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<ModelLayout>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FileReferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moc: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub textures: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expressions: Vec<ExpressionRef>,
    /// Motion group name to clip list, in document order.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub motions: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One entry of `FileReferences.Expressions`. Exporters disagree on the key casing, so all
/// spellings seen in the wild are accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpressionRef {
    #[serde(rename = "Name", default, skip_serializing_if = "Option::is_none")]
    pub name_upper: Option<String>,
    #[serde(rename = "name", default, skip_serializing_if = "Option::is_none")]
    pub name_lower: Option<String>,
    #[serde(rename = "Id", default, skip_serializing_if = "Option::is_none")]
    pub id_upper: Option<String>,
    #[serde(rename = "id", default, skip_serializing_if = "Option::is_none")]
    pub id_lower: Option<String>,
    #[serde(rename = "File", default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl ExpressionRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name_upper: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn display_name(&self) -> Option<&str> {
        [
            &self.name_upper,
            &self.name_lower,
            &self.id_upper,
            &self.id_lower,
        ]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .find(|name| !name.is_empty())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModelLayout {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotionGroupSummary {
    pub name: String,
    pub clip_count: usize,
}

impl ModelMetadata {
    pub fn expression_names(&self) -> Vec<String> {
        self.file_references
            .expressions
            .iter()
            .filter_map(ExpressionRef::display_name)
            .map(str::to_string)
            .collect()
    }

    /// Motion groups in document order. A group whose value is not a list counts as one clip.
    pub fn motion_groups(&self) -> Vec<MotionGroupSummary> {
        self.file_references
            .motions
            .iter()
            .map(|(name, clips)| MotionGroupSummary {
                name: name.clone(),
                clip_count: clips.as_array().map_or(1, Vec::len),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expression_names_accept_any_key_casing() {
        let metadata: ModelMetadata = serde_json::from_value(serde_json::json!({
            "Version": 3,
            "FileReferences": {
                "Moc": "hiyori.moc3",
                "Expressions": [
                    { "Name": "f01", "File": "f01.exp3.json" },
                    { "name": "f02" },
                    { "Id": "f03" },
                    { "id": "f04" },
                    { "File": "nameless.exp3.json" }
                ]
            }
        }))
        .expect("metadata");

        assert_eq!(metadata.expression_names(), vec!["f01", "f02", "f03", "f04"]);
    }

    #[test]
    fn motion_groups_keep_document_order_and_unknown_keys_survive() {
        let raw = serde_json::json!({
            "FileReferences": {
                "Motions": {
                    "TapBody": [{ "File": "a.motion3.json" }, { "File": "b.motion3.json" }],
                    "Idle": [{ "File": "idle.motion3.json" }]
                },
                "Physics": "model.physics3.json"
            },
            "Groups": []
        });
        let metadata: ModelMetadata = serde_json::from_value(raw).expect("metadata");

        let groups = metadata.motion_groups();
        assert_eq!(groups[0].name, "TapBody");
        assert_eq!(groups[0].clip_count, 2);
        assert_eq!(groups[1].name, "Idle");

        let round = serde_json::to_value(&metadata).expect("serialize");
        assert_eq!(round["FileReferences"]["Physics"], "model.physics3.json");
        assert!(round.get("Groups").is_some());
    }
}
