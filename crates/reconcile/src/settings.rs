//! Generic key/value settings and the add/update/remove buckets built from them.

use serde::{Deserialize, Serialize};

/// One entry of a backend settings collection.
///
/// An empty `id` means the setting has not been created yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlattenedSetting {
    pub key: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
}

impl FlattenedSetting {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            id: String::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn has_id(&self) -> bool {
        !self.id.is_empty()
    }
}

/// A setting to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingInput {
    pub key: String,
    pub value: String,
}

/// A setting to change in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingUpdate {
    pub id: String,
    pub key: String,
    pub value: String,
}

/// Unified settings delta for plain and virtual settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsDelta {
    pub add: Vec<SettingInput>,
    pub update: Vec<SettingUpdate>,
    pub remove: Vec<String>,
}

impl SettingsDelta {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.update.is_empty() && self.remove.is_empty()
    }

    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.add.push(SettingInput {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn update(&mut self, id: impl Into<String>, key: impl Into<String>, value: impl Into<String>) {
        self.update.push(SettingUpdate {
            id: id.into(),
            key: key.into(),
            value: value.into(),
        });
    }

    /// Queue a removal. Unknown IDs are ignored.
    pub fn remove(&mut self, id: Option<&str>) {
        if let Some(id) = id.filter(|id| !id.is_empty()) {
            self.remove.push(id.to_string());
        }
    }

    /// Update in place when the setting already has an ID, otherwise add it.
    pub fn upsert(&mut self, id: Option<&str>, key: &str, value: &str) {
        match id.filter(|id| !id.is_empty()) {
            Some(id) => self.update(id, key, value),
            None => self.add(key, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_routes_by_id() {
        let mut delta = SettingsDelta::default();
        delta.upsert(Some("s-1"), "accessLog", "true");
        delta.upsert(None, "redirectToHttps", "false");
        delta.upsert(Some(""), "isSetHeader", "true");

        assert_eq!(delta.update.len(), 1);
        assert_eq!(delta.update[0].id, "s-1");
        assert_eq!(
            delta.add,
            vec![
                SettingInput {
                    key: "redirectToHttps".to_string(),
                    value: "false".to_string()
                },
                SettingInput {
                    key: "isSetHeader".to_string(),
                    value: "true".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_remove_skips_missing_ids() {
        let mut delta = SettingsDelta::default();
        delta.remove(None);
        delta.remove(Some(""));
        assert!(delta.is_empty());
        delta.remove(Some("s-9"));
        assert_eq!(delta.remove, vec!["s-9".to_string()]);
    }

    #[test]
    fn test_flattened_setting_id_omitted_when_empty() {
        let json = serde_json::to_value(FlattenedSetting::new("k", "v")).unwrap();
        assert_eq!(json, serde_json::json!({"key": "k", "value": "v"}));
        let with_id = FlattenedSetting::new("k", "v").with_id("1");
        assert!(with_id.has_id());
    }
}
