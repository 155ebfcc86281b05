//! Per-number bot settings, persisted as a flat JSON object.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::defaults::{default_like_emojis, default_max_retries, default_prefix};
use crate::error::BeaconError;

/// Keys understood by [`UserConfig::set`], in display order.
pub const CONFIG_KEYS: [&str; 7] = [
    "AUTO_VIEW_STATUS",
    "AUTO_LIKE_STATUS",
    "AUTO_RECORDING",
    "AUTO_LIKE_EMOJI",
    "PREFIX",
    "MAX_RETRIES",
    "IMAGE_PATH",
];

/// Settings for one session. Missing keys fall back to defaults; unknown keys
/// are kept in `extra` so a save never drops them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    #[serde(rename = "AUTO_VIEW_STATUS")]
    pub auto_view_status: bool,
    #[serde(rename = "AUTO_LIKE_STATUS")]
    pub auto_like_status: bool,
    #[serde(rename = "AUTO_RECORDING")]
    pub auto_recording: bool,
    #[serde(rename = "AUTO_LIKE_EMOJI", deserialize_with = "emoji_list")]
    pub like_emojis: Vec<String>,
    #[serde(rename = "PREFIX")]
    pub prefix: String,
    #[serde(rename = "MAX_RETRIES")]
    pub max_retries: u32,
    #[serde(rename = "IMAGE_PATH")]
    pub image_path: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            auto_view_status: true,
            auto_like_status: true,
            auto_recording: false,
            like_emojis: default_like_emojis(),
            prefix: default_prefix(),
            max_retries: default_max_retries(),
            image_path: String::new(),
            extra: BTreeMap::new(),
        }
    }
}

impl UserConfig {
    /// Set a key from command text. Known keys are validated and typed;
    /// anything else is stored verbatim as a string.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), BeaconError> {
        let key = key.trim().to_uppercase();
        let value = value.trim();
        if key.is_empty() {
            return Err(BeaconError::Config("missing key".into()));
        }
        if value.is_empty() {
            return Err(BeaconError::Config(format!("missing value for {key}")));
        }

        match key.as_str() {
            "AUTO_VIEW_STATUS" => self.auto_view_status = parse_bool(&key, value)?,
            "AUTO_LIKE_STATUS" => self.auto_like_status = parse_bool(&key, value)?,
            "AUTO_RECORDING" => self.auto_recording = parse_bool(&key, value)?,
            "AUTO_LIKE_EMOJI" => {
                let emojis = split_emojis(value);
                if emojis.is_empty() {
                    return Err(BeaconError::Config(
                        "AUTO_LIKE_EMOJI needs at least one emoji".into(),
                    ));
                }
                self.like_emojis = emojis;
            }
            "PREFIX" => {
                if value.chars().any(char::is_whitespace) {
                    return Err(BeaconError::Config("PREFIX cannot contain spaces".into()));
                }
                self.prefix = value.to_string();
            }
            "MAX_RETRIES" => {
                let n: u32 = value.parse().map_err(|_| {
                    BeaconError::Config(format!("MAX_RETRIES expects a number, got '{value}'"))
                })?;
                if n == 0 {
                    return Err(BeaconError::Config("MAX_RETRIES must be at least 1".into()));
                }
                self.max_retries = n;
            }
            "IMAGE_PATH" => self.image_path = value.to_string(),
            _ => {
                self.extra.insert(key, Value::String(value.to_string()));
            }
        }
        Ok(())
    }

    /// `(KEY, value)` pairs for display: known keys first, then extras sorted.
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut out = vec![
            ("AUTO_VIEW_STATUS".to_string(), self.auto_view_status.to_string()),
            ("AUTO_LIKE_STATUS".to_string(), self.auto_like_status.to_string()),
            ("AUTO_RECORDING".to_string(), self.auto_recording.to_string()),
            ("AUTO_LIKE_EMOJI".to_string(), self.like_emojis.join(",")),
            ("PREFIX".to_string(), self.prefix.clone()),
            ("MAX_RETRIES".to_string(), self.max_retries.to_string()),
            ("IMAGE_PATH".to_string(), self.image_path.clone()),
        ];
        for (key, value) in &self.extra {
            let shown = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            out.push((key.clone(), shown));
        }
        out
    }

    /// Render `KEY: value` lines.
    pub fn render(&self) -> String {
        self.entries()
            .into_iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, BeaconError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        _ => Err(BeaconError::Config(format!(
            "{key} expects true or false, got '{value}'"
        ))),
    }
}

fn split_emojis(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Accept either a JSON array or a comma-separated string for the emoji list.
fn emoji_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Joined(String),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::List(list) => list,
        Raw::Joined(joined) => split_emojis(&joined),
    })
}
