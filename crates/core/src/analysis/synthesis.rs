use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Generated prose for an artifact. Kept apart from the artifact so the
/// structured result never changes after it is built.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Synthesis {
    pub narrative: String,
    pub key_insight: Option<String>,
    pub recommendation: Option<String>,
    /// Items for each `DetailRequest`, keyed by its `key`.
    pub details: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSynthesis {
    narrative: Option<String>,
    summary: Option<String>,
    key_insight: Option<String>,
    recommendation: Option<String>,
    details: BTreeMap<String, Value>,
}

impl Synthesis {
    /// Reads a generated reply. Models wrap JSON in prose or code fences often
    /// enough that the first `{` .. last `}` span is tried before falling back to
    /// treating the whole reply as narrative.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let candidate = match (trimmed.find('{'), trimmed.rfind('}')) {
            (Some(start), Some(end)) if start < end => &trimmed[start..=end],
            _ => return Self::narrative_only(trimmed),
        };

        match serde_json::from_str::<RawSynthesis>(candidate) {
            Ok(parsed) => Self {
                narrative: parsed
                    .narrative
                    .or(parsed.summary)
                    .map(|text| text.trim().to_string())
                    .unwrap_or_default(),
                key_insight: non_blank(parsed.key_insight),
                recommendation: non_blank(parsed.recommendation),
                details: parsed
                    .details
                    .into_iter()
                    .map(|(key, value)| (key, detail_items(value)))
                    .filter(|(_, items)| !items.is_empty())
                    .collect(),
            },
            Err(_) => Self::narrative_only(trimmed),
        }
    }

    pub fn narrative_only(text: &str) -> Self {
        Self { narrative: text.trim().to_string(), ..Self::default() }
    }

    /// Items generated for `key`, capped at `max`.
    pub fn details_for(&self, key: &str, max: u8) -> &[String] {
        match self.details.get(key) {
            Some(items) => &items[..items.len().min(usize::from(max))],
            None => &[],
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|text| text.trim().to_string()).filter(|text| !text.is_empty())
}

fn detail_items(value: Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(text) => Some(text.trim().to_string()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .filter(|text| !text.is_empty())
            .collect(),
        Value::String(text) if !text.trim().is_empty() => vec![text.trim().to_string()],
        _ => Vec::new(),
    }
}
