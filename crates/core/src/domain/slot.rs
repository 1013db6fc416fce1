use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub type SlotMap = BTreeMap<String, SlotValue>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Competitor {
    pub name: String,
    pub description: String,
}

impl Competitor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self { name: name.into(), description: description.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SlotValue {
    Text(String),
    List(Vec<String>),
    Competitors(Vec<Competitor>),
    /// factor -> importance (1-10)
    Weights(BTreeMap<String, u8>),
    /// option -> factor -> score (1-10)
    FactorScores(BTreeMap<String, BTreeMap<String, u8>>),
}

impl SlotValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_competitors(&self) -> Option<&[Competitor]> {
        match self {
            Self::Competitors(competitors) => Some(competitors.as_slice()),
            _ => None,
        }
    }

    pub fn as_weights(&self) -> Option<&BTreeMap<String, u8>> {
        match self {
            Self::Weights(weights) => Some(weights),
            _ => None,
        }
    }

    pub fn as_factor_scores(&self) -> Option<&BTreeMap<String, BTreeMap<String, u8>>> {
        match self {
            Self::FactorScores(scores) => Some(scores),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.trim().is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Competitors(competitors) => competitors.is_empty(),
            Self::Weights(weights) => weights.is_empty(),
            Self::FactorScores(scores) => scores.is_empty(),
        }
    }

    /// One-line rendering used in prompts and transcripts.
    pub fn summary(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::List(items) => items.join(", "),
            Self::Competitors(competitors) => competitors
                .iter()
                .map(|competitor| format!("{} ({})", competitor.name, competitor.description))
                .collect::<Vec<_>>()
                .join("; "),
            Self::Weights(weights) => weights
                .iter()
                .map(|(factor, weight)| format!("{factor}={weight}"))
                .collect::<Vec<_>>()
                .join(", "),
            Self::FactorScores(scores) => scores
                .iter()
                .map(|(option, factors)| {
                    let cells = factors
                        .iter()
                        .map(|(factor, score)| format!("{factor}={score}"))
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!("{option}: {cells}")
                })
                .collect::<Vec<_>>()
                .join("; "),
        }
    }
}
