use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptPurpose {
    SlotExtraction,
    ProseSynthesis,
}

impl PromptPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SlotExtraction => "slot_extraction",
            Self::ProseSynthesis => "prose_synthesis",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptSpec {
    pub purpose: PromptPurpose,
    pub system: String,
    pub user: String,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &PromptSpec) -> Result<String>;
}
