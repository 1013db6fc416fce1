//! Prose synthesis over a finished artifact.

use std::fmt::Write as _;

use advisor_core::domain::artifact::{AnalysisArtifact, DecisionRecommendation};
use advisor_core::Synthesis;

use crate::llm::{PromptPurpose, PromptSpec};

const SYNTHESIS_SYSTEM_PROMPT: &str = "You are a strategic business advisor for founders and \
small teams. You are given a structured analysis that is already final: never change its names, \
scores, ratings, tiers or verdict. Write concise, practical prose around it and fill in the \
requested detail lists. Respond with a single JSON object and nothing else.";

const RESPONSE_SHAPE: &str = r#"{
  "narrative": "2-3 sentences framing the analysis",
  "key_insight": "the single most important takeaway",
  "recommendation": "clear, actionable next steps",
  "details": { "<key>": ["item", "..."] }
}"#;

#[derive(Clone, Copy, Debug, Default)]
pub struct ProseSynthesizer;

impl ProseSynthesizer {
    pub fn new() -> Self {
        Self
    }

    pub fn prompt(&self, artifact: &AnalysisArtifact, topic: Option<&str>) -> PromptSpec {
        let capability = artifact.capability();
        let structured =
            serde_json::to_string_pretty(artifact).unwrap_or_else(|_| artifact.summary());

        let mut user = format!(
            "Capability: {}\nFramework: {}\n",
            capability.label(),
            capability.framework()
        );
        if let Some(topic) = topic {
            let _ = writeln!(user, "Original request: {topic}");
        }
        let _ = writeln!(user, "\nStructured analysis:\n{structured}");

        user.push_str("\nFill these detail lists under \"details\":\n");
        for request in artifact.detail_requests() {
            let _ = writeln!(
                user,
                "- \"{}\": {} ({}-{} items)",
                request.key, request.description, request.min_items, request.max_items
            );
        }

        if let AnalysisArtifact::Decision(framework) = artifact {
            match &framework.recommendation {
                DecisionRecommendation::Weighted { option } => {
                    let _ =
                        writeln!(user, "\nThe weighted matrix favors \"{option}\"; explain why.");
                }
                DecisionRecommendation::Tied { options } => {
                    let _ = writeln!(
                        user,
                        "\nThe weighted matrix ties {}; do not pick a winner, explain what would \
                         break the tie.",
                        options.join(" and ")
                    );
                }
                DecisionRecommendation::Qualitative => {
                    user.push_str(
                        "\nNo weights were given. Recommend an option in the form \
                         \"If you value X, choose Y because...\".\n",
                    );
                }
            }
        }

        let _ = write!(user, "\nRespond with JSON shaped like:\n{RESPONSE_SHAPE}");

        PromptSpec {
            purpose: PromptPurpose::ProseSynthesis,
            system: SYNTHESIS_SYSTEM_PROMPT.to_string(),
            user,
        }
    }

    pub fn parse_reply(&self, raw: &str) -> Synthesis {
        Synthesis::parse(raw)
    }
}
