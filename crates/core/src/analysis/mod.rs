//! Analysis Builder
//!
//! Turns a complete intake into an immutable [`AnalysisArtifact`]. Everything
//! here is deterministic: scores, ratings, positioning and verdicts are derived
//! from the slot values, while the narrative parts are left as
//! [`DetailRequest`](crate::domain::artifact::DetailRequest) placeholders for
//! prose synthesis.

mod competitor;
mod decision;
mod feasibility;
pub mod synthesis;

use crate::domain::artifact::AnalysisArtifact;
use crate::domain::capability::Capability;
use crate::domain::slot::{Competitor, SlotMap, SlotValue};
use crate::errors::DomainError;
use crate::slots::SlotSchemaRegistry;

pub use decision::NEUTRAL_SCORE;
pub use synthesis::Synthesis;

/// A capability plus slot values that satisfied every required slot when built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalysisRequest {
    capability: Capability,
    topic: Option<String>,
    slots: SlotMap,
}

impl AnalysisRequest {
    pub fn new(
        capability: Capability,
        topic: Option<String>,
        slots: SlotMap,
    ) -> Result<Self, DomainError> {
        let missing = SlotSchemaRegistry::missing_required(capability, &slots);
        if !missing.is_empty() {
            return Err(DomainError::IncompleteRequest {
                capability,
                missing_slots: missing
                    .iter()
                    .map(|definition| definition.name.to_string())
                    .collect(),
            });
        }

        let topic = topic.map(|topic| topic.trim().to_string()).filter(|topic| !topic.is_empty());
        Ok(Self { capability, topic, slots })
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    pub fn slots(&self) -> &SlotMap {
        &self.slots
    }

    pub(crate) fn text(&self, name: &str) -> Option<&str> {
        self.slots.get(name).and_then(SlotValue::as_text).map(str::trim)
    }

    pub(crate) fn list(&self, name: &str) -> &[String] {
        self.slots.get(name).and_then(SlotValue::as_list).unwrap_or_default()
    }

    pub(crate) fn competitors(&self, name: &str) -> &[Competitor] {
        self.slots.get(name).and_then(SlotValue::as_competitors).unwrap_or_default()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AnalysisBuilder;

impl AnalysisBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(&self, request: &AnalysisRequest) -> Result<AnalysisArtifact, DomainError> {
        revalidate(request)?;

        let artifact = match request.capability {
            Capability::CompetitorAnalysis => {
                AnalysisArtifact::Competitor(competitor::build_snapshot(request))
            }
            Capability::DecisionSupport => {
                AnalysisArtifact::Decision(decision::build_framework(request)?)
            }
            Capability::FeasibilityEvaluation => {
                AnalysisArtifact::Feasibility(feasibility::build_assessment(request))
            }
        };
        Ok(artifact)
    }
}

/// Every stored value, optional ones included, must still satisfy its rule.
fn revalidate(request: &AnalysisRequest) -> Result<(), DomainError> {
    for (name, value) in &request.slots {
        let Some(definition) = SlotSchemaRegistry::definition(request.capability, name) else {
            return Err(DomainError::InvariantViolation(format!(
                "slot `{name}` is not part of the {} schema",
                request.capability
            )));
        };
        definition.validate(value)?;
    }
    Ok(())
}

/// Lowercased words, split on anything that is not alphanumeric.
pub(crate) fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::collections::BTreeMap;

    use crate::domain::slot::{Competitor, SlotMap, SlotValue};
    use crate::slots::names;

    pub fn text(value: &str) -> SlotValue {
        SlotValue::Text(value.to_string())
    }

    pub fn list(values: &[&str]) -> SlotValue {
        SlotValue::List(values.iter().map(ToString::to_string).collect())
    }

    pub fn competitor_slots() -> SlotMap {
        SlotMap::from([(
            names::COMPETITORS.to_string(),
            SlotValue::Competitors(vec![
                Competitor::new("Asana", "Work management platform for enterprise teams"),
                Competitor::new("Trello", "Affordable kanban boards for small business"),
                Competitor::new("Monday", "Premium customizable workflows"),
            ]),
        )])
    }

    pub fn decision_slots(weights: Option<&[(&str, u8)]>) -> SlotMap {
        let mut slots = SlotMap::from([
            (names::OPTIONS.to_string(), list(&["Series A", "Bootstrap"])),
            (names::DECISION_FACTORS.to_string(), list(&["speed", "control"])),
        ]);
        if let Some(weights) = weights {
            slots.insert(
                names::WEIGHTS.to_string(),
                SlotValue::Weights(
                    weights.iter().map(|(factor, weight)| (factor.to_string(), *weight)).collect(),
                ),
            );
        }
        slots
    }

    pub fn factor_scores(entries: &[(&str, &[(&str, u8)])]) -> SlotValue {
        SlotValue::FactorScores(
            entries
                .iter()
                .map(|(option, scores)| {
                    (
                        option.to_string(),
                        scores
                            .iter()
                            .map(|(factor, score)| (factor.to_string(), *score))
                            .collect::<BTreeMap<_, _>>(),
                    )
                })
                .collect(),
        )
    }

    pub fn feasibility_slots(customer: &str, problem: &str, monetization: &str) -> SlotMap {
        SlotMap::from([
            (names::TARGET_CUSTOMER.to_string(), text(customer)),
            (names::PROBLEM.to_string(), text(problem)),
            (names::MONETIZATION.to_string(), text(monetization)),
        ])
    }
}
