use serde::{Deserialize, Serialize};

use crate::domain::capability::Capability;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "capability", rename_all = "snake_case")]
pub enum IntakeState {
    Unclassified,
    Clarifying(Capability),
    Ready(Capability),
    Analyzed(Capability),
}

impl IntakeState {
    pub fn capability(&self) -> Option<Capability> {
        match self {
            Self::Unclassified => None,
            Self::Clarifying(capability) | Self::Ready(capability) | Self::Analyzed(capability) => {
                Some(*capability)
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Unclassified => "unclassified",
            Self::Clarifying(_) => "clarifying",
            Self::Ready(_) => "ready",
            Self::Analyzed(_) => "analyzed",
        }
    }

    /// Inverse of `label` plus `capability`.
    pub fn parse(label: &str, capability: Option<Capability>) -> Option<Self> {
        match (label, capability) {
            ("unclassified", None) => Some(Self::Unclassified),
            ("clarifying", Some(capability)) => Some(Self::Clarifying(capability)),
            ("ready", Some(capability)) => Some(Self::Ready(capability)),
            ("analyzed", Some(capability)) => Some(Self::Analyzed(capability)),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntakeEvent {
    Classified(Capability),
    AmbiguityDetected,
    OutOfScopeDetected,
    SlotsUpdated,
    AnalysisRequested,
    Redirected,
    TopicClosed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct IntakeContext {
    pub missing_required_slots: Vec<String>,
}

impl IntakeContext {
    pub fn with_missing<I, S>(missing: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { missing_required_slots: missing.into_iter().map(Into::into).collect() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntakeAction {
    ExtractSlots,
    PromptForCapability,
    RedirectOutOfScope,
    PromptForMissingSlots,
    OfferOptionalSlots,
    BuildAnalysis,
    SynthesizeProse,
    ResetSlots,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: IntakeState,
    pub to: IntakeState,
    pub event: IntakeEvent,
    pub actions: Vec<IntakeAction>,
}
