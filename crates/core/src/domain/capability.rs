use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Capability {
    CompetitorAnalysis,
    DecisionSupport,
    FeasibilityEvaluation,
}

impl Capability {
    pub const ALL: [Capability; 3] =
        [Self::CompetitorAnalysis, Self::DecisionSupport, Self::FeasibilityEvaluation];

    pub fn label(&self) -> &'static str {
        match self {
            Self::CompetitorAnalysis => "Competitor Snapshot Analysis",
            Self::DecisionSupport => "Decision Support",
            Self::FeasibilityEvaluation => "Idea Feasibility Evaluation",
        }
    }

    pub fn framework(&self) -> &'static str {
        match self {
            Self::CompetitorAnalysis => {
                "Competitive Landscape Analysis (strengths/weaknesses, positioning map, gap analysis)"
            }
            Self::DecisionSupport => {
                "Weighted Decision Matrix with pros/cons, risk assessment and second-order effects"
            }
            Self::FeasibilityEvaluation => {
                "Feasibility Assessment (market fit, implementation complexity, monetization viability)"
            }
        }
    }

    pub fn as_key(&self) -> &'static str {
        match self {
            Self::CompetitorAnalysis => "competitor_analysis",
            Self::DecisionSupport => "decision_support",
            Self::FeasibilityEvaluation => "feasibility_evaluation",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|capability| capability.as_key() == key)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of classifying a request. `Ambiguous` and `OutOfScope` are states that
/// need another user turn, not failures.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    Capability(Capability),
    Ambiguous { candidates: Vec<Capability> },
    OutOfScope,
}

impl Classification {
    pub fn capability(&self) -> Option<Capability> {
        match self {
            Self::Capability(capability) => Some(*capability),
            Self::Ambiguous { .. } | Self::OutOfScope => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Capability, Classification};

    #[test]
    fn keys_round_trip_for_every_capability() {
        for capability in Capability::ALL {
            assert_eq!(Capability::from_key(capability.as_key()), Some(capability));
        }
        assert_eq!(Capability::from_key("pricing"), None);
    }

    #[test]
    fn only_concrete_classification_exposes_capability() {
        assert_eq!(
            Classification::Capability(Capability::DecisionSupport).capability(),
            Some(Capability::DecisionSupport)
        );
        assert_eq!(Classification::OutOfScope.capability(), None);
        assert_eq!(
            Classification::Ambiguous { candidates: Capability::ALL.to_vec() }.capability(),
            None
        );
    }
}
