use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::capability::Capability;

/// A list of generated statements the artifact expects prose synthesis to fill in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailRequest {
    pub key: String,
    pub description: String,
    pub min_items: u8,
    pub max_items: u8,
}

impl DetailRequest {
    pub fn new(key: impl Into<String>, description: impl Into<String>, min: u8, max: u8) -> Self {
        Self { key: key.into(), description: description.into(), min_items: min, max_items: max }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "capability", rename_all = "snake_case")]
pub enum AnalysisArtifact {
    Competitor(CompetitorSnapshot),
    Decision(DecisionFramework),
    Feasibility(FeasibilityAssessment),
}

impl AnalysisArtifact {
    pub fn capability(&self) -> Capability {
        match self {
            Self::Competitor(_) => Capability::CompetitorAnalysis,
            Self::Decision(_) => Capability::DecisionSupport,
            Self::Feasibility(_) => Capability::FeasibilityEvaluation,
        }
    }

    pub fn summary(&self) -> String {
        match self {
            Self::Competitor(snapshot) => {
                let names =
                    snapshot.competitors.iter().map(|c| c.name.as_str()).collect::<Vec<_>>();
                format!(
                    "Competitive snapshot of {} competitors: {}.",
                    names.len(),
                    names.join(", ")
                )
            }
            Self::Decision(framework) => {
                let names = framework.options.iter().map(|o| o.name.as_str()).collect::<Vec<_>>();
                format!(
                    "Decision between {} weighed against {} factor(s): {}.",
                    names.join(" vs. "),
                    framework.factors.len(),
                    framework.factors.join(", ")
                )
            }
            Self::Feasibility(assessment) => format!(
                "Feasibility of {} for {}.",
                assessment.idea.as_deref().unwrap_or("the proposed idea"),
                assessment.target_customer
            ),
        }
    }

    /// Every placeholder the prose synthesis step is asked to fill.
    pub fn detail_requests(&self) -> Vec<&DetailRequest> {
        match self {
            Self::Competitor(snapshot) => {
                let mut requests = Vec::new();
                for profile in &snapshot.competitors {
                    requests.push(&profile.strengths);
                    requests.push(&profile.weaknesses);
                }
                requests.push(&snapshot.differentiators);
                requests.push(&snapshot.additional_gaps);
                requests
            }
            Self::Decision(framework) => {
                let mut requests = Vec::new();
                for option in &framework.options {
                    requests.push(&option.pros);
                    requests.push(&option.cons);
                    requests.push(&option.second_order_effects);
                }
                requests
            }
            Self::Feasibility(assessment) => {
                vec![&assessment.competitive_landscape, &assessment.risks_and_upside]
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceTier {
    Premium,
    Mid,
    Budget,
}

impl PriceTier {
    pub const ALL: [PriceTier; 3] = [Self::Premium, Self::Mid, Self::Budget];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Premium => "premium",
            Self::Mid => "mid-market",
            Self::Budget => "budget",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketSegment {
    Enterprise,
    Smb,
    Consumer,
    Unspecified,
}

impl MarketSegment {
    pub const TARGETED: [MarketSegment; 3] = [Self::Enterprise, Self::Smb, Self::Consumer];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Enterprise => "enterprise",
            Self::Smb => "SMB",
            Self::Consumer => "consumer",
            Self::Unspecified => "unspecified segment",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitorProfile {
    pub name: String,
    pub description: String,
    pub price_tier: PriceTier,
    pub segment: MarketSegment,
    pub strengths: DetailRequest,
    pub weaknesses: DetailRequest,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitorSnapshot {
    pub market: Option<String>,
    pub user_differentiation: Option<String>,
    pub competitors: Vec<CompetitorProfile>,
    pub differentiators: DetailRequest,
    /// Price tier / segment combinations no competitor occupies.
    pub strategic_gaps: Vec<String>,
    pub additional_gaps: DetailRequest,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionAssessment {
    pub name: String,
    pub pros: DetailRequest,
    pub cons: DetailRequest,
    pub risk: RiskLevel,
    pub second_order_effects: DetailRequest,
    pub weighted_total: Option<Decimal>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorWeight {
    pub factor: String,
    pub weight: Decimal,
    pub defaulted: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixCell {
    pub factor: String,
    pub score: Decimal,
    pub defaulted: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixRow {
    pub option: String,
    pub cells: Vec<MatrixCell>,
    pub total: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatrixOutcome {
    Winner { option: String, total: Decimal },
    Tied { options: Vec<String>, total: Decimal },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedMatrix {
    pub factors: Vec<FactorWeight>,
    pub rows: Vec<MatrixRow>,
    pub outcome: MatrixOutcome,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecisionRecommendation {
    Weighted { option: String },
    Tied { options: Vec<String> },
    /// No weights were given; the pick is argued in prose.
    Qualitative,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionFramework {
    pub question: Option<String>,
    pub options: Vec<OptionAssessment>,
    pub factors: Vec<String>,
    pub matrix: Option<WeightedMatrix>,
    pub timeline: Option<String>,
    pub constraints: Option<String>,
    pub recommendation: DecisionRecommendation,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Low,
    Medium,
    High,
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonetizationModel {
    Subscription,
    Transactional,
    OneTime,
    Advertising,
    Freemium,
    Unspecified,
}

impl MonetizationModel {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Subscription => "subscription",
            Self::Transactional => "transaction fees",
            Self::OneTime => "one-time purchase",
            Self::Advertising => "advertising",
            Self::Freemium => "freemium",
            Self::Unspecified => "unspecified model",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonetizationSignal {
    pub model: MonetizationModel,
    pub explicit_pricing: bool,
    pub statement: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Go,
    NoGo,
    ConditionalGo,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Go => "Go",
            Self::NoGo => "No-Go",
            Self::ConditionalGo => "Conditional-Go",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeasibilityAssessment {
    pub idea: Option<String>,
    pub target_customer: String,
    pub problem: String,
    pub market_fit: Rating,
    pub market_fit_reasons: Vec<String>,
    pub complexity: Rating,
    pub complexity_drivers: Vec<String>,
    pub monetization: MonetizationSignal,
    pub go_to_market: Option<String>,
    pub traction: Option<String>,
    pub competitive_landscape: DetailRequest,
    pub risks_and_upside: DetailRequest,
    pub verdict: Verdict,
    pub next_steps: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::{RiskLevel, Verdict};

    #[test]
    fn verdict_labels_match_closed_set() {
        assert_eq!(Verdict::Go.to_string(), "Go");
        assert_eq!(Verdict::NoGo.to_string(), "No-Go");
        assert_eq!(Verdict::ConditionalGo.to_string(), "Conditional-Go");
    }

    #[test]
    fn risk_levels_order_from_low_to_high() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert_eq!(RiskLevel::High.to_string(), "high");
    }
}
