//! Response Formatter
//!
//! Completed analyses always render as the same five sections. Everything that
//! still needs user input renders as a shorter question-shaped reply.

use std::fmt::Write as _;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::analysis::Synthesis;
use crate::domain::artifact::{
    AnalysisArtifact, CompetitorSnapshot, DecisionFramework, DecisionRecommendation, DetailRequest,
    FeasibilityAssessment, MarketSegment, MatrixOutcome, PriceTier, Verdict,
};
use crate::domain::capability::Capability;
use crate::slots::{SlotDefinition, ValidationError};

pub const OUT_OF_SCOPE_REPLY: &str = "I specialize in competitor analysis, decision support, and idea feasibility. Could you frame your question in one of those contexts?";

const NOT_GENERATED: &str = "_(not available)_";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum FormattedResponse {
    Analysis {
        capability: Capability,
        summary: String,
        framework: String,
        analysis: String,
        key_insight: String,
        recommendation: String,
    },
    Clarification {
        capability: Capability,
        question: String,
        rationale: String,
        complaints: Vec<String>,
    },
    CapabilityChoice {
        question: String,
        candidates: Vec<Capability>,
    },
    Redirect {
        text: String,
    },
}

impl FormattedResponse {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Analysis { .. } => "analysis",
            Self::Clarification { .. } => "clarification",
            Self::CapabilityChoice { .. } => "capability_choice",
            Self::Redirect { .. } => "redirect",
        }
    }

    pub fn render(&self) -> String {
        match self {
            Self::Analysis { summary, framework, analysis, key_insight, recommendation, .. } => {
                format!(
                    "## Summary\n{summary}\n\n## Framework Applied\n{framework}\n\n## Analysis\n{analysis}\n\n## Key Insight\n{key_insight}\n\n## Recommendation\n{recommendation}"
                )
            }
            Self::Clarification { question, rationale, complaints, .. } => {
                let mut text = String::new();
                if !complaints.is_empty() {
                    text.push_str("I couldn't use part of your last answer:\n");
                    for complaint in complaints {
                        let _ = writeln!(text, "- {complaint}");
                    }
                    text.push('\n');
                }
                let _ = write!(text, "{question}\n\n_{rationale}_");
                text
            }
            Self::CapabilityChoice { question, .. } => question.clone(),
            Self::Redirect { text } => text.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ResponseFormatter;

impl ResponseFormatter {
    pub fn new() -> Self {
        Self
    }

    pub fn analysis(
        &self,
        artifact: &AnalysisArtifact,
        synthesis: &Synthesis,
    ) -> FormattedResponse {
        let capability = artifact.capability();
        let summary = if synthesis.narrative.is_empty() {
            artifact.summary()
        } else {
            format!("{}\n\n{}", artifact.summary(), synthesis.narrative)
        };

        let (analysis, fallback_insight, recommendation) = match artifact {
            AnalysisArtifact::Competitor(snapshot) => competitor_sections(snapshot, synthesis),
            AnalysisArtifact::Decision(framework) => decision_sections(framework, synthesis),
            AnalysisArtifact::Feasibility(assessment) => {
                feasibility_sections(assessment, synthesis)
            }
        };

        FormattedResponse::Analysis {
            capability,
            summary,
            framework: capability.framework().to_string(),
            analysis,
            key_insight: synthesis.key_insight.clone().unwrap_or(fallback_insight),
            recommendation,
        }
    }

    /// One batch question for every missing required slot, in schema order.
    pub fn clarification(
        &self,
        capability: Capability,
        missing: &[&SlotDefinition],
        complaints: &[ValidationError],
    ) -> FormattedResponse {
        let question = match missing {
            [] => "Could you correct that so I can continue?".to_string(),
            [single] => single.prompt.to_string(),
            many => {
                let mut question = "To get started, I need a few details:".to_string();
                for (index, definition) in many.iter().enumerate() {
                    let _ = write!(question, "\n{}. {}", index + 1, definition.prompt);
                }
                question
            }
        };

        FormattedResponse::Clarification {
            capability,
            question,
            rationale: format!(
                "I need these to run a {} for you.",
                capability.label().to_lowercase()
            ),
            complaints: complaints.iter().map(ToString::to_string).collect(),
        }
    }

    pub fn optional_offer(
        &self,
        capability: Capability,
        optional: &[&SlotDefinition],
        complaints: &[ValidationError],
    ) -> FormattedResponse {
        let mut question = String::from(
            "I have what I need. Before I run the analysis, any of these would sharpen it:",
        );
        for definition in optional {
            let _ = write!(question, "\n- {}", definition.prompt);
        }
        question.push_str("\n\nReply with any details, or say \"go ahead\" to proceed.");

        FormattedResponse::Clarification {
            capability,
            question,
            rationale: "These are optional.".to_string(),
            complaints: complaints.iter().map(ToString::to_string).collect(),
        }
    }

    pub fn capability_choice(&self, candidates: &[Capability]) -> FormattedResponse {
        let candidates =
            if candidates.is_empty() { Capability::ALL.to_vec() } else { candidates.to_vec() };
        let mut question =
            "I can help with that in a few ways. Which would be most useful?".to_string();
        for (index, capability) in candidates.iter().enumerate() {
            let _ = write!(question, "\n{}. {}", index + 1, capability.label());
        }
        FormattedResponse::CapabilityChoice { question, candidates }
    }

    pub fn out_of_scope(&self) -> FormattedResponse {
        FormattedResponse::Redirect { text: OUT_OF_SCOPE_REPLY.to_string() }
    }
}

fn competitor_sections(
    snapshot: &CompetitorSnapshot,
    synthesis: &Synthesis,
) -> (String, String, String) {
    let mut out = String::new();

    out.push_str("| Competitor | What they do | Price tier | Segment |\n|---|---|---|---|\n");
    for profile in &snapshot.competitors {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} |",
            cell(&profile.name),
            cell(&profile.description),
            profile.price_tier.label(),
            profile.segment.label()
        );
    }

    for profile in &snapshot.competitors {
        let _ = write!(out, "\n**{}**\n", profile.name);
        push_detail(&mut out, "Strengths", &profile.strengths, synthesis);
        push_detail(&mut out, "Weaknesses", &profile.weaknesses, synthesis);
    }

    out.push_str("\n**Positioning map**\n\n| Price tier |");
    let segments = [
        MarketSegment::Enterprise,
        MarketSegment::Smb,
        MarketSegment::Consumer,
        MarketSegment::Unspecified,
    ];
    for segment in segments {
        let _ = write!(out, " {} |", segment.label());
    }
    out.push_str("\n|---|---|---|---|---|\n");
    for tier in PriceTier::ALL {
        let _ = write!(out, "| {} |", tier.label());
        for segment in segments {
            let names = snapshot
                .competitors
                .iter()
                .filter(|p| p.price_tier == tier && p.segment == segment)
                .map(|p| cell(&p.name))
                .collect::<Vec<_>>();
            let names = if names.is_empty() { "-".to_string() } else { names.join(", ") };
            let _ = write!(out, " {names} |");
        }
        out.push('\n');
    }

    out.push('\n');
    push_detail(&mut out, "Key differentiators", &snapshot.differentiators, synthesis);
    out.push_str("\n**Strategic gaps**\n");
    for gap in &snapshot.strategic_gaps {
        let _ = writeln!(out, "- {gap}");
    }
    let additional = &snapshot.additional_gaps;
    for gap in synthesis.details_for(&additional.key, additional.max_items) {
        let _ = writeln!(out, "- {gap}");
    }

    let insight = snapshot
        .strategic_gaps
        .first()
        .map(|gap| format!("The clearest opening in this market: {}", lowercase_first(gap)))
        .unwrap_or_else(|| {
            "Every price tier and segment is already contested, so differentiation has to come \
             from product depth rather than positioning."
                .to_string()
        });

    let recommendation = match (&synthesis.recommendation, &snapshot.user_differentiation) {
        (Some(text), _) => text.clone(),
        (None, Some(differentiation)) => format!(
            "Lead with your differentiation ({differentiation}) where it overlaps an open position \
             on the map."
        ),
        (None, None) => {
            "Pick one open position on the map and build the product story around it.".to_string()
        }
    };

    (out.trim_end().to_string(), insight, recommendation)
}

fn decision_sections(
    framework: &DecisionFramework,
    synthesis: &Synthesis,
) -> (String, String, String) {
    let mut out = String::new();

    if let Some(question) = &framework.question {
        let _ = writeln!(out, "**Decision:** {question}\n");
    }

    out.push_str("| Option | Risk | Weighted total |\n|---|---|---|\n");
    for option in &framework.options {
        let total = option.weighted_total.map(format_decimal).unwrap_or_else(|| "-".to_string());
        let _ = writeln!(out, "| {} | {} | {} |", cell(&option.name), option.risk, total);
    }

    if let Some(matrix) = &framework.matrix {
        out.push_str("\n**Weighted decision matrix**\n\n| Option |");
        for factor in &matrix.factors {
            let marker = if factor.defaulted { "*" } else { "" };
            let weight = format_decimal(factor.weight);
            let _ = write!(out, " {} (w={weight}{marker}) |", cell(&factor.factor));
        }
        out.push_str(" Total |\n|---|");
        for _ in &matrix.factors {
            out.push_str("---|");
        }
        out.push_str("---|\n");
        for row in &matrix.rows {
            let _ = write!(out, "| {} |", cell(&row.option));
            for score in &row.cells {
                let marker = if score.defaulted { "*" } else { "" };
                let _ = write!(out, " {}{marker} |", format_decimal(score.score));
            }
            let _ = writeln!(out, " **{}** |", format_decimal(row.total));
        }
        if matrix.factors.iter().any(|f| f.defaulted)
            || matrix.rows.iter().any(|r| r.cells.iter().any(|c| c.defaulted))
        {
            out.push_str("\n\\* not provided, scored at the neutral midpoint 5.5\n");
        }
    }

    for option in &framework.options {
        let _ = write!(out, "\n**{}** (risk: {})\n", option.name, option.risk);
        push_detail(&mut out, "Pros", &option.pros, synthesis);
        push_detail(&mut out, "Cons", &option.cons, synthesis);
        push_detail(&mut out, "Second-order effects", &option.second_order_effects, synthesis);
    }

    if let Some(timeline) = &framework.timeline {
        let _ = write!(out, "\n**Timeline:** {timeline}\n");
    }
    if let Some(constraints) = &framework.constraints {
        let _ = write!(out, "\n**Constraints:** {constraints}\n");
    }

    let insight = match framework.matrix.as_ref().map(|matrix| &matrix.outcome) {
        Some(MatrixOutcome::Winner { option, total }) => {
            let total = format_decimal(*total);
            format!("{option} scores highest on the factors you weighted ({total}).")
        }
        Some(MatrixOutcome::Tied { options, total }) => format!(
            "{} tie at {}; your weights alone do not separate them.",
            options.join(" and "),
            format_decimal(*total)
        ),
        None => format!(
            "The choice turns on how you rank {}.",
            framework.factors.join(", ")
        ),
    };

    let deterministic = match &framework.recommendation {
        DecisionRecommendation::Weighted { option } => {
            format!("Based on your weighted factors, **{option}** is the stronger choice.")
        }
        DecisionRecommendation::Tied { options } => format!(
            "{} are tied on the weighted matrix. Revisit the weights or add a tie-breaking factor \
             before deciding.",
            options.join(" and ")
        ),
        DecisionRecommendation::Qualitative => String::new(),
    };
    let recommendation = match (&synthesis.recommendation, deterministic.is_empty()) {
        (Some(text), true) => text.clone(),
        (Some(text), false) => format!("{deterministic}\n\n{text}"),
        (None, false) => deterministic,
        (None, true) => String::from(
            "Weigh the pros and cons above against your top factor; share weights (1-10) if \
             you'd like a scored comparison.",
        ),
    };

    (out.trim_end().to_string(), insight, recommendation)
}

fn feasibility_sections(
    assessment: &FeasibilityAssessment,
    synthesis: &Synthesis,
) -> (String, String, String) {
    let mut out = String::new();

    out.push_str("| Dimension | Rating | Notes |\n|---|---|---|\n");
    let _ = writeln!(
        out,
        "| Market fit | {} | {} |",
        assessment.market_fit,
        cell(&assessment.market_fit_reasons.join(" "))
    );
    let drivers = if assessment.complexity_drivers.is_empty() {
        "No unusual build complexity detected.".to_string()
    } else {
        assessment.complexity_drivers.join(", ")
    };
    let _ = writeln!(
        out,
        "| Implementation complexity | {} | {} |",
        assessment.complexity,
        cell(&drivers)
    );
    let pricing = if assessment.monetization.explicit_pricing {
        "explicit pricing"
    } else {
        "no price point yet"
    };
    let _ = writeln!(
        out,
        "| Monetization | {} | {} |",
        assessment.monetization.model.label(),
        cell(&format!("{} ({pricing})", assessment.monetization.statement))
    );

    let _ = write!(out, "\n**Target customer:** {}\n", assessment.target_customer);
    let _ = write!(out, "\n**Problem:** {}\n", assessment.problem);
    if let Some(go_to_market) = &assessment.go_to_market {
        let _ = write!(out, "\n**Go-to-market:** {go_to_market}\n");
    }
    if let Some(traction) = &assessment.traction {
        let _ = write!(out, "\n**Traction:** {traction}\n");
    }

    out.push('\n');
    push_detail(&mut out, "Competitive landscape", &assessment.competitive_landscape, synthesis);
    push_detail(&mut out, "Risks and upside", &assessment.risks_and_upside, synthesis);

    let insight = format!(
        "Market fit is {} and implementation complexity is {}.",
        assessment.market_fit.to_string().to_lowercase(),
        assessment.complexity.to_string().to_lowercase()
    );

    let mut recommendation = format!("**Verdict: {}**", assessment.verdict);
    if let Some(text) = &synthesis.recommendation {
        let _ = write!(recommendation, "\n\n{text}");
    }
    let heading = match assessment.verdict {
        Verdict::ConditionalGo => "Validate before committing:",
        Verdict::Go | Verdict::NoGo => "Next steps:",
    };
    let _ = write!(recommendation, "\n\n{heading}");
    for (index, step) in assessment.next_steps.iter().enumerate() {
        let _ = write!(recommendation, "\n{}. {step}", index + 1);
    }

    (out.trim_end().to_string(), insight, recommendation)
}

fn push_detail(out: &mut String, heading: &str, request: &DetailRequest, synthesis: &Synthesis) {
    let items = synthesis.details_for(&request.key, request.max_items);
    let _ = writeln!(out, "_{heading}:_");
    if items.is_empty() {
        let _ = writeln!(out, "- {NOT_GENERATED}");
    }
    for item in items {
        let _ = writeln!(out, "- {item}");
    }
}

/// Table cells cannot contain pipes or line breaks.
fn cell(text: &str) -> String {
    text.replace('|', "/").replace('\n', " ")
}

fn format_decimal(value: Decimal) -> String {
    value.normalize().to_string()
}

fn lowercase_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
