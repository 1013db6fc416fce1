use crate::domain::artifact::{
    CompetitorProfile, CompetitorSnapshot, DetailRequest, MarketSegment, PriceTier,
};
use crate::domain::slot::Competitor;
use crate::slots::names;

use super::{words, AnalysisRequest};

/// Descriptions at least this long get a third strength/weakness.
const DETAILED_DESCRIPTION_WORDS: usize = 8;

const PREMIUM_MARKERS: &[&str] =
    &["premium", "luxury", "high-end", "expensive", "enterprise-grade", "top-tier", "pricey"];
const BUDGET_MARKERS: &[&str] = &[
    "budget",
    "cheap",
    "affordable",
    "low-cost",
    "inexpensive",
    "free",
    "freemium",
    "open-source",
    "open source",
];

const ENTERPRISE_MARKERS: &[&str] =
    &["enterprise", "large compan", "fortune 500", "corporate", "large organization"];
const SMB_MARKERS: &[&str] = &[
    "smb",
    "small business",
    "small and medium",
    "mid-size",
    "midsize",
    "startups",
    "small team",
    "agencies",
];
const CONSUMER_MARKERS: &[&str] =
    &["consumer", "individual", "personal", "families", "b2c", "students", "freelancer"];

pub(super) fn build_snapshot(request: &AnalysisRequest) -> CompetitorSnapshot {
    let competitors = request.competitors(names::COMPETITORS);
    let profiles =
        competitors.iter().enumerate().map(|(index, c)| profile(index, c)).collect::<Vec<_>>();

    let differentiator_count = (profiles.len() + 1).clamp(3, 5) as u8;

    CompetitorSnapshot {
        market: request.topic().map(ToString::to_string),
        user_differentiation: request.text(names::DIFFERENTIATION).map(ToString::to_string),
        differentiators: DetailRequest::new(
            "differentiators",
            "Key differentiators that separate the leading competitors from each other",
            differentiator_count,
            differentiator_count,
        ),
        strategic_gaps: positioning_gaps(&profiles),
        additional_gaps: DetailRequest::new(
            "strategic_gaps",
            "Further underserved needs or positioning opportunities in this market",
            1,
            3,
        ),
        competitors: profiles,
    }
}

fn profile(index: usize, competitor: &Competitor) -> CompetitorProfile {
    let description = competitor.description.trim();
    let count = if words(description).len() >= DETAILED_DESCRIPTION_WORDS { 3 } else { 2 };
    let name = competitor.name.trim();

    CompetitorProfile {
        name: name.to_string(),
        description: description.to_string(),
        price_tier: price_tier(description),
        segment: segment(description),
        strengths: DetailRequest::new(
            format!("competitors.{index}.strengths"),
            format!("Key strengths of {name}"),
            count,
            count,
        ),
        weaknesses: DetailRequest::new(
            format!("competitors.{index}.weaknesses"),
            format!("Key weaknesses of {name}"),
            count,
            count,
        ),
    }
}

fn price_tier(description: &str) -> PriceTier {
    let lowered = description.to_lowercase();
    if contains_any(&lowered, PREMIUM_MARKERS) {
        PriceTier::Premium
    } else if contains_any(&lowered, BUDGET_MARKERS) {
        PriceTier::Budget
    } else {
        PriceTier::Mid
    }
}

fn segment(description: &str) -> MarketSegment {
    let lowered = description.to_lowercase();
    if contains_any(&lowered, ENTERPRISE_MARKERS) {
        MarketSegment::Enterprise
    } else if contains_any(&lowered, SMB_MARKERS) {
        MarketSegment::Smb
    } else if contains_any(&lowered, CONSUMER_MARKERS) {
        MarketSegment::Consumer
    } else {
        MarketSegment::Unspecified
    }
}

fn contains_any(haystack: &str, markers: &[&str]) -> bool {
    markers.iter().any(|marker| haystack.contains(marker))
}

/// Segments nobody targets, then price tiers missing inside targeted segments.
fn positioning_gaps(profiles: &[CompetitorProfile]) -> Vec<String> {
    let mut gaps = Vec::new();

    for segment in MarketSegment::TARGETED {
        let tiers = profiles
            .iter()
            .filter(|profile| profile.segment == segment)
            .map(|profile| profile.price_tier)
            .collect::<Vec<_>>();

        if tiers.is_empty() {
            gaps.push(format!("No competitor explicitly targets the {} segment.", segment.label()));
            continue;
        }

        let open = PriceTier::ALL
            .into_iter()
            .filter(|tier| !tiers.contains(tier))
            .map(|tier| tier.label())
            .collect::<Vec<_>>();
        if !open.is_empty() {
            gaps.push(format!(
                "The {} segment has no {} offering.",
                segment.label(),
                open.join(" or ")
            ));
        }
    }

    gaps
}
