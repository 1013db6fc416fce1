//! Slot Schema Registry
//!
//! Static intake schemas for each capability. Every slot carries the question
//! asked when it is missing and the rule its value must satisfy. Values coming
//! from free-text extraction are converted with [`SlotDefinition::parse_json`]
//! and checked with [`SlotDefinition::validate`] before they touch a session.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::capability::Capability;
use crate::domain::slot::{Competitor, SlotMap, SlotValue};

pub mod names {
    pub const COMPETITORS: &str = "competitors";
    pub const DIFFERENTIATION: &str = "differentiation";
    pub const OPTIONS: &str = "options";
    pub const DECISION_FACTORS: &str = "decision_factors";
    pub const WEIGHTS: &str = "weights";
    pub const FACTOR_SCORES: &str = "factor_scores";
    pub const TIMELINE: &str = "timeline";
    pub const CONSTRAINTS: &str = "constraints";
    pub const TARGET_CUSTOMER: &str = "target_customer";
    pub const PROBLEM: &str = "problem";
    pub const MONETIZATION: &str = "monetization";
    pub const GO_TO_MARKET: &str = "go_to_market";
    pub const TRACTION: &str = "traction";
}

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 10;

/// A slot value that violates its schema rule.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("`{slot}` {constraint}")]
pub struct ValidationError {
    pub slot: String,
    pub constraint: String,
}

impl ValidationError {
    pub fn new(slot: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self { slot: slot.into(), constraint: constraint.into() }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotKind {
    Text,
    List,
    Competitors,
    Weights,
    FactorScores,
}

impl SlotKind {
    fn expected(&self) -> &'static str {
        match self {
            Self::Text => "a short text answer",
            Self::List => "a list of items",
            Self::Competitors => "a list of competitor names with one-line descriptions",
            Self::Weights => "a mapping of factor to importance (1-10)",
            Self::FactorScores => "a mapping of option to factor scores (1-10)",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotRule {
    NonEmptyText,
    /// Non-empty, distinct list entries.
    ItemCount { min: usize, max: Option<usize> },
    CompetitorCount { min: usize, max: usize },
    ScoreRange { min: u8, max: u8 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotDefinition {
    pub name: &'static str,
    pub label: &'static str,
    pub required: bool,
    pub prompt: &'static str,
    pub kind: SlotKind,
    pub rule: SlotRule,
}

impl SlotDefinition {
    pub fn validate(&self, value: &SlotValue) -> Result<(), ValidationError> {
        match (self.rule, value) {
            (SlotRule::NonEmptyText, SlotValue::Text(text)) => {
                if text.trim().is_empty() {
                    return Err(self.violation("must not be empty"));
                }
                Ok(())
            }
            (SlotRule::ItemCount { min, max }, SlotValue::List(items)) => {
                if items.iter().any(|item| item.trim().is_empty()) {
                    return Err(self.violation("must not contain empty entries"));
                }
                if items.len() < min {
                    return Err(self.violation(format!(
                        "needs at least {min} entr{} (got {})",
                        if min == 1 { "y" } else { "ies" },
                        items.len()
                    )));
                }
                if let Some(max) = max {
                    if items.len() > max {
                        return Err(self.violation(format!(
                            "accepts at most {max} entries (got {})",
                            items.len()
                        )));
                    }
                }
                if !all_distinct(items.iter().map(String::as_str)) {
                    return Err(self.violation("entries must be distinct"));
                }
                Ok(())
            }
            (SlotRule::CompetitorCount { min, max }, SlotValue::Competitors(competitors)) => {
                if competitors.len() < min || competitors.len() > max {
                    return Err(self.violation(format!(
                        "needs between {min} and {max} competitors (got {})",
                        competitors.len()
                    )));
                }
                if let Some(unnamed) = competitors.iter().position(|c| c.name.trim().is_empty()) {
                    return Err(self.violation(format!("entry {} is missing a name", unnamed + 1)));
                }
                if let Some(bare) = competitors.iter().find(|c| c.description.trim().is_empty()) {
                    return Err(self.violation(format!(
                        "needs a one-line description for `{}`",
                        bare.name.trim()
                    )));
                }
                if !all_distinct(competitors.iter().map(|c| c.name.as_str())) {
                    return Err(self.violation("competitor names must be distinct"));
                }
                Ok(())
            }
            (SlotRule::ScoreRange { min, max }, SlotValue::Weights(weights)) => {
                if weights.is_empty() {
                    return Err(self.violation("must name at least one factor"));
                }
                for (factor, weight) in weights {
                    self.check_score(factor, *weight, min, max)?;
                }
                Ok(())
            }
            (SlotRule::ScoreRange { min, max }, SlotValue::FactorScores(scores)) => {
                if scores.is_empty() {
                    return Err(self.violation("must score at least one option"));
                }
                for (option, factors) in scores {
                    if option.trim().is_empty() {
                        return Err(self.violation("contains an option without a name"));
                    }
                    for (factor, score) in factors {
                        self.check_score(&format!("{option}/{factor}"), *score, min, max)?;
                    }
                }
                Ok(())
            }
            _ => Err(self.violation(format!(
                "has the wrong shape (expected {})",
                self.kind.expected()
            ))),
        }
    }

    /// Converts an extracted JSON value into this slot's value shape. `Ok(None)`
    /// means nothing usable was supplied (null or blank), which never clears a slot.
    pub fn parse_json(&self, value: &Value) -> Result<Option<SlotValue>, ValidationError> {
        if value.is_null() {
            return Ok(None);
        }

        let parsed = match self.kind {
            SlotKind::Text => text_from_json(value).map(SlotValue::Text),
            SlotKind::List => list_from_json(value).map(SlotValue::List),
            SlotKind::Competitors => competitors_from_json(value).map(SlotValue::Competitors),
            SlotKind::Weights => self.scores_from_json(value)?.map(SlotValue::Weights),
            SlotKind::FactorScores => match value {
                Value::Object(map) => {
                    let mut scores = BTreeMap::new();
                    for (option, factors) in map {
                        if let Some(parsed) = self.scores_from_json(factors)? {
                            scores.insert(option.trim().to_string(), parsed);
                        }
                    }
                    (!scores.is_empty()).then_some(SlotValue::FactorScores(scores))
                }
                _ => return Err(self.shape_error()),
            },
        };

        match parsed {
            Some(value) if value.is_empty() => Ok(None),
            Some(value) => Ok(Some(value)),
            None if is_blank(value) => Ok(None),
            None => Err(self.shape_error()),
        }
    }

    fn scores_from_json(
        &self,
        value: &Value,
    ) -> Result<Option<BTreeMap<String, u8>>, ValidationError> {
        let Value::Object(map) = value else {
            return Err(self.shape_error());
        };

        let mut scores = BTreeMap::new();
        for (factor, raw) in map {
            let number = match raw {
                Value::Number(number) => number.as_f64(),
                Value::String(text) => text.trim().parse::<f64>().ok(),
                Value::Null => continue,
                _ => None,
            };
            let Some(number) = number else {
                return Err(self.violation(format!("needs a number for `{factor}`")));
            };
            if number.fract() != 0.0 || !(0.0..=f64::from(u8::MAX)).contains(&number) {
                return Err(self.violation(format!(
                    "needs a whole number between {MIN_SCORE} and {MAX_SCORE} for `{factor}` (got {number})"
                )));
            }
            scores.insert(factor.trim().to_string(), number as u8);
        }
        Ok((!scores.is_empty()).then_some(scores))
    }

    fn check_score(&self, key: &str, score: u8, min: u8, max: u8) -> Result<(), ValidationError> {
        if key.trim().is_empty() {
            return Err(self.violation("contains an entry without a factor name"));
        }
        if !(min..=max).contains(&score) {
            return Err(self.violation(format!(
                "must be between {min} and {max} for `{key}` (got {score})"
            )));
        }
        Ok(())
    }

    fn shape_error(&self) -> ValidationError {
        self.violation(format!("has the wrong shape (expected {})", self.kind.expected()))
    }

    fn violation(&self, constraint: impl Into<String>) -> ValidationError {
        ValidationError::new(self.name, constraint)
    }
}

static COMPETITOR_SCHEMA: [SlotDefinition; 2] = [
    SlotDefinition {
        name: names::COMPETITORS,
        label: "Competitors",
        required: true,
        prompt: "Please share 2-5 competitor names and a brief description of what each does (one line per competitor).",
        kind: SlotKind::Competitors,
        rule: SlotRule::CompetitorCount { min: 2, max: 5 },
    },
    SlotDefinition {
        name: names::DIFFERENTIATION,
        label: "Your differentiation",
        required: false,
        prompt: "What's your primary differentiation or unique value proposition?",
        kind: SlotKind::Text,
        rule: SlotRule::NonEmptyText,
    },
];

static DECISION_SCHEMA: [SlotDefinition; 6] = [
    SlotDefinition {
        name: names::OPTIONS,
        label: "Options",
        required: true,
        prompt: "Which options are you choosing between? (at least two)",
        kind: SlotKind::List,
        rule: SlotRule::ItemCount { min: 2, max: None },
    },
    SlotDefinition {
        name: names::DECISION_FACTORS,
        label: "Decision factors",
        required: true,
        prompt: "What factors matter most to you? (e.g., speed to market, maintaining control, capital efficiency, team capacity, risk tolerance)",
        kind: SlotKind::List,
        rule: SlotRule::ItemCount { min: 1, max: None },
    },
    SlotDefinition {
        name: names::WEIGHTS,
        label: "Factor weights",
        required: false,
        prompt: "How important is each factor on a 1-10 scale?",
        kind: SlotKind::Weights,
        rule: SlotRule::ScoreRange { min: MIN_SCORE, max: MAX_SCORE },
    },
    SlotDefinition {
        name: names::FACTOR_SCORES,
        label: "Option scores",
        required: false,
        prompt: "How well does each option perform on each factor (1-10)?",
        kind: SlotKind::FactorScores,
        rule: SlotRule::ScoreRange { min: MIN_SCORE, max: MAX_SCORE },
    },
    SlotDefinition {
        name: names::TIMELINE,
        label: "Timeline",
        required: false,
        prompt: "What's your timeline for this decision?",
        kind: SlotKind::Text,
        rule: SlotRule::NonEmptyText,
    },
    SlotDefinition {
        name: names::CONSTRAINTS,
        label: "Constraints",
        required: false,
        prompt: "Are there any constraints I should know about?",
        kind: SlotKind::Text,
        rule: SlotRule::NonEmptyText,
    },
];

static FEASIBILITY_SCHEMA: [SlotDefinition; 5] = [
    SlotDefinition {
        name: names::TARGET_CUSTOMER,
        label: "Target customer",
        required: true,
        prompt: "Who is your target customer? Be specific.",
        kind: SlotKind::Text,
        rule: SlotRule::NonEmptyText,
    },
    SlotDefinition {
        name: names::PROBLEM,
        label: "Problem",
        required: true,
        prompt: "What problem does this solve for them?",
        kind: SlotKind::Text,
        rule: SlotRule::NonEmptyText,
    },
    SlotDefinition {
        name: names::MONETIZATION,
        label: "Monetization",
        required: true,
        prompt: "How do you plan to monetize? What's the expected pricing?",
        kind: SlotKind::Text,
        rule: SlotRule::NonEmptyText,
    },
    SlotDefinition {
        name: names::GO_TO_MARKET,
        label: "Go-to-market",
        required: false,
        prompt: "What's your go-to-market approach?",
        kind: SlotKind::Text,
        rule: SlotRule::NonEmptyText,
    },
    SlotDefinition {
        name: names::TRACTION,
        label: "Traction",
        required: false,
        prompt: "Do you have any existing traction or validation?",
        kind: SlotKind::Text,
        rule: SlotRule::NonEmptyText,
    },
];

#[derive(Clone, Copy, Debug, Default)]
pub struct SlotSchemaRegistry;

impl SlotSchemaRegistry {
    pub fn schema_for(capability: Capability) -> &'static [SlotDefinition] {
        match capability {
            Capability::CompetitorAnalysis => &COMPETITOR_SCHEMA,
            Capability::DecisionSupport => &DECISION_SCHEMA,
            Capability::FeasibilityEvaluation => &FEASIBILITY_SCHEMA,
        }
    }

    pub fn definition(capability: Capability, name: &str) -> Option<&'static SlotDefinition> {
        Self::schema_for(capability).iter().find(|definition| definition.name == name)
    }

    /// Required slots that are absent or no longer valid, in schema order.
    pub fn missing_required(
        capability: Capability,
        slots: &SlotMap,
    ) -> Vec<&'static SlotDefinition> {
        Self::schema_for(capability)
            .iter()
            .filter(|definition| definition.required)
            .filter(|definition| match slots.get(definition.name) {
                Some(value) => definition.validate(value).is_err(),
                None => true,
            })
            .collect()
    }

    pub fn missing_optional(
        capability: Capability,
        slots: &SlotMap,
    ) -> Vec<&'static SlotDefinition> {
        Self::schema_for(capability)
            .iter()
            .filter(|definition| !definition.required && !slots.contains_key(definition.name))
            .collect()
    }

    /// Slots still worth asking the extractor about: everything not yet filled.
    pub fn unfilled(capability: Capability, slots: &SlotMap) -> Vec<&'static SlotDefinition> {
        let mut unfilled = Self::missing_required(capability, slots);
        unfilled.extend(Self::missing_optional(capability, slots));
        unfilled
    }
}

pub fn schema_for(capability: Capability) -> &'static [SlotDefinition] {
    SlotSchemaRegistry::schema_for(capability)
}

fn all_distinct<'a>(values: impl Iterator<Item = &'a str>) -> bool {
    let mut seen = BTreeSet::new();
    values.map(|value| value.trim().to_lowercase()).all(|value| seen.insert(value))
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn text_from_json(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Array(items) => {
            items.iter().filter_map(text_from_json).collect::<Vec<_>>().join(", ")
        }
        _ => return None,
    };
    Some(text)
}

fn list_from_json(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(text_from_json)
                .filter(|item| !item.is_empty())
                .collect(),
        ),
        Value::String(text) => Some(split_list(text)),
        _ => None,
    }
}

pub(crate) fn split_list(text: &str) -> Vec<String> {
    text.split(['\n', ',', ';'])
        .flat_map(|part| part.split(" or "))
        .map(|part| part.trim().trim_start_matches(['-', '*']).trim())
        .map(|part| part.trim_start_matches("and ").trim())
        .filter(|part| !part.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn competitors_from_json(value: &Value) -> Option<Vec<Competitor>> {
    match value {
        Value::Array(items) => {
            let mut competitors = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Object(map) => {
                        let name = map.get("name").and_then(text_from_json).unwrap_or_default();
                        let description =
                            map.get("description").and_then(text_from_json).unwrap_or_default();
                        competitors.push(Competitor::new(name, description));
                    }
                    Value::String(line) => competitors.push(competitor_from_line(line)),
                    _ => return None,
                }
            }
            Some(competitors)
        }
        Value::Object(map) => Some(
            map.iter()
                .map(|(name, description)| {
                    Competitor::new(name.trim(), text_from_json(description).unwrap_or_default())
                })
                .collect(),
        ),
        Value::String(text) => Some(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(competitor_from_line)
                .collect(),
        ),
        _ => None,
    }
}

fn competitor_from_line(line: &str) -> Competitor {
    let line = line.trim().trim_start_matches(['-', '*']).trim();
    for separator in [" - ", " – ", " — ", ": "] {
        if let Some((name, description)) = line.split_once(separator) {
            return Competitor::new(name.trim(), description.trim());
        }
    }
    Competitor::new(line, "")
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use crate::domain::capability::Capability;
    use crate::domain::slot::{Competitor, SlotMap, SlotValue};

    use super::{names, SlotSchemaRegistry, ValidationError};

    fn definition(capability: Capability, name: &str) -> &'static super::SlotDefinition {
        SlotSchemaRegistry::definition(capability, name).expect("slot exists")
    }

    #[test]
    fn schemas_declare_required_slots_in_order() {
        let required = |capability| {
            SlotSchemaRegistry::schema_for(capability)
                .iter()
                .filter(|definition| definition.required)
                .map(|definition| definition.name)
                .collect::<Vec<_>>()
        };

        assert_eq!(required(Capability::CompetitorAnalysis), vec![names::COMPETITORS]);
        assert_eq!(
            required(Capability::DecisionSupport),
            vec![names::OPTIONS, names::DECISION_FACTORS]
        );
        assert_eq!(
            required(Capability::FeasibilityEvaluation),
            vec![names::TARGET_CUSTOMER, names::PROBLEM, names::MONETIZATION]
        );
    }

    #[test]
    fn competitor_count_is_bounded_between_two_and_five() {
        let slot = definition(Capability::CompetitorAnalysis, names::COMPETITORS);
        let competitors = |count: usize| {
            SlotValue::Competitors(
                (0..count).map(|i| Competitor::new(format!("Co{i}"), "does things")).collect(),
            )
        };

        let too_few = slot.validate(&competitors(1)).expect_err("one competitor is too few");
        assert_eq!(too_few.slot, "competitors");
        assert!(too_few.constraint.contains("between 2 and 5"));
        assert!(slot.validate(&competitors(2)).is_ok());
        assert!(slot.validate(&competitors(5)).is_ok());
        assert!(slot.validate(&competitors(6)).is_err());
    }

    #[test]
    fn competitor_without_description_is_rejected_by_name() {
        let slot = definition(Capability::CompetitorAnalysis, names::COMPETITORS);
        let error = slot
            .validate(&SlotValue::Competitors(vec![
                Competitor::new("Acme", "budget CRM"),
                Competitor::new("Globex", " "),
            ]))
            .expect_err("missing description");
        assert!(error.constraint.contains("Globex"));
    }

    #[test]
    fn options_need_two_distinct_entries() {
        let slot = definition(Capability::DecisionSupport, names::OPTIONS);
        assert!(slot.validate(&SlotValue::List(vec!["Series A".to_string()])).is_err());
        assert!(slot
            .validate(&SlotValue::List(vec!["Bootstrap".to_string(), "bootstrap".to_string()]))
            .is_err());
        assert!(slot
            .validate(&SlotValue::List(vec!["Series A".to_string(), "bootstrap".to_string()]))
            .is_ok());
    }

    #[test]
    fn weights_outside_one_to_ten_are_rejected() {
        let slot = definition(Capability::DecisionSupport, names::WEIGHTS);
        let error = slot
            .validate(&SlotValue::Weights(BTreeMap::from([("speed".to_string(), 11)])))
            .expect_err("11 is out of range");
        assert_eq!(
            error,
            ValidationError::new("weights", "must be between 1 and 10 for `speed` (got 11)")
        );
    }

    #[test]
    fn wrong_shape_is_reported_not_dropped() {
        let slot = definition(Capability::FeasibilityEvaluation, names::PROBLEM);
        let error = slot
            .validate(&SlotValue::List(vec!["a".to_string()]))
            .expect_err("list is not text");
        assert!(error.constraint.contains("wrong shape"));
    }

    #[test]
    fn parses_competitor_lines_from_free_text() {
        let slot = definition(Capability::CompetitorAnalysis, names::COMPETITORS);
        let parsed = slot
            .parse_json(&json!("Acme - budget CRM for SMBs\nGlobex: enterprise suite"))
            .expect("parse")
            .expect("value");
        assert_eq!(
            parsed,
            SlotValue::Competitors(vec![
                Competitor::new("Acme", "budget CRM for SMBs"),
                Competitor::new("Globex", "enterprise suite"),
            ])
        );
    }

    #[test]
    fn parses_competitor_objects() {
        let slot = definition(Capability::CompetitorAnalysis, names::COMPETITORS);
        let parsed = slot
            .parse_json(&json!([{"name": "Acme", "description": "budget CRM"}]))
            .expect("parse")
            .expect("value");
        assert_eq!(parsed, SlotValue::Competitors(vec![Competitor::new("Acme", "budget CRM")]));
    }

    #[test]
    fn null_and_blank_values_are_not_values() {
        let slot = definition(Capability::DecisionSupport, names::TIMELINE);
        assert_eq!(slot.parse_json(&json!(null)).expect("parse"), None);
        assert_eq!(slot.parse_json(&json!("  ")).expect("parse"), None);
    }

    #[test]
    fn fractional_weight_is_a_validation_error() {
        let slot = definition(Capability::DecisionSupport, names::WEIGHTS);
        let error = slot.parse_json(&json!({"speed": 7.5})).expect_err("fractional weight");
        assert_eq!(error.slot, "weights");
        assert!(error.constraint.contains("whole number"));
    }

    #[test]
    fn parses_nested_factor_scores() {
        let slot = definition(Capability::DecisionSupport, names::FACTOR_SCORES);
        let parsed = slot
            .parse_json(&json!({"Series A": {"speed": 8, "control": "3"}}))
            .expect("parse")
            .expect("value");
        let scores = parsed.as_factor_scores().expect("factor scores");
        assert_eq!(scores["Series A"]["speed"], 8);
        assert_eq!(scores["Series A"]["control"], 3);
    }

    #[test]
    fn list_text_is_split_on_separators() {
        let slot = definition(Capability::DecisionSupport, names::DECISION_FACTORS);
        let parsed = slot
            .parse_json(&json!("speed to market, control; and dilution"))
            .expect("parse")
            .expect("value");
        assert_eq!(
            parsed,
            SlotValue::List(vec![
                "speed to market".to_string(),
                "control".to_string(),
                "dilution".to_string()
            ])
        );
    }

    #[test]
    fn missing_required_includes_invalid_values() {
        let mut slots = SlotMap::new();
        slots.insert(
            names::COMPETITORS.to_string(),
            SlotValue::Competitors(vec![Competitor::new("Acme", "budget CRM")]),
        );

        let missing = SlotSchemaRegistry::missing_required(Capability::CompetitorAnalysis, &slots);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].name, names::COMPETITORS);

        let optional = SlotSchemaRegistry::missing_optional(Capability::CompetitorAnalysis, &slots);
        let optional = optional.iter().map(|d| d.name).collect::<Vec<_>>();
        assert_eq!(optional, vec![names::DIFFERENTIATION]);
    }
}
