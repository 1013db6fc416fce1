//! Slot extraction.
//!
//! The generation service only proposes values. Every proposal is parsed and
//! validated against the slot schema before it touches the session, so a bad
//! reply can never overwrite a stored value.

use std::fmt::Write as _;

use advisor_core::domain::capability::Capability;
use advisor_core::domain::slot::{SlotMap, SlotValue};
use advisor_core::slots::{names, SlotDefinition, SlotKind, SlotSchemaRegistry, ValidationError};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::llm::{PromptPurpose, PromptSpec};

const EXTRACTION_SYSTEM_PROMPT: &str = "You extract structured details from a user's message \
for a business advisory intake. Respond with a single JSON object and nothing else. Use exactly \
the keys you are given. Set a key to null when the message does not state that detail; never \
guess or invent values.";

const DECISION_OPENERS: [&str; 4] =
    ["should we ", "should i ", "choose between ", "decide between "];

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MergeReport {
    pub accepted: Vec<String>,
    pub rejected: Vec<ValidationError>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SlotExtractor;

impl SlotExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn prompt(
        &self,
        capability: Capability,
        topic: Option<&str>,
        unfilled: &[&SlotDefinition],
        utterance: &str,
    ) -> PromptSpec {
        let mut user = format!("Capability: {}\n", capability.label());
        if let Some(topic) = topic {
            let _ = writeln!(user, "Conversation topic: {topic}");
        }
        user.push_str("\nKeys to fill:\n");
        for definition in unfilled {
            let _ = writeln!(
                user,
                "- \"{}\" ({}): {}",
                definition.name,
                json_shape(definition.kind),
                definition.prompt
            );
        }
        let _ = write!(user, "\nUser message:\n{utterance}");

        PromptSpec {
            purpose: PromptPurpose::SlotExtraction,
            system: EXTRACTION_SYSTEM_PROMPT.to_string(),
            user,
        }
    }

    /// Reads the reply into proposed values. A reply without a JSON object
    /// proposes nothing.
    pub fn parse_reply(&self, raw: &str) -> Map<String, Value> {
        let trimmed = raw.trim();
        let candidate = match (trimmed.find('{'), trimmed.rfind('}')) {
            (Some(start), Some(end)) if start < end => &trimmed[start..=end],
            _ => {
                warn!(
                    event_name = "extraction.reply_unparsed",
                    "extraction reply held no JSON object"
                );
                return Map::new();
            }
        };

        match serde_json::from_str::<Value>(candidate) {
            Ok(Value::Object(map)) => map,
            _ => {
                warn!(
                    event_name = "extraction.reply_unparsed",
                    "extraction reply was not a JSON object"
                );
                Map::new()
            }
        }
    }

    /// Validates each proposal and merges the valid ones. Keys outside the
    /// capability's schema are ignored.
    pub fn merge(
        &self,
        capability: Capability,
        slots: &mut SlotMap,
        proposed: &Map<String, Value>,
    ) -> MergeReport {
        let mut report = MergeReport::default();

        // schema order keeps complaints in the same order as the prompt
        for definition in SlotSchemaRegistry::schema_for(capability) {
            let Some(raw) = proposed.get(definition.name) else {
                continue;
            };
            let parsed = match definition.parse_json(raw) {
                Ok(Some(value)) => value,
                Ok(None) => continue,
                Err(error) => {
                    report.rejected.push(error);
                    continue;
                }
            };
            match definition.validate(&parsed) {
                Ok(()) => {
                    slots.insert(definition.name.to_string(), parsed);
                    report.accepted.push(definition.name.to_string());
                }
                Err(error) => report.rejected.push(error),
            }
        }

        for key in proposed.keys() {
            if SlotSchemaRegistry::definition(capability, key).is_none() {
                debug!(
                    event_name = "extraction.unknown_key",
                    key = key.as_str(),
                    "ignoring unknown slot"
                );
            }
        }

        report
    }

    /// Values readable straight from the opening utterance, without the
    /// generation service.
    pub fn seed(&self, capability: Capability, utterance: &str) -> SlotMap {
        let mut seeded = SlotMap::new();
        if capability == Capability::DecisionSupport {
            if let Some(options) = infer_options(utterance) {
                let value = SlotValue::List(options);
                let valid = SlotSchemaRegistry::definition(capability, names::OPTIONS)
                    .map(|definition| definition.validate(&value).is_ok())
                    .unwrap_or(false);
                if valid {
                    seeded.insert(names::OPTIONS.to_string(), value);
                }
            }
        }
        seeded
    }
}

fn json_shape(kind: SlotKind) -> &'static str {
    match kind {
        SlotKind::Text => "string",
        SlotKind::List => "array of strings",
        SlotKind::Competitors => "array of {\"name\": string, \"description\": string}",
        SlotKind::Weights => "object mapping factor name to an integer 1-10",
        SlotKind::FactorScores => {
            "object mapping option name to an object of factor name to integer 1-10"
        }
    }
}

/// "Should we raise a Series A or bootstrap?" gives ["raise a Series A", "bootstrap"].
pub fn infer_options(utterance: &str) -> Option<Vec<String>> {
    // ascii lowercasing keeps byte offsets aligned with the original text
    let lowered = utterance.to_ascii_lowercase();
    let (start, opener) = DECISION_OPENERS
        .iter()
        .filter_map(|opener| lowered.find(opener).map(|index| (index, *opener)))
        .min_by_key(|(index, _)| *index)?;

    let rest = &utterance[start + opener.len()..];
    let end = rest.find(['?', '.', '!', '\n']).unwrap_or(rest.len());
    let clause = &rest[..end];
    let lowered_clause = clause.to_ascii_lowercase();

    let separator = if opener.ends_with("between ") && !lowered_clause.contains(" or ") {
        " and "
    } else {
        " or "
    };

    let mut options = Vec::new();
    let mut cursor = 0;
    for (index, _) in lowered_clause.match_indices(separator) {
        options.push(&clause[cursor..index]);
        cursor = index + separator.len();
    }
    options.push(&clause[cursor..]);

    let options = options
        .into_iter()
        .flat_map(|part| part.split(','))
        .map(|part| part.trim().trim_start_matches("to ").trim())
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();

    (options.len() >= 2).then_some(options)
}

#[cfg(test)]
mod tests {
    use advisor_core::domain::capability::Capability;
    use advisor_core::domain::slot::{SlotMap, SlotValue};
    use advisor_core::slots::{names, SlotSchemaRegistry};
    use serde_json::json;

    use super::{infer_options, SlotExtractor};

    #[test]
    fn infers_options_from_should_we_question() {
        assert_eq!(
            infer_options("Should we raise a Series A or bootstrap?"),
            Some(vec!["raise a Series A".to_string(), "bootstrap".to_string()])
        );
        assert_eq!(
            infer_options("Help me decide between Postgres and MongoDB."),
            Some(vec!["Postgres".to_string(), "MongoDB".to_string()])
        );
        assert_eq!(infer_options("Should we hire a CTO?"), None);
        assert_eq!(infer_options("Who are our main competitors?"), None);
    }

    #[test]
    fn seeds_only_decision_options() {
        let extractor = SlotExtractor::new();
        let seeded =
            extractor.seed(Capability::DecisionSupport, "Should we raise a Series A or bootstrap?");
        assert!(matches!(
            seeded.get(names::OPTIONS),
            Some(SlotValue::List(items)) if items.len() == 2
        ));

        assert!(extractor
            .seed(Capability::CompetitorAnalysis, "Should we worry about Asana or Trello?")
            .is_empty());
    }

    #[test]
    fn prompt_lists_unfilled_slots_in_schema_order() {
        let extractor = SlotExtractor::new();
        let slots = SlotMap::new();
        let unfilled = SlotSchemaRegistry::unfilled(Capability::DecisionSupport, &slots);
        let prompt = extractor.prompt(
            Capability::DecisionSupport,
            Some("funding"),
            &unfilled,
            "speed matters",
        );

        let options = prompt.user.find("\"options\"").expect("options listed");
        let factors = prompt.user.find("\"decision_factors\"").expect("factors listed");
        assert!(options < factors);
        assert!(prompt.user.ends_with("speed matters"));
        assert!(prompt.system.contains("JSON object"));
    }

    #[test]
    fn parses_reply_wrapped_in_prose() {
        let extractor = SlotExtractor::new();
        let map = extractor.parse_reply("Sure! ```json\n{\"timeline\": \"Q3\"}\n```");
        assert_eq!(map.get("timeline"), Some(&json!("Q3")));
        assert!(extractor.parse_reply("no json here").is_empty());
        assert!(extractor.parse_reply("[1, 2]").is_empty());
    }

    #[test]
    fn invalid_value_is_rejected_without_overwriting_stored_value() {
        let extractor = SlotExtractor::new();
        let mut slots = SlotMap::new();
        slots.insert(
            names::OPTIONS.to_string(),
            SlotValue::List(vec!["Series A".to_string(), "Bootstrap".to_string()]),
        );

        let proposed = json!({
            "options": ["Series A"],
            "decision_factors": ["speed", "control"],
            "timeline": null,
            "favorite_color": "blue"
        });
        let proposed = proposed.as_object().expect("object");
        let report = extractor.merge(Capability::DecisionSupport, &mut slots, proposed);

        assert_eq!(report.accepted, vec![names::DECISION_FACTORS.to_string()]);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].slot, names::OPTIONS);
        assert_eq!(
            slots.get(names::OPTIONS),
            Some(&SlotValue::List(vec!["Series A".to_string(), "Bootstrap".to_string()]))
        );
        assert!(!slots.contains_key(names::TIMELINE));
        assert!(!slots.contains_key("favorite_color"));
    }

    #[test]
    fn out_of_range_weight_is_a_complaint() {
        let extractor = SlotExtractor::new();
        let mut slots = SlotMap::new();
        let proposed = json!({ "weights": { "speed": 11 } });
        let proposed = proposed.as_object().expect("object");
        let report = extractor.merge(Capability::DecisionSupport, &mut slots, proposed);

        assert!(report.accepted.is_empty());
        assert_eq!(report.rejected[0].slot, names::WEIGHTS);
        assert!(!slots.contains_key(names::WEIGHTS));
    }
}
