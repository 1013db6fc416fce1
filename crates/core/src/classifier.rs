//! Capability Classifier
//!
//! Maps an utterance, plus the capability a session already committed to, onto
//! one of the three advisory capabilities. Classification is sticky: once a
//! session is working on a capability, only an explicit redirect reopens it.

use crate::domain::capability::{Capability, Classification};

const STRONG: u8 = 2;
const WEAK: u8 = 1;

struct Trigger {
    pattern: &'static str,
    weight: u8,
}

const fn strong(pattern: &'static str) -> Trigger {
    Trigger { pattern, weight: STRONG }
}

const fn weak(pattern: &'static str) -> Trigger {
    Trigger { pattern, weight: WEAK }
}

const COMPETITOR_TRIGGERS: &[Trigger] = &[
    strong("competitor"),
    strong("competition"),
    strong("competitive"),
    strong("rival"),
    weak("market landscape"),
    weak("alternatives to"),
    weak("compare us"),
];

const DECISION_TRIGGERS: &[Trigger] = &[
    strong("should we"),
    strong("should i"),
    strong("decision support"),
    strong("choose between"),
    strong("decide between"),
    weak(" or "),
    weak("decide"),
    weak("decision"),
    weak(" versus "),
    weak(" vs "),
    weak("trade-off"),
    weak("tradeoff"),
];

const FEASIBILITY_TRIGGERS: &[Trigger] = &[
    strong("launching"),
    strong("building"),
    strong("feasibility"),
    strong("feasible"),
    strong("idea"),
    weak("launch"),
    weak("build a"),
    weak("startup"),
    weak("thinking of starting"),
    weak("side project"),
];

/// Phrases that drop the current topic wherever they appear.
const RESET_MARKERS: &[&str] = &[
    " new topic ",
    " different topic ",
    " change topic ",
    " change of topic ",
    " change the subject ",
    " start over ",
    " start again ",
];

/// Phrases that drop the current topic only when they open the utterance.
const LEADING_RESET_MARKERS: &[&str] = &[" never mind ", " nevermind ", " forget it "];

/// Openers tolerated before a leading reset marker.
const FILLERS: &[&str] = &["actually", "ok", "okay", "oh", "wait", "sorry", "hmm", "no", "um"];

/// Phrases asking to move elsewhere; they redirect only when the utterance
/// names a capability other than the committed one.
const SWITCH_MARKERS: &[&str] = &[
    " let's talk about ",
    " lets talk about ",
    " let us talk about ",
    " can we talk about ",
    " rather talk about ",
    " rather discuss ",
    " switch to ",
    " switching to ",
];

const ORDINALS: &[(&str, usize)] = &[
    ("1", 1),
    ("first", 1),
    ("2", 2),
    ("two", 2),
    ("second", 2),
    ("3", 3),
    ("three", 3),
    ("third", 3),
];

/// How an utterance leaves a committed capability.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Redirect {
    /// "new topic", "start over": the next capability is open again.
    Reset,
    /// "let's talk about competitors": moves to a capability other than the committed one.
    Switch,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CapabilityClassifier;

impl CapabilityClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, committed: Option<Capability>, utterance: &str) -> Classification {
        let normalized = normalize(utterance);

        let mut excluded = None;
        if let Some(capability) = committed {
            match detect_redirect(capability, &normalized) {
                None => return Classification::Capability(capability),
                Some(Redirect::Switch) => excluded = Some(capability),
                Some(Redirect::Reset) => {}
            }
        }

        let mut scored = Capability::ALL
            .into_iter()
            .filter(|capability| Some(*capability) != excluded)
            .map(|capability| (capability, score(triggers_for(capability), &normalized)))
            .filter(|(_, score)| *score > 0)
            .collect::<Vec<_>>();
        scored.sort_by(|left, right| right.1.cmp(&left.1).then(left.0.cmp(&right.0)));

        match scored.as_slice() {
            [] if committed.is_some() => {
                Classification::Ambiguous { candidates: Capability::ALL.to_vec() }
            }
            [] => Classification::OutOfScope,
            [(capability, _)] => Classification::Capability(*capability),
            [(best, best_score), rest @ ..] => {
                let comparable = rest
                    .iter()
                    .filter(|(_, score)| u16::from(*score) * 2 >= u16::from(*best_score))
                    .map(|(capability, _)| *capability)
                    .collect::<Vec<_>>();
                if comparable.is_empty() {
                    Classification::Capability(*best)
                } else {
                    let mut candidates = vec![*best];
                    candidates.extend(comparable);
                    Classification::Ambiguous { candidates }
                }
            }
        }
    }

    /// Whether `utterance` leaves `committed`. Slot answers mentioning "instead"
    /// or "switch to" stay put unless they name another capability.
    pub fn redirect(&self, committed: Capability, utterance: &str) -> Option<Redirect> {
        detect_redirect(committed, &normalize(utterance))
    }

    pub fn is_redirect(&self, committed: Capability, utterance: &str) -> bool {
        self.redirect(committed, utterance).is_some()
    }

    /// Resolves a reply to a capability-choice prompt against the offered
    /// candidates: a list number or ordinal, a capability label, or a reply
    /// whose triggers point at exactly one candidate.
    pub fn resolve_choice(&self, candidates: &[Capability], reply: &str) -> Option<Capability> {
        let normalized = normalize(reply);
        let words = normalized.split_whitespace().collect::<Vec<_>>();

        let mut picked = words
            .iter()
            .map(|word| word.trim_end_matches('.'))
            .filter_map(|word| ORDINALS.iter().find(|(token, _)| *token == word))
            .map(|(_, position)| *position)
            .collect::<Vec<_>>();
        picked.sort_unstable();
        picked.dedup();
        if let [position] = picked.as_slice() {
            return candidates.get(position - 1).copied();
        }

        if let Some(capability) = candidates
            .iter()
            .find(|capability| normalized.contains(&normalize(capability.label())))
        {
            return Some(*capability);
        }

        let mut scored = candidates
            .iter()
            .map(|capability| (*capability, score(triggers_for(*capability), &normalized)))
            .filter(|(_, score)| *score > 0)
            .collect::<Vec<_>>();
        scored.sort_by(|left, right| right.1.cmp(&left.1));
        match scored.as_slice() {
            [(only, _)] => Some(*only),
            [(best, best_score), (_, next_score), ..] if best_score > next_score => Some(*best),
            _ => None,
        }
    }
}

fn triggers_for(capability: Capability) -> &'static [Trigger] {
    match capability {
        Capability::CompetitorAnalysis => COMPETITOR_TRIGGERS,
        Capability::DecisionSupport => DECISION_TRIGGERS,
        Capability::FeasibilityEvaluation => FEASIBILITY_TRIGGERS,
    }
}

fn score(triggers: &[Trigger], normalized: &str) -> u8 {
    triggers
        .iter()
        .filter(|trigger| normalized.contains(trigger.pattern))
        .map(|trigger| trigger.weight)
        .fold(0u8, u8::saturating_add)
}

fn detect_redirect(committed: Capability, normalized: &str) -> Option<Redirect> {
    if RESET_MARKERS.iter().any(|marker| normalized.contains(marker)) || leading_reset(normalized) {
        return Some(Redirect::Reset);
    }

    if !SWITCH_MARKERS.iter().any(|marker| normalized.contains(marker)) {
        return None;
    }
    let current = score(triggers_for(committed), normalized);
    Capability::ALL
        .into_iter()
        .filter(|capability| *capability != committed)
        .any(|capability| score(triggers_for(capability), normalized) > current)
        .then_some(Redirect::Switch)
}

fn leading_reset(normalized: &str) -> bool {
    let mut rest = normalized.trim_start();
    while let Some(filler) = FILLERS.iter().find(|filler| {
        rest.strip_prefix(**filler).is_some_and(|tail| tail.starts_with(' '))
    }) {
        rest = &rest[filler.len()..];
        rest = rest.trim_start();
    }
    let padded = format!(" {rest}");
    LEADING_RESET_MARKERS.iter().any(|marker| padded.starts_with(marker))
}

/// Lowercases, folds curly apostrophes and pads with spaces so word-boundary
/// triggers like `" or "` also match at either end.
fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase().replace(['\u{2019}', '\u{2018}'], "'");
    let spaced = lowered
        .chars()
        .map(|ch| if ch.is_alphanumeric() || matches!(ch, '\'' | '-') { ch } else { ' ' })
        .collect::<String>();
    format!(" {} ", spaced.split_whitespace().collect::<Vec<_>>().join(" "))
}
