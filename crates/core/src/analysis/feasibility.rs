use crate::domain::artifact::{
    DetailRequest, FeasibilityAssessment, MonetizationModel, MonetizationSignal, Rating, Verdict,
};
use crate::slots::names;

use super::{words, AnalysisRequest};

const SPECIFIC_CUSTOMER_WORDS: usize = 4;
const CLEAR_PROBLEM_WORDS: usize = 6;

/// Word prefixes that signal evidence of demand in the traction answer.
const TRACTION_STEMS: &[&str] = &[
    "user", "customer", "paying", "paid", "waitlist", "signup", "revenue", "pilot", "preorder",
    "subscriber", "beta",
];

/// Abbreviations that only count as whole words.
const TRACTION_WORDS: &[&str] = &["mrr", "arr", "loi", "lois"];

const TRACTION_PHRASES: &[&str] = &[" sign up", " pre order", " letters of intent"];

/// Words that void a clause when they appear among its opening words.
const NEGATIONS: &[&str] = &["no", "none", "nothing", "zero", "not", "n"];
const NEGATION_WINDOW: usize = 3;

struct ComplexityMarker {
    stem: &'static str,
    whole_word: bool,
    driver: &'static str,
}

const COMPLEXITY_MARKERS: &[ComplexityMarker] = &[
    ComplexityMarker { stem: "hardware", whole_word: false, driver: "physical hardware" },
    ComplexityMarker { stem: "device", whole_word: false, driver: "physical hardware" },
    ComplexityMarker {
        stem: "marketplace",
        whole_word: false,
        driver: "two-sided marketplace dynamics",
    },
    ComplexityMarker { stem: "regulat", whole_word: false, driver: "regulatory exposure" },
    ComplexityMarker { stem: "compliance", whole_word: false, driver: "regulatory exposure" },
    ComplexityMarker { stem: "medical", whole_word: false, driver: "medical or health data" },
    ComplexityMarker { stem: "healthcare", whole_word: false, driver: "medical or health data" },
    ComplexityMarker { stem: "ai", whole_word: true, driver: "AI/ML development" },
    ComplexityMarker { stem: "ml", whole_word: true, driver: "AI/ML development" },
    ComplexityMarker { stem: "machine", whole_word: true, driver: "AI/ML development" },
    ComplexityMarker { stem: "platform", whole_word: false, driver: "platform scope" },
    ComplexityMarker { stem: "fintech", whole_word: false, driver: "financial services" },
    ComplexityMarker { stem: "bank", whole_word: false, driver: "financial services" },
    ComplexityMarker { stem: "payments", whole_word: true, driver: "financial services" },
    ComplexityMarker {
        stem: "infrastructure",
        whole_word: false,
        driver: "infrastructure build-out",
    },
];

pub(super) fn build_assessment(request: &AnalysisRequest) -> FeasibilityAssessment {
    let target_customer = request.text(names::TARGET_CUSTOMER).unwrap_or_default().to_string();
    let problem = request.text(names::PROBLEM).unwrap_or_default().to_string();
    let monetization_text = request.text(names::MONETIZATION).unwrap_or_default();
    let go_to_market = request.text(names::GO_TO_MARKET).map(ToString::to_string);
    let traction = request.text(names::TRACTION).map(ToString::to_string);

    let signals = FitSignals {
        specific_customer: words(&target_customer).len() >= SPECIFIC_CUSTOMER_WORDS,
        clear_problem: words(&problem).len() >= CLEAR_PROBLEM_WORDS,
        traction: traction.as_deref().is_some_and(has_traction),
    };
    let market_fit = signals.rating();

    let complexity_source = [request.topic(), Some(problem.as_str()), go_to_market.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    let complexity_drivers = complexity_drivers(&complexity_source);
    let complexity = match complexity_drivers.len() {
        0 => Rating::Low,
        1 => Rating::Medium,
        _ => Rating::High,
    };

    let monetization = monetization_signal(monetization_text);
    let verdict = verdict(market_fit, complexity);
    let next_steps = next_steps(&signals, &monetization, &complexity_drivers, verdict);

    FeasibilityAssessment {
        idea: request.topic().map(ToString::to_string),
        target_customer,
        problem,
        market_fit,
        market_fit_reasons: signals.reasons(),
        complexity,
        complexity_drivers,
        monetization,
        go_to_market,
        traction,
        competitive_landscape: DetailRequest::new(
            "competitive_landscape",
            "Existing alternatives the target customer uses today and how crowded the space is",
            2,
            4,
        ),
        risks_and_upside: DetailRequest::new(
            "risks_and_upside",
            "Key risks and upside opportunities for this idea",
            2,
            4,
        ),
        verdict,
        next_steps,
    }
}

struct FitSignals {
    specific_customer: bool,
    clear_problem: bool,
    traction: bool,
}

impl FitSignals {
    fn rating(&self) -> Rating {
        let met = [self.specific_customer, self.clear_problem, self.traction];
        match met.iter().filter(|s| **s).count() {
            3 => Rating::High,
            2 => Rating::Medium,
            _ => Rating::Low,
        }
    }

    fn reasons(&self) -> Vec<String> {
        let mut reasons = Vec::with_capacity(3);
        reasons.push(if self.specific_customer {
            "Target customer is specific.".to_string()
        } else {
            "Target customer is broad; a narrower segment would sharpen the fit.".to_string()
        });
        reasons.push(if self.clear_problem {
            "Problem statement is concrete.".to_string()
        } else {
            "Problem statement is thin; the pain point needs more definition.".to_string()
        });
        reasons.push(if self.traction {
            "Early traction shows demand.".to_string()
        } else {
            "No traction or validation reported yet.".to_string()
        });
        reasons
    }
}

/// "Not yet, but 40 on the waitlist" counts; "no paying users yet" does not.
/// Each clause around a "but" is judged on its own.
fn has_traction(traction: &str) -> bool {
    let tokens = words(traction);
    tokens.split(|token| token == "but").any(clause_shows_traction)
}

fn clause_shows_traction(tokens: &[String]) -> bool {
    let negated = tokens
        .iter()
        .take(NEGATION_WINDOW)
        .any(|token| NEGATIONS.contains(&token.as_str()));
    if negated {
        return false;
    }

    let joined = format!(" {}", tokens.join(" "));
    tokens.iter().any(|token| {
        TRACTION_STEMS.iter().any(|stem| token.starts_with(stem))
            || TRACTION_WORDS.contains(&token.as_str())
            || token.chars().any(|ch| ch.is_ascii_digit())
    }) || TRACTION_PHRASES.iter().any(|phrase| joined.contains(phrase))
}

/// Distinct drivers in first-seen order.
fn complexity_drivers(text: &str) -> Vec<String> {
    let tokens = words(text);
    let mut drivers: Vec<String> = Vec::new();
    for marker in COMPLEXITY_MARKERS {
        let hit = tokens.iter().any(|token| {
            if marker.whole_word {
                token == marker.stem
            } else {
                token.starts_with(marker.stem)
            }
        });
        if hit && !drivers.iter().any(|driver| driver == marker.driver) {
            drivers.push(marker.driver.to_string());
        }
    }
    drivers
}

fn monetization_signal(statement: &str) -> MonetizationSignal {
    let lowered = format!(" {} ", statement.to_lowercase());
    let has = |markers: &[&str]| markers.iter().any(|marker| lowered.contains(marker));

    let model = if has(&["freemium", "free tier", "free plan"]) {
        MonetizationModel::Freemium
    } else if has(&[
        "subscription",
        "subscribe",
        "monthly",
        "per month",
        "/mo",
        "annual",
        "recurring",
        "saas",
    ]) {
        MonetizationModel::Subscription
    } else if has(&[
        "commission",
        "transaction",
        "take rate",
        "per order",
        "per booking",
        "fee per",
    ]) {
        MonetizationModel::Transactional
    } else if has(&["advertis", " ads ", "sponsor"]) {
        MonetizationModel::Advertising
    } else if has(&["one-time", "one time", "license", "per unit", "purchase"]) {
        MonetizationModel::OneTime
    } else {
        MonetizationModel::Unspecified
    };

    let explicit_pricing =
        statement.chars().any(|ch| ch.is_ascii_digit() || matches!(ch, '$' | '€' | '£'));

    MonetizationSignal { model, explicit_pricing, statement: statement.to_string() }
}

fn verdict(market_fit: Rating, complexity: Rating) -> Verdict {
    match (market_fit, complexity) {
        (Rating::High, Rating::Low | Rating::Medium) => Verdict::Go,
        (Rating::Low, Rating::High) => Verdict::NoGo,
        _ => Verdict::ConditionalGo,
    }
}

/// Concrete validation steps. A Conditional-Go always names at least one.
fn next_steps(
    signals: &FitSignals,
    monetization: &MonetizationSignal,
    complexity_drivers: &[String],
    verdict: Verdict,
) -> Vec<String> {
    let mut steps = Vec::new();

    if !signals.specific_customer {
        steps.push(
            "Interview 10 prospective customers to narrow down the target segment.".to_string(),
        );
    }
    if !signals.clear_problem {
        steps.push(
            "Write a one-sentence problem statement and confirm it with five target customers."
                .to_string(),
        );
    }
    if !signals.traction {
        steps.push("Run a landing-page or pre-order test to measure real demand.".to_string());
    }
    if !monetization.explicit_pricing {
        steps.push(
            "Put a concrete price point in front of prospects and track conversion.".to_string(),
        );
    }
    if complexity_drivers.len() > 1 {
        steps.push(format!(
            "Scope a first version that defers {}.",
            complexity_drivers.join(" and ")
        ));
    }

    match verdict {
        Verdict::Go => steps.push(
            "Commit to a 90-day launch plan with a measurable traction target.".to_string(),
        ),
        Verdict::NoGo => steps.push(
            "Revisit the customer and problem definition before investing further.".to_string(),
        ),
        Verdict::ConditionalGo if steps.is_empty() => steps.push(
            "Validate willingness to pay with a small paid pilot before building further."
                .to_string(),
        ),
        Verdict::ConditionalGo => {}
    }

    steps
}

#[cfg(test)]
mod tests {
    use crate::analysis::fixtures::{feasibility_slots, text};
    use crate::analysis::AnalysisRequest;
    use crate::domain::artifact::{MonetizationModel, Rating, Verdict};
    use crate::domain::capability::Capability;
    use crate::domain::slot::SlotMap;
    use crate::slots::names;

    use super::{build_assessment, has_traction};

    fn request(topic: &str, slots: SlotMap) -> AnalysisRequest {
        AnalysisRequest::new(Capability::FeasibilityEvaluation, Some(topic.to_string()), slots)
            .expect("complete request")
    }

    #[test]
    fn meal_prep_without_traction_is_conditional_go_with_named_steps() {
        let assessment = build_assessment(&request(
            "I'm thinking of launching a meal-prep subscription",
            feasibility_slots(
                "busy parents with young kids",
                "they have no time to plan and cook healthy dinners",
                "$49 per month subscription",
            ),
        ));

        assert_eq!(assessment.market_fit, Rating::Medium);
        assert_eq!(assessment.complexity, Rating::Low);
        assert_eq!(assessment.verdict, Verdict::ConditionalGo);
        assert!(!assessment.next_steps.is_empty());
        assert_eq!(assessment.monetization.model, MonetizationModel::Subscription);
        assert!(assessment.monetization.explicit_pricing);
    }

    #[test]
    fn specific_customer_clear_problem_and_traction_with_low_complexity_is_go() {
        let mut slots = feasibility_slots(
            "independent yoga studio owners in the US",
            "they lose hours each week reconciling class bookings by hand",
            "$29/mo per studio",
        );
        slots.insert(names::TRACTION.to_string(), text("12 paying studios in a pilot"));

        let assessment = build_assessment(&request("booking tool for yoga studios", slots));

        assert_eq!(assessment.market_fit, Rating::High);
        assert_eq!(assessment.verdict, Verdict::Go);
    }

    #[test]
    fn vague_idea_with_heavy_complexity_is_no_go() {
        let assessment = build_assessment(&request(
            "AI hardware marketplace for medical devices",
            feasibility_slots("everyone", "things are hard", "not sure"),
        ));

        assert_eq!(assessment.market_fit, Rating::Low);
        assert_eq!(assessment.complexity, Rating::High);
        assert_eq!(assessment.verdict, Verdict::NoGo);
        assert!(assessment.complexity_drivers.contains(&"physical hardware".to_string()));
        assert_eq!(assessment.monetization.model, MonetizationModel::Unspecified);
        assert!(!assessment.monetization.explicit_pricing);
    }

    #[test]
    fn every_conditional_go_names_a_validation_step() {
        let cases = [
            (
                "platform for banks",
                "treasury teams at regional banks in Europe",
                "they cannot forecast liquidity across many ledgers quickly",
                "$2,000 per month",
            ),
            ("simple app", "parents", "meal planning", "ads"),
            (
                "dog walking",
                "dog owners in downtown Austin",
                "walkers cancel at the last minute and owners scramble",
                "15% commission per walk",
            ),
        ];

        for (topic, customer, problem, monetization) in cases {
            let slots = feasibility_slots(customer, problem, monetization);
            let assessment = build_assessment(&request(topic, slots));
            if assessment.verdict == Verdict::ConditionalGo {
                assert!(
                    !assessment.next_steps.is_empty(),
                    "conditional go for `{topic}` needs steps"
                );
            }
        }
    }

    #[test]
    fn ai_marker_matches_whole_words_only() {
        let assessment = build_assessment(&request(
            "email tool",
            feasibility_slots(
                "sales teams at mid-size agencies",
                "they fail to maintain follow-ups with prospects in their pipeline",
                "subscription",
            ),
        ));
        assert!(assessment.complexity_drivers.is_empty(), "`maintain` must not count as AI");
        assert_eq!(assessment.complexity, Rating::Low);
    }

    #[test]
    fn negative_traction_answer_is_not_a_signal() {
        let mut slots = feasibility_slots(
            "independent yoga studio owners in the US",
            "they lose hours each week reconciling class bookings by hand",
            "$29/mo",
        );
        slots.insert(names::TRACTION.to_string(), text("None yet, no users"));

        let assessment = build_assessment(&request("booking tool", slots));
        assert_eq!(assessment.market_fit, Rating::Medium);
    }

    #[test]
    fn negated_traction_mentioning_paying_users_does_not_lift_the_verdict() {
        let mut slots = feasibility_slots(
            "independent yoga studio owners in the US",
            "they lose hours each week reconciling class bookings by hand",
            "$29/mo per studio",
        );
        slots.insert(names::TRACTION.to_string(), text("no paying users yet"));

        let assessment = build_assessment(&request("booking tool for yoga studios", slots));
        assert_eq!(assessment.market_fit, Rating::Medium);
        assert_eq!(assessment.verdict, Verdict::ConditionalGo);
    }

    #[test]
    fn traction_words_are_matched_by_word_not_substring() {
        assert!(has_traction("nonetheless 40 signups"));
        assert!(has_traction("Not yet, but 40 people on the waitlist"));
        assert!(has_traction("$3k MRR from two design partners"));
        assert!(!has_traction("no paying users yet"));
        assert!(!has_traction("N/A"));
        assert!(!has_traction("we carry no inventory"));
        assert!(!has_traction("nothing yet"));
    }
}
