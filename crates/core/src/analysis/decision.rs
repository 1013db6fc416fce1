use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::domain::artifact::{
    DecisionFramework, DecisionRecommendation, DetailRequest, FactorWeight, MatrixCell,
    MatrixOutcome, MatrixRow, OptionAssessment, RiskLevel, WeightedMatrix,
};
use crate::domain::slot::SlotValue;
use crate::errors::DomainError;
use crate::slots::{names, ValidationError};

use super::AnalysisRequest;

/// Midpoint of the 1-10 scale, used for any score or weight nobody supplied.
pub const NEUTRAL_SCORE: Decimal = Decimal::from_parts(55, 0, 0, false, 1);

const HIGH_RISK_CEILING: u8 = 3;
const MEDIUM_RISK_CEILING: u8 = 6;

type Scores = BTreeMap<String, BTreeMap<String, u8>>;

pub(super) fn build_framework(
    request: &AnalysisRequest,
) -> Result<DecisionFramework, DomainError> {
    let options = request.list(names::OPTIONS);
    let factors = request.list(names::DECISION_FACTORS);
    let weights = request.slots().get(names::WEIGHTS).and_then(SlotValue::as_weights);
    let raw_scores =
        request.slots().get(names::FACTOR_SCORES).and_then(SlotValue::as_factor_scores);
    let scores = match raw_scores {
        Some(raw) => resolve_scores(raw, options, factors)?,
        None => Scores::new(),
    };

    let matrix = match weights {
        Some(weights) => {
            let resolved = resolve_weights(weights, factors)?;
            Some(weighted_matrix(options, &resolved, &scores))
        }
        None => None,
    };

    let assessments = options
        .iter()
        .enumerate()
        .map(|(index, option)| {
            let name = option.trim();
            OptionAssessment {
                name: name.to_string(),
                pros: DetailRequest::new(
                    format!("options.{index}.pros"),
                    format!("Advantages of choosing {name}"),
                    2,
                    4,
                ),
                cons: DetailRequest::new(
                    format!("options.{index}.cons"),
                    format!("Disadvantages of choosing {name}"),
                    2,
                    4,
                ),
                risk: risk_level(scores.get(name)),
                second_order_effects: DetailRequest::new(
                    format!("options.{index}.second_order_effects"),
                    format!("Downstream consequences of choosing {name}"),
                    1,
                    3,
                ),
                weighted_total: matrix
                    .as_ref()
                    .and_then(|matrix| matrix.rows.iter().find(|row| row.option == name))
                    .map(|row| row.total),
            }
        })
        .collect();

    let recommendation = match matrix.as_ref().map(|matrix| &matrix.outcome) {
        Some(MatrixOutcome::Winner { option, .. }) => {
            DecisionRecommendation::Weighted { option: option.clone() }
        }
        Some(MatrixOutcome::Tied { options, .. }) => {
            DecisionRecommendation::Tied { options: options.clone() }
        }
        None => DecisionRecommendation::Qualitative,
    };

    Ok(DecisionFramework {
        question: request.topic().map(ToString::to_string),
        options: assessments,
        factors: factors.iter().map(|factor| factor.trim().to_string()).collect(),
        matrix,
        timeline: request.text(names::TIMELINE).map(ToString::to_string),
        constraints: request.text(names::CONSTRAINTS).map(ToString::to_string),
        recommendation,
    })
}

/// Finds the declared entry matching `key`, ignoring case and surrounding space.
fn declared<'a>(entries: &'a [String], key: &str) -> Option<&'a str> {
    let key = key.trim();
    entries.iter().map(|entry| entry.trim()).find(|entry| entry.eq_ignore_ascii_case(key))
}

/// Weights keyed by declared factor name. Every declared factor gets a weight;
/// unweighted ones fall back to the neutral midpoint.
fn resolve_weights(
    weights: &BTreeMap<String, u8>,
    factors: &[String],
) -> Result<Vec<FactorWeight>, ValidationError> {
    let mut explicit = BTreeMap::new();
    for (factor, weight) in weights {
        let Some(name) = declared(factors, factor) else {
            return Err(ValidationError::new(
                names::WEIGHTS,
                format!("references undeclared factor `{}`", factor.trim()),
            ));
        };
        explicit.insert(name.to_string(), *weight);
    }

    Ok(factors
        .iter()
        .map(|factor| {
            let factor = factor.trim();
            match explicit.get(factor) {
                Some(weight) => FactorWeight {
                    factor: factor.to_string(),
                    weight: Decimal::from(*weight),
                    defaulted: false,
                },
                None => FactorWeight {
                    factor: factor.to_string(),
                    weight: NEUTRAL_SCORE,
                    defaulted: true,
                },
            }
        })
        .collect())
}

/// Re-keys elicited scores onto declared option and factor names.
fn resolve_scores(
    raw: &Scores,
    options: &[String],
    factors: &[String],
) -> Result<Scores, ValidationError> {
    let mut resolved = Scores::new();
    for (option, cells) in raw {
        let Some(option_name) = declared(options, option) else {
            return Err(ValidationError::new(
                names::FACTOR_SCORES,
                format!("scores undeclared option `{}`", option.trim()),
            ));
        };
        let entry = resolved.entry(option_name.to_string()).or_insert_with(BTreeMap::new);
        for (factor, score) in cells {
            let Some(factor_name) = declared(factors, factor) else {
                return Err(ValidationError::new(
                    names::FACTOR_SCORES,
                    format!("references undeclared factor `{}`", factor.trim()),
                ));
            };
            entry.insert(factor_name.to_string(), *score);
        }
    }
    Ok(resolved)
}

fn weighted_matrix(
    options: &[String],
    weights: &[FactorWeight],
    scores: &Scores,
) -> WeightedMatrix {
    let rows = options
        .iter()
        .map(|option| {
            let option = option.trim();
            let elicited = scores.get(option);
            let cells = weights
                .iter()
                .map(|weight| match elicited.and_then(|cells| cells.get(&weight.factor)) {
                    Some(score) => MatrixCell {
                        factor: weight.factor.clone(),
                        score: Decimal::from(*score),
                        defaulted: false,
                    },
                    None => MatrixCell {
                        factor: weight.factor.clone(),
                        score: NEUTRAL_SCORE,
                        defaulted: true,
                    },
                })
                .collect::<Vec<_>>();
            let total = cells
                .iter()
                .zip(weights)
                .map(|(cell, weight)| cell.score * weight.weight)
                .sum::<Decimal>();
            MatrixRow { option: option.to_string(), cells, total }
        })
        .collect::<Vec<_>>();

    let outcome = matrix_outcome(&rows);
    WeightedMatrix { factors: weights.to_vec(), rows, outcome }
}

/// The strictly highest total wins; equal top totals are reported, not broken.
fn matrix_outcome(rows: &[MatrixRow]) -> MatrixOutcome {
    let best = rows.iter().map(|row| row.total).max().unwrap_or(Decimal::ZERO);
    let leaders = rows
        .iter()
        .filter(|row| row.total == best)
        .map(|row| row.option.clone())
        .collect::<Vec<_>>();

    match leaders.as_slice() {
        [single] => MatrixOutcome::Winner { option: single.clone(), total: best },
        _ => MatrixOutcome::Tied { options: leaders, total: best },
    }
}

fn risk_level(scores: Option<&BTreeMap<String, u8>>) -> RiskLevel {
    match scores.and_then(|cells| cells.values().min().copied()) {
        Some(weakest) if weakest <= HIGH_RISK_CEILING => RiskLevel::High,
        Some(weakest) if weakest <= MEDIUM_RISK_CEILING => RiskLevel::Medium,
        Some(_) => RiskLevel::Low,
        None => RiskLevel::Medium,
    }
}
