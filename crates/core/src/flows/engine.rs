use thiserror::Error;
use tracing::debug;

use crate::flows::states::{
    IntakeAction, IntakeContext, IntakeEvent, IntakeState, TransitionOutcome,
};

pub trait IntakeDefinition {
    fn initial_state(&self) -> IntakeState;
    fn transition(
        &self,
        current: &IntakeState,
        event: &IntakeEvent,
        context: &IntakeContext,
    ) -> Result<TransitionOutcome, IntakeTransitionError>;
}

/// Slot-filling intake shared by all three capabilities.
#[derive(Clone, Debug, Default)]
pub struct SlotFillingIntake;

impl IntakeDefinition for SlotFillingIntake {
    fn initial_state(&self) -> IntakeState {
        IntakeState::Unclassified
    }

    fn transition(
        &self,
        current: &IntakeState,
        event: &IntakeEvent,
        context: &IntakeContext,
    ) -> Result<TransitionOutcome, IntakeTransitionError> {
        transition_slot_filling(current, event, context)
    }
}

pub struct IntakeEngine<F> {
    intake: F,
}

impl<F> IntakeEngine<F>
where
    F: IntakeDefinition,
{
    pub fn new(intake: F) -> Self {
        Self { intake }
    }

    pub fn initial_state(&self) -> IntakeState {
        self.intake.initial_state()
    }

    pub fn apply(
        &self,
        current: &IntakeState,
        event: &IntakeEvent,
        context: &IntakeContext,
    ) -> Result<TransitionOutcome, IntakeTransitionError> {
        let result = self.intake.transition(current, event, context);
        match &result {
            Ok(outcome) => debug!(
                event_name = "intake.transition_applied",
                from = outcome.from.label(),
                to = outcome.to.label(),
                event = ?outcome.event,
                "intake transition applied"
            ),
            Err(error) => debug!(
                event_name = "intake.transition_rejected",
                error = %error,
                "intake transition rejected"
            ),
        }
        result
    }
}

impl Default for IntakeEngine<SlotFillingIntake> {
    fn default() -> Self {
        Self::new(SlotFillingIntake)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IntakeTransitionError {
    #[error("missing required slots before transition from {state:?}: {missing_slots:?}")]
    MissingRequiredSlots { state: IntakeState, missing_slots: Vec<String> },
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: IntakeState, event: IntakeEvent },
}

fn transition_slot_filling(
    current: &IntakeState,
    event: &IntakeEvent,
    context: &IntakeContext,
) -> Result<TransitionOutcome, IntakeTransitionError> {
    use IntakeAction::{
        BuildAnalysis, ExtractSlots, OfferOptionalSlots, PromptForCapability,
        PromptForMissingSlots, RedirectOutOfScope, ResetSlots, SynthesizeProse,
    };
    use IntakeEvent::{
        AmbiguityDetected, AnalysisRequested, Classified, OutOfScopeDetected, Redirected,
        SlotsUpdated, TopicClosed,
    };
    use IntakeState::{Analyzed, Clarifying, Ready, Unclassified};

    let complete = context.missing_required_slots.is_empty();

    let (to, actions) = match (current, event) {
        (Unclassified, Classified(capability)) => (Clarifying(*capability), vec![ExtractSlots]),
        (Unclassified, AmbiguityDetected) => (Unclassified, vec![PromptForCapability]),
        (Unclassified, OutOfScopeDetected) => (Unclassified, vec![RedirectOutOfScope]),
        (Clarifying(capability), SlotsUpdated) if complete => {
            (Ready(*capability), vec![OfferOptionalSlots])
        }
        (Clarifying(capability), SlotsUpdated) => {
            (Clarifying(*capability), vec![PromptForMissingSlots])
        }
        (Ready(capability), SlotsUpdated) if complete => (Ready(*capability), Vec::new()),
        (Ready(capability), SlotsUpdated) => {
            (Clarifying(*capability), vec![PromptForMissingSlots])
        }
        (Ready(capability), AnalysisRequested) if complete => {
            (Analyzed(*capability), vec![BuildAnalysis, SynthesizeProse])
        }
        (Clarifying(_), AnalysisRequested) | (Ready(_), AnalysisRequested) => {
            return Err(IntakeTransitionError::MissingRequiredSlots {
                state: *current,
                missing_slots: context.missing_required_slots.clone(),
            });
        }
        (Clarifying(_), Redirected) | (Ready(_), Redirected) | (Analyzed(_), Redirected) => {
            (Unclassified, vec![ResetSlots])
        }
        (Analyzed(_), TopicClosed) => (Unclassified, vec![ResetSlots]),
        _ => {
            return Err(IntakeTransitionError::InvalidTransition {
                state: *current,
                event: event.clone(),
            });
        }
    };

    Ok(TransitionOutcome { from: *current, to, event: event.clone(), actions })
}

#[cfg(test)]
mod tests {
    use crate::domain::capability::Capability;
    use crate::flows::engine::{
        IntakeDefinition, IntakeEngine, IntakeTransitionError, SlotFillingIntake,
    };
    use crate::flows::states::{IntakeAction, IntakeContext, IntakeEvent, IntakeState};

    #[test]
    fn intake_happy_path_reaches_analyzed() {
        let engine = IntakeEngine::new(SlotFillingIntake);
        let complete = IntakeContext::default();
        let mut state = engine.initial_state();

        state = engine
            .apply(&state, &IntakeEvent::Classified(Capability::DecisionSupport), &complete)
            .expect("unclassified -> clarifying")
            .to;
        assert_eq!(state, IntakeState::Clarifying(Capability::DecisionSupport));

        let ready = engine
            .apply(&state, &IntakeEvent::SlotsUpdated, &complete)
            .expect("clarifying -> ready");
        assert_eq!(ready.to, IntakeState::Ready(Capability::DecisionSupport));
        assert_eq!(ready.actions, vec![IntakeAction::OfferOptionalSlots]);

        let analyzed = engine
            .apply(&ready.to, &IntakeEvent::AnalysisRequested, &complete)
            .expect("ready -> analyzed");
        assert_eq!(analyzed.to, IntakeState::Analyzed(Capability::DecisionSupport));
        assert!(analyzed.actions.contains(&IntakeAction::BuildAnalysis));
    }

    #[test]
    fn missing_slots_keep_intake_clarifying() {
        let engine = IntakeEngine::default();
        let outcome = engine
            .apply(
                &IntakeState::Clarifying(Capability::CompetitorAnalysis),
                &IntakeEvent::SlotsUpdated,
                &IntakeContext::with_missing(["competitors"]),
            )
            .expect("self transition");

        assert_eq!(outcome.to, IntakeState::Clarifying(Capability::CompetitorAnalysis));
        assert_eq!(outcome.actions, vec![IntakeAction::PromptForMissingSlots]);
    }

    #[test]
    fn analysis_request_with_missing_slots_is_rejected() {
        let engine = IntakeEngine::default();
        let error = engine
            .apply(
                &IntakeState::Clarifying(Capability::FeasibilityEvaluation),
                &IntakeEvent::AnalysisRequested,
                &IntakeContext::with_missing(["problem", "monetization"]),
            )
            .expect_err("must reject missing slots");

        assert_eq!(
            error,
            IntakeTransitionError::MissingRequiredSlots {
                state: IntakeState::Clarifying(Capability::FeasibilityEvaluation),
                missing_slots: vec!["problem".to_string(), "monetization".to_string()],
            }
        );
    }

    #[test]
    fn ambiguous_and_out_of_scope_stay_unclassified() {
        let engine = IntakeEngine::default();
        let context = IntakeContext::default();

        let ambiguous = engine
            .apply(&IntakeState::Unclassified, &IntakeEvent::AmbiguityDetected, &context)
            .expect("ambiguity loops");
        assert_eq!(ambiguous.to, IntakeState::Unclassified);
        assert_eq!(ambiguous.actions, vec![IntakeAction::PromptForCapability]);

        let out_of_scope = engine
            .apply(&IntakeState::Unclassified, &IntakeEvent::OutOfScopeDetected, &context)
            .expect("out of scope loops");
        assert_eq!(out_of_scope.actions, vec![IntakeAction::RedirectOutOfScope]);
    }

    #[test]
    fn redirect_abandons_clarifying() {
        let engine = IntakeEngine::default();
        let outcome = engine
            .apply(
                &IntakeState::Clarifying(Capability::DecisionSupport),
                &IntakeEvent::Redirected,
                &IntakeContext::with_missing(["options"]),
            )
            .expect("redirect is always allowed mid-intake");
        assert_eq!(outcome.to, IntakeState::Unclassified);
        assert_eq!(outcome.actions, vec![IntakeAction::ResetSlots]);
    }

    #[test]
    fn analyzed_topic_can_only_close_or_redirect() {
        let engine = IntakeEngine::default();
        let analyzed = IntakeState::Analyzed(Capability::CompetitorAnalysis);
        let context = IntakeContext::default();

        assert_eq!(
            engine.apply(&analyzed, &IntakeEvent::TopicClosed, &context).expect("close").to,
            IntakeState::Unclassified
        );
        assert!(matches!(
            engine.apply(&analyzed, &IntakeEvent::SlotsUpdated, &context),
            Err(IntakeTransitionError::InvalidTransition { .. })
        ));
        assert!(matches!(
            engine.apply(&analyzed, &IntakeEvent::AnalysisRequested, &context),
            Err(IntakeTransitionError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn classification_is_rejected_once_committed() {
        let engine = IntakeEngine::default();
        let error = engine
            .apply(
                &IntakeState::Clarifying(Capability::DecisionSupport),
                &IntakeEvent::Classified(Capability::CompetitorAnalysis),
                &IntakeContext::default(),
            )
            .expect_err("cannot interleave capabilities");
        assert!(matches!(error, IntakeTransitionError::InvalidTransition { .. }));
    }

    #[test]
    fn replay_is_deterministic_for_same_event_sequence() {
        let engine = IntakeEngine::default();
        let events = [
            IntakeEvent::Classified(Capability::FeasibilityEvaluation),
            IntakeEvent::SlotsUpdated,
            IntakeEvent::AnalysisRequested,
            IntakeEvent::TopicClosed,
        ];

        let run = |engine: &IntakeEngine<SlotFillingIntake>| {
            let mut state = engine.initial_state();
            let mut actions = Vec::new();
            for event in &events {
                let outcome = engine
                    .apply(&state, event, &IntakeContext::default())
                    .expect("deterministic run");
                actions.push(outcome.actions);
                state = outcome.to;
            }
            (state, actions)
        };

        assert_eq!(run(&engine), run(&engine));
        assert_eq!(SlotFillingIntake.initial_state(), IntakeState::Unclassified);
    }
}
