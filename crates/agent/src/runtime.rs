use std::sync::Arc;

use advisor_core::config::IntakeConfig;
use advisor_core::domain::artifact::AnalysisArtifact;
use advisor_core::domain::capability::{Capability, Classification};
use advisor_core::domain::session::{Session, SessionId};
use advisor_core::errors::{ApplicationError, DomainError};
use advisor_core::flows::{
    IntakeAction, IntakeContext, IntakeEngine, IntakeEvent, IntakeState, SlotFillingIntake,
    TransitionOutcome,
};
use advisor_core::format::{FormattedResponse, ResponseFormatter};
use advisor_core::slots::{SlotSchemaRegistry, ValidationError};
use advisor_core::store::ConversationStore;
use advisor_core::{AnalysisBuilder, AnalysisRequest, CapabilityClassifier};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::extraction::SlotExtractor;
use crate::llm::{LlmClient, PromptPurpose, PromptSpec};
use crate::synthesis::ProseSynthesizer;

/// Result of one user turn. `validation_errors` lists values rejected this
/// turn; the reply already repeats them to the user.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TurnOutcome {
    pub session_id: SessionId,
    pub reply: FormattedResponse,
    pub state: IntakeState,
    pub validation_errors: Vec<ValidationError>,
    pub artifact: Option<AnalysisArtifact>,
}

pub struct AdvisorRuntime {
    llm: Arc<dyn LlmClient>,
    store: Arc<dyn ConversationStore>,
    classifier: CapabilityClassifier,
    engine: IntakeEngine<SlotFillingIntake>,
    builder: AnalysisBuilder,
    formatter: ResponseFormatter,
    extractor: SlotExtractor,
    synthesizer: ProseSynthesizer,
    offer_optional_slots: bool,
}

impl AdvisorRuntime {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        store: Arc<dyn ConversationStore>,
        intake: &IntakeConfig,
    ) -> Self {
        Self {
            llm,
            store,
            classifier: CapabilityClassifier::new(),
            engine: IntakeEngine::default(),
            builder: AnalysisBuilder::new(),
            formatter: ResponseFormatter::new(),
            extractor: SlotExtractor::new(),
            synthesizer: ProseSynthesizer::new(),
            offer_optional_slots: intake.offer_optional_slots,
        }
    }

    /// Runs one user turn against the stored session. The session is only
    /// written back once the whole turn succeeded, so a failed generation call
    /// leaves it exactly as it was.
    pub async fn handle_turn(
        &self,
        session_id: &SessionId,
        utterance: &str,
    ) -> Result<TurnOutcome, ApplicationError> {
        let mut session =
            self.store.load(session_id).await?.unwrap_or_else(|| Session::new(session_id.clone()));
        let correlation_id = format!("{session_id}:{}", session.history.len());
        session.record_user_turn(utterance);

        let mut redirected_from = None;
        match session.state {
            IntakeState::Analyzed(_) => {
                self.transition(&mut session, IntakeEvent::TopicClosed, IntakeContext::default())?;
            }
            IntakeState::Clarifying(capability) | IntakeState::Ready(capability)
                if self.classifier.is_redirect(capability, utterance) =>
            {
                self.transition(&mut session, IntakeEvent::Redirected, IntakeContext::default())?;
                redirected_from = Some(capability);
            }
            _ => {}
        }

        // a pick from a capability-choice prompt carries no content of its own;
        // slots are extracted from the request that prompted the choice
        let mut source = utterance.trim().to_string();
        if session.state == IntakeState::Unclassified {
            let pending = std::mem::take(&mut session.pending_choice);
            let picked = match pending.as_slice() {
                [] => None,
                candidates => self.classifier.resolve_choice(candidates, utterance),
            };
            let classification = match picked {
                Some(capability) => Classification::Capability(capability),
                None => {
                    session.topic = None;
                    self.classifier.classify(redirected_from, utterance)
                }
            };

            match classification {
                Classification::Ambiguous { candidates } => {
                    self.transition(
                        &mut session,
                        IntakeEvent::AmbiguityDetected,
                        IntakeContext::default(),
                    )?;
                    session.topic = Some(source);
                    session.pending_choice = candidates.clone();
                    let reply = self.formatter.capability_choice(&candidates);
                    return self.finish(session, reply, Vec::new(), None, &correlation_id).await;
                }
                Classification::OutOfScope => {
                    self.transition(
                        &mut session,
                        IntakeEvent::OutOfScopeDetected,
                        IntakeContext::default(),
                    )?;
                    let reply = self.formatter.out_of_scope();
                    return self.finish(session, reply, Vec::new(), None, &correlation_id).await;
                }
                Classification::Capability(capability) => {
                    let topic = session.topic.take();
                    self.transition(
                        &mut session,
                        IntakeEvent::Classified(capability),
                        IntakeContext::default(),
                    )?;
                    if let Some(topic) = topic.filter(|_| picked.is_some()) {
                        source = topic;
                    }
                    session.topic = Some(source.clone());
                    let seeded = self.extractor.seed(capability, &source);
                    session.slots.extend(seeded);
                }
            }
        }

        let Some(capability) = session.committed_capability() else {
            return Err(DomainError::InvariantViolation(format!(
                "session `{session_id}` has no capability after classification"
            ))
            .into());
        };

        let complaints =
            self.extract_slots(&mut session, capability, &source, &correlation_id).await?;

        let missing = SlotSchemaRegistry::missing_required(capability, &session.slots);
        self.transition(
            &mut session,
            IntakeEvent::SlotsUpdated,
            IntakeContext::with_missing(missing.iter().map(|definition| definition.name)),
        )?;

        if matches!(session.state, IntakeState::Clarifying(_)) {
            let reply = self.formatter.clarification(capability, &missing, &complaints);
            return self.finish(session, reply, complaints, None, &correlation_id).await;
        }

        // a rejected value is always asked again, even after the one-time offer
        let optional = SlotSchemaRegistry::missing_optional(capability, &session.slots);
        let offer = !complaints.is_empty()
            || (self.offer_optional_slots && !session.optional_offered && !optional.is_empty());
        if offer {
            session.optional_offered = true;
            let reply = self.formatter.optional_offer(capability, &optional, &complaints);
            return self.finish(session, reply, complaints, None, &correlation_id).await;
        }

        self.analyze(session, capability, &correlation_id).await
    }

    async fn analyze(
        &self,
        mut session: Session,
        capability: Capability,
        correlation_id: &str,
    ) -> Result<TurnOutcome, ApplicationError> {
        let outcome = self
            .engine
            .apply(&session.state, &IntakeEvent::AnalysisRequested, &IntakeContext::default())
            .map_err(DomainError::from)?;

        let request =
            AnalysisRequest::new(capability, session.topic.clone(), session.slots.clone())?;
        let artifact = match self.builder.build(&request) {
            Ok(artifact) => artifact,
            Err(DomainError::Validation(error)) => {
                // the value was fine alone but contradicts another slot; drop it and ask again
                warn!(
                    event_name = "advisor.late_validation_failed",
                    session_id = %session.id,
                    correlation_id,
                    slot = error.slot.as_str(),
                    "slot rejected while building analysis"
                );
                session.slots.remove(&error.slot);
                let complaints = vec![error];
                let missing = SlotSchemaRegistry::missing_required(capability, &session.slots);
                self.transition(
                    &mut session,
                    IntakeEvent::SlotsUpdated,
                    IntakeContext::with_missing(missing.iter().map(|definition| definition.name)),
                )?;
                let reply = if missing.is_empty() {
                    session.optional_offered = true;
                    let optional = SlotSchemaRegistry::missing_optional(capability, &session.slots);
                    self.formatter.optional_offer(capability, &optional, &complaints)
                } else {
                    self.formatter.clarification(capability, &missing, &complaints)
                };
                return self.finish(session, reply, complaints, None, correlation_id).await;
            }
            Err(error) => return Err(error.into()),
        };

        let prompt = self.synthesizer.prompt(&artifact, request.topic());
        let raw = self.generate(&prompt, &session.id, correlation_id).await?;
        let synthesis = self.synthesizer.parse_reply(&raw);
        let reply = self.formatter.analysis(&artifact, &synthesis);

        session.state = outcome.to;
        self.finish(session, reply, Vec::new(), Some(artifact), correlation_id).await
    }

    async fn extract_slots(
        &self,
        session: &mut Session,
        capability: Capability,
        utterance: &str,
        correlation_id: &str,
    ) -> Result<Vec<ValidationError>, ApplicationError> {
        let unfilled = SlotSchemaRegistry::unfilled(capability, &session.slots);
        if unfilled.is_empty() {
            return Ok(Vec::new());
        }

        let prompt =
            self.extractor.prompt(capability, session.topic.as_deref(), &unfilled, utterance);
        let raw = self.generate(&prompt, &session.id, correlation_id).await?;
        let proposed = self.extractor.parse_reply(&raw);
        let report = self.extractor.merge(capability, &mut session.slots, &proposed);

        debug!(
            event_name = "advisor.slots_extracted",
            session_id = %session.id,
            correlation_id,
            accepted = ?report.accepted,
            rejected = report.rejected.len(),
            "slot extraction merged"
        );
        Ok(report.rejected)
    }

    async fn generate(
        &self,
        prompt: &PromptSpec,
        session_id: &SessionId,
        correlation_id: &str,
    ) -> Result<String, ApplicationError> {
        self.llm.complete(prompt).await.map_err(|error| {
            warn!(
                event_name = "advisor.generation_unavailable",
                session_id = %session_id,
                correlation_id,
                purpose = prompt.purpose.as_str(),
                error = %error,
                "generation call failed; turn aborted"
            );
            let stage = match prompt.purpose {
                PromptPurpose::SlotExtraction => "slot extraction",
                PromptPurpose::ProseSynthesis => "prose synthesis",
            };
            ApplicationError::GenerationUnavailable(format!("{stage} failed: {error:#}"))
        })
    }

    /// Applies an intake event and carries out its slot reset, if any.
    fn transition(
        &self,
        session: &mut Session,
        event: IntakeEvent,
        context: IntakeContext,
    ) -> Result<TransitionOutcome, ApplicationError> {
        let outcome =
            self.engine.apply(&session.state, &event, &context).map_err(DomainError::from)?;
        session.state = outcome.to;
        if outcome.actions.contains(&IntakeAction::ResetSlots) {
            session.reset_topic();
        }
        Ok(outcome)
    }

    async fn finish(
        &self,
        mut session: Session,
        reply: FormattedResponse,
        validation_errors: Vec<ValidationError>,
        artifact: Option<AnalysisArtifact>,
        correlation_id: &str,
    ) -> Result<TurnOutcome, ApplicationError> {
        session.record_advisor_turn(reply.render(), artifact.clone());
        self.store.save(&session).await?;

        info!(
            event_name = "advisor.turn_completed",
            session_id = %session.id,
            correlation_id,
            state = session.state.label(),
            reply = reply.kind(),
            rejected = validation_errors.len(),
            "advisor turn completed"
        );

        Ok(TurnOutcome {
            session_id: session.id,
            reply,
            state: session.state,
            validation_errors,
            artifact,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use advisor_core::config::IntakeConfig;
    use advisor_core::domain::capability::Capability;
    use advisor_core::domain::session::SessionId;
    use advisor_core::domain::slot::SlotValue;
    use advisor_core::errors::ApplicationError;
    use advisor_core::flows::IntakeState;
    use advisor_core::format::FormattedResponse;
    use advisor_core::slots::names;
    use advisor_core::store::{ConversationStore, InMemoryConversationStore};
    use anyhow::anyhow;
    use async_trait::async_trait;

    use super::AdvisorRuntime;
    use crate::llm::{LlmClient, PromptPurpose, PromptSpec};

    const SYNTHESIS_REPLY: &str = r#"{
        "narrative": "Both paths are viable.",
        "key_insight": "Control is the deciding factor.",
        "recommendation": "Bootstrap for two more quarters.",
        "details": {}
    }"#;

    struct ScriptedLlm {
        replies: Mutex<VecDeque<Result<String, String>>>,
        prompts: Mutex<Vec<PromptSpec>>,
    }

    impl ScriptedLlm {
        fn new(replies: &[Result<&str, &str>]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(
                    replies
                        .iter()
                        .map(|reply| reply.map(str::to_string).map_err(str::to_string))
                        .collect(),
                ),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn purposes(&self) -> Vec<PromptPurpose> {
            self.prompts.lock().expect("prompts").iter().map(|prompt| prompt.purpose).collect()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, prompt: &PromptSpec) -> anyhow::Result<String> {
            self.prompts.lock().expect("prompts").push(prompt.clone());
            match self.replies.lock().expect("replies").pop_front() {
                Some(Ok(text)) => Ok(text),
                Some(Err(message)) => Err(anyhow!(message)),
                None => Err(anyhow!("no scripted reply left")),
            }
        }
    }

    fn runtime(
        llm: &Arc<ScriptedLlm>,
        store: &Arc<InMemoryConversationStore>,
        offer_optional_slots: bool,
    ) -> AdvisorRuntime {
        AdvisorRuntime::new(llm.clone(), store.clone(), &IntakeConfig { offer_optional_slots })
    }

    fn session_id() -> SessionId {
        SessionId("session-1".to_string())
    }

    #[tokio::test]
    async fn either_or_question_reaches_a_decision_analysis() {
        let llm = ScriptedLlm::new(&[
            Ok("{}"),
            Ok(r#"{"decision_factors": ["speed to market", "control"]}"#),
            Ok(SYNTHESIS_REPLY),
        ]);
        let store = Arc::new(InMemoryConversationStore::new());
        let runtime = runtime(&llm, &store, false);

        let first = runtime
            .handle_turn(&session_id(), "Should we raise a Series A or bootstrap?")
            .await
            .expect("first turn");
        assert_eq!(first.state, IntakeState::Clarifying(Capability::DecisionSupport));
        let FormattedResponse::Clarification { question, .. } = &first.reply else {
            panic!("expected a clarification, got {:?}", first.reply);
        };
        assert!(question.to_lowercase().contains("factor"));

        let second = runtime
            .handle_turn(&session_id(), "Speed to market and keeping control matter most")
            .await
            .expect("second turn");
        assert_eq!(second.state, IntakeState::Analyzed(Capability::DecisionSupport));
        assert_eq!(second.reply.kind(), "analysis");
        assert!(second.artifact.is_some());
        assert!(second.reply.render().contains("Control is the deciding factor."));

        assert_eq!(
            llm.purposes(),
            vec![
                PromptPurpose::SlotExtraction,
                PromptPurpose::SlotExtraction,
                PromptPurpose::ProseSynthesis
            ]
        );
        let stored = store.load(&session_id()).await.expect("load").expect("saved");
        assert_eq!(stored.history.len(), 4);
        assert_eq!(stored.artifacts().count(), 1);
        assert_eq!(
            stored.slots.get(names::OPTIONS),
            Some(&SlotValue::List(vec!["raise a Series A".to_string(), "bootstrap".to_string()]))
        );
    }

    #[tokio::test]
    async fn rejected_value_is_reported_and_stored_value_kept() {
        let llm = ScriptedLlm::new(&[Ok(r#"{"options": ["Series A"]}"#)]);
        let store = Arc::new(InMemoryConversationStore::new());
        let runtime = runtime(&llm, &store, false);

        let outcome = runtime
            .handle_turn(&session_id(), "Should we raise a Series A or bootstrap?")
            .await
            .expect("turn");

        assert_eq!(outcome.validation_errors.len(), 1);
        assert_eq!(outcome.validation_errors[0].slot, names::OPTIONS);
        let FormattedResponse::Clarification { complaints, .. } = &outcome.reply else {
            panic!("expected a clarification");
        };
        assert_eq!(complaints.len(), 1);

        let stored = store.load(&session_id()).await.expect("load").expect("saved");
        assert!(matches!(
            stored.slots.get(names::OPTIONS),
            Some(SlotValue::List(items)) if items.len() == 2
        ));
    }

    #[tokio::test]
    async fn generation_failure_leaves_stored_session_untouched() {
        let llm = ScriptedLlm::new(&[Ok("{}"), Err("connection refused")]);
        let store = Arc::new(InMemoryConversationStore::new());
        let runtime = runtime(&llm, &store, false);

        runtime
            .handle_turn(&session_id(), "Should we raise a Series A or bootstrap?")
            .await
            .expect("first turn");
        let before = store.load(&session_id()).await.expect("load").expect("saved");

        let error = runtime
            .handle_turn(&session_id(), "Speed and control")
            .await
            .expect_err("generation is down");
        assert!(matches!(error, ApplicationError::GenerationUnavailable(_)));

        let after = store.load(&session_id()).await.expect("load").expect("saved");
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn failure_on_a_new_session_saves_nothing() {
        let llm = ScriptedLlm::new(&[Err("timed out")]);
        let store = Arc::new(InMemoryConversationStore::new());
        let runtime = runtime(&llm, &store, false);

        let error = runtime
            .handle_turn(&session_id(), "I'm thinking of launching a meal-prep subscription")
            .await
            .expect_err("generation is down");
        assert!(matches!(error, ApplicationError::GenerationUnavailable(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn out_of_scope_request_gets_fixed_redirect_without_generation() {
        let llm = ScriptedLlm::new(&[]);
        let store = Arc::new(InMemoryConversationStore::new());
        let runtime = runtime(&llm, &store, true);

        let outcome = runtime
            .handle_turn(&session_id(), "What's the weather like tomorrow?")
            .await
            .expect("turn");

        assert_eq!(outcome.state, IntakeState::Unclassified);
        assert_eq!(outcome.reply.kind(), "redirect");
        assert!(outcome.reply.render().starts_with("I specialize in competitor analysis"));
        assert!(llm.purposes().is_empty());
    }

    #[tokio::test]
    async fn ambiguous_request_asks_which_capability() {
        let llm = ScriptedLlm::new(&[]);
        let store = Arc::new(InMemoryConversationStore::new());
        let runtime = runtime(&llm, &store, true);

        let outcome = runtime
            .handle_turn(
                &session_id(),
                "Should we launch this idea or focus on beating our competitors?",
            )
            .await
            .expect("turn");

        assert_eq!(outcome.state, IntakeState::Unclassified);
        let FormattedResponse::CapabilityChoice { candidates, .. } = &outcome.reply else {
            panic!("expected a capability choice");
        };
        assert_eq!(candidates.len(), 3);
        assert!(llm.purposes().is_empty());
    }

    #[tokio::test]
    async fn redirect_mid_intake_switches_capability_and_keeps_history() {
        let llm = ScriptedLlm::new(&[Ok("{}"), Ok("{}")]);
        let store = Arc::new(InMemoryConversationStore::new());
        let runtime = runtime(&llm, &store, true);

        runtime
            .handle_turn(&session_id(), "Should we raise a Series A or bootstrap?")
            .await
            .expect("first turn");
        let outcome = runtime
            .handle_turn(&session_id(), "Actually, let's talk about our competitors instead")
            .await
            .expect("redirect turn");

        assert_eq!(outcome.state, IntakeState::Clarifying(Capability::CompetitorAnalysis));
        let stored = store.load(&session_id()).await.expect("load").expect("saved");
        assert!(!stored.slots.contains_key(names::OPTIONS));
        assert_eq!(stored.history.len(), 4);
        assert_eq!(
            stored.topic.as_deref(),
            Some("Actually, let's talk about our competitors instead")
        );
    }

    #[tokio::test]
    async fn slot_answer_mentioning_instead_keeps_the_intake() {
        let llm = ScriptedLlm::new(&[Ok("{}"), Ok("{}")]);
        let store = Arc::new(InMemoryConversationStore::new());
        let runtime = runtime(&llm, &store, true);

        runtime
            .handle_turn(&session_id(), "Should we raise a Series A or bootstrap?")
            .await
            .expect("first turn");
        let outcome = runtime
            .handle_turn(
                &session_id(),
                "Speed matters most, we might hire a contractor instead of a CTO",
            )
            .await
            .expect("answer turn");

        assert_eq!(outcome.state, IntakeState::Clarifying(Capability::DecisionSupport));
        assert_eq!(outcome.reply.kind(), "clarification");
        assert_eq!(llm.purposes(), vec![PromptPurpose::SlotExtraction; 2]);

        let stored = store.load(&session_id()).await.expect("load").expect("saved");
        assert_eq!(
            stored.slots.get(names::OPTIONS),
            Some(&SlotValue::List(vec!["raise a Series A".to_string(), "bootstrap".to_string()]))
        );
        assert_eq!(stored.topic.as_deref(), Some("Should we raise a Series A or bootstrap?"));
    }

    #[tokio::test]
    async fn numbered_pick_commits_using_the_original_request() {
        let request = "I have an idea for a CRM and want to understand the competition";
        let llm = ScriptedLlm::new(&[Ok("{}")]);
        let store = Arc::new(InMemoryConversationStore::new());
        let runtime = runtime(&llm, &store, true);

        let choice = runtime.handle_turn(&session_id(), request).await.expect("ambiguous turn");
        assert_eq!(choice.reply.kind(), "capability_choice");
        let pending = store.load(&session_id()).await.expect("load").expect("saved");
        assert_eq!(
            pending.pending_choice,
            vec![Capability::CompetitorAnalysis, Capability::FeasibilityEvaluation]
        );
        assert_eq!(pending.topic.as_deref(), Some(request));

        let outcome = runtime.handle_turn(&session_id(), "1").await.expect("pick turn");
        assert_eq!(outcome.state, IntakeState::Clarifying(Capability::CompetitorAnalysis));

        let stored = store.load(&session_id()).await.expect("load").expect("saved");
        assert_eq!(stored.topic.as_deref(), Some(request));
        assert!(stored.pending_choice.is_empty());
        let prompts = llm.prompts.lock().expect("prompts");
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].user.ends_with(request));
    }

    #[tokio::test]
    async fn unrelated_reply_to_a_choice_is_classified_afresh() {
        let llm = ScriptedLlm::new(&[Ok("{}")]);
        let store = Arc::new(InMemoryConversationStore::new());
        let runtime = runtime(&llm, &store, true);

        runtime
            .handle_turn(
                &session_id(),
                "I have an idea for a CRM and want to understand the competition",
            )
            .await
            .expect("ambiguous turn");
        let outcome = runtime
            .handle_turn(&session_id(), "Should we hire or outsource support?")
            .await
            .expect("new request");

        assert_eq!(outcome.state, IntakeState::Clarifying(Capability::DecisionSupport));
        let stored = store.load(&session_id()).await.expect("load").expect("saved");
        assert_eq!(stored.topic.as_deref(), Some("Should we hire or outsource support?"));
        assert!(stored.pending_choice.is_empty());
    }

    #[tokio::test]
    async fn single_competitor_is_rejected_and_competitors_asked_again() {
        let llm = ScriptedLlm::new(&[Ok(
            r#"{"competitors": [{"name": "Asana", "description": "Work management platform"}]}"#,
        )]);
        let store = Arc::new(InMemoryConversationStore::new());
        let runtime = runtime(&llm, &store, true);

        let outcome = runtime
            .handle_turn(&session_id(), "Who are our main competitors in project management?")
            .await
            .expect("turn");

        assert_eq!(outcome.state, IntakeState::Clarifying(Capability::CompetitorAnalysis));
        assert_eq!(outcome.validation_errors.len(), 1);
        assert_eq!(outcome.validation_errors[0].slot, names::COMPETITORS);
        assert!(outcome.validation_errors[0].constraint.contains("between 2 and 5"));
        let FormattedResponse::Clarification { question, complaints, .. } = &outcome.reply else {
            panic!("expected a clarification, got {:?}", outcome.reply);
        };
        assert!(question.contains("2-5 competitor names"));
        assert_eq!(complaints.len(), 1);

        let stored = store.load(&session_id()).await.expect("load").expect("saved");
        assert!(!stored.slots.contains_key(names::COMPETITORS));
    }

    #[tokio::test]
    async fn optional_details_are_offered_once_then_analysis_runs() {
        let llm = ScriptedLlm::new(&[
            Ok(r#"{"competitors": [
                {"name": "Asana", "description": "Work management platform for enterprise teams"},
                {"name": "Trello", "description": "Affordable kanban boards for small business"}
            ]}"#),
            Ok("{}"),
            Ok(SYNTHESIS_REPLY),
            Ok("{}"),
        ]);
        let store = Arc::new(InMemoryConversationStore::new());
        let runtime = runtime(&llm, &store, true);

        let offer = runtime
            .handle_turn(&session_id(), "Who are our main competitors in project management?")
            .await
            .expect("offer turn");
        assert_eq!(offer.state, IntakeState::Ready(Capability::CompetitorAnalysis));
        let FormattedResponse::Clarification { rationale, .. } = &offer.reply else {
            panic!("expected the optional offer");
        };
        assert_eq!(rationale, "These are optional.");

        let analysis = runtime.handle_turn(&session_id(), "go ahead").await.expect("analysis turn");
        assert_eq!(analysis.state, IntakeState::Analyzed(Capability::CompetitorAnalysis));
        assert_eq!(analysis.reply.kind(), "analysis");

        let next = runtime
            .handle_turn(&session_id(), "Should we hire or outsource support?")
            .await
            .expect("new topic");
        assert_eq!(next.state, IntakeState::Clarifying(Capability::DecisionSupport));

        let stored = store.load(&session_id()).await.expect("load").expect("saved");
        assert_eq!(stored.artifacts().count(), 1);
        assert!(!stored.slots.contains_key(names::COMPETITORS));
        assert!(!stored.optional_offered);
    }

    #[tokio::test]
    async fn weight_on_undeclared_factor_is_asked_again() {
        let llm = ScriptedLlm::new(&[Ok(
            r#"{"decision_factors": ["speed", "control"], "weights": {"price": 8}}"#,
        )]);
        let store = Arc::new(InMemoryConversationStore::new());
        let runtime = runtime(&llm, &store, false);

        let outcome = runtime
            .handle_turn(&session_id(), "Should we raise a Series A or bootstrap?")
            .await
            .expect("turn");

        assert_eq!(outcome.state, IntakeState::Ready(Capability::DecisionSupport));
        assert_eq!(outcome.validation_errors.len(), 1);
        assert_eq!(outcome.validation_errors[0].slot, names::WEIGHTS);
        assert!(outcome.artifact.is_none());

        let stored = store.load(&session_id()).await.expect("load").expect("saved");
        assert!(!stored.slots.contains_key(names::WEIGHTS));
        assert_eq!(llm.purposes(), vec![PromptPurpose::SlotExtraction]);
    }
}
