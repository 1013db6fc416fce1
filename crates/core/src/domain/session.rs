use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::artifact::AnalysisArtifact;
use crate::domain::capability::Capability;
use crate::domain::slot::SlotMap;
use crate::flows::IntakeState;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Advisor,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Advisor => "advisor",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "advisor" => Some(Self::Advisor),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
    pub capability: Option<Capability>,
    pub artifact: Option<AnalysisArtifact>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub state: IntakeState,
    pub slots: SlotMap,
    /// Utterance that opened the current capability.
    pub topic: Option<String>,
    pub optional_offered: bool,
    /// Capabilities offered by the last capability-choice prompt, in listed order.
    #[serde(default)]
    pub pending_choice: Vec<Capability>,
    pub history: Vec<Turn>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            id,
            state: IntakeState::Unclassified,
            slots: SlotMap::new(),
            topic: None,
            optional_offered: false,
            pending_choice: Vec::new(),
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn capability(&self) -> Option<Capability> {
        self.state.capability()
    }

    /// Capability the classifier should treat as committed. An analyzed topic no
    /// longer holds the session.
    pub fn committed_capability(&self) -> Option<Capability> {
        match self.state {
            IntakeState::Clarifying(capability) | IntakeState::Ready(capability) => {
                Some(capability)
            }
            IntakeState::Unclassified | IntakeState::Analyzed(_) => None,
        }
    }

    pub fn record_user_turn(&mut self, text: impl Into<String>) {
        self.push_turn(TurnRole::User, text.into(), None);
    }

    pub fn record_advisor_turn(
        &mut self,
        text: impl Into<String>,
        artifact: Option<AnalysisArtifact>,
    ) {
        self.push_turn(TurnRole::Advisor, text.into(), artifact);
    }

    /// Clears intake data for a fresh topic. History, including earlier artifacts,
    /// is kept.
    pub fn reset_topic(&mut self) {
        self.slots.clear();
        self.topic = None;
        self.optional_offered = false;
        self.pending_choice.clear();
    }

    pub fn artifacts(&self) -> impl Iterator<Item = &AnalysisArtifact> {
        self.history.iter().filter_map(|turn| turn.artifact.as_ref())
    }

    fn push_turn(&mut self, role: TurnRole, text: String, artifact: Option<AnalysisArtifact>) {
        let now = Utc::now();
        self.history.push(Turn {
            role,
            text,
            capability: self.capability(),
            artifact,
            occurred_at: now,
        });
        self.updated_at = now;
    }
}
