pub mod analysis;
pub mod classifier;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod format;
pub mod slots;
pub mod store;

pub use analysis::{AnalysisBuilder, AnalysisRequest, Synthesis};
pub use classifier::{CapabilityClassifier, Redirect};
pub use domain::artifact::AnalysisArtifact;
pub use domain::capability::{Capability, Classification};
pub use domain::session::{Session, SessionId, Turn, TurnRole};
pub use domain::slot::{Competitor, SlotMap, SlotValue};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{IntakeEngine, IntakeEvent, IntakeState};
pub use format::{FormattedResponse, ResponseFormatter};
pub use slots::{SlotDefinition, SlotSchemaRegistry, ValidationError};
pub use store::{ConversationStore, InMemoryConversationStore, StoreError};
