pub mod engine;
pub mod states;

pub use engine::{IntakeDefinition, IntakeEngine, IntakeTransitionError, SlotFillingIntake};
pub use states::{IntakeAction, IntakeContext, IntakeEvent, IntakeState, TransitionOutcome};
