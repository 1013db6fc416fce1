//! Advisor Runtime - conversational turn driver
//!
//! This crate connects the deterministic advisory core to a language
//! generation service:
//! - Extracts slot values from free text (`extraction`)
//! - Writes prose around finished artifacts (`synthesis`)
//! - Drives one user turn end to end (`runtime`)
//! - Talks to OpenAI, Anthropic or Ollama over HTTP (`http`)
//!
//! # Safety Principle
//!
//! The generation service is strictly a translator. It never decides scores,
//! ratings, positioning or verdicts. Those come from the core's analysis
//! builder, and every extracted value is validated before it is stored.

pub mod extraction;
pub mod http;
pub mod llm;
pub mod runtime;
pub mod synthesis;

pub use http::HttpLlmClient;
pub use llm::{LlmClient, PromptPurpose, PromptSpec};
pub use runtime::{AdvisorRuntime, TurnOutcome};
