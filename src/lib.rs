//! LLM-powered explanation of riichi engine recommendations
//!
//! This crate turns a raw decision-engine output for one turn of
//! Japanese mahjong into a ranked option list, renders the full table
//! state around it as a Chinese text report, and hands the report to a
//! generative engine for explanation.
//!
//! ## Architecture
//!
//! ```text
//! Recommendation → Decoder → RankedRecommendation
//!                                 ↓
//! GameContext + KyokuContext → Composer → report → LlmClient → explanation
//! ```
//!
//! The decoder and composer are pure and total: no structurally
//! plausible input makes them fail, and concurrent use needs no
//! locking. The only suspension point is the single LLM call.

// Decoder and composer core
pub mod action;
pub mod compose;
pub mod decode;
pub mod state;
pub mod tile;

// Collaborators
pub mod auth;
pub mod azure_client;
pub mod explain;
pub mod llm_client;

// Re-exports for convenience
pub use action::{ActionDescriptor, SeatVariant};
pub use auth::{CachedTokenProvider, StaticTokenProvider, TokenProvider, TokenService};
pub use azure_client::AzureOpenAiClient;
pub use compose::{ComposeOptions, InstructionTemplate, PromptComposer};
pub use decode::{decode, DecodeDiagnostic, Probability, RankedOption, RankedRecommendation};
pub use explain::Explainer;
pub use llm_client::LlmClient;
pub use state::{DiscardEntry, GameContext, KyokuContext, Meld};
