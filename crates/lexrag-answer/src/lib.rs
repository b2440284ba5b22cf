//! Grounded question answering over retrieved statute context.
//!
//! Assembles a constrained prompt from the hybrid-search context and forwards
//! it to an OpenAI-compatible generation service. When retrieval finds
//! nothing, a fixed fallback message is returned and no request is made.

pub mod answer;
pub mod llm;
pub mod prompt;
