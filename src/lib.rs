//! Retrieval-augmented workspace assistant.
//!
//! Documents from a local folder are chunked, embedded into a persisted
//! vector index and used as context for a conversational language-model
//! chain, exposed over HTTP or an interactive terminal.

pub mod api;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;

#[cfg(test)]
mod testing;
