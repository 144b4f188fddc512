//! Application layer - Use cases and orchestration.
//!
//! Services here depend on domain ports (traits) rather than concrete
//! adapters, which are wired together in `main`.

pub mod assistant;
pub mod services;

pub use assistant::{Assistant, AssistantSettings};
pub use services::{
    ChainAnswer, ChainSettings, ConversationalChain, GreetingPolicy, IndexService, Retriever,
    RetrieverConfig, SearchStrategy,
};
