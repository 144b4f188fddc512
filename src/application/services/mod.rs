mod chain;
mod index;
mod prompt;
mod retriever;

pub use chain::{ChainAnswer, ChainSettings, ConversationalChain, GreetingPolicy};
pub use index::IndexService;
pub use retriever::{Retriever, RetrieverConfig, SearchStrategy};
