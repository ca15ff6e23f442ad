pub mod answer_retrieval;
pub mod chain;
pub mod chat;
pub mod memory;
pub mod prompts;
pub mod vector_store;

#[cfg(test)]
mod testing;

pub use answer_retrieval::{QaService, FALLBACK_ANSWER};
pub use chain::{ChainOutput, ConversationalRetrievalChain};
pub use chat::{ChatModel, OpenAiChatModel};
pub use memory::{ConversationMemory, Message, MessageRole};
pub use vector_store::{Document, Retriever, VectorStore};
