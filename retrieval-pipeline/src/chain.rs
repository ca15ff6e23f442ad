use std::sync::Arc;

use common::error::AppError;
use tracing::{debug, instrument};

use crate::{
    chat::ChatModel,
    memory::{ConversationMemory, Message},
    prompts::{create_condense_message, create_context_message, CONDENSE_QUESTION_SYSTEM_PROMPT},
    vector_store::{Document, Retriever},
};

#[derive(Debug, Clone)]
pub struct ChainOutput {
    pub question: String,
    pub generated_question: String,
    pub answer: String,
    pub source_documents: Vec<Document>,
}

/// Retrieval-augmented chat over a conversation memory.
///
/// A follow-up question is first condensed into a standalone question using the
/// chat history, then used for retrieval and answered with the retrieved context
/// and the history in the prompt. The finished turn is appended to memory.
pub struct ConversationalRetrievalChain {
    llm: Arc<dyn ChatModel>,
    retriever: Arc<dyn Retriever>,
    memory: ConversationMemory,
}

impl ConversationalRetrievalChain {
    pub fn from_llm(
        llm: Arc<dyn ChatModel>,
        retriever: Arc<dyn Retriever>,
        memory: ConversationMemory,
    ) -> Self {
        Self {
            llm,
            retriever,
            memory,
        }
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut ConversationMemory {
        &mut self.memory
    }

    #[instrument(skip_all, fields(memory_key = self.memory.memory_key(), turns = self.memory.len() / 2))]
    pub async fn invoke(&mut self, question: &str) -> Result<ChainOutput, AppError> {
        let generated_question = self.generate_question(question).await?;

        let source_documents = self
            .retriever
            .retrieve(&generated_question)
            .await
            .map_err(|err| match err {
                AppError::Retrieval(_) => err,
                other => AppError::Retrieval(other.to_string()),
            })?;
        debug!(documents = source_documents.len(), "Retrieved context");

        let mut messages = Vec::with_capacity(self.memory.len().saturating_add(2));
        messages.push(Message::system(create_context_message(&source_documents)));
        messages.extend_from_slice(self.memory.messages());
        messages.push(Message::user(generated_question.clone()));

        let answer = self.llm.complete(&messages).await?;
        self.memory.save_context(question, &answer);

        Ok(ChainOutput {
            question: question.to_string(),
            generated_question,
            answer,
            source_documents,
        })
    }

    async fn generate_question(&self, question: &str) -> Result<String, AppError> {
        if self.memory.is_empty() {
            return Ok(question.to_string());
        }

        let messages = [
            Message::system(CONDENSE_QUESTION_SYSTEM_PROMPT),
            Message::user(create_condense_message(
                &self.memory.buffer_as_str(),
                question,
            )),
        ];
        let standalone = self.llm.complete(&messages).await?;
        let standalone = standalone.trim();

        if standalone.is_empty() {
            Ok(question.to_string())
        } else {
            Ok(standalone.to_string())
        }
    }
}
