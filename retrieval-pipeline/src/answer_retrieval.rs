use std::sync::Arc;

use common::{error::ServiceError, utils::config::AppConfig};
use tracing::{error, instrument};

use crate::{
    chain::ConversationalRetrievalChain,
    chat::{ChatModel, OpenAiChatModel},
    memory::{ConversationMemory, Message},
    vector_store::VectorStore,
};

pub const FALLBACK_ANSWER: &str = "I encountered an error processing your request.";

/// Conversational question answering over an externally owned vector store.
///
/// Each instance owns one chat history and one retrieval chain for its whole
/// lifetime.
pub struct QaService {
    chain: ConversationalRetrievalChain,
}

impl QaService {
    pub fn new(config: &AppConfig, vector_store: &dyn VectorStore) -> Self {
        Self::with_chat_model(Arc::new(OpenAiChatModel::from_config(config)), vector_store)
    }

    pub fn with_chat_model(llm: Arc<dyn ChatModel>, vector_store: &dyn VectorStore) -> Self {
        let chain = ConversationalRetrievalChain::from_llm(
            llm,
            vector_store.as_retriever(),
            ConversationMemory::new(),
        );
        Self { chain }
    }

    /// Answer `query`, or return [`FALLBACK_ANSWER`] if anything along the way fails.
    pub async fn answer(&mut self, query: &str) -> String {
        match self.try_answer(query).await {
            Ok(answer) => answer,
            Err(err) => {
                error!(error = %err, "Error getting LLM response");
                FALLBACK_ANSWER.to_string()
            }
        }
    }

    #[instrument(skip_all)]
    pub async fn try_answer(&mut self, query: &str) -> Result<String, ServiceError> {
        let output = self.chain.invoke(query).await?;
        Ok(output.answer)
    }

    pub fn history(&self) -> &[Message] {
        self.chain.memory().messages()
    }

    /// Forget the session's previous turns.
    pub fn reset(&mut self) {
        self.chain.memory_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        testing::{ScriptedChatModel, StaticRetriever, StaticVectorStore},
        vector_store::Document,
    };
    use async_openai::error::OpenAIError;
    use common::error::AppError;

    fn store() -> StaticVectorStore {
        StaticVectorStore {
            retriever: StaticRetriever::new(vec![Document::new("X is a placeholder variable.")]),
        }
    }

    #[tokio::test]
    async fn answer_returns_extracted_text() {
        let llm = ScriptedChatModel::new(vec![Ok("X is a placeholder.".into())]);
        let mut service = QaService::with_chat_model(Arc::new(llm), &store());

        assert_eq!(service.answer("What is X?").await, "X is a placeholder.");
        assert_eq!(service.history().len(), 2);
    }

    #[tokio::test]
    async fn second_call_sends_previous_turn() {
        let llm = ScriptedChatModel::new(vec![
            Ok("X is a placeholder.".into()),
            Ok("Why is X used as a placeholder?".into()),
            Ok("Tradition.".into()),
        ]);
        let mut service = QaService::with_chat_model(Arc::new(llm.clone()), &store());

        service.answer("What is X?").await;
        assert_eq!(service.answer("Why?").await, "Tradition.");

        let requests = llm.requests();
        let last = requests.last().expect("final request");
        assert!(last.contains(&Message::user("What is X?")));
        assert!(last.contains(&Message::ai("X is a placeholder.")));
    }

    #[tokio::test]
    async fn any_delegate_error_yields_fallback() {
        let failures = vec![
            AppError::OpenAI(OpenAIError::InvalidArgument("bad request".into())),
            AppError::LLMParsing("No content found in LLM response".into()),
            AppError::OpenAI(OpenAIError::FileSaveError("disk full".into())),
            AppError::Retrieval("index offline".into()),
        ];

        for failure in failures {
            let llm = ScriptedChatModel::new(vec![Err(failure)]);
            let mut service = QaService::with_chat_model(Arc::new(llm), &store());

            assert_eq!(service.answer("What is X?").await, FALLBACK_ANSWER);
            assert!(service.history().is_empty());
        }
    }

    #[tokio::test]
    async fn retriever_failure_yields_fallback() {
        let llm = ScriptedChatModel::new(vec![Ok("unused".into())]);
        let vector_store = StaticVectorStore {
            retriever: StaticRetriever::failing(),
        };
        let mut service = QaService::with_chat_model(Arc::new(llm), &vector_store);

        assert_eq!(service.answer("What is X?").await, FALLBACK_ANSWER);
    }

    #[tokio::test]
    async fn try_answer_classifies_failures() {
        let llm = ScriptedChatModel::new(vec![
            Err(AppError::OpenAI(OpenAIError::InvalidArgument("empty".into()))),
            Err(AppError::LLMParsing("garbled".into())),
        ]);
        let mut service = QaService::with_chat_model(Arc::new(llm), &store());

        assert!(matches!(
            service.try_answer("").await,
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            service.try_answer("What is X?").await,
            Err(ServiceError::DelegateUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn reset_forgets_history() {
        let llm = ScriptedChatModel::new(vec![Ok("a".into()), Ok("b".into())]);
        let mut service = QaService::with_chat_model(Arc::new(llm.clone()), &store());

        service.answer("first").await;
        service.reset();
        service.answer("second").await;

        // No condense step after a reset: two requests in total.
        assert_eq!(llm.requests().len(), 2);
        assert_eq!(service.history().len(), 2);
    }

    #[test]
    fn service_builds_from_config_without_network() {
        let config = AppConfig::default();
        let service = QaService::new(&config, &store());

        assert!(service.history().is_empty());
    }
}
