use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::error::AppError;

use crate::{
    chat::ChatModel,
    memory::Message,
    vector_store::{Document, Retriever, VectorStore},
};

/// Chat model that replays scripted replies and records every request.
#[derive(Clone, Default)]
pub struct ScriptedChatModel {
    replies: Arc<Mutex<VecDeque<Result<String, AppError>>>>,
    requests: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl ScriptedChatModel {
    pub fn new(replies: Vec<Result<String, AppError>>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            requests: Arc::default(),
        }
    }

    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    async fn complete(&self, messages: &[Message]) -> Result<String, AppError> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(messages.to_vec());
        self.replies
            .lock()
            .expect("replies lock")
            .pop_front()
            .unwrap_or_else(|| Err(AppError::LLMParsing("no scripted reply left".into())))
    }
}

/// Retriever returning the same passages for every query, recording the queries.
#[derive(Clone, Default)]
pub struct StaticRetriever {
    documents: Vec<Document>,
    queries: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl StaticRetriever {
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().expect("queries lock").clone()
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<Document>, AppError> {
        self.queries
            .lock()
            .expect("queries lock")
            .push(query.to_string());
        if self.fail {
            return Err(AppError::Retrieval("index unavailable".into()));
        }
        Ok(self.documents.clone())
    }
}

pub struct StaticVectorStore {
    pub retriever: StaticRetriever,
}

impl VectorStore for StaticVectorStore {
    fn as_retriever(&self) -> Arc<dyn Retriever> {
        Arc::new(self.retriever.clone())
    }
}
