use std::sync::Arc;

use async_trait::async_trait;
use common::error::AppError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A passage returned by a retriever.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub page_content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Document {
    pub fn new(page_content: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: Map::new(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// Returns passages relevant to a query.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str) -> Result<Vec<Document>, AppError>;
}

/// An externally owned vector store that can hand out a retriever view of itself.
pub trait VectorStore: Send + Sync {
    fn as_retriever(&self) -> Arc<dyn Retriever>;
}
