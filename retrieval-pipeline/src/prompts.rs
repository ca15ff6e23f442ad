use crate::vector_store::Document;

pub static CONDENSE_QUESTION_SYSTEM_PROMPT: &str = "Given the following conversation and a follow up question, rephrase the follow up question to be a standalone question, in its original language. Reply with the standalone question only.";

pub static QA_SYSTEM_PROMPT: &str = r"Use the following pieces of context to answer the user's question.
If you don't know the answer, just say that you don't know, don't try to make up an answer.
----------------";

pub fn create_condense_message(chat_history: &str, question: &str) -> String {
    format!(
        r"Chat History:
{chat_history}
Follow Up Input: {question}
Standalone question:"
    )
}

/// Stuff every retrieved passage into one context block, separated by blank lines.
pub fn create_context_message(documents: &[Document]) -> String {
    let context = documents
        .iter()
        .map(|doc| doc.page_content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("{QA_SYSTEM_PROMPT}\n{context}")
}
