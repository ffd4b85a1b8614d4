//! Conversational retrieval pipeline.
//!
//! Parse → condense → retrieve → answer. Each stage is a method with a typed
//! input and output; `run` calls them in order and stops at the first error.
//! The standalone question is computed once and is the only text embedded.

use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, StreamExt};

use navigator_core::{Error, Result};
use navigator_store::{Embedder, RetrievedDocument, VectorStore};

use crate::observe::{RetrievalObserver, TracingObserver};
use crate::prompts::{
    combine_documents, format_chat_history, render_answer_prompt, render_condense_prompt,
};
use crate::providers::{ChatModel, ModelRequest, StreamChunk};
use crate::types::ChatMessage;

pub const RETRIEVAL_TEMPERATURE: f64 = 0.2;

/// Answer text as an ordered byte stream.
pub type AnswerStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Prior turns plus the message being answered.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationTurn {
    pub history: Vec<ChatMessage>,
    pub question: String,
}

impl ConversationTurn {
    /// Split a message list into history and the latest message.
    pub fn from_messages(mut messages: Vec<ChatMessage>) -> Result<Self> {
        let latest = messages
            .pop()
            .ok_or_else(|| Error::Validation("messages must not be empty".into()))?;
        Ok(Self {
            history: messages,
            question: latest.content,
        })
    }

    /// 1-based position of this turn in the conversation.
    pub fn message_index(&self) -> usize {
        self.history.len() + 1
    }
}

/// Everything the handler needs to respond.
pub struct RetrievalAnswer {
    pub message_index: usize,
    pub standalone_question: String,
    pub context: String,
    pub documents: Vec<RetrievedDocument>,
    pub answer: AnswerStream,
}

pub struct RetrievalPipeline {
    model: Arc<dyn ChatModel>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    top_k: usize,
    observer: Arc<dyn RetrievalObserver>,
}

impl RetrievalPipeline {
    pub fn new(
        model: Arc<dyn ChatModel>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            model,
            embedder,
            store,
            top_k: navigator_core::config::DEFAULT_TOP_K,
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn RetrievalObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Run every stage. Fails before any network call if `messages` is empty.
    pub async fn run(&self, messages: Vec<ChatMessage>) -> Result<RetrievalAnswer> {
        let turn = ConversationTurn::from_messages(messages)?;

        let standalone_question = self.condense(&turn).await?;
        self.observer.standalone_question(&standalone_question);

        let documents = self.retrieve(&standalone_question).await?;
        self.observer.documents_retrieved(&documents);

        let context = combine_documents(&documents);
        let answer = self.answer(&context, &standalone_question).await?;
        self.observer.answer_started(context.chars().count());

        Ok(RetrievalAnswer {
            message_index: turn.message_index(),
            standalone_question,
            context,
            documents,
            answer,
        })
    }

    /// Rephrase the latest message as a history-independent question.
    pub async fn condense(&self, turn: &ConversationTurn) -> Result<String> {
        let prompt = render_condense_prompt(&format_chat_history(&turn.history), &turn.question);
        let text = self
            .model
            .invoke(ModelRequest::new(
                vec![ChatMessage::user(prompt)],
                RETRIEVAL_TEMPERATURE,
            ))
            .await?;
        Ok(text.trim().to_string())
    }

    /// Embed the standalone question and fetch the nearest documents.
    pub async fn retrieve(&self, standalone_question: &str) -> Result<Vec<RetrievedDocument>> {
        let embedding = self.embedder.embed(standalone_question).await?;
        self.store.similarity_search(&embedding, self.top_k).await
    }

    /// Start the grounded answer call and expose its text as bytes.
    pub async fn answer(&self, context: &str, standalone_question: &str) -> Result<AnswerStream> {
        let prompt = render_answer_prompt(context, standalone_question);
        let chunks = self
            .model
            .stream(ModelRequest::new(
                vec![ChatMessage::user(prompt)],
                RETRIEVAL_TEMPERATURE,
            ))
            .await?;

        let bytes = chunks.filter_map(|chunk| async move {
            match chunk {
                Ok(StreamChunk::Token(text)) => Some(Ok(Bytes::from(text))),
                Ok(_) => None,
                Err(e) => Some(Err(e)),
            }
        });
        Ok(Box::pin(bytes))
    }
}
