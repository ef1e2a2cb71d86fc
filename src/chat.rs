//! Retrieval-augmented chat over the indexed meetings

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use crate::index::{SearchResult, VectorIndex};
use crate::ingest::count_tokens;
use crate::llm::{ChatMessage, ChatModel, Embedder, build_context_prompt};

/// Conversation history bounded by a token budget
#[derive(Debug, Clone)]
pub struct ChatMemory {
    token_limit: usize,
    messages: VecDeque<ChatMessage>,
}

impl ChatMemory {
    pub fn new(token_limit: usize) -> Self {
        Self {
            token_limit,
            messages: VecDeque::new(),
        }
    }

    /// Append a message, dropping the oldest ones while over budget
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push_back(message);
        while self.messages.len() > 1 && self.token_count() > self.token_limit {
            self.messages.pop_front();
        }
    }

    pub fn token_count(&self) -> usize {
        self.messages.iter().map(|m| count_tokens(&m.content)).sum()
    }

    pub fn messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

/// Answer and the excerpts it was grounded on
#[derive(Debug, Clone)]
pub struct ChatAnswer {
    pub response: String,
    pub sources: Vec<SearchResult>,
}

pub struct ChatEngine {
    embedder: Arc<dyn Embedder>,
    model: Arc<dyn ChatModel>,
    system_prompt: String,
    top_k: usize,
    memory: ChatMemory,
}

impl ChatEngine {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn ChatModel>,
        system_prompt: impl Into<String>,
        top_k: usize,
        memory_token_limit: usize,
    ) -> Self {
        Self {
            embedder,
            model,
            system_prompt: system_prompt.into(),
            top_k,
            memory: ChatMemory::new(memory_token_limit),
        }
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    pub fn memory(&self) -> &ChatMemory {
        &self.memory
    }

    /// Answer with conversation history and remember the exchange
    pub async fn chat(&mut self, index: &VectorIndex, message: &str) -> Result<ChatAnswer> {
        let sources = index.query(self.embedder.as_ref(), message, self.top_k).await?;
        let messages = self.build_messages(&sources, message, true);

        let response = self.model.complete(&messages).await?;
        info!("Answered with {} excerpts", sources.len());

        self.memory.push(ChatMessage::user(message));
        self.memory.push(ChatMessage::assistant(response.clone()));
        debug!(
            "Chat memory: {} messages, {} tokens",
            self.memory.len(),
            self.memory.token_count()
        );

        Ok(ChatAnswer { response, sources })
    }

    /// One-shot question, history neither used nor updated
    pub async fn query(&self, index: &VectorIndex, question: &str) -> Result<ChatAnswer> {
        let sources = index.query(self.embedder.as_ref(), question, self.top_k).await?;
        let messages = self.build_messages(&sources, question, false);
        let response = self.model.complete(&messages).await?;
        Ok(ChatAnswer { response, sources })
    }

    pub fn reset(&mut self) {
        self.memory.clear();
    }

    fn build_messages(&self, sources: &[SearchResult], message: &str, with_history: bool) -> Vec<ChatMessage> {
        let mut messages = vec![
            ChatMessage::system(self.system_prompt.clone()),
            ChatMessage::system(build_context_prompt(sources)),
        ];
        if with_history {
            messages.extend(self.memory.messages().cloned());
        }
        messages.push(ChatMessage::user(message));
        messages
    }
}
