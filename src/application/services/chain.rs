use futures::StreamExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument};

use crate::application::services::prompt::{format_context, format_history, render};
use crate::application::services::Retriever;
use crate::domain::{ports::LlmService, ConversationMemory, DomainError, SearchResult};

/// Canned reply for bare greetings, answered without retrieval.
#[derive(Debug, Clone)]
pub struct GreetingPolicy {
    pub triggers: Vec<String>,
    pub reply: String,
}

impl GreetingPolicy {
    pub fn matches(&self, question: &str) -> bool {
        let normalized = question
            .trim()
            .trim_end_matches(|c: char| c.is_ascii_punctuation())
            .trim_end();
        self.triggers
            .iter()
            .any(|trigger| trigger.trim().eq_ignore_ascii_case(normalized))
    }
}

#[derive(Debug, Clone)]
pub struct ChainSettings {
    pub system_prompt: String,
    /// Uses `{context}`, `{history}` and `{question}`.
    pub answer_template: String,
    /// Uses `{history}` and `{question}`.
    pub condense_template: String,
    pub no_context: String,
    pub no_history: String,
    pub greeting: Option<GreetingPolicy>,
    /// Rewrite follow-up questions into standalone ones before retrieval.
    pub condense_question: bool,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ChainAnswer {
    pub answer: String,
    pub sources: Vec<SearchResult>,
}

/// Retrieval-augmented question answering over one conversation.
///
/// Each successful turn is appended to the chain's memory and rendered into
/// the prompt of every later turn. Failed turns leave memory untouched.
pub struct ConversationalChain {
    retriever: Arc<Retriever>,
    llm: Arc<dyn LlmService>,
    settings: Arc<ChainSettings>,
    memory: ConversationMemory,
}

impl ConversationalChain {
    pub fn new(
        retriever: Arc<Retriever>,
        llm: Arc<dyn LlmService>,
        settings: Arc<ChainSettings>,
    ) -> Self {
        Self {
            retriever,
            llm,
            settings,
            memory: ConversationMemory::new(),
        }
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// A fresh chain over the same index with empty memory.
    pub fn reset(&self) -> Self {
        Self::new(self.retriever.clone(), self.llm.clone(), self.settings.clone())
    }

    #[instrument(skip(self), fields(conversation = %self.memory.id, turns = self.memory.len()))]
    pub async fn invoke(&mut self, question: &str) -> Result<ChainAnswer, DomainError> {
        let question = validate(question)?;
        if let Some(reply) = self.greeting_reply(question) {
            return Ok(ChainAnswer {
                answer: reply,
                sources: Vec::new(),
            });
        }

        let (prompt, sources) = self.prepare(question).await?;
        let answer = within(
            self.settings.timeout,
            self.llm.complete(&self.settings.system_prompt, &prompt),
        )
        .await?;

        self.memory.append(question, answer.as_str());
        info!(sources = sources.len(), "answered");
        Ok(ChainAnswer { answer, sources })
    }

    /// Sends answer fragments to `sink` as they arrive. The turn is recorded
    /// once the model finishes, even if the receiver went away mid-answer.
    #[instrument(skip(self, sink), fields(conversation = %self.memory.id, turns = self.memory.len()))]
    pub async fn invoke_streaming(
        &mut self,
        question: &str,
        sink: mpsc::Sender<String>,
    ) -> Result<ChainAnswer, DomainError> {
        let question = validate(question)?;
        if let Some(reply) = self.greeting_reply(question) {
            let _ = sink.send(reply.clone()).await;
            return Ok(ChainAnswer {
                answer: reply,
                sources: Vec::new(),
            });
        }

        let (prompt, sources) = self.prepare(question).await?;
        let mut stream = within(
            self.settings.timeout,
            self.llm.complete_stream(&self.settings.system_prompt, &prompt),
        )
        .await?;

        let mut answer = String::new();
        let mut delivering = true;
        loop {
            let next = tokio::time::timeout(self.settings.timeout, stream.next())
                .await
                .map_err(|_| DomainError::timeout("language model stopped responding"))?;
            let Some(fragment) = next else { break };
            let fragment = fragment?;

            answer.push_str(&fragment);
            if delivering && sink.send(fragment).await.is_err() {
                debug!("stream receiver dropped");
                delivering = false;
            }
        }

        self.memory.append(question, answer.as_str());
        info!(sources = sources.len(), "answered");
        Ok(ChainAnswer { answer, sources })
    }

    fn greeting_reply(&self, question: &str) -> Option<String> {
        let policy = self.settings.greeting.as_ref()?;
        policy.matches(question).then(|| policy.reply.clone())
    }

    async fn prepare(&self, question: &str) -> Result<(String, Vec<SearchResult>), DomainError> {
        let query = self.retrieval_query(question).await?;
        let sources = self.retriever.search(&query).await?;

        let context = format_context(&sources, &self.settings.no_context);
        let history = format_history(&self.memory, &self.settings.no_history);
        let prompt = render(
            &self.settings.answer_template,
            &[
                ("{context}", context.as_str()),
                ("{history}", history.as_str()),
                ("{question}", question),
            ],
        );
        Ok((prompt, sources))
    }

    async fn retrieval_query(&self, question: &str) -> Result<String, DomainError> {
        if !self.settings.condense_question || self.memory.is_empty() {
            return Ok(question.to_string());
        }

        let history = self.memory.transcript();
        let prompt = render(
            &self.settings.condense_template,
            &[("{history}", history.as_str()), ("{question}", question)],
        );
        let standalone = within(self.settings.timeout, self.llm.complete("", &prompt)).await?;
        let standalone = standalone.trim();
        debug!(standalone, "condensed follow-up question");

        if standalone.is_empty() {
            Ok(question.to_string())
        } else {
            Ok(standalone.to_string())
        }
    }
}

fn validate(question: &str) -> Result<&str, DomainError> {
    let question = question.trim();
    if question.is_empty() {
        return Err(DomainError::validation("question must not be empty"));
    }
    Ok(question)
}

async fn within<T, F>(limit: Duration, future: F) -> Result<T, DomainError>
where
    F: Future<Output = Result<T, DomainError>>,
{
    tokio::time::timeout(limit, future)
        .await
        .map_err(|_| DomainError::timeout(format!("language model did not answer within {limit:?}")))?
}
