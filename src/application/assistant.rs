use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument};

use crate::application::services::{
    ChainAnswer, ChainSettings, ConversationalChain, IndexService, Retriever, RetrieverConfig,
};
use crate::domain::{
    ports::{DocumentLoader, LlmService, VectorIndex},
    ConversationMemory, DomainError, SearchResult, SourceType, TextSplitter,
};

#[derive(Debug, Clone)]
pub struct AssistantSettings {
    pub source_folder: PathBuf,
    pub source_type: SourceType,
    pub db_name: String,
    /// Rebuild from the source folder even when a persisted index exists.
    pub rebuild_index: bool,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub retriever: RetrieverConfig,
    pub chain: ChainSettings,
}

enum State {
    Uninitialized,
    Ready(Session),
}

struct Session {
    retriever: Arc<Retriever>,
    chain: ConversationalChain,
}

/// The workspace assistant: one index, one conversation at a time.
///
/// Every operation except [`Assistant::initialize`] fails with `NotReady`
/// until initialization succeeds.
pub struct Assistant {
    loader: Arc<dyn DocumentLoader>,
    index: Arc<IndexService>,
    llm: Arc<dyn LlmService>,
    settings: AssistantSettings,
    state: State,
}

impl Assistant {
    pub fn new(
        loader: Arc<dyn DocumentLoader>,
        index: Arc<IndexService>,
        llm: Arc<dyn LlmService>,
        settings: AssistantSettings,
    ) -> Self {
        Self {
            loader,
            index,
            llm,
            settings,
            state: State::Uninitialized,
        }
    }

    pub fn settings(&self) -> &AssistantSettings {
        &self.settings
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::Ready(_))
    }

    /// Opens the persisted index, or builds it from the source folder when
    /// absent or when a rebuild is requested. Calling it again is a no-op.
    #[instrument(skip(self), fields(db_name = %self.settings.db_name))]
    pub async fn initialize(&mut self) -> Result<(), DomainError> {
        if self.is_ready() {
            debug!("already initialized");
            return Ok(());
        }

        let index = self.open_index().await?;
        let retriever = Arc::new(self.index.retriever(index, self.settings.retriever.clone()));
        let chain = ConversationalChain::new(
            retriever.clone(),
            self.llm.clone(),
            Arc::new(self.settings.chain.clone()),
        );

        self.state = State::Ready(Session { retriever, chain });
        info!("assistant ready");
        Ok(())
    }

    async fn open_index(&self) -> Result<Arc<dyn VectorIndex>, DomainError> {
        let db_name = self.settings.db_name.as_str();
        if !self.settings.rebuild_index && self.index.exists(db_name).await? {
            info!(db_name, "loading persisted index");
            return self.index.load(db_name).await;
        }

        let folder = &self.settings.source_folder;
        let source_type = self.settings.source_type;
        let documents = match self.loader.load(folder, source_type).await {
            Ok(documents) => documents,
            Err(DomainError::NotFound(msg)) => return Err(DomainError::no_documents(msg)),
            Err(e) => return Err(e),
        };
        if documents.is_empty() {
            return Err(DomainError::no_documents(format!(
                "no {source_type} documents in {}",
                folder.display()
            )));
        }

        let splitter = TextSplitter::new(self.settings.chunk_size, self.settings.chunk_overlap)?;
        let chunks = splitter.split_documents(&documents);
        if chunks.is_empty() {
            return Err(DomainError::no_documents(format!(
                "documents in {} contain no text",
                folder.display()
            )));
        }

        info!(
            documents = documents.len(),
            chunks = chunks.len(),
            "building index"
        );
        self.index.build(&chunks, db_name).await
    }

    fn session(&self) -> Result<&Session, DomainError> {
        match &self.state {
            State::Ready(session) => Ok(session),
            State::Uninitialized => Err(DomainError::NotReady),
        }
    }

    fn session_mut(&mut self) -> Result<&mut Session, DomainError> {
        match &mut self.state {
            State::Ready(session) => Ok(session),
            State::Uninitialized => Err(DomainError::NotReady),
        }
    }

    pub async fn chat(&mut self, question: &str) -> Result<String, DomainError> {
        Ok(self.ask(question).await?.answer)
    }

    /// Like [`Assistant::chat`] but keeps the retrieved sources.
    pub async fn ask(&mut self, question: &str) -> Result<ChainAnswer, DomainError> {
        self.session_mut()?.chain.invoke(question).await
    }

    /// Streams fragments to `sink`; the channel closes when the answer ends.
    pub async fn chat_streaming(
        &mut self,
        question: &str,
        sink: mpsc::Sender<String>,
    ) -> Result<String, DomainError> {
        let session = self.session_mut()?;
        Ok(session.chain.invoke_streaming(question, sink).await?.answer)
    }

    /// Starts a fresh conversation over the same index.
    pub fn new_chat(&mut self) -> Result<(), DomainError> {
        let session = self.session_mut()?;
        session.chain = session.chain.reset();
        info!("new conversation started");
        Ok(())
    }

    pub fn history(&self) -> Result<&ConversationMemory, DomainError> {
        Ok(self.session()?.chain.memory())
    }

    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>, DomainError> {
        self.session()?.retriever.search(query).await
    }
}
