//! Retrieval pipeline.
//!
//! Ingestion runs chunker → index; answering runs index search → context
//! assembly → completion → citation parsing.

use chrono::Utc;
use futures::stream::{self, BoxStream, StreamExt};
use ragcite_cite::{CitationParser, build_source_citations};
use ragcite_core::{
    AnnotatedText, BlockQuote, ChatMessage, Chunk, Chunker, CompletionProvider,
    CompletionRequest, CompletionStream, Conversation, DocumentLookup, DocumentRecord,
    DocumentStatus, Error, Repository, Result, Role, ScopeFilter, SourceCitation, StreamEvent,
};
use ragcite_store::MemoryRepository;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::index::VectorIndex;
use crate::ingest::{IngestionHandle, NewDocument};
use crate::prompt::{build_context, system_prompt};

/// Pipeline tuning.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Chunks retrieved per question
    pub retrieval_limit: usize,
    /// Prior conversation messages forwarded to the completion provider
    pub history_messages: usize,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retrieval_limit: 5,
            history_messages: 6,
            max_tokens: 1000,
            temperature: 0.7,
        }
    }
}

/// A question to answer.
#[derive(Debug, Clone)]
pub struct AnswerRequest {
    pub message: String,
    /// Existing conversation to continue; a new one is created when absent
    pub conversation_id: Option<String>,
    pub scope: Option<ScopeFilter>,
    /// Overrides [`PipelineConfig::retrieval_limit`]
    pub limit: Option<usize>,
    pub include_sources: bool,
    pub use_annotations: bool,
}

impl AnswerRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            conversation_id: None,
            scope: None,
            limit: None,
            include_sources: true,
            use_annotations: true,
        }
    }

    #[must_use]
    pub fn in_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    #[must_use]
    pub fn with_scope(mut self, scope: ScopeFilter) -> Self {
        self.scope = Some(scope);
        self
    }
}

/// A grounded answer.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub response: String,
    pub conversation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotated_response: Option<AnnotatedText>,
    pub block_quotes: Vec<BlockQuote>,
    pub sources: Vec<SourceCitation>,
    /// Whitespace-separated words in the response
    pub tokens_used: usize,
    pub response_time_ms: u64,
    pub has_annotations: bool,
}

/// One event of a streamed answer.
#[derive(Debug, Clone)]
pub enum AnswerEvent {
    /// Response text, in order
    Fragment(String),
    /// The assembled answer with citations; always the last event
    Done(Box<Answer>),
}

/// Everything needed to finish an answer once the response text is known.
struct Prepared {
    request: AnswerRequest,
    conversation: Conversation,
    chunks: Vec<Chunk>,
    completion: CompletionRequest,
    started: Instant,
}

/// Composition of chunker, vector index, completion provider and citation parser.
#[derive(Clone)]
pub struct RetrievalPipeline {
    chunker: Arc<dyn Chunker>,
    index: Arc<VectorIndex>,
    completion: Arc<dyn CompletionProvider>,
    parser: CitationParser,
    documents: Arc<dyn Repository<DocumentRecord>>,
    conversations: Arc<dyn Repository<Conversation>>,
    lookup: Option<Arc<dyn DocumentLookup>>,
    config: PipelineConfig,
}

impl RetrievalPipeline {
    /// Create a pipeline with in-memory document and conversation repositories.
    pub fn new(
        chunker: Arc<dyn Chunker>,
        index: Arc<VectorIndex>,
        completion: Arc<dyn CompletionProvider>,
    ) -> Self {
        Self {
            chunker,
            index,
            completion,
            parser: CitationParser::new(),
            documents: Arc::new(MemoryRepository::new()),
            conversations: Arc::new(MemoryRepository::new()),
            lookup: None,
            config: PipelineConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_documents(mut self, documents: Arc<dyn Repository<DocumentRecord>>) -> Self {
        self.documents = documents;
        self
    }

    #[must_use]
    pub fn with_conversations(mut self, conversations: Arc<dyn Repository<Conversation>>) -> Self {
        self.conversations = conversations;
        self
    }

    /// Fill missing document names, pages and sections from `lookup`.
    #[must_use]
    pub fn with_lookup(mut self, lookup: Arc<dyn DocumentLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    // ========== Documents ==========

    /// Chunk and index a document, waiting for the result.
    pub async fn ingest(&self, document: NewDocument) -> Result<DocumentRecord> {
        let (status, _) = watch::channel(DocumentStatus::Pending);
        self.run_ingest(document, status, CancellationToken::new())
            .await
    }

    /// Chunk and index a document in a background task.
    pub fn spawn_ingest(&self, document: NewDocument) -> IngestionHandle {
        let (status_tx, status_rx) = watch::channel(DocumentStatus::Pending);
        let cancel = CancellationToken::new();
        let document_id = document.id.clone();

        let pipeline = self.clone();
        let token = cancel.clone();
        let task =
            tokio::spawn(async move { pipeline.run_ingest(document, status_tx, token).await });

        IngestionHandle::new(document_id, status_rx, cancel, task)
    }

    /// Remove a document's vectors and record. Returns whether a record existed.
    pub async fn delete_document(&self, document_id: &str) -> Result<bool> {
        self.index.delete(document_id).await?;
        self.documents.delete(document_id).await
    }

    pub async fn document(&self, document_id: &str) -> Result<Option<DocumentRecord>> {
        self.documents.get(document_id).await
    }

    pub async fn documents(&self) -> Result<Vec<DocumentRecord>> {
        self.documents.list().await
    }

    async fn run_ingest(
        &self,
        document: NewDocument,
        status: watch::Sender<DocumentStatus>,
        cancel: CancellationToken,
    ) -> Result<DocumentRecord> {
        if document.id.trim().is_empty() {
            return Err(Error::Validation("document id must not be empty".to_string()));
        }

        let mut record = DocumentRecord::new(document.id.clone(), document.name.clone());
        record.knowledge_base_id.clone_from(&document.knowledge_base_id);
        record.page_count = document.page_count;
        self.documents.put(&record.id, record.clone()).await?;

        self.transition(&mut record, DocumentStatus::Processing, &status)
            .await?;
        info!("Processing document {} ({})", record.id, record.name);

        let result = cancellable(&cancel, self.index_document(&document)).await;
        match result {
            Ok(chunk_count) => {
                record.chunk_count = chunk_count;
                self.transition(&mut record, DocumentStatus::Completed, &status)
                    .await?;
                info!("Indexed document {} ({} chunks)", record.id, chunk_count);
                Ok(record)
            }
            Err(Error::Cancelled) => {
                warn!("Ingestion of document {} cancelled", record.id);
                self.transition(&mut record, DocumentStatus::Cancelled, &status)
                    .await?;
                Err(Error::Cancelled)
            }
            Err(e) => {
                error!("Failed to index document {}: {}", record.id, e);
                record.error_message = Some(e.to_string());
                self.transition(&mut record, DocumentStatus::Failed, &status)
                    .await?;
                Err(e)
            }
        }
    }

    async fn index_document(&self, document: &NewDocument) -> Result<u32> {
        let mut chunks = self.chunker.chunk(&document.id, &document.text);
        for chunk in &mut chunks {
            chunk.metadata.document_name = Some(document.name.clone());
            chunk
                .metadata
                .knowledge_base_id
                .clone_from(&document.knowledge_base_id);
        }
        debug!("Chunked document {} into {} chunks", document.id, chunks.len());

        // Reprocessing deletes before storing
        self.index.replace(&document.id, &chunks).await
    }

    async fn transition(
        &self,
        record: &mut DocumentRecord,
        next: DocumentStatus,
        status: &watch::Sender<DocumentStatus>,
    ) -> Result<()> {
        record.status = next;
        record.updated_at = Utc::now();
        self.documents.put(&record.id, record.clone()).await?;
        status.send_replace(next);
        Ok(())
    }

    // ========== Answers ==========

    /// Answer a question from the indexed documents.
    pub async fn answer(&self, request: AnswerRequest, cancel: &CancellationToken) -> Result<Answer> {
        let prepared = cancellable(cancel, self.prepare(request)).await?;
        let response = cancellable(cancel, async {
            Ok(self.completion.complete(&prepared.completion).await?)
        })
        .await?;
        self.finish(prepared, response).await
    }

    /// Answer a question, yielding response fragments as they arrive.
    ///
    /// The stream ends with [`AnswerEvent::Done`] carrying the parsed answer,
    /// or with a single error. Cancelling `cancel` ends it with
    /// [`Error::Cancelled`] and skips citation parsing.
    pub async fn answer_streaming(
        &self,
        request: AnswerRequest,
        cancel: CancellationToken,
    ) -> Result<BoxStream<'static, Result<AnswerEvent>>> {
        let prepared = cancellable(&cancel, self.prepare(request)).await?;
        let completion = Arc::clone(&self.completion);
        let inner = cancellable(&cancel, async {
            Ok(completion.complete_stream(&prepared.completion).await?)
        })
        .await?;

        let state = StreamState {
            pipeline: self.clone(),
            prepared: Some(prepared),
            inner,
            text: String::new(),
            cancel,
        };

        Ok(stream::unfold(state, |mut state| async move {
            let prepared = state.prepared.take()?;
            let next = tokio::select! {
                biased;
                () = state.cancel.cancelled() => {
                    debug!("Streaming answer cancelled");
                    return Some((Err(Error::Cancelled), state));
                }
                next = state.inner.next() => next,
            };

            match next {
                Some(Ok(StreamEvent::Fragment(fragment))) => {
                    state.text.push_str(&fragment);
                    state.prepared = Some(prepared);
                    Some((Ok(AnswerEvent::Fragment(fragment)), state))
                }
                Some(Ok(StreamEvent::Done)) | None => {
                    let text = std::mem::take(&mut state.text);
                    let answer = state.pipeline.finish(prepared, text).await;
                    Some((answer.map(|a| AnswerEvent::Done(Box::new(a))), state))
                }
                Some(Err(e)) => Some((Err(e.into()), state)),
            }
        })
        .boxed())
    }

    /// Retrieve context and build the completion request.
    async fn prepare(&self, request: AnswerRequest) -> Result<Prepared> {
        if request.message.trim().is_empty() {
            return Err(Error::Validation("message must not be empty".to_string()));
        }
        let started = Instant::now();

        let conversation = match &request.conversation_id {
            Some(id) => self
                .conversations
                .get(id)
                .await?
                .unwrap_or_else(|| Conversation::new(id.clone())),
            None => Conversation::new(Uuid::new_v4().to_string()),
        };

        let limit = request.limit.unwrap_or(self.config.retrieval_limit);
        let results = self
            .index
            .search(&request.message, request.scope.as_ref(), limit)
            .await?;
        let mut chunks: Vec<Chunk> = results.into_iter().map(|r| r.chunk).collect();
        self.enrich(&mut chunks).await;

        let context = build_context(&chunks);
        let completion = CompletionRequest {
            system_prompt: system_prompt(&context, request.use_annotations),
            history: conversation
                .recent(self.config.history_messages)
                .to_vec(),
            user_message: request.message.clone(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        Ok(Prepared {
            request,
            conversation,
            chunks,
            completion,
            started,
        })
    }

    /// Parse citations, record the exchange and assemble the answer.
    async fn finish(&self, prepared: Prepared, response: String) -> Result<Answer> {
        let Prepared {
            request,
            mut conversation,
            chunks,
            started,
            ..
        } = prepared;

        let mut annotated_response = None;
        let mut block_quotes = Vec::new();
        if request.use_annotations && !chunks.is_empty() {
            annotated_response = Some(self.parser.parse(&response, &chunks));
            block_quotes = self.parser.extract_block_quotes(&response, &chunks);
        }

        let sources = if request.include_sources {
            let annotations = annotated_response
                .as_ref()
                .map_or(&[][..], |a| a.annotations.as_slice());
            build_source_citations(&chunks, annotations)
        } else {
            Vec::new()
        };

        conversation.push(ChatMessage::new(Role::User, request.message.clone()));
        conversation.push(ChatMessage::new(Role::Assistant, response.clone()));
        self.conversations
            .put(&conversation.id, conversation.clone())
            .await?;

        let has_annotations = annotated_response
            .as_ref()
            .is_some_and(|a| !a.annotations.is_empty());

        Ok(Answer {
            tokens_used: response.split_whitespace().count(),
            response,
            conversation_id: conversation.id,
            annotated_response,
            block_quotes,
            sources,
            response_time_ms: elapsed_ms(started.elapsed()),
            has_annotations,
        })
    }

    async fn enrich(&self, chunks: &mut [Chunk]) {
        let Some(lookup) = &self.lookup else {
            return;
        };
        for chunk in chunks {
            let Some(info) = lookup.lookup(&chunk.document_id).await else {
                continue;
            };
            let metadata = &mut chunk.metadata;
            if metadata.document_name.is_none() {
                metadata.document_name = Some(info.name);
            }
            if metadata.page_number.is_none() {
                metadata.page_number = info.page;
            }
            if metadata.section_title.is_none() {
                metadata.section_title = info.section;
            }
        }
    }

    // ========== Conversations ==========

    pub async fn conversation(&self, conversation_id: &str) -> Result<Option<Conversation>> {
        self.conversations.get(conversation_id).await
    }

    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<bool> {
        self.conversations.delete(conversation_id).await
    }
}

struct StreamState {
    pipeline: RetrievalPipeline,
    /// Taken once the stream has ended
    prepared: Option<Prepared>,
    inner: CompletionStream,
    text: String,
    cancel: CancellationToken,
}

/// Run `fut`, giving up with [`Error::Cancelled`] once `cancel` fires.
async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}

fn elapsed_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
