//! Background ingestion handles.

use ragcite_core::{DocumentRecord, DocumentStatus, Error, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A document to ingest.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub id: String,
    pub name: String,
    /// Extracted plain text
    pub text: String,
    pub knowledge_base_id: Option<String>,
    pub page_count: Option<u32>,
}

impl NewDocument {
    pub fn new(id: impl Into<String>, name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            text: text.into(),
            knowledge_base_id: None,
            page_count: None,
        }
    }

    #[must_use]
    pub fn with_knowledge_base(mut self, knowledge_base_id: impl Into<String>) -> Self {
        self.knowledge_base_id = Some(knowledge_base_id.into());
        self
    }
}

/// Handle to an ingestion running in the background.
///
/// The status can be observed while the task runs; dropping the handle does
/// not stop the task.
pub struct IngestionHandle {
    document_id: String,
    status: watch::Receiver<DocumentStatus>,
    cancel: CancellationToken,
    task: JoinHandle<Result<DocumentRecord>>,
}

impl IngestionHandle {
    pub(crate) fn new(
        document_id: String,
        status: watch::Receiver<DocumentStatus>,
        cancel: CancellationToken,
        task: JoinHandle<Result<DocumentRecord>>,
    ) -> Self {
        Self {
            document_id,
            status,
            cancel,
            task,
        }
    }

    /// Document being ingested.
    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    /// Current status.
    pub fn status(&self) -> DocumentStatus {
        *self.status.borrow()
    }

    /// A receiver that sees every later status change.
    pub fn subscribe(&self) -> watch::Receiver<DocumentStatus> {
        self.status.clone()
    }

    /// Request cancellation. Chunks already stored are kept.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the task to finish.
    pub async fn wait(self) -> Result<DocumentRecord> {
        self.task
            .await
            .map_err(|e| Error::Other(format!("ingestion task failed: {e}")))?
    }
}
