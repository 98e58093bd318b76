use thiserror::Error;
use tokio::sync::mpsc;

use crate::models::{Attachment, JobDraft, JobRecord, RecordId};

/// Failure kinds a backend can report. The core never inspects anything
/// beyond these; whatever the backend's native error looks like, adapters
/// fold it into one of them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("permission denied")]
    PermissionDenied,
    /// The backend's query index is still being built. Not a bug; retry
    /// later.
    #[error("backend precondition failed")]
    FailedPrecondition,
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage quota exceeded")]
    QuotaExceeded,
    #[error("{0}")]
    Unknown(String),
}

/// A complete point-in-time list of one owner's records, newest first.
/// Each snapshot supersedes the previous one entirely.
pub type Snapshot = Vec<JobRecord>;

pub type SnapshotEvent = Result<Snapshot, StoreError>;

/// Live feed of snapshot events for one owner. Dropping it releases the
/// subscription on the backend side.
pub struct Subscription {
    rx: mpsc::Receiver<SnapshotEvent>,
}

impl Subscription {
    pub fn new(rx: mpsc::Receiver<SnapshotEvent>) -> Self {
        Self { rx }
    }

    /// Next snapshot or error; `None` once the backend closes the feed.
    pub async fn next_event(&mut self) -> Option<SnapshotEvent> {
        self.rx.recv().await
    }
}

/// The document collection holding job records. Ordering (created_at
/// descending) and owner scoping are the adapter's job; consumers mirror
/// what they are given.
#[allow(async_fn_in_trait)]
pub trait JobCollection: Send + Sync {
    /// Open a live query for `owner_id`'s records. Errors, including ones
    /// that occur while establishing the query, arrive as events on the
    /// returned subscription.
    async fn subscribe(&self, owner_id: &str) -> Subscription;

    /// Insert one record. The backend assigns the id and both timestamps.
    async fn insert(
        &self,
        owner_id: &str,
        draft: &JobDraft,
        attachments: &[Attachment],
    ) -> Result<RecordId, StoreError>;

    /// Full-field overwrite of the draft-carried fields plus an updated_at
    /// refresh. Attachments and created_at are left untouched.
    async fn update(&self, id: &RecordId, draft: &JobDraft) -> Result<(), StoreError>;

    async fn delete(&self, id: &RecordId) -> Result<(), StoreError>;
}

/// Blob storage for attachments. Paths are chosen by the caller; the store
/// hands back a download URL.
#[allow(async_fn_in_trait)]
pub trait BlobStore: Send + Sync {
    async fn upload(&self, path: &str, bytes: &[u8]) -> Result<String, StoreError>;

    /// Best-effort removal, used to clean up after a failed create.
    /// Removing a path that does not exist is fine.
    async fn remove(&self, path: &str) -> Result<(), StoreError>;
}
