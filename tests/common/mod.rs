//! In-memory backend used by the integration tests: same contract as a real
//! adapter, plus knobs for failure injection and call counting.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::{broadcast, mpsc};

use jobtrack::models::{Attachment, JobDraft, JobRecord, RecordId};
use jobtrack::store::{BlobStore, JobCollection, StoreError, Subscription};

#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

struct Inner {
    records: Mutex<Vec<JobRecord>>,
    next_id: AtomicU64,
    changes: broadcast::Sender<String>,
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    removed: Mutex<Vec<String>>,
    failing_uploads: Mutex<Vec<String>>,
    subscribe_error: Mutex<Option<StoreError>>,
    insert_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(32);
        Self {
            inner: Arc::new(Inner {
                records: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                changes,
                blobs: Mutex::new(HashMap::new()),
                removed: Mutex::new(Vec::new()),
                failing_uploads: Mutex::new(Vec::new()),
                subscribe_error: Mutex::new(None),
                insert_calls: AtomicUsize::new(0),
            }),
        }
    }

    /// Uploads whose path contains `needle` will fail with Unavailable.
    pub fn fail_uploads_containing(&self, needle: &str) {
        self.inner
            .failing_uploads
            .lock()
            .unwrap()
            .push(needle.to_string());
    }

    /// The next subscription delivers this error as its first event.
    pub fn set_subscribe_error(&self, err: StoreError) {
        *self.inner.subscribe_error.lock().unwrap() = Some(err);
    }

    /// Inject a record as the backend would hold it, bypassing the insert
    /// path (e.g. to simulate a pending server timestamp).
    pub fn push_raw(&self, record: JobRecord) {
        let owner = record.owner_id.clone();
        self.inner.records.lock().unwrap().push(record);
        let _ = self.inner.changes.send(owner);
    }

    pub fn insert_calls(&self) -> usize {
        self.inner.insert_calls.load(Ordering::SeqCst)
    }

    pub fn stored_blob_count(&self) -> usize {
        self.inner.blobs.lock().unwrap().len()
    }

    pub fn removed_paths(&self) -> Vec<String> {
        self.inner.removed.lock().unwrap().clone()
    }

    fn snapshot(&self, owner_id: &str) -> Vec<JobRecord> {
        let mut records: Vec<JobRecord> = self
            .inner
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        // created_at descending, newest insert first on ties
        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| numeric_id(&b.id).cmp(&numeric_id(&a.id)))
        });
        records
    }
}

fn numeric_id(id: &RecordId) -> u64 {
    id.as_str().parse().unwrap_or(0)
}

impl JobCollection for MemoryStore {
    async fn subscribe(&self, owner_id: &str) -> Subscription {
        let (tx, rx) = mpsc::channel(16);
        let store = self.clone();
        let owner = owner_id.to_string();
        let mut changes = self.inner.changes.subscribe();
        let pending_error = self.inner.subscribe_error.lock().unwrap().take();

        tokio::spawn(async move {
            let first = match pending_error {
                Some(err) => Err(err),
                None => Ok(store.snapshot(&owner)),
            };
            if tx.send(first).await.is_err() {
                return;
            }
            loop {
                match changes.recv().await {
                    Ok(changed) if changed == owner => {
                        if tx.send(Ok(store.snapshot(&owner))).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => {
                        if tx.send(Ok(store.snapshot(&owner))).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Subscription::new(rx)
    }

    async fn insert(
        &self,
        owner_id: &str,
        draft: &JobDraft,
        attachments: &[Attachment],
    ) -> Result<RecordId, StoreError> {
        self.inner.insert_calls.fetch_add(1, Ordering::SeqCst);
        let id = RecordId::new(
            self.inner
                .next_id
                .fetch_add(1, Ordering::SeqCst)
                .to_string(),
        );
        let now = Utc::now();
        let record = JobRecord {
            id: id.clone(),
            owner_id: owner_id.to_string(),
            company: draft.company.clone(),
            role: draft.role.clone(),
            location: draft.location.clone(),
            salary: draft.salary.clone(),
            currency: draft.currency.clone(),
            status: draft.status,
            job_url: draft.job_url.clone(),
            notes: draft.notes.clone(),
            attachments: attachments.to_vec(),
            created_at: Some(now),
            updated_at: Some(now),
        };
        self.inner.records.lock().unwrap().push(record);
        let _ = self.inner.changes.send(owner_id.to_string());
        Ok(id)
    }

    async fn update(&self, id: &RecordId, draft: &JobDraft) -> Result<(), StoreError> {
        let owner = {
            let mut records = self.inner.records.lock().unwrap();
            let Some(record) = records.iter_mut().find(|r| &r.id == id) else {
                return Err(StoreError::Unknown(format!("record {} not found", id)));
            };
            record.company = draft.company.clone();
            record.role = draft.role.clone();
            record.location = draft.location.clone();
            record.salary = draft.salary.clone();
            record.currency = draft.currency.clone();
            record.status = draft.status;
            record.job_url = draft.job_url.clone();
            record.notes = draft.notes.clone();
            record.updated_at = Some(Utc::now());
            record.owner_id.clone()
        };
        let _ = self.inner.changes.send(owner);
        Ok(())
    }

    async fn delete(&self, id: &RecordId) -> Result<(), StoreError> {
        let owner = {
            let mut records = self.inner.records.lock().unwrap();
            let Some(pos) = records.iter().position(|r| &r.id == id) else {
                return Err(StoreError::Unknown(format!("record {} not found", id)));
            };
            records.remove(pos).owner_id
        };
        let _ = self.inner.changes.send(owner);
        Ok(())
    }
}

impl BlobStore for MemoryStore {
    async fn upload(&self, path: &str, bytes: &[u8]) -> Result<String, StoreError> {
        let failing = self.inner.failing_uploads.lock().unwrap();
        if failing.iter().any(|needle| path.contains(needle.as_str())) {
            return Err(StoreError::Unavailable("simulated upload failure".to_string()));
        }
        drop(failing);
        self.inner
            .blobs
            .lock()
            .unwrap()
            .insert(path.to_string(), bytes.to_vec());
        Ok(format!("mem://{}", path))
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        self.inner.blobs.lock().unwrap().remove(path);
        self.inner.removed.lock().unwrap().push(path.to_string());
        Ok(())
    }
}
