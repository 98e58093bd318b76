use chrono::Utc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::models::{JobRecord, Session};
use crate::store::{JobCollection, StoreError};

/// How a subscription failure reads to the user. Never fatal; the dashboard
/// shows a notice and keeps whatever list it had.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("You don't have access to these records.")]
    PermissionDenied,
    #[error("Database index is being created. Please wait a moment and retry.")]
    IndexNotReady,
    #[error("Failed to load job applications: {0}")]
    Unknown(String),
}

impl SyncError {
    fn classify(err: StoreError) -> Self {
        match err {
            StoreError::PermissionDenied => SyncError::PermissionDenied,
            StoreError::FailedPrecondition => SyncError::IndexNotReady,
            other => SyncError::Unknown(other.to_string()),
        }
    }
}

/// Latest known remote state for the session's records. `loading` is true
/// only until the first event (snapshot or error) arrives.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    /// Newest first, exactly as the last snapshot delivered them.
    pub records: Vec<JobRecord>,
    pub loading: bool,
    pub error: Option<SyncError>,
}

impl ViewState {
    fn initial() -> Self {
        Self {
            records: Vec::new(),
            loading: true,
            error: None,
        }
    }
}

/// Scoped handle on one live subscription. Acquire it when a session starts,
/// release it unconditionally on teardown; `stop` is idempotent and dropping
/// the handle stops it too. Starting a second subscription for the same
/// session without stopping the first leaks the first one.
pub struct SyncHandle {
    rx: watch::Receiver<ViewState>,
    task: Option<JoinHandle<()>>,
}

impl SyncHandle {
    /// Point-in-time view of the current state. Cheap; recompute derived
    /// views from it as often as needed.
    pub fn state(&self) -> watch::Ref<'_, ViewState> {
        self.rx.borrow()
    }

    /// Independent receiver for callers that want to await changes.
    pub fn watch(&self) -> watch::Receiver<ViewState> {
        self.rx.clone()
    }

    /// Wait for the loading state to reach a terminal transition and return
    /// what it settled on.
    pub async fn ready(&self) -> ViewState {
        let mut rx = self.rx.clone();
        match rx.wait_for(|s| !s.loading).await {
            Ok(state) => state.clone(),
            // Subscription ended before settling; report what we have.
            Err(_) => self.rx.borrow().clone(),
        }
    }

    /// Release the subscription. Safe to call more than once.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Open the live query for the session's records and keep a local mirror of
/// it until the handle is stopped. Every snapshot replaces the whole list;
/// there is no merging across events. Reconnection is the backend's
/// business, not ours.
pub async fn start<C: JobCollection>(collection: &C, session: &Session) -> SyncHandle {
    let mut subscription = collection.subscribe(&session.user_id).await;
    let (tx, rx) = watch::channel(ViewState::initial());
    let user_id = session.user_id.clone();

    let task = tokio::spawn(async move {
        while let Some(event) = subscription.next_event().await {
            match event {
                Ok(mut records) => {
                    // The backend stamps created_at after the write lands;
                    // until it does, treat the record as most-recent
                    // rather than crashing or sinking it to the bottom.
                    let now = Utc::now();
                    for record in &mut records {
                        if record.created_at.is_none() {
                            record.created_at = Some(now);
                        }
                    }
                    tracing::debug!(user = %user_id, count = records.len(), "snapshot received");
                    tx.send_replace(ViewState {
                        records,
                        loading: false,
                        error: None,
                    });
                }
                Err(err) => {
                    let classified = SyncError::classify(err);
                    tracing::warn!(user = %user_id, error = %classified, "subscription error");
                    tx.send_modify(|state| {
                        state.loading = false;
                        state.error = Some(classified);
                    });
                }
            }
        }
        tracing::debug!(user = %user_id, "subscription closed");
    });

    SyncHandle {
        rx,
        task: Some(task),
    }
}
