use chrono::Utc;
use thiserror::Error;

use crate::models::{Attachment, JobDraft, RecordId, Session, ValidationError};
use crate::store::{BlobStore, JobCollection, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("attachment upload failed: {0}")]
    UploadFailed(StoreError),
    #[error("failed to add job application: {0}")]
    Create(StoreError),
    #[error("failed to update job application: {0}")]
    Update(StoreError),
    #[error("failed to delete job application: {0}")]
    Delete(StoreError),
}

/// File contents picked for upload alongside a new record.
#[derive(Debug, Clone)]
pub struct AttachmentSource {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Validated create/update/delete against the collection. Effects show up
/// in the live view only once the next snapshot arrives; nothing here
/// mutates local state.
pub struct Gateway<'a, C, B> {
    collection: &'a C,
    blobs: &'a B,
}

impl<'a, C: JobCollection, B: BlobStore> Gateway<'a, C, B> {
    pub fn new(collection: &'a C, blobs: &'a B) -> Self {
        Self { collection, blobs }
    }

    /// Upload all attachments, then write one record. Validation runs before
    /// anything touches the network. The create is all-or-nothing: if any
    /// upload fails, or the insert itself does, no record is written and
    /// blobs that already made it up are removed best-effort.
    pub async fn create(
        &self,
        session: &Session,
        draft: JobDraft,
        files: Vec<AttachmentSource>,
    ) -> Result<RecordId, MutationError> {
        let draft = draft.validate()?;

        let stamp = Utc::now().timestamp_millis();
        let uploads = files.iter().map(|file| {
            let path = format!("attachments/{}/{}_{}", session.user_id, stamp, file.name);
            async move {
                let url = self.blobs.upload(&path, &file.bytes).await?;
                Ok::<_, StoreError>((
                    Attachment {
                        name: file.name.clone(),
                        url,
                        size: file.bytes.len() as u64,
                    },
                    path,
                ))
            }
        });

        // Fan out, then wait for every upload to settle so cleanup can see
        // the full set of blobs that landed.
        let results = futures::future::join_all(uploads).await;
        let mut attachments = Vec::with_capacity(results.len());
        let mut uploaded_paths = Vec::with_capacity(results.len());
        let mut failure = None;
        for result in results {
            match result {
                Ok((attachment, path)) => {
                    attachments.push(attachment);
                    uploaded_paths.push(path);
                }
                Err(err) => {
                    if failure.is_none() {
                        failure = Some(err);
                    }
                }
            }
        }
        if let Some(err) = failure {
            self.remove_blobs(&uploaded_paths).await;
            return Err(MutationError::UploadFailed(err));
        }

        let draft = draft.into_inner();
        match self
            .collection
            .insert(&session.user_id, &draft, &attachments)
            .await
        {
            Ok(id) => {
                tracing::debug!(user = %session.user_id, id = %id, "record created");
                Ok(id)
            }
            Err(err) => {
                self.remove_blobs(&uploaded_paths).await;
                Err(MutationError::Create(err))
            }
        }
    }

    /// Full-field overwrite plus an updated_at refresh; attachments are not
    /// touchable through update.
    pub async fn update(&self, id: &RecordId, draft: JobDraft) -> Result<(), MutationError> {
        let draft = draft.validate()?.into_inner();
        self.collection
            .update(id, &draft)
            .await
            .map_err(MutationError::Update)?;
        tracing::debug!(id = %id, "record updated");
        Ok(())
    }

    /// Remove the record. Confirmation is the caller's job; there is no
    /// undo. Attached blobs stay where they are, matching how the backend's
    /// own delete behaves.
    pub async fn delete(&self, id: &RecordId) -> Result<(), MutationError> {
        self.collection
            .delete(id)
            .await
            .map_err(MutationError::Delete)?;
        tracing::debug!(id = %id, "record deleted");
        Ok(())
    }

    async fn remove_blobs(&self, paths: &[String]) {
        for path in paths {
            if let Err(err) = self.blobs.remove(path).await {
                tracing::warn!(path = %path, error = %err, "failed to clean up attachment");
            }
        }
    }
}
