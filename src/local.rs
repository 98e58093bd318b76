use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use tokio::sync::{broadcast, mpsc};

use crate::models::{Attachment, JobDraft, JobRecord, RecordId, Status};
use crate::store::{BlobStore, JobCollection, StoreError, Subscription};

/// Local stand-in for the hosted document/blob backend: records in sqlite,
/// attachments as files next to the database. Implements the same contract
/// a remote adapter would, including the push subscription, so the rest of
/// the app cannot tell the difference.
#[derive(Clone)]
pub struct LocalStore {
    inner: Arc<Inner>,
}

struct Inner {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    blob_root: PathBuf,
    // Owner ids whose records changed; subscription feeders re-query on it.
    changes: broadcast::Sender<String>,
}

impl LocalStore {
    pub fn open() -> Result<Self> {
        let data_dir = Self::default_data_dir()?;
        Self::open_at(data_dir.join("jobtrack.db"), data_dir.join("attachments"))
    }

    pub fn open_at(db_path: impl Into<PathBuf>, blob_root: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let blob_root = blob_root.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::create_dir_all(&blob_root)?;

        let conn = Connection::open(&db_path)
            .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id TEXT NOT NULL,
                company TEXT NOT NULL,
                role TEXT NOT NULL,
                location TEXT NOT NULL DEFAULT '',
                salary TEXT NOT NULL DEFAULT '',
                currency TEXT NOT NULL DEFAULT 'PHP',
                status TEXT NOT NULL DEFAULT 'applied'
                    CHECK (status IN ('applied', 'interview', 'offer', 'rejected', 'withdrawn')),
                job_url TEXT NOT NULL DEFAULT '',
                notes TEXT NOT NULL DEFAULT '',
                attachments TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_owner ON jobs(owner_id);
            CREATE INDEX IF NOT EXISTS idx_jobs_owner_created ON jobs(owner_id, created_at);
            "#,
        )?;

        let (changes, _) = broadcast::channel(32);
        Ok(Self {
            inner: Arc::new(Inner {
                conn: Mutex::new(conn),
                db_path,
                blob_root,
                changes,
            }),
        })
    }

    fn default_data_dir() -> Result<PathBuf> {
        // XDG data directory or fallback to the working directory
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "jobtrack") {
            Ok(proj_dirs.data_dir().to_path_buf())
        } else {
            Ok(PathBuf::from("."))
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.inner.db_path
    }

    pub fn blob_root(&self) -> &Path {
        &self.inner.blob_root
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.inner
            .conn
            .lock()
            .map_err(|_| StoreError::Unknown("connection lock poisoned".to_string()))
    }

    fn notify(&self, owner_id: &str) {
        // No receivers is fine; nobody is watching.
        let _ = self.inner.changes.send(owner_id.to_string());
    }

    fn load_snapshot(&self, owner_id: &str) -> Result<Vec<JobRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, company, role, location, salary, currency, status,
                    job_url, notes, attachments, created_at, updated_at
             FROM jobs WHERE owner_id = ?1
             ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt.query_map([owner_id], row_to_record)?;
        let records = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn owner_of(&self, id: i64) -> Result<Option<String>, StoreError> {
        let conn = self.conn()?;
        match conn.query_row("SELECT owner_id FROM jobs WHERE id = ?1", [id], |row| {
            row.get(0)
        }) {
            Ok(owner) => Ok(Some(owner)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl JobCollection for LocalStore {
    async fn subscribe(&self, owner_id: &str) -> Subscription {
        let (tx, rx) = mpsc::channel(16);
        let store = self.clone();
        let owner = owner_id.to_string();
        let mut changes = self.inner.changes.subscribe();

        tokio::spawn(async move {
            if tx.send(store.load_snapshot(&owner)).await.is_err() {
                return;
            }
            loop {
                match changes.recv().await {
                    Ok(changed) if changed == owner => {
                        if tx.send(store.load_snapshot(&owner)).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    // Missed notifications; a fresh snapshot covers them all.
                    Err(broadcast::error::RecvError::Lagged(_)) => {
                        if tx.send(store.load_snapshot(&owner)).await.is_err() {
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
        let attachments_json =
            serde_json::to_string(attachments).map_err(|e| StoreError::Unknown(e.to_string()))?;
        let now = Utc::now().to_rfc3339();
        let id = {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO jobs (owner_id, company, role, location, salary, currency, status,
                                   job_url, notes, attachments, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
                params![
                    owner_id,
                    draft.company,
                    draft.role,
                    draft.location,
                    draft.salary,
                    draft.currency,
                    draft.status.as_str(),
                    draft.job_url,
                    draft.notes,
                    attachments_json,
                    now,
                ],
            )?;
            conn.last_insert_rowid()
        };
        self.notify(owner_id);
        Ok(RecordId::new(id.to_string()))
    }

    async fn update(&self, id: &RecordId, draft: &JobDraft) -> Result<(), StoreError> {
        let row_id = parse_row_id(id)?;
        let Some(owner) = self.owner_of(row_id)? else {
            return Err(StoreError::Unknown(format!("record {} not found", id)));
        };
        let now = Utc::now().to_rfc3339();
        {
            let conn = self.conn()?;
            conn.execute(
                "UPDATE jobs
                 SET company = ?1, role = ?2, location = ?3, salary = ?4, currency = ?5,
                     status = ?6, job_url = ?7, notes = ?8, updated_at = ?9
                 WHERE id = ?10",
                params![
                    draft.company,
                    draft.role,
                    draft.location,
                    draft.salary,
                    draft.currency,
                    draft.status.as_str(),
                    draft.job_url,
                    draft.notes,
                    now,
                    row_id,
                ],
            )?;
        }
        self.notify(&owner);
        Ok(())
    }

    async fn delete(&self, id: &RecordId) -> Result<(), StoreError> {
        let row_id = parse_row_id(id)?;
        let Some(owner) = self.owner_of(row_id)? else {
            return Err(StoreError::Unknown(format!("record {} not found", id)));
        };
        {
            let conn = self.conn()?;
            conn.execute("DELETE FROM jobs WHERE id = ?1", [row_id])?;
        }
        self.notify(&owner);
        Ok(())
    }
}

impl BlobStore for LocalStore {
    async fn upload(&self, path: &str, bytes: &[u8]) -> Result<String, StoreError> {
        let dest = self.inner.blob_root.join(path);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        }
        tokio::fs::write(&dest, bytes)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(format!("file://{}", dest.display()))
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        let dest = self.inner.blob_root.join(path);
        match tokio::fs::remove_file(&dest).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Unavailable(e.to_string())),
        }
    }
}

fn parse_row_id(id: &RecordId) -> Result<i64, StoreError> {
    id.as_str()
        .parse::<i64>()
        .map_err(|_| StoreError::Unknown(format!("malformed record id '{}'", id)))
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<JobRecord> {
    let id: i64 = row.get(0)?;
    let status: String = row.get(7)?;
    let attachments_json: String = row.get(10)?;
    let created_at: String = row.get(11)?;
    let updated_at: String = row.get(12)?;

    Ok(JobRecord {
        id: RecordId::new(id.to_string()),
        owner_id: row.get(1)?,
        company: row.get(2)?,
        role: row.get(3)?,
        location: row.get(4)?,
        salary: row.get(5)?,
        currency: row.get(6)?,
        status: status.parse::<Status>().unwrap_or_default(),
        job_url: row.get(8)?,
        notes: row.get(9)?,
        attachments: serde_json::from_str(&attachments_json).unwrap_or_default(),
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    })
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        StoreError::Unknown(value.to_string())
    }
}
