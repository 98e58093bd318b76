use std::time::Duration;

use tokio::time::timeout;

use jobtrack::local::LocalStore;
use jobtrack::models::{JobDraft, Session, Status};
use jobtrack::store::{BlobStore, JobCollection, StoreError};
use jobtrack::sync;

fn draft(company: &str, role: &str) -> JobDraft {
    JobDraft {
        company: company.to_string(),
        role: role.to_string(),
        ..JobDraft::default()
    }
}

fn open_store(dir: &tempfile::TempDir) -> LocalStore {
    LocalStore::open_at(dir.path().join("jobtrack.db"), dir.path().join("blobs"))
        .expect("failed to open store")
}

#[tokio::test]
async fn insert_assigns_id_and_timestamps() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);

    let id = store.insert("u1", &draft("Acme", "Engineer"), &[]).await.unwrap();

    let mut sub = store.subscribe("u1").await;
    let records = sub.next_event().await.unwrap().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, id);
    assert_eq!(records[0].owner_id, "u1");
    assert_eq!(records[0].currency, "PHP");
    assert!(records[0].created_at.is_some());
    assert!(records[0].updated_at.is_some());
}

#[tokio::test]
async fn snapshots_are_owner_scoped_and_newest_first() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);

    let first = store.insert("u1", &draft("Acme", "Engineer"), &[]).await.unwrap();
    let second = store.insert("u1", &draft("Globex", "Designer"), &[]).await.unwrap();
    store.insert("u2", &draft("Initech", "Analyst"), &[]).await.unwrap();

    let mut sub = store.subscribe("u1").await;
    let records = sub.next_event().await.unwrap().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, second);
    assert_eq!(records[1].id, first);
}

#[tokio::test]
async fn mutations_push_fresh_snapshots_to_subscribers() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let session = Session::new("u1");

    let handle = sync::start(&store, &session).await;
    let mut rx = handle.watch();
    timeout(Duration::from_secs(5), rx.wait_for(|s| !s.loading))
        .await
        .unwrap()
        .unwrap();

    let id = store.insert("u1", &draft("Acme", "Engineer"), &[]).await.unwrap();
    timeout(Duration::from_secs(5), rx.wait_for(|s| s.records.len() == 1))
        .await
        .unwrap()
        .unwrap();

    let mut changed = draft("Acme", "Engineer");
    changed.status = Status::Offer;
    changed.salary = "120,000".to_string();
    store.update(&id, &changed).await.unwrap();
    timeout(
        Duration::from_secs(5),
        rx.wait_for(|s| s.records.first().map(|r| r.status) == Some(Status::Offer)),
    )
    .await
    .unwrap()
    .unwrap();

    store.delete(&id).await.unwrap();
    timeout(Duration::from_secs(5), rx.wait_for(|s| s.records.is_empty()))
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn update_and_delete_of_missing_records_fail_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);

    let missing = jobtrack::models::RecordId::new("12345");
    assert!(matches!(
        store.update(&missing, &draft("Acme", "Engineer")).await,
        Err(StoreError::Unknown(_))
    ));
    assert!(matches!(
        store.delete(&missing).await,
        Err(StoreError::Unknown(_))
    ));

    let malformed = jobtrack::models::RecordId::new("not-a-number");
    assert!(matches!(
        store.delete(&malformed).await,
        Err(StoreError::Unknown(_))
    ));
}

#[tokio::test]
async fn records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = open_store(&dir);
        store.insert("u1", &draft("Acme", "Engineer"), &[]).await.unwrap();
    }

    let store = open_store(&dir);
    let mut sub = store.subscribe("u1").await;
    let records = sub.next_event().await.unwrap().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].company, "Acme");
}

#[tokio::test]
async fn blob_upload_writes_file_and_remove_is_forgiving() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);

    let url = store
        .upload("attachments/u1/123_resume.pdf", b"pdf bytes")
        .await
        .unwrap();
    assert!(url.starts_with("file://"));

    let on_disk = dir.path().join("blobs/attachments/u1/123_resume.pdf");
    assert_eq!(std::fs::read(&on_disk).unwrap(), b"pdf bytes");

    store.remove("attachments/u1/123_resume.pdf").await.unwrap();
    assert!(!on_disk.exists());
    // Removing again is not an error.
    store.remove("attachments/u1/123_resume.pdf").await.unwrap();
}
