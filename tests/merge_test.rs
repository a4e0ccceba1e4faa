mod common;

use common::RecordingBackend;
use file_keeper::{
    FileEntity, FormatInfo, FormatterChoice, HookEvent, HookOutcome, MergeOptions,
    StorageCoordinator, StorageError, UploadInput, UploadOptions, UploadSource,
};
use std::sync::Arc;

fn coordinator() -> (Arc<RecordingBackend>, StorageCoordinator) {
    let backend = Arc::new(RecordingBackend::new());
    let coordinator = StorageCoordinator::new(backend.clone());
    (backend, coordinator)
}

fn entity(path: &str, hash: &str) -> FileEntity {
    FileEntity::new(path, path, 10, "text/plain", hash)
}

fn paths(entities: &[FileEntity]) -> Vec<&str> {
    entities.iter().map(|e| e.path.as_str()).collect()
}

#[tokio::test]
async fn test_merge_with_no_new_data_keeps_existing() {
    let (backend, coordinator) = coordinator();
    let existing = vec![entity("a", "h1"), entity("b", "h2"), entity("c", "h3")];

    let merged = coordinator
        .merge_entities(
            existing.clone(),
            Vec::<UploadInput>::new(),
            &MergeOptions::new(),
        )
        .await
        .unwrap();

    assert_eq!(merged, existing);
    assert_eq!(backend.write_count(), 0);
}

#[tokio::test]
async fn test_merge_into_empty_uploads_each_input_once() {
    let (backend, coordinator) = coordinator();

    let merged = coordinator
        .merge_entities(
            Vec::new(),
            vec![
                UploadSource::buffer("one.txt", &b"one"[..]),
                UploadSource::buffer("two.txt", &b"two"[..]),
                UploadSource::buffer("three.txt", &b"three"[..]),
            ],
            &MergeOptions::new(),
        )
        .await
        .unwrap();

    assert_eq!(backend.write_count(), 3);
    let names: Vec<&str> = merged
        .iter()
        .map(|e| e.original_filename.as_str())
        .collect();
    assert_eq!(names, vec!["one.txt", "two.txt", "three.txt"]);
}

#[tokio::test]
async fn test_colliding_hash_replaces_in_place() {
    let (_, coordinator) = coordinator();
    let a = entity("a", "h1");
    let b = entity("b", "h2");
    let c = entity("c", "h1");

    let merged = coordinator
        .merge_entities(vec![a, b.clone()], vec![c.clone()], &MergeOptions::new())
        .await
        .unwrap();

    assert_eq!(merged, vec![c, b]);
}

#[tokio::test]
async fn test_duplicates_within_existing_are_last_write_wins() {
    let (_, coordinator) = coordinator();

    let merged = coordinator
        .merge_entities(
            vec![entity("a", "h1"), entity("b", "h2"), entity("a2", "h1")],
            Vec::<FileEntity>::new(),
            &MergeOptions::new(),
        )
        .await
        .unwrap();

    assert_eq!(paths(&merged), vec!["a2", "b"]);
}

#[tokio::test]
async fn test_remove_hashes_with_file_deletion() {
    let (backend, coordinator) = coordinator();
    let b = coordinator
        .upload(UploadSource::buffer("b.txt", &b"bee"[..]), &UploadOptions::new())
        .await
        .unwrap();
    let a = entity("a", "h1");
    let c = entity("c", "h1");

    let merged = coordinator
        .merge_entities(
            vec![a, b.clone()],
            vec![c.clone()],
            &MergeOptions::new().remove([b.hash.clone()], true),
        )
        .await
        .unwrap();

    assert_eq!(merged, vec![c]);
    assert_eq!(backend.deleted(), vec![b.path.clone()]);
    assert!(!coordinator.exists(&b).await);
}

#[tokio::test]
async fn test_remove_hashes_without_file_deletion() {
    let (backend, coordinator) = coordinator();
    let b = coordinator
        .upload(UploadSource::buffer("b.txt", &b"bee"[..]), &UploadOptions::new())
        .await
        .unwrap();

    let merged = coordinator
        .merge_entities(
            vec![entity("a", "h1"), b.clone()],
            Vec::<FileEntity>::new(),
            &MergeOptions::new().remove([b.hash.clone()], false),
        )
        .await
        .unwrap();

    assert_eq!(paths(&merged), vec!["a"]);
    assert!(backend.deleted().is_empty());
    assert!(coordinator.exists(&b).await);
}

#[tokio::test]
async fn test_removal_delete_result_is_not_surfaced() {
    let (backend, coordinator) = coordinator();
    coordinator
        .hooks()
        .listen(HookEvent::BeforeDelete, |_, _| HookOutcome::StopWith(false));

    // The removed entry was never stored, and the veto returns false; the
    // merge still succeeds and drops it.
    let merged = coordinator
        .merge_entities(
            vec![entity("a", "h1"), entity("b", "h2")],
            Vec::<FileEntity>::new(),
            &MergeOptions::new().remove(["h2"], true),
        )
        .await
        .unwrap();

    assert_eq!(paths(&merged), vec!["a"]);
    assert!(backend.deleted().is_empty());
}

#[tokio::test]
async fn test_uploaded_duplicate_replaces_existing_record() {
    let (_, coordinator) = coordinator();
    let options = UploadOptions::new()
        .with_formatter(FormatterChoice::named("entity"))
        .with_info(FormatInfo::for_entity("post", 9));

    let original = coordinator
        .upload(UploadSource::buffer("old-name.txt", &b"content"[..]), &options)
        .await
        .unwrap();
    let other = entity("other", "h-other");

    let merged = coordinator
        .merge_entities(
            vec![original.clone(), other.clone()],
            vec![UploadSource::buffer("new-name.txt", &b"content"[..])],
            &MergeOptions::new().with_upload(options),
        )
        .await
        .unwrap();

    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].hash, original.hash);
    assert_eq!(merged[0].path, "post/9/new-name.txt");
    assert_eq!(merged[1], other);
}

#[tokio::test]
async fn test_mixed_new_data_of_entities_and_sources() {
    let (backend, coordinator) = coordinator();
    let kept = entity("kept", "h-kept");

    let merged = coordinator
        .merge_entities(
            Vec::new(),
            vec![
                UploadInput::from(kept.clone()),
                UploadInput::from(UploadSource::buffer("fresh.txt", &b"fresh"[..])),
            ],
            &MergeOptions::new(),
        )
        .await
        .unwrap();

    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0], kept);
    assert_eq!(merged[1].original_filename, "fresh.txt");
    assert_eq!(backend.write_count(), 1);
}

#[tokio::test]
async fn test_merge_aborts_on_upload_failure() {
    let (backend, coordinator) = coordinator();
    backend.fail_all_writes();

    let err = coordinator
        .merge_entities(
            vec![entity("a", "h1")],
            vec![
                UploadSource::buffer("x.txt", &b"x"[..]),
                UploadSource::buffer("y.txt", &b"y"[..]),
            ],
            &MergeOptions::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::UploadFailed { .. }));
    assert_eq!(backend.write_count(), 1);
}
