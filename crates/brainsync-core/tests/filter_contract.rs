//! Contract Test: Supported-File Filtering
//!
//! Constraints verified:
//! - Files never seen before pass through with no previous record
//! - Files previously ingested pass through paired with their record
//! - Files previously rejected for their format are dropped
//! - A rejected file whose type changed is evaluated again as new
//! - Order is preserved

use brainsync_core::{ExistingFileIndex, RemoteFile, SyncRecord, filter_on_supported_files};
use uuid::Uuid;

fn remote(name: &str, mime: &str) -> RemoteFile {
    RemoteFile::new(format!("id-{}", name), name, "2024-01-01T00:00:00Z", mime)
}

fn record(name: &str, supported: bool, mime: Option<&str>) -> SyncRecord {
    SyncRecord {
        id: Uuid::new_v4(),
        path: name.to_string(),
        session_id: 1,
        last_modified: "2023-12-01T00:00:00Z".to_string(),
        brain_id: Uuid::nil(),
        supported,
        mime_type: mime.map(String::from),
    }
}

#[test]
fn unknown_files_pass_through_without_record() {
    let files = vec![remote("a.txt", "text/plain"), remote("b.pdf", "application/pdf")];

    let filtered = filter_on_supported_files(&files, &ExistingFileIndex::new());

    assert_eq!(filtered.len(), 2);
    assert!(filtered.iter().all(|(_, previous)| previous.is_none()));
    assert_eq!(filtered[0].0.name, "a.txt");
    assert_eq!(filtered[1].0.name, "b.pdf");
}

#[test]
fn supported_files_keep_their_record() {
    let files = vec![remote("a.txt", "text/plain")];
    let existing = record("a.txt", true, Some("text/plain"));
    let index: ExistingFileIndex = vec![existing.clone()].into_iter().collect();

    let filtered = filter_on_supported_files(&files, &index);

    assert_eq!(filtered, vec![(files[0].clone(), Some(existing))]);
}

#[test]
fn previously_rejected_files_are_dropped() {
    let files = vec![
        remote("keep.txt", "text/plain"),
        remote("movie.mkv", "video/x-matroska"),
    ];
    let index: ExistingFileIndex = vec![record("movie.mkv", false, Some("video/x-matroska"))]
        .into_iter()
        .collect();

    let filtered = filter_on_supported_files(&files, &index);

    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].0.name, "keep.txt");
}

#[test]
fn rejected_file_with_new_type_is_reconsidered() {
    let files = vec![remote("Roadmap", "application/pdf")];
    let index: ExistingFileIndex = vec![record("Roadmap", false, Some("application/x-unknown"))]
        .into_iter()
        .collect();

    let filtered = filter_on_supported_files(&files, &index);

    assert_eq!(filtered, vec![(files[0].clone(), None)]);
}

#[test]
fn rejection_without_stored_type_stays_rejected() {
    let files = vec![remote("legacy.bin", "application/octet-stream")];
    let index: ExistingFileIndex = vec![record("legacy.bin", false, None)].into_iter().collect();

    assert!(filter_on_supported_files(&files, &index).is_empty());
}

#[test]
fn matching_is_by_path_not_id() {
    // Same path under a new provider id still matches the record
    let mut file = remote("a.txt", "text/plain");
    file.id = "reassigned".to_string();
    let existing = record("a.txt", true, Some("text/plain"));
    let index: ExistingFileIndex = vec![existing.clone()].into_iter().collect();

    let filtered = filter_on_supported_files(&[file], &index);

    assert_eq!(filtered[0].1, Some(existing));
}
