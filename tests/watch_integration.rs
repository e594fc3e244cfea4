use photo_display::library::CatalogLibrary;
use photo_display::tasks::watch;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

async fn wait_for_len(library: &CatalogLibrary, expected: usize) -> bool {
    for _ in 0..50 {
        if library.len() == expected {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn catalog_edits_are_picked_up_and_bad_edits_ignored() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("catalog.yaml");
    fs::write(&path, "photos:\n  - { id: 1, path: a.jpg }\n").unwrap();

    let library = Arc::new(CatalogLibrary::open(&path).unwrap());
    assert_eq!(library.len(), 1);

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(watch::run(library.clone(), path.clone(), cancel.clone()));
    // Give the watcher time to register
    tokio::time::sleep(Duration::from_millis(300)).await;

    fs::write(
        &path,
        "photos:\n  - { id: 1, path: a.jpg }\n  - { id: 2, path: b.jpg }\n",
    )
    .unwrap();
    assert!(wait_for_len(&library, 2).await, "catalog was not reloaded");

    // Unrelated files in the same directory do not matter
    fs::write(tmp.path().join("notes.txt"), b"x").unwrap();

    // A broken catalog keeps the last good one
    fs::write(&path, "photos: [ {").unwrap();
    tokio::time::sleep(Duration::from_millis(800)).await;
    assert_eq!(library.len(), 2);

    cancel.cancel();
    let res = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("watcher did not stop");
    assert!(res.unwrap().is_ok());
}
