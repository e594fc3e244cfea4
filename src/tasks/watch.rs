use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecursiveMode, Watcher, recommended_watcher};
use tokio::sync::mpsc;
use tokio::task;
use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::library::CatalogLibrary;

/// Editors often write a file in several steps; wait for them to settle.
const SETTLE: Duration = Duration::from_millis(250);

/// Reloads `library` whenever its catalog file changes, until `cancel` fires.
#[instrument(skip(library, cancel), fields(catalog = %catalog.display()))]
pub async fn run(
    library: Arc<CatalogLibrary>,
    catalog: PathBuf,
    cancel: CancellationToken,
) -> Result<()> {
    // Watch the directory so replace-by-rename saves are seen too.
    let watch_dir = catalog
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = catalog.file_name().map(OsStr::to_os_string);

    // Bridge notify callback -> async channel
    let (watch_tx, mut watch_rx) = mpsc::channel::<notify::Result<Event>>(128);
    let mut watcher = recommended_watcher(move |res| {
        let _ = watch_tx.blocking_send(res);
    })?;
    watcher
        .watch(&watch_dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("failed to watch {}", watch_dir.display()))?;
    info!(watching = %watch_dir.display(), "catalog watcher initialized");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("cancel received; exiting catalog watcher");
                break;
            }

            Some(res) = watch_rx.recv() => match res {
                Ok(event) if touches(&event, file_name.as_deref()) => {
                    debug!(kind = ?event.kind, "catalog changed");
                    sleep(SETTLE).await;
                    while watch_rx.try_recv().is_ok() {}
                    reload(&library).await;
                }
                Ok(event) => debug!(kind = ?event.kind, paths = ?event.paths, "fs: ignored"),
                Err(err) => error!("watch error: {err}"),
            }
        }
    }
    Ok(())
}

async fn reload(library: &Arc<CatalogLibrary>) {
    let library = Arc::clone(library);
    match task::spawn_blocking(move || library.reload()).await {
        Ok(Ok(photos)) => info!(photos, "catalog reloaded"),
        Ok(Err(err)) => warn!(error = ?err, "catalog reload failed; keeping previous catalog"),
        Err(err) => error!("catalog reload task failed: {err}"),
    }
}

fn touches(event: &Event, file_name: Option<&OsStr>) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) && event
        .paths
        .iter()
        .any(|path| path.file_name() == file_name)
}
