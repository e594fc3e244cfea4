use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use photo_display::config::Configuration;
use photo_display::display::DisplayService;
use photo_display::library::CatalogLibrary;
use photo_display::resolver::CandidateResolver;
use photo_display::sequence_store::SequenceStore;
use photo_display::sequencer::Sequencer;
use photo_display::settings::SettingsManager;
use photo_display::settings_file::SettingsFile;
use photo_display::{logging, tasks, web};

#[derive(Debug, Parser)]
#[command(
    name = "photo-display",
    version,
    about = "photo display sequencing service"
)]
struct Args {
    /// Path to YAML config
    #[arg(value_name = "CONFIG")]
    config: PathBuf,
    /// Deterministic RNG seed for shuffle order (overrides shuffle-seed)
    #[arg(long = "seed", value_name = "SEED")]
    seed: Option<u64>,
    /// Print the upcoming photos of the active configuration and exit
    #[arg(long = "sequence-dry-run", value_name = "COUNT")]
    sequence_dry_run: Option<usize>,
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let Args {
        config,
        seed,
        sequence_dry_run,
        verbose,
    } = Args::parse();
    logging::init(verbose);

    let cfg = Configuration::from_yaml_file(&config)
        .with_context(|| format!("failed to load configuration from {}", config.display()))?
        .validated()
        .context("invalid configuration values")?;
    tracing::info!(
        "Loaded configuration from {}:\n{:#?}",
        config.display(),
        cfg
    );

    let library = Arc::new(
        CatalogLibrary::open(&cfg.catalog_path)
            .with_context(|| format!("failed to open catalog {}", cfg.catalog_path.display()))?,
    );
    tracing::info!(photos = library.len(), "catalog loaded");

    let resolver = CandidateResolver::new(library.clone());
    let sequencer = Arc::new(Sequencer::new(
        resolver,
        Arc::new(SequenceStore::new()),
        seed.or(cfg.shuffle_seed),
    ));
    let settings_file = cfg.settings_path.clone().map(SettingsFile::new);
    let settings = Arc::new(
        SettingsManager::load(settings_file, sequencer.clone())
            .await
            .context("failed to load display configurations")?,
    );
    let service = DisplayService::new(settings, sequencer);

    if let Some(count) = sequence_dry_run {
        return run_sequence_dry_run(&service, count).await;
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    let mut tasks = JoinSet::new();

    // HTTP API
    tasks.spawn({
        let state = web::AppState {
            service: service.clone(),
            public_url: cfg.public_url.clone(),
            bind_addr: cfg.bind_address,
            preload_limit: cfg.preload_limit,
            cancel: cancel.clone(),
        };
        let bind_addr = cfg.bind_address;
        async move { web::serve(state, bind_addr).await.context("web task failed") }
    });

    // Catalog watcher
    if cfg.watch_catalog {
        tasks.spawn({
            let library = library.clone();
            let catalog = cfg.catalog_path.clone();
            let cancel = cancel.clone();
            async move {
                tasks::watch::run(library, catalog, cancel)
                    .await
                    .context("catalog watcher failed")
            }
        });
    }

    // First task to finish (error or shutdown) stops the rest
    if let Some(res) = tasks.join_next().await {
        report(res);
    }
    cancel.cancel();

    while let Some(res) = tasks.join_next().await {
        report(res);
    }

    Ok(())
}

fn report(res: Result<Result<()>, tokio::task::JoinError>) {
    match res {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!("task error: {e:?}"),
        Err(e) => tracing::error!("join error: {e}"),
    }
}

async fn run_sequence_dry_run(service: &DisplayService, count: usize) -> Result<()> {
    let active = service
        .get_active_settings()
        .await
        .context("failed to determine active configuration")?;
    let cancel = CancellationToken::new();
    let photos = service
        .get_preload_photos(count, Some(active.id), &cancel)
        .await
        .context("failed to compute upcoming photos")?;
    let total = service
        .get_photo_count(Some(active.id), &cancel)
        .await
        .context("failed to count candidate photos")?;

    println!(
        "# sequence dry run\n# configuration: {} ({})\n# source: {}\n# shuffle: {}\n# candidates: {}\n",
        active.id,
        active.name,
        active
            .source()
            .map(|source| source.to_string())
            .unwrap_or_else(|err| format!("invalid ({err})")),
        active.shuffle,
        total,
    );
    for (index, photo) in photos.iter().enumerate() {
        println!("{:>4} {:>8} {}", index + 1, photo.id, photo.path);
    }
    Ok(())
}
