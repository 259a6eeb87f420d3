use anyhow::Context;
use lendwatch::events::JsonLinesEventSource;
use lendwatch::orchestration::{load_seed_file, stats::describe_metrics};
use lendwatch::{
    api, config::Config, db::init_db, BackfillCoordinator, ChainReader, EventNormalizer,
    MetricsCalculator, Pipeline, PipelineStats, PositionUpdater, Repository, RpcChainReader,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        eprintln!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    if let Some(metrics_port) = config.metrics_port {
        let metrics_addr = SocketAddr::from(([0, 0, 0, 0], metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .install()
            .context("failed to install Prometheus exporter")?;
        info!("Prometheus metrics listening on {}", metrics_addr);
    }
    describe_metrics();

    let assets = Arc::new(config.load_assets()?);
    info!("Loaded {} assets", assets.len());

    let pool = init_db(&config.database_path)
        .await
        .context("failed to initialize database")?;
    let repo = Arc::new(Repository::new(pool));
    let stats = Arc::new(PipelineStats::new());

    let reader: Arc<dyn ChainReader> =
        Arc::new(RpcChainReader::new(config.rpc_url.clone(), &config.contracts)?);
    let calculator = Arc::new(MetricsCalculator::new(
        reader,
        assets.clone(),
        Duration::from_millis(config.read_timeout_ms),
    ));
    let updater = Arc::new(PositionUpdater::new(
        calculator,
        repo.clone(),
        config.backfill_concurrency,
        stats.clone(),
    ));
    let backfill =
        BackfillCoordinator::new(updater.clone(), config.backfill_concurrency, stats.clone());

    let seeds = load_seed_file(&config.addresses_file).await?;

    if let Some(secs) = config.backfill_interval_secs {
        let scheduled = backfill.clone();
        let repo = repo.clone();
        let seeds = seeds.clone();
        info!("Scheduled backfill every {}s", secs);
        tokio::spawn(async move {
            scheduled
                .run_every(Duration::from_secs(secs), repo, seeds)
                .await
        });
    }

    let mut pipeline = Pipeline::new(
        EventNormalizer::new(assets),
        repo.clone(),
        updater,
        backfill,
        seeds,
        stats.clone(),
    );
    match config.events_file.as_deref() {
        Some(path) => {
            let mut source = JsonLinesEventSource::open(path).await?;
            info!("Replaying events from {}", path);
            tokio::spawn(async move {
                match pipeline.run(&mut source).await {
                    Ok(summary) => info!(
                        events = summary.events,
                        backfills = summary.backfills.len(),
                        "Event replay finished"
                    ),
                    Err(e) => error!(error = %e, "Event replay failed"),
                }
            });
        }
        None => {
            tokio::spawn(async move {
                pipeline.run_backfill().await;
            });
        }
    }

    // Create router
    let app = api::create_router(api::AppState::new(repo, stats));

    // Bind to address
    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;

    info!("Server listening on {}", addr);
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
