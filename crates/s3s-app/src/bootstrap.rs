//! Wires logging, metrics and the engine for the `pull` command.

use std::sync::Arc;

use s3s_syncer::{ObjectStore, S3ObjectStore, SyncSpec, SyncerService};
use s3s_telemetry::{LogFormat, LoggingConfig, Metrics, app_span, init_logging};
use tracing::{Instrument, info};

use crate::cli::PullArgs;
use crate::error::{AppError, AppResult};
use crate::scheduler;

/// Run the `pull` command in run-once or interval mode.
pub(crate) async fn run_pull(args: &PullArgs, verbose: bool, format: LogFormat) -> AppResult<()> {
    init_logging(&LoggingConfig::for_verbosity(verbose, format))
        .map_err(|source| AppError::telemetry("logging.init", source))?;
    let mode = if args.run_once { "run-once" } else { "interval" };
    execute_pull(args).instrument(app_span(mode)).await
}

async fn execute_pull(args: &PullArgs) -> AppResult<()> {
    let period = args.period()?;
    let spec = SyncSpec::from_config(&args.syncer_config())
        .map_err(|source| AppError::sync("config.validate", source))?;
    let metrics =
        Metrics::new().map_err(|source| AppError::telemetry("metrics.init", source))?;
    let store = S3ObjectStore::connect(&spec.transport).await;
    let mut service = prepare_service(spec, Arc::new(store), metrics.clone()).await?;

    if args.run_once {
        scheduler::run_once(&mut service).await
    } else {
        scheduler::serve_interval(service, metrics, period, args.metrics_port).await
    }
}

/// Build the engine around `store` and seed its hash index from the local tree.
pub(crate) async fn prepare_service(
    spec: SyncSpec,
    store: Arc<dyn ObjectStore>,
    metrics: Metrics,
) -> AppResult<SyncerService> {
    info!(
        uri = %spec.remote.uri(),
        local_dir = %spec.local_root.display(),
        workers = spec.workers,
        "starting synchronizer"
    );
    let service = SyncerService::from_spec(spec, store).with_metrics(metrics);
    service
        .init_hash_index()
        .await
        .map_err(|source| AppError::sync("index.init", source))?;
    Ok(service)
}
