//! Run-once and interval execution of the mirroring engine.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use s3s_server::MetricsServer;
use s3s_syncer::{RunOutcome, SyncResult, SyncerService};
use s3s_telemetry::{Metrics, build_info};
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::{AppError, AppResult};

/// Perform a single run; any run-level or per-object failure is an error.
pub(crate) async fn run_once(service: &mut SyncerService) -> AppResult<()> {
    let outcome = service
        .pull()
        .await
        .map_err(|source| AppError::sync("pull", source))?;
    let failures = outcome.failures.len();
    match outcome.failures.into_iter().next() {
        None => Ok(()),
        Some(source) => Err(AppError::IncompleteRun { failures, source }),
    }
}

/// Run on a fixed period until `shutdown` resolves.
///
/// The first run starts immediately. A run that overlaps the next tick delays it rather than
/// stacking runs. Failed runs are logged and retried on the next tick. Shutdown during a run
/// abandons it and removes any temp directory that run created.
pub(crate) async fn run_interval<F>(service: &mut SyncerService, period: Duration, shutdown: F)
where
    F: Future<Output = ()> + Send,
{
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);
    info!(interval_secs = period.as_secs(), "scheduler started");

    loop {
        tokio::select! {
            () = &mut shutdown => break,
            _ = ticker.tick() => {}
        }
        let abandoned = tokio::select! {
            () = &mut shutdown => true,
            result = service.pull() => {
                report(&result);
                false
            }
        };
        if abandoned {
            warn!("shutdown requested during run; abandoning it");
            service.release_temp_dir().await;
            break;
        }
    }
    info!("scheduler stopped");
}

/// Interval mode: metrics server plus scheduler, both stopped by SIGINT or SIGTERM.
pub(crate) async fn serve_interval(
    mut service: SyncerService,
    metrics: Metrics,
    period: Duration,
    port: u16,
) -> AppResult<()> {
    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        if stop_tx.send(true).is_err() {
            debug!("no shutdown listeners remain");
        }
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let server = MetricsServer::new(metrics, build_info());
    let mut server_task = tokio::spawn(server.serve(addr, stopped(stop_rx.clone())));

    let scheduler = run_interval(&mut service, period, stopped(stop_rx));
    let early_exit = tokio::select! {
        () = scheduler => None,
        joined = &mut server_task => Some(joined),
    };
    let joined = match early_exit {
        Some(joined) => joined,
        None => server_task.await,
    };
    match joined {
        Ok(result) => result.map_err(|source| AppError::Server { source }),
        Err(source) => Err(AppError::ServerJoin { source }),
    }
}

/// Resolves once the shutdown flag is raised or its sender is gone.
pub(crate) async fn stopped(mut stop: watch::Receiver<bool>) {
    let closed = stop.wait_for(|raised| *raised).await.is_err();
    if closed {
        debug!("shutdown channel closed");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("shutdown signal received");
}

fn report(result: &SyncResult<RunOutcome>) {
    match result {
        Ok(outcome) => {
            for failure in &outcome.failures {
                warn!(
                    run = outcome.run,
                    error = %failure,
                    operation = failure.operation().unwrap_or("fetch"),
                    "object left unsynchronized; retrying next run"
                );
            }
        }
        Err(err) => debug!(error = %err, "run failed; retrying next run"),
    }
}
