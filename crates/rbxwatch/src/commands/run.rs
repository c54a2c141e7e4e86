//! `run`: the polling daemon, or a single pass with `--once`.

use rbxwatch_core::{CycleReport, LoopKind, Monitor};
use serde::Serialize;
use tabled::Tabled;
use tracing::{info, warn};

use crate::cli::{GlobalOpts, RunArgs};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct CycleResult {
    #[serde(rename = "loop")]
    kind: LoopKind,
    #[serde(flatten)]
    report: Option<CycleReport>,
    error: Option<String>,
}

#[derive(Tabled)]
struct CycleRow {
    #[tabled(rename = "Loop")]
    kind: String,
    #[tabled(rename = "Checked")]
    checked: String,
    #[tabled(rename = "Failed")]
    failed: String,
    #[tabled(rename = "Events")]
    events: String,
    #[tabled(rename = "Delivered")]
    delivered: String,
    #[tabled(rename = "Error")]
    error: String,
}

impl From<&CycleResult> for CycleRow {
    fn from(r: &CycleResult) -> Self {
        let field = |f: fn(&CycleReport) -> usize| {
            r.report
                .as_ref()
                .map(|rep| f(rep).to_string())
                .unwrap_or_default()
        };
        Self {
            kind: r.kind.to_string(),
            checked: field(|rep| rep.checked),
            failed: field(|rep| rep.failed),
            events: field(|rep| rep.events),
            delivered: field(|rep| rep.delivered),
            error: r.error.clone().unwrap_or_default(),
        }
    }
}

pub async fn handle(
    monitor: &Monitor,
    args: &RunArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if args.dry_run {
        info!("dry run: notifications are logged, not posted");
    }
    if args.once {
        return run_once(monitor, global).await;
    }

    monitor.start().await;
    info!(
        interval_secs = monitor.config().polling.base_interval.as_secs(),
        "watching; press Ctrl+C to stop"
    );

    tokio::select! {
        () = shutdown_signal() => {}
        () = monitor.cancelled() => {}
    }

    monitor.shutdown().await;
    let stats = monitor.api_stats();
    info!(
        total_calls = stats.total_calls,
        failed = stats.failed_calls,
        cache_hits = stats.cache_hits,
        success_rate = format!("{:.1}%", stats.success_rate),
        "rbxwatch stopped"
    );
    Ok(())
}

async fn run_once(monitor: &Monitor, global: &GlobalOpts) -> Result<(), CliError> {
    let results: Vec<CycleResult> = monitor
        .run_once()
        .await
        .into_iter()
        .map(|(kind, result)| match result {
            Ok(report) => CycleResult {
                kind,
                report: Some(report),
                error: None,
            },
            Err(e) => CycleResult {
                kind,
                report: None,
                error: Some(e.to_string()),
            },
        })
        .collect();

    let out = output::render_list(
        &global.output,
        &results,
        |r| CycleRow::from(r),
        |r| format!("{}\t{}", r.kind, if r.error.is_some() { "failed" } else { "ok" }),
    )?;
    output::print_output(&out, global.quiet);

    let failed: Vec<String> = results
        .iter()
        .filter(|r| r.error.is_some())
        .map(|r| r.kind.to_string())
        .collect();
    if failed.is_empty() {
        Ok(())
    } else {
        Err(CliError::Api {
            message: format!("cycle failed for: {}", failed.join(", ")),
        })
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "could not listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Ctrl+C received, shutting down"),
        () = terminate => info!("terminate signal received, shutting down"),
    }
}
