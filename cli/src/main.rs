mod config;
mod logging;
mod report;

use std::{future::Future, process::ExitCode, time::Duration};

use clap::Parser;
use console::style;
use fanout_core::{CopyEvent, CopySummary, SessionController, TaskOptions};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

use crate::{
    config::{Args, Settings},
    report::Reporter,
};

const EXIT_INVALID_INPUT: u8 = 2;

#[derive(Debug, Error)]
enum CliError {
    /// Bad config file or arguments; reported like invalid input.
    #[error("{0:#}")]
    Config(anyhow::Error),

    #[error("{0:#}")]
    Runtime(anyhow::Error),
}

impl CliError {
    fn exit_status(&self) -> u8 {
        match self {
            CliError::Config(_) => EXIT_INVALID_INPUT,
            CliError::Runtime(_) => 1,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {e}", style("error:").red().bold());
            ExitCode::from(e.exit_status())
        }
    }
}

async fn run(args: Args) -> Result<ExitCode, CliError> {
    let settings = Settings::resolve(args).map_err(CliError::Config)?;
    logging::init(&settings.log_dir, settings.verbose).map_err(CliError::Runtime)?;

    let reporter = Reporter::new(settings.json);
    let (session, mut events) = SessionController::channel();
    let mut session = session.with_options(TaskOptions {
        sort_subdirectories: settings.sort_subdirectories,
    });

    if let Err(e) = session.start(&settings.parent, &settings.source) {
        warn!("refused to start: {}", e);
        reporter.invalid_input(&e);
        return Ok(ExitCode::from(EXIT_INVALID_INPUT));
    }

    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    let summary = drive(&mut session, &mut events, &reporter, settings.shutdown_grace, ctrl_c).await;

    let Some(summary) = summary else {
        reporter.abandoned();
        return Ok(ExitCode::FAILURE);
    };

    session.await_completion(settings.shutdown_grace).await;
    reporter.summary(&summary).map_err(CliError::Runtime)?;
    info!(succeeded = summary.succeeded_overall, "done");

    Ok(if summary.succeeded_overall {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Show events until the summary arrives or `shutdown` fires. `shutdown` is
/// polled as one future for the whole run so a request is never missed.
async fn drive(
    session: &mut SessionController,
    events: &mut UnboundedReceiver<CopyEvent>,
    reporter: &Reporter,
    grace: Duration,
    shutdown: impl Future<Output = ()>,
) -> Option<CopySummary> {
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    if let Some(summary) = present(reporter, event) {
                        return Some(summary);
                    }
                }
                None => return None,
            },
            () = &mut shutdown => return stop_and_drain(session, events, reporter, grace).await,
        }
    }
}

/// Stop the run and wait up to `grace` for it to report back.
async fn stop_and_drain(
    session: &mut SessionController,
    events: &mut UnboundedReceiver<CopyEvent>,
    reporter: &Reporter,
    grace: Duration,
) -> Option<CopySummary> {
    // Items that finished before the interrupt are shown ahead of the notice.
    if let Some(summary) = flush(reporter, events) {
        return Some(summary);
    }
    if session.request_stop() {
        reporter.log_line("stop signal sent");
    }
    let finished = session.await_completion(grace).await;
    let summary = flush(reporter, events);
    if !finished {
        warn!("exiting with the copy task still running");
    }
    summary
}

/// Show one event. Returns the summary when it is the terminal one.
fn present(reporter: &Reporter, event: CopyEvent) -> Option<CopySummary> {
    match event {
        CopyEvent::LogLine(line) => reporter.log_line(&line),
        CopyEvent::Progress(percent) => reporter.progress(percent),
        CopyEvent::Summary(summary) => return Some(summary),
    }
    None
}

/// Show whatever is already queued, stopping at the summary if there is one.
fn flush(reporter: &Reporter, events: &mut UnboundedReceiver<CopyEvent>) -> Option<CopySummary> {
    while let Ok(event) = events.try_recv() {
        if let Some(summary) = present(reporter, event) {
            return Some(summary);
        }
    }
    None
}
