//! `reset` command: put the board into download mode.

use {
    super::{block_on, millis, open_port},
    crate::{CliError, use_fancy_output},
    anyhow::Result,
    console::style,
    indicatif::{ProgressBar, ProgressStyle},
    std::time::Duration,
    t5flash::{
        PlatformCategory, PlatformConfig, ResetEvent, ResetOrchestrator, ResetOutcome, StopSignal,
        StrategyId,
        reset::{AttemptOutcome, AttemptRecord, EventSink, ExhaustReason, LogSink},
    },
};

/// Everything the reset command needs, resolved from flags and config.
#[derive(Debug, Clone)]
pub(crate) struct ResetOptions {
    /// Serial port name.
    pub port: String,
    /// Requested baud rate.
    pub baud: u32,
    /// Platform the sequence is tuned for.
    pub platform: PlatformCategory,
    /// Tuning with overrides applied.
    pub config: PlatformConfig,
    /// Strategy to try first.
    pub prior: Option<StrategyId>,
    /// Full sequences before giving up.
    pub rounds: u32,
    /// Machine-readable output.
    pub json: bool,
    /// Suppress the spinner.
    pub quiet: bool,
}

/// Run the reset on a fresh single-threaded runtime.
pub(crate) fn cmd_reset(options: &ResetOptions, stop: StopSignal) -> Result<()> {
    block_on(reset(options, stop))?
}

/// Spinner on stderr, hidden when output is not interactive.
pub(crate) fn spinner(hidden: bool) -> ProgressBar {
    if hidden || !use_fancy_output() {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    #[allow(clippy::unwrap_used)] // Static template string
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Event sink that shows the current strategy on `pb` and logs around it.
pub(crate) fn spinner_sink(pb: &ProgressBar) -> impl FnMut(&ResetEvent) + Send + 'static {
    let pb = pb.clone();
    let mut log = LogSink;
    move |event: &ResetEvent| {
        if let ResetEvent::StrategyStarted {
            strategy,
            index,
            total,
        } = event
        {
            pb.set_message(format!("Trying {strategy} ({index}/{total})"));
        }
        pb.suspend(|| log.emit(event));
    }
}

async fn reset(options: &ResetOptions, stop: StopSignal) -> Result<()> {
    let mut port = open_port(&options.port, options.baud, options.platform)?;

    let pb = spinner(options.quiet || options.json);
    let mut orchestrator = ResetOrchestrator::new(options.platform)
        .with_config(options.config.clone())
        .with_stop_signal(stop)
        .with_sink(spinner_sink(&pb));

    let outcome = orchestrator
        .reset_with_retries(&mut port, options.prior, options.rounds)
        .await;
    pb.finish_and_clear();

    let stats = orchestrator.statistics();

    match outcome {
        ResetOutcome::Succeeded { strategy, duration } => {
            if options.json {
                let value = serde_json::json!({
                    "success": true,
                    "port": options.port,
                    "platform": options.platform,
                    "strategy": strategy,
                    "duration_ms": millis(duration),
                    "statistics": stats,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                eprintln!(
                    "{} {} is in download mode ({} in {:?})",
                    style("✓").green().bold(),
                    style(&options.port).cyan(),
                    style(strategy).green(),
                    duration
                );
                eprintln!(
                    "  {} Pass --strategy {strategy} next time to try it first.",
                    style("hint:").dim()
                );
            }
            Ok(())
        },
        ResetOutcome::Exhausted {
            attempts,
            reason,
            platform,
            guidance,
        } => {
            if options.json {
                let list: Vec<serde_json::Value> = attempts
                    .iter()
                    .map(attempt_json)
                    .collect();
                let value = serde_json::json!({
                    "success": false,
                    "port": options.port,
                    "platform": platform,
                    "reason": reason,
                    "attempts": list,
                    "statistics": stats,
                    "guidance": {
                        "reset_failed": guidance.reset_failed,
                        "troubleshooting": guidance.troubleshooting,
                    },
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                eprintln!(
                    "{} {reason} on {}",
                    style("✗").red().bold(),
                    style(&options.port).cyan()
                );
                for (i, attempt) in attempts
                    .iter()
                    .enumerate()
                {
                    eprintln!("  {}. {}", i + 1, describe_attempt(attempt));
                }
                if reason == ExhaustReason::AllStrategiesFailed {
                    eprintln!();
                    eprintln!("{}", style(guidance.reset_failed).yellow());
                    eprintln!("{}", guidance.troubleshooting);
                }
            }

            match reason {
                ExhaustReason::Cancelled => {
                    Err(CliError::Cancelled("reset cancelled".to_string()).into())
                },
                ExhaustReason::AllStrategiesFailed => Err(anyhow::anyhow!(
                    "could not enter download mode after {} round(s)",
                    options.rounds.max(1)
                )),
            }
        },
    }
}

pub(crate) fn outcome_text(outcome: &AttemptOutcome) -> String {
    match outcome {
        AttemptOutcome::Success => "ok".to_string(),
        AttemptOutcome::Failure(reason) => reason.to_string(),
    }
}

pub(crate) fn describe_attempt(attempt: &AttemptRecord) -> String {
    format!(
        "{:<16} {} ({:?})",
        attempt.strategy.name(),
        outcome_text(&attempt.outcome),
        attempt.duration
    )
}

pub(crate) fn attempt_json(attempt: &AttemptRecord) -> serde_json::Value {
    serde_json::json!({
        "strategy": attempt.strategy,
        "success": attempt.outcome.is_success(),
        "outcome": outcome_text(&attempt.outcome),
        "duration_ms": millis(attempt.duration),
    })
}
