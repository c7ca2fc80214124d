//! `test-strategy` command: run one strategy (or the full sequence) on
//! demand and tally the results over repeated runs.

use {
    super::{
        block_on, millis, open_port,
        reset::{attempt_json, describe_attempt, spinner, spinner_sink},
    },
    crate::CliError,
    anyhow::Result,
    console::style,
    std::time::Duration,
    t5flash::{
        PlatformCategory, PlatformConfig, ResetOrchestrator, ResetOutcome, StopSignal, StrategyId,
        reset::ExhaustReason,
    },
    tokio::time::sleep,
};

/// Pause between repeated runs.
const REPEAT_PAUSE: Duration = Duration::from_millis(500);

/// Everything the test command needs, resolved from flags and config.
#[derive(Debug, Clone)]
pub(crate) struct TestOptions {
    pub port: String,
    pub baud: u32,
    pub platform: PlatformCategory,
    pub config: PlatformConfig,
    /// Strategy to run alone; `None` runs the full fallback sequence.
    pub strategy: Option<StrategyId>,
    /// Strategy to try first in a full sequence.
    pub prior: Option<StrategyId>,
    pub repeat: u32,
    pub json: bool,
    pub quiet: bool,
}

/// Run the test on a fresh single-threaded runtime.
pub(crate) fn cmd_test_strategy(options: &TestOptions, stop: StopSignal) -> Result<()> {
    block_on(run_tests(options, stop))?
}

async fn run_tests(options: &TestOptions, stop: StopSignal) -> Result<()> {
    let mut port = open_port(&options.port, options.baud, options.platform)?;

    let pb = spinner(options.quiet || options.json);
    let mut orchestrator = ResetOrchestrator::new(options.platform)
        .with_config(options.config.clone())
        .with_stop_signal(stop.clone())
        .with_sink(spinner_sink(&pb));

    let repeat = options.repeat.max(1);
    let mut prior = options.prior;
    let mut runs = Vec::new();
    let mut cancelled = false;

    for run in 1..=repeat {
        let outcome = match options.strategy {
            Some(id) => {
                orchestrator
                    .test_strategy(&mut port, id)
                    .await
            },
            None => {
                orchestrator
                    .reset_and_verify(&mut port, prior.take())
                    .await
            },
        };

        if !options.json {
            pb.suspend(|| eprintln!("{}", run_line(run, repeat, &outcome)));
        }
        cancelled = matches!(
            outcome,
            ResetOutcome::Exhausted {
                reason: ExhaustReason::Cancelled,
                ..
            }
        );
        runs.push(outcome);

        if cancelled || stop.is_stopped() {
            cancelled = true;
            break;
        }
        if run < repeat {
            sleep(REPEAT_PAUSE).await;
        }
    }
    pb.finish_and_clear();

    let stats = orchestrator.statistics();
    let passed = stats.successful_invocations;
    let total = stats.invocations;
    let rate = stats.invocation_success_rate() * 100.0;

    if options.json {
        let list: Vec<serde_json::Value> = runs
            .iter()
            .enumerate()
            .map(|(i, outcome)| run_json(i + 1, outcome))
            .collect();
        let value = serde_json::json!({
            "port": options.port,
            "platform": options.platform,
            "strategy": options.strategy,
            "runs": list,
            "passed": passed,
            "total": total,
            "success_rate": stats.invocation_success_rate(),
            "statistics": stats,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        eprintln!();
        eprintln!(
            "{} {passed}/{total} runs entered download mode ({rate:.1}%)",
            style("Result:").bold()
        );
    }

    if cancelled {
        return Err(CliError::Cancelled("test cancelled".to_string()).into());
    }
    if passed < total {
        return Err(anyhow::anyhow!(
            "{} of {total} run(s) failed",
            total - passed
        ));
    }
    Ok(())
}

fn run_line(run: u32, repeat: u32, outcome: &ResetOutcome) -> String {
    match outcome {
        ResetOutcome::Succeeded { strategy, duration } => format!(
            "Run {run}/{repeat}: {} {strategy} ({duration:?})",
            style("✓").green().bold()
        ),
        ResetOutcome::Exhausted {
            attempts, reason, ..
        } => {
            let mut line = format!("Run {run}/{repeat}: {} {reason}", style("✗").red().bold());
            for attempt in attempts {
                line.push_str(&format!("\n    {}", describe_attempt(attempt)));
            }
            line
        },
    }
}

fn run_json(run: usize, outcome: &ResetOutcome) -> serde_json::Value {
    match outcome {
        ResetOutcome::Succeeded { strategy, duration } => serde_json::json!({
            "run": run,
            "success": true,
            "strategy": strategy,
            "duration_ms": millis(*duration),
        }),
        ResetOutcome::Exhausted {
            attempts, reason, ..
        } => {
            let list: Vec<serde_json::Value> = attempts
                .iter()
                .map(attempt_json)
                .collect();
            serde_json::json!({
                "run": run,
                "success": false,
                "reason": reason,
                "attempts": list,
            })
        },
    }
}
