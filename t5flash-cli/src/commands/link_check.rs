//! `link-check` command: ask the chip whether it is in download mode,
//! without touching DTR/RTS.

use {
    super::{block_on, open_port},
    crate::CliError,
    anyhow::Result,
    console::style,
    std::time::Duration,
    t5flash::{LinkCheckError, LinkVerifier, PlatformCategory, StopSignal},
};

/// Resolved link-check options.
#[derive(Debug, Clone)]
pub(crate) struct LinkCheckOptions {
    pub port: String,
    pub baud: u32,
    pub platform: PlatformCategory,
    /// Read deadline per exchange.
    pub timeout: Duration,
    /// Exchanges before giving up.
    pub attempts: u32,
    pub json: bool,
}

pub(crate) fn cmd_link_check(options: &LinkCheckOptions, stop: StopSignal) -> Result<()> {
    block_on(link_check(options, stop))?
}

async fn link_check(options: &LinkCheckOptions, stop: StopSignal) -> Result<()> {
    let mut port = open_port(&options.port, options.baud, options.platform)?;
    let result = LinkVerifier::new()
        .with_stop_signal(stop)
        .run(&mut port, options.timeout, options.attempts)
        .await;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&result_json(&options.port, &result))?);
    } else if let Ok(attempt) = result {
        eprintln!(
            "{} {} answered the link-check (attempt {attempt}); the chip is in download mode",
            style("✓").green().bold(),
            style(&options.port).cyan()
        );
    }

    match result {
        Ok(_) => Ok(()),
        Err(LinkCheckError::Cancelled) => {
            Err(CliError::Cancelled("link-check cancelled".to_string()).into())
        },
        Err(e) => Err(anyhow::Error::new(e).context(format!(
            "no download-mode answer on {} after {} attempt(s)",
            options.port,
            options.attempts.max(1)
        ))),
    }
}

fn hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn result_json(port: &str, result: &Result<u32, LinkCheckError>) -> serde_json::Value {
    match result {
        Ok(attempt) => serde_json::json!({
            "port": port,
            "success": true,
            "attempt": attempt,
        }),
        Err(e) => {
            let received = match e {
                LinkCheckError::Timeout { received } | LinkCheckError::Mismatch { received } => {
                    Some(hex(received))
                },
                LinkCheckError::Port(_) | LinkCheckError::Cancelled => None,
            };
            serde_json::json!({
                "port": port,
                "success": false,
                "error": e.to_string(),
                "received": received,
            })
        },
    }
}
