//! `set-signal` command: drive DTR/RTS by hand for wiring checks.

use {
    super::{block_on, open_port},
    crate::CliError,
    anyhow::{Context, Result},
    console::style,
    log::info,
    std::time::Duration,
    t5flash::{PlatformCategory, Port, Signals},
    tokio::time::sleep,
};

/// Resolved set-signal options.
#[derive(Debug, Clone)]
pub(crate) struct SignalOptions {
    pub port: String,
    pub baud: u32,
    pub platform: PlatformCategory,
    pub signals: Signals,
    /// How long to keep the port open after applying the levels.
    pub hold: Duration,
}

/// Reject a request that changes neither line.
pub(crate) fn requested_signals(dtr: Option<bool>, rts: Option<bool>) -> Result<Signals> {
    let signals = Signals { dtr, rts };
    if signals.is_empty() {
        return Err(CliError::Usage("nothing to set; pass --dtr and/or --rts".to_string()).into());
    }
    Ok(signals)
}

pub(crate) fn cmd_set_signal(options: &SignalOptions) -> Result<()> {
    block_on(set_signal(options))?
}

async fn set_signal(options: &SignalOptions) -> Result<()> {
    let mut port = open_port(&options.port, options.baud, options.platform)?;
    port.set_signals(options.signals)
        .await
        .with_context(|| format!("failed to set {} on {}", options.signals, options.port))?;
    info!("Set {} on {}", options.signals, options.port);

    if !options.hold.is_zero() {
        eprintln!(
            "{} Holding {} for {:?}",
            style("→").green().bold(),
            options.signals,
            options.hold
        );
        sleep(options.hold).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requested_signals() {
        assert_eq!(
            requested_signals(Some(false), None).unwrap(),
            Signals::dtr(false)
        );
        assert_eq!(
            requested_signals(Some(true), Some(false)).unwrap(),
            Signals::both(true, false)
        );
    }

    #[test]
    fn test_empty_request_is_usage_error() {
        let err = requested_signals(None, None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::Usage(_))
        ));
    }
}
