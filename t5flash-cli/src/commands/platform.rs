//! `platform` command: show the platform category and its reset tuning.

use {
    super::millis,
    anyhow::Result,
    console::style,
    t5flash::{PlatformCategory, PlatformConfig},
};

/// Print `platform` and `config`. `detected` tells whether the category
/// came from the host rather than an override.
pub(crate) fn cmd_platform(
    platform: PlatformCategory,
    config: &PlatformConfig,
    detected: bool,
    json: bool,
) -> Result<()> {
    let guidance = platform.guidance();

    if json {
        let value = serde_json::json!({
            "platform": platform,
            "detected": detected,
            "description": config.description,
            "reset_hold_ms": millis(config.reset_hold),
            "recovery_ms": millis(config.recovery),
            "link_check_timeout_ms": millis(config.link_check_timeout),
            "max_retries": config.max_retries,
            "preferred_strategy": config.preferred_strategy,
            "guidance": {
                "reset_failed": guidance.reset_failed,
                "troubleshooting": guidance.troubleshooting,
            },
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let source = if detected { "detected" } else { "override" };
    println!(
        "{} {} ({})",
        style("Platform:").bold(),
        style(platform).cyan().bold(),
        style(source).dim()
    );
    println!("  {}", config.description);
    println!();
    println!("  reset hold          {:?}", config.reset_hold);
    println!("  recovery            {:?}", config.recovery);
    println!("  link-check timeout  {:?}", config.link_check_timeout);
    println!("  link-check retries  {}", config.max_retries);
    println!(
        "  preferred strategy  {}",
        style(config.preferred_strategy).green()
    );
    Ok(())
}
