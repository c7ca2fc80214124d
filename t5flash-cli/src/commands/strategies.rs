//! `strategies` command: show the fallback order and step timings.

use {
    super::millis,
    anyhow::Result,
    console::style,
    t5flash::{
        PlatformCategory, PlatformConfig, StrategyCatalog, StrategyId, reset::fallback_order,
    },
};

fn level(value: Option<bool>) -> String {
    match value {
        Some(true) => "1".to_string(),
        Some(false) => "0".to_string(),
        None => "-".to_string(),
    }
}

/// Print the strategies in the order a reset on `platform` would try them.
pub(crate) fn cmd_strategies(
    platform: PlatformCategory,
    config: &PlatformConfig,
    prior: Option<StrategyId>,
    json: bool,
) -> Result<()> {
    let catalog = StrategyCatalog::for_config(config);
    let definitions: Vec<_> = fallback_order(config.preferred_strategy, prior)
        .into_iter()
        .filter_map(|id| catalog.get(id))
        .collect();

    if json {
        let list: Vec<serde_json::Value> = definitions
            .iter()
            .map(|def| {
                let steps: Vec<serde_json::Value> = def
                    .steps
                    .iter()
                    .map(|step| {
                        serde_json::json!({
                            "dtr": step.dtr,
                            "rts": step.rts,
                            "hold_ms": millis(step.hold),
                        })
                    })
                    .collect();
                serde_json::json!({
                    "id": def.id,
                    "description": def.description,
                    "total_ms": millis(def.total_hold()),
                    "steps": steps,
                })
            })
            .collect();
        let value = serde_json::json!({
            "platform": platform,
            "order": list,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!(
        "{} {}",
        style("Fallback order for").bold(),
        style(platform).cyan().bold()
    );
    for (i, def) in definitions
        .iter()
        .enumerate()
    {
        println!();
        println!(
            "{}. {} {}",
            i + 1,
            style(def.id).green().bold(),
            style(format!("({:?})", def.total_hold())).dim()
        );
        println!("   {}", def.description);
        for step in &def.steps {
            println!(
                "   DTR={} RTS={}  hold {:?}",
                level(step.dtr),
                level(step.rts),
                step.hold
            );
        }
    }
    Ok(())
}
