//! Fallback order of reset strategies.

use crate::platform::{PlatformCategory, PlatformConfig};
use crate::reset::StrategyId;

/// Order in which strategies are tried on `platform`.
///
/// A previously successful strategy goes first; otherwise the platform's
/// preferred strategy does. The rest follow in canonical catalog order.
/// The result is always a permutation of [`StrategyId::ALL`].
pub fn order(platform: PlatformCategory, last_success: Option<StrategyId>) -> Vec<StrategyId> {
    let preferred = PlatformConfig::for_platform(platform).preferred_strategy;
    fallback_order(preferred, last_success)
}

/// Same as [`order`], with an explicit preferred strategy.
pub fn fallback_order(preferred: StrategyId, last_success: Option<StrategyId>) -> Vec<StrategyId> {
    let head = last_success.unwrap_or(preferred);

    let mut strategies = Vec::with_capacity(StrategyId::ALL.len());
    strategies.push(head);
    strategies.extend(
        StrategyId::ALL
            .into_iter()
            .filter(|id| *id != head),
    );
    strategies
}
