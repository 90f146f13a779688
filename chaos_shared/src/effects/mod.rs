//! Shipped effects.

pub mod peds_ohko;

use crate::effect::EffectRegistry;

/// Registers every shipped effect.
pub fn register_all(registry: &mut EffectRegistry) -> anyhow::Result<()> {
    peds_ohko::register(registry)?;
    Ok(())
}
