//! One Hit KO.
//!
//! While active every living ped (player included) is held at or below
//! [`OHKO_HEALTH`] with no armour, so any hit kills. The HUD health/armour
//! bar is hidden and player health recharge is off. Stopping heals every
//! living ped to full.

use tracing::debug;

use crate::{
    effect::{EffectId, EffectInfo, EffectRegistry},
    natives::Natives,
    ped::OHKO_HEALTH,
};

pub const INFO: EffectInfo = EffectInfo {
    id: EffectId::PEDS_OHKO,
    name: "One Hit KO",
    timed: true,
};

pub fn register(registry: &mut EffectRegistry) -> anyhow::Result<()> {
    registry.register(INFO, None, Some(Box::new(on_stop)), Some(Box::new(on_tick)))
}

fn on_stop(natives: &mut dyn Natives) {
    natives.set_health_armor_bar_hidden(false);

    let player = natives.player_id();
    natives.set_player_health_recharge_multiplier(player, 1.0);

    for ped in natives.all_peds() {
        if !natives.is_ped_dead_or_dying(ped) {
            let max = natives.ped_max_health(ped);
            natives.set_entity_health(ped, max);
        }
    }
}

// Runs every tick so peds healed by anything else get clamped again.
fn on_tick(natives: &mut dyn Natives) {
    natives.set_health_armor_bar_hidden(true);

    let player = natives.player_id();
    natives.set_player_health_recharge_multiplier(player, 0.0);

    let mut clamped = 0usize;
    for ped in natives.all_peds() {
        if natives.is_ped_dead_or_dying(ped) {
            continue;
        }
        if natives.entity_health(ped) > OHKO_HEALTH {
            natives.set_entity_health(ped, OHKO_HEALTH);
            clamped += 1;
        }
        // Every living ped ends the tick without armour.
        natives.set_ped_armour(ped, 0);
    }
    if clamped > 0 {
        debug!(clamped, "OHKO clamped peds");
    }
}
