//! End-to-end checks of the One Hit KO effect through the host.

mod common;

use chaos_shared::{
    natives::Natives,
    ped::{LifeState, OHKO_HEALTH},
};
use common::{init_tracing, manual_host};

const DT: f32 = 1.0 / 30.0;

#[test]
fn living_peds_are_clamped_after_one_tick() -> anyhow::Result<()> {
    init_tracing();
    let (mut host, _) = manual_host()?;

    host.start_effect("peds_ohko")?;
    host.step(DT)?;

    let natives = &host.natives;
    for ped in natives.all_peds() {
        if natives.is_ped_dead_or_dying(ped) {
            continue;
        }
        let health = natives.entity_health(ped);
        assert!(health <= OHKO_HEALTH, "ped {} has {} health", ped, health);
        assert_eq!(natives.armour(ped), 0, "ped {} kept armour", ped);
    }
    assert_eq!(natives.player().health_recharge_multiplier, 0.0);
    assert!(natives.hud().health_armor_bar_hidden);
    Ok(())
}

#[test]
fn clamped_peds_lose_health_and_armour() -> anyhow::Result<()> {
    init_tracing();
    let (mut host, peds) = manual_host()?;

    host.start_effect("peds_ohko")?;
    host.step(DT)?;

    for ped in [peds[0], peds[1], peds[3]] {
        assert_eq!(host.natives.entity_health(ped), OHKO_HEALTH);
        assert_eq!(host.natives.armour(ped), 0);
    }
    // At the threshold already: health kept, armour still stripped.
    assert_eq!(host.natives.entity_health(peds[2]), OHKO_HEALTH);
    assert_eq!(host.natives.armour(peds[2]), 0);
    Ok(())
}

#[test]
fn peds_healed_mid_effect_are_reclamped() -> anyhow::Result<()> {
    init_tracing();
    let (mut host, peds) = manual_host()?;

    host.start_effect("peds_ohko")?;
    host.step(DT)?;
    host.natives.set_entity_health(peds[0], 200);
    host.step(DT)?;

    assert_eq!(host.natives.entity_health(peds[0]), OHKO_HEALTH);
    Ok(())
}

#[test]
fn deactivation_heals_living_peds_to_max() -> anyhow::Result<()> {
    init_tracing();
    let (mut host, peds) = manual_host()?;

    host.start_effect("peds_ohko")?;
    host.step(DT)?;
    assert!(host.stop_effect("peds_ohko")?);

    let natives = &host.natives;
    for ped in natives.all_peds() {
        if !natives.is_ped_dead_or_dying(ped) {
            assert_eq!(natives.entity_health(ped), natives.ped_max_health(ped));
        }
    }
    assert_eq!(natives.entity_health(peds[1]), 250);
    assert_eq!(natives.player().health_recharge_multiplier, 1.0);
    assert!(!natives.hud().health_armor_bar_hidden);
    Ok(())
}

#[test]
fn dead_peds_are_left_alone() -> anyhow::Result<()> {
    init_tracing();
    let (mut host, _) = manual_host()?;
    let corpse = host.natives.spawn_ped(190, 200, 30);
    host.natives.world.insert(corpse, LifeState::Dead);

    host.start_effect("peds_ohko")?;
    host.step(DT)?;
    assert_eq!(host.natives.entity_health(corpse), 190);
    assert_eq!(host.natives.armour(corpse), 30);

    host.stop_effect("peds_ohko")?;
    assert_eq!(host.natives.entity_health(corpse), 190);
    assert_eq!(host.natives.life_state(corpse), Some(LifeState::Dead));
    Ok(())
}

#[test]
fn one_hit_kills_while_active() -> anyhow::Result<()> {
    init_tracing();
    let (mut host, peds) = manual_host()?;

    host.start_effect("peds_ohko")?;
    host.step(DT)?;
    host.natives.apply_damage(peds[0], 1);
    host.step(DT)?;
    assert_eq!(host.natives.life_state(peds[0]), Some(LifeState::Dead));

    // Killed during the effect: not revived on stop.
    host.stop_effect("peds_ohko")?;
    assert_eq!(host.natives.life_state(peds[0]), Some(LifeState::Dead));
    assert!(host.natives.entity_health(peds[0]) <= 100);
    Ok(())
}

#[test]
fn timed_effect_expires_and_restores() -> anyhow::Result<()> {
    init_tracing();
    let (mut host, peds) = manual_host()?;

    host.start_effect("peds_ohko")?;
    host.step(1.0)?;
    assert_eq!(host.natives.entity_health(peds[0]), OHKO_HEALTH);

    host.step(1.0)?;
    assert!(host.dispatcher().active().is_empty());
    assert_eq!(host.natives.entity_health(peds[0]), 200);
    Ok(())
}

#[test]
fn player_does_not_recharge_while_active() -> anyhow::Result<()> {
    init_tracing();
    let (mut host, _) = manual_host()?;
    let player = host.natives.player().ped;

    host.start_effect("peds_ohko")?;
    for _ in 0..60 {
        host.step(DT)?;
    }
    assert_eq!(host.natives.entity_health(player), OHKO_HEALTH);
    Ok(())
}
