//! One Hit KO scenario runner.
//!
//! Drives a seeded host through a full OHKO activation and prints a
//! pass/fail line per check. Exits non-zero if any check fails.

use std::time::Instant;

use chaos_host::ChaosHost;
use chaos_shared::{config::ChaosConfig, ecs::EntityId, natives::Natives, ped::OHKO_HEALTH};

const DT: f32 = 1.0 / 30.0;

struct Outcome {
    name: &'static str,
    result: Result<(), String>,
}

fn check(name: &'static str, f: impl FnOnce() -> Result<(), String>) -> Outcome {
    Outcome { name, result: f() }
}

fn scenario_host() -> anyhow::Result<ChaosHost> {
    let mut host = ChaosHost::new(ChaosConfig {
        dispatch_enabled: false,
        seed: Some(1),
        timed_duration_secs: 1.0,
        ..Default::default()
    })?;
    host.spawn_demo_peds(8);
    Ok(host)
}

fn living_peds_clamped(host: &ChaosHost) -> Result<(), String> {
    let natives = &host.natives;
    for ped in natives.all_peds() {
        if natives.is_ped_dead_or_dying(ped) {
            continue;
        }
        if natives.entity_health(ped) > OHKO_HEALTH || natives.armour(ped) != 0 {
            return Err(format!(
                "ped {} has health={} armour={}",
                ped,
                natives.entity_health(ped),
                natives.armour(ped)
            ));
        }
    }
    if natives.player().health_recharge_multiplier != 0.0 {
        return Err("player still recharges".to_string());
    }
    Ok(())
}

fn living_peds_restored(host: &ChaosHost) -> Result<(), String> {
    let natives = &host.natives;
    for ped in natives.all_peds() {
        if !natives.is_ped_dead_or_dying(ped)
            && natives.entity_health(ped) != natives.ped_max_health(ped)
        {
            return Err(format!("ped {} not healed", ped));
        }
    }
    if natives.hud().health_armor_bar_hidden {
        return Err("health/armour bar still hidden".to_string());
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let start = Instant::now();
    let mut outcomes = Vec::new();

    let mut host = scenario_host()?;
    host.start_effect("peds_ohko")?;
    host.step(DT)?;
    outcomes.push(check("clamped after one tick", || living_peds_clamped(&host)));

    host.exec_console("damage 1 1")?;
    host.step(DT)?;
    outcomes.push(check("one hit kills", || {
        if host.natives.is_ped_dead_or_dying(EntityId(1)) {
            Ok(())
        } else {
            Err("ped #1 survived a 1-point hit".to_string())
        }
    }));

    for _ in 0..30 {
        host.step(DT)?;
    }
    outcomes.push(check("expired and restored", || {
        if host.dispatcher().active().is_empty() {
            living_peds_restored(&host)
        } else {
            Err("effect still active after its duration".to_string())
        }
    }));

    let mut failed = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(()) => println!("  ok    {}", outcome.name),
            Err(e) => {
                failed += 1;
                println!("  FAIL  {}: {}", outcome.name, e);
            }
        }
    }
    println!(
        "{} checks, {} failed, {:.2}s",
        outcomes.len(),
        failed,
        start.elapsed().as_secs_f64()
    );

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
