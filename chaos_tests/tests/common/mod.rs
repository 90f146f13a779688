//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use chaos_host::ChaosHost;
use chaos_shared::{config::ChaosConfig, ped::Ped};

/// Installs a test-writer subscriber once per binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}

/// A host with the effect timer off, seeded, plus a mixed crowd of peds:
/// full health with armour, hurt, at the OHKO threshold, and full on a
/// lower maximum.
pub fn manual_host() -> anyhow::Result<(ChaosHost, Vec<Ped>)> {
    let mut host = ChaosHost::new(ChaosConfig {
        dispatch_enabled: false,
        seed: Some(42),
        timed_duration_secs: 2.0,
        ..Default::default()
    })?;

    let peds = vec![
        host.natives.spawn_ped(200, 200, 100),
        host.natives.spawn_ped(170, 250, 25),
        host.natives.spawn_ped(101, 200, 60),
        host.natives.spawn_ped(120, 120, 0),
    ];
    Ok((host, peds))
}
