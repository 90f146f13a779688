//! Host implementation.
//!
//! A fixed-timestep loop that owns the world and drives effects. Each step:
//! 1. drains queued console lines
//! 2. copies dispatcher cvars into the dispatcher
//! 3. ticks the dispatcher (new-effect timer, effect tick hooks, expiry)
//! 4. runs simulation systems (player recharge, then dying -> dead)
//! 5. drains and logs effect events
//!
//! Determinism notes:
//! - Seed the dispatcher (`ChaosConfig::seed`) for reproducible runs.
//! - Peds are always visited in ascending id order.

use std::{path::Path, time::Duration};

use anyhow::Context;
use chaos_shared::{
    config::ChaosConfig,
    console::{Console, CvarFlags, CvarValue},
    dispatcher::EffectDispatcher,
    ecs::EntityId,
    effect::{EffectEvent, EffectRegistry, StopReason},
    event::EventBus,
    natives::{Natives, PlayerPed, WorldNatives},
    options::OptionsFile,
    ped::{DamageOutcome, Ped, DEFAULT_PED_MAX_HEALTH},
};
use tokio::{sync::mpsc, time::Instant};
use tracing::{debug, info, warn};

const CVAR_DISPATCH: &str = "chaos_dispatch";
const CVAR_SPAWN_TIME: &str = "chaos_spawn_time";

/// Host run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    Running,
    /// `quit` was issued; the caller should call [`ChaosHost::shutdown`].
    Quitting,
}

/// The effect host.
pub struct ChaosHost {
    pub cfg: ChaosConfig,
    pub console: Console,
    pub natives: WorldNatives,
    registry: EffectRegistry,
    dispatcher: EffectDispatcher,
    events: EventBus,

    tick: u64,
    state: HostState,

    /// Channel for console commands from stdin.
    console_rx: Option<mpsc::Receiver<String>>,
}

impl ChaosHost {
    /// Creates a host with the built-in effects registered.
    pub fn new(cfg: ChaosConfig) -> anyhow::Result<Self> {
        let registry = EffectRegistry::with_builtin_effects().context("register effects")?;

        let mut console = Console::new();
        Self::register_cvars(&mut console, &cfg);

        info!(effects = registry.len(), tick_hz = cfg.tick_hz, "Host created");

        Ok(Self {
            dispatcher: EffectDispatcher::new(cfg.clone()),
            cfg,
            console,
            natives: WorldNatives::new(),
            registry,
            events: EventBus::default(),
            tick: 0,
            state: HostState::Running,
            console_rx: None,
        })
    }

    fn register_cvars(console: &mut Console, cfg: &ChaosConfig) {
        console.register_cvar(
            CVAR_DISPATCH,
            CvarValue::Bool(cfg.dispatch_enabled),
            "Run the new-effect timer",
            CvarFlags::ARCHIVE,
        );
        console.register_cvar(
            CVAR_SPAWN_TIME,
            CvarValue::Float(f64::from(cfg.spawn_interval_secs)),
            "Seconds between dispatched effects",
            CvarFlags::ARCHIVE,
        );
        console.register_cvar(
            "host_tickrate",
            CvarValue::Int(i64::from(cfg.tick_hz)),
            "Host tick rate",
            CvarFlags::READ_ONLY,
        );
    }

    /// Sets the console input receiver.
    pub fn set_console_input(&mut self, rx: mpsc::Receiver<String>) {
        self.console_rx = Some(rx);
    }

    pub fn state(&self) -> HostState {
        self.state
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn registry(&self) -> &EffectRegistry {
        &self.registry
    }

    pub fn dispatcher(&self) -> &EffectDispatcher {
        &self.dispatcher
    }

    /// Spawns `count` peds with staggered health and armour.
    pub fn spawn_demo_peds(&mut self, count: u32) -> Vec<Ped> {
        (0..count)
            .map(|i| {
                let health = DEFAULT_PED_MAX_HEALTH - (i as i32 * 10) % 90;
                let armour = if i % 2 == 0 { 50 } else { 0 };
                self.natives.spawn_ped(health, DEFAULT_PED_MAX_HEALTH, armour)
            })
            .collect()
    }

    /// Starts an effect by id.
    pub fn start_effect(&mut self, name: &str) -> anyhow::Result<()> {
        self.dispatcher
            .start_by_name(&self.registry, &mut self.natives, &mut self.events, name)?;
        Ok(())
    }

    /// Stops an effect by id. Returns `false` if it was not running.
    pub fn stop_effect(&mut self, name: &str) -> anyhow::Result<bool> {
        let id = self
            .registry
            .find(name)
            .map(|e| e.info.id)
            .with_context(|| format!("unknown effect '{}'", name))?;
        Ok(self.dispatcher.stop(
            &self.registry,
            &mut self.natives,
            &mut self.events,
            id,
            StopReason::Manual,
        ))
    }

    /// Runs the host for a number of ticks at `cfg.tick_hz`.
    pub async fn run_for_ticks(&mut self, ticks: u32) -> anyhow::Result<()> {
        let dt = Duration::from_secs_f32(1.0 / self.cfg.tick_hz.max(1) as f32);
        let mut next = Instant::now();

        for _ in 0..ticks {
            next += dt;
            self.step(dt.as_secs_f32())?;
            tokio::time::sleep_until(next).await;
        }
        Ok(())
    }

    /// Executes one fixed simulation step.
    pub fn step(&mut self, dt_sec: f32) -> anyhow::Result<()> {
        self.process_console_commands();
        self.sync_cvars();
        self.dispatcher
            .tick(&self.registry, &mut self.natives, &mut self.events, dt_sec)?;
        self.simulate(dt_sec);
        self.log_events();
        self.tick += 1;
        Ok(())
    }

    /// Stops every running effect so the world goes back to normal rules.
    pub fn shutdown(&mut self) {
        self.dispatcher.stop_all(
            &self.registry,
            &mut self.natives,
            &mut self.events,
            StopReason::Shutdown,
        );
        self.log_events();
        info!(tick = self.tick, "Host shut down");
    }

    /// Writes archived cvars back into the options file at `path`. JSON
    /// configs are left untouched. Returns how many cvars were written.
    pub fn save_archived_cvars(&self, path: &Path) -> anyhow::Result<usize> {
        if path.extension().is_some_and(|ext| ext == "json") {
            return Ok(0);
        }
        let mut options = OptionsFile::load(path)?;
        let written = self.console.archive_into(&mut options)?;
        options.save()?;
        info!(path = %path.display(), written, "Saved archived cvars");
        Ok(written)
    }

    fn process_console_commands(&mut self) {
        // Collect lines first to avoid borrow conflict
        let lines: Vec<String> = if let Some(ref mut rx) = self.console_rx {
            let mut collected = Vec::new();
            while let Ok(line) = rx.try_recv() {
                collected.push(line);
            }
            collected
        } else {
            Vec::new()
        };

        for line in lines {
            match self.exec_console(&line) {
                Ok(output) => output.iter().for_each(|out| println!("{}", out)),
                Err(e) => warn!(line = %line, error = %e, "Console command failed"),
            }
        }
    }

    fn sync_cvars(&mut self) {
        if let Some(value) = self.console.get_cvar(CVAR_DISPATCH) {
            self.dispatcher.set_dispatch_enabled(value.as_bool());
        }
        let current = self.dispatcher.config().spawn_interval_secs;
        if let Some(secs) = self
            .console
            .get_cvar(CVAR_SPAWN_TIME)
            .and_then(|v| v.as_float())
            .filter(|secs| *secs as f32 != current)
        {
            if let Err(e) = self.dispatcher.set_spawn_interval(secs as f32) {
                warn!(error = %e, "Rejected {}", CVAR_SPAWN_TIME);
                let restored = CvarValue::Float(f64::from(current));
                if let Err(e) = self.console.set_cvar(CVAR_SPAWN_TIME, restored) {
                    warn!(error = %e, "Could not restore {}", CVAR_SPAWN_TIME);
                }
            }
        }
    }

    fn simulate(&mut self, dt_sec: f32) {
        self.natives.recharge(dt_sec);
        let died = self.natives.advance_life();
        if died > 0 {
            debug!(died, tick = self.tick, "Peds died");
        }
    }

    fn log_events(&mut self) {
        for event in self.events.drain::<EffectEvent>() {
            match event {
                EffectEvent::Started { id, duration_secs } => {
                    debug!(tick = self.tick, id = %id, ?duration_secs, "effect event: started")
                }
                EffectEvent::Refreshed { id, duration_secs } => {
                    debug!(tick = self.tick, id = %id, ?duration_secs, "effect event: refreshed")
                }
                EffectEvent::Stopped { id, reason } => {
                    debug!(tick = self.tick, id = %id, ?reason, "effect event: stopped")
                }
            }
        }
    }

    /// Executes a console command.
    pub fn exec_console(&mut self, line: &str) -> anyhow::Result<Vec<String>> {
        let line = line.trim();

        // Handle host commands first.
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        match tokens[0] {
            "effect_start" => {
                let Some(name) = tokens.get(1) else {
                    return Ok(vec!["Usage: effect_start <effect>".to_string()]);
                };
                match self.start_effect(name) {
                    Ok(()) => Ok(vec![format!("Effect '{}' started", name)]),
                    Err(e) => Ok(vec![format!("Failed to start effect: {}", e)]),
                }
            }
            "effect_stop" => {
                let Some(name) = tokens.get(1) else {
                    return Ok(vec!["Usage: effect_stop <effect>".to_string()]);
                };
                match self.stop_effect(name) {
                    Ok(true) => Ok(vec![format!("Effect '{}' stopped", name)]),
                    Ok(false) => Ok(vec![format!("Effect '{}' is not running", name)]),
                    Err(e) => Ok(vec![format!("Failed to stop effect: {}", e)]),
                }
            }
            "effects" => Ok(self
                .registry
                .iter()
                .map(|effect| {
                    let id = effect.info.id;
                    let marker = if self.dispatcher.is_active(id) { "*" } else { " " };
                    format!("{} {} ({})", marker, id, effect.info.name)
                })
                .collect()),
            "peds" => Ok(self
                .natives
                .all_peds()
                .into_iter()
                .map(|ped| {
                    let tag = match self.natives.world.get::<PlayerPed>(ped) {
                        Some(PlayerPed(player)) => format!(" player={}", player.0),
                        None => String::new(),
                    };
                    format!(
                        "  {}: health={}/{} armour={} state={:?}{}",
                        ped,
                        self.natives.entity_health(ped),
                        self.natives.ped_max_health(ped),
                        self.natives.armour(ped),
                        self.natives.life_state(ped).unwrap_or_default(),
                        tag
                    )
                })
                .collect()),
            "spawn_ped" => {
                let Some(health) = tokens.get(1).and_then(|t| t.parse::<i32>().ok()) else {
                    return Ok(vec!["Usage: spawn_ped <health> [armour]".to_string()]);
                };
                let armour = tokens.get(2).and_then(|t| t.parse().ok()).unwrap_or(0);
                let ped = self
                    .natives
                    .spawn_ped(health, DEFAULT_PED_MAX_HEALTH.max(health), armour);
                Ok(vec![format!("Spawned ped {}", ped)])
            }
            "damage" => {
                let parsed = tokens
                    .get(1)
                    .and_then(|t| t.trim_start_matches('#').parse::<u64>().ok())
                    .zip(tokens.get(2).and_then(|t| t.parse::<i32>().ok()));
                let Some((ped, amount)) = parsed else {
                    return Ok(vec!["Usage: damage <ped> <amount>".to_string()]);
                };
                let ped = EntityId(ped);
                let msg = match self.natives.apply_damage(ped, amount) {
                    DamageOutcome::Ignored => format!("Ped {} is not a living ped", ped),
                    DamageOutcome::Hurt { health, armour } => {
                        format!("Ped {} hurt: health={} armour={}", ped, health, armour)
                    }
                    DamageOutcome::Killed => format!("Ped {} killed", ped),
                };
                Ok(vec![msg])
            }
            "status" => {
                let player = self.natives.player();
                let mut out = vec![
                    format!("Host state: {:?}", self.state),
                    format!("Tick: {}", self.tick),
                    format!("Peds: {}", self.natives.all_peds().len()),
                    format!(
                        "Player: ped={} health={} recharge={}",
                        player.ped,
                        self.natives.entity_health(player.ped),
                        player.health_recharge_multiplier
                    ),
                    format!(
                        "HUD health/armour bar: {}",
                        if self.natives.hud().health_armor_bar_hidden {
                            "hidden"
                        } else {
                            "shown"
                        }
                    ),
                    format!("Next effect in: {:.1}s", self.seconds_to_next_effect()),
                ];
                for active in self.dispatcher.active() {
                    match active.remaining_secs {
                        Some(secs) => out.push(format!("  {} ({:.1}s left)", active.id, secs)),
                        None => out.push(format!("  {} (permanent)", active.id)),
                    }
                }
                Ok(out)
            }
            "quit" | "exit" => {
                info!("Host quitting");
                self.state = HostState::Quitting;
                Ok(vec!["Quitting".to_string()])
            }
            _ => {
                // Delegate to console system.
                self.console.exec(line)
            }
        }
    }

    fn seconds_to_next_effect(&self) -> f32 {
        let cfg = self.dispatcher.config();
        if !cfg.dispatch_enabled {
            return f32::INFINITY;
        }
        (cfg.spawn_interval_secs - self.dispatcher.timer_secs()).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chaos_shared::{effect::EffectId, ped::OHKO_HEALTH};

    fn quiet_host() -> ChaosHost {
        ChaosHost::new(ChaosConfig {
            dispatch_enabled: false,
            seed: Some(1),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn console_starts_and_stops_ohko() {
        let mut host = quiet_host();
        let peds = host.spawn_demo_peds(3);

        let out = host.exec_console("effect_start peds_ohko").unwrap();
        assert_eq!(out, vec!["Effect 'peds_ohko' started"]);
        host.step(1.0 / 30.0).unwrap();
        for ped in &peds {
            assert!(host.natives.entity_health(*ped) <= OHKO_HEALTH);
        }

        let out = host.exec_console("effect_stop peds_ohko").unwrap();
        assert_eq!(out, vec!["Effect 'peds_ohko' stopped"]);
        let out = host.exec_console("effect_stop peds_ohko").unwrap();
        assert_eq!(out, vec!["Effect 'peds_ohko' is not running"]);
    }

    #[test]
    fn unknown_effect_is_reported() {
        let mut host = quiet_host();
        let out = host.exec_console("effect_start nope").unwrap();
        assert_eq!(out, vec!["Failed to start effect: unknown effect 'nope'"]);
    }

    #[test]
    fn effects_lists_active_marker() {
        let mut host = quiet_host();
        host.start_effect("peds_ohko").unwrap();
        let out = host.exec_console("effects").unwrap();
        assert_eq!(out, vec!["* peds_ohko (One Hit KO)"]);
    }

    #[test]
    fn damage_command_kills_under_ohko() {
        let mut host = quiet_host();
        let out = host.exec_console("spawn_ped 180 40").unwrap();
        assert_eq!(out, vec!["Spawned ped #1"]);

        host.start_effect("peds_ohko").unwrap();
        host.step(1.0 / 30.0).unwrap();

        let out = host.exec_console("damage 1 5").unwrap();
        assert_eq!(out, vec!["Ped #1 killed"]);
        host.step(1.0 / 30.0).unwrap();
        assert!(host.natives.is_ped_dead_or_dying(EntityId(1)));
    }

    #[test]
    fn cvars_drive_the_dispatcher() {
        let mut host = quiet_host();
        host.exec_console("chaos_dispatch 1").unwrap();
        host.exec_console("chaos_spawn_time 0.5").unwrap();

        host.step(0.5).unwrap();
        assert!(host.dispatcher().is_active(EffectId::PEDS_OHKO));
    }

    #[test]
    fn tiny_spawn_time_is_rejected() {
        let mut host = quiet_host();
        host.exec_console("chaos_dispatch 1").unwrap();
        host.exec_console("chaos_spawn_time 0.000000001").unwrap();

        host.step(1.0 / 30.0).unwrap();
        assert_eq!(host.dispatcher().config().spawn_interval_secs, 30.0);
        assert_eq!(
            host.console.get_cvar(CVAR_SPAWN_TIME).and_then(|v| v.as_float()),
            Some(30.0)
        );
        assert!(host.dispatcher().active().is_empty());
    }

    #[test]
    fn ped_spawned_below_death_health_is_dying() {
        let mut host = quiet_host();
        host.exec_console("spawn_ped 50").unwrap();
        let out = host.exec_console("peds").unwrap();
        assert_eq!(out[1], "  #1: health=50/200 armour=0 state=Dying");

        host.start_effect("peds_ohko").unwrap();
        host.step(1.0 / 30.0).unwrap();
        host.stop_effect("peds_ohko").unwrap();
        assert_eq!(host.natives.entity_health(EntityId(1)), 50);
    }

    #[test]
    fn extreme_console_values_do_not_panic() {
        let mut host = quiet_host();
        host.exec_console("spawn_ped -2147483648").unwrap();
        let out = host.exec_console("damage 1 5").unwrap();
        assert_eq!(out, vec!["Ped #1 is not a living ped"]);

        host.exec_console("spawn_ped 150").unwrap();
        let out = host.exec_console("damage 2 2147483647").unwrap();
        assert_eq!(out, vec!["Ped #2 killed"]);
        assert_eq!(host.natives.entity_health(EntityId(2)), 0);
    }

    #[test]
    fn quit_then_shutdown_restores_rules() {
        let mut host = quiet_host();
        host.start_effect("peds_ohko").unwrap();
        host.step(1.0 / 30.0).unwrap();
        assert!(host.natives.hud().health_armor_bar_hidden);

        host.exec_console("quit").unwrap();
        assert_eq!(host.state(), HostState::Quitting);
        host.shutdown();

        assert!(host.dispatcher().active().is_empty());
        assert!(!host.natives.hud().health_armor_bar_hidden);
        assert_eq!(host.natives.player().health_recharge_multiplier, 1.0);
    }

    #[test]
    fn peds_lists_player_first() {
        let mut host = quiet_host();
        host.spawn_demo_peds(1);
        let out = host.exec_console("peds").unwrap();
        assert_eq!(
            out,
            vec![
                "  #0: health=200/200 armour=0 state=Alive player=0",
                "  #1: health=200/200 armour=50 state=Alive",
            ]
        );
    }

    #[test]
    fn read_only_cvar_is_protected() {
        let mut host = quiet_host();
        assert!(host.exec_console("set host_tickrate 5").is_err());
    }
}
