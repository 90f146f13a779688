//! Effect dispatcher.
//!
//! Owns the set of active effects. Every tick it:
//! 1. advances the new-effect timer and, when it elapses, starts a weighted
//!    random enabled effect;
//! 2. runs the tick hook of each active effect, in activation order;
//! 3. counts down timed effects and stops the ones that ran out.
//!
//! The dispatcher never owns the registry or the natives; the host passes
//! them in on every call.

use anyhow::{bail, Context};
use rand::{
    distributions::{Distribution, WeightedIndex},
    rngs::StdRng,
    SeedableRng,
};
use tracing::{debug, info};

use crate::{
    config::ChaosConfig,
    effect::{EffectEvent, EffectId, EffectRegistry, StopReason},
    event::EventBus,
    natives::Natives,
};

/// Shortest new-effect interval the dispatcher accepts.
pub const MIN_SPAWN_INTERVAL_SECS: f32 = 0.01;

/// An effect that is currently running.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveEffect {
    pub id: EffectId,
    /// Seconds left, `None` for untimed effects.
    pub remaining_secs: Option<f32>,
}

/// Schedules and drives effects.
pub struct EffectDispatcher {
    cfg: ChaosConfig,
    rng: StdRng,
    timer_secs: f32,
    active: Vec<ActiveEffect>,
}

impl EffectDispatcher {
    pub fn new(cfg: ChaosConfig) -> Self {
        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            cfg,
            rng,
            timer_secs: 0.0,
            active: Vec::new(),
        }
    }

    pub fn config(&self) -> &ChaosConfig {
        &self.cfg
    }

    pub fn set_dispatch_enabled(&mut self, enabled: bool) {
        self.cfg.dispatch_enabled = enabled;
    }

    /// Sets the new-effect interval. Non-finite values and values below
    /// [`MIN_SPAWN_INTERVAL_SECS`] are rejected.
    pub fn set_spawn_interval(&mut self, secs: f32) -> anyhow::Result<()> {
        if !secs.is_finite() || secs < MIN_SPAWN_INTERVAL_SECS {
            bail!(
                "spawn interval must be at least {}s, got {}",
                MIN_SPAWN_INTERVAL_SECS,
                secs
            );
        }
        self.cfg.spawn_interval_secs = secs;
        Ok(())
    }

    /// Seconds elapsed on the new-effect timer.
    pub fn timer_secs(&self) -> f32 {
        self.timer_secs
    }

    pub fn active(&self) -> &[ActiveEffect] {
        &self.active
    }

    pub fn is_active(&self, id: EffectId) -> bool {
        self.active.iter().any(|a| a.id == id)
    }

    fn duration_for(&self, registry: &EffectRegistry, id: EffectId) -> Option<f32> {
        let effect = registry.get(id)?;
        if !effect.info.timed {
            return None;
        }
        Some(
            self.cfg
                .effect(id.as_str())
                .duration_secs
                .unwrap_or(self.cfg.timed_duration_secs),
        )
    }

    /// Starts `id`, or refreshes its timer if it is already running.
    pub fn start(
        &mut self,
        registry: &EffectRegistry,
        natives: &mut dyn Natives,
        events: &mut EventBus,
        id: EffectId,
    ) -> anyhow::Result<()> {
        let Some(effect) = registry.get(id) else {
            bail!("unknown effect '{}'", id);
        };
        let duration_secs = self.duration_for(registry, id);

        if let Some(active) = self.active.iter_mut().find(|a| a.id == id) {
            active.remaining_secs = duration_secs;
            debug!(id = %id, ?duration_secs, "Effect refreshed");
            events.push(EffectEvent::Refreshed { id, duration_secs });
            return Ok(());
        }

        effect.start(natives);
        self.active.push(ActiveEffect {
            id,
            remaining_secs: duration_secs,
        });
        info!(id = %id, name = effect.info.name, ?duration_secs, "Effect started");
        events.push(EffectEvent::Started { id, duration_secs });
        Ok(())
    }

    /// Starts an effect by its string id.
    pub fn start_by_name(
        &mut self,
        registry: &EffectRegistry,
        natives: &mut dyn Natives,
        events: &mut EventBus,
        name: &str,
    ) -> anyhow::Result<EffectId> {
        let id = registry
            .find(name)
            .map(|e| e.info.id)
            .with_context(|| format!("unknown effect '{}'", name))?;
        self.start(registry, natives, events, id)?;
        Ok(id)
    }

    /// Stops `id`. Returns `false` if it was not running.
    pub fn stop(
        &mut self,
        registry: &EffectRegistry,
        natives: &mut dyn Natives,
        events: &mut EventBus,
        id: EffectId,
        reason: StopReason,
    ) -> bool {
        let Some(idx) = self.active.iter().position(|a| a.id == id) else {
            return false;
        };
        self.active.remove(idx);

        if let Some(effect) = registry.get(id) {
            effect.stop(natives);
        }
        info!(id = %id, ?reason, "Effect stopped");
        events.push(EffectEvent::Stopped { id, reason });
        true
    }

    /// Stops every active effect, most recent first.
    pub fn stop_all(
        &mut self,
        registry: &EffectRegistry,
        natives: &mut dyn Natives,
        events: &mut EventBus,
        reason: StopReason,
    ) {
        while let Some(last) = self.active.last().map(|a| a.id) {
            self.stop(registry, natives, events, last, reason);
        }
    }

    /// Picks an enabled effect by weight. `None` if nothing is eligible.
    pub fn pick_random(&mut self, registry: &EffectRegistry) -> Option<EffectId> {
        let candidates: Vec<(EffectId, u32)> = registry
            .iter()
            .map(|e| (e.info.id, self.cfg.effect(e.info.id.as_str())))
            .filter(|(_, settings)| settings.enabled && settings.weight > 0)
            .map(|(id, settings)| (id, settings.weight))
            .collect();

        let dist = WeightedIndex::new(candidates.iter().map(|(_, w)| *w)).ok()?;
        Some(candidates[dist.sample(&mut self.rng)].0)
    }

    /// Advances the dispatcher by one tick.
    pub fn tick(
        &mut self,
        registry: &EffectRegistry,
        natives: &mut dyn Natives,
        events: &mut EventBus,
        dt_sec: f32,
    ) -> anyhow::Result<()> {
        let interval = self.cfg.spawn_interval_secs;
        if self.cfg.dispatch_enabled
            && interval.is_finite()
            && interval >= MIN_SPAWN_INTERVAL_SECS
        {
            self.timer_secs += dt_sec;
            // At most one dispatch per tick, however many intervals elapsed.
            if self.timer_secs >= interval {
                self.timer_secs %= interval;
                match self.pick_random(registry) {
                    Some(id) => self.start(registry, natives, events, id)?,
                    None => debug!("No enabled effects to dispatch"),
                }
            }
        }

        for active in &self.active {
            if let Some(effect) = registry.get(active.id) {
                effect.tick(natives);
            }
        }

        let mut expired = Vec::new();
        for active in &mut self.active {
            if let Some(remaining) = active.remaining_secs.as_mut() {
                *remaining -= dt_sec;
                if *remaining <= 0.0 {
                    expired.push(active.id);
                }
            }
        }
        for id in expired {
            self.stop(registry, natives, events, id, StopReason::Expired);
        }
        Ok(())
    }
}
