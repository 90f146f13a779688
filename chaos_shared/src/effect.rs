//! Effect registry.
//!
//! An effect is a triple of optional hooks (start, stop, tick) keyed by an
//! [`EffectId`]. Effects are registered explicitly when the registry is built
//! (see [`EffectRegistry::with_builtin_effects`]); nothing registers itself
//! at load time.

use std::collections::HashMap;

use anyhow::bail;
use serde::Serialize;

use crate::natives::Natives;

/// Effect identifier constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct EffectId(pub &'static str);

impl EffectId {
    pub const PEDS_OHKO: EffectId = EffectId("peds_ohko");

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for EffectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// Static effect metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectInfo {
    pub id: EffectId,
    /// Display name.
    pub name: &'static str,
    /// Timed effects expire; untimed ones stay until stopped.
    pub timed: bool,
}

/// Effect hook.
pub type EffectHook = Box<dyn Fn(&mut dyn Natives) + Send + Sync>;

/// A registered effect.
pub struct RegisteredEffect {
    pub info: EffectInfo,
    on_start: Option<EffectHook>,
    on_stop: Option<EffectHook>,
    on_tick: Option<EffectHook>,
}

impl RegisteredEffect {
    pub fn start(&self, natives: &mut dyn Natives) {
        if let Some(hook) = &self.on_start {
            hook(natives);
        }
    }

    pub fn stop(&self, natives: &mut dyn Natives) {
        if let Some(hook) = &self.on_stop {
            hook(natives);
        }
    }

    pub fn tick(&self, natives: &mut dyn Natives) {
        if let Some(hook) = &self.on_tick {
            hook(natives);
        }
    }
}

/// Why an effect stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    Expired,
    Manual,
    Shutdown,
}

/// Effect lifecycle events, published on the host event bus.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum EffectEvent {
    Started {
        id: EffectId,
        /// Seconds until expiry, `None` for untimed effects.
        duration_secs: Option<f32>,
    },
    Refreshed {
        id: EffectId,
        duration_secs: Option<f32>,
    },
    Stopped {
        id: EffectId,
        reason: StopReason,
    },
}

/// Host effect table.
#[derive(Default)]
pub struct EffectRegistry {
    effects: Vec<RegisteredEffect>,
    by_id: HashMap<EffectId, usize>,
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every shipped effect registered.
    pub fn with_builtin_effects() -> anyhow::Result<Self> {
        let mut registry = Self::new();
        crate::effects::register_all(&mut registry)?;
        Ok(registry)
    }

    /// Registers an effect's hooks under `info.id`.
    pub fn register(
        &mut self,
        info: EffectInfo,
        on_start: Option<EffectHook>,
        on_stop: Option<EffectHook>,
        on_tick: Option<EffectHook>,
    ) -> anyhow::Result<()> {
        if self.by_id.contains_key(&info.id) {
            bail!("effect '{}' already registered", info.id);
        }
        self.by_id.insert(info.id, self.effects.len());
        self.effects.push(RegisteredEffect {
            info,
            on_start,
            on_stop,
            on_tick,
        });
        Ok(())
    }

    pub fn get(&self, id: EffectId) -> Option<&RegisteredEffect> {
        self.by_id.get(&id).map(|&idx| &self.effects[idx])
    }

    /// Looks up an effect by its string id.
    pub fn find(&self, name: &str) -> Option<&RegisteredEffect> {
        self.effects.iter().find(|e| e.info.id.as_str() == name)
    }

    /// Registered effects in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredEffect> {
        self.effects.iter()
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}
