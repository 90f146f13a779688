//! Configuration system.
//!
//! Loads host configuration from JSON, or from the mod's `key=value` options
//! file (see [`crate::options`]).

use std::{collections::BTreeMap, path::Path};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::options::OptionsFile;

/// Per-effect dispatch settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectSettings {
    pub enabled: bool,
    /// Relative weight for random dispatch.
    pub weight: u32,
    /// Overrides [`ChaosConfig::timed_duration_secs`] for this effect.
    pub duration_secs: Option<f32>,
}

impl Default for EffectSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: 5,
            duration_secs: None,
        }
    }
}

/// Root host configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChaosConfig {
    /// Fixed simulation tick rate.
    pub tick_hz: u32,
    /// Seconds between automatically dispatched effects.
    pub spawn_interval_secs: f32,
    /// Default lifetime of timed effects.
    pub timed_duration_secs: f32,
    /// Whether the new-effect timer runs at all.
    pub dispatch_enabled: bool,
    /// Dispatch RNG seed; random when unset.
    pub seed: Option<u64>,
    /// Peds spawned by the host binary at startup.
    pub demo_peds: u32,
    /// Settings keyed by effect id.
    pub effects: BTreeMap<String, EffectSettings>,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self {
            tick_hz: 30,
            spawn_interval_secs: 30.0,
            timed_duration_secs: 90.0,
            dispatch_enabled: true,
            seed: None,
            demo_peds: 8,
            effects: BTreeMap::new(),
        }
    }
}

impl ChaosConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Builds config from an options file. Missing keys keep their defaults.
    pub fn from_options(file: &OptionsFile) -> Self {
        let defaults = Self::default();
        let mut cfg = Self {
            spawn_interval_secs: file
                .read_int("NewEffectSpawnTime", defaults.spawn_interval_secs as i64)
                as f32,
            timed_duration_secs: file
                .read_int("EffectTimedDur", defaults.timed_duration_secs as i64)
                as f32,
            dispatch_enabled: file.read_bool("EnableTimer", defaults.dispatch_enabled),
            seed: file
                .read_value("Seed")
                .and_then(|v| v.trim().parse().ok()),
            ..defaults
        };

        // Cvars archived by the host console win over the mod's own keys.
        if let Some(secs) = file
            .read_value("chaos_spawn_time")
            .and_then(|v| v.trim().parse::<f32>().ok())
        {
            cfg.spawn_interval_secs = secs;
        }
        cfg.dispatch_enabled = file.read_bool("chaos_dispatch", cfg.dispatch_enabled);

        for key in file.keys() {
            let Some(rest) = key.strip_prefix("Effect_") else {
                continue;
            };
            if let Some(id) = rest.strip_suffix("_Enabled") {
                cfg.effect_entry(id).enabled = file.read_bool(key, true);
            } else if let Some(id) = rest.strip_suffix("_Weight") {
                let weight = file.read_int(key, EffectSettings::default().weight as i64);
                cfg.effect_entry(id).weight = weight.max(0) as u32;
            }
        }
        cfg
    }

    /// Loads `.json` files as JSON and anything else as an options file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.extension().is_some_and(|ext| ext == "json") {
            let data = std::fs::read_to_string(path)
                .with_context(|| format!("read config {}", path.display()))?;
            Self::from_json_str(&data).with_context(|| format!("parse config {}", path.display()))
        } else {
            Ok(Self::from_options(&OptionsFile::load(path)?))
        }
    }

    /// Settings for `id`, defaulted if not configured.
    pub fn effect(&self, id: &str) -> EffectSettings {
        self.effects.get(id).cloned().unwrap_or_default()
    }

    fn effect_entry(&mut self, id: &str) -> &mut EffectSettings {
        self.effects.entry(id.to_string()).or_default()
    }
}
