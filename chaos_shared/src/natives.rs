//! Native-function bridge.
//!
//! Effects only talk to the game through [`Natives`]. The host decides what
//! sits behind it; [`WorldNatives`] runs it over an in-process [`World`] so the
//! whole effect pipeline works headless.
//!
//! Every native is total: handles that do not resolve to a ped read as zero /
//! dead and writes to them are dropped.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    ecs::World,
    ped::{self, Armour, Health, LifeState, Ped, DEFAULT_PED_MAX_HEALTH, DEATH_HEALTH},
};

/// Player index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub u32);

/// Marks the ped a player controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerPed(pub PlayerId);

/// Health regenerated per second at multiplier 1.0.
pub const RECHARGE_RATE_PER_SEC: f32 = 5.0;

/// Fraction of the living health range that recharge can restore.
pub const RECHARGE_LIMIT_FRACTION: f32 = 0.5;

/// Host natives effects are allowed to call.
pub trait Natives {
    /// Every ped currently simulated, player ped included.
    fn all_peds(&self) -> Vec<Ped>;
    fn player_id(&self) -> PlayerId;
    fn entity_health(&self, ped: Ped) -> i32;
    fn set_entity_health(&mut self, ped: Ped, health: i32);
    fn ped_max_health(&self, ped: Ped) -> i32;
    fn set_ped_armour(&mut self, ped: Ped, armour: i32);
    fn is_ped_dead_or_dying(&self, ped: Ped) -> bool;
    fn set_player_health_recharge_multiplier(&mut self, player: PlayerId, multiplier: f32);
    fn set_health_armor_bar_hidden(&mut self, hidden: bool);
}

/// HUD flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HudState {
    pub health_armor_bar_hidden: bool,
}

/// Per-player state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerInfo {
    pub id: PlayerId,
    pub ped: Ped,
    pub health_recharge_multiplier: f32,
    recharge_carry: f32,
}

/// [`Natives`] over an ECS world with a single local player.
pub struct WorldNatives {
    pub world: World,
    player: PlayerInfo,
    hud: HudState,
}

impl Default for WorldNatives {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldNatives {
    /// Creates a world containing only the player ped.
    pub fn new() -> Self {
        let mut world = World::default();
        let id = PlayerId(0);
        let ped = ped::spawn_ped(
            &mut world,
            DEFAULT_PED_MAX_HEALTH,
            DEFAULT_PED_MAX_HEALTH,
            0,
        );
        world.insert(ped, PlayerPed(id));

        Self {
            world,
            player: PlayerInfo {
                id,
                ped,
                health_recharge_multiplier: 1.0,
                recharge_carry: 0.0,
            },
            hud: HudState::default(),
        }
    }

    pub fn player(&self) -> &PlayerInfo {
        &self.player
    }

    pub fn hud(&self) -> HudState {
        self.hud
    }

    pub fn spawn_ped(&mut self, health: i32, max: i32, armour: i32) -> Ped {
        ped::spawn_ped(&mut self.world, health, max, armour)
    }

    pub fn armour(&self, ped: Ped) -> i32 {
        self.world.get::<Armour>(ped).map_or(0, |a| a.0)
    }

    pub fn life_state(&self, ped: Ped) -> Option<LifeState> {
        self.world.get::<LifeState>(ped).copied()
    }

    pub fn apply_damage(&mut self, ped: Ped, amount: i32) -> ped::DamageOutcome {
        ped::apply_damage(&mut self.world, ped, amount)
    }

    pub fn advance_life(&mut self) -> usize {
        ped::advance_life(&mut self.world)
    }

    /// Regenerates the player ped according to its recharge multiplier.
    pub fn recharge(&mut self, dt_sec: f32) {
        let multiplier = self.player.health_recharge_multiplier;
        if multiplier <= 0.0 || ped::is_dead_or_dying(&self.world, self.player.ped) {
            self.player.recharge_carry = 0.0;
            return;
        }
        let Some(health) = self.world.get_mut::<Health>(self.player.ped) else {
            return;
        };

        let span = (health.max - DEATH_HEALTH).max(0) as f32;
        let limit = DEATH_HEALTH + (span * RECHARGE_LIMIT_FRACTION) as i32;
        if health.current >= limit {
            self.player.recharge_carry = 0.0;
            return;
        }

        self.player.recharge_carry += RECHARGE_RATE_PER_SEC * multiplier * dt_sec;
        let whole = self.player.recharge_carry.floor();
        self.player.recharge_carry -= whole;
        health.current = health.current.saturating_add(whole as i32).min(limit);
    }
}

impl Natives for WorldNatives {
    fn all_peds(&self) -> Vec<Ped> {
        self.world.ids_with::<Health>()
    }

    fn player_id(&self) -> PlayerId {
        self.player.id
    }

    fn entity_health(&self, ped: Ped) -> i32 {
        self.world.get::<Health>(ped).map_or(0, |h| h.current)
    }

    /// Clamps to `0..=max`. Lowering a living ped to [`DEATH_HEALTH`] or
    /// below makes it dying.
    fn set_entity_health(&mut self, ped: Ped, health: i32) {
        let Some(h) = self.world.get_mut::<Health>(ped) else {
            debug!(ped = %ped, "set_entity_health on non-ped");
            return;
        };
        h.current = health.min(h.max).max(0);
        let current = h.current;

        if !ped::is_dead_or_dying(&self.world, ped) && current <= DEATH_HEALTH {
            self.world.insert(ped, ped::life_state_for(current));
            debug!(ped = %ped, health = current, "Ped killed by health write");
        }
    }

    fn ped_max_health(&self, ped: Ped) -> i32 {
        self.world.get::<Health>(ped).map_or(0, |h| h.max)
    }

    fn set_ped_armour(&mut self, ped: Ped, armour: i32) {
        match self.world.get_mut::<Armour>(ped) {
            Some(a) => a.0 = armour.max(0),
            None => debug!(ped = %ped, "set_ped_armour on non-ped"),
        }
    }

    fn is_ped_dead_or_dying(&self, ped: Ped) -> bool {
        ped::is_dead_or_dying(&self.world, ped)
    }

    fn set_player_health_recharge_multiplier(&mut self, player: PlayerId, multiplier: f32) {
        if player != self.player.id {
            debug!(?player, "recharge multiplier for unknown player");
            return;
        }
        self.player.health_recharge_multiplier = multiplier.max(0.0);
    }

    fn set_health_armor_bar_hidden(&mut self, hidden: bool) {
        self.hud.health_armor_bar_hidden = hidden;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_ped_is_listed() {
        let mut natives = WorldNatives::new();
        let other = natives.spawn_ped(150, 200, 0);
        let peds = natives.all_peds();
        assert_eq!(peds, vec![natives.player().ped, other]);
    }

    #[test]
    fn unknown_handles_are_harmless() {
        let mut natives = WorldNatives::new();
        let stray = natives.world.spawn();

        natives.set_entity_health(stray, 50);
        natives.set_ped_armour(stray, 50);
        assert_eq!(natives.entity_health(stray), 0);
        assert_eq!(natives.ped_max_health(stray), 0);
        assert!(natives.is_ped_dead_or_dying(stray));
    }

    #[test]
    fn health_writes_clamp_and_kill() {
        let mut natives = WorldNatives::new();
        let ped = natives.spawn_ped(150, 200, 0);

        natives.set_entity_health(ped, 500);
        assert_eq!(natives.entity_health(ped), 200);
        assert_eq!(natives.life_state(ped), Some(LifeState::Alive));

        natives.set_entity_health(ped, -40);
        assert_eq!(natives.entity_health(ped), 0);
        assert_eq!(natives.life_state(ped), Some(LifeState::Dying));
    }

    #[test]
    fn lowering_to_death_health_marks_dying() {
        let mut natives = WorldNatives::new();
        let ped = natives.spawn_ped(150, 200, 0);

        natives.set_entity_health(ped, DEATH_HEALTH);
        assert!(natives.is_ped_dead_or_dying(ped));
        assert_eq!(natives.advance_life(), 1);
        assert_eq!(natives.life_state(ped), Some(LifeState::Dead));
    }

    #[test]
    fn recharge_stops_at_half_of_living_range() {
        let mut natives = WorldNatives::new();
        let ped = natives.player().ped;
        natives.set_entity_health(ped, 140);

        for _ in 0..100 {
            natives.recharge(0.5);
        }
        assert_eq!(natives.entity_health(ped), 150);
    }

    #[test]
    fn zero_multiplier_disables_recharge() {
        let mut natives = WorldNatives::new();
        let ped = natives.player().ped;
        natives.set_entity_health(ped, 120);
        natives.set_player_health_recharge_multiplier(natives.player_id(), 0.0);

        natives.recharge(10.0);
        assert_eq!(natives.entity_health(ped), 120);
    }

    #[test]
    fn recharge_carries_fractions() {
        let mut natives = WorldNatives::new();
        let ped = natives.player().ped;
        natives.set_entity_health(ped, 120);

        // 5 hp/s at 1/8s per tick: 0.625 then 1.25.
        natives.recharge(0.125);
        assert_eq!(natives.entity_health(ped), 120);
        natives.recharge(0.125);
        assert_eq!(natives.entity_health(ped), 121);
    }
}
