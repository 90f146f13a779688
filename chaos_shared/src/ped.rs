//! Ped model.
//!
//! A ped is any entity with a [`Health`] component. Health follows the game's
//! convention: a ped is considered dead once its health drops to
//! [`DEATH_HEALTH`] or below, so [`OHKO_HEALTH`] leaves exactly one point of
//! margin.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ecs::{EntityId, World};

/// Ped handle.
pub type Ped = EntityId;

/// Max health given to peds spawned without an explicit maximum.
pub const DEFAULT_PED_MAX_HEALTH: i32 = 200;

/// Health at or below which a ped is dying.
pub const DEATH_HEALTH: i32 = 100;

/// Health peds are clamped to while one-hit-kill is active.
pub const OHKO_HEALTH: i32 = DEATH_HEALTH + 1;

/// Health component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub current: i32,
    pub max: i32,
}

/// Armour component. Absorbs damage before health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Armour(pub i32);

/// Life state component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LifeState {
    #[default]
    Alive,
    /// Health hit the death threshold this tick; becomes `Dead` next tick.
    Dying,
    Dead,
}

impl LifeState {
    pub fn is_dead_or_dying(self) -> bool {
        !matches!(self, LifeState::Alive)
    }
}

/// Result of [`apply_damage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageOutcome {
    /// Target was not a living ped.
    Ignored,
    Hurt { health: i32, armour: i32 },
    Killed,
}

/// Spawns a ped. Health is clamped to `0..=max`; a ped spawned at or below
/// [`DEATH_HEALTH`] starts out dying.
pub fn spawn_ped(world: &mut World, health: i32, max: i32, armour: i32) -> Ped {
    let max = max.max(0);
    let current = health.clamp(0, max);
    let ped = world.spawn();
    world.insert(ped, Health { current, max });
    world.insert(ped, Armour(armour.max(0)));
    world.insert(ped, life_state_for(current));
    debug!(ped = %ped, health = current, max, armour, "Spawned ped");
    ped
}

/// Life state implied by a health value on a ped that was alive.
pub fn life_state_for(health: i32) -> LifeState {
    if health <= DEATH_HEALTH {
        LifeState::Dying
    } else {
        LifeState::Alive
    }
}

/// Whether `ped` is dead or dying. Non-peds count as dead.
pub fn is_dead_or_dying(world: &World, ped: Ped) -> bool {
    world
        .get::<LifeState>(ped)
        .map_or(true, |state| state.is_dead_or_dying())
}

/// Applies `amount` damage. Armour soaks first, the remainder hits health.
pub fn apply_damage(world: &mut World, ped: Ped, amount: i32) -> DamageOutcome {
    if is_dead_or_dying(world, ped) || amount <= 0 {
        return DamageOutcome::Ignored;
    }

    let absorbed = match world.get_mut::<Armour>(ped) {
        Some(armour) => {
            let absorbed = armour.0.min(amount);
            armour.0 -= absorbed;
            absorbed
        }
        None => 0,
    };

    let Some(health) = world.get_mut::<Health>(ped) else {
        return DamageOutcome::Ignored;
    };
    health.current = health.current.saturating_sub(amount - absorbed).max(0);
    let remaining = health.current;

    if remaining <= DEATH_HEALTH {
        world.insert(ped, LifeState::Dying);
        debug!(ped = %ped, amount, "Ped killed");
        return DamageOutcome::Killed;
    }

    let armour = world.get::<Armour>(ped).map_or(0, |a| a.0);
    DamageOutcome::Hurt {
        health: remaining,
        armour,
    }
}

/// Moves every dying ped to dead. Runs once per host tick.
pub fn advance_life(world: &mut World) -> usize {
    let dying: Vec<Ped> = world
        .iter::<LifeState>()
        .filter(|(_, state)| **state == LifeState::Dying)
        .map(|(id, _)| id)
        .collect();

    for ped in &dying {
        world.insert(*ped, LifeState::Dead);
    }
    dying.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn armour_soaks_damage_first() {
        let mut world = World::default();
        let ped = spawn_ped(&mut world, 200, 200, 50);

        let outcome = apply_damage(&mut world, ped, 70);
        assert_eq!(
            outcome,
            DamageOutcome::Hurt {
                health: 180,
                armour: 0
            }
        );
    }

    #[test]
    fn ohko_health_dies_to_a_single_point() {
        let mut world = World::default();
        let ped = spawn_ped(&mut world, OHKO_HEALTH, 200, 0);

        assert_eq!(apply_damage(&mut world, ped, 1), DamageOutcome::Killed);
        assert_eq!(world.get::<LifeState>(ped), Some(&LifeState::Dying));

        assert_eq!(advance_life(&mut world), 1);
        assert_eq!(world.get::<LifeState>(ped), Some(&LifeState::Dead));
    }

    #[test]
    fn dead_peds_ignore_damage() {
        let mut world = World::default();
        let ped = spawn_ped(&mut world, 150, 200, 0);
        world.insert(ped, LifeState::Dead);

        assert_eq!(apply_damage(&mut world, ped, 10), DamageOutcome::Ignored);
        assert_eq!(world.get::<Health>(ped).unwrap().current, 150);
    }

    #[test]
    fn spawn_clamps_health_to_max() {
        let mut world = World::default();
        let ped = spawn_ped(&mut world, 500, 200, -5);
        assert_eq!(world.get::<Health>(ped).unwrap().current, 200);
        assert_eq!(world.get::<Armour>(ped), Some(&Armour(0)));
    }

    #[test]
    fn spawn_at_death_health_starts_dying() {
        let mut world = World::default();
        let dying = spawn_ped(&mut world, DEATH_HEALTH, 200, 0);
        let negative = spawn_ped(&mut world, i32::MIN, 200, 0);

        assert_eq!(world.get::<LifeState>(dying), Some(&LifeState::Dying));
        assert_eq!(world.get::<Health>(negative).unwrap().current, 0);
        assert!(is_dead_or_dying(&world, negative));
        assert_eq!(apply_damage(&mut world, negative, 5), DamageOutcome::Ignored);
    }

    #[test]
    fn huge_damage_floors_health_at_zero() {
        let mut world = World::default();
        let ped = spawn_ped(&mut world, 150, 200, 10);

        assert_eq!(apply_damage(&mut world, ped, i32::MAX), DamageOutcome::Killed);
        assert_eq!(world.get::<Health>(ped).unwrap().current, 0);
    }
}
