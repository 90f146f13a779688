//! `chaos_host`
//!
//! Host-side systems:
//! - Fixed timestep loop
//! - World and player ownership behind the native bridge
//! - Effect registry and dispatcher wiring
//! - Console commands for starting/stopping effects and poking peds

pub mod host;

pub use host::{ChaosHost, HostState};
