//! `chaos_shared`
//!
//! Shared libraries for the chaos host: the ped model, the native-function
//! bridge effects call into, the effect registry and dispatcher, and the
//! config / console / event plumbing around them.
//!
//! Design goals:
//! - Effects see the game only through the [`natives::Natives`] trait.
//! - Registration is explicit; no load-time side effects.
//! - Deterministic when seeded.
//! - No `unsafe`.

pub mod config;
pub mod console;
pub mod dispatcher;
pub mod ecs;
pub mod effect;
pub mod effects;
pub mod event;
pub mod natives;
pub mod options;
pub mod ped;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::config::*;
    pub use crate::dispatcher::*;
    pub use crate::ecs::*;
    pub use crate::effect::*;
    pub use crate::event::*;
    pub use crate::natives::*;
    pub use crate::ped::*;
}
