//! Bounded conversation memory, isolated per (user, video).

pub mod session;
pub mod window;

pub use session::{SessionKey, SessionMemoryStore};
pub use window::{TurnPair, TurnWindow};
