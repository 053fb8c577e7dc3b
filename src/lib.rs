pub mod cli;
pub mod config;
pub mod format;
pub mod git;
pub mod history;
pub mod model;
pub mod ratchet;

mod api;
mod flock;

pub use api::{FmtRatchet, FmtRatchetBuilder, Mode, TaskOutcome, TaskReport};
pub use ratchet::{BaselineHandle, CacheKey, Ratchet, RatchetContext, RatchetError};
