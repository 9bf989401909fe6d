// Core data models for fepdb
// These types represent the persisted pipeline state

pub mod stage;
pub mod status;
pub mod record;

pub use stage::*;
pub use status::*;
pub use record::*;
