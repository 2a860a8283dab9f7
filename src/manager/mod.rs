//! Token lifecycle: renewal schedule, forced refresh and event fan-out.

pub mod events;
pub mod schedule;
pub mod token_manager;

pub use events::{PendingToken, TokenEvent};
pub use token_manager::{ManagerStatus, TokenManager};
