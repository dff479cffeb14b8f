pub mod config;
pub mod error;
pub mod logging;

// Orchestration core
pub mod checksum;
pub mod limiter;
pub mod queue;
pub mod record;
pub mod registry;
pub mod retry;
pub mod scheduler;
pub mod status;
pub mod store;
pub mod transport;

pub use error::{XferError, XferResult};
