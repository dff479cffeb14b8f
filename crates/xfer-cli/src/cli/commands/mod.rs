//! CLI command handlers, one file per command.

mod add;
mod control;
mod docs;
mod run;
mod status;

pub use add::{run_add, AddArgs};
pub use control::run_control;
pub use docs::{run_completions, run_man};
pub use run::run_scheduler;
pub use status::run_status;
