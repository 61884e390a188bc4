//! CLI command handlers, one file per command.

mod forget;
mod get;
mod status;

pub use forget::run_forget;
pub use get::run_get;
pub use status::run_status;
