//! CLI command handlers, one file per subcommand.

mod fetch;
mod resolve;
mod run;

pub use fetch::run_fetch;
pub use resolve::run_resolve;
pub use run::run_batch_command;
