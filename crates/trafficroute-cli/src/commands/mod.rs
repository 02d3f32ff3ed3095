// Handlers for the CLI subcommands. main.rs parses arguments and dispatches here.

pub mod cache;
pub mod route;
