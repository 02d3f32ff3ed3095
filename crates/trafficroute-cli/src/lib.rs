//! Traffic route planner CLI library.
//!
//! Output formatting shared by the `trafficroute` subcommands.

pub mod output;
