//! # dbot-cli
//!
//! Argument parsing and the demo handler set behind the `dbot` binary.

pub mod cli;
pub mod demo;

pub use cli::{Cli, Commands};
pub use demo::{build_demo_chain, text_update, PrintBot};
