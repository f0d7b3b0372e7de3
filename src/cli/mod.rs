//! CLI module for kioskrag
//!
//! Handles command-line argument parsing and chat input.

pub mod args;
pub mod input;

pub use args::{metadata_filters, Args, Commands, ConfigCommand};
pub use input::{ChatInput, InputHandler};
