//! Presentation layer for voxlink
//!
//! This crate contains the CLI definition, output formatters for session
//! activity and the background printers that stream it to the terminal.

pub mod cli;
pub mod output;

// Re-export commonly used types
pub use cli::commands::{Cli, OutputFormat};
pub use output::console::ConsoleFormatter;
pub use output::formatter::EventFormatter;
pub use output::json::JsonFormatter;
pub use output::printer::ActivityPrinter;
