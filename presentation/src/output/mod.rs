//! Output formatting for session activity

pub mod console;
pub mod formatter;
pub mod json;
pub mod printer;
