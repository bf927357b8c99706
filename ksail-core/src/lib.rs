//! Foundation layer shared by every ksail crate.

pub mod command;
pub mod error;
pub mod output_macros;
pub mod validation;

pub use command::{is_tool_installed, ToolOutput};
pub use error::{KsailError, Result};

// Re-exported so the output macros can reach message templates from any crate.
pub use ksail_messages as messages;
