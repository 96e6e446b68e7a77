//! Generic utility primitives with zero domain knowledge.
//!
//! - `command` - Process execution with captured output
//! - `digest` - SHA-256 content digests for files and directory trees
//! - `io` - File I/O with consistent error handling
//! - `template` - `{{key}}` string template rendering

pub mod command;
pub mod digest;
pub mod io;
pub mod template;
