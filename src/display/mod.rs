//! Terminal display module
//!
//! Writes markdown to the terminal, styled when colors are allowed.

mod formatter;
mod terminal;

pub use formatter::write_markdown;
pub use terminal::should_use_colors;
