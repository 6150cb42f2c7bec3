//! clicod - Perl code generation from the command line.
//!
//! Turns a natural-language description into a Perl script using the Gemini
//! API. It supports:
//!
//! - **One-shot and streamed generation** with plain or structured JSON replies
//! - **Interactive sessions** with per-session streaming and auto-save toggles
//! - **Persistent configuration** validated against a fixed option table
//! - **Atomic saves** of generated scripts into a configured directory
//!
//! # Architecture
//!
//! - [`config`] - Option table, validation and the JSON config store
//! - [`command_router`] - Handlers behind each CLI verb
//! - [`interactive`] - Prompt loop and yes/no questions
//! - [`gemini`] - Gemini REST adapter and the mock generator
//! - [`http_client`] - HTTP client abstraction with line streaming
//! - [`prompt`] - Prompt templates
//! - [`response`] - Structured reply model and extraction helpers
//! - [`renderer`] - Markdown views of replies, configuration and help pages
//! - [`display`] - Terminal rendering of markdown
//! - [`output`] - Script files on disk
//! - [`error`] - Error type shared by all modules
//!
//! # Example
//!
//! ```ignore
//! use clicod::command_router::{CommandRouter, GenerateOptions};
//! use clicod::config::ConfigStore;
//! use clicod::gemini::generator_from_env;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = ConfigStore::open_default()?;
//!     let mut router = CommandRouter::new(store, generator_from_env())?;
//!
//!     let options = GenerateOptions {
//!         prompt: Some("Create a CSV parser with error handling".to_string()),
//!         save: true,
//!         ..GenerateOptions::default()
//!     };
//!     router
//!         .generate(options, &mut std::io::stdin().lock(), &mut std::io::stdout())
//!         .await
//! }
//! ```

pub mod command_router;
pub mod config;
pub mod display;
pub mod error;
pub mod gemini;
pub mod http_client;
pub mod interactive;
pub mod output;
pub mod prompt;
pub mod renderer;
pub mod response;
