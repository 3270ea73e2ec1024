//! # Story State
//!
//! The persistent ledger of the story preprocessor. Everything that must survive
//! from one pass to the next lives here: definitions, registered questions, the
//! output command queue, input gates and the author-facing log.
//! This crate holds no text processing logic.

pub mod config;
pub mod defs;
pub mod error;
pub mod gates;
pub mod log;
pub mod output;
pub mod questions;
pub mod session;
pub mod store;

pub use config::*;
pub use defs::*;
pub use error::*;
pub use gates::*;
pub use log::*;
pub use output::*;
pub use questions::*;
pub use session::*;
pub use store::*;
