//! # Story Preprocessor
//!
//! A turn-based directive interpreter for narrative text exchanged with a text
//! generation engine. Each call rewrites one direction of the exchange and keeps
//! its memory in a [`story_state::SessionState`] the host persists between calls.
//!
//! ## Core Components
//!
//! - **eval**: macro expansion, built-in functions and the restricted expression language
//! - **directives**: the `#`-directive interpreter and its conditional stack
//! - **questions**: asking the engine questions and capturing its answers
//! - **output**: the one-shot output command pipeline applied to replies
//! - **sections**: splitting the context into named sections and merging it back
//! - **lz**: reversible compression behind `TOLZ()`/`LZ()`
//! - **hooks**: the input, context and output entry points
//!
//! ## Pass Flow
//!
//! input hook → context hook (directives, guidance, question prompt) → engine reply →
//! output hook (answer capture, output commands, author log)

pub mod directives;
pub mod error;
pub mod eval;
pub mod hooks;
pub mod lz;
pub mod output;
pub mod questions;
pub mod sections;
pub mod text;

pub use directives::*;
pub use error::*;
pub use eval::*;
pub use hooks::*;
pub use output::*;
pub use questions::*;
pub use sections::*;
