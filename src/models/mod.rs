//! Domain models.
//!
//! # Core Concepts
//!
//! - [`Target`]: the hidden image a session is about, with a [`Description`]
//!   that starts as a placeholder and is filled in once at scoring time.
//! - [`Session`]: one subject's attempt: ordered [`StageNote`]s, a
//!   [`Rubric`] and a total score (0 until scored).
//! - [`StageDefinition`]: static configuration for one step of the
//!   elicitation sequence; see [`STAGES`].

mod rubric;
mod session;
mod stage;
mod target;

pub use rubric::*;
pub use session::*;
pub use stage::*;
pub use target::*;
