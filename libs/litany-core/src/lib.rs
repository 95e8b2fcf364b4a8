//! # Litany Core
//!
//! Shared types for the Litany speech-grammar cache.
//!
//! Everything in this crate is pure: no filesystem access and no engine
//! calls. The daemon (`agents/litany`) drives these pieces:
//!
//! ```text
//!   raw XML ──► Pipeline ──► index_document ──► PreparedGrammar ──► Grammar
//!              (language gate,  (root rule,
//!               hotword,         examples)
//!               optional item)
//! ```

mod compose;
mod error;
mod examples;
mod grammar;
mod transform;

pub use compose::*;
pub use error::*;
pub use examples::*;
pub use grammar::*;
pub use transform::*;

/// Re-export common types
pub mod prelude {
    pub use crate::compose::{synthesize, Dialect};
    pub use crate::error::{LitanyError, Result};
    pub use crate::grammar::{Grammar, PreparedGrammar};
    pub use crate::transform::Pipeline;
}
